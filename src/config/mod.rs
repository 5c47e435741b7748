//! Configuration (layered: defaults > TOML file > environment).
//!
//! A [`ParleyConfig`] is read once and handed to a session by value; nothing
//! in the crate writes it back.

pub mod prompt;

pub use prompt::{find_prompt, find_title, PromptItem, DEFAULT_PROMPT};

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::ParleyError;
use crate::types::GenerationSettings;

/// Environment variable consulted when no proxy is configured explicitly.
pub const PROXY_ENV: &str = "CHATGPT_PROXY";

/// Default session file name inside the work directory.
pub const SESSION_FILE_NAME: &str = "gpt_conversation.json";

const DEFAULT_CONTEXT_LIMIT: usize = 4;
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo-0613";
const DEFAULT_OPENAI_MAX_TOKENS: u32 = 1024;
const DEFAULT_OPENAI_TIMEOUT_SECS: u64 = 30;
const DEFAULT_AZURE_API_VERSION: &str = "2023-05-15";

const DEFAULT_SPARK_TEMPERATURE: f64 = 0.5;
const DEFAULT_SPARK_TOP_K: u32 = 4;
const DEFAULT_SPARK_MAX_TOKENS: u32 = 2048;
const DEFAULT_SPARK_TIMEOUT_SECS: u64 = 60;
const DEFAULT_SPARK_COOLDOWN_MS: u64 = 2000;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ParleyConfig {
    /// System prompt sent as the first message of every request.
    pub prompt: String,
    /// Number of sealed turns kept in the active context.
    pub context_limit: usize,
    pub work_dir: Option<PathBuf>,
    pub session_file_name: String,
    pub openai: OpenAiConfig,
    pub spark: SparkConfig,
}

impl Default for ParleyConfig {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            context_limit: DEFAULT_CONTEXT_LIMIT,
            work_dir: None,
            session_file_name: SESSION_FILE_NAME.to_string(),
            openai: OpenAiConfig::default(),
            spark: SparkConfig::default(),
        }
    }
}

impl ParleyConfig {
    /// Parse a TOML document. Missing keys fall back to defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ParleyError> {
        toml::from_str(source)
            .map_err(|e| ParleyError::Configuration(format!("Invalid config: {e}")))
    }

    /// Read and parse a TOML config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ParleyError> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&source)
    }

    /// Overlay credentials and endpoints from the environment (and `.env`).
    pub fn with_env_overrides(mut self) -> Self {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error

        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        if let Some(key) = read("OPENAI_API_KEY") {
            self.openai.api_key = Some(key);
        }
        if let Some(url) = read("OPENAI_BASE_URL") {
            self.openai.base_url = Some(url);
        }
        if let Some(model) = read("OPENAI_MODEL") {
            self.openai.model = model;
        }
        if let Some(app_id) = read("SPARK_APP_ID") {
            self.spark.app_id = Some(app_id);
        }
        if let Some(key) = read("SPARK_API_KEY") {
            self.spark.api_key = Some(key);
        }
        if let Some(secret) = read("SPARK_API_SECRET") {
            self.spark.api_secret = Some(secret);
        }
        self
    }

    /// Effective context limit, never below one.
    pub fn context_limit(&self) -> usize {
        self.context_limit.max(1)
    }

    /// Directory holding the session file.
    pub fn work_dir(&self) -> PathBuf {
        if let Some(dir) = &self.work_dir {
            return dir.clone();
        }
        ProjectDirs::from("", "", "parley")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Full path of the persisted session file.
    pub fn session_path(&self) -> PathBuf {
        self.work_dir().join(&self.session_file_name)
    }
}

/// Which flavour of the OpenAI HTTP API to talk to.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ApiType {
    #[default]
    OpenAi,
    Azure,
}

/// Settings for the streaming HTTP backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub api_type: ApiType,
    /// Azure only.
    pub api_version: Option<String>,
    pub model: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub proxy: Option<String>,
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            api_type: ApiType::OpenAi,
            api_version: None,
            model: DEFAULT_OPENAI_MODEL.to_string(),
            temperature: None,
            max_tokens: None,
            proxy: None,
            timeout_secs: DEFAULT_OPENAI_TIMEOUT_SECS,
        }
    }
}

impl OpenAiConfig {
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(DEFAULT_OPENAI_BASE_URL)
    }

    pub fn api_version(&self) -> &str {
        self.api_version
            .as_deref()
            .unwrap_or(DEFAULT_AZURE_API_VERSION)
    }

    pub fn settings(&self) -> GenerationSettings {
        GenerationSettings {
            temperature: self.temperature,
            max_tokens: Some(
                self.max_tokens
                    .filter(|max| *max > 0)
                    .unwrap_or(DEFAULT_OPENAI_MAX_TOKENS),
            ),
            top_k: None,
        }
    }

    /// Proxy URL from config, falling back to [`PROXY_ENV`].
    pub fn resolved_proxy(&self) -> Result<Option<Url>, ParleyError> {
        resolve_proxy(self.proxy.as_deref(), std::env::var(PROXY_ENV).ok().as_deref())
    }
}

/// Pick the proxy URL: explicit value first, then the environment value.
///
/// Accepts `http`, `https`, `socks5` and `socks5h` URLs.
pub fn resolve_proxy(explicit: Option<&str>, env_value: Option<&str>) -> Result<Option<Url>, ParleyError> {
    let raw = explicit
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| env_value.map(str::trim).filter(|v| !v.is_empty()));
    let Some(raw) = raw else {
        return Ok(None);
    };

    let url = Url::parse(raw)
        .map_err(|e| ParleyError::Configuration(format!("Invalid proxy URL '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" | "socks5" | "socks5h" => Ok(Some(url)),
        other => Err(ParleyError::Configuration(format!(
            "Unsupported proxy scheme '{other}'"
        ))),
    }
}

/// Spark API generation. Each one has its own endpoint and domain.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SparkVersion {
    #[default]
    V1,
    V2,
    V3,
}

impl SparkVersion {
    pub fn host_url(&self) -> &'static str {
        match self {
            Self::V1 => "wss://spark-api.xf-yun.com/v1.1/chat",
            Self::V2 => "wss://spark-api.xf-yun.com/v2.1/chat",
            Self::V3 => "wss://spark-api.xf-yun.com/v3.1/chat",
        }
    }

    pub fn domain(&self) -> &'static str {
        match self {
            Self::V1 => "general",
            Self::V2 => "generalv2",
            Self::V3 => "generalv3",
        }
    }
}

/// Settings for the signed WebSocket backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SparkConfig {
    pub app_id: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub api_version: SparkVersion,
    /// Overrides the versioned endpoint.
    pub host_url: Option<String>,
    pub temperature: Option<f64>,
    pub top_k: Option<u32>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: u64,
    /// Pause after dropping a stale connection before dialing again.
    pub reconnect_cooldown_ms: u64,
}

impl Default for SparkConfig {
    fn default() -> Self {
        Self {
            app_id: None,
            api_key: None,
            api_secret: None,
            api_version: SparkVersion::V1,
            host_url: None,
            temperature: None,
            top_k: None,
            max_tokens: None,
            timeout_secs: DEFAULT_SPARK_TIMEOUT_SECS,
            reconnect_cooldown_ms: DEFAULT_SPARK_COOLDOWN_MS,
        }
    }
}

impl SparkConfig {
    pub fn host_url(&self) -> &str {
        self.host_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| self.api_version.host_url())
    }

    pub fn domain(&self) -> &'static str {
        self.api_version.domain()
    }

    /// Settings with unset (or zero) values replaced by the service defaults.
    pub fn settings(&self) -> GenerationSettings {
        GenerationSettings {
            temperature: Some(
                self.temperature
                    .filter(|t| *t > 0.0)
                    .unwrap_or(DEFAULT_SPARK_TEMPERATURE),
            ),
            max_tokens: Some(
                self.max_tokens
                    .filter(|max| *max > 0)
                    .unwrap_or(DEFAULT_SPARK_MAX_TOKENS),
            ),
            top_k: Some(self.top_k.filter(|k| *k > 0).unwrap_or(DEFAULT_SPARK_TOP_K)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_proxy_wins_over_env() {
        let url = resolve_proxy(Some("socks5://127.0.0.1:1080"), Some("http://env:8080"))
            .unwrap()
            .unwrap();
        assert_eq!(url.scheme(), "socks5");
        assert_eq!(url.port(), Some(1080));
    }

    #[test]
    fn env_proxy_used_when_config_blank() {
        let url = resolve_proxy(Some("  "), Some("http://env:8080"))
            .unwrap()
            .unwrap();
        assert_eq!(url.host_str(), Some("env"));
    }

    #[test]
    fn no_proxy_when_nothing_set() {
        assert!(resolve_proxy(None, None).unwrap().is_none());
    }

    #[test]
    fn unsupported_proxy_scheme_is_rejected() {
        let err = resolve_proxy(Some("ftp://proxy:21"), None).unwrap_err();
        assert!(matches!(err, ParleyError::Configuration(_)));
    }

    #[test]
    fn spark_defaults_fill_unset_and_zero_values() {
        let config = SparkConfig {
            temperature: Some(0.0),
            top_k: None,
            max_tokens: Some(512),
            ..Default::default()
        };
        let settings = config.settings();
        assert_eq!(settings.temperature, Some(0.5));
        assert_eq!(settings.top_k, Some(4));
        assert_eq!(settings.max_tokens, Some(512));
    }

    #[test]
    fn spark_version_selects_endpoint_and_domain() {
        let config = SparkConfig {
            api_version: SparkVersion::V3,
            ..Default::default()
        };
        assert_eq!(config.host_url(), "wss://spark-api.xf-yun.com/v3.1/chat");
        assert_eq!(config.domain(), "generalv3");

        let overridden = SparkConfig {
            host_url: Some("ws://127.0.0.1:9000/v1.1/chat".into()),
            ..config
        };
        assert_eq!(overridden.host_url(), "ws://127.0.0.1:9000/v1.1/chat");
    }

    #[test]
    fn context_limit_never_drops_below_one() {
        let config = ParleyConfig {
            context_limit: 0,
            ..Default::default()
        };
        assert_eq!(config.context_limit(), 1);
    }
}
