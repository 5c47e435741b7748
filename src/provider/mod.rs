//! Chat backend trait and implementations.

pub mod http;
pub mod openai;
pub mod spark;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::config::ParleyConfig;
use crate::error::ParleyError;
use crate::types::{ChatMessage, Fragment};

/// Identifies a backend. The serialized names are the ones stored in session
/// files.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
pub enum BackendKind {
    #[default]
    #[serde(rename = "ChatGPT")]
    #[strum(serialize = "ChatGPT")]
    OpenAi,
    #[serde(rename = "Spark")]
    #[strum(serialize = "Spark")]
    Spark,
}

/// Core trait implemented by every chat backend.
///
/// A backend streams one answer at a time. [`send`](Self::send) opens the
/// stream and returns its first fragment; [`receive_next`](Self::receive_next)
/// yields the rest until a fragment with `is_final` set.
#[async_trait]
pub trait ChatBackend: Send {
    fn kind(&self) -> BackendKind;

    /// Model or domain this backend answers with.
    fn model_id(&self) -> &str;

    /// Start a new answer for `history`. Any stream still open is dropped.
    async fn send(&mut self, history: &[ChatMessage]) -> Result<Fragment, ParleyError>;

    /// Next fragment of the open answer stream.
    async fn receive_next(&mut self) -> Result<Fragment, ParleyError>;

    /// Release the underlying connection. Safe to call repeatedly.
    fn close(&mut self);

    /// Tokens reported by the service for the last completed exchange, or 0.
    fn tokens_used(&self) -> u64;
}

/// Create a backend of `kind` from the given config.
pub fn create_backend(kind: BackendKind, config: &ParleyConfig) -> Result<Box<dyn ChatBackend>, ParleyError> {
    tracing::debug!(backend = %kind, "Creating chat backend");
    match kind {
        BackendKind::OpenAi => Ok(Box::new(openai::OpenAiClient::new(config.openai.clone())?)),
        BackendKind::Spark => Ok(Box::new(spark::SparkClient::new(config.spark.clone())?)),
    }
}
