//! Unified error classification and recovery.

use serde::{Deserialize, Serialize};

/// Machine-readable error code reported by the HTTP backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidApiKey,
    InsufficientQuota,
    RateLimitExceeded,
    ModelNotFound,
    InvalidRequest,
    ContentFiltered,
    ContextLengthExceeded,
    ServerError,
    ServiceUnavailable,
    Unknown,
}

impl ErrorCode {
    /// Map an OpenAI `error.code` / `error.type` string onto a known code.
    pub fn from_provider_code(code: &str) -> Self {
        match code {
            "invalid_api_key" | "invalid_authentication" => Self::InvalidApiKey,
            "insufficient_quota" => Self::InsufficientQuota,
            "rate_limit_exceeded" | "requests" | "tokens" => Self::RateLimitExceeded,
            "model_not_found" => Self::ModelNotFound,
            "invalid_request_error" => Self::InvalidRequest,
            "content_filter" | "content_policy_violation" => Self::ContentFiltered,
            "context_length_exceeded" => Self::ContextLengthExceeded,
            "server_error" => Self::ServerError,
            "service_unavailable" | "engine_overloaded" => Self::ServiceUnavailable,
            _ => Self::Unknown,
        }
    }
}

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    /// Quota exhaustion and request-rate limits.
    RateLimit,
    ContentSafety,
    Capacity,
    MalformedRequest,
    EngineInternal,
    Network,
    Timeout,
    Server,
    Configuration,
    Serialization,
    Unknown,
}

/// Structured details returned by a provider API.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ErrorDetails {
    pub code: Option<ErrorCode>,
    pub provider_code: Option<String>,
    pub param: Option<String>,
    pub request_id: Option<String>,
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    RetryLater,
    CheckCredentials,
    CheckConfiguration,
    IncreaseTimeout,
    ReduceInputSize,
    RephraseInput,
    SwitchBackend,
}
