//! Error types for Parley.

pub mod spark;
pub mod unified;

pub use spark::SparkErrorCode;
pub use unified::{ErrorCategory, ErrorCode, ErrorDetails, RecoverySuggestion};

use thiserror::Error;

/// Primary error type for all Parley operations.
///
/// End-of-stream is not represented here; it travels as
/// [`Fragment::is_final`](crate::types::Fragment).
#[derive(Error, Debug)]
pub enum ParleyError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("API error (status {status}): {message}")]
    Api {
        status: u16,
        message: String,
        details: Option<ErrorDetails>,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Spark error {code}: {message}")]
    Spark {
        code: SparkErrorCode,
        message: String,
        sid: Option<String>,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl ParleyError {
    /// Create an API error without details.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
            details: None,
        }
    }

    /// Create an API error with full details.
    pub fn api_with_details(status: u16, message: impl Into<String>, details: ErrorDetails) -> Self {
        Self::Api {
            status,
            message: message.into(),
            details: Some(details),
        }
    }

    /// Create a Spark protocol error from a frame code.
    pub fn spark(code: SparkErrorCode, message: impl Into<String>, sid: Option<String>) -> Self {
        Self::Spark {
            code,
            message: message.into(),
            sid,
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::Network(_) | Self::WebSocket(_) | Self::Io(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Spark { code, .. } => code.category(),
            Self::Api {
                status, details, ..
            } => {
                let code = details.as_ref().and_then(|d| d.code);
                match (*status, code) {
                    (_, Some(ErrorCode::InsufficientQuota | ErrorCode::RateLimitExceeded)) => {
                        ErrorCategory::RateLimit
                    }
                    (_, Some(ErrorCode::ContentFiltered)) => ErrorCategory::ContentSafety,
                    (_, Some(ErrorCode::ContextLengthExceeded)) => ErrorCategory::Capacity,
                    (_, Some(ErrorCode::InvalidApiKey)) | (401 | 403, _) => {
                        ErrorCategory::Authentication
                    }
                    (429, _) => ErrorCategory::RateLimit,
                    (400 | 404 | 422, _) => ErrorCategory::MalformedRequest,
                    (500..=599, _) => ErrorCategory::Server,
                    _ => ErrorCategory::Unknown,
                }
            }
            Self::InvalidArgument(_) => ErrorCategory::MalformedRequest,
            Self::Stream(_) | Self::InvalidState(_) => ErrorCategory::Unknown,
        }
    }

    /// Whether a failed connection attempt may be retried.
    ///
    /// Only transport-establishment failures qualify. Provider protocol errors
    /// are terminal for the turn.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Network | ErrorCategory::Timeout | ErrorCategory::Server
        )
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::Authentication => RecoverySuggestion::CheckCredentials,
            ErrorCategory::RateLimit => RecoverySuggestion::RetryLater,
            ErrorCategory::ContentSafety => RecoverySuggestion::RephraseInput,
            ErrorCategory::Capacity => match self {
                Self::Spark {
                    code: SparkErrorCode::TokenLimitExceeded,
                    ..
                } => RecoverySuggestion::ReduceInputSize,
                Self::Api { .. } => RecoverySuggestion::ReduceInputSize,
                _ => RecoverySuggestion::RetryLater,
            },
            ErrorCategory::Timeout => RecoverySuggestion::IncreaseTimeout,
            ErrorCategory::Configuration | ErrorCategory::MalformedRequest => {
                RecoverySuggestion::CheckConfiguration
            }
            ErrorCategory::Network | ErrorCategory::Server => RecoverySuggestion::RetryLater,
            ErrorCategory::EngineInternal
            | ErrorCategory::Serialization
            | ErrorCategory::Unknown => RecoverySuggestion::SwitchBackend,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ParleyError>;
