//! Convenience re-exports for common use.

pub use crate::config::{ParleyConfig, PromptItem, DEFAULT_PROMPT};
pub use crate::error::{ErrorCategory, ParleyError, Result, SparkErrorCode};
pub use crate::provider::{create_backend, BackendKind, ChatBackend};
pub use crate::session::{ChatSession, Conversation, SessionFile, Turn};
pub use crate::types::{ChatMessage, Fragment, GenerationSettings, Role, Usage};
