//! Streaming types.

use serde::{Deserialize, Serialize};

/// One incremental piece of an answer.
///
/// `is_final` marks end-of-stream: no further fragments follow for the
/// current turn. The final fragment may still carry text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub text: String,
    pub is_final: bool,
}

impl Fragment {
    /// A non-terminal fragment.
    pub fn delta(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }

    /// A terminal fragment carrying the last piece of text.
    pub fn last(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }

    /// The empty end-of-stream marker.
    pub fn end() -> Self {
        Self::last(String::new())
    }
}
