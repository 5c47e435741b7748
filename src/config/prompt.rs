//! Prompt-library entries as consumed by a session.
//!
//! Downloading and browsing the library happens elsewhere; a session only
//! needs the resolved prompt text.

use serde::{Deserialize, Serialize};

/// Prompt used when nothing else is selected.
pub const DEFAULT_PROMPT: &str =
    "You are ChatGPT, a large language model trained by OpenAI. Answer as concisely as possible.";

/// One `{act, prompt}` entry of the prompt library.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromptItem {
    #[serde(rename = "act")]
    pub title: String,
    #[serde(rename = "prompt")]
    pub text: String,
}

/// Prompt text for `title`, or [`DEFAULT_PROMPT`] when the title is unknown.
pub fn find_prompt<'a>(items: &'a [PromptItem], title: &str) -> &'a str {
    items
        .iter()
        .find(|item| item.title == title)
        .map(|item| item.text.as_str())
        .unwrap_or(DEFAULT_PROMPT)
}

/// Reverse lookup used to label the active prompt.
pub fn find_title<'a>(items: &'a [PromptItem], prompt: &str) -> Option<&'a str> {
    items
        .iter()
        .find(|item| item.text == prompt)
        .map(|item| item.title.as_str())
}
