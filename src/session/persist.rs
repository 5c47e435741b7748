//! Session file on disk.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ParleyError;
use crate::provider::BackendKind;

use super::conversation::Turn;

/// Persisted conversation: sealed turns oldest-first, the active prompt and
/// the backend they were exchanged with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionFile {
    #[serde(default)]
    pub qa_list: Vec<Turn>,
    #[serde(default)]
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_type: Option<BackendKind>,
}

impl SessionFile {
    /// Write pretty-printed JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ParleyError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ParleyError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&raw)?)
    }
}
