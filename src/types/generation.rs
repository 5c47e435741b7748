//! Generation settings shared by both transports.

use bon::Builder;
use serde::{Deserialize, Serialize};

/// Sampling and length settings for one request.
#[derive(Debug, Clone, Copy, Builder, Serialize, Deserialize, Default, PartialEq)]
pub struct GenerationSettings {
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub top_k: Option<u32>,
}
