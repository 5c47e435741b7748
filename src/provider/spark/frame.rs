//! Spark request and response frames.

use serde::{Deserialize, Serialize};

use crate::error::{ParleyError, SparkErrorCode};
use crate::types::{ChatMessage, GenerationSettings, Role, Usage};

/// Text status marking the last frame of an answer.
pub const STATUS_LAST: u8 = 2;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RequestFrame {
    pub header: RequestHeader,
    pub parameter: RequestParameter,
    pub payload: RequestPayload,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RequestHeader {
    pub app_id: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RequestParameter {
    pub chat: ChatParameter,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatParameter {
    pub domain: String,
    pub temperature: f64,
    pub top_k: u32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RequestPayload {
    pub message: RequestMessage,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RequestMessage {
    pub text: Vec<TextItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextItem {
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing)]
    pub index: u32,
}

impl RequestFrame {
    /// Build a request frame. Only user and assistant messages are sent; the
    /// service has no system role.
    pub fn new(app_id: &str, domain: &str, settings: &GenerationSettings, history: &[ChatMessage]) -> Self {
        let text = history
            .iter()
            .filter(|m| matches!(m.role, Role::User | Role::Assistant))
            .map(|m| TextItem {
                role: m.role.to_string(),
                content: m.content.clone(),
                index: 0,
            })
            .collect();

        Self {
            header: RequestHeader {
                app_id: app_id.to_string(),
            },
            parameter: RequestParameter {
                chat: ChatParameter {
                    domain: domain.to_string(),
                    temperature: settings.temperature.unwrap_or_default(),
                    top_k: settings.top_k.unwrap_or_default(),
                    max_tokens: settings.max_tokens.unwrap_or_default(),
                },
            },
            payload: RequestPayload {
                message: RequestMessage { text },
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ResponseFrame {
    pub header: ResponseHeader,
    #[serde(default)]
    pub payload: Option<ResponsePayload>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ResponseHeader {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub sid: Option<String>,
    #[serde(default)]
    pub status: u8,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ResponsePayload {
    #[serde(default)]
    pub choices: Option<Choices>,
    #[serde(default)]
    pub usage: Option<UsageEnvelope>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Choices {
    #[serde(default)]
    pub status: u8,
    #[serde(default)]
    pub seq: u64,
    #[serde(default)]
    pub text: Vec<TextItem>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct UsageEnvelope {
    pub text: Usage,
}

/// What one response frame contributes to the answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub content: String,
    pub is_last: bool,
    pub usage: Option<Usage>,
}

impl ResponseFrame {
    pub fn parse(raw: &str) -> Result<Self, ParleyError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Turn the frame into answer text, or the service error it reports.
    pub fn decode(self) -> Result<Decoded, ParleyError> {
        if let Some(code) = SparkErrorCode::from_code(self.header.code) {
            return Err(ParleyError::spark(code, self.header.message, self.header.sid));
        }

        let (choices, usage) = match self.payload {
            Some(payload) => (payload.choices, payload.usage),
            None => (None, None),
        };
        let (content, is_last) = match choices {
            Some(choices) => {
                let content = choices
                    .text
                    .into_iter()
                    .filter(|item| item.role == Role::Assistant.as_ref())
                    .map(|item| item.content)
                    .collect::<String>();
                (content, choices.status == STATUS_LAST)
            }
            None => (String::new(), false),
        };
        let is_last = is_last || self.header.status == STATUS_LAST;

        Ok(Decoded {
            content,
            is_last,
            usage: if is_last { usage.map(|u| u.text) } else { None },
        })
    }
}
