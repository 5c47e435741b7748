//! Shared HTTP client construction, SSE parsing and error mapping.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Url;
use serde::Deserialize;

use crate::error::{ErrorCode, ErrorDetails, ParleyError};

/// Build a client with an optional proxy and a connect timeout.
///
/// The timeout only bounds connection setup; a long answer stream is not cut
/// off by it.
pub fn build_client(proxy: Option<Url>, connect_timeout: Duration) -> Result<reqwest::Client, ParleyError> {
    let mut builder = reqwest::Client::builder().connect_timeout(connect_timeout);
    if let Some(proxy_url) = proxy {
        tracing::debug!(proxy = %proxy_url, "Routing HTTP backend through proxy");
        let proxy = reqwest::Proxy::all(proxy_url.as_str())
            .map_err(|e| ParleyError::Configuration(format!("Invalid proxy: {e}")))?;
        builder = builder.proxy(proxy);
    }
    builder
        .build()
        .map_err(|e| ParleyError::Configuration(format!("Failed to build HTTP client: {e}")))
}

/// Build default headers for a Bearer-token API.
pub fn bearer_headers(api_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(val) = HeaderValue::from_str(&format!("Bearer {api_key}")) {
        headers.insert(AUTHORIZATION, val);
    }
    headers
}

/// Build Azure-style headers (`api-key`).
pub fn azure_headers(api_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(val) = HeaderValue::from_str(api_key) {
        headers.insert("api-key", val);
    }
    headers
}

/// One parsed SSE `data:` line.
#[derive(Debug, PartialEq, Eq)]
pub enum SseData<'a> {
    Json(&'a str),
    Done,
}

/// Pop the next complete line off an SSE byte buffer.
///
/// Bytes are decoded only once the terminating `\n` has arrived, so a UTF-8
/// sequence split across network reads stays intact.
pub fn take_line(buffer: &mut Vec<u8>) -> Option<String> {
    let line_end = buffer.iter().position(|&b| b == b'\n')?;
    let line: Vec<u8> = buffer.drain(..=line_end).collect();
    Some(String::from_utf8_lossy(&line).trim().to_string())
}

/// Parse an SSE line. Comments, blank lines and non-data fields yield `None`.
pub fn parse_sse_data(line: &str) -> Option<SseData<'_>> {
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return Some(SseData::Done);
    }
    Some(SseData::Json(data))
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    param: Option<String>,
    #[serde(default)]
    retry_after: Option<f64>,
}

/// Parse the `{"error": {...}}` body returned on failures.
pub fn parse_error_details(body: &str) -> Option<(String, ErrorDetails, Option<u64>)> {
    let envelope: ErrorEnvelope = serde_json::from_str(body).ok()?;
    let error = envelope.error;
    let provider_code = match error.code {
        Some(serde_json::Value::String(code)) => Some(code),
        Some(serde_json::Value::Number(code)) => Some(code.to_string()),
        _ => None,
    }
    .or(error.kind);
    let details = ErrorDetails {
        code: provider_code.as_deref().map(ErrorCode::from_provider_code),
        provider_code,
        param: error.param,
        request_id: None,
    };
    let retry_after_ms = error.retry_after.map(|s| (s * 1000.0) as u64);
    Some((error.message.unwrap_or_default(), details, retry_after_ms))
}

/// Map an HTTP failure status (and body) to an error.
pub fn status_to_error(status: u16, body: &str) -> ParleyError {
    let parsed = parse_error_details(body);
    match (status, parsed) {
        (401 | 403, Some((message, _, _))) => ParleyError::Authentication(message),
        (401 | 403, None) => ParleyError::Authentication(body.to_string()),
        (429, Some((message, details, _))) if details.code == Some(ErrorCode::InsufficientQuota) => {
            ParleyError::api_with_details(status, message, details)
        }
        (429, parsed) => ParleyError::RateLimited {
            retry_after_ms: parsed.and_then(|(_, _, retry)| retry),
        },
        (_, Some((message, details, _))) => ParleyError::api_with_details(status, message, details),
        (_, None) => ParleyError::api(status, body),
    }
}
