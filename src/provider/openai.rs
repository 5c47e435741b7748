//! OpenAI Chat Completions backend (token stream over HTTP).

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use tracing::debug;

use crate::config::{ApiType, OpenAiConfig};
use crate::error::ParleyError;
use crate::types::{ChatMessage, Fragment, Usage};
use crate::util::retry::RetryPolicy;
use crate::util::timeout::with_timeout;

use super::http::{azure_headers, bearer_headers, build_client, parse_sse_data, status_to_error, take_line, SseData};
use super::{BackendKind, ChatBackend};

/// One decoded chunk of the event stream.
#[derive(Debug)]
struct StreamChunk {
    fragment: Fragment,
    usage: Option<Usage>,
}

type ChunkStream = BoxStream<'static, Result<StreamChunk, ParleyError>>;

/// Streaming chat client for OpenAI and Azure OpenAI.
pub struct OpenAiClient {
    config: OpenAiConfig,
    http: reqwest::Client,
    retry: RetryPolicy,
    stream: Option<ChunkStream>,
    last_usage: Usage,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, ParleyError> {
        if config.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            return Err(ParleyError::Authentication("Missing OPENAI_API_KEY".into()));
        }
        let http = build_client(
            config.resolved_proxy()?,
            Duration::from_secs(config.timeout_secs.max(1)),
        )?;
        Ok(Self {
            config,
            http,
            retry: RetryPolicy::establishment(),
            stream: None,
            last_usage: Usage::default(),
        })
    }

    /// Replace the connection retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn endpoint(&self) -> String {
        let base = self.config.base_url().trim_end_matches('/');
        match self.config.api_type {
            ApiType::OpenAi => format!("{base}/chat/completions"),
            ApiType::Azure => format!(
                "{base}/openai/deployments/{}/chat/completions?api-version={}",
                self.config.model,
                self.config.api_version()
            ),
        }
    }

    fn headers(&self) -> HeaderMap {
        let api_key = self.config.api_key.as_deref().unwrap_or_default();
        match self.config.api_type {
            ApiType::OpenAi => bearer_headers(api_key),
            ApiType::Azure => azure_headers(api_key),
        }
    }

    fn build_request_body(&self, history: &[ChatMessage]) -> serde_json::Value {
        let settings = self.config.settings();
        let messages = history
            .iter()
            .map(|m| {
                let mut message = serde_json::json!({
                    "role": m.role.as_ref(),
                    "content": m.content,
                });
                if let Some(name) = &m.name {
                    message["name"] = name.clone().into();
                }
                message
            })
            .collect::<Vec<_>>();

        let mut body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "stream": true,
            "n": 1,
        });
        if let Some(max) = settings.max_tokens {
            body["max_tokens"] = max.into();
        }
        if let Some(temp) = settings.temperature {
            body["temperature"] = temp.into();
        }
        body
    }
}

#[async_trait]
impl ChatBackend for OpenAiClient {
    fn kind(&self) -> BackendKind {
        BackendKind::OpenAi
    }

    fn model_id(&self) -> &str {
        &self.config.model
    }

    async fn send(&mut self, history: &[ChatMessage]) -> Result<Fragment, ParleyError> {
        self.close();
        self.last_usage = Usage::default();

        let url = self.endpoint();
        let headers = self.headers();
        let body = self.build_request_body(history);
        let timeout = Duration::from_secs(self.config.timeout_secs.max(1));

        debug!(model = %self.config.model, messages = history.len(), "OpenAI send");

        let (first, stream) = self
            .retry
            .execute(|| {
                let http = self.http.clone();
                let url = url.clone();
                let headers = headers.clone();
                let body = body.clone();
                async move {
                    let mut stream = with_timeout(
                        "openai stream open",
                        timeout,
                        open_stream(http, url, headers, body),
                    )
                    .await?;
                    match stream.next().await {
                        Some(Ok(chunk)) => Ok((chunk, stream)),
                        Some(Err(e)) => Err(e),
                        None => Ok((StreamChunk { fragment: Fragment::end(), usage: None }, stream)),
                    }
                }
            })
            .await?;

        if let Some(usage) = first.usage {
            self.last_usage = usage;
        }
        if !first.fragment.is_final {
            self.stream = Some(stream);
        }
        Ok(first.fragment)
    }

    async fn receive_next(&mut self) -> Result<Fragment, ParleyError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| ParleyError::InvalidState("No open OpenAI stream".into()))?;

        match stream.next().await {
            Some(Ok(chunk)) => {
                if let Some(usage) = chunk.usage {
                    self.last_usage = usage;
                }
                if chunk.fragment.is_final {
                    self.stream = None;
                }
                Ok(chunk.fragment)
            }
            Some(Err(e)) => {
                self.stream = None;
                Err(e)
            }
            None => {
                self.stream = None;
                Ok(Fragment::end())
            }
        }
    }

    fn close(&mut self) {
        self.stream = None;
    }

    fn tokens_used(&self) -> u64 {
        self.last_usage.total_tokens as u64
    }
}

async fn open_stream(
    http: reqwest::Client,
    url: String,
    headers: HeaderMap,
    body: serde_json::Value,
) -> Result<ChunkStream, ParleyError> {
    let resp = http.post(&url).headers(headers).json(&body).send().await?;

    let status = resp.status().as_u16();
    if status != 200 {
        let body_text = resp.text().await.unwrap_or_default();
        return Err(status_to_error(status, &body_text));
    }

    let byte_stream = resp.bytes_stream();

    let stream = async_stream::stream! {
        let mut buffer: Vec<u8> = Vec::new();
        futures::pin_mut!(byte_stream);

        while let Some(chunk_result) = byte_stream.next().await {
            let chunk = match chunk_result {
                Ok(c) => c,
                Err(e) => {
                    yield Err(ParleyError::Network(e));
                    return;
                }
            };

            buffer.extend_from_slice(&chunk);

            while let Some(line) = take_line(&mut buffer) {
                if line.is_empty() || line.starts_with(':') {
                    continue;
                }

                match parse_sse_data(&line) {
                    Some(SseData::Done) => {
                        yield Ok(StreamChunk { fragment: Fragment::end(), usage: None });
                        return;
                    }
                    Some(SseData::Json(data)) => match decode_chunk(data) {
                        Ok(Some(chunk)) => yield Ok(chunk),
                        Ok(None) => {}
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    },
                    None => {}
                }
            }
        }

        // Server closed without a [DONE] marker.
        yield Ok(StreamChunk { fragment: Fragment::end(), usage: None });
    };

    Ok(Box::pin(stream))
}

fn decode_chunk(data: &str) -> Result<Option<StreamChunk>, ParleyError> {
    if let Ok(chunk) = serde_json::from_str::<OpenAiStreamChunk>(data) {
        let usage = chunk.usage.map(Usage::from);
        let text = chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .unwrap_or_default();
        return Ok(Some(StreamChunk {
            fragment: Fragment::delta(text),
            usage,
        }));
    }
    // An error object can arrive in-band after the stream has started.
    if data.contains("\"error\"") {
        return Err(status_to_error(200, data));
    }
    Ok(None) // skip unparseable chunks
}

// OpenAI API response types (internal)

#[derive(Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl From<OpenAiUsage> for Usage {
    fn from(u: OpenAiUsage) -> Self {
        Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

#[derive(Deserialize)]
struct OpenAiStreamChunk {
    choices: Vec<OpenAiStreamChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiStreamDelta,
}

#[derive(Deserialize)]
struct OpenAiStreamDelta {
    content: Option<String>,
}
