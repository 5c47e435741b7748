//! iFlytek Spark backend over a signed WebSocket.
//!
//! The service closes the socket after each answer, so every
//! [`send`](ChatBackend::send) dials a fresh connection. A connection left
//! over from the previous turn is dropped first, followed by a cooldown.

pub mod auth;
pub mod frame;

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, warn};

use crate::config::SparkConfig;
use crate::error::ParleyError;
use crate::types::{ChatMessage, Fragment, Usage};
use crate::util::retry::RetryPolicy;
use crate::util::timeout::with_timeout;

use self::frame::{RequestFrame, ResponseFrame};
use super::{BackendKind, ChatBackend};

type SparkSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Credentials pulled out of [`SparkConfig`] once they are known to be set.
#[derive(Clone)]
struct Credentials {
    app_id: String,
    api_key: String,
    api_secret: String,
}

/// Streaming chat client for the Spark WebSocket API.
pub struct SparkClient {
    config: SparkConfig,
    credentials: Credentials,
    retry: RetryPolicy,
    socket: Option<SparkSocket>,
    last_tokens: u64,
    total_usage: Usage,
}

impl SparkClient {
    pub fn new(config: SparkConfig) -> Result<Self, ParleyError> {
        let require = |value: &Option<String>, name: &str| {
            value
                .clone()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ParleyError::Authentication(format!("Missing {name}")))
        };
        let credentials = Credentials {
            app_id: require(&config.app_id, "SPARK_APP_ID")?,
            api_key: require(&config.api_key, "SPARK_API_KEY")?,
            api_secret: require(&config.api_secret, "SPARK_API_SECRET")?,
        };
        Ok(Self {
            config,
            credentials,
            retry: RetryPolicy::establishment(),
            socket: None,
            last_tokens: 0,
            total_usage: Usage::default(),
        })
    }

    /// Replace the connection retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Tokens billed across every exchange on this client.
    pub fn total_tokens(&self) -> u64 {
        self.total_usage.total_tokens as u64
    }

    fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs.max(1))
    }

    async fn drop_stale_socket(&mut self) {
        if let Some(socket) = self.socket.take() {
            drop(socket);
            let cooldown = Duration::from_millis(self.config.reconnect_cooldown_ms);
            debug!(cooldown_ms = self.config.reconnect_cooldown_ms, "Dropped stale Spark connection");
            if !cooldown.is_zero() {
                tokio::time::sleep(cooldown).await;
            }
        }
    }
}

#[async_trait]
impl ChatBackend for SparkClient {
    fn kind(&self) -> BackendKind {
        BackendKind::Spark
    }

    fn model_id(&self) -> &str {
        self.config.domain()
    }

    async fn send(&mut self, history: &[ChatMessage]) -> Result<Fragment, ParleyError> {
        self.drop_stale_socket().await;
        self.last_tokens = 0;

        let request = RequestFrame::new(
            &self.credentials.app_id,
            self.config.domain(),
            &self.config.settings(),
            history,
        );
        let payload = serde_json::to_string(&request)?;
        let timeout = self.connect_timeout();
        let host_url = self.config.host_url().to_string();
        let credentials = self.credentials.clone();

        debug!(domain = self.config.domain(), messages = request.payload.message.text.len(), "Spark send");

        let socket = self
            .retry
            .execute(|| {
                let host_url = host_url.clone();
                let credentials = credentials.clone();
                let payload = payload.clone();
                async move {
                    let mut socket = with_timeout(
                        "spark connect",
                        timeout,
                        connect_spark_socket(&host_url, &credentials),
                    )
                    .await?;
                    socket
                        .send(Message::Text(payload))
                        .await
                        .map_err(|error| ParleyError::WebSocket(format!("Spark request send failed: {error}")))?;
                    Ok(socket)
                }
            })
            .await?;

        self.socket = Some(socket);
        Ok(Fragment::delta(""))
    }

    async fn receive_next(&mut self) -> Result<Fragment, ParleyError> {
        let socket = self
            .socket
            .as_mut()
            .ok_or_else(|| ParleyError::InvalidState("No open Spark connection".into()))?;

        loop {
            let raw = match socket.next().await {
                Some(Ok(Message::Text(text))) => text.to_string(),
                Some(Ok(Message::Binary(bytes))) => String::from_utf8_lossy(&bytes).into_owned(),
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Ok(Message::Close(_))) | None => {
                    self.socket = None;
                    return Err(ParleyError::Stream(
                        "Spark connection closed before the answer finished".into(),
                    ));
                }
                Some(Err(error)) => {
                    self.socket = None;
                    return Err(ParleyError::WebSocket(format!("Spark receive failed: {error}")));
                }
            };

            let decoded = match ResponseFrame::parse(&raw).and_then(ResponseFrame::decode) {
                Ok(decoded) => decoded,
                Err(error) => {
                    warn!(error = %error, "Spark frame rejected");
                    self.socket = None;
                    return Err(error);
                }
            };

            if decoded.is_last {
                let usage = decoded.usage.unwrap_or_default();
                self.last_tokens = usage.total_tokens as u64;
                self.total_usage.merge(&usage);
                return Ok(Fragment::last(decoded.content));
            }
            return Ok(Fragment::delta(decoded.content));
        }
    }

    fn close(&mut self) {
        self.socket = None;
    }

    fn tokens_used(&self) -> u64 {
        self.last_tokens
    }
}

async fn connect_spark_socket(host_url: &str, credentials: &Credentials) -> Result<SparkSocket, ParleyError> {
    let url = auth::build_auth_url(host_url, &credentials.api_key, &credentials.api_secret, Utc::now())?;
    connect_async(url.as_str())
        .await
        .map(|(socket, _)| socket)
        .map_err(map_connect_error)
}

fn map_connect_error(error: WsError) -> ParleyError {
    match error {
        WsError::Http(response) => {
            let status = response.status().as_u16();
            let body = response
                .body()
                .as_ref()
                .map(|body| String::from_utf8_lossy(body).into_owned())
                .unwrap_or_default();
            if matches!(status, 401 | 403) {
                ParleyError::Authentication(format!(
                    "Spark handshake rejected with status {status}: {body}"
                ))
            } else {
                ParleyError::api(status, format!("Spark handshake failed with status {status}: {body}"))
            }
        }
        WsError::Io(error) => ParleyError::Io(error),
        WsError::Url(error) => ParleyError::Configuration(format!("Invalid Spark websocket URL: {error}")),
        other => ParleyError::WebSocket(format!("Spark websocket connect failed: {other}")),
    }
}
