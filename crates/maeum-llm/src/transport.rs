//! HTTP transport to the LLM backend with streaming and abort support

use crate::sse::{self, SseBuffer};
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::Serialize;
use std::pin::Pin;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connect failed after {attempts} attempts: {last}")]
    ConnectFailed { attempts: u32, last: String },

    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("timeout after {0:?}")]
    Timeout(Duration),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("cancelled")]
    Cancelled,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// One chat request to the backend.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub coding_mode: bool,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            coding_mode: true,
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system_prompt = Some(system.into());
        self
    }
}

/// How a stream ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamStatus {
    Done,
    Aborted,
    Error,
}

/// Stream of extracted content chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = TransportResult<String>> + Send>>;

#[derive(Clone, Debug)]
pub struct TransportConfig {
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Long generations are expected; reads idle up to this long.
    pub read_idle_timeout: Duration,
    pub max_connect_retries: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:7860".to_string(),
            connect_timeout: Duration::from_secs(10),
            read_idle_timeout: Duration::from_secs(30 * 60),
            max_connect_retries: 3,
        }
    }
}

/// The single abstraction over the LLM backend.
pub struct ClientTransport {
    client: Client,
    config: TransportConfig,
}

impl ClientTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_config(TransportConfig {
            base_url: base_url.into(),
            ..Default::default()
        })
    }

    pub fn with_config(config: TransportConfig) -> Self {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Open a streaming chat. Connection errors retry with linear backoff;
    /// timeouts do not retry.
    pub async fn stream(
        &self,
        mut request: ChatRequest,
        cancel: Option<CancellationToken>,
    ) -> TransportResult<ChunkStream> {
        request.stream = true;
        let url = self.endpoint("/api/chat/stream");

        let mut last_error = String::new();
        let mut response = None;
        for attempt in 1..=self.config.max_connect_retries {
            match self.client.post(&url).json(&request).send().await {
                Ok(r) if r.status().is_success() => {
                    response = Some(r);
                    break;
                }
                Ok(r) => {
                    let status = r.status();
                    let body = r.text().await.unwrap_or_default();
                    return Err(TransportError::RequestFailed(format!(
                        "{}: {}",
                        status, body
                    )));
                }
                Err(e) if e.is_timeout() => {
                    return Err(TransportError::Timeout(self.config.connect_timeout));
                }
                Err(e) => {
                    last_error = e.to_string();
                    warn!("stream connect attempt {} failed: {}", attempt, last_error);
                    if attempt < self.config.max_connect_retries {
                        tokio::time::sleep(Duration::from_millis(500 * attempt as u64)).await;
                    }
                }
            }
        }

        let response = response.ok_or(TransportError::ConnectFailed {
            attempts: self.config.max_connect_retries,
            last: last_error,
        })?;

        debug!("stream opened: {}", url);

        let idle = self.config.read_idle_timeout;
        let bytes_stream = response.bytes_stream();

        let stream = async_stream::stream! {
            let mut buffer = SseBuffer::new();
            tokio::pin!(bytes_stream);

            loop {
                // None marks external cancellation; yields happen outside
                // the select so the stream macro stays simple.
                let next = match &cancel {
                    Some(token) => {
                        tokio::select! {
                            biased;
                            _ = token.cancelled() => None,
                            n = tokio::time::timeout(idle, bytes_stream.next()) => Some(n),
                        }
                    }
                    None => Some(tokio::time::timeout(idle, bytes_stream.next()).await),
                };

                let next = match next {
                    Some(n) => n,
                    None => {
                        yield Err(TransportError::Cancelled);
                        return;
                    }
                };

                let chunk = match next {
                    Ok(Some(Ok(bytes))) => bytes,
                    Ok(Some(Err(e))) => {
                        yield Err(TransportError::StreamError(e.to_string()));
                        return;
                    }
                    Ok(None) => return,
                    Err(_) => {
                        yield Err(TransportError::Timeout(idle));
                        return;
                    }
                };

                for payload in buffer.push(&String::from_utf8_lossy(&chunk)) {
                    if payload == sse::DONE_SENTINEL {
                        return;
                    }
                    yield Ok(sse::extract_chunk(&payload));
                }
            }
        };

        Ok(Box::pin(stream))
    }

    /// Non-streaming completion via `/api/chat`.
    pub async fn generate(&self, mut request: ChatRequest) -> TransportResult<String> {
        request.stream = false;
        let url = self.endpoint("/api/chat");

        let response = self.client.post(&url).json(&request).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::RequestFailed(format!("{}: {}", status, body)));
        }

        let body: serde_json::Value = response.json().await?;
        body.get("response")
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| {
                TransportError::InvalidResponse("missing 'response' field".to_string())
            })
    }

    /// Fire-and-forget abort of the backend's most recent generation.
    pub async fn abort(&self) {
        let url = self.endpoint("/api/extra/abort");
        if let Err(e) = self.client.post(&url).send().await {
            debug!("abort signal failed (ignored): {}", e);
        }
    }

    /// Probe backend liveness: `/api/health`, falling back to a root GET.
    pub async fn health(&self) -> bool {
        let url = self.endpoint("/api/health");
        match self.client.get(&url).send().await {
            Ok(r) if r.status().is_success() => true,
            _ => match self.client.get(&self.config.base_url).send().await {
                Ok(r) => r.status().is_success(),
                Err(_) => false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_request_serializes_minimal() {
        let req = ChatRequest::new("hello");
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["message"], "hello");
        assert_eq!(json["coding_mode"], true);
        assert!(json.get("stream").is_none());
        assert!(json.get("system_prompt").is_none());
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let t = ClientTransport::new("http://127.0.0.1:7860/");
        assert_eq!(t.endpoint("/api/chat"), "http://127.0.0.1:7860/api/chat");
    }
}
