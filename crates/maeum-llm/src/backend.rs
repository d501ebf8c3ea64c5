//! Backend trait - the seam the agent loop talks through
//!
//! Production uses SmartClient over the HTTP transport; tests drive the loop
//! with a scripted implementation.

use crate::smart::SmartClient;
use crate::transport::{ChatRequest, ChunkStream, TransportResult};
use tokio_util::sync::CancellationToken;

#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    /// Stream a chat completion as extracted content chunks.
    async fn chat(
        &self,
        request: ChatRequest,
        cancel: Option<CancellationToken>,
    ) -> TransportResult<ChunkStream>;

    /// One-shot non-streaming completion.
    async fn generate(&self, request: ChatRequest) -> TransportResult<String>;

    /// Signal the backend to abandon its in-flight generation.
    async fn abort(&self);

    async fn health(&self) -> bool {
        true
    }
}

#[async_trait::async_trait]
impl ChatBackend for SmartClient {
    async fn chat(
        &self,
        request: ChatRequest,
        cancel: Option<CancellationToken>,
    ) -> TransportResult<ChunkStream> {
        SmartClient::chat(self, request, cancel).await
    }

    async fn generate(&self, request: ChatRequest) -> TransportResult<String> {
        self.transport().generate(request).await
    }

    async fn abort(&self) {
        self.transport().abort().await;
    }

    async fn health(&self) -> bool {
        self.transport().health().await
    }
}
