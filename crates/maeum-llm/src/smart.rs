//! SmartClient - automatic streaming → non-streaming downgrade
//!
//! The first failed streaming probe flips the client into generate-only mode
//! for the rest of the session; the decision is cached, not retried per call.

use crate::transport::{ChatRequest, ChunkStream, ClientTransport, TransportError, TransportResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub struct SmartClient {
    transport: Arc<ClientTransport>,
    streaming_disabled: AtomicBool,
}

impl SmartClient {
    pub fn new(transport: Arc<ClientTransport>) -> Self {
        Self {
            transport,
            streaming_disabled: AtomicBool::new(false),
        }
    }

    pub fn transport(&self) -> &Arc<ClientTransport> {
        &self.transport
    }

    pub fn streaming_enabled(&self) -> bool {
        !self.streaming_disabled.load(Ordering::Relaxed)
    }

    /// Stream when the backend supports it; otherwise wrap a one-shot
    /// `generate` result as a single-chunk stream.
    pub async fn chat(
        &self,
        request: ChatRequest,
        cancel: Option<CancellationToken>,
    ) -> TransportResult<ChunkStream> {
        if self.streaming_enabled() {
            match self.transport.stream(request.clone(), cancel).await {
                Ok(stream) => return Ok(stream),
                Err(TransportError::ConnectFailed { last, .. }) => {
                    warn!("streaming probe failed ({}), downgrading to generate", last);
                    self.streaming_disabled.store(true, Ordering::Relaxed);
                }
                Err(e) => return Err(e),
            }
        }

        let content = self.transport.generate(request).await?;
        let stream = async_stream::stream! {
            yield Ok(content);
        };
        Ok(Box::pin(stream))
    }
}
