//! Maeum LLM - one narrow surface over the local LLM backend
//!
//! The backend speaks plain text over SSE: `POST /api/chat/stream` yields
//! `data: <chunk>` events terminated by `data: [DONE]`; `POST /api/chat` is
//! the non-streaming fallback; `POST /api/extra/abort` cancels the in-flight
//! generation. No native tool-use protocol — tool blocks are detected in the
//! prose stream by the agent layer.

pub mod backend;
pub mod sse;
pub mod smart;
pub mod transport;

pub use backend::ChatBackend;
pub use smart::SmartClient;
pub use transport::{
    ChatRequest, ChunkStream, ClientTransport, StreamStatus, TransportConfig, TransportError,
    TransportResult,
};
