//! Error types for Maeum

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("schema: {0}")]
    Schema(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("ambiguous edit: {0}")]
    Ambiguous(String),

    #[error("safety block: {0}")]
    SafetyBlock(String),

    #[error("timeout after {seconds}s: {what}")]
    Timeout { what: String, seconds: u64 },

    #[error("backend error: {0}")]
    Backend(String),

    #[error("transaction failed: {0}")]
    Transaction(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("cancelled")]
    Cancelled,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn schema(detail: impl Into<String>) -> Self {
        Self::Schema(detail.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn safety(reason: impl Into<String>) -> Self {
        Self::SafetyBlock(reason.into())
    }

    pub fn timeout(what: impl Into<String>, seconds: u64) -> Self {
        Self::Timeout {
            what: what.into(),
            seconds,
        }
    }
}
