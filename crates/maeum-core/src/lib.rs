//! Maeum Core - shared types, errors, wire protocol, and configuration

pub mod config;
pub mod error;
pub mod protocol;
pub mod types;

pub use config::MaeumConfig;
pub use error::{Error, Result};
pub use protocol::{ClientMessage, ServerMessage};
pub use types::{Message, Role, SessionKey, ToolCall, ToolOutcome};
