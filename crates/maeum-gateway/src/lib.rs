//! Maeum Gateway - localhost HTTP + WebSocket surface for the IDE
//!
//! Glue layer only: file CRUD, search, chat, undo/redo, and tool
//! confirmation all delegate to the engine crates.

pub mod files;
pub mod server;
pub mod ws;

pub use server::{build_state, router, AppState};
