//! Runtime configuration with environment overrides

use std::path::PathBuf;

/// Process-wide configuration assembled at startup.
#[derive(Clone, Debug)]
pub struct MaeumConfig {
    /// Port the IDE surface binds to (localhost only).
    pub port: u16,
    /// Root directory the assistant is restricted to.
    pub workspace_root: PathBuf,
    /// Base URL of the LLM backend.
    pub backend_url: String,
    /// Model name passed through to the backend, if it wants one.
    pub model: Option<String>,
    /// Hard cap on loop iterations per user turn.
    pub max_iterations: usize,
    /// Per-turn cap on read-only tool invocations.
    pub max_exploration: usize,
    /// Estimated-token threshold that triggers context compression.
    pub compression_threshold: usize,
}

impl Default for MaeumConfig {
    fn default() -> Self {
        Self {
            port: 8765,
            workspace_root: std::env::current_dir().unwrap_or_default(),
            backend_url: "http://127.0.0.1:7860".to_string(),
            model: None,
            max_iterations: 99,
            max_exploration: 20,
            compression_threshold: 30_000,
        }
    }
}

impl MaeumConfig {
    /// Apply `MAEUM_*` environment variables on top of the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(port) = std::env::var("MAEUM_PORT") {
            if let Ok(p) = port.parse() {
                config.port = p;
            }
        }
        if let Ok(ws) = std::env::var("MAEUM_WORKSPACE") {
            config.workspace_root = PathBuf::from(ws);
        }
        if let Ok(url) = std::env::var("MAEUM_BACKEND_URL") {
            config.backend_url = url;
        }
        if let Ok(model) = std::env::var("MAEUM_MODEL") {
            config.model = Some(model);
        }
        config
    }
}
