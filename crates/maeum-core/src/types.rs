//! Core types for Maeum

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Session identifier - cheaply cloneable
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct SessionKey(Arc<str>);

impl SessionKey {
    pub fn new(s: impl Into<String>) -> Self {
        Self(Arc::from(s.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SessionKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Message role
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One entry in a session's conversation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self::new(Role::Tool, content)
    }
}

/// A tool invocation proposed by the model, parsed out of the stream.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub input: serde_json::Value,
    /// Byte range in the raw response where the tool block appeared.
    pub source_span: (usize, usize),
}

impl ToolCall {
    pub fn new(name: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            input,
            source_span: (0, 0),
        }
    }
}

/// Uniform result shape returned by every tool.
///
/// Tool-specific fields (`has_more`, `next_offset`, `path`, ...) live inside
/// `payload`; `error` is set exactly when `success` is false.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub success: bool,
    pub payload: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Observations fed back to the model are bounded so one tool cannot
/// flood the context window.
const OBSERVATION_CAP: usize = 8_000;

impl ToolOutcome {
    pub fn ok(payload: serde_json::Value) -> Self {
        Self {
            success: true,
            payload,
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            payload: serde_json::Value::Null,
            error: Some(message.into()),
        }
    }

    /// Schema validation failure, surfaced with the offending field.
    pub fn schema_err(field: &str, detail: impl std::fmt::Display) -> Self {
        Self::err(format!("schema: {} {}", field, detail))
    }

    /// Pull a named field out of the payload, if present.
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.payload.get(name)
    }

    /// Render this outcome as the textual observation appended to the
    /// conversation. Truncated so a single result cannot starve the prompt.
    pub fn to_observation(&self) -> String {
        let rendered = if self.success {
            serde_json::to_string_pretty(&self.payload).unwrap_or_default()
        } else {
            format!(
                "{{\"success\": false, \"error\": {}}}",
                serde_json::Value::String(self.error.clone().unwrap_or_default())
            )
        };
        if rendered.len() > OBSERVATION_CAP {
            let mut cut = OBSERVATION_CAP;
            while !rendered.is_char_boundary(cut) {
                cut -= 1;
            }
            format!(
                "{}\n... [truncated, {} total chars]",
                &rendered[..cut],
                rendered.len()
            )
        } else {
            rendered
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn outcome_observation_truncates() {
        let big = "x".repeat(20_000);
        let outcome = ToolOutcome::ok(json!({ "content": big }));
        let obs = outcome.to_observation();
        assert!(obs.len() < 9_000);
        assert!(obs.contains("[truncated"));
    }

    #[test]
    fn outcome_error_observation() {
        let outcome = ToolOutcome::err("file not found: x.py");
        let obs = outcome.to_observation();
        assert!(obs.contains("\"success\": false"));
        assert!(obs.contains("file not found"));
    }

    #[test]
    fn session_key_round_trip() {
        let key = SessionKey::new("ide-1");
        assert_eq!(key.as_str(), "ide-1");
        assert_eq!(key, SessionKey::from("ide-1"));
    }
}
