//! WebSocket wire protocol for the `/ws/chat` endpoint
//!
//! Client → Server:
//!   { "type": "chat", "message": "...", "currentFile": {...}, "openTabs": [...] }
//!   { "type": "cancel" }
//!   { "type": "tool_confirm", "confirmation_id": "...", "approved": true }
//!
//! Server → Client: token / tool_detected / tool_executing / tool_result /
//! file_modified / tool_confirm_request / waiting_confirmation / done / error /
//! cancelled / system / question / open_in_editor.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Advisory editor context sent with a chat message.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileHint {
    pub path: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub total_lines: Option<usize>,
    #[serde(default)]
    pub cursor_line: Option<usize>,
}

/// Client-to-server messages.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "chat")]
    Chat {
        message: String,
        #[serde(default)]
        context: Option<String>,
        #[serde(default, rename = "currentFile")]
        current_file: Option<FileHint>,
        #[serde(default, rename = "openTabs")]
        open_tabs: Option<Vec<String>>,
    },

    #[serde(rename = "cancel")]
    Cancel,

    #[serde(rename = "tool_confirm")]
    ToolConfirm {
        confirmation_id: String,
        approved: bool,
    },
}

/// Server-to-client messages.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Prose fragment forwarded from the model stream.
    #[serde(rename = "token")]
    Token { content: String },

    /// The interceptor extracted a tool block mid-stream.
    #[serde(rename = "tool_detected")]
    ToolDetected { tool_name: String, tool_input: Value },

    #[serde(rename = "tool_executing")]
    ToolExecuting {
        tool_name: String,
        tool_input: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        exploration_count: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max_exploration: Option<usize>,
    },

    /// Hint for the editor to open a file the agent is working on.
    #[serde(rename = "open_in_editor")]
    OpenInEditor {
        file_path: String,
        tool_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        line: Option<usize>,
    },

    #[serde(rename = "tool_result")]
    ToolResult {
        tool_name: String,
        result: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        file_path: Option<String>,
    },

    /// Hint for the editor to reload a file changed on disk.
    #[serde(rename = "file_modified")]
    FileModified { file_path: String, action: String },

    #[serde(rename = "tool_confirm_request")]
    ToolConfirmRequest {
        confirmation_id: String,
        tool_name: String,
        tool_input: Value,
        description: String,
    },

    #[serde(rename = "waiting_confirmation")]
    WaitingConfirmation { confirmation_id: String },

    /// The model asked the user a question (ask_user tool).
    #[serde(rename = "question")]
    Question {
        confirmation_id: String,
        question: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        options: Option<Vec<String>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        default: Option<String>,
    },

    /// Terminal message for the turn.
    #[serde(rename = "done")]
    Done { content: String },

    #[serde(rename = "error")]
    Error { content: String },

    #[serde(rename = "cancelled")]
    Cancelled { content: String },

    #[serde(rename = "system")]
    System { content: String },
}

impl ServerMessage {
    pub fn token(content: impl Into<String>) -> Self {
        Self::Token {
            content: content.into(),
        }
    }

    pub fn done(content: impl Into<String>) -> Self {
        Self::Done {
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::Error {
            content: content.into(),
        }
    }

    pub fn cancelled(content: impl Into<String>) -> Self {
        Self::Cancelled {
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn file_modified(path: impl Into<String>, action: impl Into<String>) -> Self {
        Self::FileModified {
            file_path: path.into(),
            action: action.into(),
        }
    }
}
