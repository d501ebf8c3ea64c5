//! ask_user tool - a question routed to the user, not executed locally

use crate::registry::{Tool, ToolKind};
use maeum_core::ToolOutcome;
use serde_json::{json, Value};

/// The loop intercepts this tool before dispatch and suspends until the UI
/// delivers an answer. The execute body only exists so the registry stays
/// total if it is ever invoked directly.
pub struct AskUserTool;

impl AskUserTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AskUserTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Tool for AskUserTool {
    fn name(&self) -> &str {
        "ask_user"
    }

    fn description(&self) -> &str {
        "Ask the user a question and wait for their answer. Use options for \
         multiple choice."
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Interactive
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "The question to ask"
                },
                "options": {
                    "type": "array",
                    "description": "Optional multiple-choice answers"
                },
                "default": {
                    "type": "string",
                    "description": "Default answer if the user just confirms"
                }
            },
            "required": ["question"]
        })
    }

    fn example(&self) -> Value {
        json!({
            "question": "Should I also update the tests?",
            "options": ["yes", "no"]
        })
    }

    async fn execute(&self, args: Value) -> ToolOutcome {
        ToolOutcome::ok(json!({
            "type": "user_input_required",
            "question": args["question"].as_str().unwrap_or_default(),
            "options": args["options"].as_array().cloned().unwrap_or_default(),
            "default": args["default"].as_str(),
        }))
    }
}
