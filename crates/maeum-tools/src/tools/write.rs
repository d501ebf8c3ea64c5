//! write_file tool - create or overwrite a file inside a transaction

use crate::registry::{Tool, ToolKind};
use crate::ToolDeps;
use maeum_core::ToolOutcome;
use maeum_txn::{Operation, TransactionManager};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub struct WriteFileTool {
    txn: Arc<TransactionManager>,
}

impl WriteFileTool {
    pub fn new(deps: &ToolDeps) -> Self {
        Self {
            txn: deps.txn.clone(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file. Creates parent directories as needed; \
         overwrites if the file exists. Prefer edit_file for modifications."
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Destructive
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Workspace-relative path to write"
                },
                "content": {
                    "type": "string",
                    "description": "Full file content"
                }
            },
            "required": ["file_path", "content"]
        })
    }

    fn example(&self) -> Value {
        json!({ "file_path": "src/new_module.py", "content": "def main():\n    pass\n" })
    }

    async fn execute(&self, args: Value) -> ToolOutcome {
        let path = args["file_path"].as_str().unwrap_or_default();
        let content = args["content"].as_str().unwrap_or_default();

        if let Err(e) = self.txn.begin(format!("write_file {}", path)) {
            return ToolOutcome::err(e.to_string());
        }
        let operation = match self.txn.stage_write(path, content) {
            Ok(op) => op,
            Err(e) => {
                let _ = self.txn.rollback();
                return ToolOutcome::err(e.to_string());
            }
        };
        let txn = match self.txn.commit(false) {
            Ok(t) => t,
            Err(e) => return ToolOutcome::err(e.to_string()),
        };

        let action = match operation {
            Operation::Create => "created",
            _ => "overwritten",
        };
        debug!("write_file: {} ({}, {} bytes)", path, action, content.len());
        ToolOutcome::ok(json!({
            "path": path,
            "action": action,
            "bytes": content.len(),
            "transaction_id": txn.id,
        }))
    }
}
