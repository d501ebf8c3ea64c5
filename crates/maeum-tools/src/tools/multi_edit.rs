//! multi_edit tool - a batch of text edits in one transaction

use crate::registry::{Tool, ToolKind};
use crate::ToolDeps;
use maeum_core::ToolOutcome;
use maeum_txn::TransactionManager;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub struct MultiEditTool {
    txn: Arc<TransactionManager>,
}

impl MultiEditTool {
    pub fn new(deps: &ToolDeps) -> Self {
        Self {
            txn: deps.txn.clone(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for MultiEditTool {
    fn name(&self) -> &str {
        "multi_edit"
    }

    fn description(&self) -> &str {
        "Apply several exact-text edits as one transaction. All edits succeed \
         or none are applied; a single undo reverts the whole batch."
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Destructive
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "edits": {
                    "type": "array",
                    "description": "List of {file_path, old_text, new_text}"
                },
                "description": {
                    "type": "string",
                    "description": "What this batch accomplishes"
                }
            },
            "required": ["edits", "description"]
        })
    }

    fn example(&self) -> Value {
        json!({
            "edits": [
                { "file_path": "src/a.py", "old_text": "old_name", "new_text": "new_name" },
                { "file_path": "src/b.py", "old_text": "old_name", "new_text": "new_name" }
            ],
            "description": "Rename old_name to new_name"
        })
    }

    async fn execute(&self, args: Value) -> ToolOutcome {
        let description = args["description"].as_str().unwrap_or("multi_edit");
        let edits = match args["edits"].as_array() {
            Some(e) if !e.is_empty() => e,
            _ => return ToolOutcome::err("edits must be a non-empty array"),
        };

        if let Err(e) = self.txn.begin(description) {
            return ToolOutcome::err(e.to_string());
        }

        for (i, edit) in edits.iter().enumerate() {
            let path = edit["file_path"].as_str().unwrap_or_default();
            let old = edit["old_text"].as_str().unwrap_or_default();
            let new = edit["new_text"].as_str().unwrap_or_default();
            if path.is_empty() || old.is_empty() {
                let _ = self.txn.rollback();
                return ToolOutcome::err(format!(
                    "edit {} is missing file_path or old_text",
                    i + 1
                ));
            }
            if let Err(e) = self.txn.stage_edit(path, old, new, false) {
                let _ = self.txn.rollback();
                return ToolOutcome::err(format!("edit {} ({}): {}", i + 1, path, e));
            }
        }

        let txn = match self.txn.commit(false) {
            Ok(t) => t,
            Err(e) => return ToolOutcome::err(e.to_string()),
        };

        debug!("multi_edit: {} edits applied", txn.changes.len());
        let files: Vec<&str> = txn.changes.iter().map(|c| c.file_path.as_str()).collect();
        ToolOutcome::ok(json!({
            "applied": txn.changes.len(),
            "files": files,
            "transaction_id": txn.id,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::test_deps;
    use std::fs;

    #[tokio::test]
    async fn batch_applies_atomically() {
        let (dir, deps) = test_deps().await;
        fs::write(dir.join("a.py"), "use(old)\n").unwrap();
        fs::write(dir.join("b.py"), "call(old)\n").unwrap();

        let tool = MultiEditTool::new(&deps);
        let out = tool
            .execute(json!({
                "edits": [
                    { "file_path": "a.py", "old_text": "old", "new_text": "new" },
                    { "file_path": "b.py", "old_text": "old", "new_text": "new" }
                ],
                "description": "rename"
            }))
            .await;
        assert!(out.success);
        assert_eq!(out.payload["applied"], 2);

        // One undo reverts both files.
        deps.txn.undo().unwrap();
        assert_eq!(fs::read_to_string(dir.join("a.py")).unwrap(), "use(old)\n");
        assert_eq!(fs::read_to_string(dir.join("b.py")).unwrap(), "call(old)\n");
        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn one_bad_edit_rolls_back_everything() {
        let (dir, deps) = test_deps().await;
        fs::write(dir.join("a.py"), "use(old)\n").unwrap();

        let tool = MultiEditTool::new(&deps);
        let out = tool
            .execute(json!({
                "edits": [
                    { "file_path": "a.py", "old_text": "old", "new_text": "new" },
                    { "file_path": "a.py", "old_text": "absent", "new_text": "x" }
                ],
                "description": "partial"
            }))
            .await;
        assert!(!out.success);
        assert_eq!(fs::read_to_string(dir.join("a.py")).unwrap(), "use(old)\n");
        assert_eq!(deps.txn.undo_depth(), 0);
        let _ = fs::remove_dir_all(&dir);
    }
}
