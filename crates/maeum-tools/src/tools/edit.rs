//! edit_file tool - exact-text replacement or line-range replacement

use crate::registry::{Tool, ToolKind};
use crate::ToolDeps;
use maeum_core::ToolOutcome;
use maeum_txn::TransactionManager;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub struct EditFileTool {
    txn: Arc<TransactionManager>,
}

impl EditFileTool {
    pub fn new(deps: &ToolDeps) -> Self {
        Self {
            txn: deps.txn.clone(),
        }
    }

    /// Replace the line range [start_line, end_line) with new_content.
    fn splice_range(
        content: &str,
        start_line: usize,
        end_line: usize,
        new_content: &str,
    ) -> Result<String, String> {
        let lines: Vec<&str> = content.lines().collect();
        let total = lines.len();
        if start_line < 1 || start_line > end_line || end_line > total + 1 {
            return Err(format!(
                "invalid range {}..{} for a {}-line file",
                start_line, end_line, total
            ));
        }

        let mut out: Vec<String> = lines[..start_line - 1]
            .iter()
            .map(|l| l.to_string())
            .collect();
        out.extend(new_content.split('\n').map(String::from));
        out.extend(lines[(end_line - 1).min(total)..].iter().map(|l| l.to_string()));

        let mut result = out.join("\n");
        if content.ends_with('\n') {
            result.push('\n');
        }
        Ok(result)
    }
}

#[async_trait::async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Edit a file. Text mode: old_text must occur exactly once and is \
         replaced with new_text. Range mode: lines [start_line, end_line) are \
         replaced with new_content. Always read the file first."
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
                    "description": "Workspace-relative path to edit"
                },
                "old_text": {
                    "type": "string",
                    "description": "Exact text to replace (text mode)"
                },
                "new_text": {
                    "type": "string",
                    "description": "Replacement text (text mode)"
                },
                "start_line": {
                    "type": "integer",
                    "description": "First line to replace, 1-based (range mode)"
                },
                "end_line": {
                    "type": "integer",
                    "description": "Line after the last replaced one (range mode)"
                },
                "new_content": {
                    "type": "string",
                    "description": "Replacement lines (range mode)"
                }
            },
            "required": ["file_path"]
        })
    }

    fn example(&self) -> Value {
        json!({
            "file_path": "src/app.py",
            "old_text": "return None",
            "new_text": "return result"
        })
    }

    async fn execute(&self, args: Value) -> ToolOutcome {
        let path = args["file_path"].as_str().unwrap_or_default();

        let text_mode = args["old_text"].is_string() && args["new_text"].is_string();
        let range_mode = args["start_line"].is_u64()
            && args["end_line"].is_u64()
            && args["new_content"].is_string();

        if !text_mode && !range_mode {
            return ToolOutcome::err(
                "edit_file needs either old_text+new_text or start_line+end_line+new_content",
            );
        }

        if let Err(e) = self.txn.begin(format!("edit_file {}", path)) {
            return ToolOutcome::err(e.to_string());
        }

        let staged = if text_mode {
            let old = args["old_text"].as_str().unwrap_or_default();
            let new = args["new_text"].as_str().unwrap_or_default();
            self.txn
                .stage_edit(path, old, new, false)
                .map(|_| "text_replace")
                .map_err(|e| e.to_string())
        } else {
            let start = args["start_line"].as_u64().unwrap_or(1) as usize;
            let end = args["end_line"].as_u64().unwrap_or(1) as usize;
            let new_content = args["new_content"].as_str().unwrap_or_default();
            let resolved = self.txn.resolve(path).map_err(|e| e.to_string());
            match resolved {
                Ok(resolved) => match std::fs::read_to_string(&resolved) {
                    Ok(current) => {
                        match Self::splice_range(&current, start, end, new_content) {
                            Ok(next) => self
                                .txn
                                .stage_write(path, &next)
                                .map(|_| "range_replace")
                                .map_err(|e| e.to_string()),
                            Err(e) => Err(e),
                        }
                    }
                    Err(e) => Err(format!("failed to read {}: {}", path, e)),
                },
                Err(e) => Err(e),
            }
        };

        let edit_type = match staged {
            Ok(t) => t,
            Err(e) => {
                let _ = self.txn.rollback();
                return ToolOutcome::err(e);
            }
        };

        let txn = match self.txn.commit(false) {
            Ok(t) => t,
            Err(e) => return ToolOutcome::err(e.to_string()),
        };

        debug!("edit_file: {} ({})", path, edit_type);
        ToolOutcome::ok(json!({
            "path": path,
            "edit_type": edit_type,
            "changes": txn.changes.len(),
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
    async fn text_mode_unique_replacement() {
        let (dir, deps) = test_deps().await;
        fs::write(dir.join("foo.py"), "print(\"hi\")\n").unwrap();

        let tool = EditFileTool::new(&deps);
        let out = tool
            .execute(json!({
                "file_path": "foo.py",
                "old_text": "hi",
                "new_text": "hello"
            }))
            .await;
        assert!(out.success);
        assert_eq!(out.payload["edit_type"], "text_replace");
        assert_eq!(out.payload["changes"], 1);
        assert_eq!(
            fs::read_to_string(dir.join("foo.py")).unwrap(),
            "print(\"hello\")\n"
        );
        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn text_mode_rejects_ambiguity_and_absence() {
        let (dir, deps) = test_deps().await;
        fs::write(dir.join("f.txt"), "a a b\n").unwrap();

        let tool = EditFileTool::new(&deps);
        let out = tool
            .execute(json!({ "file_path": "f.txt", "old_text": "a", "new_text": "z" }))
            .await;
        assert!(!out.success);
        assert!(out.error.unwrap().contains("2 times"));

        let out = tool
            .execute(json!({ "file_path": "f.txt", "old_text": "zz", "new_text": "q" }))
            .await;
        assert!(!out.success);
        assert!(out.error.unwrap().contains("not found"));
        // File untouched, nothing on the undo stack.
        assert_eq!(fs::read_to_string(dir.join("f.txt")).unwrap(), "a a b\n");
        assert_eq!(deps.txn.undo_depth(), 0);
        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn edit_there_and_back_restores() {
        let (dir, deps) = test_deps().await;
        fs::write(dir.join("f.txt"), "alpha beta\n").unwrap();

        let tool = EditFileTool::new(&deps);
        tool.execute(json!({ "file_path": "f.txt", "old_text": "alpha", "new_text": "omega" }))
            .await;
        tool.execute(json!({ "file_path": "f.txt", "old_text": "omega", "new_text": "alpha" }))
            .await;
        assert_eq!(
            fs::read_to_string(dir.join("f.txt")).unwrap(),
            "alpha beta\n"
        );
        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn range_mode_replaces_half_open_span() {
        let (dir, deps) = test_deps().await;
        fs::write(dir.join("f.txt"), "one\ntwo\nthree\nfour\n").unwrap();

        let tool = EditFileTool::new(&deps);
        let out = tool
            .execute(json!({
                "file_path": "f.txt",
                "start_line": 2,
                "end_line": 4,
                "new_content": "TWO\nTHREE"
            }))
            .await;
        assert!(out.success);
        assert_eq!(out.payload["edit_type"], "range_replace");
        assert_eq!(
            fs::read_to_string(dir.join("f.txt")).unwrap(),
            "one\nTWO\nTHREE\nfour\n"
        );
        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn range_mode_rejects_invalid_ranges() {
        let (dir, deps) = test_deps().await;
        fs::write(dir.join("f.txt"), "one\ntwo\n").unwrap();

        let tool = EditFileTool::new(&deps);
        for (start, end) in [(0, 1), (3, 2), (1, 9)] {
            let out = tool
                .execute(json!({
                    "file_path": "f.txt",
                    "start_line": start,
                    "end_line": end,
                    "new_content": "x"
                }))
                .await;
            assert!(!out.success, "range {}..{} should fail", start, end);
        }
        let _ = fs::remove_dir_all(&dir);
    }
}
