//! list_dir tool - one directory level with sizes

use crate::registry::Tool;
use crate::ToolDeps;
use maeum_core::ToolOutcome;
use maeum_index::walker::is_ignored_dir;
use maeum_txn::TransactionManager;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct ListDirTool {
    txn: Arc<TransactionManager>,
}

impl ListDirTool {
    pub fn new(deps: &ToolDeps) -> Self {
        Self {
            txn: deps.txn.clone(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "List one directory level: names, kinds, and sizes. Ignored \
         directories (node_modules, .git, ...) are elided."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to list (default: workspace root)"
                }
            }
        })
    }

    fn example(&self) -> Value {
        json!({ "path": "src" })
    }

    async fn execute(&self, args: Value) -> ToolOutcome {
        let rel = args["path"].as_str().unwrap_or(".");
        let resolved = match self.txn.resolve(rel) {
            Ok(p) => p,
            Err(e) => return ToolOutcome::err(e.to_string()),
        };

        let read_dir = match std::fs::read_dir(&resolved) {
            Ok(rd) => rd,
            Err(e) => return ToolOutcome::err(format!("failed to list {}: {}", rel, e)),
        };

        let mut entries = Vec::new();
        for entry in read_dir.filter_map(|e| e.ok()) {
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if name.starts_with('.') || (is_dir && is_ignored_dir(&name)) {
                continue;
            }
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            entries.push((is_dir, name, size));
        }
        entries.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.to_lowercase().cmp(&b.1.to_lowercase())));

        let listed: Vec<Value> = entries
            .into_iter()
            .map(|(is_dir, name, size)| {
                json!({
                    "name": name,
                    "is_directory": is_dir,
                    "size": if is_dir { Value::Null } else { json!(size) },
                })
            })
            .collect();

        ToolOutcome::ok(json!({
            "path": rel,
            "count": listed.len(),
            "entries": listed,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::test_deps;
    use std::fs;

    #[tokio::test]
    async fn lists_dirs_first_and_elides_ignored() {
        let (dir, deps) = test_deps().await;
        fs::create_dir_all(dir.join("src")).unwrap();
        fs::create_dir_all(dir.join("node_modules")).unwrap();
        fs::write(dir.join("a.txt"), "x").unwrap();

        let tool = ListDirTool::new(&deps);
        let out = tool.execute(json!({})).await;
        assert!(out.success);
        assert_eq!(out.payload["count"], 2);
        assert_eq!(out.payload["entries"][0]["name"], "src");
        assert_eq!(out.payload["entries"][1]["name"], "a.txt");
        let _ = fs::remove_dir_all(&dir);
    }
}
