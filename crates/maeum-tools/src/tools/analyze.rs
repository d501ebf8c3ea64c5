//! analyze_code and explain_code - local structural views of one file

use crate::registry::Tool;
use crate::ToolDeps;
use maeum_core::ToolOutcome;
use maeum_index::symbols;
use maeum_txn::TransactionManager;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct AnalyzeCodeTool {
    txn: Arc<TransactionManager>,
}

impl AnalyzeCodeTool {
    pub fn new(deps: &ToolDeps) -> Self {
        Self {
            txn: deps.txn.clone(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for AnalyzeCodeTool {
    fn name(&self) -> &str {
        "analyze_code"
    }

    fn description(&self) -> &str {
        "Structural snapshot of one file: symbol inventory, imports, and \
         line metrics."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "File to analyze"
                }
            },
            "required": ["file_path"]
        })
    }

    fn example(&self) -> Value {
        json!({ "file_path": "src/engine.py" })
    }

    async fn execute(&self, args: Value) -> ToolOutcome {
        let path = args["file_path"].as_str().unwrap_or_default();
        let resolved = match self.txn.resolve(path) {
            Ok(p) => p,
            Err(e) => return ToolOutcome::err(e.to_string()),
        };
        let content = match tokio::fs::read_to_string(&resolved).await {
            Ok(c) => c,
            Err(e) => return ToolOutcome::err(format!("failed to read {}: {}", path, e)),
        };

        let extension = resolved
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let mut total = 0usize;
        let mut blank = 0usize;
        let mut comment = 0usize;
        for line in content.lines() {
            total += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                blank += 1;
            } else if trimmed.starts_with('#') || trimmed.starts_with("//") {
                comment += 1;
            }
        }

        let extraction = symbols::extract(&extension, &content);
        let classes: Vec<Value> = extraction
            .symbols
            .iter()
            .filter(|s| s.kind == maeum_index::SymbolKind::Class)
            .map(|s| json!({ "name": s.name, "line": s.line, "methods": s.methods }))
            .collect();
        let functions: Vec<Value> = extraction
            .symbols
            .iter()
            .filter(|s| s.kind == maeum_index::SymbolKind::Function)
            .map(|s| json!({ "name": s.name, "line": s.line, "args": s.args, "is_async": s.is_async }))
            .collect();
        let constants: Vec<&str> = extraction
            .symbols
            .iter()
            .filter(|s| s.kind == maeum_index::SymbolKind::Constant)
            .map(|s| s.name.as_str())
            .collect();

        ToolOutcome::ok(json!({
            "path": path,
            "metrics": {
                "total_lines": total,
                "code_lines": total - blank - comment,
                "comment_lines": comment,
                "blank_lines": blank,
            },
            "classes": classes,
            "functions": functions,
            "constants": constants,
            "imports": extraction.imports,
        }))
    }
}

pub struct ExplainCodeTool {
    txn: Arc<TransactionManager>,
}

impl ExplainCodeTool {
    pub fn new(deps: &ToolDeps) -> Self {
        Self {
            txn: deps.txn.clone(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for ExplainCodeTool {
    fn name(&self) -> &str {
        "explain_code"
    }

    fn description(&self) -> &str {
        "Extract the skeleton of a file - signatures, class lines, and \
         leading doc lines - as raw material for an explanation."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "File to explain"
                }
            },
            "required": ["file_path"]
        })
    }

    fn example(&self) -> Value {
        json!({ "file_path": "src/engine.py" })
    }

    async fn execute(&self, args: Value) -> ToolOutcome {
        let path = args["file_path"].as_str().unwrap_or_default();
        let resolved = match self.txn.resolve(path) {
            Ok(p) => p,
            Err(e) => return ToolOutcome::err(e.to_string()),
        };
        let content = match tokio::fs::read_to_string(&resolved).await {
            Ok(c) => c,
            Err(e) => return ToolOutcome::err(format!("failed to read {}: {}", path, e)),
        };

        let mut skeleton = Vec::new();
        let mut in_doc = false;
        for (i, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            let is_signature = trimmed.starts_with("def ")
                || trimmed.starts_with("async def ")
                || trimmed.starts_with("class ")
                || trimmed.starts_with("function ")
                || trimmed.starts_with("export ")
                || trimmed.starts_with("fn ")
                || trimmed.starts_with("pub fn ");
            let is_doc = trimmed.starts_with("\"\"\"")
                || trimmed.starts_with("'''")
                || trimmed.starts_with("///")
                || trimmed.starts_with("//!")
                || (i < 5 && trimmed.starts_with('#'));

            if trimmed.starts_with("\"\"\"") || trimmed.starts_with("'''") {
                // One-line docstrings toggle twice.
                let quote = &trimmed[..3];
                let closes_inline = trimmed.len() > 3 && trimmed[3..].contains(quote);
                if !closes_inline {
                    in_doc = !in_doc;
                }
            }

            if is_signature || is_doc || in_doc {
                skeleton.push(format!("{}: {}", i + 1, line));
            }
        }

        ToolOutcome::ok(json!({
            "path": path,
            "skeleton": skeleton.join("\n"),
            "line_count": content.lines().count(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::test_deps;
    use std::fs;

    #[tokio::test]
    async fn analyze_reports_symbols_and_metrics() {
        let (dir, deps) = test_deps().await;
        fs::write(
            dir.join("m.py"),
            "# module\nimport os\n\nLIMIT = 5\n\nclass Engine:\n    def run(self):\n        pass\n",
        )
        .unwrap();

        let tool = AnalyzeCodeTool::new(&deps);
        let out = tool.execute(json!({ "file_path": "m.py" })).await;
        assert!(out.success);
        assert_eq!(out.payload["classes"][0]["name"], "Engine");
        assert_eq!(out.payload["classes"][0]["methods"][0], "run");
        assert_eq!(out.payload["constants"][0], "LIMIT");
        assert_eq!(out.payload["imports"][0], "os");
        assert_eq!(out.payload["metrics"]["comment_lines"], 1);
        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn explain_keeps_signatures_and_docs() {
        let (dir, deps) = test_deps().await;
        fs::write(
            dir.join("m.py"),
            "\"\"\"Module doc.\"\"\"\n\ndef work(x):\n    y = x + 1\n    return y\n",
        )
        .unwrap();

        let tool = ExplainCodeTool::new(&deps);
        let out = tool.execute(json!({ "file_path": "m.py" })).await;
        assert!(out.success);
        let skeleton = out.payload["skeleton"].as_str().unwrap();
        assert!(skeleton.contains("Module doc"));
        assert!(skeleton.contains("def work"));
        assert!(!skeleton.contains("y = x + 1"));
        let _ = fs::remove_dir_all(&dir);
    }
}
