//! grep tool - regex search with structured per-match context

use crate::registry::Tool;
use crate::ToolDeps;
use maeum_core::ToolOutcome;
use maeum_index::WorkspaceIndex;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

pub struct GrepTool {
    workspace_root: PathBuf,
    index: Arc<WorkspaceIndex>,
}

impl GrepTool {
    pub fn new(deps: &ToolDeps) -> Self {
        Self {
            workspace_root: deps.workspace_root.clone(),
            index: deps.index.clone(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for GrepTool {
    fn name(&self) -> &str {
        "grep"
    }

    fn description(&self) -> &str {
        "Regex search over indexed files. Returns matches with file, line, \
         column, and optional context lines. Matches come back in file order."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Regex pattern to search for"
                },
                "path": {
                    "type": "string",
                    "description": "Restrict to a subtree (workspace-relative)"
                },
                "file_pattern": {
                    "type": "string",
                    "description": "Glob filter on file names (e.g. '*.py')"
                },
                "case_sensitive": {
                    "type": "boolean",
                    "description": "Default false"
                },
                "whole_word": {
                    "type": "boolean",
                    "description": "Wrap the pattern in word boundaries"
                },
                "context_lines": {
                    "type": "integer",
                    "description": "Lines of context around each match"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Cap on returned matches (default 50)"
                }
            },
            "required": ["pattern"]
        })
    }

    fn example(&self) -> Value {
        json!({ "pattern": "def handle_\\w+", "file_pattern": "*.py" })
    }

    async fn execute(&self, args: Value) -> ToolOutcome {
        let pattern = args["pattern"].as_str().unwrap_or_default();
        let case_sensitive = args["case_sensitive"].as_bool().unwrap_or(false);
        let whole_word = args["whole_word"].as_bool().unwrap_or(false);
        let context_lines = args["context_lines"].as_u64().unwrap_or(0) as usize;
        let max_results = args["max_results"].as_u64().unwrap_or(50) as usize;
        let path_prefix = args["path"].as_str().map(|p| p.trim_matches('/').to_string());

        let mut compiled = if whole_word {
            format!(r"\b(?:{})\b", pattern)
        } else {
            pattern.to_string()
        };
        if !case_sensitive {
            compiled = format!("(?i){}", compiled);
        }
        let regex = match regex::Regex::new(&compiled) {
            Ok(r) => r,
            Err(e) => return ToolOutcome::err(format!("invalid regex: {}", e)),
        };

        let glob = args["file_pattern"].as_str().and_then(|g| {
            globset::GlobBuilder::new(g)
                .literal_separator(false)
                .build()
                .ok()
                .map(|g| g.compile_matcher())
        });

        // File order keeps results deterministic and matches truncation
        // semantics: the first max_results matches in path order.
        let mut nodes = self.index.nodes();
        nodes.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

        let mut matches = Vec::new();
        let mut truncated = false;

        'files: for node in nodes {
            if let Some(prefix) = &path_prefix {
                if node.relative_path != *prefix
                    && !node.relative_path.starts_with(&format!("{}/", prefix))
                {
                    continue;
                }
            }
            if let Some(glob) = &glob {
                let name = node.relative_path.rsplit('/').next().unwrap_or("");
                if !glob.is_match(name) && !glob.is_match(&node.relative_path) {
                    continue;
                }
            }

            let full = self.workspace_root.join(&node.relative_path);
            let content = match std::fs::read_to_string(&full) {
                Ok(c) => c,
                Err(_) => continue,
            };
            let lines: Vec<&str> = content.lines().collect();

            for (i, line) in lines.iter().enumerate() {
                let found = match regex.find(line) {
                    Some(m) => m,
                    None => continue,
                };
                if matches.len() >= max_results {
                    truncated = true;
                    break 'files;
                }
                let start = i.saturating_sub(context_lines);
                let end = (i + context_lines + 1).min(lines.len());
                matches.push(json!({
                    "file": node.relative_path,
                    "line": i + 1,
                    "column": found.start() + 1,
                    "content": line,
                    "before_context": &lines[start..i],
                    "after_context": &lines[i + 1..end],
                    "match_text": found.as_str(),
                }));
            }
        }

        debug!("grep: '{}' -> {} matches", pattern, matches.len());
        ToolOutcome::ok(json!({
            "pattern": pattern,
            "count": matches.len(),
            "matches": matches,
            "truncated": truncated,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::test_deps;
    use std::fs;

    #[tokio::test]
    async fn finds_matches_with_context() {
        let (dir, deps) = test_deps().await;
        fs::write(dir.join("a.py"), "before\ntarget here\nafter\n").unwrap();
        deps.index.build(true).await;

        let tool = GrepTool::new(&deps);
        let out = tool
            .execute(json!({ "pattern": "target", "context_lines": 1 }))
            .await;
        assert!(out.success);
        assert_eq!(out.payload["count"], 1);
        let m = &out.payload["matches"][0];
        assert_eq!(m["line"], 2);
        assert_eq!(m["column"], 1);
        assert_eq!(m["before_context"][0], "before");
        assert_eq!(m["after_context"][0], "after");
        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn max_results_truncates_in_file_order() {
        let (dir, deps) = test_deps().await;
        let body: String = (0..1000).map(|i| format!("match line {}\n", i)).collect();
        fs::write(dir.join("big.txt"), &body).unwrap();
        deps.index.build(true).await;

        let tool = GrepTool::new(&deps);
        let out = tool
            .execute(json!({ "pattern": "match", "max_results": 50 }))
            .await;
        assert!(out.success);
        assert_eq!(out.payload["count"], 50);
        assert_eq!(out.payload["truncated"], true);
        // First 50 in file order: lines 1..=50.
        assert_eq!(out.payload["matches"][0]["line"], 1);
        assert_eq!(out.payload["matches"][49]["line"], 50);
        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn whole_word_and_case() {
        let (dir, deps) = test_deps().await;
        fs::write(dir.join("w.txt"), "cat catalog Cat\n").unwrap();
        deps.index.build(true).await;

        let tool = GrepTool::new(&deps);
        let out = tool
            .execute(json!({ "pattern": "cat", "whole_word": true }))
            .await;
        // Case-insensitive by default: "cat" and "Cat", not "catalog".
        assert_eq!(out.payload["count"], 1);
        assert_eq!(out.payload["matches"][0]["match_text"], "cat");

        let out = tool
            .execute(json!({ "pattern": "Cat", "whole_word": true, "case_sensitive": true }))
            .await;
        assert_eq!(out.payload["matches"][0]["match_text"], "Cat");
        let _ = fs::remove_dir_all(&dir);
    }
}
