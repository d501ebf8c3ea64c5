//! glob tool - shell-style pattern matching over indexed paths

use crate::registry::Tool;
use crate::ToolDeps;
use maeum_core::ToolOutcome;
use maeum_index::WorkspaceIndex;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub struct GlobTool {
    index: Arc<WorkspaceIndex>,
}

impl GlobTool {
    pub fn new(deps: &ToolDeps) -> Self {
        Self {
            index: deps.index.clone(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &str {
        "glob"
    }

    fn description(&self) -> &str {
        "Find files whose name or relative path matches a glob pattern \
         (e.g. '**/*.py', 'src/*.ts'). Higher-priority files come first."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Glob pattern"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Cap on returned paths (default 100)"
                }
            },
            "required": ["pattern"]
        })
    }

    fn example(&self) -> Value {
        json!({ "pattern": "**/*.py" })
    }

    async fn execute(&self, args: Value) -> ToolOutcome {
        let pattern = args["pattern"].as_str().unwrap_or_default();
        let max_results = args["max_results"].as_u64().unwrap_or(100) as usize;

        let matcher = match globset::GlobBuilder::new(pattern)
            .literal_separator(false)
            .build()
        {
            Ok(g) => g.compile_matcher(),
            Err(e) => return ToolOutcome::err(format!("invalid glob pattern: {}", e)),
        };

        let mut nodes: Vec<_> = self
            .index
            .nodes()
            .into_iter()
            .filter(|n| {
                let name = n.relative_path.rsplit('/').next().unwrap_or("");
                matcher.is_match(name) || matcher.is_match(&n.relative_path)
            })
            .collect();
        nodes.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.relative_path.cmp(&b.relative_path))
        });

        let truncated = nodes.len() > max_results;
        let files: Vec<String> = nodes
            .into_iter()
            .take(max_results)
            .map(|n| n.relative_path)
            .collect();

        debug!("glob: '{}' -> {} files", pattern, files.len());
        ToolOutcome::ok(json!({
            "pattern": pattern,
            "count": files.len(),
            "files": files,
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
    async fn matches_names_and_paths() {
        let (dir, deps) = test_deps().await;
        fs::create_dir_all(dir.join("src")).unwrap();
        fs::write(dir.join("main.py"), "").unwrap();
        fs::write(dir.join("src/util.py"), "").unwrap();
        fs::write(dir.join("notes.md"), "").unwrap();
        deps.index.build(true).await;

        let tool = GlobTool::new(&deps);
        let out = tool.execute(json!({ "pattern": "*.py" })).await;
        assert!(out.success);
        assert_eq!(out.payload["count"], 2);
        // Entry point ranks first.
        assert_eq!(out.payload["files"][0], "main.py");
        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn invalid_pattern_is_error() {
        let (dir, deps) = test_deps().await;
        let tool = GlobTool::new(&deps);
        let out = tool.execute(json!({ "pattern": "a[" })).await;
        assert!(!out.success);
        let _ = fs::remove_dir_all(&dir);
    }
}
