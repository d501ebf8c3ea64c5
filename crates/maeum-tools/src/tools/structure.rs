//! project_structure tool - the workspace tree at a glance

use crate::registry::Tool;
use crate::ToolDeps;
use maeum_core::ToolOutcome;
use maeum_index::tree::render_tree;
use serde_json::{json, Value};
use std::path::PathBuf;

pub struct ProjectStructureTool {
    workspace_root: PathBuf,
}

impl ProjectStructureTool {
    pub fn new(deps: &ToolDeps) -> Self {
        Self {
            workspace_root: deps.workspace_root.clone(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for ProjectStructureTool {
    fn name(&self) -> &str {
        "project_structure"
    }

    fn description(&self) -> &str {
        "Render the workspace directory tree (depth-capped, ignored \
         directories pruned)."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "max_depth": {
                    "type": "integer",
                    "description": "Tree depth (default 3, max 6)"
                }
            }
        })
    }

    fn example(&self) -> Value {
        json!({ "max_depth": 3 })
    }

    async fn execute(&self, args: Value) -> ToolOutcome {
        let max_depth = args["max_depth"].as_u64().unwrap_or(3).min(6) as usize;
        let tree = render_tree(&self.workspace_root, max_depth, 150);
        ToolOutcome::ok(json!({
            "tree": tree,
            "max_depth": max_depth,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::test_deps;
    use std::fs;

    #[tokio::test]
    async fn renders_tree() {
        let (dir, deps) = test_deps().await;
        fs::create_dir_all(dir.join("src")).unwrap();
        fs::write(dir.join("src/app.py"), "").unwrap();

        let tool = ProjectStructureTool::new(&deps);
        let out = tool.execute(json!({})).await;
        assert!(out.success);
        let tree = out.payload["tree"].as_str().unwrap();
        assert!(tree.contains("📁 src/"));
        assert!(tree.contains("📄 app.py"));
        let _ = fs::remove_dir_all(&dir);
    }
}
