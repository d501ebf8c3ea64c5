//! index_codebase tool - build or refresh the workspace index

use crate::registry::Tool;
use crate::ToolDeps;
use maeum_core::ToolOutcome;
use maeum_index::WorkspaceIndex;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct IndexCodebaseTool {
    index: Arc<WorkspaceIndex>,
}

impl IndexCodebaseTool {
    pub fn new(deps: &ToolDeps) -> Self {
        Self {
            index: deps.index.clone(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for IndexCodebaseTool {
    fn name(&self) -> &str {
        "index_codebase"
    }

    fn description(&self) -> &str {
        "Rebuild the workspace index. With force=false, unchanged files are \
         reused; force=true re-extracts everything."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "force": {
                    "type": "boolean",
                    "description": "Re-extract even unchanged files (default false)"
                }
            }
        })
    }

    fn example(&self) -> Value {
        json!({ "force": false })
    }

    async fn execute(&self, args: Value) -> ToolOutcome {
        let force = args["force"].as_bool().unwrap_or(false);
        let started = std::time::Instant::now();
        let indexed = self.index.build(force).await;
        ToolOutcome::ok(json!({
            "indexed_files": indexed,
            "forced": force,
            "elapsed_ms": started.elapsed().as_millis() as u64,
        }))
    }
}
