//! read_file tool - numbered slices of a file with continuation hints

use crate::registry::Tool;
use crate::ToolDeps;
use maeum_core::ToolOutcome;
use maeum_txn::TransactionManager;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// Character budget for one read when no explicit end_line is given.
const READ_CHAR_CAP: usize = 30_000;

pub struct ReadFileTool {
    txn: Arc<TransactionManager>,
}

impl ReadFileTool {
    pub fn new(deps: &ToolDeps) -> Self {
        Self {
            txn: deps.txn.clone(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a file as numbered lines. Reads up to 30000 characters from \
         start_line; pass end_line for an exact range. When has_more is true, \
         continue with start_line = next_offset."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Workspace-relative path to read"
                },
                "start_line": {
                    "type": "integer",
                    "description": "1-based line to start from (default 1)"
                },
                "end_line": {
                    "type": "integer",
                    "description": "Last line of an exact range (ignores the character cap)"
                },
                "offset": {
                    "type": "integer",
                    "description": "Alias for start_line"
                }
            },
            "required": ["file_path"]
        })
    }

    fn example(&self) -> Value {
        json!({ "file_path": "src/main.py", "start_line": 1 })
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

        let lines: Vec<&str> = content.lines().collect();
        let total_lines = lines.len();
        let total_chars = content.chars().count();

        let start = args["start_line"]
            .as_u64()
            .or_else(|| args["offset"].as_u64())
            .unwrap_or(1)
            .max(1) as usize;
        let end_line = args["end_line"].as_u64().map(|e| e as usize);

        if total_lines == 0 {
            return ToolOutcome::ok(json!({
                "path": path,
                "content": "",
                "total_lines": 0,
                "total_chars": total_chars,
                "showing": "0-0",
                "has_more": false,
            }));
        }
        if start > total_lines {
            return ToolOutcome::err(format!(
                "start_line {} is past the end of {} ({} lines)",
                start, path, total_lines
            ));
        }

        // Explicit ranges are exact; otherwise accumulate lines under the
        // character budget, always including at least one.
        let last = match end_line {
            Some(end) => end.clamp(start, total_lines),
            None => {
                let mut budget = READ_CHAR_CAP;
                let mut last = start;
                for (i, line) in lines.iter().enumerate().skip(start - 1) {
                    let cost = line.chars().count() + 1;
                    if cost > budget && i + 1 > start {
                        break;
                    }
                    budget = budget.saturating_sub(cost);
                    last = i + 1;
                }
                last
            }
        };

        let numbered: Vec<String> = lines[start - 1..last]
            .iter()
            .enumerate()
            .map(|(i, line)| format!("{}: {}", start + i, line))
            .collect();

        let has_more = last < total_lines;
        debug!("read_file: {} lines {}-{} of {}", path, start, last, total_lines);

        let mut payload = json!({
            "path": path,
            "content": numbered.join("\n"),
            "total_lines": total_lines,
            "total_chars": total_chars,
            "showing": format!("{}-{}", start, last),
            "has_more": has_more,
        });
        if has_more {
            payload["next_offset"] = json!(last + 1);
            payload["hint"] = json!(format!(
                "CONTINUE: call read_file with start_line={} for the next slice",
                last + 1
            ));
        }
        ToolOutcome::ok(payload)
    }
}
