//! search_code and find_files_by_content - index-backed ranked search

use crate::registry::Tool;
use crate::ToolDeps;
use maeum_core::ToolOutcome;
use maeum_index::{SearchEngine, SearchMode, SearchQuery};
use serde_json::{json, Value};
use std::sync::Arc;

fn parse_mode(raw: Option<&str>) -> SearchMode {
    match raw.unwrap_or("exact") {
        "fuzzy" => SearchMode::Fuzzy,
        "regex" => SearchMode::Regex,
        "semantic" => SearchMode::Semantic,
        "symbol" => SearchMode::Symbol,
        _ => SearchMode::Exact,
    }
}

pub struct SearchCodeTool {
    engine: Arc<SearchEngine>,
}

impl SearchCodeTool {
    pub fn new(deps: &ToolDeps) -> Self {
        Self {
            engine: deps.engine.clone(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for SearchCodeTool {
    fn name(&self) -> &str {
        "search_code"
    }

    fn description(&self) -> &str {
        "Ranked search over the workspace. Modes: exact, fuzzy, regex, \
         semantic, symbol. High-priority files (entry points, roots) surface \
         first."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to search for"
                },
                "mode": {
                    "type": "string",
                    "enum": ["exact", "fuzzy", "regex", "semantic", "symbol"],
                    "description": "Search mode (default exact)"
                },
                "file_pattern": {
                    "type": "string",
                    "description": "Glob filter on files"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Cap on matches (default 50)"
                },
                "context_lines": {
                    "type": "integer",
                    "description": "Context lines around each match"
                },
                "case_sensitive": {
                    "type": "boolean"
                },
                "whole_word": {
                    "type": "boolean"
                },
                "include_hidden": {
                    "type": "boolean"
                }
            },
            "required": ["query"]
        })
    }

    fn example(&self) -> Value {
        json!({ "query": "handle_request", "mode": "symbol" })
    }

    async fn execute(&self, args: Value) -> ToolOutcome {
        let mut query = SearchQuery::new(
            args["query"].as_str().unwrap_or_default(),
            parse_mode(args["mode"].as_str()),
        );
        query.file_pattern = args["file_pattern"].as_str().map(String::from);
        if let Some(max) = args["max_results"].as_u64() {
            query.max_results = max as usize;
        }
        query.context_lines = args["context_lines"].as_u64().unwrap_or(0) as usize;
        query.case_sensitive = args["case_sensitive"].as_bool().unwrap_or(false);
        query.whole_word = args["whole_word"].as_bool().unwrap_or(false);
        query.include_hidden = args["include_hidden"].as_bool().unwrap_or(false);

        let response = self.engine.search(query).await;
        ToolOutcome::ok(json!({
            "query": response.query,
            "mode": response.mode,
            "count": response.matches.len(),
            "matches": response.matches,
            "truncated": response.truncated,
        }))
    }
}

pub struct FindFilesByContentTool {
    engine: Arc<SearchEngine>,
}

impl FindFilesByContentTool {
    pub fn new(deps: &ToolDeps) -> Self {
        Self {
            engine: deps.engine.clone(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for FindFilesByContentTool {
    fn name(&self) -> &str {
        "find_files_by_content"
    }

    fn description(&self) -> &str {
        "List the files containing a text or regex pattern, without the \
         per-line detail of grep."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Text to look for"
                },
                "regex": {
                    "type": "boolean",
                    "description": "Treat query as a regex (default false)"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Cap on files (default 50)"
                }
            },
            "required": ["query"]
        })
    }

    fn example(&self) -> Value {
        json!({ "query": "TODO" })
    }

    async fn execute(&self, args: Value) -> ToolOutcome {
        let mode = if args["regex"].as_bool().unwrap_or(false) {
            SearchMode::Regex
        } else {
            SearchMode::Exact
        };
        let max_files = args["max_results"].as_u64().unwrap_or(50) as usize;

        let mut query = SearchQuery::new(args["query"].as_str().unwrap_or_default(), mode);
        // Over-fetch matches so distinct files survive deduplication.
        query.max_results = max_files.saturating_mul(8).max(200);

        let response = self.engine.search(query).await;
        let mut files: Vec<String> = Vec::new();
        for m in &response.matches {
            if !files.contains(&m.file) {
                files.push(m.file.clone());
            }
            if files.len() >= max_files {
                break;
            }
        }

        ToolOutcome::ok(json!({
            "query": response.query,
            "count": files.len(),
            "files": files,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::test_deps;
    use std::fs;

    #[tokio::test]
    async fn search_code_symbol_mode() {
        let (dir, deps) = test_deps().await;
        fs::write(dir.join("m.py"), "def compute(x):\n    return x\n").unwrap();
        deps.index.build(true).await;

        let tool = SearchCodeTool::new(&deps);
        let out = tool
            .execute(json!({ "query": "compute", "mode": "symbol" }))
            .await;
        assert!(out.success);
        assert_eq!(out.payload["count"], 1);
        assert_eq!(out.payload["matches"][0]["file"], "m.py");
        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn find_files_deduplicates() {
        let (dir, deps) = test_deps().await;
        fs::write(dir.join("a.py"), "needle\nneedle\nneedle\n").unwrap();
        fs::write(dir.join("b.py"), "needle\n").unwrap();
        deps.index.build(true).await;

        let tool = FindFilesByContentTool::new(&deps);
        let out = tool.execute(json!({ "query": "needle" })).await;
        assert!(out.success);
        assert_eq!(out.payload["count"], 2);
        let _ = fs::remove_dir_all(&dir);
    }
}
