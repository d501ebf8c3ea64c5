//! Symbol query tools - find_symbol, find_definition, find_references

use crate::registry::Tool;
use crate::ToolDeps;
use maeum_core::ToolOutcome;
use maeum_index::{SymbolKind, WorkspaceIndex};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;

fn kind_matches(kind: SymbolKind, filter: Option<&str>) -> bool {
    match filter {
        None => true,
        Some("class") => kind == SymbolKind::Class,
        Some("function") => kind == SymbolKind::Function,
        Some("constant") => kind == SymbolKind::Constant,
        Some("variable") => kind == SymbolKind::Variable,
        Some(_) => true,
    }
}

fn location_json(file: &str, symbol: &maeum_index::Symbol, exact: bool) -> Value {
    json!({
        "name": symbol.name,
        "kind": symbol.kind,
        "file": file,
        "line": symbol.line,
        "exact": exact,
    })
}

pub struct FindSymbolTool {
    index: Arc<WorkspaceIndex>,
}

impl FindSymbolTool {
    pub fn new(deps: &ToolDeps) -> Self {
        Self {
            index: deps.index.clone(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for FindSymbolTool {
    fn name(&self) -> &str {
        "find_symbol"
    }

    fn description(&self) -> &str {
        "Look up classes, functions, and constants by name. Exact-name hits \
         come before partial matches."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "Symbol name or fragment"
                },
                "symbol_type": {
                    "type": "string",
                    "enum": ["class", "function", "constant", "variable"],
                    "description": "Restrict to one kind"
                },
                "exact": {
                    "type": "boolean",
                    "description": "Exact-name matches only (default false)"
                }
            },
            "required": ["name"]
        })
    }

    fn example(&self) -> Value {
        json!({ "name": "Engine", "symbol_type": "class" })
    }

    async fn execute(&self, args: Value) -> ToolOutcome {
        let name = args["name"].as_str().unwrap_or_default();
        let symbol_type = args["symbol_type"].as_str();
        let exact_only = args["exact"].as_bool().unwrap_or(false);

        let mut results: Vec<Value> = Vec::new();
        let mut exact: Vec<_> = self
            .index
            .symbols_named(name)
            .into_iter()
            .filter(|loc| kind_matches(loc.symbol.kind, symbol_type))
            .collect();
        exact.sort_by(|a, b| a.file.cmp(&b.file).then(a.symbol.line.cmp(&b.symbol.line)));
        for loc in &exact {
            results.push(location_json(&loc.file, &loc.symbol, true));
        }

        if !exact_only {
            let mut partial: Vec<_> = self
                .index
                .symbols_matching(name)
                .into_iter()
                .filter(|loc| loc.symbol.name != name)
                .filter(|loc| kind_matches(loc.symbol.kind, symbol_type))
                .collect();
            partial.sort_by(|a, b| a.file.cmp(&b.file).then(a.symbol.line.cmp(&b.symbol.line)));
            for loc in &partial {
                results.push(location_json(&loc.file, &loc.symbol, false));
            }
        }

        ToolOutcome::ok(json!({
            "name": name,
            "count": results.len(),
            "symbols": results,
        }))
    }
}

pub struct FindDefinitionTool {
    index: Arc<WorkspaceIndex>,
}

impl FindDefinitionTool {
    pub fn new(deps: &ToolDeps) -> Self {
        Self {
            index: deps.index.clone(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for FindDefinitionTool {
    fn name(&self) -> &str {
        "find_definition"
    }

    fn description(&self) -> &str {
        "Jump to where a symbol is defined. Classes and functions take \
         precedence over constants."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "symbol_name": {
                    "type": "string",
                    "description": "Exact symbol name"
                }
            },
            "required": ["symbol_name"]
        })
    }

    fn example(&self) -> Value {
        json!({ "symbol_name": "handle_request" })
    }

    async fn execute(&self, args: Value) -> ToolOutcome {
        let name = args["symbol_name"].as_str().unwrap_or_default();
        let mut locations = self.index.symbols_named(name);
        if locations.is_empty() {
            return ToolOutcome::err(format!("no definition found for '{}'", name));
        }
        locations.sort_by_key(|loc| {
            let rank = match loc.symbol.kind {
                SymbolKind::Class => 0,
                SymbolKind::Function => 1,
                SymbolKind::Constant => 2,
                SymbolKind::Variable => 3,
            };
            (rank, loc.file.clone(), loc.symbol.line)
        });
        let best = &locations[0];
        ToolOutcome::ok(json!({
            "name": name,
            "file": best.file,
            "line": best.symbol.line,
            "kind": best.symbol.kind,
            "other_definitions": locations.len() - 1,
        }))
    }
}

pub struct FindReferencesTool {
    index: Arc<WorkspaceIndex>,
    workspace_root: PathBuf,
}

impl FindReferencesTool {
    pub fn new(deps: &ToolDeps) -> Self {
        Self {
            index: deps.index.clone(),
            workspace_root: deps.workspace_root.clone(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for FindReferencesTool {
    fn name(&self) -> &str {
        "find_references"
    }

    fn description(&self) -> &str {
        "Find every place a symbol name appears (word-boundary match), \
         flagging its definition sites."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "symbol_name": {
                    "type": "string",
                    "description": "Symbol to trace"
                },
                "definition_file": {
                    "type": "string",
                    "description": "Known definition file, to flag it in results"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Cap on references (default 100)"
                }
            },
            "required": ["symbol_name"]
        })
    }

    fn example(&self) -> Value {
        json!({ "symbol_name": "process" })
    }

    async fn execute(&self, args: Value) -> ToolOutcome {
        let name = args["symbol_name"].as_str().unwrap_or_default();
        let max_results = args["max_results"].as_u64().unwrap_or(100) as usize;
        let definition_file = args["definition_file"].as_str();

        let pattern = format!(r"\b{}\b", regex::escape(name));
        let regex = match regex::Regex::new(&pattern) {
            Ok(r) => r,
            Err(e) => return ToolOutcome::err(format!("invalid symbol name: {}", e)),
        };

        let definition_lines: Vec<(String, usize)> = self
            .index
            .symbols_named(name)
            .into_iter()
            .map(|loc| (loc.file, loc.symbol.line))
            .collect();

        let mut nodes = self.index.nodes();
        nodes.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

        let mut references = Vec::new();
        let mut truncated = false;
        'files: for node in nodes {
            let content =
                match std::fs::read_to_string(self.workspace_root.join(&node.relative_path)) {
                    Ok(c) => c,
                    Err(_) => continue,
                };
            for (i, line) in content.lines().enumerate() {
                if !regex.is_match(line) {
                    continue;
                }
                if references.len() >= max_results {
                    truncated = true;
                    break 'files;
                }
                let lineno = i + 1;
                let is_definition = definition_lines
                    .iter()
                    .any(|(f, l)| f == &node.relative_path && *l == lineno)
                    || definition_file == Some(node.relative_path.as_str());
                references.push(json!({
                    "file": node.relative_path,
                    "line": lineno,
                    "content": line.trim_end(),
                    "is_definition": is_definition,
                }));
            }
        }

        ToolOutcome::ok(json!({
            "symbol": name,
            "count": references.len(),
            "references": references,
            "truncated": truncated,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::test_deps;
    use std::fs;

    async fn fixture() -> (PathBuf, ToolDeps) {
        let (dir, deps) = test_deps().await;
        fs::write(
            dir.join("lib.py"),
            "def process(x):\n    return x\n\nVALUE = process(1)\n",
        )
        .unwrap();
        fs::write(dir.join("use.py"), "from lib import process\nprocess(2)\n").unwrap();
        deps.index.build(true).await;
        (dir, deps)
    }

    #[tokio::test]
    async fn find_symbol_exact_before_partial() {
        let (dir, deps) = fixture().await;
        fs::write(dir.join("extra.py"), "def process_all():\n    pass\n").unwrap();
        deps.index.build(true).await;

        let tool = FindSymbolTool::new(&deps);
        let out = tool.execute(json!({ "name": "process" })).await;
        assert!(out.success);
        let symbols = out.payload["symbols"].as_array().unwrap();
        assert!(symbols.len() >= 2);
        assert_eq!(symbols[0]["exact"], true);
        assert_eq!(symbols.last().unwrap()["name"], "process_all");
        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn two_definitions_both_returned_in_order() {
        let (dir, deps) = test_deps().await;
        fs::write(dir.join("a.py"), "def x():\n    pass\n").unwrap();
        fs::write(dir.join("b.py"), "x = 1\ndef x():\n    pass\n").unwrap();
        deps.index.build(true).await;

        let tool = FindSymbolTool::new(&deps);
        let out = tool.execute(json!({ "name": "x", "exact": true })).await;
        let symbols = out.payload["symbols"].as_array().unwrap();
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[0]["file"], "a.py");
        assert_eq!(symbols[1]["file"], "b.py");
        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn definition_prefers_function_over_use() {
        let (dir, deps) = fixture().await;
        let tool = FindDefinitionTool::new(&deps);
        let out = tool.execute(json!({ "symbol_name": "process" })).await;
        assert!(out.success);
        assert_eq!(out.payload["file"], "lib.py");
        assert_eq!(out.payload["line"], 1);
        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn references_flag_definition_site() {
        let (dir, deps) = fixture().await;
        let tool = FindReferencesTool::new(&deps);
        let out = tool.execute(json!({ "symbol_name": "process" })).await;
        assert!(out.success);
        let refs = out.payload["references"].as_array().unwrap();
        assert!(refs.len() >= 3);
        let def = refs
            .iter()
            .find(|r| r["file"] == "lib.py" && r["line"] == 1)
            .unwrap();
        assert_eq!(def["is_definition"], true);
        let _ = fs::remove_dir_all(&dir);
    }
}
