//! Symbol extraction for Python and JS/TS sources
//!
//! Python uses an indentation-aware line scanner; JS/TS use regex-level
//! extraction. Both tolerate malformed input - extraction never fails, it
//! just emits fewer symbols.

use crate::node::{Symbol, SymbolKind};
use regex::Regex;
use std::sync::OnceLock;

/// Extraction result for one file.
#[derive(Clone, Debug, Default)]
pub struct Extraction {
    pub symbols: Vec<Symbol>,
    pub imports: Vec<String>,
}

/// Extensions we can extract symbols from.
pub fn supported(extension: &str) -> bool {
    matches!(extension, "py" | "js" | "ts" | "jsx" | "tsx")
}

pub fn extract(extension: &str, content: &str) -> Extraction {
    match extension {
        "py" => extract_python(content),
        "js" | "ts" | "jsx" | "tsx" => extract_javascript(content),
        _ => Extraction::default(),
    }
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Split `def name(a, b=1) -> int:` into (name, args).
fn parse_def(trimmed: &str) -> Option<(String, Vec<String>)> {
    let rest = trimmed.strip_prefix("def ")?;
    let open = rest.find('(')?;
    let name = rest[..open].trim().to_string();
    if name.is_empty() {
        return None;
    }
    let close = rest.rfind(')').unwrap_or(rest.len());
    let args = rest
        .get(open + 1..close)
        .unwrap_or("")
        .split(',')
        .map(|a| a.split(':').next().unwrap_or(a).trim())
        .map(|a| a.split('=').next().unwrap_or(a).trim().to_string())
        .filter(|a| !a.is_empty())
        .collect();
    Some((name, args))
}

fn parse_class(trimmed: &str) -> Option<(String, Vec<String>)> {
    let rest = trimmed.strip_prefix("class ")?;
    let head = rest.split(':').next().unwrap_or(rest).trim();
    if let Some(open) = head.find('(') {
        let name = head[..open].trim().to_string();
        let close = head.rfind(')').unwrap_or(head.len());
        let bases = head
            .get(open + 1..close)
            .unwrap_or("")
            .split(',')
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())
            .collect();
        Some((name, bases))
    } else {
        Some((head.to_string(), Vec::new()))
    }
}

fn extract_python(content: &str) -> Extraction {
    let mut out = Extraction::default();
    let mut pending_decorators: Vec<String> = Vec::new();
    // (symbol index in out.symbols, class body indent threshold)
    let mut open_classes: Vec<(usize, usize)> = Vec::new();

    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let indent = indent_of(line);
        let lineno = i + 1;

        // A statement at or below a class's indent closes that class scope.
        while let Some(&(_, class_indent)) = open_classes.last() {
            if indent <= class_indent {
                open_classes.pop();
            } else {
                break;
            }
        }

        if let Some(deco) = trimmed.strip_prefix('@') {
            let name = deco
                .split('(')
                .next()
                .unwrap_or(deco)
                .trim()
                .to_string();
            pending_decorators.push(name);
            continue;
        }

        if let Some((name, bases)) = parse_class(trimmed) {
            let mut symbol = Symbol::new(name, SymbolKind::Class, lineno);
            symbol.bases = bases;
            symbol.decorators = std::mem::take(&mut pending_decorators);
            out.symbols.push(symbol);
            open_classes.push((out.symbols.len() - 1, indent));
            continue;
        }

        let (is_async, def_line) = match trimmed.strip_prefix("async ") {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        if let Some((name, args)) = parse_def(def_line) {
            if let Some(&(class_idx, _)) = open_classes.last() {
                let method = name.clone();
                out.symbols[class_idx].methods.push(method);
            }
            let mut symbol = Symbol::new(name, SymbolKind::Function, lineno);
            symbol.args = args;
            symbol.is_async = is_async;
            symbol.decorators = std::mem::take(&mut pending_decorators);
            out.symbols.push(symbol);
            continue;
        }
        pending_decorators.clear();

        if trimmed.starts_with("import ") || trimmed.starts_with("from ") {
            let module = trimmed
                .trim_start_matches("from ")
                .trim_start_matches("import ")
                .split_whitespace()
                .next()
                .unwrap_or("")
                .to_string();
            if !module.is_empty() && indent == 0 {
                out.imports.push(module);
            }
            continue;
        }

        // Uppercase top-level assignment → module constant.
        if indent == 0 {
            if let Some(eq) = trimmed.find('=') {
                let lhs = trimmed[..eq].trim().trim_end_matches(':');
                let lhs = lhs.split(':').next().unwrap_or(lhs).trim();
                if !lhs.is_empty()
                    && !trimmed[eq..].starts_with("==")
                    && lhs
                        .chars()
                        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
                    && lhs.chars().any(|c| c.is_ascii_uppercase())
                {
                    out.symbols
                        .push(Symbol::new(lhs, SymbolKind::Constant, lineno));
                }
            }
        }
    }

    out
}

fn js_patterns() -> &'static [Regex; 4] {
    static PATTERNS: OnceLock<[Regex; 4]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"^\s*(?:export\s+)?(?:default\s+)?class\s+([A-Za-z_$][\w$]*)").unwrap(),
            Regex::new(r"^\s*(?:export\s+)?(?:async\s+)?function\s+([A-Za-z_$][\w$]*)").unwrap(),
            Regex::new(
                r"^\s*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*(?:async\s*)?\(",
            )
            .unwrap(),
            Regex::new(r#"^\s*import\s+.*?from\s+['"]([^'"]+)['"]"#).unwrap(),
        ]
    })
}

/// Regex-level extraction. Accepts false positives; never raises.
fn extract_javascript(content: &str) -> Extraction {
    let [class_re, func_re, arrow_re, import_re] = js_patterns();
    let mut out = Extraction::default();

    for (i, line) in content.lines().enumerate() {
        let lineno = i + 1;
        if let Some(caps) = class_re.captures(line) {
            out.symbols
                .push(Symbol::new(&caps[1], SymbolKind::Class, lineno));
        } else if let Some(caps) = func_re.captures(line) {
            let mut symbol = Symbol::new(&caps[1], SymbolKind::Function, lineno);
            symbol.is_async = line.contains("async ");
            out.symbols.push(symbol);
        } else if let Some(caps) = arrow_re.captures(line) {
            let mut symbol = Symbol::new(&caps[1], SymbolKind::Function, lineno);
            symbol.is_async = line.contains("async");
            out.symbols.push(symbol);
        } else if let Some(caps) = import_re.captures(line) {
            out.imports.push(caps[1].to_string());
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const PY: &str = r#"
import os
from pathlib import Path

MAX_RETRIES = 3

@dataclass
class Engine(Base):
    def __init__(self, root):
        self.root = root

    async def run(self, task, timeout=30):
        pass

def helper(a, b):
    return a + b
"#;

    #[test]
    fn python_classes_and_methods() {
        let ex = extract("py", PY);
        let class = ex
            .symbols
            .iter()
            .find(|s| s.kind == SymbolKind::Class)
            .unwrap();
        assert_eq!(class.name, "Engine");
        assert_eq!(class.bases, vec!["Base"]);
        assert_eq!(class.decorators, vec!["dataclass"]);
        assert_eq!(class.methods, vec!["__init__", "run"]);
    }

    #[test]
    fn python_functions_args_async() {
        let ex = extract("py", PY);
        let run = ex.symbols.iter().find(|s| s.name == "run").unwrap();
        assert!(run.is_async);
        assert_eq!(run.args, vec!["self", "task", "timeout"]);
        let helper = ex.symbols.iter().find(|s| s.name == "helper").unwrap();
        assert!(!helper.is_async);
        assert_eq!(helper.args, vec!["a", "b"]);
    }

    #[test]
    fn python_constants_and_imports() {
        let ex = extract("py", PY);
        assert!(ex
            .symbols
            .iter()
            .any(|s| s.name == "MAX_RETRIES" && s.kind == SymbolKind::Constant));
        assert_eq!(ex.imports, vec!["os", "pathlib"]);
    }

    #[test]
    fn python_nested_class_scope_closes() {
        let src = "class A:\n    def m(self):\n        pass\n\ndef top():\n    pass\n";
        let ex = extract("py", src);
        let class = ex.symbols.iter().find(|s| s.name == "A").unwrap();
        assert_eq!(class.methods, vec!["m"]);
    }

    #[test]
    fn javascript_extraction() {
        let src = r#"
import { render } from "react-dom";

export class Widget {}
export async function load(url) {}
const handler = async (event) => {};
"#;
        let ex = extract("ts", src);
        assert!(ex
            .symbols
            .iter()
            .any(|s| s.name == "Widget" && s.kind == SymbolKind::Class));
        assert!(ex.symbols.iter().any(|s| s.name == "load" && s.is_async));
        assert!(ex.symbols.iter().any(|s| s.name == "handler"));
        assert_eq!(ex.imports, vec!["react-dom"]);
    }

    #[test]
    fn malformed_input_never_panics() {
        let _ = extract("py", "def (((\nclass \n@@\nX=");
        let _ = extract("js", "function {{{");
    }
}
