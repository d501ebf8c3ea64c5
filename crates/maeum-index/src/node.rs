//! File nodes - classification, priority, and the symbol model

use serde::{Deserialize, Serialize};

/// Role a file plays in the workspace.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Source,
    Config,
    Doc,
    Test,
    Data,
    Other,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Class,
    Function,
    Constant,
    Variable,
}

/// One extracted code entity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub line: usize,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub decorators: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub is_async: bool,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub bases: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub methods: Vec<String>,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, line: usize) -> Self {
        Self {
            name: name.into(),
            kind,
            line,
            args: Vec::new(),
            decorators: Vec::new(),
            is_async: false,
            bases: Vec::new(),
            methods: Vec::new(),
        }
    }
}

/// One entry in the workspace index.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileNode {
    pub relative_path: String,
    pub extension: String,
    pub size: u64,
    /// Seconds since the epoch; used for change detection on reindex.
    pub modified: u64,
    pub kind: FileKind,
    /// Higher surfaces first in search results.
    pub priority: i32,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub symbols: Vec<Symbol>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub imports: Vec<String>,
}

const SOURCE_EXTENSIONS: &[&str] = &[
    "py", "js", "ts", "jsx", "tsx", "rs", "go", "java", "c", "cpp", "h", "hpp", "rb", "php",
    "swift", "kt", "scala", "sh", "lua",
];

const DATA_EXTENSIONS: &[&str] = &["csv", "tsv", "sqlite", "db", "parquet", "jsonl", "ndjson"];

const CONFIG_MARKERS: &[&str] = &[
    "config", "settings", ".toml", ".yaml", ".yml", ".ini", ".cfg", ".env", "dockerfile",
    "makefile", "package.json", "pyproject", "cargo.toml", "tsconfig",
];

/// Entry-point file names that rank highest in search.
const ENTRY_POINTS: &[&str] = &[
    "main.py", "app.py", "server.py", "run.py", "manage.py", "index.js", "index.ts", "main.js",
    "main.ts", "app.js", "app.ts", "main.rs", "lib.rs", "main.go",
];

/// Heuristic classification on the relative path.
pub fn classify(relative_path: &str) -> FileKind {
    let lower = relative_path.to_lowercase();
    let name = lower.rsplit('/').next().unwrap_or(&lower);
    let ext = name.rsplit('.').next().unwrap_or("");

    if lower.contains("test") || lower.contains("spec") {
        return FileKind::Test;
    }
    if CONFIG_MARKERS.iter().any(|m| lower.contains(m)) {
        return FileKind::Config;
    }
    if name.starts_with("readme") || ext == "md" || ext == "rst" {
        return FileKind::Doc;
    }
    if DATA_EXTENSIONS.contains(&ext) {
        return FileKind::Data;
    }
    if SOURCE_EXTENSIONS.contains(&ext) {
        return FileKind::Source;
    }
    FileKind::Other
}

/// Table-driven priority: entry points > `__init__.py` > root-level files >
/// `src/`/`lib/` paths > everything else.
pub fn priority(relative_path: &str) -> i32 {
    let name = relative_path.rsplit('/').next().unwrap_or(relative_path);
    if ENTRY_POINTS.contains(&name.to_lowercase().as_str()) {
        return 100;
    }
    if name == "__init__.py" {
        return 80;
    }
    if !relative_path.contains('/') {
        return 60;
    }
    if relative_path.starts_with("src/") || relative_path.starts_with("lib/") {
        return 40;
    }
    10
}
