//! Maeum Index - precomputed workspace index for search tools
//!
//! Walks the workspace once, classifies files by role and priority, extracts
//! code symbols for supported languages, and answers glob/regex/symbol
//! queries without touching the filesystem per call.

pub mod node;
pub mod search;
pub mod symbols;
pub mod tree;
pub mod walker;

pub use node::{FileKind, FileNode, Symbol, SymbolKind};
pub use search::{SearchEngine, SearchMatch, SearchMode, SearchQuery, SearchResponse};
pub use walker::{SymbolLocation, WorkspaceIndex};
