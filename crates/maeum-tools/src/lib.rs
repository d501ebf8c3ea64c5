//! Maeum Tools - the capability surface the model drives
//!
//! Each tool is a self-contained file in src/tools/. To add a tool: create
//! the file, implement the Tool trait, register it in
//! create_default_registry().

pub mod registry;
pub mod schema;
pub mod tools;

pub use registry::{CatalogEntry, Tool, ToolKind, ToolRegistry};

use maeum_index::{SearchEngine, WorkspaceIndex};
use maeum_llm::ClientTransport;
use maeum_txn::TransactionManager;
use std::path::PathBuf;
use std::sync::Arc;

/// Shared collaborators injected into the tools at construction.
#[derive(Clone)]
pub struct ToolDeps {
    pub workspace_root: PathBuf,
    pub index: Arc<WorkspaceIndex>,
    pub engine: Arc<SearchEngine>,
    pub txn: Arc<TransactionManager>,
    pub transport: Arc<ClientTransport>,
}

/// Create the default registry with the full builtin tool set.
pub fn create_default_registry(deps: &ToolDeps) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    // --- Files (read-only) ---
    registry.register(tools::read::ReadFileTool::new(deps));
    registry.register(tools::list_dir::ListDirTool::new(deps));
    registry.register(tools::structure::ProjectStructureTool::new(deps));

    // --- Search (read-only) ---
    registry.register(tools::search::SearchCodeTool::new(deps));
    registry.register(tools::grep::GrepTool::new(deps));
    registry.register(tools::glob::GlobTool::new(deps));
    registry.register(tools::search::FindFilesByContentTool::new(deps));
    registry.register(tools::index::IndexCodebaseTool::new(deps));

    // --- Symbols (read-only) ---
    registry.register(tools::symbols::FindSymbolTool::new(deps));
    registry.register(tools::symbols::FindDefinitionTool::new(deps));
    registry.register(tools::symbols::FindReferencesTool::new(deps));
    registry.register(tools::analyze::AnalyzeCodeTool::new(deps));
    registry.register(tools::analyze::ExplainCodeTool::new(deps));

    // --- Git (read-only + commit) ---
    registry.register(tools::git::GitStatusTool::new(deps));
    registry.register(tools::git::GitDiffTool::new(deps));
    registry.register(tools::git::GitLogTool::new(deps));
    registry.register(tools::git::GitCommitTool::new(deps));

    // --- Mutation (destructive, confirmation-gated) ---
    registry.register(tools::write::WriteFileTool::new(deps));
    registry.register(tools::edit::EditFileTool::new(deps));
    registry.register(tools::multi_edit::MultiEditTool::new(deps));
    registry.register(tools::bash::BashTool::new(deps));

    // --- Planning artifacts ---
    registry.register(tools::memory::ReadProjectMemoryTool::new(deps));
    registry.register(tools::memory::UpdateProjectMemoryTool::new(deps));
    registry.register(tools::memory::TodoWriteTool::new(deps));
    registry.register(tools::memory::PlanTaskTool::new(deps));

    // --- Web (best-effort) ---
    registry.register(tools::web::WebSearchTool::new(deps));
    registry.register(tools::web::WebFetchTool::new(deps));

    // --- Interactive ---
    registry.register(tools::ask::AskUserTool::new());

    registry
}
