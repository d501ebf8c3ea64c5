//! Tool trait, classification, and registry
//!
//! Each tool is a self-contained module implementing the Tool trait. The
//! executor is a dispatch lookup followed by schema validation and handler
//! invocation; every path returns a ToolOutcome, never a panic upward.

use crate::schema;
use maeum_core::ToolOutcome;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Confirmation policy class of a tool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolKind {
    /// Executes immediately; counts against the exploration budget.
    ReadOnly,
    /// Requires user confirmation before execution.
    Destructive,
    /// Never executes locally; drives a question round-trip to the user.
    Interactive,
}

/// The Tool trait - implement this to add a new capability.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name (e.g. "read_file", "bash").
    fn name(&self) -> &str;

    /// Human-readable description shown in the tool catalog.
    fn description(&self) -> &str;

    fn kind(&self) -> ToolKind {
        ToolKind::ReadOnly
    }

    /// JSON Schema for input parameters.
    fn input_schema(&self) -> Value;

    /// Canonical invocation example rendered into the prompt catalog.
    fn example(&self) -> Value;

    /// Execute the tool with validated arguments.
    async fn execute(&self, args: Value) -> ToolOutcome;

    /// Execute with cancellation support. Tools that manage child processes
    /// should override this to kill the process on cancellation.
    async fn execute_cancellable(&self, args: Value, cancel: CancellationToken) -> ToolOutcome {
        tokio::select! {
            result = self.execute(args) => result,
            _ = cancel.cancelled() => ToolOutcome::err("cancelled"),
        }
    }
}

/// One entry of the static tool catalog sent to the model.
#[derive(Clone, Debug)]
pub struct CatalogEntry {
    pub name: String,
    pub description: String,
    pub kind: ToolKind,
    pub example: Value,
}

pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    /// Catalog order is stable so the prompt is deterministic per build.
    order: Vec<String>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        if !self.tools.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn kind_of(&self, name: &str) -> Option<ToolKind> {
        self.tools.get(name).map(|t| t.kind())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Validate input against the tool's schema and dispatch. Total: every
    /// failure mode comes back as an unsuccessful ToolOutcome.
    pub async fn execute(&self, name: &str, args: Value) -> ToolOutcome {
        self.execute_cancellable(name, args, CancellationToken::new())
            .await
    }

    pub async fn execute_cancellable(
        &self,
        name: &str,
        args: Value,
        cancel: CancellationToken,
    ) -> ToolOutcome {
        let tool = match self.tools.get(name) {
            Some(t) => t,
            None => return ToolOutcome::err(format!("tool not found: {}", name)),
        };
        if let Err(e) = schema::validate(&args, &tool.input_schema()) {
            return ToolOutcome::err(format!("schema: {}", e));
        }
        tool.execute_cancellable(args, cancel).await
    }

    /// Catalog in registration order.
    pub fn catalog(&self) -> Vec<CatalogEntry> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| CatalogEntry {
                name: t.name().to_string(),
                description: t.description().to_string(),
                kind: t.kind(),
                example: t.example(),
            })
            .collect()
    }

    pub fn list(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }

    pub fn list_read_only(&self) -> Vec<&str> {
        self.order
            .iter()
            .filter(|n| {
                self.tools
                    .get(*n)
                    .map(|t| t.kind() == ToolKind::ReadOnly)
                    .unwrap_or(false)
            })
            .map(|s| s.as_str())
            .collect()
    }
}
