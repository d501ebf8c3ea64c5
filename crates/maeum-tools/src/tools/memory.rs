//! Planning artifacts - MAEUM.md project memory, todos, and task plans
//!
//! All three live as plain, user-editable files in the workspace root:
//! `MAEUM.md`, `.maeum_todos.json`, `.maeum_plan.json`.

use crate::registry::{Tool, ToolKind};
use crate::ToolDeps;
use chrono::Local;
use maeum_core::ToolOutcome;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::debug;

pub const MEMORY_FILE: &str = "MAEUM.md";
pub const TODOS_FILE: &str = ".maeum_todos.json";
pub const PLAN_FILE: &str = ".maeum_plan.json";

const SECTIONS: &[(&str, &str)] = &[
    ("architecture", "## Architecture"),
    ("patterns", "## Patterns"),
    ("rules", "## Rules"),
    ("context", "## Context"),
    ("decisions", "## Decisions"),
];

fn memory_template() -> String {
    let mut out = String::from("# Project Memory\n");
    for (_, header) in SECTIONS {
        out.push('\n');
        out.push_str(header);
        out.push('\n');
    }
    out
}

pub struct ReadProjectMemoryTool {
    workspace_root: PathBuf,
}

impl ReadProjectMemoryTool {
    pub fn new(deps: &ToolDeps) -> Self {
        Self {
            workspace_root: deps.workspace_root.clone(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for ReadProjectMemoryTool {
    fn name(&self) -> &str {
        "read_project_memory"
    }

    fn description(&self) -> &str {
        "Read MAEUM.md, the persistent project memory (architecture notes, \
         patterns, rules, decisions)."
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    fn example(&self) -> Value {
        json!({})
    }

    async fn execute(&self, _args: Value) -> ToolOutcome {
        let path = self.workspace_root.join(MEMORY_FILE);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => ToolOutcome::ok(json!({
                "exists": true,
                "content": content,
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ToolOutcome::ok(json!({
                "exists": false,
                "content": "",
            })),
            Err(e) => ToolOutcome::err(format!("failed to read {}: {}", MEMORY_FILE, e)),
        }
    }
}

pub struct UpdateProjectMemoryTool {
    workspace_root: PathBuf,
}

impl UpdateProjectMemoryTool {
    pub fn new(deps: &ToolDeps) -> Self {
        Self {
            workspace_root: deps.workspace_root.clone(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for UpdateProjectMemoryTool {
    fn name(&self) -> &str {
        "update_project_memory"
    }

    fn description(&self) -> &str {
        "Append a timestamped note under one section of MAEUM.md \
         (architecture, patterns, rules, context, decisions)."
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Destructive
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "section": {
                    "type": "string",
                    "enum": ["architecture", "patterns", "rules", "context", "decisions"],
                    "description": "Which section to append to"
                },
                "content": {
                    "type": "string",
                    "description": "The note to record"
                }
            },
            "required": ["section", "content"]
        })
    }

    fn example(&self) -> Value {
        json!({ "section": "decisions", "content": "Use sqlite for the cache layer" })
    }

    async fn execute(&self, args: Value) -> ToolOutcome {
        let section = args["section"].as_str().unwrap_or_default();
        let content = args["content"].as_str().unwrap_or_default();
        let header = match SECTIONS.iter().find(|(k, _)| *k == section) {
            Some((_, h)) => *h,
            None => return ToolOutcome::err(format!("unknown section: {}", section)),
        };

        let path = self.workspace_root.join(MEMORY_FILE);
        let mut memory = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => memory_template(),
            Err(e) => return ToolOutcome::err(format!("failed to read {}: {}", MEMORY_FILE, e)),
        };

        let bullet = format!(
            "- [{}] {}",
            Local::now().format("%Y-%m-%d %H:%M"),
            content.trim()
        );

        // Insert at the end of the section: right before the next header, or
        // at EOF for the last section.
        let section_start = match memory.find(header) {
            Some(pos) => pos,
            None => {
                memory.push('\n');
                memory.push_str(header);
                memory.push('\n');
                memory.find(header).unwrap_or(memory.len())
            }
        };
        let after_header = section_start + header.len();
        let insert_at = memory[after_header..]
            .find("\n## ")
            .map(|rel| after_header + rel)
            .unwrap_or(memory.len());

        let mut insertion = String::new();
        if !memory[..insert_at].ends_with('\n') {
            insertion.push('\n');
        }
        insertion.push_str(&bullet);
        insertion.push('\n');
        memory.insert_str(insert_at, &insertion);

        if let Err(e) = tokio::fs::write(&path, &memory).await {
            return ToolOutcome::err(format!("failed to write {}: {}", MEMORY_FILE, e));
        }
        debug!("project memory updated: {}", section);
        ToolOutcome::ok(json!({
            "path": MEMORY_FILE,
            "section": section,
            "appended": bullet,
        }))
    }
}

pub struct TodoWriteTool {
    workspace_root: PathBuf,
}

impl TodoWriteTool {
    pub fn new(deps: &ToolDeps) -> Self {
        Self {
            workspace_root: deps.workspace_root.clone(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for TodoWriteTool {
    fn name(&self) -> &str {
        "todo_write"
    }

    fn description(&self) -> &str {
        "Replace the task list persisted in .maeum_todos.json. Each todo is \
         {content, status, priority}."
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Destructive
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "todos": {
                    "type": "array",
                    "description": "Items: {content, status: pending|in_progress|completed, priority: high|medium|low}"
                }
            },
            "required": ["todos"]
        })
    }

    fn example(&self) -> Value {
        json!({
            "todos": [
                { "content": "Fix the failing test", "status": "in_progress", "priority": "high" }
            ]
        })
    }

    async fn execute(&self, args: Value) -> ToolOutcome {
        let todos = match args["todos"].as_array() {
            Some(t) => t,
            None => return ToolOutcome::err("todos must be an array"),
        };

        let mut normalized = Vec::new();
        for (i, todo) in todos.iter().enumerate() {
            let content = match todo["content"].as_str() {
                Some(c) if !c.trim().is_empty() => c.trim(),
                _ => return ToolOutcome::err(format!("todo {} is missing content", i + 1)),
            };
            let status = todo["status"].as_str().unwrap_or("pending");
            if !["pending", "in_progress", "completed"].contains(&status) {
                return ToolOutcome::err(format!("todo {} has invalid status '{}'", i + 1, status));
            }
            let priority = todo["priority"].as_str().unwrap_or("medium");
            if !["high", "medium", "low"].contains(&priority) {
                return ToolOutcome::err(format!(
                    "todo {} has invalid priority '{}'",
                    i + 1,
                    priority
                ));
            }
            normalized.push(json!({
                "content": content,
                "status": status,
                "priority": priority,
            }));
        }

        let path = self.workspace_root.join(TODOS_FILE);
        let body = serde_json::to_string_pretty(&normalized).unwrap_or_default();
        if let Err(e) = tokio::fs::write(&path, body).await {
            return ToolOutcome::err(format!("failed to write {}: {}", TODOS_FILE, e));
        }
        ToolOutcome::ok(json!({
            "path": TODOS_FILE,
            "count": normalized.len(),
        }))
    }
}

pub struct PlanTaskTool {
    workspace_root: PathBuf,
}

impl PlanTaskTool {
    pub fn new(deps: &ToolDeps) -> Self {
        Self {
            workspace_root: deps.workspace_root.clone(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for PlanTaskTool {
    fn name(&self) -> &str {
        "plan_task"
    }

    fn description(&self) -> &str {
        "Record a task plan in .maeum_plan.json: the task, files worth \
         examining, and considerations."
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Destructive
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "task": {
                    "type": "string",
                    "description": "What is being planned"
                },
                "files_to_examine": {
                    "type": "array",
                    "description": "Paths worth reading first"
                },
                "considerations": {
                    "type": "array",
                    "description": "Constraints and risks to keep in mind"
                }
            },
            "required": ["task"]
        })
    }

    fn example(&self) -> Value {
        json!({
            "task": "Add retry logic to the fetcher",
            "files_to_examine": ["src/fetch.py"],
            "considerations": ["keep timeouts bounded"]
        })
    }

    async fn execute(&self, args: Value) -> ToolOutcome {
        let task = args["task"].as_str().unwrap_or_default();
        let plan = json!({
            "task": task,
            "status": "planned",
            "files_to_examine": args["files_to_examine"].as_array().cloned().unwrap_or_default(),
            "considerations": args["considerations"].as_array().cloned().unwrap_or_default(),
            "created_at": Local::now().to_rfc3339(),
            "steps": [],
        });

        let path = self.workspace_root.join(PLAN_FILE);
        let body = serde_json::to_string_pretty(&plan).unwrap_or_default();
        if let Err(e) = tokio::fs::write(&path, body).await {
            return ToolOutcome::err(format!("failed to write {}: {}", PLAN_FILE, e));
        }
        ToolOutcome::ok(json!({
            "path": PLAN_FILE,
            "plan": plan,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::test_deps;
    use std::fs;

    #[tokio::test]
    async fn first_update_creates_template() {
        let (dir, deps) = test_deps().await;
        let tool = UpdateProjectMemoryTool::new(&deps);
        let out = tool
            .execute(json!({ "section": "decisions", "content": "keep it simple" }))
            .await;
        assert!(out.success);

        let memory = fs::read_to_string(dir.join(MEMORY_FILE)).unwrap();
        assert!(memory.starts_with("# Project Memory"));
        for header in ["## Architecture", "## Patterns", "## Rules", "## Context", "## Decisions"] {
            assert!(memory.contains(header), "missing {}", header);
        }
        assert!(memory.contains("] keep it simple"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn appends_land_in_their_section() {
        let (dir, deps) = test_deps().await;
        let tool = UpdateProjectMemoryTool::new(&deps);
        tool.execute(json!({ "section": "architecture", "content": "first" }))
            .await;
        tool.execute(json!({ "section": "architecture", "content": "second" }))
            .await;
        tool.execute(json!({ "section": "rules", "content": "a rule" }))
            .await;

        let memory = fs::read_to_string(dir.join(MEMORY_FILE)).unwrap();
        let arch = memory.find("## Architecture").unwrap();
        let patterns = memory.find("## Patterns").unwrap();
        let first = memory.find("] first").unwrap();
        let second = memory.find("] second").unwrap();
        assert!(arch < first && first < second && second < patterns);
        assert!(memory.find("] a rule").unwrap() > memory.find("## Rules").unwrap());
        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn read_reports_absence() {
        let (dir, deps) = test_deps().await;
        let tool = ReadProjectMemoryTool::new(&deps);
        let out = tool.execute(json!({})).await;
        assert!(out.success);
        assert_eq!(out.payload["exists"], false);
        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn todos_validate_and_persist() {
        let (dir, deps) = test_deps().await;
        let tool = TodoWriteTool::new(&deps);

        let out = tool
            .execute(json!({ "todos": [{ "content": "x", "status": "bogus" }] }))
            .await;
        assert!(!out.success);

        let out = tool
            .execute(json!({
                "todos": [
                    { "content": "first", "status": "pending", "priority": "high" },
                    { "content": "second" }
                ]
            }))
            .await;
        assert!(out.success);
        let saved: Value =
            serde_json::from_str(&fs::read_to_string(dir.join(TODOS_FILE)).unwrap()).unwrap();
        assert_eq!(saved[1]["status"], "pending");
        assert_eq!(saved[1]["priority"], "medium");
        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn plan_persists_with_fields() {
        let (dir, deps) = test_deps().await;
        let tool = PlanTaskTool::new(&deps);
        let out = tool
            .execute(json!({
                "task": "refactor",
                "files_to_examine": ["a.py"],
                "considerations": ["tests must pass"]
            }))
            .await;
        assert!(out.success);
        let saved: Value =
            serde_json::from_str(&fs::read_to_string(dir.join(PLAN_FILE)).unwrap()).unwrap();
        assert_eq!(saved["task"], "refactor");
        assert_eq!(saved["status"], "planned");
        assert_eq!(saved["files_to_examine"][0], "a.py");
        let _ = fs::remove_dir_all(&dir);
    }
}
