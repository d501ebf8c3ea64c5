//! Git tools - status, diff, log, and commit via subprocess

use crate::registry::{Tool, ToolKind};
use crate::ToolDeps;
use maeum_core::ToolOutcome;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// Read subcommands get a short leash; commit gets a longer one.
const READ_TIMEOUT_SECS: u64 = 10;
const COMMIT_TIMEOUT_SECS: u64 = 30;

const GIT_OUTPUT_CAP: usize = 30_000;

async fn run_git(root: &Path, args: &[&str], timeout_secs: u64) -> Result<String, String> {
    debug!("git {}", args.join(" "));
    let output = tokio::time::timeout(
        std::time::Duration::from_secs(timeout_secs),
        Command::new("git")
            .arg("-C")
            .arg(root)
            .args(args)
            .kill_on_drop(true)
            .output(),
    )
    .await;

    let output = match output {
        Ok(Ok(o)) => o,
        Ok(Err(e)) => return Err(format!("failed to run git: {}", e)),
        Err(_) => return Err(format!("git {} timed out after {}s", args[0], timeout_secs)),
    };

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    if !output.status.success() {
        return Err(format!(
            "git {} failed ({}): {}",
            args[0],
            output.status.code().unwrap_or(-1),
            stderr.trim()
        ));
    }

    let mut text = stdout;
    if text.len() > GIT_OUTPUT_CAP {
        let mut cut = GIT_OUTPUT_CAP;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        let total = text.len();
        text.truncate(cut);
        text.push_str(&format!("\n... [truncated, {} total chars]", total));
    }
    Ok(text)
}

pub struct GitStatusTool {
    root: PathBuf,
}

impl GitStatusTool {
    pub fn new(deps: &ToolDeps) -> Self {
        Self {
            root: deps.workspace_root.clone(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for GitStatusTool {
    fn name(&self) -> &str {
        "git_status"
    }

    fn description(&self) -> &str {
        "Show working-tree status (porcelain format plus current branch)."
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    fn example(&self) -> Value {
        json!({})
    }

    async fn execute(&self, _args: Value) -> ToolOutcome {
        let status = match run_git(&self.root, &["status", "--porcelain"], READ_TIMEOUT_SECS).await
        {
            Ok(s) => s,
            Err(e) => return ToolOutcome::err(e),
        };
        let branch = run_git(
            &self.root,
            &["rev-parse", "--abbrev-ref", "HEAD"],
            READ_TIMEOUT_SECS,
        )
        .await
        .unwrap_or_default();

        ToolOutcome::ok(json!({
            "branch": branch.trim(),
            "status": status,
            "clean": status.trim().is_empty(),
        }))
    }
}

pub struct GitDiffTool {
    root: PathBuf,
}

impl GitDiffTool {
    pub fn new(deps: &ToolDeps) -> Self {
        Self {
            root: deps.workspace_root.clone(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for GitDiffTool {
    fn name(&self) -> &str {
        "git_diff"
    }

    fn description(&self) -> &str {
        "Show unstaged changes. Pass staged=true for the index diff, or a \
         file_path to narrow the diff."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Limit the diff to one path"
                },
                "staged": {
                    "type": "boolean",
                    "description": "Diff the index instead of the working tree"
                }
            }
        })
    }

    fn example(&self) -> Value {
        json!({ "file_path": "src/app.py" })
    }

    async fn execute(&self, args: Value) -> ToolOutcome {
        let mut git_args = vec!["diff"];
        if args["staged"].as_bool().unwrap_or(false) {
            git_args.push("--cached");
        }
        let path = args["file_path"].as_str();
        if let Some(p) = path {
            git_args.push("--");
            git_args.push(p);
        }
        match run_git(&self.root, &git_args, READ_TIMEOUT_SECS).await {
            Ok(diff) => ToolOutcome::ok(json!({ "diff": diff, "empty": diff.trim().is_empty() })),
            Err(e) => ToolOutcome::err(e),
        }
    }
}

pub struct GitLogTool {
    root: PathBuf,
}

impl GitLogTool {
    pub fn new(deps: &ToolDeps) -> Self {
        Self {
            root: deps.workspace_root.clone(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for GitLogTool {
    fn name(&self) -> &str {
        "git_log"
    }

    fn description(&self) -> &str {
        "Show recent commits, one line each (default 10)."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "count": {
                    "type": "integer",
                    "description": "Number of commits (default 10, max 100)"
                },
                "file_path": {
                    "type": "string",
                    "description": "Limit history to one path"
                }
            }
        })
    }

    fn example(&self) -> Value {
        json!({ "count": 10 })
    }

    async fn execute(&self, args: Value) -> ToolOutcome {
        let count = args["count"].as_u64().unwrap_or(10).min(100);
        let count_arg = format!("-{}", count);
        let mut git_args = vec!["log", "--oneline", "--decorate", count_arg.as_str()];
        let path = args["file_path"].as_str();
        if let Some(p) = path {
            git_args.push("--");
            git_args.push(p);
        }
        match run_git(&self.root, &git_args, READ_TIMEOUT_SECS).await {
            Ok(log) => ToolOutcome::ok(json!({ "log": log })),
            Err(e) => ToolOutcome::err(e),
        }
    }
}

pub struct GitCommitTool {
    root: PathBuf,
}

impl GitCommitTool {
    pub fn new(deps: &ToolDeps) -> Self {
        Self {
            root: deps.workspace_root.clone(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for GitCommitTool {
    fn name(&self) -> &str {
        "git_commit"
    }

    fn description(&self) -> &str {
        "Commit changes. Stages everything when add_all is true, then commits \
         with the given message."
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Destructive
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "Commit message"
                },
                "add_all": {
                    "type": "boolean",
                    "description": "Run 'git add -A' first (default false)"
                }
            },
            "required": ["message"]
        })
    }

    fn example(&self) -> Value {
        json!({ "message": "Fix request handling", "add_all": true })
    }

    async fn execute(&self, args: Value) -> ToolOutcome {
        let message = args["message"].as_str().unwrap_or_default();
        if args["add_all"].as_bool().unwrap_or(false) {
            if let Err(e) = run_git(&self.root, &["add", "-A"], READ_TIMEOUT_SECS).await {
                return ToolOutcome::err(e);
            }
        }
        match run_git(
            &self.root,
            &["commit", "-m", message],
            COMMIT_TIMEOUT_SECS,
        )
        .await
        {
            Ok(output) => {
                let hash = run_git(&self.root, &["rev-parse", "--short", "HEAD"], READ_TIMEOUT_SECS)
                    .await
                    .unwrap_or_default();
                ToolOutcome::ok(json!({
                    "committed": true,
                    "hash": hash.trim(),
                    "output": output.trim(),
                }))
            }
            Err(e) => ToolOutcome::err(e),
        }
    }
}
