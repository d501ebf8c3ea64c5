//! bash tool - shell execution with a denylist, timeout, and kill-on-cancel

use crate::registry::{Tool, ToolKind};
use crate::ToolDeps;
use maeum_core::ToolOutcome;
use serde_json::{json, Value};
use std::path::PathBuf;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Substrings that block execution outright.
const DENYLIST: &[&str] = &["rm -rf", "rm -r /", "sudo rm", "> /dev", "mkfs", "dd if="];

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_TIMEOUT_SECS: u64 = 300;
const OUTPUT_CAP: usize = 30_000;

pub struct BashTool {
    workspace_root: PathBuf,
}

impl BashTool {
    pub fn new(deps: &ToolDeps) -> Self {
        Self {
            workspace_root: deps.workspace_root.clone(),
        }
    }

    fn denied(command: &str) -> Option<&'static str> {
        DENYLIST.iter().find(|d| command.contains(*d)).copied()
    }
}

#[async_trait::async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Run a shell command in the workspace. Captures stdout and stderr; \
         default timeout 30s (max 300). Destructive patterns are refused."
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Destructive
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The command to execute"
                },
                "timeout": {
                    "type": "integer",
                    "description": "Timeout in seconds (default 30, max 300)"
                }
            },
            "required": ["command"]
        })
    }

    fn example(&self) -> Value {
        json!({ "command": "python -m pytest tests/ -q" })
    }

    async fn execute(&self, args: Value) -> ToolOutcome {
        self.execute_cancellable(args, CancellationToken::new())
            .await
    }

    /// Spawns with kill_on_drop and races completion against the timeout and
    /// the cancellation token; either loser kills the child.
    async fn execute_cancellable(&self, args: Value, cancel: CancellationToken) -> ToolOutcome {
        let command = args["command"].as_str().unwrap_or_default();
        if let Some(blocked) = Self::denied(command) {
            return ToolOutcome::err(format!("safety block: command contains '{}'", blocked));
        }

        let timeout_secs = args["timeout"]
            .as_u64()
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
            .min(MAX_TIMEOUT_SECS);

        debug!("bash: {}", &command[..command.len().min(120)]);

        let mut child = match Command::new("bash")
            .arg("-c")
            .arg(command)
            .current_dir(&self.workspace_root)
            .kill_on_drop(true)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
        {
            Ok(c) => c,
            Err(e) => return ToolOutcome::err(format!("failed to spawn: {}", e)),
        };

        let timeout = std::time::Duration::from_secs(timeout_secs);
        tokio::select! {
            waited = tokio::time::timeout(timeout, child.wait()) => {
                match waited {
                    Ok(Ok(status)) => {
                        let stdout = read_pipe(child.stdout.take()).await;
                        let stderr = read_pipe(child.stderr.take()).await;
                        ToolOutcome::ok(json!({
                            "exit_code": status.code().unwrap_or(-1),
                            "stdout": cap(&stdout),
                            "stderr": cap(&stderr),
                            "timed_out": false,
                        }))
                    }
                    Ok(Err(e)) => ToolOutcome::err(format!("wait failed: {}", e)),
                    Err(_) => {
                        let _ = child.kill().await;
                        ToolOutcome::err(format!("command timed out after {}s", timeout_secs))
                    }
                }
            }
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                ToolOutcome::err("cancelled: process killed")
            }
        }
    }
}

async fn read_pipe(pipe: Option<impl tokio::io::AsyncRead + Unpin>) -> String {
    use tokio::io::AsyncReadExt;
    match pipe {
        Some(mut p) => {
            let mut buf = Vec::new();
            let _ = p.read_to_end(&mut buf).await;
            String::from_utf8_lossy(&buf).to_string()
        }
        None => String::new(),
    }
}

fn cap(s: &str) -> String {
    if s.len() > OUTPUT_CAP {
        let mut cut = OUTPUT_CAP;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}\n... [truncated, {} total chars]", &s[..cut], s.len())
    } else {
        s.to_string()
    }
}
