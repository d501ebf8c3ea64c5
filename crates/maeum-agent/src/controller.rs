//! The agentic loop - think, act, observe, iterate
//!
//! Drives one user turn across up to max_iterations tool invocations.
//! Destructive tools suspend the loop under a confirmation id; the gateway
//! re-enters it when the user approves or rejects.

use crate::interceptor::{ScanEvent, StreamInterceptor};
use crate::prompt;
use crate::session::{ParkedLoopState, Session};
use futures::StreamExt;
use maeum_core::{Message, ServerMessage, ToolCall, ToolOutcome};
use maeum_llm::{ChatBackend, ChatRequest, TransportError};
use maeum_tools::{ToolKind, ToolRegistry};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The text rendered when the user rejects a destructive tool.
const USER_REJECTED: &str = "사용자가 거부함";

const EXPLORATION_NOTE: &str = "[SYSTEM] Exploration budget exhausted - the \
workspace has been sufficiently explored. Do not call read-only tools again \
this turn; summarize what you know and complete the task now.";

pub struct LoopDeps {
    pub registry: Arc<ToolRegistry>,
    pub client: Arc<dyn ChatBackend>,
    pub workspace_root: PathBuf,
    pub max_iterations: usize,
    pub max_exploration: usize,
    pub compression_threshold: usize,
}

enum StreamEnd {
    Tool(ToolCall),
    Terminal,
    Cancelled,
    Failed(String),
}

enum IterationOutcome {
    Continue,
    Stop,
    Suspended,
}

pub struct LoopController {
    deps: LoopDeps,
}

impl LoopController {
    pub fn new(deps: LoopDeps) -> Self {
        Self { deps }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.deps.registry
    }

    /// Run one user turn to completion (or suspension).
    pub async fn run_turn(
        &self,
        session: &Arc<Session>,
        user_message: &str,
        event_tx: mpsc::Sender<ServerMessage>,
        cancel: CancellationToken,
    ) {
        session.clear_abort();
        session.reset_exploration();
        session.push_message(Message::user(user_message)).await;

        if prompt::maybe_compress(
            session,
            self.deps.client.as_ref(),
            self.deps.compression_threshold,
        )
        .await
        {
            let _ = event_tx
                .send(ServerMessage::system("이전 대화를 요약해 컨텍스트를 압축했습니다"))
                .await;
        }

        let system_prompt = prompt::build_system_prompt(
            &self.deps.workspace_root,
            &self.deps.registry.catalog(),
        );

        self.drive(
            session,
            system_prompt,
            user_message.to_string(),
            String::new(),
            0,
            event_tx,
            cancel,
        )
        .await;
    }

    /// Re-entry after the user approved or rejected a parked tool.
    pub async fn resume_confirmation(
        &self,
        session: &Arc<Session>,
        confirmation_id: &str,
        approved: bool,
        event_tx: mpsc::Sender<ServerMessage>,
        cancel: CancellationToken,
    ) {
        let state = match session.take_parked(confirmation_id) {
            Some(s) => s,
            None => {
                let _ = event_tx
                    .send(ServerMessage::error(format!(
                        "unknown confirmation id: {}",
                        confirmation_id
                    )))
                    .await;
                return;
            }
        };

        let tool = state.pending_tool.clone();

        if !approved {
            info!("session {}: '{}' rejected by user", session.key, tool.name);
            let _ = event_tx
                .send(ServerMessage::ToolResult {
                    tool_name: tool.name.clone(),
                    result: json!({ "success": false, "error": USER_REJECTED }),
                    file_path: tool.input["file_path"].as_str().map(String::from),
                })
                .await;
            if !state.accumulated_response.is_empty() {
                session
                    .push_message(Message::assistant(&state.accumulated_response))
                    .await;
            }
            let _ = event_tx
                .send(ServerMessage::done(state.accumulated_response))
                .await;
            return;
        }

        // Restore the parked budget, execute, and rejoin the loop as if the
        // tool had run inline.
        session.set_exploration(state.exploration_count);
        let outcome = self.execute_and_report(&tool, &event_tx, &cancel).await;
        self.observe(session, &tool, &outcome).await;

        self.drive(
            session,
            state.system_prompt,
            state.user_message,
            state.accumulated_response,
            state.iteration_index + 1,
            event_tx,
            cancel,
        )
        .await;
    }

    /// Re-entry with the user's answer to an ask_user question.
    pub async fn resume_question(
        &self,
        session: &Arc<Session>,
        confirmation_id: &str,
        answer: &str,
        event_tx: mpsc::Sender<ServerMessage>,
        cancel: CancellationToken,
    ) {
        let state = match session.take_parked(confirmation_id) {
            Some(s) => s,
            None => {
                let _ = event_tx
                    .send(ServerMessage::error(format!(
                        "unknown confirmation id: {}",
                        confirmation_id
                    )))
                    .await;
                return;
            }
        };

        let tool = state.pending_tool.clone();
        let outcome = ToolOutcome::ok(json!({
            "question": tool.input["question"],
            "answer": answer,
        }));
        let _ = event_tx
            .send(ServerMessage::ToolResult {
                tool_name: tool.name.clone(),
                result: json!({ "success": true, "answer": answer }),
                file_path: None,
            })
            .await;
        self.observe(session, &tool, &outcome).await;

        self.drive(
            session,
            state.system_prompt,
            state.user_message,
            state.accumulated_response,
            state.iteration_index + 1,
            event_tx,
            cancel,
        )
        .await;
    }

    /// The iteration engine shared by fresh turns and resumptions.
    #[allow(clippy::too_many_arguments)]
    async fn drive(
        &self,
        session: &Arc<Session>,
        system_prompt: String,
        user_message: String,
        mut running_response: String,
        mut iteration: usize,
        event_tx: mpsc::Sender<ServerMessage>,
        cancel: CancellationToken,
    ) {
        loop {
            if session.abort_requested() || cancel.is_cancelled() {
                let _ = event_tx.send(ServerMessage::cancelled("작업이 취소되었습니다")).await;
                return;
            }
            if iteration >= self.deps.max_iterations {
                warn!("session {}: iteration limit reached", session.key);
                let _ = event_tx
                    .send(ServerMessage::system("최대 반복 횟수에 도달했습니다"))
                    .await;
                if !running_response.is_empty() {
                    session
                        .push_message(Message::assistant(&running_response))
                        .await;
                }
                let _ = event_tx.send(ServerMessage::done(running_response)).await;
                return;
            }
            iteration += 1;

            let end = self
                .stream_once(
                    session,
                    &system_prompt,
                    &user_message,
                    &mut running_response,
                    &event_tx,
                    &cancel,
                )
                .await;

            let tool = match end {
                StreamEnd::Terminal => {
                    session
                        .push_message(Message::assistant(&running_response))
                        .await;
                    info!(
                        "session {}: turn complete after {} iteration(s)",
                        session.key, iteration
                    );
                    let _ = event_tx.send(ServerMessage::done(running_response)).await;
                    return;
                }
                StreamEnd::Cancelled => {
                    let _ =
                        event_tx.send(ServerMessage::cancelled("작업이 취소되었습니다")).await;
                    return;
                }
                StreamEnd::Failed(message) => {
                    let _ = event_tx.send(ServerMessage::error(message)).await;
                    return;
                }
                StreamEnd::Tool(tool) => tool,
            };

            let _ = event_tx
                .send(ServerMessage::ToolDetected {
                    tool_name: tool.name.clone(),
                    tool_input: tool.input.clone(),
                })
                .await;

            match self
                .handle_tool(
                    session,
                    &system_prompt,
                    &user_message,
                    &running_response,
                    iteration,
                    tool,
                    &event_tx,
                    &cancel,
                )
                .await
            {
                IterationOutcome::Continue => continue,
                IterationOutcome::Suspended => return,
                IterationOutcome::Stop => return,
            }
        }
    }

    /// Open one stream and consume it through the interceptor.
    async fn stream_once(
        &self,
        session: &Arc<Session>,
        system_prompt: &str,
        user_message: &str,
        running_response: &mut String,
        event_tx: &mpsc::Sender<ServerMessage>,
        cancel: &CancellationToken,
    ) -> StreamEnd {
        let turn_message = prompt::build_turn_message(session, user_message).await;
        let request = ChatRequest::new(turn_message).with_system(system_prompt);

        let stream = match self
            .deps
            .client
            .chat(request, Some(cancel.child_token()))
            .await
        {
            Ok(s) => s,
            Err(e) => return StreamEnd::Failed(format!("backend unreachable: {}", e)),
        };

        let mut interceptor = StreamInterceptor::new();
        tokio::pin!(stream);

        while let Some(item) = stream.next().await {
            let chunk = match item {
                Ok(c) => c,
                Err(TransportError::Cancelled) => return StreamEnd::Cancelled,
                Err(e) => return StreamEnd::Failed(format!("stream error: {}", e)),
            };
            for event in interceptor.push(&chunk) {
                match event {
                    ScanEvent::Prose(prose) => {
                        running_response.push_str(&prose);
                        let _ = event_tx.send(ServerMessage::token(prose)).await;
                    }
                    ScanEvent::Tool(tool) => {
                        // Stop the model from generating past the block.
                        let client = self.deps.client.clone();
                        tokio::spawn(async move { client.abort().await });
                        return StreamEnd::Tool(tool);
                    }
                }
            }
            if interceptor.intercepted() {
                break;
            }
        }

        for event in interceptor.finish() {
            match event {
                ScanEvent::Prose(prose) => {
                    running_response.push_str(&prose);
                    let _ = event_tx.send(ServerMessage::token(prose)).await;
                }
                ScanEvent::Tool(tool) => {
                    let client = self.deps.client.clone();
                    tokio::spawn(async move { client.abort().await });
                    return StreamEnd::Tool(tool);
                }
            }
        }

        StreamEnd::Terminal
    }

    /// Classify and act on one intercepted tool call.
    #[allow(clippy::too_many_arguments)]
    async fn handle_tool(
        &self,
        session: &Arc<Session>,
        system_prompt: &str,
        user_message: &str,
        running_response: &str,
        iteration: usize,
        tool: ToolCall,
        event_tx: &mpsc::Sender<ServerMessage>,
        cancel: &CancellationToken,
    ) -> IterationOutcome {
        let kind = match self.deps.registry.kind_of(&tool.name) {
            Some(k) => k,
            None => {
                let outcome = ToolOutcome::err(format!("tool not found: {}", tool.name));
                let _ = event_tx
                    .send(ServerMessage::ToolResult {
                        tool_name: tool.name.clone(),
                        result: json!({ "success": false, "error": outcome.error }),
                        file_path: None,
                    })
                    .await;
                self.observe(session, &tool, &outcome).await;
                return IterationOutcome::Continue;
            }
        };

        match kind {
            ToolKind::ReadOnly => {
                if session.exploration_count() >= self.deps.max_exploration {
                    debug!(
                        "session {}: exploration budget hit, '{}' not executed",
                        session.key, tool.name
                    );
                    let _ = event_tx
                        .send(ServerMessage::system("충분히 탐색했습니다 - 이제 요약하세요"))
                        .await;
                    session.push_message(Message::system(EXPLORATION_NOTE)).await;
                    return IterationOutcome::Continue;
                }
                let count = session.bump_exploration();
                let _ = event_tx
                    .send(ServerMessage::ToolExecuting {
                        tool_name: tool.name.clone(),
                        tool_input: tool.input.clone(),
                        exploration_count: Some(count),
                        max_exploration: Some(self.deps.max_exploration),
                    })
                    .await;
                self.emit_open_in_editor(&tool, event_tx).await;

                let outcome = self
                    .deps
                    .registry
                    .execute_cancellable(&tool.name, tool.input.clone(), cancel.child_token())
                    .await;

                if cancel.is_cancelled() || session.abort_requested() {
                    // Result discarded: abort arrived before observation.
                    let _ = event_tx
                        .send(ServerMessage::cancelled("작업이 취소되었습니다"))
                        .await;
                    return IterationOutcome::Stop;
                }

                self.report_result(&tool, &outcome, event_tx).await;
                self.cache_read_symbols(session, &tool, &outcome).await;
                self.observe(session, &tool, &outcome).await;
                IterationOutcome::Continue
            }
            ToolKind::Destructive => {
                let confirmation_id = Uuid::new_v4().to_string();
                session.park(
                    confirmation_id.clone(),
                    ParkedLoopState {
                        system_prompt: system_prompt.to_string(),
                        user_message: user_message.to_string(),
                        accumulated_response: running_response.to_string(),
                        iteration_index: iteration,
                        exploration_count: session.exploration_count(),
                        pending_tool: tool.clone(),
                    },
                );
                let _ = event_tx
                    .send(ServerMessage::ToolConfirmRequest {
                        confirmation_id: confirmation_id.clone(),
                        tool_name: tool.name.clone(),
                        tool_input: tool.input.clone(),
                        description: self
                            .deps
                            .registry
                            .get(&tool.name)
                            .map(|t| t.description().to_string())
                            .unwrap_or_default(),
                    })
                    .await;
                let _ = event_tx
                    .send(ServerMessage::WaitingConfirmation { confirmation_id })
                    .await;
                IterationOutcome::Suspended
            }
            ToolKind::Interactive => {
                let confirmation_id = Uuid::new_v4().to_string();
                session.park(
                    confirmation_id.clone(),
                    ParkedLoopState {
                        system_prompt: system_prompt.to_string(),
                        user_message: user_message.to_string(),
                        accumulated_response: running_response.to_string(),
                        iteration_index: iteration,
                        exploration_count: session.exploration_count(),
                        pending_tool: tool.clone(),
                    },
                );
                let options = tool.input["options"].as_array().map(|opts| {
                    opts.iter()
                        .filter_map(|o| o.as_str().map(String::from))
                        .collect()
                });
                let _ = event_tx
                    .send(ServerMessage::Question {
                        confirmation_id: confirmation_id.clone(),
                        question: tool.input["question"].as_str().unwrap_or_default().to_string(),
                        options,
                        default: tool.input["default"].as_str().map(String::from),
                    })
                    .await;
                let _ = event_tx
                    .send(ServerMessage::WaitingConfirmation { confirmation_id })
                    .await;
                IterationOutcome::Suspended
            }
        }
    }

    /// Execute a previously-parked (now approved) tool and emit its events.
    async fn execute_and_report(
        &self,
        tool: &ToolCall,
        event_tx: &mpsc::Sender<ServerMessage>,
        cancel: &CancellationToken,
    ) -> ToolOutcome {
        let _ = event_tx
            .send(ServerMessage::ToolExecuting {
                tool_name: tool.name.clone(),
                tool_input: tool.input.clone(),
                exploration_count: None,
                max_exploration: None,
            })
            .await;
        self.emit_open_in_editor(tool, event_tx).await;

        let outcome = self
            .deps
            .registry
            .execute_cancellable(&tool.name, tool.input.clone(), cancel.child_token())
            .await;
        self.report_result(tool, &outcome, event_tx).await;
        outcome
    }

    async fn report_result(
        &self,
        tool: &ToolCall,
        outcome: &ToolOutcome,
        event_tx: &mpsc::Sender<ServerMessage>,
    ) {
        let file_path = tool.input["file_path"].as_str().map(String::from);
        let _ = event_tx
            .send(ServerMessage::ToolResult {
                tool_name: tool.name.clone(),
                result: serde_json::to_value(outcome).unwrap_or_default(),
                file_path: file_path.clone(),
            })
            .await;

        if !outcome.success {
            return;
        }
        // Editors reload files the agent just changed.
        match tool.name.as_str() {
            "write_file" => {
                if let Some(path) = file_path {
                    let action = outcome.field("action").and_then(|a| a.as_str()).unwrap_or("modified");
                    let _ = event_tx
                        .send(ServerMessage::file_modified(path, action))
                        .await;
                }
            }
            "edit_file" => {
                if let Some(path) = file_path {
                    let _ = event_tx
                        .send(ServerMessage::file_modified(path, "modified"))
                        .await;
                }
            }
            "multi_edit" => {
                if let Some(files) = outcome.field("files").and_then(|f| f.as_array()) {
                    for file in files.iter().filter_map(|f| f.as_str()) {
                        let _ = event_tx
                            .send(ServerMessage::file_modified(file, "modified"))
                            .await;
                    }
                }
            }
            _ => {}
        }
    }

    async fn emit_open_in_editor(
        &self,
        tool: &ToolCall,
        event_tx: &mpsc::Sender<ServerMessage>,
    ) {
        if !matches!(tool.name.as_str(), "read_file" | "edit_file" | "write_file") {
            return;
        }
        if let Some(path) = tool.input["file_path"].as_str() {
            let _ = event_tx
                .send(ServerMessage::OpenInEditor {
                    file_path: path.to_string(),
                    tool_name: tool.name.clone(),
                    line: tool.input["start_line"].as_u64().map(|l| l as usize),
                })
                .await;
        }
    }

    /// First read of a file feeds the session's symbol cache.
    async fn cache_read_symbols(
        &self,
        session: &Arc<Session>,
        tool: &ToolCall,
        outcome: &ToolOutcome,
    ) {
        if tool.name != "read_file" || !outcome.success {
            return;
        }
        let path = match tool.input["file_path"].as_str() {
            Some(p) => p,
            None => return,
        };
        if session.has_cached_symbols(path).await {
            return;
        }
        let extension = path.rsplit('.').next().unwrap_or_default().to_lowercase();
        if !maeum_index::symbols::supported(&extension) {
            return;
        }
        if let Ok(content) = tokio::fs::read_to_string(self.deps.workspace_root.join(path)).await {
            let extraction = maeum_index::symbols::extract(&extension, &content);
            session.cache_symbols(path, extraction).await;
        }
    }

    /// Append the observation (rendered result + continuation nudge) as a
    /// synthetic tool turn.
    async fn observe(&self, session: &Arc<Session>, tool: &ToolCall, outcome: &ToolOutcome) {
        let observation = format!(
            "[TOOL RESULT: {}]\n{}\n\n이 결과를 바탕으로 작업을 계속하세요. 필요하면 다른 도구를 호출하고, 작업이 끝났으면 설명으로 마무리하세요.",
            tool.name,
            outcome.to_observation()
        );
        session.push_message(Message::tool(observation)).await;
    }
}
