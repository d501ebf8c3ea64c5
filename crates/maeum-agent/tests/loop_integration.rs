//! End-to-end loop tests against a scripted backend
//!
//! The backend plays back canned responses; the loop, interceptor, tools,
//! and transaction layer are all real.

use maeum_agent::{LoopController, LoopDeps, Session, SessionRegistry};
use maeum_core::{ServerMessage, SessionKey};
use maeum_index::{SearchEngine, WorkspaceIndex};
use maeum_llm::{ChatBackend, ChatRequest, ChunkStream, TransportResult};
use maeum_tools::{create_default_registry, ToolDeps};
use maeum_txn::TransactionManager;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

struct ScriptedBackend {
    responses: Mutex<VecDeque<Vec<String>>>,
    aborts: AtomicUsize,
    generate_calls: AtomicUsize,
    generate_reply: String,
}

impl ScriptedBackend {
    fn new(responses: Vec<Vec<&str>>) -> Self {
        Self {
            responses: Mutex::new(
                responses
                    .into_iter()
                    .map(|r| r.into_iter().map(String::from).collect())
                    .collect(),
            ),
            aborts: AtomicUsize::new(0),
            generate_calls: AtomicUsize::new(0),
            generate_reply: "files: foo.py; decision: rename".to_string(),
        }
    }
}

#[async_trait::async_trait]
impl ChatBackend for ScriptedBackend {
    async fn chat(
        &self,
        _request: ChatRequest,
        _cancel: Option<CancellationToken>,
    ) -> TransportResult<ChunkStream> {
        let chunks = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| vec!["done.".to_string()]);
        let stream = futures::stream::iter(chunks.into_iter().map(Ok));
        Ok(Box::pin(stream))
    }

    async fn generate(&self, _request: ChatRequest) -> TransportResult<String> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.generate_reply.clone())
    }

    async fn abort(&self) {
        self.aborts.fetch_add(1, Ordering::SeqCst);
    }
}

struct Harness {
    dir: PathBuf,
    controller: LoopController,
    session: Arc<Session>,
    txn: Arc<TransactionManager>,
    backend: Arc<ScriptedBackend>,
}

fn harness(responses: Vec<Vec<&str>>, max_exploration: usize) -> Harness {
    let id = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("maeum-loop-test-{}-{}", std::process::id(), id));
    std::fs::create_dir_all(&dir).unwrap();

    let index = Arc::new(WorkspaceIndex::new(&dir));
    let engine = Arc::new(SearchEngine::new(index.clone()));
    let txn = Arc::new(TransactionManager::new(&dir));
    let transport = Arc::new(maeum_llm::ClientTransport::new("http://127.0.0.1:1"));
    let tool_deps = ToolDeps {
        workspace_root: dir.clone(),
        index,
        engine,
        txn: txn.clone(),
        transport,
    };
    let registry = Arc::new(create_default_registry(&tool_deps));

    let backend = Arc::new(ScriptedBackend::new(responses));
    let controller = LoopController::new(LoopDeps {
        registry,
        client: backend.clone(),
        workspace_root: dir.clone(),
        max_iterations: 99,
        max_exploration,
        compression_threshold: 30_000,
    });

    let sessions = SessionRegistry::new();
    let session = sessions.get_or_create(&SessionKey::new("test"));

    Harness {
        dir,
        controller,
        session,
        txn,
        backend,
    }
}

fn drain(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<ServerMessage> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn tag(event: &ServerMessage) -> &'static str {
    match event {
        ServerMessage::Token { .. } => "token",
        ServerMessage::ToolDetected { .. } => "tool_detected",
        ServerMessage::ToolExecuting { .. } => "tool_executing",
        ServerMessage::OpenInEditor { .. } => "open_in_editor",
        ServerMessage::ToolResult { .. } => "tool_result",
        ServerMessage::FileModified { .. } => "file_modified",
        ServerMessage::ToolConfirmRequest { .. } => "tool_confirm_request",
        ServerMessage::WaitingConfirmation { .. } => "waiting_confirmation",
        ServerMessage::Question { .. } => "question",
        ServerMessage::Done { .. } => "done",
        ServerMessage::Error { .. } => "error",
        ServerMessage::Cancelled { .. } => "cancelled",
        ServerMessage::System { .. } => "system",
    }
}

const EDIT_BLOCK: &str = "[TOOL:edit_file]\n```json\n{\"file_path\":\"foo.py\",\"old_text\":\"hi\",\"new_text\":\"hello\"}\n```";

#[tokio::test]
async fn single_edit_under_confirmation_approved() {
    let h = harness(
        vec![
            vec!["I'll change hi to hello. ", EDIT_BLOCK],
            vec!["바꿨습니다. 확인해 주세요."],
        ],
        20,
    );
    std::fs::write(h.dir.join("foo.py"), "print(\"hi\")\n").unwrap();

    let (tx, mut rx) = mpsc::channel(256);
    h.controller
        .run_turn(
            &h.session,
            "change hi to hello",
            tx.clone(),
            CancellationToken::new(),
        )
        .await;

    let events = drain(&mut rx);
    let tags: Vec<&str> = events.iter().map(tag).collect();
    assert_eq!(
        tags,
        vec![
            "token",
            "tool_detected",
            "tool_confirm_request",
            "waiting_confirmation"
        ]
    );
    // Suspended: exactly one pending confirmation, no stream in flight.
    assert_eq!(h.session.pending_count(), 1);
    let confirmation_id = match &events[2] {
        ServerMessage::ToolConfirmRequest {
            confirmation_id, ..
        } => confirmation_id.clone(),
        other => panic!("expected confirm request, got {:?}", tag(other)),
    };
    // File untouched while suspended.
    assert_eq!(
        std::fs::read_to_string(h.dir.join("foo.py")).unwrap(),
        "print(\"hi\")\n"
    );

    h.controller
        .resume_confirmation(
            &h.session,
            &confirmation_id,
            true,
            tx,
            CancellationToken::new(),
        )
        .await;

    let events = drain(&mut rx);
    let tags: Vec<&str> = events.iter().map(tag).collect();
    assert_eq!(
        tags,
        vec![
            "tool_executing",
            "open_in_editor",
            "tool_result",
            "file_modified",
            "token",
            "done"
        ]
    );
    match &events[2] {
        ServerMessage::ToolResult { result, .. } => {
            assert_eq!(result["success"], true);
            assert_eq!(result["payload"]["edit_type"], "text_replace");
            assert_eq!(result["payload"]["changes"], 1);
        }
        other => panic!("expected tool_result, got {:?}", tag(other)),
    }

    assert_eq!(
        std::fs::read_to_string(h.dir.join("foo.py")).unwrap(),
        "print(\"hello\")\n"
    );
    let top = h.txn.preview_undo().unwrap();
    assert_eq!(top.changes.len(), 1);
    assert_eq!(top.changes[0].old_content.as_deref(), Some("print(\"hi\")\n"));
    assert_eq!(
        top.changes[0].new_content.as_deref(),
        Some("print(\"hello\")\n")
    );
    assert_eq!(h.session.pending_count(), 0);
    let _ = std::fs::remove_dir_all(&h.dir);
}

#[tokio::test]
async fn single_edit_under_confirmation_rejected() {
    let h = harness(vec![vec!["Editing. ", EDIT_BLOCK]], 20);
    std::fs::write(h.dir.join("foo.py"), "print(\"hi\")\n").unwrap();

    let (tx, mut rx) = mpsc::channel(256);
    h.controller
        .run_turn(&h.session, "change it", tx.clone(), CancellationToken::new())
        .await;
    let events = drain(&mut rx);
    let confirmation_id = events
        .iter()
        .find_map(|e| match e {
            ServerMessage::ToolConfirmRequest {
                confirmation_id, ..
            } => Some(confirmation_id.clone()),
            _ => None,
        })
        .unwrap();

    h.controller
        .resume_confirmation(
            &h.session,
            &confirmation_id,
            false,
            tx,
            CancellationToken::new(),
        )
        .await;

    let events = drain(&mut rx);
    let tags: Vec<&str> = events.iter().map(tag).collect();
    assert_eq!(tags, vec!["tool_result", "done"]);
    match &events[0] {
        ServerMessage::ToolResult { result, .. } => {
            assert_eq!(result["success"], false);
            assert_eq!(result["error"], "사용자가 거부함");
        }
        other => panic!("expected tool_result, got {:?}", tag(other)),
    }
    // Workspace and undo stack unchanged.
    assert_eq!(
        std::fs::read_to_string(h.dir.join("foo.py")).unwrap(),
        "print(\"hi\")\n"
    );
    assert!(h.txn.preview_undo().is_none());
    let _ = std::fs::remove_dir_all(&h.dir);
}

fn read_block(path: &str) -> String {
    format!(
        "[TOOL:read_file]\n```json\n{{\"file_path\":\"{}\"}}\n```",
        path
    )
}

#[tokio::test]
async fn exploration_budget_stops_fourth_read() {
    let r1 = read_block("a.py");
    let responses = vec![
        vec![r1.as_str()],
        vec![r1.as_str()],
        vec![r1.as_str()],
        vec![r1.as_str()],
        vec![r1.as_str()],
        vec!["요약: a.py는 인사를 출력합니다."],
    ];
    let h = harness(responses, 3);
    std::fs::write(h.dir.join("a.py"), "print('hello')\n").unwrap();

    let (tx, mut rx) = mpsc::channel(256);
    h.controller
        .run_turn(&h.session, "explore", tx, CancellationToken::new())
        .await;

    let events = drain(&mut rx);
    let executing: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ServerMessage::ToolExecuting {
                exploration_count, ..
            } => Some(exploration_count.unwrap()),
            _ => None,
        })
        .collect();
    // Calls 1-3 execute with counts 1,2,3; calls 4 and 5 never execute.
    assert_eq!(executing, vec![1, 2, 3]);
    assert_eq!(h.session.exploration_count(), 3);
    let system_notes = events.iter().filter(|e| tag(e) == "system").count();
    assert_eq!(system_notes, 2);
    assert_eq!(tag(events.last().unwrap()), "done");
    let _ = std::fs::remove_dir_all(&h.dir);
}

#[tokio::test]
async fn interception_aborts_upstream_and_discards_tail() {
    let h = harness(
        vec![
            vec![
                "I will read ",
                "that. ",
                "[TOOL:read_file]\n```json\n{\"file_path\":\"x.py\"}\n```",
                " ignored tail",
            ],
            vec!["x.py is tiny."],
        ],
        20,
    );
    std::fs::write(h.dir.join("x.py"), "pass\n").unwrap();

    let (tx, mut rx) = mpsc::channel(256);
    h.controller
        .run_turn(&h.session, "read x.py", tx, CancellationToken::new())
        .await;

    let events = drain(&mut rx);
    // Prose before the sentinel arrives intact; the tail never does.
    let first_stream_prose: String = events
        .iter()
        .take_while(|e| tag(e) == "token")
        .filter_map(|e| match e {
            ServerMessage::Token { content } => Some(content.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(first_stream_prose, "I will read that. ");
    for event in &events {
        if let ServerMessage::Token { content } = event {
            assert!(!content.contains("ignored tail"));
        }
    }
    // The backend was told to stop generating.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(h.backend.aborts.load(Ordering::SeqCst) >= 1);
    let _ = std::fs::remove_dir_all(&h.dir);
}

#[tokio::test]
async fn context_compression_trims_history() {
    let h = harness(vec![vec!["알겠습니다."]], 20);

    // ~60k estimated tokens of history.
    for i in 0..30 {
        let filler = "x".repeat(8_000);
        h.session
            .push_message(maeum_core::Message::user(format!("q{} {}", i, filler)))
            .await;
        h.session
            .push_message(maeum_core::Message::assistant(format!("a{} {}", i, filler)))
            .await;
    }

    let (tx, mut rx) = mpsc::channel(256);
    h.controller
        .run_turn(&h.session, "continue", tx, CancellationToken::new())
        .await;

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| tag(e) == "system"));
    assert_eq!(h.backend.generate_calls.load(Ordering::SeqCst), 1);
    assert!(!h.session.compressed_summary().await.is_empty());
    // 10 kept + the new assistant reply.
    assert_eq!(h.session.message_count().await, 11);
    let _ = std::fs::remove_dir_all(&h.dir);
}

#[tokio::test]
async fn ask_user_question_round_trip() {
    let h = harness(
        vec![
            vec!["[TOOL:ask_user]\n```json\n{\"question\":\"테스트도 고칠까요?\",\"options\":[\"yes\",\"no\"]}\n```"],
            vec!["알겠습니다, 테스트도 고치겠습니다."],
        ],
        20,
    );

    let (tx, mut rx) = mpsc::channel(256);
    h.controller
        .run_turn(&h.session, "fix it", tx.clone(), CancellationToken::new())
        .await;

    let events = drain(&mut rx);
    let confirmation_id = events
        .iter()
        .find_map(|e| match e {
            ServerMessage::Question {
                confirmation_id,
                question,
                options,
                ..
            } => {
                assert_eq!(question, "테스트도 고칠까요?");
                assert_eq!(options.as_ref().unwrap().len(), 2);
                Some(confirmation_id.clone())
            }
            _ => None,
        })
        .unwrap();

    h.controller
        .resume_question(&h.session, &confirmation_id, "yes", tx, CancellationToken::new())
        .await;

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        ServerMessage::ToolResult { result, .. } if result["answer"] == "yes"
    )));
    assert_eq!(tag(events.last().unwrap()), "done");
    let _ = std::fs::remove_dir_all(&h.dir);
}

#[tokio::test]
async fn cancel_before_turn_emits_cancelled() {
    let h = harness(vec![vec!["should not matter"]], 20);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let (tx, mut rx) = mpsc::channel(256);
    h.controller
        .run_turn(&h.session, "anything", tx, cancel)
        .await;

    let events = drain(&mut rx);
    assert_eq!(tag(events.last().unwrap()), "cancelled");
    let _ = std::fs::remove_dir_all(&h.dir);
}
