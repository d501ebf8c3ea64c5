//! Session state - conversation, hints, confirmations, and the symbol cache

use dashmap::DashMap;
use maeum_core::protocol::FileHint;
use maeum_core::{Message, SessionKey, ToolCall};
use maeum_index::symbols::Extraction;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Suspended loop snapshot, parked while a destructive tool awaits the
/// user's verdict (or ask_user awaits an answer).
#[derive(Clone, Debug)]
pub struct ParkedLoopState {
    pub system_prompt: String,
    pub user_message: String,
    pub accumulated_response: String,
    pub iteration_index: usize,
    pub exploration_count: usize,
    pub pending_tool: ToolCall,
}

/// Editor context the UI sends along with a chat message. Advisory only.
#[derive(Clone, Debug, Default)]
pub struct EditorHints {
    pub current_file: Option<FileHint>,
    pub open_tabs: Vec<String>,
    pub recent_context: Option<String>,
}

pub struct Session {
    pub key: SessionKey,
    conversation: RwLock<Vec<Message>>,
    compressed_summary: RwLock<String>,
    pending_confirmations: DashMap<String, ParkedLoopState>,
    abort_requested: AtomicBool,
    hints: RwLock<EditorHints>,
    exploration_count: AtomicUsize,
    /// Files read this session, with their extracted symbols.
    symbol_cache: RwLock<HashMap<String, Extraction>>,
}

impl Session {
    pub fn new(key: SessionKey) -> Self {
        Self {
            key,
            conversation: RwLock::new(Vec::new()),
            compressed_summary: RwLock::new(String::new()),
            pending_confirmations: DashMap::new(),
            abort_requested: AtomicBool::new(false),
            hints: RwLock::new(EditorHints::default()),
            exploration_count: AtomicUsize::new(0),
            symbol_cache: RwLock::new(HashMap::new()),
        }
    }

    // --- conversation ---

    pub async fn push_message(&self, message: Message) {
        self.conversation.write().await.push(message);
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.conversation.read().await.clone()
    }

    pub async fn message_count(&self) -> usize {
        self.conversation.read().await.len()
    }

    /// Replace everything but the newest `keep` messages with a summary.
    pub async fn compress_to(&self, summary: String, keep: usize) {
        let mut conversation = self.conversation.write().await;
        let len = conversation.len();
        if len > keep {
            conversation.drain(..len - keep);
        }
        drop(conversation);
        *self.compressed_summary.write().await = summary;
    }

    pub async fn compressed_summary(&self) -> String {
        self.compressed_summary.read().await.clone()
    }

    // --- abort flag: single writer (UI), single reader (loop) ---

    pub fn request_abort(&self) {
        self.abort_requested.store(true, Ordering::SeqCst);
    }

    pub fn abort_requested(&self) -> bool {
        self.abort_requested.load(Ordering::SeqCst)
    }

    /// Cleared at the start of each user turn.
    pub fn clear_abort(&self) {
        self.abort_requested.store(false, Ordering::SeqCst);
    }

    // --- exploration budget (reset per user turn) ---

    pub fn reset_exploration(&self) {
        self.exploration_count.store(0, Ordering::SeqCst);
    }

    pub fn exploration_count(&self) -> usize {
        self.exploration_count.load(Ordering::SeqCst)
    }

    pub fn bump_exploration(&self) -> usize {
        self.exploration_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn set_exploration(&self, value: usize) {
        self.exploration_count.store(value, Ordering::SeqCst);
    }

    // --- confirmations ---

    pub fn park(&self, confirmation_id: String, state: ParkedLoopState) {
        info!(
            "session {}: parked '{}' under {}",
            self.key, state.pending_tool.name, confirmation_id
        );
        self.pending_confirmations.insert(confirmation_id, state);
    }

    pub fn take_parked(&self, confirmation_id: &str) -> Option<ParkedLoopState> {
        self.pending_confirmations
            .remove(confirmation_id)
            .map(|(_, s)| s)
    }

    pub fn pending_count(&self) -> usize {
        self.pending_confirmations.len()
    }

    /// The single pending confirmation id, if any. Used to route a chat
    /// message as an ask_user answer.
    pub fn sole_pending_id(&self) -> Option<String> {
        self.pending_confirmations
            .iter()
            .next()
            .map(|e| e.key().clone())
    }

    /// Pending ask_user confirmation, if that is what the loop is parked on.
    /// The next chat message is routed there as the user's answer.
    pub fn pending_question_id(&self) -> Option<String> {
        self.pending_confirmations
            .iter()
            .find(|e| e.value().pending_tool.name == "ask_user")
            .map(|e| e.key().clone())
    }

    // --- editor hints ---

    pub async fn set_hints(&self, hints: EditorHints) {
        *self.hints.write().await = hints;
    }

    pub async fn hints(&self) -> EditorHints {
        self.hints.read().await.clone()
    }

    // --- symbol cache ---

    pub async fn cache_symbols(&self, path: &str, extraction: Extraction) {
        self.symbol_cache
            .write()
            .await
            .insert(path.to_string(), extraction);
    }

    pub async fn has_cached_symbols(&self, path: &str) -> bool {
        self.symbol_cache.read().await.contains_key(path)
    }

    pub async fn symbol_cache_snapshot(&self) -> Vec<(String, Extraction)> {
        let cache = self.symbol_cache.read().await;
        let mut entries: Vec<_> = cache
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

pub struct SessionRegistry {
    sessions: DashMap<SessionKey, Arc<Session>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    pub fn get_or_create(&self, key: &SessionKey) -> Arc<Session> {
        self.sessions
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Session::new(key.clone())))
            .clone()
    }

    pub fn get(&self, key: &SessionKey) -> Option<Arc<Session>> {
        self.sessions.get(key).map(|s| s.clone())
    }

    pub fn remove(&self, key: &SessionKey) -> Option<Arc<Session>> {
        self.sessions.remove(key).map(|(_, s)| s)
    }

    pub fn list(&self) -> Vec<SessionKey> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }
}
