//! Router and state wiring for the IDE surface

use crate::{files, ws};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use maeum_agent::{LoopController, LoopDeps, SessionRegistry};
use maeum_core::MaeumConfig;
use maeum_index::{SearchEngine, SearchMode, SearchQuery, WorkspaceIndex};
use maeum_llm::{ClientTransport, SmartClient, TransportConfig};
use maeum_tools::{create_default_registry, ToolDeps};
use maeum_txn::TransactionManager;
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

pub struct AppState {
    pub config: MaeumConfig,
    pub sessions: Arc<SessionRegistry>,
    pub controller: Arc<LoopController>,
    pub index: Arc<WorkspaceIndex>,
    pub engine: Arc<SearchEngine>,
    pub txn: Arc<TransactionManager>,
}

/// Construct the process singletons and wire them together.
pub fn build_state(config: MaeumConfig) -> Arc<AppState> {
    let index = Arc::new(WorkspaceIndex::new(&config.workspace_root));
    let engine = Arc::new(SearchEngine::new(index.clone()));
    let txn = Arc::new(TransactionManager::new(&config.workspace_root));
    let transport = Arc::new(ClientTransport::with_config(TransportConfig {
        base_url: config.backend_url.clone(),
        ..Default::default()
    }));
    let client = Arc::new(SmartClient::new(transport.clone()));

    let tool_deps = ToolDeps {
        workspace_root: config.workspace_root.clone(),
        index: index.clone(),
        engine: engine.clone(),
        txn: txn.clone(),
        transport,
    };
    let registry = Arc::new(create_default_registry(&tool_deps));
    info!("registered tools: {:?}", registry.list());

    let controller = Arc::new(LoopController::new(LoopDeps {
        registry,
        client,
        workspace_root: config.workspace_root.clone(),
        max_iterations: config.max_iterations,
        max_exploration: config.max_exploration,
        compression_threshold: config.compression_threshold,
    }));

    Arc::new(AppState {
        config,
        sessions: Arc::new(SessionRegistry::new()),
        controller,
        index,
        engine,
        txn,
    })
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/workspace", get(workspace_handler))
        .route("/api/files", get(files::list_files))
        .route(
            "/api/file",
            get(files::read_file)
                .post(files::save_file)
                .delete(files::delete_file),
        )
        .route("/api/file/create", post(files::create_file))
        .route("/api/file/rename", post(files::rename_file))
        .route("/api/search", get(search_handler))
        .route("/api/undo", post(undo_handler))
        .route("/api/redo", post(redo_handler))
        .route("/api/history", get(history_handler))
        .route("/api/edit", post(edit_handler))
        .route("/api/edit/batch", post(edit_batch_handler))
        .route("/api/ai/abort", post(abort_handler))
        .route("/ws/chat", get(ws_handler))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any))
        .with_state(state)
}

pub async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("127.0.0.1:{}", state.config.port).parse()?;
    info!("maeum gateway listening on http://{}", addr);
    info!("  websocket: ws://{}/ws/chat", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let app = router(state);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn workspace_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let root = &state.config.workspace_root;
    Json(json!({
        "path": root.display().to_string(),
        "name": root.file_name().map(|n| n.to_string_lossy()).unwrap_or_default(),
    }))
}

#[derive(Deserialize)]
struct SearchParams {
    q: String,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    max_results: Option<usize>,
}

async fn search_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Json<Value> {
    let mode = params.mode.as_deref().unwrap_or("content");
    match mode {
        // File-name search runs over indexed paths directly.
        "file" => {
            let needle = params.q.to_lowercase();
            let mut hits: Vec<_> = state
                .index
                .nodes()
                .into_iter()
                .filter(|n| n.relative_path.to_lowercase().contains(&needle))
                .collect();
            hits.sort_by(|a, b| {
                b.priority
                    .cmp(&a.priority)
                    .then(a.relative_path.cmp(&b.relative_path))
            });
            hits.truncate(params.max_results.unwrap_or(50));
            let results: Vec<Value> = hits
                .into_iter()
                .map(|n| json!({ "file": n.relative_path, "kind": n.kind }))
                .collect();
            Json(json!({
                "query": params.q,
                "mode": "file",
                "count": results.len(),
                "results": results,
            }))
        }
        "symbol" | "content" => {
            let search_mode = if mode == "symbol" {
                SearchMode::Symbol
            } else {
                SearchMode::Exact
            };
            let mut query = SearchQuery::new(&params.q, search_mode);
            if let Some(max) = params.max_results {
                query.max_results = max;
            }
            query.context_lines = 1;
            let response = state.engine.search(query).await;
            Json(json!({
                "query": response.query,
                "mode": mode,
                "count": response.matches.len(),
                "results": response.matches,
                "truncated": response.truncated,
            }))
        }
        other => Json(json!({
            "query": params.q,
            "mode": other,
            "count": 0,
            "results": [],
            "error": format!("unknown search mode: {}", other),
        })),
    }
}

#[derive(Deserialize)]
struct ConfirmParams {
    #[serde(default)]
    confirm: bool,
}

async fn undo_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ConfirmParams>,
) -> Result<Json<Value>, (StatusCode, String)> {
    if !params.confirm {
        return Ok(Json(match state.txn.preview_undo() {
            Some(txn) => json!({ "available": true, "preview": txn.summary() }),
            None => json!({ "available": false }),
        }));
    }
    match state.txn.undo() {
        Ok(txn) => Ok(Json(json!({ "undone": txn.summary(), "id": txn.id }))),
        Err(e) => Err((StatusCode::CONFLICT, e.to_string())),
    }
}

async fn redo_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ConfirmParams>,
) -> Result<Json<Value>, (StatusCode, String)> {
    if !params.confirm {
        return Ok(Json(match state.txn.preview_redo() {
            Some(txn) => json!({ "available": true, "preview": txn.summary() }),
            None => json!({ "available": false }),
        }));
    }
    match state.txn.redo() {
        Ok(txn) => Ok(Json(json!({ "redone": txn.summary(), "id": txn.id }))),
        Err(e) => Err((StatusCode::CONFLICT, e.to_string())),
    }
}

async fn history_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let history: Vec<Value> = state
        .txn
        .history(50)
        .into_iter()
        .map(|txn| {
            json!({
                "id": txn.id,
                "description": txn.description,
                "timestamp": txn.timestamp.to_rfc3339(),
                "summary": txn.summary(),
                "changes": txn.changes.len(),
            })
        })
        .collect();
    Json(json!({ "count": history.len(), "transactions": history }))
}

#[derive(Deserialize)]
struct EditBody {
    path: String,
    old_text: String,
    new_text: String,
}

async fn edit_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<EditBody>,
) -> Result<Json<Value>, (StatusCode, String)> {
    state
        .txn
        .begin(format!("edit {}", body.path))
        .map_err(|e| (StatusCode::CONFLICT, e.to_string()))?;
    if let Err(e) = state
        .txn
        .stage_edit(&body.path, &body.old_text, &body.new_text, false)
    {
        let _ = state.txn.rollback();
        return Err((StatusCode::BAD_REQUEST, e.to_string()));
    }
    let txn = state
        .txn
        .commit(false)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(json!({ "edited": body.path, "transaction_id": txn.id })))
}

#[derive(Deserialize)]
struct EditBatchBody {
    operations: Vec<EditBody>,
    #[serde(default)]
    description: Option<String>,
}

async fn edit_batch_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<EditBatchBody>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let description = body
        .description
        .unwrap_or_else(|| format!("batch edit ({} operations)", body.operations.len()));
    state
        .txn
        .begin(description)
        .map_err(|e| (StatusCode::CONFLICT, e.to_string()))?;
    for op in &body.operations {
        if let Err(e) = state
            .txn
            .stage_edit(&op.path, &op.old_text, &op.new_text, false)
        {
            let _ = state.txn.rollback();
            return Err((
                StatusCode::BAD_REQUEST,
                format!("{}: {}", op.path, e),
            ));
        }
    }
    let txn = state
        .txn
        .commit(false)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(json!({
        "applied": txn.changes.len(),
        "transaction_id": txn.id,
    })))
}

/// Out-of-band abort for every live session.
async fn abort_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let mut aborted = 0;
    for key in state.sessions.list() {
        if let Some(session) = state.sessions.get(&key) {
            session.request_abort();
            aborted += 1;
        }
    }
    Json(json!({ "aborted_sessions": aborted }))
}

async fn ws_handler(
    State(state): State<Arc<AppState>>,
    upgrade: WebSocketUpgrade,
) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| ws::handle_connection(socket, state))
}
