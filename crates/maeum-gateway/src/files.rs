//! File CRUD handlers backing the editor pane

use crate::server::AppState;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use maeum_index::walker::is_ignored_dir;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Editor file size cap.
const FILE_CAP: u64 = 10 * 1024 * 1024;

/// Hidden files still worth showing in the tree.
const HIDDEN_WHITELIST: &[&str] = &[
    ".gitignore",
    ".env.example",
    ".maeum_todos.json",
    ".maeum_plan.json",
];

#[derive(Deserialize)]
pub struct PathQuery {
    #[serde(default)]
    pub path: Option<String>,
}

fn language_of(extension: &str) -> &'static str {
    match extension {
        "py" => "python",
        "js" | "jsx" => "javascript",
        "ts" | "tsx" => "typescript",
        "rs" => "rust",
        "go" => "go",
        "java" => "java",
        "c" | "h" => "c",
        "cpp" | "hpp" => "cpp",
        "rb" => "ruby",
        "sh" => "shell",
        "md" => "markdown",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "html" => "html",
        "css" => "css",
        _ => "plaintext",
    }
}

pub async fn list_files(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PathQuery>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let rel = query.path.as_deref().unwrap_or("");
    let resolved = state
        .txn
        .resolve(if rel.is_empty() { "." } else { rel })
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let read_dir = std::fs::read_dir(&resolved)
        .map_err(|e| (StatusCode::NOT_FOUND, format!("{}: {}", rel, e)))?;

    let mut entries = Vec::new();
    for entry in read_dir.filter_map(|e| e.ok()) {
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if name.starts_with('.') && !HIDDEN_WHITELIST.contains(&name.as_str()) {
            continue;
        }
        if is_dir && is_ignored_dir(&name) {
            continue;
        }
        let meta = entry.metadata().ok();
        let modified = meta
            .as_ref()
            .and_then(|m| m.modified().ok())
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let child_path = if rel.is_empty() {
            name.clone()
        } else {
            format!("{}/{}", rel.trim_end_matches('/'), name)
        };
        entries.push(json!({
            "name": name,
            "path": child_path,
            "is_directory": is_dir,
            "size": meta.as_ref().map(|m| m.len()).unwrap_or(0),
            "modified": modified,
            "extension": if is_dir { "" } else { name.rsplit('.').next().unwrap_or("") },
        }));
    }
    entries.sort_by(|a, b| {
        let dir_order = b["is_directory"]
            .as_bool()
            .cmp(&a["is_directory"].as_bool());
        dir_order.then(
            a["name"]
                .as_str()
                .unwrap_or("")
                .to_lowercase()
                .cmp(&b["name"].as_str().unwrap_or("").to_lowercase()),
        )
    });

    Ok(Json(json!({ "path": rel, "entries": entries })))
}

pub async fn read_file(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PathQuery>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let rel = query
        .path
        .as_deref()
        .ok_or((StatusCode::BAD_REQUEST, "path is required".to_string()))?;
    let resolved = state
        .txn
        .resolve(rel)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let meta = std::fs::metadata(&resolved)
        .map_err(|e| (StatusCode::NOT_FOUND, format!("{}: {}", rel, e)))?;
    if meta.len() > FILE_CAP {
        return Err((
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("{} exceeds the 10 MiB editor cap", rel),
        ));
    }

    let extension = rel.rsplit('.').next().unwrap_or("").to_lowercase();
    if maeum_txn::fileops::is_binary(&resolved) {
        return Ok(Json(json!({
            "path": rel,
            "content": "",
            "is_binary": true,
            "language": "binary",
        })));
    }

    let content = std::fs::read_to_string(&resolved)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(json!({
        "path": rel,
        "content": content,
        "is_binary": false,
        "language": language_of(&extension),
    })))
}

#[derive(Deserialize)]
pub struct SaveBody {
    pub path: String,
    pub content: String,
}

/// Editor save goes through the transaction manager so it is undoable like
/// any agent edit.
pub async fn save_file(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SaveBody>,
) -> Result<Json<Value>, (StatusCode, String)> {
    stage_and_commit(&state, &format!("save {}", body.path), |txn| {
        txn.stage_write(&body.path, &body.content).map(|_| ())
    })?;
    Ok(Json(json!({ "saved": body.path })))
}

#[derive(Deserialize)]
pub struct CreateBody {
    pub path: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub is_directory: bool,
}

pub async fn create_file(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateBody>,
) -> Result<Json<Value>, (StatusCode, String)> {
    if body.is_directory {
        let resolved = state
            .txn
            .resolve(&body.path)
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
        std::fs::create_dir_all(&resolved)
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
        return Ok(Json(json!({ "created": body.path, "is_directory": true })));
    }

    let content = body.content.unwrap_or_default();
    stage_and_commit(&state, &format!("create {}", body.path), |txn| {
        txn.stage_write(&body.path, &content).map(|_| ())
    })?;
    Ok(Json(json!({ "created": body.path, "is_directory": false })))
}

#[derive(Deserialize)]
pub struct RenameBody {
    pub old_path: String,
    pub new_path: String,
}

pub async fn rename_file(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RenameBody>,
) -> Result<Json<Value>, (StatusCode, String)> {
    stage_and_commit(
        &state,
        &format!("rename {} -> {}", body.old_path, body.new_path),
        |txn| txn.stage_rename(&body.old_path, &body.new_path),
    )?;
    Ok(Json(json!({ "renamed": body.old_path, "to": body.new_path })))
}

pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PathQuery>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let rel = query
        .path
        .ok_or((StatusCode::BAD_REQUEST, "path is required".to_string()))?;
    stage_and_commit(&state, &format!("delete {}", rel), |txn| {
        txn.stage_delete(&rel)
    })?;
    Ok(Json(json!({ "deleted": rel })))
}

/// begin/stage/commit with rollback on stage failure, mapped to HTTP errors.
fn stage_and_commit<F>(
    state: &AppState,
    description: &str,
    stage: F,
) -> Result<(), (StatusCode, String)>
where
    F: FnOnce(&maeum_txn::TransactionManager) -> Result<(), maeum_txn::TxnError>,
{
    state
        .txn
        .begin(description)
        .map_err(|e| (StatusCode::CONFLICT, e.to_string()))?;
    if let Err(e) = stage(&state.txn) {
        let _ = state.txn.rollback();
        return Err((StatusCode::BAD_REQUEST, e.to_string()));
    }
    state
        .txn
        .commit(false)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(())
}
