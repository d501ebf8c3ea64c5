//! Prompt assembly and context compression
//!
//! Section order matters; the model is sensitive to adjacency. The system
//! prompt carries the fixed sections (identity, environment, workspace tree,
//! tool catalog); the per-iteration message carries the conversational
//! sections (hints, summary, recent turns, symbol summary, observations).

use crate::session::{EditorHints, Session};
use maeum_core::{Message, Role};
use maeum_index::tree::render_tree;
use maeum_llm::{ChatBackend, ChatRequest};
use maeum_tools::{CatalogEntry, ToolKind};
use std::path::Path;
use tracing::{info, warn};

/// Estimated-token threshold that triggers compression.
pub const COMPRESSION_THRESHOLD: usize = 30_000;

/// Verbatim turns kept after compression.
pub const KEEP_RECENT: usize = 10;

/// Turns rendered verbatim into each prompt.
const RECENT_TURNS: usize = 4;

/// Per-message cap when rendering recent turns.
const TURN_CHAR_CAP: usize = 2_000;

const PREAMBLE: &str = "You are Maeum, a coding agent working in the user's \
local workspace. Explore before you change anything: read the relevant files, \
then act with the smallest sufficient edit. Answer in the user's language and \
keep code in the project's existing language and style.

To use a tool, emit exactly this form and nothing after it:

[TOOL:tool_name]
```json
{ \"parameter\": \"value\" }
```

Emit at most one tool block per response. When the task is complete, reply \
with prose only.";

const SUMMARIZER_SYSTEM: &str = "Summarize the conversation below for a \
coding agent's memory. Produce 5-10 lines covering: files read or modified, \
decisions taken, unresolved issues, and what the user ultimately wants. Plain \
text only.";

/// ceil(1.5 * korean_chars + 0.25 * other_chars)
pub fn estimate_tokens(text: &str) -> usize {
    let mut korean = 0usize;
    let mut other = 0usize;
    for c in text.chars() {
        if matches!(c, '\u{AC00}'..='\u{D7A3}' | '\u{1100}'..='\u{11FF}' | '\u{3130}'..='\u{318F}')
        {
            korean += 1;
        } else {
            other += 1;
        }
    }
    (korean * 3).div_ceil(2) + other.div_ceil(4)
}

pub fn conversation_tokens(messages: &[Message], summary: &str) -> usize {
    messages
        .iter()
        .map(|m| estimate_tokens(&m.content))
        .sum::<usize>()
        + estimate_tokens(summary)
}

/// Sections 1-4: identity, environment, workspace tree, tool catalog.
pub fn build_system_prompt(workspace_root: &Path, catalog: &[CatalogEntry]) -> String {
    let mut out = String::with_capacity(8_192);
    out.push_str(PREAMBLE);

    out.push_str("\n\n## Environment\n");
    out.push_str(&format!(
        "Working directory: {}\nPlatform: {}\n",
        workspace_root.display(),
        std::env::consts::OS
    ));

    out.push_str("\n## Workspace\n");
    out.push_str(&render_tree(workspace_root, 3, 150));
    out.push('\n');

    out.push_str("\n## Tools\n");
    for entry in catalog {
        let marker = match entry.kind {
            ToolKind::ReadOnly => "",
            ToolKind::Destructive => " (requires user approval)",
            ToolKind::Interactive => " (asks the user)",
        };
        out.push_str(&format!("\n### {}{}\n{}\n", entry.name, marker, entry.description));
        out.push_str(&format!(
            "Example:\n[TOOL:{}]\n```json\n{}\n```\n",
            entry.name,
            serde_json::to_string_pretty(&entry.example).unwrap_or_else(|_| "{}".to_string())
        ));
    }

    out
}

fn truncate_turn(content: &str) -> String {
    if content.len() > TURN_CHAR_CAP {
        let mut cut = TURN_CHAR_CAP;
        while !content.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...", &content[..cut])
    } else {
        content.to_string()
    }
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "User",
        Role::Assistant => "Assistant",
        Role::Tool => "Tool result",
        Role::System => "System",
    }
}

/// Sections 5-10 plus the live turn: hints, prior summary, recent turns
/// (which carry this turn's tool observations), symbol summary, and the
/// user's message.
pub async fn build_turn_message(session: &Session, user_message: &str) -> String {
    let mut out = String::with_capacity(4_096);
    let hints = session.hints().await;
    render_hints(&mut out, &hints);

    let summary = session.compressed_summary().await;
    if !summary.is_empty() {
        out.push_str("## Earlier conversation (summarized)\n");
        out.push_str(&summary);
        out.push_str("\n\n");
    }

    let messages = session.messages().await;
    let recent = messages.len().saturating_sub(RECENT_TURNS);
    if messages.len() > recent {
        out.push_str("## Recent turns\n");
        for message in &messages[recent..] {
            out.push_str(&format!(
                "{}: {}\n",
                role_label(message.role),
                truncate_turn(&message.content)
            ));
        }
        out.push('\n');
    }

    let symbol_summary = symbol_summary(session).await;
    if !symbol_summary.is_empty() {
        out.push_str("## Known symbols\n");
        out.push_str(&symbol_summary);
        out.push('\n');
    }

    out.push_str("## Request\n");
    out.push_str(user_message);
    out.push('\n');

    out
}

fn render_hints(out: &mut String, hints: &EditorHints) {
    if let Some(file) = &hints.current_file {
        out.push_str("## Current file\n");
        out.push_str(&format!("Path: {}\n", file.path));
        if let Some(language) = &file.language {
            out.push_str(&format!("Language: {}\n", language));
        }
        if let Some(total) = file.total_lines {
            out.push_str(&format!("Total lines: {}\n", total));
        }
        if let Some(cursor) = file.cursor_line {
            out.push_str(&format!("Cursor at line: {}\n", cursor));
        }
        out.push('\n');
    }
    if !hints.open_tabs.is_empty() {
        out.push_str("## Open tabs\n");
        for tab in &hints.open_tabs {
            out.push_str(&format!("- {}\n", tab));
        }
        out.push('\n');
    }
    if let Some(context) = &hints.recent_context {
        out.push_str("## Editor context\n");
        out.push_str(context);
        out.push_str("\n\n");
    }
}

/// One paragraph per file read this session: classes with methods, up to ten
/// function names, and imports.
async fn symbol_summary(session: &Session) -> String {
    let mut out = String::new();
    for (path, extraction) in session.symbol_cache_snapshot().await {
        let mut parts = Vec::new();
        for symbol in &extraction.symbols {
            if symbol.kind == maeum_index::SymbolKind::Class {
                if symbol.methods.is_empty() {
                    parts.push(format!("class {}", symbol.name));
                } else {
                    parts.push(format!(
                        "class {} ({})",
                        symbol.name,
                        symbol.methods.join(", ")
                    ));
                }
            }
        }
        let functions: Vec<&str> = extraction
            .symbols
            .iter()
            .filter(|s| s.kind == maeum_index::SymbolKind::Function)
            .take(10)
            .map(|s| s.name.as_str())
            .collect();
        if !functions.is_empty() {
            parts.push(format!("functions: {}", functions.join(", ")));
        }
        if !extraction.imports.is_empty() {
            parts.push(format!("imports: {}", extraction.imports.join(", ")));
        }
        if !parts.is_empty() {
            out.push_str(&format!("{}: {}\n", path, parts.join("; ")));
        }
    }
    out
}

/// Compress the session when its estimated size crosses the threshold.
/// Returns true when a compression happened. Failures are non-fatal.
pub async fn maybe_compress(
    session: &Session,
    client: &dyn ChatBackend,
    threshold: usize,
) -> bool {
    let messages = session.messages().await;
    let summary = session.compressed_summary().await;
    if conversation_tokens(&messages, &summary) <= threshold {
        return false;
    }
    if messages.len() <= KEEP_RECENT {
        return false;
    }

    let to_summarize = &messages[..messages.len() - KEEP_RECENT];
    let mut transcript = String::new();
    for message in to_summarize {
        transcript.push_str(&format!(
            "{}: {}\n",
            role_label(message.role),
            truncate_turn(&message.content)
        ));
    }

    let request = ChatRequest::new(transcript).with_system(SUMMARIZER_SYSTEM);
    match client.generate(request).await {
        Ok(digest) => {
            let combined = if summary.is_empty() {
                digest
            } else {
                // Chain digests so nothing is lost across compressions.
                format!("[prior summary] {}\n[new summary] {}", summary, digest)
            };
            session.compress_to(combined, KEEP_RECENT).await;
            info!(
                "session {}: compressed to {} recent turns",
                session.key, KEEP_RECENT
            );
            true
        }
        Err(e) => {
            warn!("context compression failed (continuing uncompressed): {}", e);
            false
        }
    }
}
