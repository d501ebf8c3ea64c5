//! The /ws/chat WebSocket - one connection per open IDE tab
//!
//! Incoming chat messages drive the loop in a spawned task; events flow back
//! over an mpsc channel and out to the socket. Disconnect is an implicit
//! cancel for the session's active turn.

use crate::server::AppState;
use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::{SinkExt, StreamExt};
use maeum_agent::session::EditorHints;
use maeum_core::{ClientMessage, ServerMessage, SessionKey};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub async fn handle_connection(socket: WebSocket, state: Arc<AppState>) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let session_key = SessionKey::new(format!("ide-{}", Uuid::new_v4()));
    let session = state.sessions.get_or_create(&session_key);
    info!("ws connected: session {}", session_key);

    let (event_tx, mut event_rx) = mpsc::channel::<ServerMessage>(1024);
    let mut turn_cancel: Option<CancellationToken> = None;

    loop {
        tokio::select! {
            incoming = ws_rx.next() => {
                match incoming {
                    Some(Ok(WsMessage::Text(text))) => {
                        handle_client_message(
                            &text,
                            &state,
                            &session,
                            &event_tx,
                            &mut turn_cancel,
                        )
                        .await;
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        // Implicit cancel on disconnect.
                        session.request_abort();
                        if let Some(cancel) = turn_cancel.take() {
                            cancel.cancel();
                        }
                        info!("ws disconnected: session {}", session_key);
                        break;
                    }
                    Some(Ok(_)) => {} // ping/pong/binary
                    Some(Err(e)) => {
                        warn!("ws error: {}", e);
                        session.request_abort();
                        if let Some(cancel) = turn_cancel.take() {
                            cancel.cancel();
                        }
                        break;
                    }
                }
            }

            event = event_rx.recv() => {
                let Some(event) = event else { break };
                match serde_json::to_string(&event) {
                    Ok(json) => {
                        if ws_tx.send(WsMessage::Text(json)).await.is_err() {
                            session.request_abort();
                            if let Some(cancel) = turn_cancel.take() {
                                cancel.cancel();
                            }
                            break;
                        }
                    }
                    Err(e) => warn!("event serialization failed: {}", e),
                }
            }
        }
    }

    state.sessions.remove(&session_key);
}

async fn handle_client_message(
    text: &str,
    state: &Arc<AppState>,
    session: &Arc<maeum_agent::Session>,
    event_tx: &mpsc::Sender<ServerMessage>,
    turn_cancel: &mut Option<CancellationToken>,
) {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            debug!("unparseable ws message: {}", e);
            let _ = event_tx
                .send(ServerMessage::error(format!("invalid message: {}", e)))
                .await;
            return;
        }
    };

    match message {
        ClientMessage::Chat {
            message,
            context,
            current_file,
            open_tabs,
        } => {
            session
                .set_hints(EditorHints {
                    current_file,
                    open_tabs: open_tabs.unwrap_or_default(),
                    recent_context: context,
                })
                .await;

            // A chat while an ask_user question is parked is the answer.
            if let Some(question_id) = session.pending_question_id() {
                let controller = state.controller.clone();
                let session = session.clone();
                let event_tx = event_tx.clone();
                let cancel = CancellationToken::new();
                *turn_cancel = Some(cancel.clone());
                tokio::spawn(async move {
                    controller
                        .resume_question(&session, &question_id, &message, event_tx, cancel)
                        .await;
                });
                return;
            }

            let cancel = CancellationToken::new();
            *turn_cancel = Some(cancel.clone());
            let controller = state.controller.clone();
            let session = session.clone();
            let event_tx = event_tx.clone();
            tokio::spawn(async move {
                controller
                    .run_turn(&session, &message, event_tx, cancel)
                    .await;
            });
        }

        ClientMessage::Cancel => {
            session.request_abort();
            if let Some(cancel) = turn_cancel.take() {
                cancel.cancel();
            }
        }

        ClientMessage::ToolConfirm {
            confirmation_id,
            approved,
        } => {
            let cancel = CancellationToken::new();
            *turn_cancel = Some(cancel.clone());
            let controller = state.controller.clone();
            let session = session.clone();
            let event_tx = event_tx.clone();
            tokio::spawn(async move {
                controller
                    .resume_confirmation(&session, &confirmation_id, approved, event_tx, cancel)
                    .await;
            });
        }
    }
}
