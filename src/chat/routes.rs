//! Chat widget endpoints: REST sessions and a WebSocket variant.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::model::{LeadRecord, Message};
use super::session::{ChatReply, ChatSession, SessionRegistry};
use super::stage::ConversationStage;
use crate::error::ApiError;

/// Shared state for chat routes.
#[derive(Clone)]
pub struct ChatRouteState {
    pub registry: Arc<SessionRegistry>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenRequest {
    #[serde(default)]
    page_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubmitRequest {
    #[serde(default)]
    content: String,
}

/// Full view of a session for clients that reconnect.
#[derive(Debug, Serialize)]
struct SessionSnapshot {
    session_id: Uuid,
    stage: ConversationStage,
    lead: LeadRecord,
    transcript: Vec<Message>,
    quick_replies: Vec<String>,
    busy: bool,
}

/// POST /api/chat/sessions
async fn open_session(
    State(state): State<ChatRouteState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    // The body is optional.
    let req: OpenRequest = if body.is_empty() {
        OpenRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("Invalid request body: {e}")))?
    };
    let reply = state.registry.open(req.page_url.unwrap_or_default()).await;
    Ok((StatusCode::CREATED, Json(reply)))
}

/// GET /api/chat/sessions/{id}
async fn get_session(
    State(state): State<ChatRouteState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = state.registry.get(id).await?;
    let busy = session.is_busy().await;
    let snapshot = session.snapshot().await;
    let quick_replies = state.registry.quick_replies(snapshot.stage);
    Ok(Json(SessionSnapshot {
        session_id: id,
        stage: snapshot.stage,
        lead: snapshot.lead,
        transcript: snapshot.transcript,
        quick_replies,
        busy,
    }))
}

/// POST /api/chat/sessions/{id}/messages
async fn submit_message(
    State(state): State<ChatRouteState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    let session = state.registry.get(id).await?;
    Ok(Json(session.submit(&req.content).await?))
}

/// POST /api/chat/sessions/{id}/reset
async fn reset_session(
    State(state): State<ChatRouteState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ChatReply>, ApiError> {
    let session = state.registry.get(id).await?;
    Ok(Json(session.reset().await))
}

/// DELETE /api/chat/sessions/{id}
async fn close_session(
    State(state): State<ChatRouteState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.registry.close(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("Chat session {id} not found")))
    }
}

// ── WebSocket protocol ──────────────────────────────────────────────

/// Frame from the widget.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame {
    Message { content: String },
    Reset,
}

/// Frame to the widget.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerFrame {
    Bot {
        content: String,
    },
    Typing,
    Stage {
        stage: ConversationStage,
        quick_replies: Vec<String>,
    },
    Error {
        message: String,
    },
}

fn reply_frames(reply: ChatReply) -> Vec<ServerFrame> {
    if reply.messages.is_empty() {
        return Vec::new();
    }
    let mut frames: Vec<ServerFrame> = reply
        .messages
        .into_iter()
        .map(|m| ServerFrame::Bot { content: m.content })
        .collect();
    frames.push(ServerFrame::Stage {
        stage: reply.stage,
        quick_replies: reply.quick_replies,
    });
    frames
}

#[derive(Debug, Default, Deserialize)]
struct WsQuery {
    #[serde(default)]
    page_url: String,
}

/// GET /ws/chat
async fn ws_chat_handler(
    ws: WebSocketUpgrade,
    State(state): State<ChatRouteState>,
    Query(query): Query<WsQuery>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_chat_socket(socket, state.registry, query.page_url))
}

async fn send_frame(socket: &mut WebSocket, frame: &ServerFrame) -> bool {
    match serde_json::to_string(frame) {
        Ok(json) => socket.send(WsMessage::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "Failed to serialize chat frame");
            true
        }
    }
}

async fn handle_chat_socket(mut socket: WebSocket, registry: Arc<SessionRegistry>, page_url: String) {
    let (session, greeting) = registry.open_detached(page_url);
    let session_id = session.id();
    info!(session_id = %session_id, "Chat widget connected");

    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<ServerFrame>();
    for frame in reply_frames(greeting) {
        let _ = frame_tx.send(frame);
    }

    loop {
        tokio::select! {
            Some(frame) = frame_rx.recv() => {
                if !send_frame(&mut socket, &frame).await {
                    debug!(session_id = %session_id, "Chat widget disconnected during send");
                    break;
                }
            }

            result = socket.recv() => {
                match result {
                    Some(Ok(WsMessage::Text(text))) => {
                        match serde_json::from_str::<ClientFrame>(&text) {
                            Ok(ClientFrame::Message { content }) => {
                                handle_message(&session, content, &frame_tx).await;
                            }
                            Ok(ClientFrame::Reset) => {
                                for frame in reply_frames(session.reset().await) {
                                    let _ = frame_tx.send(frame);
                                }
                            }
                            Err(e) => {
                                debug!(error = %e, "Invalid JSON from chat widget");
                                let _ = frame_tx.send(ServerFrame::Error {
                                    message: "Unrecognized frame".into(),
                                });
                            }
                        }
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        if socket.send(WsMessage::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(session_id = %session_id, error = %e, "Chat WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!(session_id = %session_id, "Chat widget disconnected");
}

/// Run one turn in the background so the socket keeps reading; input that
/// arrives meanwhile is refused by the session.
async fn handle_message(
    session: &Arc<ChatSession>,
    content: String,
    frames: &mpsc::UnboundedSender<ServerFrame>,
) {
    if content.trim().is_empty() {
        return;
    }
    if session.is_busy().await {
        let _ = frames.send(ServerFrame::Error {
            message: "Still answering your previous message".into(),
        });
        return;
    }

    let _ = frames.send(ServerFrame::Typing);
    let session = Arc::clone(session);
    let frames = frames.clone();
    tokio::spawn(async move {
        match session.submit(&content).await {
            Ok(reply) => {
                for frame in reply_frames(reply) {
                    let _ = frames.send(frame);
                }
            }
            Err(e) => {
                let _ = frames.send(ServerFrame::Error {
                    message: e.to_string(),
                });
            }
        }
    });
}

/// Build the chat routes.
pub fn chat_routes(state: ChatRouteState) -> Router {
    Router::new()
        .route("/api/chat/sessions", post(open_session))
        .route(
            "/api/chat/sessions/{id}",
            get(get_session).delete(close_session),
        )
        .route("/api/chat/sessions/{id}/messages", post(submit_message))
        .route("/api/chat/sessions/{id}/reset", post(reset_session))
        .route("/ws/chat", get(ws_chat_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_frames_parse() {
        let msg: ClientFrame =
            serde_json::from_str(r#"{"type":"message","content":"Alex"}"#).unwrap();
        assert!(matches!(msg, ClientFrame::Message { ref content } if content == "Alex"));
        let reset: ClientFrame = serde_json::from_str(r#"{"type":"reset"}"#).unwrap();
        assert!(matches!(reset, ClientFrame::Reset));
    }

    #[test]
    fn server_frames_are_tagged() {
        let typing = serde_json::to_value(ServerFrame::Typing).unwrap();
        assert_eq!(typing, serde_json::json!({"type": "typing"}));

        let stage = serde_json::to_value(ServerFrame::Stage {
            stage: ConversationStage::Email,
            quick_replies: vec![],
        })
        .unwrap();
        assert_eq!(stage["type"], "stage");
        assert_eq!(stage["stage"], "email");
    }

    #[test]
    fn reply_frames_end_with_stage() {
        let reply = ChatReply {
            session_id: Uuid::new_v4(),
            stage: ConversationStage::Service,
            messages: vec![Message::bot("What can we help with?")],
            quick_replies: vec!["Web Development".into()],
        };
        let frames = reply_frames(reply);
        assert_eq!(frames.len(), 2);
        assert!(matches!(frames[0], ServerFrame::Bot { .. }));
        assert!(matches!(
            frames[1],
            ServerFrame::Stage { stage: ConversationStage::Service, .. }
        ));

        let empty = ChatReply {
            session_id: Uuid::new_v4(),
            stage: ConversationStage::Complete,
            messages: vec![],
            quick_replies: vec![],
        };
        assert!(reply_frames(empty).is_empty());
    }
}
