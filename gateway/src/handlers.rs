//! Axum route handlers for the four conversation routes (spec §6.6).

use crate::state::GatewayState;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use futures_util::{SinkExt, StreamExt};
use morgana_core::manager::ManagerMessage;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize)]
pub struct ResumeQuery {
    #[serde(default)]
    pub resume: bool,
}

#[derive(Deserialize)]
pub struct SendMessageBody {
    pub text: String,
}

/// `POST /conversations/:id?resume=bool` — create or resume a conversation.
pub async fn create_conversation(
    State(state): State<Arc<GatewayState>>,
    Path(conversation_id): Path<String>,
    Query(query): Query<ResumeQuery>,
) -> impl IntoResponse {
    let handle = state.spawn_conversation(conversation_id).await;
    let _ = handle.tell(ManagerMessage::CreateConversation { resume: query.resume });
    StatusCode::CREATED
}

/// `POST /conversations/:id/messages` — send a user message, 202 Accepted.
pub async fn send_message(
    State(state): State<Arc<GatewayState>>,
    Path(conversation_id): Path<String>,
    Json(body): Json<SendMessageBody>,
) -> impl IntoResponse {
    let Some(handle) = state.get_conversation(&conversation_id).await else {
        return StatusCode::NOT_FOUND;
    };
    let trace_context = morgana_wire::TraceContext::generate();
    tracing::debug!(
        conversation_id = %conversation_id,
        trace_context = %trace_context.as_hex_digest(),
        "gateway: user message received"
    );
    match handle.tell(ManagerMessage::UserMessage { text: body.text, trace_context: Some(trace_context) }) {
        Ok(()) => StatusCode::ACCEPTED,
        Err(_) => StatusCode::NOT_FOUND,
    }
}

/// `DELETE /conversations/:id` — terminate a conversation.
pub async fn terminate_conversation(
    State(state): State<Arc<GatewayState>>,
    Path(conversation_id): Path<String>,
) -> impl IntoResponse {
    if let Some(handle) = state.get_conversation(&conversation_id).await {
        let _ = handle.tell(ManagerMessage::TerminateConversation);
    }
    state.remove_conversation(&conversation_id).await;
    StatusCode::NO_CONTENT
}

/// `GET /conversations/:id/ws` — upgrade to a WebSocket registered as this conversation's
/// `PushBridge` sink. One socket at a time; a later upgrade replaces the sink (spec §6.6).
pub async fn conversation_ws(
    State(state): State<Arc<GatewayState>>,
    Path(conversation_id): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, conversation_id, socket))
}

async fn handle_socket(state: Arc<GatewayState>, conversation_id: String, socket: WebSocket) {
    let mut rx = state.push_bridge.register(&conversation_id);
    let (mut sink, mut stream) = socket.split();

    let forward = async {
        while let Some(frame) = rx.recv().await {
            let Ok(json) = serde_json::to_string(&frame) else { continue };
            if sink.send(WsMessage::Text(json)).await.is_err() {
                break;
            }
        }
    };

    let drain_incoming = async {
        while let Some(Ok(_)) = stream.next().await {
            // Inbound text is ignored; clients send user turns via the HTTP route (spec §6.6).
        }
    };

    tokio::select! {
        _ = forward => {}
        _ = drain_incoming => {}
    }
    // Deliberately does not unregister here: a concurrent reconnect may have already replaced
    // this socket's sink, and unregistering unconditionally would tear down the new one.
}
