//! Router wiring for the four conversation routes (spec §6.6).

use crate::handlers;
use crate::state::GatewayState;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

pub fn router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/conversations/:id", post(handlers::create_conversation).delete(handlers::terminate_conversation))
        .route("/conversations/:id/messages", post(handlers::send_message))
        .route("/conversations/:id/ws", get(handlers::conversation_ws))
        .with_state(state)
}
