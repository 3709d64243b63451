//! HTTP + WebSocket transport binding for Morgana (spec §6.6).
//!
//! Owns no orchestration logic: it deserializes requests into `ManagerMessage`s, forwards
//! them to the right conversation's `Manager` handle, and serializes `PushBridge` output back
//! out over each conversation's WebSocket.
//!
//! **Public API**: [`run_gateway`], [`run_gateway_on_listener`].

mod app;
mod handlers;
mod push_bridge;
mod state;

use morgana_config::MorganaConfig;
use morgana_core::classifier::IntentDescriptor;
use morgana_core::collaborators::ChatClient;
use morgana_core::collaborators::PersistenceStore;
use morgana_core::registry::AgentRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::info;

pub use push_bridge::{ChunkFrame, Frame, WsPushBridge};
pub use state::GatewayState;

/// Exposes the route table directly for in-process route tests (`tower::ServiceExt::oneshot`),
/// without binding a real socket.
pub fn test_router(state: Arc<GatewayState>) -> axum::Router {
    app::router(state)
}

const DEFAULT_ADDR: &str = "127.0.0.1:8080";

fn intents_from_config(config: &MorganaConfig) -> Vec<IntentDescriptor> {
    config
        .intents
        .iter()
        .map(|i| IntentDescriptor { name: i.name.clone(), description: i.description.clone() })
        .collect()
}

/// Builds process-wide gateway state from its collaborators and configuration.
pub fn build_state(
    config: MorganaConfig,
    chat_client: Arc<dyn ChatClient>,
    persistence: Arc<dyn PersistenceStore>,
    agent_registry: Arc<AgentRegistry>,
) -> Arc<GatewayState> {
    let intents = intents_from_config(&config);
    Arc::new(GatewayState {
        config,
        chat_client,
        persistence,
        agent_registry,
        intents,
        push_bridge: Arc::new(WsPushBridge::new()),
        conversations: Mutex::new(HashMap::new()),
    })
}

/// Runs the gateway on an existing listener. Used by tests (bind to 127.0.0.1:0, then pass
/// the listener so the ephemeral port can be read back before serving).
pub async fn run_gateway_on_listener(
    listener: TcpListener,
    state: Arc<GatewayState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = listener.local_addr()?;
    info!("gateway listening on http://{}", addr);
    let router = app::router(state);
    axum::serve(listener, router).await?;
    Ok(())
}

/// Runs the gateway. Listens on `addr` (default `127.0.0.1:8080`).
pub async fn run_gateway(
    addr: Option<&str>,
    state: Arc<GatewayState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = addr.unwrap_or(DEFAULT_ADDR);
    let listener = TcpListener::bind(addr).await?;
    run_gateway_on_listener(listener, state).await
}
