//! Route-level tests against the axum router directly (no real socket), grounded on the
//! `tower::ServiceExt::oneshot` pattern for exercising an axum `Router` in-process.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use morgana_config::MorganaConfig;
use morgana_core::registry::AgentRegistry;
use morgana_core::testing::{InMemoryStore, StubChatClient};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn test_state() -> Arc<morgana_gateway::GatewayState> {
    morgana_gateway::build_state(
        MorganaConfig::default(),
        Arc::new(StubChatClient::fixed("not json, exercises every fail-open/fallback path")),
        Arc::new(InMemoryStore::new()),
        Arc::new(AgentRegistry::new()),
    )
}

async fn app(state: Arc<morgana_gateway::GatewayState>) -> axum::Router {
    morgana_gateway::test_router(state)
}

#[tokio::test]
async fn create_conversation_returns_created() {
    let state = test_state();
    let router = app(state).await;
    let response = router
        .oneshot(Request::builder().method("POST").uri("/conversations/c1").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn send_message_to_unknown_conversation_is_not_found() {
    let state = test_state();
    let router = app(state).await;
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/conversations/missing/messages")
                .header("content-type", "application/json")
                .body(Body::from("{\"text\":\"hi\"}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn full_turn_round_trips_through_persistence() {
    let state = test_state();
    let persistence = morgana_core::testing::InMemoryStore::new();
    let persistence = Arc::new(persistence);
    let state = morgana_gateway::build_state(
        MorganaConfig::default(),
        Arc::new(StubChatClient::fixed("not json")),
        persistence.clone(),
        Arc::new(AgentRegistry::new()),
    );
    let router = app(state).await;

    let create = router
        .clone()
        .oneshot(Request::builder().method("POST").uri("/conversations/c2?resume=false").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(create.status(), StatusCode::CREATED);

    let send = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/conversations/c2/messages")
                .header("content-type", "application/json")
                .body(Body::from("{\"text\":\"show my invoices\"}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(send.status(), StatusCode::ACCEPTED);

    let mut turns = Vec::new();
    for _ in 0..50 {
        turns = persistence.turns().await;
        if !turns.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(turns, vec!["show my invoices".to_string()]);

    let terminate = router
        .oneshot(Request::builder().method("DELETE").uri("/conversations/c2").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(terminate.status(), StatusCode::NO_CONTENT);
}
