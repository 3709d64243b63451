//! Public test doubles for exercising the core end-to-end without real collaborators
//! (SPEC_FULL §10.5). Used by this crate's own integration tests and available to
//! `morgana-persistence`/`morgana-llm`/`morgana-gateway` for their own test suites.

use crate::collaborators::{ChatClient, PersistenceStore, PushBridge, StructuredMessage};
use crate::error::CoreError;
use crate::types::{LlmResponse, Message, ToolSpec};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Returns a fixed, pre-scripted response (or a cycling sequence of them) regardless of input.
pub struct StubChatClient {
    responses: Mutex<Vec<LlmResponse>>,
    next: std::sync::atomic::AtomicUsize,
}

impl StubChatClient {
    pub fn fixed(content: impl Into<String>) -> Self {
        Self::sequence(vec![LlmResponse { content: content.into(), tool_calls: vec![], usage: None }])
    }

    pub fn sequence(responses: Vec<LlmResponse>) -> Self {
        Self { responses: Mutex::new(responses), next: std::sync::atomic::AtomicUsize::new(0) }
    }
}

#[async_trait]
impl ChatClient for StubChatClient {
    async fn invoke(
        &self,
        _messages: &[Message],
        _tools: &[ToolSpec],
        _tool_choice: crate::collaborators::ToolChoiceMode,
    ) -> Result<LlmResponse, CoreError> {
        let responses = self.responses.lock().await;
        let i = self.next.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(responses[i.min(responses.len() - 1)].clone())
    }
}

/// Keeps turns and the last active agent in memory; never touches disk.
#[derive(Default)]
pub struct InMemoryStore {
    turns: Mutex<Vec<PersistedTurn>>,
    last_active: Mutex<HashMap<String, Option<String>>>,
}

pub struct PersistedTurn {
    pub conversation_id: String,
    pub user_msg: String,
    pub agent_msg: String,
    pub active_agent_after: Option<String>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn turns(&self) -> Vec<String> {
        self.turns.lock().await.iter().map(|t| t.user_msg.clone()).collect()
    }
}

#[async_trait]
impl PersistenceStore for InMemoryStore {
    async fn save_turn(
        &self,
        conversation_id: &str,
        user_msg: &str,
        agent_msg: &str,
        active_agent_after: Option<&str>,
    ) -> Result<(), CoreError> {
        self.turns.lock().await.push(PersistedTurn {
            conversation_id: conversation_id.to_string(),
            user_msg: user_msg.to_string(),
            agent_msg: agent_msg.to_string(),
            active_agent_after: active_agent_after.map(|s| s.to_string()),
        });
        self.last_active
            .lock()
            .await
            .insert(conversation_id.to_string(), active_agent_after.map(|s| s.to_string()));
        Ok(())
    }

    async fn get_last_active_agent(&self, conversation_id: &str) -> Result<Option<String>, CoreError> {
        Ok(self.last_active.lock().await.get(conversation_id).cloned().flatten())
    }
}

/// Collects every structured message and stream chunk sent, for assertions in tests.
#[derive(Default)]
pub struct ChannelPushBridge {
    structured: Mutex<Vec<(String, StructuredMessage)>>,
    chunks: Mutex<Vec<(String, String)>>,
}

impl ChannelPushBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn structured_messages(&self) -> Vec<(String, StructuredMessage)> {
        self.structured.lock().await.clone()
    }

    pub async fn stream_chunks(&self) -> Vec<(String, String)> {
        self.chunks.lock().await.clone()
    }
}

#[async_trait]
impl PushBridge for ChannelPushBridge {
    async fn send_structured(&self, conversation_id: &str, message: StructuredMessage) -> Result<(), CoreError> {
        self.structured.lock().await.push((conversation_id.to_string(), message));
        Ok(())
    }

    async fn send_stream_chunk(&self, conversation_id: &str, chunk_text: &str) -> Result<(), CoreError> {
        self.chunks.lock().await.push((conversation_id.to_string(), chunk_text.to_string()));
        Ok(())
    }
}
