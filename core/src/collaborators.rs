//! External collaborator interfaces (spec §1, §6): `ChatClient`, `PersistenceStore`,
//! `PushBridge`. The core depends only on these traits; concrete implementations
//! (`morgana-llm`, `morgana-persistence`, `morgana-gateway`) depend on the core, not the
//! other way around.

use crate::error::CoreError;
use crate::types::{LlmResponse, Message, ToolSpec};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Controls whether the model may, may not, or must call a tool this turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ToolChoiceMode {
    #[default]
    Auto,
    None,
    Required,
}

/// LLM provider capability (spec §1: "abstracted behind a `ChatClient` capability").
///
/// Mirrors the teacher's `LlmClient` trait shape (`invoke`/`invoke_stream`), generalized with
/// a tool-spec list and tool choice mode since Morgana agents always call with a tool set.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn invoke(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        tool_choice: ToolChoiceMode,
    ) -> Result<LlmResponse, CoreError>;

    /// Streaming variant; default implementation calls `invoke` and forwards the full
    /// content as one chunk, matching the teacher's default-impl fallback.
    async fn invoke_stream(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        tool_choice: ToolChoiceMode,
        chunk_tx: Option<mpsc::Sender<String>>,
    ) -> Result<LlmResponse, CoreError> {
        let response = self.invoke(messages, tools, tool_choice).await?;
        if let Some(tx) = chunk_tx {
            if !response.content.is_empty() {
                let _ = tx.send(response.content.clone()).await;
            }
        }
        Ok(response)
    }
}

/// Append-only persistence of turns and active-agent state (spec §6.5). Opaque to the core
/// beyond these two operations.
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    async fn save_turn(
        &self,
        conversation_id: &str,
        user_msg: &str,
        agent_msg: &str,
        active_agent_after: Option<&str>,
    ) -> Result<(), CoreError>;

    async fn get_last_active_agent(&self, conversation_id: &str) -> Result<Option<String>, CoreError>;
}

/// One structured message delivered to a client (spec §6.2).
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Assistant,
    Presentation,
    System,
    Error,
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct StructuredMessage {
    pub text: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub message_type: MessageType,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub quick_replies: Vec<crate::types::QuickReply>,
    pub error_reason: Option<String>,
    pub agent_name: Option<String>,
    pub agent_completed: Option<bool>,
}

/// Delivery of structured messages and streaming chunks to connected clients (spec §6.2).
#[async_trait]
pub trait PushBridge: Send + Sync {
    async fn send_structured(&self, conversation_id: &str, message: StructuredMessage) -> Result<(), CoreError>;
    async fn send_stream_chunk(&self, conversation_id: &str, chunk_text: &str) -> Result<(), CoreError>;
}
