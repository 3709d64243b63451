//! `WsPushBridge`: the one `PushBridge` implementation, fanning structured messages and
//! stream chunks out to each conversation's connected WebSocket (spec §6.2, §6.6).
//!
//! Grounded on `connection.rs`'s socket-registry pattern: one sender per conversation,
//! registered on WS upgrade, with a later upgrade simply replacing the prior sender so a
//! reconnect takes over delivery (spec §6.6 "one socket at a time; a reconnect replaces it").

use async_trait::async_trait;
use morgana_core::collaborators::{PushBridge, StructuredMessage};
use morgana_core::error::CoreError;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// A frame sent down a conversation's WebSocket. Internally tagged so the wire shape matches
/// spec §6.6: `{"type":"structured",...}` / `{"type":"chunk",...}`.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    Structured(StructuredMessage),
    Chunk(ChunkFrame),
}

#[derive(Clone, Debug, Serialize)]
pub struct ChunkFrame {
    pub text: String,
}

#[derive(Default)]
pub struct WsPushBridge {
    senders: Mutex<HashMap<String, mpsc::UnboundedSender<Frame>>>,
}

impl WsPushBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh sink for `conversation_id`, replacing any prior one (the previous
    /// socket's receiver simply stops getting frames and its task exits on the next send).
    pub fn register(&self, conversation_id: &str) -> mpsc::UnboundedReceiver<Frame> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.lock().unwrap().insert(conversation_id.to_string(), tx);
        rx
    }

    pub fn unregister(&self, conversation_id: &str) {
        self.senders.lock().unwrap().remove(conversation_id);
    }
}

#[async_trait]
impl PushBridge for WsPushBridge {
    async fn send_structured(&self, conversation_id: &str, message: StructuredMessage) -> Result<(), CoreError> {
        let sender = self.senders.lock().unwrap().get(conversation_id).cloned();
        match sender {
            Some(tx) => {
                let _ = tx.send(Frame::Structured(message));
                Ok(())
            }
            None => Err(CoreError::Invariant(format!("no socket registered for {}", conversation_id))),
        }
    }

    async fn send_stream_chunk(&self, conversation_id: &str, chunk_text: &str) -> Result<(), CoreError> {
        let sender = self.senders.lock().unwrap().get(conversation_id).cloned();
        match sender {
            Some(tx) => {
                let _ = tx.send(Frame::Chunk(ChunkFrame { text: chunk_text.to_string() }));
                Ok(())
            }
            None => Err(CoreError::Invariant(format!("no socket registered for {}", conversation_id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_structured_without_registration_errors() {
        let bridge = WsPushBridge::new();
        let message = StructuredMessage {
            text: "hi".to_string(),
            timestamp: chrono::Utc::now(),
            message_type: morgana_core::collaborators::MessageType::Assistant,
            quick_replies: vec![],
            error_reason: None,
            agent_name: None,
            agent_completed: None,
        };
        assert!(bridge.send_structured("missing", message).await.is_err());
    }

    #[tokio::test]
    async fn registered_socket_receives_frames() {
        let bridge = WsPushBridge::new();
        let mut rx = bridge.register("c1");
        bridge.send_stream_chunk("c1", "partial").await.unwrap();
        let frame = rx.recv().await.unwrap();
        match frame {
            Frame::Chunk(c) => assert_eq!(c.text, "partial"),
            _ => panic!("expected chunk frame"),
        }
    }

    #[tokio::test]
    async fn reregistering_replaces_the_sink() {
        let bridge = WsPushBridge::new();
        let mut first = bridge.register("c1");
        let mut second = bridge.register("c1");
        bridge.send_stream_chunk("c1", "to-second").await.unwrap();
        assert!(first.recv().await.is_none() || first.try_recv().is_err());
        let frame = second.recv().await.unwrap();
        match frame {
            Frame::Chunk(c) => assert_eq!(c.text, "to-second"),
            _ => panic!("expected chunk frame"),
        }
    }
}
