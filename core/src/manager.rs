//! Conversation lifecycle actor, one per conversation (spec §4.1).
//!
//! Owns the idle timer: a single-shot deadline rearmed on every `UserMessage`, raced against
//! the mailbox via `tokio::select!`. Losing that race ends the task, which drops the
//! Supervisor handle and stops the whole per-conversation subtree (spec §4.1 "stop Supervisor,
//! then stop self").

use crate::actor::{mailbox, Handle};
use crate::collaborators::{MessageType, PersistenceStore, PushBridge, StructuredMessage};
use crate::supervisor::{self, SupervisorConfig, SupervisorMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

pub enum ManagerMessage {
    CreateConversation { resume: bool },
    UserMessage { text: String, trace_context: Option<morgana_wire::TraceContext> },
    TerminateConversation,
}

pub struct ManagerConfig {
    pub conversation_id: String,
    pub supervisor_config: SupervisorConfig,
    pub persistence: Arc<dyn PersistenceStore>,
    pub push_bridge: Arc<dyn PushBridge>,
    pub idle_timeout: Duration,
    pub turn_timeout: Duration,
}

/// Spawns a Manager actor for one conversation and returns its handle. The Supervisor (and
/// transitively Guard/Classifier/Router/Agents) are spawned alongside it and torn down with it.
pub fn spawn(config: ManagerConfig) -> Handle<ManagerMessage> {
    let (handle, mut mb) = mailbox::<ManagerMessage>();
    tokio::spawn(async move {
        let ManagerConfig { conversation_id, supervisor_config, persistence, push_bridge, idle_timeout, turn_timeout } = config;
        tracing::info!(conversation_id = %conversation_id, "manager: conversation started");
        let supervisor = supervisor::spawn(supervisor_config);
        let mut deadline = Instant::now() + idle_timeout;

        loop {
            tokio::select! {
                msg = mb.recv() => {
                    let Some(msg) = msg else { break };
                    match msg {
                        ManagerMessage::TerminateConversation => {
                            tracing::info!(conversation_id = %conversation_id, "manager: conversation terminated");
                            break;
                        }
                        ManagerMessage::CreateConversation { resume } => {
                            deadline = Instant::now() + idle_timeout;
                            handle_create(&conversation_id, resume, &supervisor, &persistence, &push_bridge).await;
                        }
                        ManagerMessage::UserMessage { text, trace_context } => {
                            deadline = Instant::now() + idle_timeout;
                            handle_user_message(&conversation_id, text, trace_context, &supervisor, &persistence, &push_bridge, turn_timeout).await;
                        }
                    }
                }
                _ = tokio::time::sleep_until(deadline) => {
                    tracing::info!(conversation_id = %conversation_id, "idle timeout, stopping conversation");
                    break;
                }
            }
        }
    });
    handle
}

async fn handle_create(
    conversation_id: &str,
    resume: bool,
    supervisor: &Handle<SupervisorMessage>,
    persistence: &Arc<dyn PersistenceStore>,
    push_bridge: &Arc<dyn PushBridge>,
) {
    if resume {
        match persistence.get_last_active_agent(conversation_id).await {
            Ok(Some(intent)) => {
                let _ = supervisor.tell(SupervisorMessage::RestoreActiveAgent { intent });
            }
            Ok(None) => {}
            Err(e) => tracing::error!(conversation_id, error = %e, "failed to load last active agent"),
        }
        return;
    }

    let (tx, rx) = oneshot::channel();
    if supervisor.tell(SupervisorMessage::GeneratePresentation { reply: tx }).is_err() {
        return;
    }
    if let Ok(message) = rx.await {
        let _ = push_bridge.send_structured(conversation_id, message).await;
    }
}

async fn handle_user_message(
    conversation_id: &str,
    text: String,
    trace_context: Option<morgana_wire::TraceContext>,
    supervisor: &Handle<SupervisorMessage>,
    persistence: &Arc<dyn PersistenceStore>,
    push_bridge: &Arc<dyn PushBridge>,
    turn_timeout: Duration,
) {
    let trace_digest = trace_context.as_ref().map(|tc| tc.as_hex_digest());
    tracing::debug!(conversation_id, trace_context = trace_digest.as_deref(), "manager: user message received");

    let (tx, rx) = oneshot::channel();
    if supervisor
        .tell(SupervisorMessage::UserMessage { text: text.clone(), trace_context, reply: tx })
        .is_err()
    {
        tracing::error!(conversation_id, "supervisor mailbox closed");
        let _ = push_bridge.send_structured(conversation_id, generic_error_message()).await;
        return;
    }

    let message = match tokio::time::timeout(turn_timeout, rx).await {
        Ok(Ok(message)) => message,
        Ok(Err(_)) => {
            tracing::error!(conversation_id, "supervisor subtree failed to reply");
            generic_error_message()
        }
        Err(_) => {
            tracing::warn!(conversation_id, "turn timed out");
            generic_error_message()
        }
    };

    let agent_name = message.agent_name.clone();
    if let Err(e) = persistence
        .save_turn(conversation_id, &text, &message.text, agent_name.as_deref())
        .await
    {
        tracing::error!(conversation_id, error = %e, "failed to persist turn");
    }
    let _ = push_bridge.send_structured(conversation_id, message).await;
}

fn generic_error_message() -> StructuredMessage {
    StructuredMessage {
        text: "Sorry, something went wrong handling your request. Please try again.".to_string(),
        timestamp: chrono::Utc::now(),
        message_type: MessageType::Error,
        quick_replies: vec![],
        error_reason: Some("internal".to_string()),
        agent_name: None,
        agent_completed: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{Classifier, IntentDescriptor};
    use crate::collaborators::ChatClient;
    use crate::error::CoreError;
    use crate::guard::Guard;
    use crate::registry::{AgentFactory, AgentRegistry};
    use crate::router::{self, RouterConfig};
    use crate::types::{LlmResponse, Message, ToolSpec};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use tokio::sync::Mutex;

    struct ScriptedClient {
        content: String,
    }

    #[async_trait]
    impl ChatClient for ScriptedClient {
        async fn invoke(
            &self,
            _messages: &[Message],
            _tools: &[ToolSpec],
            _tool_choice: crate::collaborators::ToolChoiceMode,
        ) -> Result<LlmResponse, CoreError> {
            Ok(LlmResponse { content: self.content.clone(), tool_calls: vec![], usage: None })
        }
    }

    #[derive(Default)]
    struct InMemoryStore {
        turns: Mutex<Vec<(String, String, String, Option<String>)>>,
        last_active: Mutex<Option<String>>,
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
            self.turns.lock().await.push((
                conversation_id.to_string(),
                user_msg.to_string(),
                agent_msg.to_string(),
                active_agent_after.map(|s| s.to_string()),
            ));
            *self.last_active.lock().await = active_agent_after.map(|s| s.to_string());
            Ok(())
        }

        async fn get_last_active_agent(&self, _conversation_id: &str) -> Result<Option<String>, CoreError> {
            Ok(self.last_active.lock().await.clone())
        }
    }

    #[derive(Default)]
    struct ChannelPushBridge {
        sent: Mutex<Vec<StructuredMessage>>,
    }

    #[async_trait]
    impl PushBridge for ChannelPushBridge {
        async fn send_structured(&self, _conversation_id: &str, message: StructuredMessage) -> Result<(), CoreError> {
            self.sent.lock().await.push(message);
            Ok(())
        }

        async fn send_stream_chunk(&self, _conversation_id: &str, _chunk_text: &str) -> Result<(), CoreError> {
            Ok(())
        }
    }

    fn supervisor_config(agent_content: &str) -> SupervisorConfig {
        let mut registry = AgentRegistry::new();
        registry.register(
            "billing",
            AgentFactory { system_prompt: "billing agent".to_string(), tools: vec![], shared_vars: HashSet::new() },
        );
        let router_handle = router::spawn(RouterConfig {
            conversation_id: "c1".to_string(),
            agent_registry: Arc::new(registry),
            chat_client: Arc::new(ScriptedClient { content: agent_content.to_string() }),
            interactive_token: "#INT#".to_string(),
            max_tool_iterations: 4,
        });
        SupervisorConfig {
            conversation_id: "c1".to_string(),
            guard: Arc::new(Guard::new(
                Arc::new(ScriptedClient { content: "{\"compliant\":true}".to_string() }),
                vec![],
                "policy".to_string(),
                Duration::from_millis(200),
            )),
            classifier: Arc::new(Classifier::new(
                Arc::new(ScriptedClient { content: "{\"intent\":\"billing\",\"confidence\":0.9}".to_string() }),
                "classify".to_string(),
            )),
            router: router_handle,
            intents: vec![IntentDescriptor { name: "billing".to_string(), description: "billing questions".to_string() }],
            chat_client: Arc::new(ScriptedClient { content: "{\"message\":\"Hi!\"}".to_string() }),
            presentation_prompt: "present".to_string(),
        }
    }

    #[tokio::test]
    async fn create_without_resume_pushes_one_presentation_message() {
        let push = Arc::new(ChannelPushBridge::default());
        let persistence = Arc::new(InMemoryStore::default());
        let handle = spawn(ManagerConfig {
            conversation_id: "c1".to_string(),
            supervisor_config: supervisor_config("irrelevant"),
            persistence: persistence.clone(),
            push_bridge: push.clone(),
            idle_timeout: Duration::from_secs(60),
            turn_timeout: Duration::from_secs(5),
        });
        handle.tell(ManagerMessage::CreateConversation { resume: false }).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let sent = push.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].message_type, MessageType::Presentation);
    }

    #[tokio::test]
    async fn user_message_persists_turn_and_pushes_response() {
        let push = Arc::new(ChannelPushBridge::default());
        let persistence = Arc::new(InMemoryStore::default());
        let handle = spawn(ManagerConfig {
            conversation_id: "c1".to_string(),
            supervisor_config: supervisor_config("Here are your invoices."),
            persistence: persistence.clone(),
            push_bridge: push.clone(),
            idle_timeout: Duration::from_secs(60),
            turn_timeout: Duration::from_secs(5),
        });
        handle.tell(ManagerMessage::UserMessage { text: "show my invoices".to_string(), trace_context: None }).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let sent = push.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].agent_name.as_deref(), Some("billing"));
        let turns = persistence.turns.lock().await;
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].1, "show my invoices");
    }

    #[tokio::test]
    async fn resume_restores_active_agent_without_a_push() {
        let push = Arc::new(ChannelPushBridge::default());
        let persistence = Arc::new(InMemoryStore::default());
        *persistence.last_active.lock().await = Some("billing".to_string());
        let handle = spawn(ManagerConfig {
            conversation_id: "c1".to_string(),
            supervisor_config: supervisor_config("Welcome back."),
            persistence: persistence.clone(),
            push_bridge: push.clone(),
            idle_timeout: Duration::from_secs(60),
            turn_timeout: Duration::from_secs(5),
        });
        handle.tell(ManagerMessage::CreateConversation { resume: true }).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(push.sent.lock().await.is_empty());

        handle.tell(ManagerMessage::UserMessage { text: "continue".to_string(), trace_context: None }).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let sent = push.sent.lock().await;
        assert_eq!(sent[0].agent_name.as_deref(), Some("billing"));
    }

    #[tokio::test]
    async fn idle_timeout_stops_the_manager_task() {
        let push = Arc::new(ChannelPushBridge::default());
        let persistence = Arc::new(InMemoryStore::default());
        let handle = spawn(ManagerConfig {
            conversation_id: "c1".to_string(),
            supervisor_config: supervisor_config("irrelevant"),
            persistence,
            push_bridge: push,
            idle_timeout: Duration::from_millis(10),
            turn_timeout: Duration::from_secs(5),
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.tell(ManagerMessage::TerminateConversation).is_err());
    }
}
