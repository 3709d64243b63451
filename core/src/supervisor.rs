//! Turn state machine, one per conversation (spec §4.2).
//!
//! Implemented as a single mailbox-processing task: because it handles one `UserMessage` to
//! completion before taking the next, the explicit `Idle/AwaitingGuard/AwaitingClassification/
//! AwaitingRouter/AwaitingAgentFollowUp` states from the spec collapse into the control flow of
//! one async function rather than a literal enum — the mailbox FIFO is what gives the "at most
//! one in-flight turn per conversation" guarantee, not a state field.
//!
//! Open question resolved here: the spec says a follow-up turn (`ActiveAgentSlot` set) skips
//! "Guard/Classifier/Router". We skip Guard and Classifier but still address the active agent
//! through the Router, passing a synthetic `Classification{intent, confidence: 1.0}` — Router
//! is the sole owner of the per-conversation agent cache (spec §4.5), and re-deriving that
//! ownership in the Supervisor would duplicate state two components are allowed to see.

use crate::actor::{mailbox, Handle};
use crate::classifier::{Classifier, IntentDescriptor};
use crate::collaborators::{ChatClient, MessageType, StructuredMessage};
use crate::guard::Guard;
use crate::json_parse::parse_lenient;
use crate::router::RouterMessage;
use crate::types::{Classification, QuickReply, ToolSpec};
use morgana_wire::TraceContext;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::oneshot;

pub enum SupervisorMessage {
    UserMessage { text: String, trace_context: Option<TraceContext>, reply: oneshot::Sender<StructuredMessage> },
    GeneratePresentation { reply: oneshot::Sender<StructuredMessage> },
    /// Sets `ActiveAgentSlot` from persisted state on a resumed conversation, without
    /// re-running Guard/Classifier/Router (spec §4.1 "RestoreActiveAgent").
    RestoreActiveAgent { intent: String },
}

pub struct SupervisorConfig {
    pub conversation_id: String,
    pub guard: Arc<Guard>,
    pub classifier: Arc<Classifier>,
    pub router: Handle<RouterMessage>,
    pub intents: Vec<IntentDescriptor>,
    pub chat_client: Arc<dyn ChatClient>,
    pub presentation_prompt: String,
}

#[derive(Deserialize)]
struct PresentationResponse {
    message: String,
    #[serde(default, rename = "quickReplies")]
    quick_replies: Vec<String>,
}

struct Supervisor {
    config: SupervisorConfig,
    active_agent_slot: Option<String>,
}

impl Supervisor {
    pub fn spawn(config: SupervisorConfig) -> Handle<SupervisorMessage> {
        let (handle, mut mb) = mailbox::<SupervisorMessage>();
        tokio::spawn(async move {
            let mut supervisor = Supervisor { config, active_agent_slot: None };
            while let Some(msg) = mb.recv().await {
                supervisor.handle_message(msg).await;
            }
        });
        handle
    }

    async fn handle_message(&mut self, msg: SupervisorMessage) {
        match msg {
            SupervisorMessage::UserMessage { text, trace_context, reply } => {
                tracing::debug!(
                    conversation_id = %self.config.conversation_id,
                    trace_context = trace_context.as_ref().map(|tc| tc.as_hex_digest()).as_deref(),
                    "supervisor: user message received"
                );
                let response = self.process_turn(text, trace_context).await;
                tracing::info!(conversation_id = %self.config.conversation_id, "supervisor: turn settled");
                let _ = reply.send(response);
            }
            SupervisorMessage::GeneratePresentation { reply } => {
                let response = self.generate_presentation().await;
                let _ = reply.send(response);
            }
            SupervisorMessage::RestoreActiveAgent { intent } => {
                tracing::info!(conversation_id = %self.config.conversation_id, intent, "supervisor: active agent restored");
                self.active_agent_slot = Some(intent);
            }
        }
    }

    async fn process_turn(&mut self, text: String, trace_context: Option<TraceContext>) -> StructuredMessage {
        if let Some(intent) = self.active_agent_slot.clone() {
            let classification = Classification { intent, confidence: 1.0, metadata: Default::default() };
            return self.route_and_finalize(classification, text, trace_context).await;
        }

        let verdict = self.config.guard.check(&text).await;
        if !verdict.compliant {
            tracing::warn!(
                conversation_id = %self.config.conversation_id,
                violation = verdict.violation.as_deref(),
                "supervisor: guard denied turn"
            );
            return StructuredMessage {
                text: format!(
                    "I can't help with that{}.",
                    verdict.violation.map(|v| format!(" ({})", v)).unwrap_or_default()
                ),
                timestamp: now(),
                message_type: MessageType::Error,
                quick_replies: vec![],
                error_reason: Some("policy_violation".to_string()),
                agent_name: None,
                agent_completed: None,
            };
        }

        let classification = self.config.classifier.classify(&text, &self.config.intents).await;
        self.route_and_finalize(classification, text, trace_context).await
    }

    async fn route_and_finalize(
        &mut self,
        classification: Classification,
        text: String,
        trace_context: Option<TraceContext>,
    ) -> StructuredMessage {
        let (tx, rx) = oneshot::channel();
        let intent = classification.intent.clone();
        if self
            .config
            .router
            .tell(RouterMessage::Route { classification, text, trace_context, reply: tx })
            .is_err()
        {
            tracing::error!(conversation_id = %self.config.conversation_id, "supervisor: router mailbox closed");
            self.active_agent_slot = None;
            return generic_error_message();
        }
        let response = match rx.await {
            Ok(r) => r,
            Err(_) => {
                tracing::error!(conversation_id = %self.config.conversation_id, "supervisor: router subtree failed to reply");
                return generic_error_message();
            }
        };

        self.active_agent_slot = if response.is_completed { None } else { Some(intent.clone()) };

        StructuredMessage {
            text: response.text,
            timestamp: now(),
            message_type: MessageType::Assistant,
            quick_replies: response.quick_replies,
            error_reason: None,
            agent_name: Some(intent),
            agent_completed: Some(response.is_completed),
        }
    }

    async fn generate_presentation(&self) -> StructuredMessage {
        let prompt = format!(
            "{}\n\nRespond with JSON {{\"message\": string, \"quickReplies\": [string]}}.",
            self.config.presentation_prompt
        );
        let messages = vec![crate::types::Message::system(prompt)];
        let empty_tools: &[ToolSpec] = &[];
        let invoked = self
            .config
            .chat_client
            .invoke(&messages, empty_tools, Default::default())
            .await;

        let (text, quick_replies) = match invoked.ok().and_then(|r| parse_lenient::<PresentationResponse>(&r.content)) {
            Some(parsed) if !parsed.quick_replies.is_empty() => {
                let replies = parsed
                    .quick_replies
                    .into_iter()
                    .map(|label| QuickReply { id: label.clone(), label: label.clone(), value: label, terminal: false })
                    .collect();
                (parsed.message, replies)
            }
            Some(parsed) => (parsed.message, intent_quick_replies(&self.config.intents)),
            None => ("How can I help you today?".to_string(), intent_quick_replies(&self.config.intents)),
        };

        StructuredMessage {
            text,
            timestamp: now(),
            message_type: MessageType::Presentation,
            quick_replies,
            error_reason: None,
            agent_name: None,
            agent_completed: None,
        }
    }
}

fn intent_quick_replies(intents: &[IntentDescriptor]) -> Vec<QuickReply> {
    intents
        .iter()
        .map(|i| QuickReply { id: i.name.clone(), label: i.description.clone(), value: i.name.clone(), terminal: false })
        .collect()
}

fn generic_error_message() -> StructuredMessage {
    StructuredMessage {
        text: "Sorry, something went wrong handling your request. Please try again.".to_string(),
        timestamp: now(),
        message_type: MessageType::Error,
        quick_replies: vec![],
        error_reason: Some("internal".to_string()),
        agent_name: None,
        agent_completed: None,
    }
}

fn now() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}

/// Spawns a Supervisor actor for one conversation and returns its handle.
pub fn spawn(config: SupervisorConfig) -> Handle<SupervisorMessage> {
    Supervisor::spawn(config)
}
