//! Per-intent, per-conversation actor (spec §4.6): owns an LLM session, its chat history,
//! its `ContextProvider`, and its `ToolAdapter`. Agents vary only by intent, tool set, and
//! prompt — one concrete type parameterized by those three, not a class hierarchy (spec §9).

use crate::actor::{mailbox, Handle};
use crate::collaborators::{ChatClient, ToolChoiceMode};
use crate::context_provider::ContextProvider;
use crate::error::CoreError;
use crate::router::RouterMessage;
use crate::tool_adapter::{ToolAdapter, ToolCallContext};
use crate::types::{AgentResponse, Message};
use morgana_wire::TraceContext;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};

pub enum AgentMessage {
    Request { text: String, trace_context: Option<TraceContext>, reply: oneshot::Sender<AgentResponse> },
    ReceiveContextUpdate { source_intent: String, updates: HashMap<String, Value> },
}

pub struct AgentConfig {
    pub conversation_id: String,
    pub intent: String,
    pub system_prompt: String,
    pub interactive_token: String,
    /// Bounds the internal think/act/observe loop so a misbehaving tool-calling LLM cannot
    /// spin forever within one `AgentRequest` (spec §5 "one `AgentRequest` per agent at a time").
    pub max_tool_iterations: usize,
}

pub struct Agent {
    config: AgentConfig,
    chat_client: Arc<dyn ChatClient>,
    tool_adapter: ToolAdapter,
    context: Arc<Mutex<ContextProvider>>,
    tool_ctx: ToolCallContext,
    history: Vec<Message>,
    router: Handle<RouterMessage>,
}

impl Agent {
    pub fn new(
        config: AgentConfig,
        chat_client: Arc<dyn ChatClient>,
        tool_adapter: ToolAdapter,
        context: Arc<Mutex<ContextProvider>>,
        router: Handle<RouterMessage>,
    ) -> Self {
        let history = vec![Message::system(config.system_prompt.clone())];
        let tool_ctx = ToolCallContext::new(context.clone());
        Self { config, chat_client, tool_adapter, context, tool_ctx, history, router }
    }

    /// Spawns the agent's mailbox-processing task and returns a handle to it. The task
    /// processes one `AgentMessage` to completion before taking the next (spec §5).
    pub fn spawn(self) -> Handle<AgentMessage> {
        let (handle, mut mailbox) = mailbox::<AgentMessage>();
        let mut agent = self;
        tokio::spawn(async move {
            while let Some(msg) = mailbox.recv().await {
                agent.handle_message(msg).await;
            }
        });
        handle
    }

    async fn handle_message(&mut self, msg: AgentMessage) {
        match msg {
            AgentMessage::Request { text, trace_context, reply } => {
                tracing::debug!(
                    conversation_id = %self.config.conversation_id,
                    intent = %self.config.intent,
                    trace_context = trace_context.as_ref().map(|tc| tc.as_hex_digest()).as_deref(),
                    "agent: request received"
                );
                let response = self.run_turn(text).await;
                tracing::info!(
                    conversation_id = %self.config.conversation_id,
                    intent = %self.config.intent,
                    is_completed = response.is_completed,
                    "agent: turn finished"
                );
                let _ = reply.send(response);
            }
            AgentMessage::ReceiveContextUpdate { updates, .. } => {
                self.context.lock().await.merge_shared(updates);
            }
        }
    }

    async fn run_turn(&mut self, text: String) -> AgentResponse {
        self.history.push(Message::user(text));
        let tool_specs = self.tool_adapter.specs();
        let mut final_content = String::new();

        for _ in 0..self.config.max_tool_iterations {
            let invoked = self
                .chat_client
                .invoke(&self.history, &tool_specs, ToolChoiceMode::Auto)
                .await;
            let response = match invoked {
                Ok(r) => r,
                Err(e) => return self.generic_error_response(&e),
            };

            if response.tool_calls.is_empty() {
                final_content = response.content;
                break;
            }

            if !response.content.is_empty() {
                self.history.push(Message::assistant(response.content.clone()));
            }
            for call in &response.tool_calls {
                let result_text = self
                    .tool_adapter
                    .call(&call.name, call.arguments.clone(), &self.tool_ctx)
                    .await;
                self.history.push(Message::tool(call.id.clone(), result_text));
            }

            let broadcasts = self.tool_ctx.drain_broadcasts().await;
            if !broadcasts.is_empty() {
                let _ = self.router.tell(RouterMessage::BroadcastContextUpdate {
                    source_intent: self.config.intent.clone(),
                    updates: broadcasts,
                });
            }

            final_content = response.content;
        }

        self.interpret_response(final_content).await
    }

    /// Interprets the model's final text per spec §4.6: an interactive-token or trailing
    /// question or pending quick replies all mean the turn stays open on this agent.
    async fn interpret_response(&self, text: String) -> AgentResponse {
        let has_interactive_token = text
            .to_lowercase()
            .contains(&self.config.interactive_token.to_lowercase());
        let ends_with_question = text.trim().ends_with('?');
        let quick_replies = self.tool_adapter.consume_pending_quick_replies(&self.tool_ctx).await;
        let is_completed = !has_interactive_token && !ends_with_question && quick_replies.is_empty();
        let clean_text = strip_interactive_token(&text, &self.config.interactive_token);
        AgentResponse { text: clean_text, is_completed, quick_replies }
    }

    fn generic_error_response(&self, err: &CoreError) -> AgentResponse {
        tracing::error!(intent = %self.config.intent, error = %err, "agent turn failed");
        AgentResponse {
            text: "Sorry, something went wrong handling your request. Please try again.".to_string(),
            is_completed: true,
            quick_replies: vec![],
        }
    }
}

/// Removes the interactive-token sentinel from user-visible text (case-insensitive, all
/// occurrences). In debug builds the token is left in place so it stays visible during
/// development (spec §4.6 "keep in debug").
fn strip_interactive_token(text: &str, token: &str) -> String {
    if cfg!(debug_assertions) || token.is_empty() {
        return text.to_string();
    }
    let lower_text = text.to_lowercase();
    let lower_token = token.to_lowercase();
    let mut result = String::with_capacity(text.len());
    let mut rest = text;
    let mut lower_rest = lower_text.as_str();
    while let Some(idx) = lower_rest.find(lower_token.as_str()) {
        result.push_str(&rest[..idx]);
        let end = idx + token.len();
        rest = &rest[end..];
        lower_rest = &lower_rest[end..];
    }
    result.push_str(rest);
    result.trim().to_string()
}
