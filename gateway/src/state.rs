//! Shared process-wide state: the collaborators and registries built once at start, plus the
//! live per-conversation `Manager` handles (spec §6.6 "owns no orchestration logic, only
//! (de)serialization and socket bookkeeping").

use crate::push_bridge::WsPushBridge;
use morgana_core::actor::Handle;
use morgana_core::classifier::{Classifier, IntentDescriptor};
use morgana_core::collaborators::ChatClient;
use morgana_core::collaborators::PersistenceStore;
use morgana_core::guard::Guard;
use morgana_core::manager::{self, ManagerConfig, ManagerMessage};
use morgana_core::registry::AgentRegistry;
use morgana_core::router::{self, RouterConfig};
use morgana_core::supervisor::SupervisorConfig;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Agent think/act/observe loop bound (spec §4.6); not part of §6.4's enumerated config, since
/// it governs per-call tool iteration rather than anything a client configures.
pub const MAX_TOOL_ITERATIONS: usize = 6;

/// Guard's LLM policy stage timeout (spec §4.3); likewise internal to the pipeline, not a
/// client-facing setting.
pub const GUARD_LLM_TIMEOUT: Duration = Duration::from_secs(5);

const DEFAULT_GUARD_PROMPT: &str = "Decide whether the user's message complies with policy. \
Respond with JSON {\"compliant\": bool, \"violation\": string|null}.";
const DEFAULT_CLASSIFIER_PROMPT: &str = "Classify the user's message against the available \
intents. Respond with JSON {\"intent\": string, \"confidence\": number}.";
const DEFAULT_PRESENTATION_PROMPT: &str = "Greet the user and briefly describe what you can \
help with.";

pub struct GatewayState {
    pub config: morgana_config::MorganaConfig,
    pub chat_client: Arc<dyn ChatClient>,
    pub persistence: Arc<dyn PersistenceStore>,
    pub agent_registry: Arc<AgentRegistry>,
    pub intents: Vec<IntentDescriptor>,
    pub push_bridge: Arc<WsPushBridge>,
    pub conversations: Mutex<HashMap<String, Handle<ManagerMessage>>>,
}

impl GatewayState {
    fn prompt(&self, key: &str, default: &str) -> String {
        self.config.prompts.get(key).cloned().unwrap_or_else(|| default.to_string())
    }

    /// Builds a fresh Guard/Classifier/Router/Supervisor/Manager subtree for `conversation_id`
    /// and records its handle, replacing any prior handle for the same id.
    pub async fn spawn_conversation(self: &Arc<Self>, conversation_id: String) -> Handle<ManagerMessage> {
        let guard = Arc::new(Guard::new(
            self.chat_client.clone(),
            self.config.profanity_terms.clone(),
            self.prompt("guard", DEFAULT_GUARD_PROMPT),
            GUARD_LLM_TIMEOUT,
        ));
        let classifier = Arc::new(Classifier::new(self.chat_client.clone(), self.prompt("classifier", DEFAULT_CLASSIFIER_PROMPT)));
        let router_handle = router::spawn(RouterConfig {
            conversation_id: conversation_id.clone(),
            agent_registry: self.agent_registry.clone(),
            chat_client: self.chat_client.clone(),
            interactive_token: self.config.interactive_token.clone(),
            max_tool_iterations: MAX_TOOL_ITERATIONS,
        });
        let supervisor_config = SupervisorConfig {
            conversation_id: conversation_id.clone(),
            guard,
            classifier,
            router: router_handle,
            intents: clone_intents(&self.intents),
            chat_client: self.chat_client.clone(),
            presentation_prompt: self.prompt("presentation", DEFAULT_PRESENTATION_PROMPT),
        };
        let manager_handle = manager::spawn(ManagerConfig {
            conversation_id: conversation_id.clone(),
            supervisor_config,
            persistence: self.persistence.clone(),
            push_bridge: self.push_bridge.clone(),
            idle_timeout: Duration::from_secs(self.config.idle_timeout_seconds),
            turn_timeout: Duration::from_secs(self.config.turn_timeout_seconds),
        });
        self.conversations.lock().await.insert(conversation_id, manager_handle.clone());
        manager_handle
    }

    pub async fn get_conversation(&self, conversation_id: &str) -> Option<Handle<ManagerMessage>> {
        self.conversations.lock().await.get(conversation_id).cloned()
    }

    pub async fn remove_conversation(&self, conversation_id: &str) {
        self.conversations.lock().await.remove(conversation_id);
        self.push_bridge.unregister(conversation_id);
    }
}

fn clone_intents(intents: &[IntentDescriptor]) -> Vec<IntentDescriptor> {
    intents.iter().map(|i| IntentDescriptor { name: i.name.clone(), description: i.description.clone() }).collect()
}
