//! Explicit registration in place of reflection (spec §9 "Reflection for tool binding").
//!
//! Built once at process start and read-only afterwards (spec §5 "Shared resources"):
//! `AgentRegistry` maps an intent name to the prompt/tools/shared-vars an Agent for that
//! intent should be constructed with; `ToolRegistry` holds the process-wide tool instances
//! (local and MCP-backed) agents draw from; `IntentRegistry` is the list the Classifier
//! prompts against.

use crate::classifier::IntentDescriptor;
use crate::tool_adapter::Tool;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Everything the Router needs to construct an Agent for one intent, on first use.
pub struct AgentFactory {
    pub system_prompt: String,
    pub tools: Vec<Arc<dyn Tool>>,
    pub shared_vars: HashSet<String>,
}

#[derive(Default)]
pub struct AgentRegistry {
    factories: HashMap<String, AgentFactory>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, intent: impl Into<String>, factory: AgentFactory) {
        self.factories.insert(intent.into(), factory);
    }

    pub fn get(&self, intent: &str) -> Option<&AgentFactory> {
        self.factories.get(intent)
    }
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        Self { tools: tools.into_iter().map(|t| (t.name().to_string(), t)).collect() }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn get_many(&self, names: &[String]) -> Vec<Arc<dyn Tool>> {
        names.iter().filter_map(|n| self.get(n)).collect()
    }
}

#[derive(Default)]
pub struct IntentRegistry {
    descriptors: Vec<IntentDescriptor>,
}

impl IntentRegistry {
    pub fn new(descriptors: Vec<IntentDescriptor>) -> Self {
        Self { descriptors }
    }

    pub fn descriptors(&self) -> &[IntentDescriptor] {
        &self.descriptors
    }
}
