//! Uniform wrapper around local tool methods and remote MCP tools (spec §4.7).
//!
//! Grounded on the teacher's `tools::Tool` trait (name/spec/call) and `McpToolAdapter`
//! (wrapping a remote tool behind the same trait with parameter normalization). The actual
//! MCP server implementation is an external collaborator (spec §1); `McpTransport` here is
//! the narrow capability the adapter needs from it (list + call), not the transport itself.

use crate::context_provider::ContextProvider;
use crate::error::CoreError;
use crate::types::ToolSpec;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Per-call context a tool may read: the agent's context store, a reserved sink key for
/// quick replies (spec §4.7 "special sink"), and a buffer of shared-context writes this turn
/// so the Agent can broadcast them after the tool call returns (spec §4.6 "broadcast hook").
pub struct ToolCallContext {
    pub context: Arc<Mutex<ContextProvider>>,
    pub broadcast_buffer: Arc<Mutex<HashMap<String, Value>>>,
}

impl ToolCallContext {
    pub fn new(context: Arc<Mutex<ContextProvider>>) -> Self {
        Self { context, broadcast_buffer: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Writes `key` through the context provider, buffering it for broadcast if the write
    /// landed in shared context (spec §4.6, §4.8).
    pub async fn set_context_variable(&self, key: &str, value: Value) {
        let broadcasts = {
            let mut provider = self.context.lock().await;
            provider.set(key, value.clone())
        };
        if broadcasts {
            self.broadcast_buffer.lock().await.insert(key.to_string(), value);
        }
    }

    /// Drains the buffered shared-context writes accumulated since the last drain.
    pub async fn drain_broadcasts(&self) -> HashMap<String, Value> {
        std::mem::take(&mut *self.broadcast_buffer.lock().await)
    }
}

/// Reserved context key under which `SetQuickReplies` stashes its payload (spec §4.7).
pub const PENDING_QUICK_REPLIES_KEY: &str = "__pending_quick_replies";

/// A single callable tool, uniform whether backed by a local method or a remote MCP tool.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn spec(&self) -> ToolSpec;
    async fn call(&self, args: Value, ctx: &ToolCallContext) -> Result<String, CoreError>;
}

/// Remote tool discovery/invocation capability an MCP collaborator provides. The transport
/// itself (stdio/HTTP JSON-RPC to the MCP server) lives outside the core.
#[async_trait]
pub trait McpTransport: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<crate::types::McpToolDefinition>, CoreError>;
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, CoreError>;
}

/// Configurable thresholds for MCP parameter-key normalization (spec §4.7, §6.4).
#[derive(Clone, Copy, Debug)]
pub struct NormalizationConfig {
    pub min_substring_length: usize,
    pub similarity_ratio: f64,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self { min_substring_length: 4, similarity_ratio: 0.3 }
    }
}

/// Normalizes the keys of `args` against `expected` parameter names using the precedence from
/// spec §4.7: exact → case-insensitive → snake_case↔camelCase → underscore-stripped
/// case-insensitive → single significant substring match. Idempotent: normalizing an
/// already-normalized map is a no-op (spec §8 round-trip law).
pub fn normalize_parameters(
    args: &HashMap<String, Value>,
    expected: &[String],
    cfg: NormalizationConfig,
) -> Result<HashMap<String, Value>, CoreError> {
    let mut out = HashMap::new();
    for expected_name in expected {
        if let Some(v) = args.get(expected_name) {
            out.insert(expected_name.clone(), v.clone());
            continue;
        }
        if let Some((_, v)) = args
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(expected_name))
        {
            out.insert(expected_name.clone(), v.clone());
            continue;
        }
        let transformed_candidates = [to_snake_case(expected_name), to_camel_case(expected_name)];
        if let Some((_, v)) = args.iter().find(|(k, _)| transformed_candidates.contains(k)) {
            out.insert(expected_name.clone(), v.clone());
            continue;
        }
        let expected_stripped = expected_name.replace('_', "").to_lowercase();
        if let Some((_, v)) = args
            .iter()
            .find(|(k, _)| k.replace('_', "").to_lowercase() == expected_stripped)
        {
            out.insert(expected_name.clone(), v.clone());
            continue;
        }
        let matches: Vec<(&String, &Value)> = args
            .iter()
            .filter(|(k, _)| {
                k.len() >= cfg.min_substring_length
                    && substring_similarity(k, expected_name) >= cfg.similarity_ratio
            })
            .collect();
        match matches.len() {
            0 => continue, // missing-parameter error is the caller's concern (required check)
            1 => {
                out.insert(expected_name.clone(), matches[0].1.clone());
            }
            _ => {
                return Err(CoreError::AgentFailed(format!(
                    "ambiguous parameter match for '{}': {} candidates",
                    expected_name,
                    matches.len()
                )));
            }
        }
    }
    Ok(out)
}

fn to_snake_case(s: &str) -> String {
    let mut out = String::new();
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i != 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn to_camel_case(s: &str) -> String {
    let mut out = String::new();
    let mut upper_next = false;
    for c in s.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Fraction of the expected name's characters that appear as a contiguous substring match
/// (case-insensitive) with the candidate key, in either direction.
fn substring_similarity(candidate: &str, expected: &str) -> f64 {
    let c = candidate.to_lowercase();
    let e = expected.to_lowercase();
    if c.contains(&e) {
        return e.len() as f64 / c.len() as f64;
    }
    if e.contains(&c) {
        return c.len() as f64 / e.len() as f64;
    }
    0.0
}

/// A registered tool set for one agent instance: lookup by name, uniform invocation with
/// failure-to-text semantics (spec §4.7 "Failure semantics") and the quick-replies sink.
pub struct ToolAdapter {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolAdapter {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        let map = tools.into_iter().map(|t| (t.name().to_string(), t)).collect();
        Self { tools: map }
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|t| t.spec()).collect()
    }

    /// Invokes `name` with `args`. Any tool failure is caught and turned into a text message
    /// the LLM can reason about — tool failures never propagate past the adapter.
    pub async fn call(&self, name: &str, args: Value, ctx: &ToolCallContext) -> String {
        let Some(tool) = self.tools.get(name) else {
            return format!("Error: unknown tool '{}'", name);
        };
        match tool.call(args, ctx).await {
            Ok(text) => text,
            Err(e) => format!("Error: {}", e),
        }
    }

    /// Reads and removes any quick replies a tool stashed this turn (spec §4.7).
    /// Idempotent: a second call on an empty sink yields an empty list (spec §8).
    pub async fn consume_pending_quick_replies(
        &self,
        ctx: &ToolCallContext,
    ) -> Vec<crate::types::QuickReply> {
        let mut provider = ctx.context.lock().await;
        let Some(value) = provider.get(PENDING_QUICK_REPLIES_KEY).cloned() else {
            return Vec::new();
        };
        provider.drop_key(PENDING_QUICK_REPLIES_KEY);
        serde_json::from_value(value).unwrap_or_default()
    }
}

/// Wraps one remote MCP tool definition behind the uniform `Tool` trait (spec §4.7).
pub struct McpToolAdapter {
    definition: crate::types::McpToolDefinition,
    transport: Arc<dyn McpTransport>,
    normalization: NormalizationConfig,
}

impl McpToolAdapter {
    pub fn new(
        definition: crate::types::McpToolDefinition,
        transport: Arc<dyn McpTransport>,
        normalization: NormalizationConfig,
    ) -> Self {
        Self { definition, transport, normalization }
    }
}

#[async_trait]
impl Tool for McpToolAdapter {
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn spec(&self) -> ToolSpec {
        let properties: serde_json::Map<String, Value> = self
            .definition
            .parameters
            .iter()
            .map(|p| {
                let json_type = match p.param_type {
                    crate::types::McpParamType::String => "string",
                    crate::types::McpParamType::Int64 => "integer",
                    crate::types::McpParamType::Float64 => "number",
                    crate::types::McpParamType::Bool => "boolean",
                };
                (p.name.clone(), serde_json::json!({"type": json_type, "description": p.description}))
            })
            .collect();
        let required: Vec<&str> = self
            .definition
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();
        ToolSpec {
            name: self.definition.name.clone(),
            description: self.definition.description.clone(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": Value::Object(properties),
                "required": required,
            }),
        }
    }

    async fn call(&self, args: Value, _ctx: &ToolCallContext) -> Result<String, CoreError> {
        let args_map: HashMap<String, Value> = match args {
            Value::Object(m) => m.into_iter().collect(),
            _ => HashMap::new(),
        };
        let expected: Vec<String> = self.definition.parameters.iter().map(|p| p.name.clone()).collect();
        let normalized = normalize_parameters(&args_map, &expected, self.normalization)?;
        for p in self.definition.parameters.iter().filter(|p| p.required) {
            if !normalized.contains_key(&p.name) {
                return Err(CoreError::AgentFailed(format!("missing required parameter '{}'", p.name)));
            }
        }
        let typed = type_convert(&normalized, &self.definition);
        let result = self
            .transport
            .call_tool(&self.definition.name, Value::Object(typed.into_iter().collect()))
            .await?;
        Ok(flatten_content(&result))
    }
}

fn type_convert(
    args: &HashMap<String, Value>,
    def: &crate::types::McpToolDefinition,
) -> HashMap<String, Value> {
    let mut out = HashMap::new();
    for p in &def.parameters {
        let Some(v) = args.get(&p.name) else { continue };
        let converted = match p.param_type {
            crate::types::McpParamType::String => match v {
                Value::String(_) => v.clone(),
                other => Value::String(other.to_string()),
            },
            crate::types::McpParamType::Int64 => v
                .as_i64()
                .map(Value::from)
                .or_else(|| v.as_str().and_then(|s| s.parse::<i64>().ok()).map(Value::from))
                .unwrap_or_else(|| v.clone()),
            crate::types::McpParamType::Float64 => v
                .as_f64()
                .map(Value::from)
                .or_else(|| v.as_str().and_then(|s| s.parse::<f64>().ok()).map(Value::from))
                .unwrap_or_else(|| v.clone()),
            crate::types::McpParamType::Bool => v
                .as_bool()
                .map(Value::from)
                .or_else(|| v.as_str().and_then(|s| s.parse::<bool>().ok()).map(Value::from))
                .unwrap_or_else(|| v.clone()),
        };
        out.insert(p.name.clone(), converted);
    }
    out
}

/// Flattens an MCP call result's content blocks into a single textual payload (spec §4.7).
fn flatten_content(result: &Value) -> String {
    if let Some(blocks) = result.get("content").and_then(|c| c.as_array()) {
        let text: Vec<&str> = blocks
            .iter()
            .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
            .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
            .collect();
        if !text.is_empty() {
            return text.join("\n");
        }
    }
    result.to_string()
}
