//! Data model shared across components (spec §3).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Chat message role, for `ChatClient` conversations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One message in a `ChatClient` conversation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Set on `Role::Tool` messages: which tool call this is a result for.
    #[serde(default)]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into(), tool_call_id: None }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into(), tool_call_id: None }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into(), tool_call_id: None }
    }

    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self { role: Role::Tool, content: content.into(), tool_call_id: Some(call_id.into()) }
    }
}

/// A tool call requested by the LLM.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// JSON-Schema tool description passed to `ChatClient::invoke` alongside the conversation.
#[derive(Clone, Debug, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Token usage for one LLM call, when the provider reports it.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct LlmUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Response from one `ChatClient::invoke` call: assistant text and any requested tool calls.
#[derive(Clone, Debug)]
pub struct LlmResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<LlmUsage>,
}

/// Classification result (spec §3 "Classification"). Unknown intents are normalized to
/// `"other"` by the classifier itself; this type never carries an intent the classifier
/// did not recognize as configured.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub intent: String,
    pub confidence: f64,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Classification {
    pub const OTHER_INTENT: &'static str = "other";

    pub fn other() -> Self {
        Self { intent: Self::OTHER_INTENT.to_string(), confidence: 0.0, metadata: HashMap::new() }
    }
}

/// A pre-labeled client-side button (spec glossary).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuickReply {
    pub id: String,
    pub label: String,
    pub value: String,
    #[serde(default)]
    pub terminal: bool,
}

/// Response produced by an Agent for one `AgentRequest` (spec §3 "AgentResponse").
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub text: String,
    pub is_completed: bool,
    #[serde(default)]
    pub quick_replies: Vec<QuickReply>,
}

/// Parameter resolution scope (spec §3 "ToolParameter").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamScope {
    /// Resolved from `ContextProvider` at call time.
    Context,
    /// Must be supplied by the LLM in the tool call arguments.
    Request,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    pub description: String,
    pub required: bool,
    pub scope: ParamScope,
    pub shared: bool,
}

/// Local tool metadata (spec §3 "ToolDefinition").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
}

/// JSON-Schema-typed remote tool parameter type (spec §3 "MCPToolDefinition").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum McpParamType {
    String,
    Int64,
    Float64,
    Bool,
}

impl McpParamType {
    /// Maps a JSON-Schema type name: `string|integer|number|boolean` to a typed slot;
    /// unknown types fall back to `String` (spec §3).
    pub fn from_schema_type(schema_type: &str) -> Self {
        match schema_type {
            "integer" => Self::Int64,
            "number" => Self::Float64,
            "boolean" => Self::Bool,
            "string" => Self::String,
            _ => Self::String,
        }
    }
}

#[derive(Clone, Debug)]
pub struct McpToolParameter {
    pub name: String,
    pub description: String,
    pub required: bool,
    pub param_type: McpParamType,
}

#[derive(Clone, Debug)]
pub struct McpToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Vec<McpToolParameter>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_other_has_zero_confidence() {
        let c = Classification::other();
        assert_eq!(c.intent, "other");
        assert_eq!(c.confidence, 0.0);
    }

    #[test]
    fn mcp_param_type_maps_known_schema_types() {
        assert_eq!(McpParamType::from_schema_type("integer"), McpParamType::Int64);
        assert_eq!(McpParamType::from_schema_type("number"), McpParamType::Float64);
        assert_eq!(McpParamType::from_schema_type("boolean"), McpParamType::Bool);
        assert_eq!(McpParamType::from_schema_type("string"), McpParamType::String);
    }

    #[test]
    fn mcp_param_type_unknown_falls_back_to_string() {
        assert_eq!(McpParamType::from_schema_type("array"), McpParamType::String);
        assert_eq!(McpParamType::from_schema_type("whatever"), McpParamType::String);
    }

    #[test]
    fn message_constructors_set_expected_role() {
        assert_eq!(Message::system("s").role, Role::System);
        assert_eq!(Message::user("u").role, Role::User);
        assert_eq!(Message::assistant("a").role, Role::Assistant);
        let t = Message::tool("call-1", "result");
        assert_eq!(t.role, Role::Tool);
        assert_eq!(t.tool_call_id.as_deref(), Some("call-1"));
    }
}
