//! The four tools every agent carries regardless of its registered tool set (spec §4.7):
//! `GetContextVariable`, `SetContextVariable`, `SetQuickReplies`, `RetrievePendingQuickReplies`.

use crate::error::CoreError;
use crate::tool_adapter::{Tool, ToolCallContext, PENDING_QUICK_REPLIES_KEY};
use crate::types::ToolSpec;
use async_trait::async_trait;
use serde_json::{json, Value};

pub struct GetContextVariable;

#[async_trait]
impl Tool for GetContextVariable {
    fn name(&self) -> &str {
        "GetContextVariable"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: "Reads a variable from this conversation's context store.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {"key": {"type": "string", "description": "Variable name"}},
                "required": ["key"],
            }),
        }
    }

    async fn call(&self, args: Value, ctx: &ToolCallContext) -> Result<String, CoreError> {
        let key = args
            .get("key")
            .and_then(|k| k.as_str())
            .ok_or_else(|| CoreError::AgentFailed("missing required parameter 'key'".to_string()))?;
        let provider = ctx.context.lock().await;
        Ok(match provider.get(key) {
            Some(v) => v.to_string(),
            None => "null".to_string(),
        })
    }
}

pub struct SetContextVariable;

#[async_trait]
impl Tool for SetContextVariable {
    fn name(&self) -> &str {
        "SetContextVariable"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: "Writes a variable into this conversation's context store.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "key": {"type": "string", "description": "Variable name"},
                    "value": {"description": "Value to store"},
                },
                "required": ["key", "value"],
            }),
        }
    }

    async fn call(&self, args: Value, ctx: &ToolCallContext) -> Result<String, CoreError> {
        let key = args
            .get("key")
            .and_then(|k| k.as_str())
            .ok_or_else(|| CoreError::AgentFailed("missing required parameter 'key'".to_string()))?
            .to_string();
        let value = args
            .get("value")
            .cloned()
            .ok_or_else(|| CoreError::AgentFailed("missing required parameter 'value'".to_string()))?;
        ctx.set_context_variable(&key, value).await;
        Ok("ok".to_string())
    }
}

pub struct SetQuickReplies;

#[async_trait]
impl Tool for SetQuickReplies {
    fn name(&self) -> &str {
        "SetQuickReplies"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: "Stashes a list of quick replies to present alongside this turn's response.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "quickReplies": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "id": {"type": "string"},
                                "label": {"type": "string"},
                                "value": {"type": "string"},
                                "terminal": {"type": "boolean"},
                            },
                        },
                    },
                },
                "required": ["quickReplies"],
            }),
        }
    }

    async fn call(&self, args: Value, ctx: &ToolCallContext) -> Result<String, CoreError> {
        let quick_replies = args
            .get("quickReplies")
            .cloned()
            .ok_or_else(|| CoreError::AgentFailed("missing required parameter 'quickReplies'".to_string()))?;
        // Not shared-eligible: quick replies are per-agent, per-turn; writes here never broadcast.
        let mut provider = ctx.context.lock().await;
        provider.set(PENDING_QUICK_REPLIES_KEY, quick_replies);
        Ok("ok".to_string())
    }
}

pub struct RetrievePendingQuickReplies;

#[async_trait]
impl Tool for RetrievePendingQuickReplies {
    fn name(&self) -> &str {
        "RetrievePendingQuickReplies"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: "Reads and clears any quick replies stashed this turn.".to_string(),
            parameters: json!({"type": "object", "properties": {}}),
        }
    }

    async fn call(&self, _args: Value, ctx: &ToolCallContext) -> Result<String, CoreError> {
        let mut provider = ctx.context.lock().await;
        let value = provider.get(PENDING_QUICK_REPLIES_KEY).cloned().unwrap_or(json!([]));
        provider.drop_key(PENDING_QUICK_REPLIES_KEY);
        Ok(value.to_string())
    }
}

/// Constructs the four reserved tools every agent carries alongside its registered set.
pub fn base_tools() -> Vec<std::sync::Arc<dyn Tool>> {
    vec![
        std::sync::Arc::new(GetContextVariable),
        std::sync::Arc::new(SetContextVariable),
        std::sync::Arc::new(SetQuickReplies),
        std::sync::Arc::new(RetrievePendingQuickReplies),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context_provider::ContextProvider;
    use std::collections::HashSet;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    fn ctx() -> ToolCallContext {
        let mut eligible = HashSet::new();
        eligible.insert("userId".to_string());
        ToolCallContext::new(Arc::new(Mutex::new(ContextProvider::new(eligible))))
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let ctx = ctx();
        SetContextVariable.call(json!({"key": "note", "value": "hi"}), &ctx).await.unwrap();
        let got = GetContextVariable.call(json!({"key": "note"}), &ctx).await.unwrap();
        assert_eq!(got, "\"hi\"");
    }

    #[tokio::test]
    async fn shared_eligible_set_buffers_a_broadcast() {
        let ctx = ctx();
        SetContextVariable.call(json!({"key": "userId", "value": "P994E"}), &ctx).await.unwrap();
        let drained = ctx.drain_broadcasts().await;
        assert_eq!(drained.get("userId"), Some(&json!("P994E")));
    }

    #[tokio::test]
    async fn non_shared_set_does_not_buffer_a_broadcast() {
        let ctx = ctx();
        SetContextVariable.call(json!({"key": "scratch", "value": 1}), &ctx).await.unwrap();
        assert!(ctx.drain_broadcasts().await.is_empty());
    }

    #[tokio::test]
    async fn quick_replies_round_trip_and_are_removed_on_read() {
        let ctx = ctx();
        let replies = json!([{"id": "1", "label": "Yes", "value": "yes", "terminal": false}]);
        SetQuickReplies.call(json!({"quickReplies": replies}), &ctx).await.unwrap();
        let first = RetrievePendingQuickReplies.call(json!({}), &ctx).await.unwrap();
        assert!(first.contains("Yes"));
        let second = RetrievePendingQuickReplies.call(json!({}), &ctx).await.unwrap();
        assert_eq!(second, "[]");
    }

    #[tokio::test]
    async fn quick_replies_do_not_broadcast() {
        let ctx = ctx();
        SetQuickReplies.call(json!({"quickReplies": []}), &ctx).await.unwrap();
        assert!(ctx.drain_broadcasts().await.is_empty());
    }
}
