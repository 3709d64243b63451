//! OpenAI Chat Completions client implementing `ChatClient`.
//!
//! Uses the real OpenAI Chat Completions API (or any OpenAI-compatible endpoint reachable via
//! `OPENAI_BASE_URL`/`OPENAI_API_BASE`). Requires `OPENAI_API_KEY` unless built with explicit
//! config.

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionMessageToolCalls, ChatCompletionRequestAssistantMessage,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessage,
        ChatCompletionTool, ChatCompletionToolChoiceOption, ChatCompletionTools,
        CreateChatCompletionRequestArgs, FunctionObject, ToolChoiceOptions,
    },
    Client,
};
use async_trait::async_trait;
use morgana_core::collaborators::{ChatClient, ToolChoiceMode};
use morgana_core::error::CoreError;
use morgana_core::types::{LlmResponse, LlmUsage, Message, Role, ToolCall, ToolSpec};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::{debug, trace};

/// OpenAI Chat Completions client. Uses `OPENAI_API_KEY` from the environment by default;
/// or construct via [`ChatOpenAI::with_config`] for a custom key or base URL.
pub struct ChatOpenAI {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: Option<f32>,
}

impl ChatOpenAI {
    pub fn new(model: impl Into<String>) -> Self {
        Self { client: Client::new(), model: model.into(), temperature: None }
    }

    pub fn with_config(config: OpenAIConfig, model: impl Into<String>) -> Self {
        Self { client: Client::with_config(config), model: model.into(), temperature: None }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn chat_completions_url() -> String {
        let base = std::env::var("OPENAI_BASE_URL")
            .or_else(|_| std::env::var("OPENAI_API_BASE"))
            .unwrap_or_else(|_| "https://api.openai.com".to_string());
        let base = base.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{}/chat/completions", base)
        } else {
            format!("{}/v1/chat/completions", base)
        }
    }

    fn messages_to_request(
        messages: &[Message],
    ) -> Result<Vec<ChatCompletionRequestMessage>, CoreError> {
        messages
            .iter()
            .map(|m| match m.role {
                Role::System => Ok(ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessage::from(m.content.as_str()),
                )),
                Role::User => Ok(ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessage::from(m.content.as_str()),
                )),
                Role::Assistant => Ok(ChatCompletionRequestMessage::Assistant(
                    ChatCompletionRequestAssistantMessage::from(m.content.as_str()),
                )),
                Role::Tool => {
                    let call_id = m.tool_call_id.clone().ok_or_else(|| {
                        CoreError::ProviderUnavailable(
                            "tool message missing tool_call_id".to_string(),
                        )
                    })?;
                    let tool_msg = ChatCompletionRequestToolMessageArgs::default()
                        .tool_call_id(call_id)
                        .content(m.content.clone())
                        .build()
                        .map_err(|e| CoreError::ProviderUnavailable(e.to_string()))?;
                    Ok(ChatCompletionRequestMessage::Tool(tool_msg))
                }
            })
            .collect()
    }

    fn tool_choice_option(mode: ToolChoiceMode) -> ToolChoiceOptions {
        match mode {
            ToolChoiceMode::Auto => ToolChoiceOptions::Auto,
            ToolChoiceMode::None => ToolChoiceOptions::None,
            ToolChoiceMode::Required => ToolChoiceOptions::Required,
        }
    }

    fn build_request(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        tool_choice: ToolChoiceMode,
        stream: bool,
    ) -> Result<async_openai::types::chat::CreateChatCompletionRequest, CoreError> {
        let openai_messages = Self::messages_to_request(messages)?;
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(self.model.clone());
        args.messages(openai_messages);
        if stream {
            args.stream(true);
        }

        if !tools.is_empty() {
            let chat_tools: Vec<ChatCompletionTools> = tools
                .iter()
                .map(|t| {
                    ChatCompletionTools::Function(ChatCompletionTool {
                        function: FunctionObject {
                            name: t.name.clone(),
                            description: Some(t.description.clone()),
                            parameters: Some(t.parameters.clone()),
                            ..Default::default()
                        },
                    })
                })
                .collect();
            args.tools(chat_tools);
            args.tool_choice(ChatCompletionToolChoiceOption::Mode(Self::tool_choice_option(
                tool_choice,
            )));
        }

        if let Some(t) = self.temperature {
            args.temperature(t);
        }

        args.build().map_err(|e| {
            CoreError::ProviderUnavailable(format!("OpenAI request build failed: {}", e))
        })
    }
}

#[async_trait]
impl ChatClient for ChatOpenAI {
    async fn invoke(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        tool_choice: ToolChoiceMode,
    ) -> Result<LlmResponse, CoreError> {
        let request = self.build_request(messages, tools, tool_choice, false)?;
        let url = Self::chat_completions_url();
        debug!(
            url = %url,
            model = %self.model,
            message_count = messages.len(),
            tools_count = tools.len(),
            "OpenAI chat create"
        );

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| CoreError::ProviderUnavailable(format!("OpenAI API error: {}", e)))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::ProviderUnavailable("OpenAI returned no choices".to_string()))?;

        let msg = choice.message;
        let content = msg.content.unwrap_or_default();
        let tool_calls: Vec<ToolCall> = msg
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .filter_map(|tc| {
                if let ChatCompletionMessageToolCalls::Function(f) = tc {
                    Some(ToolCall {
                        id: f.id,
                        name: f.function.name,
                        arguments: serde_json::from_str(&f.function.arguments)
                            .unwrap_or(serde_json::Value::Null),
                    })
                } else {
                    None
                }
            })
            .collect();

        let usage = response.usage.map(|u| LlmUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        trace!(url = %url, content_len = content.len(), tool_calls = tool_calls.len(), "OpenAI response");
        Ok(LlmResponse { content, tool_calls, usage })
    }

    async fn invoke_stream(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        tool_choice: ToolChoiceMode,
        chunk_tx: Option<mpsc::Sender<String>>,
    ) -> Result<LlmResponse, CoreError> {
        let Some(chunk_tx) = chunk_tx else {
            return self.invoke(messages, tools, tool_choice).await;
        };

        let request = self.build_request(messages, tools, tool_choice, true)?;
        let url = Self::chat_completions_url();
        debug!(url = %url, model = %self.model, stream = true, "OpenAI chat create_stream");

        let mut stream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(|e| CoreError::ProviderUnavailable(format!("OpenAI stream error: {}", e)))?;

        let mut full_content = String::new();
        let mut tool_call_map: std::collections::HashMap<u32, (String, String, String)> =
            std::collections::HashMap::new();
        let mut stream_usage: Option<LlmUsage> = None;

        while let Some(result) = stream.next().await {
            let response = result.map_err(|e| {
                CoreError::ProviderUnavailable(format!("OpenAI stream error: {}", e))
            })?;

            if let Some(ref u) = response.usage {
                stream_usage = Some(LlmUsage {
                    prompt_tokens: u.prompt_tokens,
                    completion_tokens: u.completion_tokens,
                    total_tokens: u.total_tokens,
                });
            }

            for choice in response.choices {
                let delta = &choice.delta;
                if let Some(ref content) = delta.content {
                    if !content.is_empty() {
                        full_content.push_str(content);
                        let _ = chunk_tx.send(content.clone()).await;
                    }
                }
                if let Some(ref tool_calls) = delta.tool_calls {
                    for tc in tool_calls {
                        let entry = tool_call_map
                            .entry(tc.index)
                            .or_insert_with(|| (tc.id.clone().unwrap_or_default(), String::new(), String::new()));
                        if let Some(ref id) = tc.id {
                            if !id.is_empty() {
                                entry.0 = id.clone();
                            }
                        }
                        if let Some(ref func) = tc.function {
                            if let Some(ref name) = func.name {
                                entry.1.push_str(name);
                            }
                            if let Some(ref args) = func.arguments {
                                entry.2.push_str(args);
                            }
                        }
                    }
                }
            }
        }

        let tool_calls: Vec<ToolCall> = tool_call_map
            .into_iter()
            .map(|(_, (id, name, arguments))| ToolCall {
                id,
                name,
                arguments: serde_json::from_str(&arguments).unwrap_or(serde_json::Value::Null),
            })
            .collect();

        trace!(url = %url, content_len = full_content.len(), tool_calls = tool_calls.len(), "OpenAI stream response");
        Ok(LlmResponse { content: full_content, tool_calls, usage: stream_usage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_openai_new_creates_client() {
        let _ = ChatOpenAI::new("gpt-4o-mini");
    }

    #[test]
    fn chat_openai_with_config_and_temperature_builder() {
        let config = OpenAIConfig::new().with_api_key("test-key");
        let _ = ChatOpenAI::with_config(config, "gpt-4o-mini").with_temperature(0.5);
    }

    #[tokio::test]
    async fn invoke_against_unreachable_base_returns_error() {
        let config = OpenAIConfig::new().with_api_key("test-key").with_api_base("https://127.0.0.1:1");
        let client = ChatOpenAI::with_config(config, "gpt-4o-mini");
        let messages = [Message::user("Hello")];
        let result = client.invoke(&messages, &[], ToolChoiceMode::Auto).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn invoke_stream_with_no_channel_delegates_to_invoke() {
        let config = OpenAIConfig::new().with_api_key("test-key").with_api_base("https://127.0.0.1:1");
        let client = ChatOpenAI::with_config(config, "gpt-4o-mini");
        let messages = [Message::user("Hi")];
        let res_invoke = client.invoke(&messages, &[], ToolChoiceMode::Auto).await;
        let res_stream = client.invoke_stream(&messages, &[], ToolChoiceMode::Auto, None).await;
        assert!(res_invoke.is_err());
        assert!(res_stream.is_err());
    }
}
