//! Intent classification from user text against a configured intent registry (spec §4.4).
//!
//! Stateless: composes a prompt listing the available intents, asks the `ChatClient` for a
//! JSON `{intent, confidence}`, and falls back to `Classification::other()` on any parse
//! failure. Never reads or writes conversation state.

use crate::collaborators::ChatClient;
use crate::json_parse::parse_lenient;
use crate::types::{Classification, Message, ToolSpec};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize)]
struct ClassificationResponse {
    intent: String,
    confidence: f64,
}

pub struct IntentDescriptor {
    pub name: String,
    pub description: String,
}

pub struct Classifier {
    chat_client: Arc<dyn ChatClient>,
    prompt_template: String,
}

impl Classifier {
    pub fn new(chat_client: Arc<dyn ChatClient>, prompt_template: String) -> Self {
        Self { chat_client, prompt_template }
    }

    /// Classifies `text` against `intents`. Case-insensitive match of the model's reported
    /// intent name against the registry; anything unrecognized normalizes to `"other"`.
    pub async fn classify(&self, text: &str, intents: &[IntentDescriptor]) -> Classification {
        let registry_listing: String = intents
            .iter()
            .map(|i| format!("- {}: {}", i.name, i.description))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!("{}\n\nAvailable intents:\n{}\n\nUser message: {}", self.prompt_template, registry_listing, text);
        let messages = vec![Message::system(prompt), Message::user(text)];
        let empty_tools: &[ToolSpec] = &[];
        let response = match self.chat_client.invoke(&messages, empty_tools, Default::default()).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "classifier: provider error, falling back to other");
                return Classification::other();
            }
        };
        let Some(parsed) = parse_lenient::<ClassificationResponse>(&response.content) else {
            tracing::warn!("classifier: response unparseable, falling back to other");
            return Classification::other();
        };
        match intents.iter().find(|i| i.name.eq_ignore_ascii_case(&parsed.intent)) {
            Some(matched) => {
                tracing::debug!(intent = %matched.name, confidence = parsed.confidence, "classifier: classified");
                Classification {
                    intent: matched.name.clone(),
                    confidence: parsed.confidence,
                    metadata: Default::default(),
                }
            }
            None => {
                tracing::debug!(reported_intent = %parsed.intent, "classifier: unrecognized intent, falling back to other");
                Classification::other()
            }
        }
    }
}
