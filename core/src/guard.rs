//! Two-stage policy check on inbound user text (spec §4.3).
//!
//! Stateless: a term filter followed by an LLM policy check. The term filter is fail-closed
//! (a hit always denies); the LLM stage is fail-open on parse failure or timeout, because a
//! flaky policy model must not silence a user whose turn will still be classified and routed.

use crate::collaborators::ChatClient;
use crate::json_parse::parse_lenient;
use crate::types::{Message, ToolSpec};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct GuardVerdict {
    pub compliant: bool,
    pub violation: Option<String>,
}

impl GuardVerdict {
    fn compliant() -> Self {
        Self { compliant: true, violation: None }
    }

    fn denied(violation: impl Into<String>) -> Self {
        Self { compliant: false, violation: Some(violation.into()) }
    }
}

#[derive(Deserialize)]
struct PolicyCheckResponse {
    compliant: bool,
    #[serde(default)]
    violation: Option<String>,
}

pub struct Guard {
    chat_client: Arc<dyn ChatClient>,
    banned_terms: Vec<String>,
    policy_prompt_template: String,
    llm_stage_timeout: Duration,
}

impl Guard {
    pub fn new(
        chat_client: Arc<dyn ChatClient>,
        banned_terms: Vec<String>,
        policy_prompt_template: String,
        llm_stage_timeout: Duration,
    ) -> Self {
        Self {
            chat_client,
            banned_terms: banned_terms.into_iter().map(|t| t.to_lowercase()).collect(),
            policy_prompt_template,
            llm_stage_timeout,
        }
    }

    /// Runs both stages against `text`. Stateless: callers may invoke this concurrently from
    /// many conversations without synchronization.
    pub async fn check(&self, text: &str) -> GuardVerdict {
        if let Some(term) = self.term_filter_hit(text) {
            tracing::warn!(term, "guard: term filter hit");
            return GuardVerdict::denied(term);
        }
        let verdict = self.llm_policy_check(text).await;
        if !verdict.compliant {
            tracing::warn!(violation = verdict.violation.as_deref(), "guard: llm policy check denied");
        } else {
            tracing::debug!("guard: turn compliant");
        }
        verdict
    }

    fn term_filter_hit(&self, text: &str) -> Option<String> {
        let lowered = text.to_lowercase();
        self.banned_terms.iter().find(|t| lowered.contains(t.as_str())).cloned()
    }

    async fn llm_policy_check(&self, text: &str) -> GuardVerdict {
        let prompt = format!("{}\n\nUser message: {}", self.policy_prompt_template, text);
        let messages = vec![Message::system(prompt), Message::user(text)];
        let empty_tools: &[ToolSpec] = &[];
        let call = self.chat_client.invoke(&messages, empty_tools, Default::default());
        let response = match tokio::time::timeout(self.llm_stage_timeout, call).await {
            Ok(Ok(response)) => response,
            Ok(Err(ref e)) => {
                tracing::warn!(error = %e, "guard: policy check provider error, failing open");
                return GuardVerdict::compliant();
            }
            Err(_) => {
                tracing::warn!("guard: policy check timed out, failing open");
                return GuardVerdict::compliant();
            }
        };
        match parse_lenient::<PolicyCheckResponse>(&response.content) {
            Some(parsed) => GuardVerdict { compliant: parsed.compliant, violation: parsed.violation },
            None => {
                tracing::warn!("guard: policy check response unparseable, failing open");
                GuardVerdict::compliant()
            }
        }
    }
}
