//! Core error taxonomy (spec §7). Five kinds, each a variant here.
//!
//! Propagation rule: a `CoreError` never crosses an actor boundary as a `Result` returned to
//! another component's caller — it is always turned into a user-visible `ConversationResponse`
//! before it leaves the Supervisor/Manager. It *is* the `Err` type for fallible internal calls
//! (tool invocation, LLM calls, persistence calls) along the way.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Guard denied the turn. User-visible moderation message; turn ends `Idle`.
    #[error("policy violation: {0}")]
    PolicyViolation(String),

    /// Classifier parse or provider error. Falls back to `"other"`; pipeline continues.
    #[error("classification failed: {0}")]
    ClassificationFailed(String),

    /// Any exception inside an agent or tool call, caught at the agent boundary.
    #[error("agent failed: {0}")]
    AgentFailed(String),

    /// LLM or MCP transport error after retries. Handled identically to `AgentFailed`.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Unrecognized message kind, missing provider registration, duplicate active agent.
    /// Logged fatally; the owning component restarts fresh.
    #[error("internal invariant violation: {0}")]
    Invariant(String),
}

impl CoreError {
    /// Whether this error is one of the kinds the spec says must be treated like an
    /// agent/tool failure (taxonomy kinds 3 and 4 share the same handling).
    pub fn is_agent_scoped(&self) -> bool {
        matches!(self, CoreError::AgentFailed(_) | CoreError::ProviderUnavailable(_))
    }
}
