//! Inter-component message envelope (spec §6.3): `{kind, conversationId, payload, traceContext}`.
//!
//! `traceContext` is opaque bytes, propagated unchanged through the pipeline; the core never
//! interprets it, only carries it and (for logging) renders it as a short hex digest.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque tracing-context token. Generated at ingress, threaded through the pipeline unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceContext(pub Vec<u8>);

impl TraceContext {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Mints a fresh trace context at ingress (spec §6.3 "generated at ingress").
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().as_bytes().to_vec())
    }

    /// Short hex digest suitable for a `tracing` field; never logs the raw bytes in full.
    pub fn as_hex_digest(&self) -> String {
        self.0.iter().take(8).map(|b| format!("{:02x}", b)).collect()
    }
}

/// Envelope wrapping one inter-component message for implementations that serialize it
/// (e.g. crossing a process boundary, or writing it to a debug log).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub kind: String,
    pub conversation_id: String,
    pub payload: Value,
    pub trace_context: Option<TraceContext>,
}

impl Envelope {
    /// Builds an envelope by serializing `payload` under the given `kind`.
    pub fn wrap<T: Serialize>(
        kind: impl Into<String>,
        conversation_id: impl Into<String>,
        payload: &T,
        trace_context: Option<TraceContext>,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            kind: kind.into(),
            conversation_id: conversation_id.into(),
            payload: serde_json::to_value(payload)?,
            trace_context,
        })
    }

    /// Deserializes the envelope's payload as `T`.
    pub fn payload_as<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}
