//! Inter-component message envelope (spec §6.3): `{kind, conversationId, payload, traceContext}`.
//!
//! This crate defines only the wire shape; it does not depend on morgana-core. Components
//! build an `Envelope` when they need to serialize a message across a boundary (debug logging,
//! a future cross-process transport); in-process dispatch passes typed Rust values directly.

pub mod envelope;

pub use envelope::{Envelope, TraceContext};
