//! OpenAI-backed [`ChatClient`](morgana_core::collaborators::ChatClient) for Morgana.
//!
//! The core depends only on the `ChatClient` trait (spec §1); this crate provides the one
//! concrete implementation that talks to a real (or OpenAI-compatible) provider.

mod openai;

pub use openai::ChatOpenAI;
