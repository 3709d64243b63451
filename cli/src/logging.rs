//! Initializes the global `tracing` subscriber once at startup (spec §10.1).

use tracing_subscriber::EnvFilter;

use crate::log_format::TextWithSpanIds;

pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .event_format(TextWithSpanIds::new())
        .try_init()
        .map_err(|e| e.into())
}
