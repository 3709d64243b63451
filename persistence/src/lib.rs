//! SQLite-backed `PersistenceStore` for Morgana (spec §6.5).
//!
//! Opaque to the core beyond the two required operations; this crate owns the actual table
//! layout and is free to extend it without the core ever knowing.

mod store;

pub use store::{SqliteStore, StoreError};

use async_trait::async_trait;
use morgana_core::collaborators::PersistenceStore;
use morgana_core::error::CoreError;

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        CoreError::ProviderUnavailable(err.to_string())
    }
}

#[async_trait]
impl PersistenceStore for SqliteStore {
    async fn save_turn(
        &self,
        conversation_id: &str,
        user_msg: &str,
        agent_msg: &str,
        active_agent_after: Option<&str>,
    ) -> Result<(), CoreError> {
        self.save_turn_sync(conversation_id, user_msg, agent_msg, active_agent_after).map_err(|e| {
            tracing::error!(conversation_id, error = %e, "failed to save turn");
            CoreError::from(e)
        })
    }

    async fn get_last_active_agent(&self, conversation_id: &str) -> Result<Option<String>, CoreError> {
        self.get_last_active_agent_sync(conversation_id).map_err(|e| {
            tracing::error!(conversation_id, error = %e, "failed to load last active agent");
            CoreError::from(e)
        })
    }
}
