//! SQLite-backed implementation of `morgana_core::collaborators::PersistenceStore`.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage: {0}")]
    Storage(String),
}

fn system_time_to_i64(t: SystemTime) -> i64 {
    t.duration_since(SystemTime::UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0)
}

/// One conversation's persisted turns and last-active-agent state, in SQLite.
pub struct SqliteStore {
    db: Arc<Mutex<rusqlite::Connection>>,
}

impl SqliteStore {
    /// Opens or creates the database and tables at `path`.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = rusqlite::Connection::open(path.as_ref()).map_err(|e| StoreError::Storage(e.to_string()))?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS turns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id TEXT NOT NULL,
                user_msg TEXT NOT NULL,
                agent_msg TEXT NOT NULL,
                active_agent_after TEXT,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_turns_conversation_id ON turns(conversation_id);
            CREATE TABLE IF NOT EXISTS conversation_state (
                conversation_id TEXT PRIMARY KEY,
                last_active_agent TEXT
            );
            "#,
        )
        .map_err(|e| StoreError::Storage(e.to_string()))?;
        Ok(Self { db: Arc::new(Mutex::new(conn)) })
    }

    /// In-process-only SQLite database, for tests.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = rusqlite::Connection::open_in_memory().map_err(|e| StoreError::Storage(e.to_string()))?;
        conn.execute_batch(
            r#"
            CREATE TABLE turns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id TEXT NOT NULL,
                user_msg TEXT NOT NULL,
                agent_msg TEXT NOT NULL,
                active_agent_after TEXT,
                created_at INTEGER NOT NULL
            );
            CREATE TABLE conversation_state (
                conversation_id TEXT PRIMARY KEY,
                last_active_agent TEXT
            );
            "#,
        )
        .map_err(|e| StoreError::Storage(e.to_string()))?;
        Ok(Self { db: Arc::new(Mutex::new(conn)) })
    }

    pub(crate) fn save_turn_sync(
        &self,
        conversation_id: &str,
        user_msg: &str,
        agent_msg: &str,
        active_agent_after: Option<&str>,
    ) -> Result<(), StoreError> {
        let now = system_time_to_i64(SystemTime::now());
        let db = self.db.clone();
        let conversation_id = conversation_id.to_string();
        let user_msg = user_msg.to_string();
        let agent_msg = agent_msg.to_string();
        let active_agent_after = active_agent_after.map(|s| s.to_string());
        tokio::task::block_in_place(move || {
            let conn = db.lock().map_err(|_| StoreError::Storage("lock poisoned".to_string()))?;
            conn.execute(
                "INSERT INTO turns (conversation_id, user_msg, agent_msg, active_agent_after, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![conversation_id, user_msg, agent_msg, active_agent_after, now],
            )
            .map_err(|e| StoreError::Storage(e.to_string()))?;
            conn.execute(
                "INSERT INTO conversation_state (conversation_id, last_active_agent) VALUES (?1, ?2)
                 ON CONFLICT(conversation_id) DO UPDATE SET last_active_agent = excluded.last_active_agent",
                rusqlite::params![conversation_id, active_agent_after],
            )
            .map_err(|e| StoreError::Storage(e.to_string()))?;
            Ok(())
        })
    }

    pub(crate) fn get_last_active_agent_sync(&self, conversation_id: &str) -> Result<Option<String>, StoreError> {
        let db = self.db.clone();
        let conversation_id = conversation_id.to_string();
        tokio::task::block_in_place(move || {
            let conn = db.lock().map_err(|_| StoreError::Storage("lock poisoned".to_string()))?;
            conn.query_row(
                "SELECT last_active_agent FROM conversation_state WHERE conversation_id = ?1",
                rusqlite::params![conversation_id],
                |row| row.get::<_, Option<String>>(0),
            )
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(StoreError::Storage(other.to_string())),
            })
        })
    }
}
