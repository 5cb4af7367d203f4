pub mod match_store;

pub use match_store::{AppendOutcome, MatchStore};

use crate::error::{CoreError, Result};
use rusqlite::Connection;
use std::path::Path;
use tokio::sync::Mutex;

pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub async fn new(db_path: &Path) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CoreError::internal(format!("Failed to create directory: {}", e)))?;
        }

        let conn = Connection::open(db_path)?;
        let storage = Self {
            conn: Mutex::new(conn),
        };

        storage.init_schema().await?;
        Ok(storage)
    }

    /// In-memory database, used by tests and short-lived tooling.
    pub async fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let storage = Self {
            conn: Mutex::new(conn),
        };

        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;

        // Matches table. Secrets are unique across stored matches so a
        // claim can never validate against the wrong match.
        conn.execute(
            "CREATE TABLE IF NOT EXISTS matches (
                id TEXT PRIMARY KEY,
                match_type TEXT NOT NULL,
                secret TEXT UNIQUE NOT NULL,
                creator TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        // Participants table, one row per verified identity per match
        conn.execute(
            "CREATE TABLE IF NOT EXISTS participants (
                match_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                joined_at INTEGER NOT NULL,
                FOREIGN KEY (match_id) REFERENCES matches(id),
                PRIMARY KEY (match_id, user_id)
            )",
            [],
        )?;

        Ok(())
    }

    pub async fn get_connection(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}
