pub mod feedback;
pub mod users;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Per-sender visit counter
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert the sender with a count of 1, or increment an existing count.
    async fn record_visit(&self, sender_id: u64, sender_name: &str) -> Result<()>;
}

/// Append-only free-text feedback
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Store one feedback message and return its id.
    async fn save_feedback(&self, sender_id: u64, sender_name: &str, message: &str)
        -> Result<i64>;
}

/// Thread-safe SQLite store for users and feedback
#[derive(Clone)]
pub struct MemoryStore {
    conn: Arc<Mutex<Connection>>,
}

impl MemoryStore {
    /// Open or create the SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        // journal_mode PRAGMA always returns the resulting mode, so use query_row
        let _: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;

        Self::run_migrations(&conn)?;

        info!("Memory store initialized at: {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn run_migrations(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                telegram_id INTEGER NOT NULL UNIQUE,
                username TEXT NOT NULL,
                messages_sent INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS feedback (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                telegram_id INTEGER NOT NULL,
                username TEXT NOT NULL,
                message TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_feedback_user
                ON feedback(telegram_id);
            ",
        )
        .context("Failed to run migrations")?;

        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn record_visit(&self, sender_id: u64, sender_name: &str) -> Result<()> {
        self.upsert_user(sender_id, sender_name).await
    }
}

#[async_trait]
impl FeedbackStore for MemoryStore {
    async fn save_feedback(
        &self,
        sender_id: u64,
        sender_name: &str,
        message: &str,
    ) -> Result<i64> {
        self.insert_feedback(sender_id, sender_name, message).await
    }
}
