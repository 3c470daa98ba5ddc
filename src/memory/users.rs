use anyhow::{Context, Result};
use rusqlite::OptionalExtension;

use super::MemoryStore;

impl MemoryStore {
    /// Insert-or-increment as one statement
    pub async fn upsert_user(&self, sender_id: u64, sender_name: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO users (telegram_id, username, messages_sent)
             VALUES (?1, ?2, 1)
             ON CONFLICT(telegram_id) DO UPDATE SET
                username = excluded.username,
                messages_sent = messages_sent + 1",
            rusqlite::params![sender_id as i64, sender_name],
        )
        .context("Failed to record user visit")?;
        Ok(())
    }

    /// Current message count for a sender, `None` if never seen
    #[allow(dead_code)]
    pub async fn messages_sent(&self, sender_id: u64) -> Result<Option<u64>> {
        let conn = self.conn.lock().await;
        let count: Option<i64> = conn
            .query_row(
                "SELECT messages_sent FROM users WHERE telegram_id = ?1",
                rusqlite::params![sender_id as i64],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to read user")?;
        Ok(count.map(|c| c as u64))
    }
}
