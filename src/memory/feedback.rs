use anyhow::{Context, Result};

use super::MemoryStore;

/// A stored feedback message
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct FeedbackEntry {
    pub id: i64,
    pub sender_id: u64,
    pub sender_name: String,
    pub message: String,
    pub created_at: String,
}

impl MemoryStore {
    pub async fn insert_feedback(
        &self,
        sender_id: u64,
        sender_name: &str,
        message: &str,
    ) -> Result<i64> {
        let created_at = chrono::Utc::now().to_rfc3339();
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO feedback (telegram_id, username, message, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![sender_id as i64, sender_name, message, created_at],
        )
        .context("Failed to save feedback")?;
        Ok(conn.last_insert_rowid())
    }

    /// All feedback, oldest first
    #[allow(dead_code)]
    pub async fn list_feedback(&self) -> Result<Vec<FeedbackEntry>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, telegram_id, username, message, created_at
             FROM feedback
             ORDER BY id ASC",
        )?;

        let entries = stmt
            .query_map([], |row| {
                let sender_id: i64 = row.get(1)?;
                Ok(FeedbackEntry {
                    id: row.get(0)?,
                    sender_id: sender_id as u64,
                    sender_name: row.get(2)?,
                    message: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to load feedback")?;

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_list() {
        let store = MemoryStore::open_in_memory().unwrap();
        store
            .insert_feedback(10, "ann", "Great service")
            .await
            .unwrap();

        let entries = store.list_feedback().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].sender_id, 10);
        assert_eq!(entries[0].sender_name, "ann");
        assert_eq!(entries[0].message, "Great service");
        assert!(chrono::DateTime::parse_from_rfc3339(&entries[0].created_at).is_ok());
    }

    #[tokio::test]
    async fn test_ids_strictly_increase() {
        let store = MemoryStore::open_in_memory().unwrap();
        let a = store.insert_feedback(1, "a", "one").await.unwrap();
        let b = store.insert_feedback(1, "a", "two").await.unwrap();
        let c = store.insert_feedback(2, "b", "three").await.unwrap();
        assert!(a < b && b < c);

        let ids: Vec<i64> = store
            .list_feedback()
            .await
            .unwrap()
            .iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![a, b, c]);
    }

    #[tokio::test]
    async fn test_same_message_twice_is_two_records() {
        let store = MemoryStore::open_in_memory().unwrap();
        store.insert_feedback(1, "a", "same").await.unwrap();
        store.insert_feedback(1, "a", "same").await.unwrap();
        assert_eq!(store.list_feedback().await.unwrap().len(), 2);
    }
}
