//! SQLite processed-event repository implementation.
//!
//! Implements `ProcessedEventRepository` from `corvid-core`. The claim path
//! is a single `INSERT OR IGNORE` on the primary key through the
//! single-connection writer pool: `rows_affected == 0` means another
//! delivery of the same event already won, which makes check-then-mark
//! atomic per event id.

use chrono::{DateTime, Utc};
use sqlx::Row;

use corvid_core::repository::ProcessedEventRepository;
use corvid_types::error::RepositoryError;
use corvid_types::event::{EventKind, ProcessedEventRecord};

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ProcessedEventRepository`.
pub struct SqliteProcessedEventRepository {
    pool: DatabasePool,
}

impl SqliteProcessedEventRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

impl ProcessedEventRepository for SqliteProcessedEventRepository {
    async fn try_claim(&self, record: &ProcessedEventRecord) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"INSERT OR IGNORE INTO processed_events (event_id, kind, user_id, processed_at)
               VALUES (?, ?, ?, ?)"#,
        )
        .bind(&record.event_id)
        .bind(record.kind.to_string())
        .bind(&record.user_id)
        .bind(record.processed_at.to_rfc3339())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn is_processed(&self, event_id: &str) -> Result<bool, RepositoryError> {
        let row = sqlx::query("SELECT 1 AS present FROM processed_events WHERE event_id = ?")
            .bind(event_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(row.is_some())
    }

    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM processed_events WHERE processed_at < ?")
            .bind(cutoff.to_rfc3339())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected())
    }
}

/// Fetch one record (diagnostics and tests).
impl SqliteProcessedEventRepository {
    pub async fn get(
        &self,
        event_id: &str,
    ) -> Result<Option<ProcessedEventRecord>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM processed_events WHERE event_id = ?")
            .bind(event_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let Some(row) = row else { return Ok(None) };

        let kind: String = row
            .try_get("kind")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let kind: EventKind = kind.parse().map_err(|e: String| RepositoryError::Query(e))?;
        let processed_at: String = row
            .try_get("processed_at")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(Some(ProcessedEventRecord {
            event_id: row
                .try_get("event_id")
                .map_err(|e| RepositoryError::Query(e.to_string()))?,
            kind,
            user_id: row
                .try_get("user_id")
                .map_err(|e| RepositoryError::Query(e.to_string()))?,
            processed_at: parse_datetime(&processed_at)?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::DatabasePool;
    use chrono::Duration;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    fn record(event_id: &str, processed_at: DateTime<Utc>) -> ProcessedEventRecord {
        ProcessedEventRecord {
            event_id: event_id.to_string(),
            kind: EventKind::Mention,
            user_id: "u1".to_string(),
            processed_at,
        }
    }

    #[tokio::test]
    async fn test_claim_wins_once() {
        let repo = SqliteProcessedEventRepository::new(test_pool().await);

        assert!(repo.try_claim(&record("ev-1", Utc::now())).await.unwrap());
        assert!(!repo.try_claim(&record("ev-1", Utc::now())).await.unwrap());
        assert!(repo.is_processed("ev-1").await.unwrap());
        assert!(!repo.is_processed("ev-2").await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_claims_one_winner() {
        let repo = std::sync::Arc::new(SqliteProcessedEventRepository::new(test_pool().await));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.try_claim(&record("ev-race", Utc::now())).await.unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_prune_respects_cutoff() {
        let repo = SqliteProcessedEventRepository::new(test_pool().await);

        repo.try_claim(&record("old", Utc::now() - Duration::days(10)))
            .await
            .unwrap();
        repo.try_claim(&record("fresh", Utc::now())).await.unwrap();

        let pruned = repo
            .prune_older_than(Utc::now() - Duration::days(7))
            .await
            .unwrap();
        assert_eq!(pruned, 1);
        assert!(!repo.is_processed("old").await.unwrap());
        assert!(repo.is_processed("fresh").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_roundtrip() {
        let repo = SqliteProcessedEventRepository::new(test_pool().await);
        let original = record("ev-g", Utc::now());
        repo.try_claim(&original).await.unwrap();

        let fetched = repo.get("ev-g").await.unwrap().unwrap();
        assert_eq!(fetched.event_id, "ev-g");
        assert_eq!(fetched.kind, EventKind::Mention);
        assert_eq!(fetched.user_id, "u1");
    }
}
