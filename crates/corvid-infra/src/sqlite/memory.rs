//! SQLite memory repository implementation.
//!
//! Implements `MemoryRepository` from `corvid-core` using sqlx with split
//! read/write pools. The upsert path rides SQLite's
//! `ON CONFLICT (user_id, key) DO UPDATE`: re-stating a fact overwrites
//! value/kind/importance/updated_at while keeping the original row id and
//! created_at.

use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use corvid_core::repository::MemoryRepository;
use corvid_types::error::RepositoryError;
use corvid_types::memory::{Memory, MemoryKind};

use super::pool::DatabasePool;

/// SQLite-backed implementation of `MemoryRepository`.
pub struct SqliteMemoryRepository {
    pool: DatabasePool,
}

impl SqliteMemoryRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct MemoryRow {
    id: String,
    user_id: String,
    key: String,
    value: String,
    kind: String,
    importance: i64,
    created_at: String,
    updated_at: String,
}

impl MemoryRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            key: row.try_get("key")?,
            value: row.try_get("value")?,
            kind: row.try_get("kind")?,
            importance: row.try_get("importance")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_memory(self) -> Result<Memory, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid memory id: {e}")))?;
        let kind: MemoryKind = self
            .kind
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let created_at = parse_datetime(&self.created_at)?;
        let updated_at = parse_datetime(&self.updated_at)?;

        Ok(Memory {
            id,
            user_id: self.user_id,
            key: self.key,
            value: self.value,
            kind,
            importance: self.importance as u8,
            created_at,
            updated_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

// ---------------------------------------------------------------------------
// MemoryRepository implementation
// ---------------------------------------------------------------------------

impl MemoryRepository for SqliteMemoryRepository {
    async fn upsert(&self, memory: &Memory) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO memories (id, user_id, key, value, kind, importance, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT (user_id, key) DO UPDATE SET
                   value = excluded.value,
                   kind = excluded.kind,
                   importance = excluded.importance,
                   updated_at = excluded.updated_at"#,
        )
        .bind(memory.id.to_string())
        .bind(&memory.user_id)
        .bind(&memory.key)
        .bind(&memory.value)
        .bind(memory.kind.to_string())
        .bind(memory.importance as i64)
        .bind(format_datetime(&memory.created_at))
        .bind(format_datetime(&memory.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn list(&self, user_id: &str) -> Result<Vec<Memory>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM memories WHERE user_id = ? ORDER BY importance DESC, updated_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut memories = Vec::with_capacity(rows.len());
        for row in &rows {
            let memory_row =
                MemoryRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            memories.push(memory_row.into_memory()?);
        }

        Ok(memories)
    }

    async fn delete(&self, memory_id: &Uuid) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM memories WHERE id = ?")
            .bind(memory_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn delete_all(&self, user_id: &str) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM memories WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn user_ids(&self) -> Result<Vec<String>, RepositoryError> {
        let rows = sqlx::query("SELECT DISTINCT user_id FROM memories ORDER BY user_id")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                row.try_get("user_id")
                    .map_err(|e| RepositoryError::Query(e.to_string()))
            })
            .collect()
    }
}
