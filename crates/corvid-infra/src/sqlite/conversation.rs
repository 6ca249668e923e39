//! SQLite conversation repository implementation.
//!
//! Implements `ConversationRepository` from `corvid-core` using sqlx with
//! split read/write pools: raw queries, private Row structs, per-user
//! sequence assignment and the rate-window read-modify-write inside writer
//! transactions.

use chrono::{DateTime, Duration, Utc};
use sqlx::Row;
use uuid::Uuid;

use corvid_core::repository::ConversationRepository;
use corvid_types::error::RepositoryError;
use corvid_types::message::{ConversationMessage, MessageRole, RateDecision};

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ConversationRepository`.
pub struct SqliteConversationRepository {
    pool: DatabasePool,
}

impl SqliteConversationRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct MessageRow {
    id: String,
    user_id: String,
    role: String,
    content: String,
    sequence: i64,
    created_at: String,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            role: row.try_get("role")?,
            content: row.try_get("content")?,
            sequence: row.try_get("sequence")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message(self) -> Result<ConversationMessage, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid message id: {e}")))?;
        let role: MessageRole = self
            .role
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let created_at = parse_datetime(&self.created_at)?;

        Ok(ConversationMessage {
            id,
            user_id: self.user_id,
            role,
            content: self.content,
            sequence: self.sequence,
            created_at,
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
// ConversationRepository implementation
// ---------------------------------------------------------------------------

impl ConversationRepository for SqliteConversationRepository {
    async fn append(
        &self,
        user_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<ConversationMessage, RepositoryError> {
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let (next_sequence,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(MAX(sequence), 0) + 1 FROM messages WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let message = ConversationMessage {
            id: Uuid::now_v7(),
            user_id: user_id.to_string(),
            role,
            content: content.to_string(),
            sequence: next_sequence,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"INSERT INTO messages (id, user_id, role, content, sequence, created_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(message.id.to_string())
        .bind(&message.user_id)
        .bind(message.role.to_string())
        .bind(&message.content)
        .bind(message.sequence)
        .bind(format_datetime(&message.created_at))
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(message)
    }

    async fn seed_if_empty(&self, user_id: &str, content: &str) -> Result<bool, RepositoryError> {
        // Single statement: insert only when the user has no rows at all.
        let result = sqlx::query(
            r#"INSERT INTO messages (id, user_id, role, content, sequence, created_at)
               SELECT ?, ?, 'assistant', ?, 1, ?
               WHERE NOT EXISTS (SELECT 1 FROM messages WHERE user_id = ?)"#,
        )
        .bind(Uuid::now_v7().to_string())
        .bind(user_id)
        .bind(content)
        .bind(format_datetime(&Utc::now()))
        .bind(user_id)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn history(&self, user_id: &str) -> Result<Vec<ConversationMessage>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM messages WHERE user_id = ? ORDER BY sequence ASC")
            .bind(user_id)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let message_row =
                MessageRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            messages.push(message_row.into_message()?);
        }

        Ok(messages)
    }

    async fn clear(&self, user_id: &str) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM messages WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn check_and_increment_rate(
        &self,
        user_id: &str,
        cap: u32,
        window: Duration,
    ) -> Result<RateDecision, RepositoryError> {
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let now = Utc::now();
        let existing: Option<(i64, String)> =
            sqlx::query_as("SELECT count, window_start FROM rate_limits WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let decision = match existing {
            None => {
                sqlx::query(
                    "INSERT INTO rate_limits (user_id, count, window_start) VALUES (?, 1, ?)",
                )
                .bind(user_id)
                .bind(format_datetime(&now))
                .execute(&mut *tx)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
                RateDecision::allowed()
            }
            Some((count, window_start)) => {
                let window_start = parse_datetime(&window_start)?;
                if now - window_start >= window {
                    // Window elapsed: this message is message 1 of a new window.
                    sqlx::query(
                        "UPDATE rate_limits SET count = 1, window_start = ? WHERE user_id = ?",
                    )
                    .bind(format_datetime(&now))
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                    RateDecision::allowed()
                } else if (count as u32) < cap {
                    sqlx::query("UPDATE rate_limits SET count = count + 1 WHERE user_id = ?")
                        .bind(user_id)
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| RepositoryError::Query(e.to_string()))?;
                    RateDecision::allowed()
                } else {
                    RateDecision::blocked(window_start + window)
                }
            }
        };

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(decision)
    }
}
