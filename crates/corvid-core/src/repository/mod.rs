//! Repository trait definitions.
//!
//! These are the storage "ports" implemented in `corvid-infra`. All traits
//! use native async fn in traits (RPITIT, Rust 2024 edition) and are keyed
//! by the platform user id; operations for different users must not block
//! each other, while the two read-modify-write hot spots (rate window,
//! processed-event claim) are atomic per key in the implementation.

use chrono::{DateTime, Utc};

use corvid_types::error::RepositoryError;
use corvid_types::event::ProcessedEventRecord;
use corvid_types::memory::Memory;
use corvid_types::message::{ConversationMessage, MessageRole, RateDecision};

/// Persistence for the per-user conversation log and rate windows.
pub trait ConversationRepository: Send + Sync {
    /// Append a message, assigning the next per-user sequence atomically.
    fn append(
        &self,
        user_id: &str,
        role: MessageRole,
        content: &str,
    ) -> impl std::future::Future<Output = Result<ConversationMessage, RepositoryError>> + Send;

    /// Insert a seed message with sequence 1, only if the user has no
    /// messages at all. Idempotent and atomic.
    fn seed_if_empty(
        &self,
        user_id: &str,
        content: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Full history for a user, ordered by sequence.
    fn history(
        &self,
        user_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<ConversationMessage>, RepositoryError>> + Send;

    /// Delete a user's log. Returns the count of deleted messages.
    fn clear(
        &self,
        user_id: &str,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Fixed-window rate check: read-modify-write, atomic per user.
    ///
    /// When the stored window has elapsed the counter resets to 1 on this
    /// call; otherwise it increments while under `cap`, and blocks with a
    /// reset time once the cap is reached.
    fn check_and_increment_rate(
        &self,
        user_id: &str,
        cap: u32,
        window: chrono::Duration,
    ) -> impl std::future::Future<Output = Result<RateDecision, RepositoryError>> + Send;
}

/// Persistence for processed-event records (deduplication).
pub trait ProcessedEventRepository: Send + Sync {
    /// Atomically claim an event id. Returns `true` when this caller won the
    /// claim, `false` when the id was already recorded.
    fn try_claim(
        &self,
        record: &ProcessedEventRecord,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Whether the id has been recorded (read-only; no claim).
    fn is_processed(
        &self,
        event_id: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Delete records processed strictly before `cutoff`. Returns the count.
    fn prune_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}

/// Persistence for per-user memories.
pub trait MemoryRepository: Send + Sync {
    /// Insert or overwrite by `(user_id, key)`: a later write with the same
    /// key replaces value, kind, importance, and `updated_at`, keeping the
    /// original `created_at`.
    fn upsert(
        &self,
        memory: &Memory,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// All memories for a user, ordered by importance DESC, updated_at DESC.
    fn list(
        &self,
        user_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Memory>, RepositoryError>> + Send;

    /// Delete a single memory row.
    fn delete(
        &self,
        memory_id: &uuid::Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete all memories for a user. Returns the count of deleted rows.
    fn delete_all(
        &self,
        user_id: &str,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Distinct user ids that currently have memories (eviction pass input).
    fn user_ids(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<String>, RepositoryError>> + Send;
}
