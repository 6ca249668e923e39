//! Event deduplication with retention pruning.
//!
//! The same logical event can surface through more than one channel (a
//! mention arrives via the notification stream and again via the timeline
//! fallback). `Deduplicator::claim` is the single gate: check-then-mark is
//! one atomic repository operation, so for any event id exactly one caller
//! wins even when deliveries race. Duplicates are dropped silently -- they
//! are expected behavior, not errors.

use chrono::{Duration, Utc};
use tracing::debug;

use corvid_types::error::RepositoryError;
use corvid_types::event::{InboundEvent, ProcessedEventRecord};

use crate::repository::ProcessedEventRepository;

/// Answers "have I handled this already" and records new event ids.
pub struct Deduplicator<R: ProcessedEventRepository> {
    repo: R,
}

impl<R: ProcessedEventRepository> Deduplicator<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Atomically claim an event. Returns `true` when the caller should
    /// proceed; `false` when the event was already handled.
    pub async fn claim(&self, event: &InboundEvent) -> Result<bool, RepositoryError> {
        let record = ProcessedEventRecord {
            event_id: event.id.clone(),
            kind: event.kind,
            user_id: event.author_user_id.clone(),
            processed_at: Utc::now(),
        };

        let won = self.repo.try_claim(&record).await?;
        if !won {
            debug!(event_id = %event.id, "duplicate event dropped");
        }
        Ok(won)
    }

    /// Read-only duplicate check (no claim).
    pub async fn is_processed(&self, event_id: &str) -> Result<bool, RepositoryError> {
        self.repo.is_processed(event_id).await
    }

    /// Delete records older than the retention window. The cutoff is
    /// computed once per sweep, so rows inserted while the sweep runs are
    /// by construction newer than it and survive.
    pub async fn sweep(&self, retention: Duration) -> Result<u64, RepositoryError> {
        let cutoff = Utc::now() - retention;
        let pruned = self.repo.prune_older_than(cutoff).await?;
        if pruned > 0 {
            debug!(pruned, "processed-event retention sweep");
        }
        Ok(pruned)
    }
}
