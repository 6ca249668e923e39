//! Memory persistence, relevance ranking, and eviction.
//!
//! `MemoryEngine` wraps a `MemoryRepository` with the extraction pipeline
//! (upsert-by-key), the relevance scorer used to assemble reply context,
//! and the bounded-size eviction policy. Eviction runs from a periodic
//! background task, never inline with request handling.

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use corvid_types::config::MemoryConfig;
use corvid_types::error::RepositoryError;
use corvid_types::memory::{Memory, MemoryCandidate, MemoryKind};

use crate::memory::extractor::MemoryExtractor;
use crate::repository::MemoryRepository;

/// Long-term memory operations for one bot.
pub struct MemoryEngine<R: MemoryRepository> {
    repo: R,
    extractor: MemoryExtractor,
    config: MemoryConfig,
}

impl<R: MemoryRepository> MemoryEngine<R> {
    pub fn new(repo: R, config: MemoryConfig) -> Self {
        Self {
            repo,
            extractor: MemoryExtractor::new(),
            config,
        }
    }

    /// Access the underlying repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Run extraction over a message and persist every candidate.
    ///
    /// Candidates upsert by `(user_id, key)`: re-stating a fact overwrites
    /// the stored value/importance instead of duplicating it. Returns the
    /// number of candidates stored.
    pub async fn extract_and_store(
        &self,
        user_id: &str,
        text: &str,
    ) -> Result<usize, RepositoryError> {
        let candidates = self.extractor.extract(text, Utc::now().timestamp_millis());
        let count = candidates.len();
        for candidate in candidates {
            self.store_candidate(user_id, candidate).await?;
        }
        if count > 0 {
            debug!(user_id, count, "memories extracted");
        }
        Ok(count)
    }

    /// Manual `!remember` path: store the given text verbatim as a
    /// conversation memory at importance 8.
    pub async fn remember(&self, user_id: &str, text: &str) -> Result<(), RepositoryError> {
        let candidate = MemoryCandidate {
            key: format!("conversation:{}", Utc::now().timestamp_millis()),
            value: text.trim().to_string(),
            kind: MemoryKind::Conversation,
            importance: 8,
        };
        self.store_candidate(user_id, candidate).await
    }

    async fn store_candidate(
        &self,
        user_id: &str,
        candidate: MemoryCandidate,
    ) -> Result<(), RepositoryError> {
        let now = Utc::now();
        let memory = Memory {
            id: Uuid::now_v7(),
            user_id: user_id.to_string(),
            key: candidate.key,
            value: candidate.value,
            kind: candidate.kind,
            importance: candidate.importance,
            created_at: now,
            updated_at: now,
        };
        self.repo.upsert(&memory).await
    }

    /// The stored memories most relevant to `current_text`.
    ///
    /// Every memory is scored `text_overlap(memory.value, current_text) *
    /// importance`, ties broken by recency. An empty `current_text` falls
    /// back to importance-then-recency over all memories (the repository's
    /// natural order).
    pub async fn relevant(
        &self,
        user_id: &str,
        current_text: &str,
        limit: usize,
    ) -> Result<Vec<Memory>, RepositoryError> {
        let memories = self.repo.list(user_id).await?;

        if current_text.trim().is_empty() {
            return Ok(memories.into_iter().take(limit).collect());
        }

        let mut scored: Vec<(f64, Memory)> = memories
            .into_iter()
            .map(|m| {
                let score = text_overlap(&m.value, current_text) * f64::from(m.importance);
                (score, m)
            })
            .collect();

        scored.sort_by(|(score_a, mem_a), (score_b, mem_b)| {
            score_b
                .partial_cmp(score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(mem_b.updated_at.cmp(&mem_a.updated_at))
        });

        Ok(scored.into_iter().take(limit).map(|(_, m)| m).collect())
    }

    /// All memories for a user (importance-then-recency order).
    pub async fn list(&self, user_id: &str) -> Result<Vec<Memory>, RepositoryError> {
        self.repo.list(user_id).await
    }

    /// Delete everything known about a user. Returns the deleted count.
    pub async fn forget_all(&self, user_id: &str) -> Result<u64, RepositoryError> {
        self.repo.delete_all(user_id).await
    }

    /// Bound one user's memory count.
    ///
    /// Memories beyond the importance/recency-sorted `max_per_user`-th
    /// position are deletion candidates, but only those below the
    /// protection threshold are actually removed -- high-importance
    /// memories survive regardless of count. Returns the deleted count.
    pub async fn evict(&self, user_id: &str) -> Result<u64, RepositoryError> {
        let memories = self.repo.list(user_id).await?;
        if memories.len() <= self.config.max_per_user {
            return Ok(0);
        }

        let mut deleted = 0u64;
        for memory in &memories[self.config.max_per_user..] {
            if memory.importance < self.config.protected_importance {
                self.repo.delete(&memory.id).await?;
                deleted += 1;
            }
        }
        if deleted > 0 {
            debug!(user_id, deleted, "memories evicted");
        }
        Ok(deleted)
    }

    /// Eviction pass over every user with stored memories.
    pub async fn evict_all(&self) -> Result<u64, RepositoryError> {
        let mut total = 0u64;
        for user_id in self.repo.user_ids().await? {
            match self.evict(&user_id).await {
                Ok(deleted) => total += deleted,
                Err(err) => warn!(user_id, error = %err, "eviction failed for user"),
            }
        }
        Ok(total)
    }
}

/// Fraction of the memory's words that match any word of the message by
/// symmetric case-insensitive substring containment.
pub fn text_overlap(memory_value: &str, current_text: &str) -> f64 {
    let memory_words = words(memory_value);
    if memory_words.is_empty() {
        return 0.0;
    }
    let message_words = words(current_text);
    if message_words.is_empty() {
        return 0.0;
    }

    let matched = memory_words
        .iter()
        .filter(|w| {
            message_words
                .iter()
                .any(|m| m.contains(w.as_str()) || w.contains(m.as_str()))
        })
        .count();

    matched as f64 / memory_words.len() as f64
}

fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryMemories;

    fn engine() -> MemoryEngine<InMemoryMemories> {
        MemoryEngine::new(
            InMemoryMemories::default(),
            MemoryConfig {
                max_per_user: 3,
                protected_importance: 7,
                relevant_limit: 5,
                evict_interval_secs: 3600,
            },
        )
    }

    #[test]
    fn overlap_full_and_none() {
        assert!((text_overlap("coffee", "tell me about coffee") - 1.0).abs() < f64::EPSILON);
        assert!(text_overlap("lives in paris", "tell about coffee") < f64::EPSILON);
        assert!(text_overlap("", "anything") < f64::EPSILON);
    }

    #[test]
    fn overlap_is_fraction_of_memory_words() {
        // "loves coffee": only "coffee" matches
        let overlap = text_overlap("loves coffee", "tell me about coffee");
        assert!((overlap - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn extracting_same_fact_twice_updates_single_row() {
        let engine = engine();
        engine.extract_and_store("u1", "I love coffee").await.unwrap();
        engine.extract_and_store("u1", "I LOVE coffee").await.unwrap();

        let memories = engine.list("u1").await.unwrap();
        assert_eq!(memories.len(), 1);
        assert_eq!(memories[0].key, "preference:coffee");
    }

    #[tokio::test]
    async fn relevance_ranks_overlapping_memory_first() {
        let engine = engine();
        let now = Utc::now();
        engine
            .repo
            .upsert(&Memory {
                id: Uuid::now_v7(),
                user_id: "u1".to_string(),
                key: "preference:coffee".to_string(),
                value: "loves coffee".to_string(),
                kind: MemoryKind::Preference,
                importance: 9,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        engine
            .repo
            .upsert(&Memory {
                id: Uuid::now_v7(),
                user_id: "u1".to_string(),
                key: "fact:paris".to_string(),
                value: "lives in Paris".to_string(),
                kind: MemoryKind::Fact,
                importance: 5,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        let ranked = engine
            .relevant("u1", "tell me about coffee", 2)
            .await
            .unwrap();
        assert_eq!(ranked[0].value, "loves coffee");
    }

    #[tokio::test]
    async fn empty_text_falls_back_to_importance_order() {
        let engine = engine();
        engine.remember("u1", "note one").await.unwrap();
        engine.extract_and_store("u1", "maybe I like tea").await.unwrap();

        let ranked = engine.relevant("u1", "", 10).await.unwrap();
        // remember() stores at importance 8, hedged extraction at 3
        assert_eq!(ranked[0].importance, 8);
    }

    #[tokio::test]
    async fn evict_deletes_only_unprotected_overflow() {
        let engine = engine();
        let now = Utc::now();
        // 5 memories against a cap of 3; two overflow entries, one protected.
        for (i, importance) in [9u8, 8, 6, 5, 8].iter().enumerate() {
            engine
                .repo
                .upsert(&Memory {
                    id: Uuid::now_v7(),
                    user_id: "u1".to_string(),
                    key: format!("fact:{i}"),
                    value: format!("fact number {i}"),
                    kind: MemoryKind::Fact,
                    importance: *importance,
                    created_at: now,
                    updated_at: now + chrono::Duration::seconds(i as i64),
                })
                .await
                .unwrap();
        }

        let deleted = engine.evict("u1").await.unwrap();
        // Sorted by importance: [9, 8, 8] kept; overflow [6, 5] both below 7.
        assert_eq!(deleted, 2);
        let remaining = engine.list("u1").await.unwrap();
        assert_eq!(remaining.len(), 3);
        assert!(remaining.iter().all(|m| m.importance >= 7));
    }

    #[tokio::test]
    async fn evict_under_cap_is_noop() {
        let engine = engine();
        engine.extract_and_store("u1", "I love coffee").await.unwrap();
        assert_eq!(engine.evict("u1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn forget_all_clears_user() {
        let engine = engine();
        engine.remember("u1", "a").await.unwrap();
        let deleted = engine.forget_all("u1").await.unwrap();
        assert_eq!(deleted, 1);
        assert!(engine.list("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn evict_all_covers_every_user() {
        let engine = engine();
        engine.remember("u1", "a").await.unwrap();
        engine.remember("u2", "b").await.unwrap();
        // Under cap for both; exercises the user enumeration path.
        assert_eq!(engine.evict_all().await.unwrap(), 0);
    }
}
