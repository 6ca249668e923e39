//! Per-user conversation state: ordered log plus the message-rate window.
//!
//! `ConversationService` wraps a `ConversationRepository` with the seed
//! message policy and rate-limit exemptions. Ordering is authoritative from
//! the per-user `sequence` the repository assigns.

use chrono::Duration;
use tracing::debug;

use corvid_types::config::RateConfig;
use corvid_types::error::RepositoryError;
use corvid_types::message::{ConversationMessage, MessageRole, RateDecision};

use crate::repository::ConversationRepository;

/// Conversation log and rate-window operations for one bot.
pub struct ConversationService<R: ConversationRepository> {
    repo: R,
    rate: RateConfig,
    seed_message: Option<String>,
}

impl<R: ConversationRepository> ConversationService<R> {
    pub fn new(repo: R, rate: RateConfig, seed_message: Option<String>) -> Self {
        Self {
            repo,
            rate,
            seed_message,
        }
    }

    /// Append a message to a user's log.
    ///
    /// On the user's very first message the configured seed is inserted
    /// ahead of it (exactly once; the repository makes the check atomic).
    pub async fn append(
        &self,
        user_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<ConversationMessage, RepositoryError> {
        if let Some(seed) = &self.seed_message {
            if self.repo.seed_if_empty(user_id, seed).await? {
                debug!(user_id, "seed message inserted");
            }
        }
        self.repo.append(user_id, role, content).await
    }

    /// Full history in causal order.
    pub async fn history(&self, user_id: &str) -> Result<Vec<ConversationMessage>, RepositoryError> {
        self.repo.history(user_id).await
    }

    /// Drop a user's log. The seed (if configured) is re-inserted on the
    /// next append.
    pub async fn clear(&self, user_id: &str) -> Result<u64, RepositoryError> {
        self.repo.clear(user_id).await
    }

    /// Fixed-window rate check. Exempt users bypass entirely and no window
    /// row is touched for them.
    pub async fn check_and_increment_rate(
        &self,
        user_id: &str,
        is_exempt: bool,
    ) -> Result<RateDecision, RepositoryError> {
        if is_exempt {
            return Ok(RateDecision::allowed());
        }
        let window = Duration::seconds(self.rate.window_secs as i64);
        self.repo
            .check_and_increment_rate(user_id, self.rate.max_messages, window)
            .await
    }

    /// Whether the configured exemption list contains this user.
    pub fn is_exempt(&self, user_id: &str) -> bool {
        self.rate.exempt_user_ids.iter().any(|id| id == user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryConversations;

    fn service(seed: Option<&str>) -> ConversationService<InMemoryConversations> {
        let rate = RateConfig {
            max_messages: 3,
            window_secs: 3600,
            exempt_user_ids: vec!["owner".to_string()],
        };
        ConversationService::new(
            InMemoryConversations::default(),
            rate,
            seed.map(str::to_string),
        )
    }

    #[tokio::test]
    async fn append_assigns_increasing_sequence() {
        let svc = service(None);
        let m1 = svc.append("u1", MessageRole::User, "one").await.unwrap();
        let m2 = svc.append("u1", MessageRole::Assistant, "two").await.unwrap();
        assert!(m2.sequence > m1.sequence);

        let history = svc.history("u1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "one");
        assert_eq!(history[1].content, "two");
    }

    #[tokio::test]
    async fn seed_message_inserted_once_before_first_real_message() {
        let svc = service(Some("Hi! I'm Corvid."));
        svc.append("u1", MessageRole::User, "hello").await.unwrap();
        svc.append("u1", MessageRole::User, "again").await.unwrap();

        let history = svc.history("u1").await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].content, "Hi! I'm Corvid.");
        assert_eq!(history[0].role, MessageRole::Assistant);
        assert_eq!(history[0].sequence, 1);
    }

    #[tokio::test]
    async fn clear_then_append_reseeds() {
        let svc = service(Some("seed"));
        svc.append("u1", MessageRole::User, "hello").await.unwrap();
        svc.clear("u1").await.unwrap();
        svc.append("u1", MessageRole::User, "fresh").await.unwrap();

        let history = svc.history("u1").await.unwrap();
        assert_eq!(history[0].content, "seed");
        assert_eq!(history[1].content, "fresh");
    }

    #[tokio::test]
    async fn rate_blocks_at_cap_and_reports_reset() {
        let svc = service(None);
        for _ in 0..3 {
            assert!(svc
                .check_and_increment_rate("u1", false)
                .await
                .unwrap()
                .allowed);
        }
        let decision = svc.check_and_increment_rate("u1", false).await.unwrap();
        assert!(!decision.allowed);
        let reset_at = decision.reset_at.unwrap();
        assert!(reset_at > chrono::Utc::now());
    }

    #[tokio::test]
    async fn exempt_user_bypasses_rate_check() {
        let svc = service(None);
        assert!(svc.is_exempt("owner"));
        for _ in 0..10 {
            assert!(svc
                .check_and_increment_rate("owner", true)
                .await
                .unwrap()
                .allowed);
        }
    }

    #[tokio::test]
    async fn different_users_have_independent_windows() {
        let svc = service(None);
        for _ in 0..3 {
            svc.check_and_increment_rate("u1", false).await.unwrap();
        }
        assert!(!svc.check_and_increment_rate("u1", false).await.unwrap().allowed);
        assert!(svc.check_and_increment_rate("u2", false).await.unwrap().allowed);
    }
}
