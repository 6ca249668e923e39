//! The messaging-platform client seam.
//!
//! Object-safe so the orchestrator and tools can share one `Arc<dyn
//! PlatformClient>`; the REST implementation lives in `corvid-infra`. Every
//! method is a fallible remote call with no retry at this layer.

use async_trait::async_trait;

use corvid_types::error::PlatformError;
use corvid_types::platform::{Post, ReplyOptions, SearchFilters, SentMessage, UserProfile};

/// Remote operations the pipeline needs from the messaging platform.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// The bot's own profile.
    async fn me(&self) -> Result<UserProfile, PlatformError>;

    /// Profile of another user by platform id.
    async fn user_info(&self, user_id: &str) -> Result<UserProfile, PlatformError>;

    /// Best-effort user lookup by handle or display name.
    async fn search_users(&self, query: &str) -> Result<Vec<UserProfile>, PlatformError>;

    /// Post a public reply.
    async fn send_reply(
        &self,
        text: &str,
        opts: &ReplyOptions,
    ) -> Result<SentMessage, PlatformError>;

    /// Send a direct message to a user.
    async fn send_direct_message(
        &self,
        text: &str,
        user_id: &str,
    ) -> Result<SentMessage, PlatformError>;

    /// Search public posts.
    async fn search_posts(
        &self,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<Vec<Post>, PlatformError>;

    async fn follow_user(&self, user_id: &str) -> Result<(), PlatformError>;

    async fn unfollow_user(&self, user_id: &str) -> Result<(), PlatformError>;

    async fn block_user(&self, user_id: &str) -> Result<(), PlatformError>;

    async fn unblock_user(&self, user_id: &str) -> Result<(), PlatformError>;

    async fn join_group(&self, group_id: &str) -> Result<(), PlatformError>;

    async fn leave_group(&self, group_id: &str) -> Result<(), PlatformError>;

    /// Ordered thread from a root post, capped at `max_depth` hops.
    async fn conversation_thread(
        &self,
        root_id: &str,
        max_depth: u32,
    ) -> Result<Vec<Post>, PlatformError>;
}
