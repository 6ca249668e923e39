//! Messaging-platform DTOs for Corvid.
//!
//! Thin data shapes for what the platform REST client returns and what the
//! bot sends back. The platform's full wire format is not modeled here --
//! only the fields the pipeline consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A platform-supplied user profile snapshot.
///
/// Ephemeral: cached with a TTL, refreshed on expiry, and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub followers_count: u64,
    #[serde(default)]
    pub following_count: u64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub is_following_me: bool,
}

/// A message the platform confirmed as sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentMessage {
    pub id: String,
    pub text: String,
}

/// A post returned by search or thread traversal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub author_user_id: String,
    #[serde(default)]
    pub author_username: Option<String>,
    pub text: String,
    #[serde(default)]
    pub in_reply_to_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Addressing for an outbound reply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplyOptions {
    /// Post id to reply to, when replying in a thread.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    /// Group/chat channel to post into, when applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
}

/// Filters for post search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}
