//! TTL cache for platform user profiles.
//!
//! Profile snapshots are ephemeral context: cached with a TTL, refreshed on
//! expiry, and never persisted. Staleness is acceptable -- when a refresh
//! fails the last-known value is served instead, with a warn log.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::warn;

use corvid_types::platform::UserProfile;

use crate::platform::PlatformClient;

struct CachedProfile {
    profile: UserProfile,
    fetched_at: Instant,
}

/// Process-scoped profile cache keyed by platform user id.
pub struct ProfileCache {
    client: Arc<dyn PlatformClient>,
    entries: DashMap<String, CachedProfile>,
    ttl: Duration,
}

impl ProfileCache {
    pub fn new(client: Arc<dyn PlatformClient>, ttl: Duration) -> Self {
        Self {
            client,
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Fetch a profile, serving from cache while fresh.
    ///
    /// Returns `None` only when there is no cached value AND the fetch
    /// fails -- a stale cached value always wins over an error.
    pub async fn get(&self, user_id: &str) -> Option<UserProfile> {
        if let Some(entry) = self.entries.get(user_id) {
            if entry.fetched_at.elapsed() < self.ttl {
                return Some(entry.profile.clone());
            }
        }

        match self.client.user_info(user_id).await {
            Ok(profile) => {
                self.entries.insert(
                    user_id.to_string(),
                    CachedProfile {
                        profile: profile.clone(),
                        fetched_at: Instant::now(),
                    },
                );
                Some(profile)
            }
            Err(err) => {
                warn!(user_id, error = %err, "profile refresh failed; serving stale value if any");
                self.entries.get(user_id).map(|e| e.profile.clone())
            }
        }
    }

    /// Number of cached entries (diagnostics).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
