//! In-memory fakes shared by the unit tests in this crate.
//!
//! The repositories mirror the SQLite implementations' contracts (atomic
//! claim, per-user sequences, upsert-by-key) over plain mutex-guarded maps;
//! the network clients record calls and replay scripted responses.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use corvid_types::error::{PlatformError, RepositoryError};
use corvid_types::event::{EventKind, ProcessedEventRecord};
use corvid_types::llm::{CompletionRequest, CompletionResponse, LlmError};
use corvid_types::memory::Memory;
use corvid_types::message::{ConversationMessage, MessageRole, RateDecision};
use corvid_types::platform::{Post, ReplyOptions, SearchFilters, SentMessage, UserProfile};

use crate::llm::CompletionClient;
use crate::platform::PlatformClient;
use crate::repository::{ConversationRepository, MemoryRepository, ProcessedEventRepository};

// ---------------------------------------------------------------------------
// Processed events
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryProcessedEvents {
    records: Mutex<HashMap<String, ProcessedEventRecord>>,
}

impl InMemoryProcessedEvents {
    pub fn insert_with_age(&self, event_id: &str, age: Duration) {
        self.records.lock().unwrap().insert(
            event_id.to_string(),
            ProcessedEventRecord {
                event_id: event_id.to_string(),
                kind: EventKind::Mention,
                user_id: "u1".to_string(),
                processed_at: Utc::now() - age,
            },
        );
    }
}

impl ProcessedEventRepository for InMemoryProcessedEvents {
    async fn try_claim(&self, record: &ProcessedEventRecord) -> Result<bool, RepositoryError> {
        let mut records = self.records.lock().unwrap();
        if records.contains_key(&record.event_id) {
            return Ok(false);
        }
        records.insert(record.event_id.clone(), record.clone());
        Ok(true)
    }

    async fn is_processed(&self, event_id: &str) -> Result<bool, RepositoryError> {
        Ok(self.records.lock().unwrap().contains_key(event_id))
    }

    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|_, r| r.processed_at >= cutoff);
        Ok((before - records.len()) as u64)
    }
}

// ---------------------------------------------------------------------------
// Conversations + rate windows
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryConversations {
    messages: Mutex<Vec<ConversationMessage>>,
    windows: Mutex<HashMap<String, (u32, DateTime<Utc>)>>,
}

impl ConversationRepository for InMemoryConversations {
    async fn append(
        &self,
        user_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<ConversationMessage, RepositoryError> {
        let mut messages = self.messages.lock().unwrap();
        let sequence = messages
            .iter()
            .filter(|m| m.user_id == user_id)
            .map(|m| m.sequence)
            .max()
            .unwrap_or(0)
            + 1;
        let message = ConversationMessage {
            id: Uuid::now_v7(),
            user_id: user_id.to_string(),
            role,
            content: content.to_string(),
            sequence,
            created_at: Utc::now(),
        };
        messages.push(message.clone());
        Ok(message)
    }

    async fn seed_if_empty(&self, user_id: &str, content: &str) -> Result<bool, RepositoryError> {
        let mut messages = self.messages.lock().unwrap();
        if messages.iter().any(|m| m.user_id == user_id) {
            return Ok(false);
        }
        messages.push(ConversationMessage {
            id: Uuid::now_v7(),
            user_id: user_id.to_string(),
            role: MessageRole::Assistant,
            content: content.to_string(),
            sequence: 1,
            created_at: Utc::now(),
        });
        Ok(true)
    }

    async fn history(&self, user_id: &str) -> Result<Vec<ConversationMessage>, RepositoryError> {
        let mut history: Vec<_> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        history.sort_by_key(|m| m.sequence);
        Ok(history)
    }

    async fn clear(&self, user_id: &str) -> Result<u64, RepositoryError> {
        let mut messages = self.messages.lock().unwrap();
        let before = messages.len();
        messages.retain(|m| m.user_id != user_id);
        Ok((before - messages.len()) as u64)
    }

    async fn check_and_increment_rate(
        &self,
        user_id: &str,
        cap: u32,
        window: Duration,
    ) -> Result<RateDecision, RepositoryError> {
        let mut windows = self.windows.lock().unwrap();
        let now = Utc::now();
        match windows.get_mut(user_id) {
            None => {
                windows.insert(user_id.to_string(), (1, now));
                Ok(RateDecision::allowed())
            }
            Some((count, window_start)) => {
                if now - *window_start >= window {
                    *count = 1;
                    *window_start = now;
                    Ok(RateDecision::allowed())
                } else if *count < cap {
                    *count += 1;
                    Ok(RateDecision::allowed())
                } else {
                    Ok(RateDecision::blocked(*window_start + window))
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Memories
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryMemories {
    rows: Mutex<Vec<Memory>>,
}

impl MemoryRepository for InMemoryMemories {
    async fn upsert(&self, memory: &Memory) -> Result<(), RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(existing) = rows
            .iter_mut()
            .find(|m| m.user_id == memory.user_id && m.key == memory.key)
        {
            existing.value = memory.value.clone();
            existing.kind = memory.kind;
            existing.importance = memory.importance;
            existing.updated_at = memory.updated_at;
        } else {
            rows.push(memory.clone());
        }
        Ok(())
    }

    async fn list(&self, user_id: &str) -> Result<Vec<Memory>, RepositoryError> {
        let mut list: Vec<_> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| {
            b.importance
                .cmp(&a.importance)
                .then(b.updated_at.cmp(&a.updated_at))
        });
        Ok(list)
    }

    async fn delete(&self, memory_id: &Uuid) -> Result<(), RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|m| m.id != *memory_id);
        if rows.len() == before {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete_all(&self, user_id: &str) -> Result<u64, RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|m| m.user_id != user_id);
        Ok((before - rows.len()) as u64)
    }

    async fn user_ids(&self) -> Result<Vec<String>, RepositoryError> {
        let mut ids: Vec<_> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.user_id.clone())
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}

// ---------------------------------------------------------------------------
// Platform client
// ---------------------------------------------------------------------------

/// Records outbound calls; `search_users` replays configured profiles.
#[derive(Default)]
pub struct MockPlatform {
    pub replies: Mutex<Vec<(String, ReplyOptions)>>,
    pub direct_messages: Mutex<Vec<(String, String)>>,
    pub followed: Mutex<Vec<String>>,
    pub blocked: Mutex<Vec<String>>,
    pub joined_groups: Mutex<Vec<String>>,
    pub left_groups: Mutex<Vec<String>>,
    pub users: Mutex<Vec<UserProfile>>,
    /// When true, every send fails (send-path error tests).
    pub fail_sends: std::sync::atomic::AtomicBool,
}

impl MockPlatform {
    pub fn with_user(self, profile: UserProfile) -> Self {
        self.users.lock().unwrap().push(profile);
        self
    }

    pub fn profile(id: &str, username: &str) -> UserProfile {
        UserProfile {
            id: id.to_string(),
            username: username.to_string(),
            display_name: None,
            bio: None,
            created_at: None,
            followers_count: 0,
            following_count: 0,
            is_bot: false,
            is_following_me: true,
        }
    }

    fn sends_fail(&self) -> bool {
        self.fail_sends.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl PlatformClient for MockPlatform {
    async fn me(&self) -> Result<UserProfile, PlatformError> {
        Ok(Self::profile("bot-1", "corvid"))
    }

    async fn user_info(&self, user_id: &str) -> Result<UserProfile, PlatformError> {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .ok_or_else(|| PlatformError::UserNotFound(user_id.to_string()))
    }

    async fn search_users(&self, query: &str) -> Result<Vec<UserProfile>, PlatformError> {
        let needle = query.to_lowercase();
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.username.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn send_reply(
        &self,
        text: &str,
        opts: &ReplyOptions,
    ) -> Result<SentMessage, PlatformError> {
        if self.sends_fail() {
            return Err(PlatformError::Timeout);
        }
        self.replies
            .lock()
            .unwrap()
            .push((text.to_string(), opts.clone()));
        Ok(SentMessage {
            id: format!("sent-{}", self.replies.lock().unwrap().len()),
            text: text.to_string(),
        })
    }

    async fn send_direct_message(
        &self,
        text: &str,
        user_id: &str,
    ) -> Result<SentMessage, PlatformError> {
        if self.sends_fail() {
            return Err(PlatformError::Timeout);
        }
        self.direct_messages
            .lock()
            .unwrap()
            .push((text.to_string(), user_id.to_string()));
        Ok(SentMessage {
            id: "dm-1".to_string(),
            text: text.to_string(),
        })
    }

    async fn search_posts(
        &self,
        _query: &str,
        _filters: &SearchFilters,
    ) -> Result<Vec<Post>, PlatformError> {
        Ok(Vec::new())
    }

    async fn follow_user(&self, user_id: &str) -> Result<(), PlatformError> {
        self.followed.lock().unwrap().push(user_id.to_string());
        Ok(())
    }

    async fn unfollow_user(&self, _user_id: &str) -> Result<(), PlatformError> {
        Ok(())
    }

    async fn block_user(&self, user_id: &str) -> Result<(), PlatformError> {
        self.blocked.lock().unwrap().push(user_id.to_string());
        Ok(())
    }

    async fn unblock_user(&self, _user_id: &str) -> Result<(), PlatformError> {
        Ok(())
    }

    async fn join_group(&self, group_id: &str) -> Result<(), PlatformError> {
        self.joined_groups.lock().unwrap().push(group_id.to_string());
        Ok(())
    }

    async fn leave_group(&self, group_id: &str) -> Result<(), PlatformError> {
        self.left_groups.lock().unwrap().push(group_id.to_string());
        Ok(())
    }

    async fn conversation_thread(
        &self,
        _root_id: &str,
        _max_depth: u32,
    ) -> Result<Vec<Post>, PlatformError> {
        Ok(Vec::new())
    }
}

// ---------------------------------------------------------------------------
// Completion client
// ---------------------------------------------------------------------------

/// Replays scripted responses in order and records every request.
#[derive(Default)]
pub struct MockCompletion {
    responses: Mutex<Vec<Result<CompletionResponse, ()>>>,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl MockCompletion {
    pub fn with_response(self, response: CompletionResponse) -> Self {
        self.responses.lock().unwrap().push(Ok(response));
        self
    }

    pub fn with_error(self) -> Self {
        self.responses.lock().unwrap().push(Err(()));
        self
    }

    pub fn text(content: &str) -> CompletionResponse {
        CompletionResponse {
            content: content.to_string(),
            tool_calls: Vec::new(),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionClient for MockCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(LlmError::Provider {
                message: "no scripted response".to_string(),
            });
        }
        match responses.remove(0) {
            Ok(response) => Ok(response),
            Err(()) => Err(LlmError::Timeout),
        }
    }
}
