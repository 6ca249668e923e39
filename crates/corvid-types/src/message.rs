//! Conversation message and rate-window types for Corvid.
//!
//! These types model the per-user conversation log and the fixed-window
//! message-rate counter that backs rate limiting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Role of a stored conversation message.
///
/// Maps to the CHECK constraint in the SQLite schema:
/// `CHECK (role IN ('user', 'assistant'))`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("invalid message role: '{other}'")),
        }
    }
}

/// A single message in a user's conversation log.
///
/// `sequence` is monotonic per user and is the authoritative context order;
/// gaps from deletions are acceptable, only relative order matters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: Uuid,
    pub user_id: String,
    pub role: MessageRole,
    pub content: String,
    pub sequence: i64,
    pub created_at: DateTime<Utc>,
}

/// One live rate window per user.
///
/// The window is fixed, measured from the first message of the current
/// window: when `now - window_start` exceeds the window length the counter
/// resets to 1 on the triggering message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateWindow {
    pub user_id: String,
    pub count: u32,
    pub window_start: DateTime<Utc>,
}

/// Outcome of a rate check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    /// When the current window resets; present only when blocked.
    pub reset_at: Option<DateTime<Utc>>,
}

impl RateDecision {
    /// An allowing decision (no reset time).
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reset_at: None,
        }
    }

    /// A blocking decision carrying the window reset time.
    pub fn blocked(reset_at: DateTime<Utc>) -> Self {
        Self {
            allowed: false,
            reset_at: Some(reset_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_role_roundtrip() {
        for role in [MessageRole::User, MessageRole::Assistant] {
            let s = role.to_string();
            let parsed: MessageRole = s.parse().unwrap();
            assert_eq!(role, parsed);
        }
    }

    #[test]
    fn test_message_role_serde() {
        let json = serde_json::to_string(&MessageRole::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }

    #[test]
    fn test_rate_decision_constructors() {
        let ok = RateDecision::allowed();
        assert!(ok.allowed);
        assert!(ok.reset_at.is_none());

        let at = Utc::now();
        let blocked = RateDecision::blocked(at);
        assert!(!blocked.allowed);
        assert_eq!(blocked.reset_at, Some(at));
    }

    #[test]
    fn test_conversation_message_serialize() {
        let msg = ConversationMessage {
            id: Uuid::now_v7(),
            user_id: "u1".to_string(),
            role: MessageRole::User,
            content: "hello".to_string(),
            sequence: 3,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"role\":\"user\""));
        assert!(json.contains("\"sequence\":3"));
    }
}
