//! Inbound event types for the Corvid event bus.
//!
//! `InboundEvent` is the classified form of a raw platform frame. Events are
//! immutable once constructed and are consumed exactly once by the response
//! pipeline (the deduplicator enforces the "once").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// Classified kind of an inbound platform event.
///
/// Unrecognized frame shapes are classified as `Notification` -- no payload
/// is silently dropped at the classification layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Mention,
    Reply,
    DirectMessage,
    GroupInvite,
    Notification,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Mention => write!(f, "mention"),
            EventKind::Reply => write!(f, "reply"),
            EventKind::DirectMessage => write!(f, "direct_message"),
            EventKind::GroupInvite => write!(f, "group_invite"),
            EventKind::Notification => write!(f, "notification"),
        }
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mention" => Ok(EventKind::Mention),
            "reply" => Ok(EventKind::Reply),
            "direct_message" => Ok(EventKind::DirectMessage),
            "group_invite" => Ok(EventKind::GroupInvite),
            "notification" => Ok(EventKind::Notification),
            other => Err(format!("invalid event kind: '{other}'")),
        }
    }
}

/// A single classified occurrence delivered by the messaging platform.
///
/// `id` is the platform-assigned identifier and is the deduplication key:
/// the same logical event may surface through more than one channel (e.g.
/// a mention arriving via both the notification stream and a timeline
/// fallback) with the same id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Platform-assigned event identifier (dedup key).
    pub id: String,
    pub kind: EventKind,
    /// The user who authored the triggering message or action.
    pub author_user_id: String,
    /// Message text, stripped of nothing -- mention markup removal happens
    /// in the orchestrator.
    pub text: String,
    /// Group/chat channel the event belongs to, when applicable.
    pub channel_id: Option<String>,
    /// Id of the post this event replies to, when applicable.
    pub in_reply_to_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl InboundEvent {
    /// Whether this event should be answered in a direct-message channel
    /// rather than as a public reply.
    pub fn is_direct(&self) -> bool {
        matches!(self.kind, EventKind::DirectMessage)
    }
}

/// A processed-event record: existence implies "already handled".
///
/// Append-only; rows are pruned after the retention window, never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedEventRecord {
    pub event_id: String,
    pub kind: EventKind,
    pub user_id: String,
    pub processed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_roundtrip() {
        for kind in [
            EventKind::Mention,
            EventKind::Reply,
            EventKind::DirectMessage,
            EventKind::GroupInvite,
            EventKind::Notification,
        ] {
            let s = kind.to_string();
            let parsed: EventKind = s.parse().unwrap();
            assert_eq!(kind, parsed);
        }
    }

    #[test]
    fn test_event_kind_serde() {
        let kind = EventKind::DirectMessage;
        let json = serde_json::to_string(&kind).unwrap();
        assert_eq!(json, "\"direct_message\"");
        let parsed: EventKind = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, EventKind::DirectMessage);
    }

    #[test]
    fn test_inbound_event_is_direct() {
        let mut event = InboundEvent {
            id: "ev1".to_string(),
            kind: EventKind::Mention,
            author_user_id: "u1".to_string(),
            text: "@corvid hi".to_string(),
            channel_id: None,
            in_reply_to_id: None,
            created_at: Utc::now(),
        };
        assert!(!event.is_direct());

        event.kind = EventKind::DirectMessage;
        assert!(event.is_direct());
    }

    #[test]
    fn test_inbound_event_serialize() {
        let event = InboundEvent {
            id: "note-abc".to_string(),
            kind: EventKind::Reply,
            author_user_id: "u42".to_string(),
            text: "hello".to_string(),
            channel_id: Some("ch1".to_string()),
            in_reply_to_id: Some("note-parent".to_string()),
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"kind\":\"reply\""));
        assert!(json.contains("\"id\":\"note-abc\""));
    }
}
