//! Memory types for Corvid.
//!
//! These types model the bot's long-term per-user memory: extracted facts,
//! preferences, and interests that persist across conversations. Memories
//! are upserted by a deterministic per-user key so that re-stating the same
//! fact overwrites rather than duplicates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Kind of a memory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    Preference,
    Fact,
    Conversation,
    Relationship,
    Interest,
    Goal,
    Experience,
    Reminder,
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryKind::Preference => write!(f, "preference"),
            MemoryKind::Fact => write!(f, "fact"),
            MemoryKind::Conversation => write!(f, "conversation"),
            MemoryKind::Relationship => write!(f, "relationship"),
            MemoryKind::Interest => write!(f, "interest"),
            MemoryKind::Goal => write!(f, "goal"),
            MemoryKind::Experience => write!(f, "experience"),
            MemoryKind::Reminder => write!(f, "reminder"),
        }
    }
}

impl FromStr for MemoryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "preference" => Ok(MemoryKind::Preference),
            "fact" => Ok(MemoryKind::Fact),
            "conversation" => Ok(MemoryKind::Conversation),
            "relationship" => Ok(MemoryKind::Relationship),
            "interest" => Ok(MemoryKind::Interest),
            "goal" => Ok(MemoryKind::Goal),
            "experience" => Ok(MemoryKind::Experience),
            "reminder" => Ok(MemoryKind::Reminder),
            other => Err(format!("invalid memory kind: '{other}'")),
        }
    }
}

/// A persisted, importance-scored fact about a user.
///
/// `key` is unique per user; a later extraction with the same key overwrites
/// value/importance/updated_at. `conversation`-kind memories are keyed by
/// timestamp and accumulate instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: Uuid,
    pub user_id: String,
    /// Deterministic dedup key, unique per user.
    pub key: String,
    /// The remembered text.
    pub value: String,
    pub kind: MemoryKind,
    /// Importance score from 1 (low) to 10 (critical).
    pub importance: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A memory candidate produced by the extractor, before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryCandidate {
    pub key: String,
    pub value: String,
    pub kind: MemoryKind,
    pub importance: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_kind_roundtrip() {
        for kind in [
            MemoryKind::Preference,
            MemoryKind::Fact,
            MemoryKind::Conversation,
            MemoryKind::Relationship,
            MemoryKind::Interest,
            MemoryKind::Goal,
            MemoryKind::Experience,
            MemoryKind::Reminder,
        ] {
            let s = kind.to_string();
            let parsed: MemoryKind = s.parse().unwrap();
            assert_eq!(kind, parsed);
        }
    }

    #[test]
    fn test_memory_kind_serde() {
        let json = serde_json::to_string(&MemoryKind::Interest).unwrap();
        assert_eq!(json, "\"interest\"");
        let parsed: MemoryKind = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, MemoryKind::Interest);
    }

    #[test]
    fn test_memory_serialize() {
        let memory = Memory {
            id: Uuid::now_v7(),
            user_id: "u1".to_string(),
            key: "preference:loves-coffee".to_string(),
            value: "loves coffee".to_string(),
            kind: MemoryKind::Preference,
            importance: 9,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&memory).unwrap();
        assert!(json.contains("\"kind\":\"preference\""));
        assert!(json.contains("\"importance\":9"));
    }
}
