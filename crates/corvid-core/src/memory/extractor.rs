//! Rule-based memory extraction.
//!
//! A fixed set of linguistic patterns derives zero or more memory candidates
//! from a single message: first-person preference statements, self-descriptive
//! facts, interests, goals, relationships, and explicit remember cues. Each
//! candidate's key is derived deterministically from its matched text
//! (normalized, truncated) so that re-stating the same fact overwrites
//! rather than duplicates.
//!
//! Extraction is pure text processing; persistence lives in the engine.

use regex::Regex;

use corvid_types::memory::{MemoryCandidate, MemoryKind};

/// Importance assigned when a high-salience cue is present.
const IMPORTANCE_HIGH: u8 = 9;
/// Importance assigned when a medium-salience cue is present.
const IMPORTANCE_MEDIUM: u8 = 6;
/// Importance assigned when only hedging language is present.
const IMPORTANCE_LOW: u8 = 3;
/// Importance when no cue matches.
const IMPORTANCE_DEFAULT: u8 = 5;
/// Importance of the standalone conversation-type memory for explicit
/// "remember"/"important" messages.
const IMPORTANCE_CONVERSATION: u8 = 8;

/// Maximum key slug length in characters.
const KEY_SLUG_MAX: usize = 40;

const HIGH_CUES: &[&str] = &[
    "remember",
    "never forget",
    "always",
    "favorite",
    "favourite",
    "most important",
    "best",
    "worst",
];

const MEDIUM_CUES: &[&str] = &["really", "very", "important", "love", "hate", "crucial"];

const LOW_CUES: &[&str] = &[
    "maybe",
    "sometimes",
    "kind of",
    "sort of",
    "a bit",
    "i guess",
    "probably",
];

struct ExtractionPattern {
    regex: Regex,
    kind: MemoryKind,
}

/// Derives memory candidates from message text.
pub struct MemoryExtractor {
    patterns: Vec<ExtractionPattern>,
}

impl Default for MemoryExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryExtractor {
    pub fn new() -> Self {
        let specs: &[(&str, MemoryKind)] = &[
            (
                r"(?i)\bi (?:really |absolutely |kind of |sort of )?(?:love|like|enjoy|prefer|hate|dislike)\s+([^.!?\n,]{2,80})",
                MemoryKind::Preference,
            ),
            (
                r"(?i)\bmy name is\s+([^.!?\n,]{2,40})",
                MemoryKind::Fact,
            ),
            (
                r"(?i)\bi (?:work|study) (?:as|at|in)\s+([^.!?\n,]{2,60})",
                MemoryKind::Fact,
            ),
            (
                r"(?i)\bi live in\s+([^.!?\n,]{2,60})",
                MemoryKind::Fact,
            ),
            (
                r"(?i)\b(?:my hobby is|my hobbies are|i(?:'m| am) (?:interested in|into))\s+([^.!?\n,]{2,60})",
                MemoryKind::Interest,
            ),
            (
                r"(?i)\bi (?:want to|plan to|hope to|dream of|aim to)\s+([^.!?\n,]{2,60})",
                MemoryKind::Goal,
            ),
            (
                r"(?i)\bmy (?:wife|husband|partner|girlfriend|boyfriend|mother|mom|father|dad|sister|brother|best friend|dog|cat)(?:'s name)? is\s+([^.!?\n,]{2,40})",
                MemoryKind::Relationship,
            ),
            (
                r"(?i)\bi (?:used to|recently|just)\s+([^.!?\n,]{2,60})",
                MemoryKind::Experience,
            ),
            (
                r"(?i)\b(?:remember that|don't forget that|remind me that)\s+([^.!?\n]{2,80})",
                MemoryKind::Reminder,
            ),
        ];

        let patterns = specs
            .iter()
            .map(|(pattern, kind)| ExtractionPattern {
                // Patterns are fixed string literals; a failure here is a
                // programming error caught by the tests below.
                regex: Regex::new(pattern).unwrap(),
                kind: *kind,
            })
            .collect();

        Self { patterns }
    }

    /// Extract memory candidates from one message.
    ///
    /// `timestamp_ms` keys the non-deduplicated conversation-type memory
    /// (the caller passes the current time; tests pass a fixed value).
    pub fn extract(&self, text: &str, timestamp_ms: i64) -> Vec<MemoryCandidate> {
        let mut candidates: Vec<MemoryCandidate> = Vec::new();
        let importance = score_importance(text);

        for pattern in &self.patterns {
            for caps in pattern.regex.captures_iter(text) {
                let Some(matched) = caps.get(1) else { continue };
                let value = caps
                    .get(0)
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default();
                let key = format!("{}:{}", pattern.kind, slug(matched.as_str()));

                // The same fact stated twice in one message collapses here;
                // across messages the repository upsert collapses it.
                if candidates.iter().any(|c| c.key == key) {
                    continue;
                }
                candidates.push(MemoryCandidate {
                    key,
                    value,
                    kind: pattern.kind,
                    importance,
                });
            }
        }

        // Explicit remember/important language anywhere in the message also
        // captures the whole message as a conversation memory. Keyed by
        // timestamp: these accumulate instead of overwriting.
        let lowered = text.to_lowercase();
        if lowered.contains("remember") || lowered.contains("important") {
            candidates.push(MemoryCandidate {
                key: format!("conversation:{timestamp_ms}"),
                value: text.trim().to_string(),
                kind: MemoryKind::Conversation,
                importance: IMPORTANCE_CONVERSATION,
            });
        }

        candidates
    }
}

/// Keyword-tier importance lookup over the whole message.
pub fn score_importance(text: &str) -> u8 {
    let lowered = text.to_lowercase();
    if HIGH_CUES.iter().any(|cue| lowered.contains(cue)) {
        IMPORTANCE_HIGH
    } else if MEDIUM_CUES.iter().any(|cue| lowered.contains(cue)) {
        IMPORTANCE_MEDIUM
    } else if LOW_CUES.iter().any(|cue| lowered.contains(cue)) {
        IMPORTANCE_LOW
    } else {
        IMPORTANCE_DEFAULT
    }
}

/// Normalize matched text into a deterministic key slug: lowercase,
/// alphanumeric words joined by '-', truncated.
fn slug(text: &str) -> String {
    let normalized: Vec<String> = text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect();
    normalized.join("-").chars().take(KEY_SLUG_MAX).collect()
}
