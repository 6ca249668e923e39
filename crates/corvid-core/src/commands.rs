//! Built-in text commands.
//!
//! A small command surface recognized case-insensitively, independent of the
//! completion service: these short-circuit the agent loop entirely and
//! terminate the event with a fixed reply. Parsing is pure; execution lives
//! in the orchestrator.

use corvid_types::memory::Memory;

/// A recognized built-in command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    ClearContext,
    ShowMemory,
    ClearMemory,
    Remember(String),
    LeaveGroup,
}

/// Fixed reply for `help`.
pub const HELP_TEXT: &str = "Here's what I understand:\n\
    - help : this message\n\
    - !cc / !clearcontext : clear our conversation context\n\
    - !memory / !mem : show what I remember about you\n\
    - !clearmemory / !forgetme : forget everything about you\n\
    - !remember <text> : make me remember something\n\
    Otherwise, just talk to me!";

/// Fixed reply for `!cc`.
pub const CONTEXT_CLEARED: &str = "Context cleared. Let's start fresh!";

/// Fixed reply for `!clearmemory`.
pub const MEMORY_CLEARED: &str = "Done. I've forgotten everything about you.";

/// Fixed reply for `!remember`.
pub const REMEMBER_ACK: &str = "Got it, I'll remember that.";

/// Fixed reply when `!remember` has no text.
pub const REMEMBER_EMPTY: &str = "Tell me what to remember, e.g. `!remember I take my coffee black`.";

/// Fixed reply when leaving a group.
pub const LEAVING_GROUP: &str = "Okay, leaving this group. Bye!";

/// Fixed reply when a leave-group request arrives outside a group.
pub const NOT_A_GROUP: &str = "This doesn't look like a group conversation.";

/// Fixed reply when the user has no memories yet.
pub const NO_MEMORIES: &str = "I don't have any memories of you yet.";

/// Parse a stripped message into a built-in command, if any.
pub fn parse(text: &str) -> Option<Command> {
    let trimmed = text.trim();
    let lowered = trimmed.to_lowercase();

    match lowered.as_str() {
        "help" => return Some(Command::Help),
        "!cc" | "!clearcontext" => return Some(Command::ClearContext),
        "!memory" | "!mem" => return Some(Command::ShowMemory),
        "!clearmemory" | "!forgetme" => return Some(Command::ClearMemory),
        _ => {}
    }

    if lowered.starts_with("!remember") {
        let rest = trimmed[1..].trim_start_matches(|c: char| c.is_alphabetic());
        return Some(Command::Remember(rest.trim().to_string()));
    }

    // Context-dependent group exit: free text naming both words.
    if lowered.contains("leave") && lowered.contains("group") {
        return Some(Command::LeaveGroup);
    }

    None
}

/// Render the `!memory` reply.
pub fn format_memories(memories: &[Memory]) -> String {
    if memories.is_empty() {
        return NO_MEMORIES.to_string();
    }

    let mut lines = vec![format!("Here's what I remember about you ({}):", memories.len())];
    for memory in memories.iter().take(20) {
        lines.push(format!(
            "- [{}] {} (importance {})",
            memory.kind, memory.value, memory.importance
        ));
    }
    if memories.len() > 20 {
        lines.push(format!("...and {} more.", memories.len() - 20));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use corvid_types::memory::MemoryKind;
    use uuid::Uuid;

    #[test]
    fn help_is_case_insensitive() {
        assert_eq!(parse("help"), Some(Command::Help));
        assert_eq!(parse("  HELP  "), Some(Command::Help));
    }

    #[test]
    fn clear_context_aliases() {
        assert_eq!(parse("!cc"), Some(Command::ClearContext));
        assert_eq!(parse("!ClearContext"), Some(Command::ClearContext));
    }

    #[test]
    fn memory_aliases() {
        assert_eq!(parse("!memory"), Some(Command::ShowMemory));
        assert_eq!(parse("!MEM"), Some(Command::ShowMemory));
    }

    #[test]
    fn clear_memory_aliases() {
        assert_eq!(parse("!clearmemory"), Some(Command::ClearMemory));
        assert_eq!(parse("!forgetme"), Some(Command::ClearMemory));
    }

    #[test]
    fn remember_captures_payload() {
        assert_eq!(
            parse("!remember my cat is called Misha"),
            Some(Command::Remember("my cat is called Misha".to_string()))
        );
        assert_eq!(parse("!remember"), Some(Command::Remember(String::new())));
    }

    #[test]
    fn leave_group_free_text() {
        assert_eq!(parse("please leave this group"), Some(Command::LeaveGroup));
        assert_eq!(parse("could you LEAVE the Group now"), Some(Command::LeaveGroup));
    }

    #[test]
    fn ordinary_text_is_not_a_command() {
        assert_eq!(parse("hello there"), None);
        assert_eq!(parse("what do you remember?"), None);
        assert_eq!(parse("group hug!"), None);
    }

    #[test]
    fn format_memories_empty_and_full() {
        assert_eq!(format_memories(&[]), NO_MEMORIES);

        let memory = Memory {
            id: Uuid::now_v7(),
            user_id: "u1".to_string(),
            key: "preference:coffee".to_string(),
            value: "loves coffee".to_string(),
            kind: MemoryKind::Preference,
            importance: 9,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let rendered = format_memories(&[memory]);
        assert!(rendered.contains("loves coffee"));
        assert!(rendered.contains("[preference]"));
        assert!(rendered.contains("importance 9"));
    }
}
