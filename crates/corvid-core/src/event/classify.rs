//! Raw-frame classification into `InboundEvent`.
//!
//! The streaming connection delivers JSON frames with a declared top-level
//! `type` and a nested `body`. Classification is pure: it inspects the
//! declared type and the payload shape, never the network. Unrecognized
//! body shapes on the notification channel become generic `Notification`
//! events -- they are still delivered, not dropped. Frames that carry no
//! platform id cannot be deduplicated and yield `None` (the caller logs the
//! drop at debug level).

use chrono::{DateTime, Utc};
use serde_json::Value;

use corvid_types::event::{EventKind, InboundEvent};

/// Classify a raw platform frame.
///
/// `bot_user_id` filters out the bot's own posts; `bot_handle` (without the
/// leading '@') detects timeline mentions that never surfaced through the
/// notification channel.
pub fn classify_frame(frame: &Value, bot_user_id: &str, bot_handle: &str) -> Option<InboundEvent> {
    let frame_type = frame.get("type").and_then(Value::as_str)?;
    let body = frame.get("body")?;

    match frame_type {
        "notification" => classify_notification(body),
        // Direct-message channel frames.
        "message" | "chat" => build_event(body, EventKind::DirectMessage),
        // Timeline posts: only interesting when they address the bot.
        "note" | "post" => classify_post(body, bot_user_id, bot_handle),
        // Anything else with an identifiable body is a generic notification.
        _ => build_event(body, EventKind::Notification),
    }
}

fn classify_notification(body: &Value) -> Option<InboundEvent> {
    let kind = match body.get("type").and_then(Value::as_str) {
        Some("mention") => EventKind::Mention,
        Some("reply") => EventKind::Reply,
        Some("group_invite") | Some("groupInvited") => EventKind::GroupInvite,
        // Unrecognized notification shapes are still delivered.
        _ => EventKind::Notification,
    };
    build_event(body, kind)
}

fn classify_post(body: &Value, bot_user_id: &str, bot_handle: &str) -> Option<InboundEvent> {
    let author = field_str(body, &["user_id", "userId"])?;
    if author == bot_user_id {
        // Our own posts echo back on the timeline; never respond to them.
        return None;
    }

    let text = field_str(body, &["text", "content"]).unwrap_or_default();
    let handle_marker = format!("@{}", bot_handle.to_lowercase());
    if !text.to_lowercase().contains(&handle_marker) {
        // A timeline post that does not address the bot is not an event.
        return None;
    }

    let kind = if field_str(body, &["reply_id", "replyId"]).is_some() {
        EventKind::Reply
    } else {
        EventKind::Mention
    };
    build_event(body, kind)
}

fn build_event(body: &Value, kind: EventKind) -> Option<InboundEvent> {
    // The interesting payload may sit one level down (notification frames
    // wrap the triggering note).
    let note = body.get("note").filter(|n| n.is_object());
    let payload = note.unwrap_or(body);

    // Prefer the nested note's id: the same note reaching us through the
    // notification channel and the timeline fallback must produce the same
    // event id, or deduplication cannot collapse the two deliveries.
    let id = field_str(payload, &["id"]).or_else(|| field_str(body, &["id"]))?;

    let author_user_id = field_str(payload, &["user_id", "userId"])
        .or_else(|| {
            payload
                .get("user")
                .and_then(|u| u.get("id"))
                .and_then(Value::as_str)
        })
        .or_else(|| field_str(body, &["user_id", "userId"]))?
        .to_string();

    let text = field_str(payload, &["text", "content"])
        .unwrap_or_default()
        .to_string();

    Some(InboundEvent {
        id: id.to_string(),
        kind,
        author_user_id,
        text,
        channel_id: field_str(payload, &["channel_id", "channelId", "group_id", "groupId"])
            .map(str::to_string),
        in_reply_to_id: field_str(payload, &["reply_id", "replyId"]).map(str::to_string),
        created_at: field_str(payload, &["created_at", "createdAt"])
            .and_then(parse_timestamp)
            .unwrap_or_else(Utc::now),
    })
}

fn field_str<'a>(value: &'a Value, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .find_map(|name| value.get(name).and_then(Value::as_str))
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BOT_ID: &str = "bot-1";
    const BOT_HANDLE: &str = "corvid";

    #[test]
    fn mention_notification_classifies_as_mention() {
        let frame = json!({
            "type": "notification",
            "body": {
                "id": "n-1",
                "type": "mention",
                "note": {
                    "id": "note-1",
                    "user_id": "u-9",
                    "text": "@corvid hello there",
                    "created_at": "2026-08-01T12:00:00Z"
                }
            }
        });
        let event = classify_frame(&frame, BOT_ID, BOT_HANDLE).unwrap();
        assert_eq!(event.kind, EventKind::Mention);
        // The nested note's id wins over the notification envelope id, so a
        // timeline fallback delivery of the same note deduplicates with it.
        assert_eq!(event.id, "note-1");
        assert_eq!(event.author_user_id, "u-9");
        assert_eq!(event.text, "@corvid hello there");
    }

    #[test]
    fn reply_notification_classifies_as_reply() {
        let frame = json!({
            "type": "notification",
            "body": {
                "id": "n-2",
                "type": "reply",
                "note": { "id": "note-2", "user_id": "u-9", "text": "sure", "reply_id": "note-1" }
            }
        });
        let event = classify_frame(&frame, BOT_ID, BOT_HANDLE).unwrap();
        assert_eq!(event.kind, EventKind::Reply);
        assert_eq!(event.in_reply_to_id.as_deref(), Some("note-1"));
    }

    #[test]
    fn unknown_notification_shape_still_delivered() {
        let frame = json!({
            "type": "notification",
            "body": { "id": "n-3", "type": "achievement_earned", "user_id": "u-2" }
        });
        let event = classify_frame(&frame, BOT_ID, BOT_HANDLE).unwrap();
        assert_eq!(event.kind, EventKind::Notification);
    }

    #[test]
    fn group_invite_notification() {
        let frame = json!({
            "type": "notification",
            "body": { "id": "n-4", "type": "group_invite", "user_id": "u-2", "group_id": "g-7" }
        });
        let event = classify_frame(&frame, BOT_ID, BOT_HANDLE).unwrap();
        assert_eq!(event.kind, EventKind::GroupInvite);
        assert_eq!(event.channel_id.as_deref(), Some("g-7"));
    }

    #[test]
    fn chat_frame_classifies_as_direct_message() {
        let frame = json!({
            "type": "message",
            "body": { "id": "m-1", "user_id": "u-3", "text": "hi corvid" }
        });
        let event = classify_frame(&frame, BOT_ID, BOT_HANDLE).unwrap();
        assert_eq!(event.kind, EventKind::DirectMessage);
    }

    #[test]
    fn timeline_post_mentioning_bot_is_mention_fallback() {
        let frame = json!({
            "type": "note",
            "body": { "id": "note-5", "user_id": "u-4", "text": "hey @Corvid what's up" }
        });
        let event = classify_frame(&frame, BOT_ID, BOT_HANDLE).unwrap();
        assert_eq!(event.kind, EventKind::Mention);
    }

    #[test]
    fn timeline_reply_mentioning_bot_is_reply() {
        let frame = json!({
            "type": "note",
            "body": {
                "id": "note-6",
                "user_id": "u-4",
                "text": "@corvid and then?",
                "reply_id": "note-5"
            }
        });
        let event = classify_frame(&frame, BOT_ID, BOT_HANDLE).unwrap();
        assert_eq!(event.kind, EventKind::Reply);
    }

    #[test]
    fn own_post_is_ignored() {
        let frame = json!({
            "type": "note",
            "body": { "id": "note-7", "user_id": BOT_ID, "text": "@corvid echo" }
        });
        assert!(classify_frame(&frame, BOT_ID, BOT_HANDLE).is_none());
    }

    #[test]
    fn timeline_post_without_mention_is_ignored() {
        let frame = json!({
            "type": "note",
            "body": { "id": "note-8", "user_id": "u-4", "text": "nice weather today" }
        });
        assert!(classify_frame(&frame, BOT_ID, BOT_HANDLE).is_none());
    }

    #[test]
    fn frame_without_id_yields_none() {
        let frame = json!({
            "type": "notification",
            "body": { "type": "mention", "user_id": "u-1", "text": "@corvid hi" }
        });
        assert!(classify_frame(&frame, BOT_ID, BOT_HANDLE).is_none());
    }

    #[test]
    fn unknown_top_level_type_with_body_is_notification() {
        let frame = json!({
            "type": "announcement",
            "body": { "id": "a-1", "user_id": "admin", "text": "maintenance tonight" }
        });
        let event = classify_frame(&frame, BOT_ID, BOT_HANDLE).unwrap();
        assert_eq!(event.kind, EventKind::Notification);
    }

    #[test]
    fn camel_case_fields_are_accepted() {
        let frame = json!({
            "type": "notification",
            "body": {
                "id": "n-9",
                "type": "mention",
                "note": {
                    "id": "note-9",
                    "userId": "u-11",
                    "text": "@corvid ping",
                    "createdAt": "2026-08-01T09:30:00Z",
                    "channelId": "ch-2"
                }
            }
        });
        let event = classify_frame(&frame, BOT_ID, BOT_HANDLE).unwrap();
        assert_eq!(event.author_user_id, "u-11");
        assert_eq!(event.channel_id.as_deref(), Some("ch-2"));
        assert_eq!(event.created_at.to_rfc3339(), "2026-08-01T09:30:00+00:00");
    }
}
