//! Anthropic Messages API wire types.
//!
//! These are Anthropic-specific request/response structures used for HTTP
//! communication with the Messages API. They are NOT the generic completion
//! types from corvid-types -- those are provider-agnostic.

use serde::{Deserialize, Serialize};

/// Request body for the Anthropic Messages API.
#[derive(Debug, Clone, Serialize)]
pub struct AnthropicRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Advertised tool catalog. Skipped when empty.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<AnthropicTool>,
}

/// A single message in an Anthropic conversation.
///
/// Content is always the block form; plain text becomes one `text` block.
#[derive(Debug, Clone, Serialize)]
pub struct AnthropicMessage {
    pub role: String,
    pub content: Vec<AnthropicContentBlock>,
}

/// A tool advertised to the Messages API.
#[derive(Debug, Clone, Serialize)]
pub struct AnthropicTool {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// A content block in an Anthropic request or response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AnthropicContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

/// Non-streaming response from the Anthropic Messages API.
#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicResponse {
    pub id: String,
    pub content: Vec<AnthropicContentBlock>,
    pub model: String,
    pub stop_reason: Option<String>,
}

/// An error payload from the Anthropic API.
#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}

/// Error responses arrive wrapped in an envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicErrorEnvelope {
    pub error: AnthropicError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization_skips_empty_tools() {
        let req = AnthropicRequest {
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 1024,
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: vec![AnthropicContentBlock::Text {
                    text: "Hello".to_string(),
                }],
            }],
            system: Some("You are helpful.".to_string()),
            temperature: Some(0.7),
            tools: Vec::new(),
        };

        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["model"], "claude-sonnet-4-20250514");
        assert_eq!(json["messages"][0]["content"][0]["type"], "text");
        assert!(json.get("tools").is_none());
    }

    #[test]
    fn test_request_serialization_with_tools() {
        let req = AnthropicRequest {
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 1024,
            messages: Vec::new(),
            system: None,
            temperature: None,
            tools: vec![AnthropicTool {
                name: "follow_user".to_string(),
                description: "Follow a user".to_string(),
                input_schema: serde_json::json!({"type": "object"}),
            }],
        };

        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["tools"][0]["name"], "follow_user");
        assert!(json["tools"][0]["input_schema"].is_object());
        assert!(json.get("system").is_none());
    }

    #[test]
    fn test_content_block_tool_use_deserialization() {
        let json = r#"{"type": "tool_use", "id": "tool_1", "name": "search_posts", "input": {"query": "rust"}}"#;
        let block: AnthropicContentBlock = serde_json::from_str(json).unwrap();
        match block {
            AnthropicContentBlock::ToolUse { id, name, input } => {
                assert_eq!(id, "tool_1");
                assert_eq!(name, "search_posts");
                assert_eq!(input["query"], "rust");
            }
            _ => panic!("expected ToolUse variant"),
        }
    }

    #[test]
    fn test_tool_result_serialization() {
        let block = AnthropicContentBlock::ToolResult {
            tool_use_id: "tool_1".to_string(),
            content: "{\"success\":true}".to_string(),
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "tool_result");
        assert_eq!(json["tool_use_id"], "tool_1");
    }

    #[test]
    fn test_response_deserialization() {
        let json = r#"{
            "id": "msg_456",
            "content": [
                {"type": "text", "text": "Let me check."},
                {"type": "tool_use", "id": "t1", "name": "search_posts", "input": {"query": "x"}}
            ],
            "model": "claude-sonnet-4-20250514",
            "stop_reason": "tool_use"
        }"#;
        let resp: AnthropicResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.id, "msg_456");
        assert_eq!(resp.model, "claude-sonnet-4-20250514");
        assert_eq!(resp.content.len(), 2);
        assert_eq!(resp.stop_reason.as_deref(), Some("tool_use"));
    }

    #[test]
    fn test_error_envelope_deserialization() {
        let json = r#"{"type": "error", "error": {"type": "overloaded_error", "message": "Server busy"}}"#;
        let envelope: AnthropicErrorEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.error.error_type, "overloaded_error");
        assert_eq!(envelope.error.message, "Server busy");
    }
}
