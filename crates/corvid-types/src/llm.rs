//! Completion-service request/response types for Corvid.
//!
//! These types model the data shapes for the external text-completion
//! service: role-tagged messages, tool catalogs, tool invocation requests,
//! and error handling. They are provider-agnostic -- the HTTP wire types
//! live in `corvid-infra`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of a message in a completion conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatRole::System => write!(f, "system"),
            ChatRole::User => write!(f, "user"),
            ChatRole::Assistant => write!(f, "assistant"),
            ChatRole::Tool => write!(f, "tool"),
        }
    }
}

impl FromStr for ChatRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(ChatRole::System),
            "user" => Ok(ChatRole::User),
            "assistant" => Ok(ChatRole::Assistant),
            "tool" => Ok(ChatRole::Tool),
            other => Err(format!("invalid chat role: '{other}'")),
        }
    }
}

/// A single role-tagged message sent to the completion service.
///
/// Assistant messages that requested tools carry the calls in `tool_calls`;
/// tool-result messages carry the originating `tool_call_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    /// A plain user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// A plain assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// An assistant message that requested tool invocations.
    pub fn assistant_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            tool_calls,
            tool_call_id: None,
        }
    }

    /// A tool-result message answering a specific call.
    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }
}

/// A tool invocation requested by the completion service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call identifier, echoed back with the result.
    pub call_id: String,
    pub tool_name: String,
    /// Raw JSON arguments as sent by the service.
    pub arguments: String,
}

/// A tool advertised to the completion service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema object describing the parameters (types + required).
    pub parameters: serde_json::Value,
}

/// Request to the completion service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Tool catalog; empty means "no tools offered".
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSpec>,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

/// Response from the completion service.
///
/// `tool_calls` is ordered; when non-empty the orchestrator executes each
/// call and feeds the results back for one final completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

impl CompletionResponse {
    /// Whether the service requested any tool invocations.
    pub fn wants_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Errors from completion-service operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("provider error: {message}")]
    Provider { message: String },

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("request timed out")]
    Timeout,

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_role_roundtrip() {
        for role in [
            ChatRole::System,
            ChatRole::User,
            ChatRole::Assistant,
            ChatRole::Tool,
        ] {
            let s = role.to_string();
            let parsed: ChatRole = s.parse().unwrap();
            assert_eq!(role, parsed);
        }
    }

    #[test]
    fn test_chat_message_constructors() {
        let msg = ChatMessage::user("hi");
        assert_eq!(msg.role, ChatRole::User);
        assert!(msg.tool_calls.is_empty());

        let result = ChatMessage::tool_result("call_1", "{\"ok\":true}");
        assert_eq!(result.role, ChatRole::Tool);
        assert_eq!(result.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn test_chat_message_skips_empty_tool_fields() {
        let json = serde_json::to_value(ChatMessage::user("hi")).unwrap();
        assert!(json.get("tool_calls").is_none());
        assert!(json.get("tool_call_id").is_none());
    }

    #[test]
    fn test_completion_response_wants_tools() {
        let mut resp = CompletionResponse {
            content: "done".to_string(),
            tool_calls: Vec::new(),
        };
        assert!(!resp.wants_tools());

        resp.tool_calls.push(ToolCall {
            call_id: "c1".to_string(),
            tool_name: "follow_user".to_string(),
            arguments: "{}".to_string(),
        });
        assert!(resp.wants_tools());
    }

    #[test]
    fn test_completion_response_default_tool_calls() {
        let resp: CompletionResponse = serde_json::from_str(r#"{"content":"hi"}"#).unwrap();
        assert!(resp.tool_calls.is_empty());
    }

    #[test]
    fn test_llm_error_display() {
        let err = LlmError::RateLimited {
            retry_after_ms: Some(1500),
        };
        assert!(err.to_string().contains("1500"));
    }
}
