//! AnthropicCompletionClient -- concrete [`CompletionClient`] implementation
//! for the Anthropic Messages API.
//!
//! Sends non-streaming requests to `/v1/messages` with proper
//! authentication headers, converts the generic completion shapes to and
//! from the wire types, and maps tool_use content blocks into generic
//! `ToolCall`s.
//!
//! The API key is wrapped in [`secrecy::SecretString`] and is never logged
//! or included in `Debug` output.
//!
//! [`CompletionClient`]: corvid_core::llm::CompletionClient

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use corvid_core::llm::CompletionClient;
use corvid_types::llm::{
    ChatMessage, ChatRole, CompletionRequest, CompletionResponse, LlmError, ToolCall,
};

use super::types::{
    AnthropicContentBlock, AnthropicErrorEnvelope, AnthropicMessage, AnthropicRequest,
    AnthropicResponse, AnthropicTool,
};

/// Anthropic Messages API completion client.
pub struct AnthropicCompletionClient {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl AnthropicCompletionClient {
    /// The Anthropic API version header value.
    const API_VERSION: &'static str = "2023-06-01";

    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `api_key` - API key wrapped in SecretString
    /// * `base_url` - API base, e.g. "https://api.anthropic.com"
    /// * `model` - Model identifier
    pub fn new(api_key: SecretString, base_url: String, model: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("failed to create reqwest client");

        Self {
            client,
            api_key,
            base_url,
            model,
        }
    }

    /// The configured model.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Convert a generic [`CompletionRequest`] into an [`AnthropicRequest`].
    fn to_wire_request(&self, request: &CompletionRequest) -> AnthropicRequest {
        AnthropicRequest {
            model: self.model.clone(),
            max_tokens: request.max_tokens,
            messages: to_wire_messages(&request.messages),
            system: request.system.clone(),
            temperature: request.temperature,
            tools: request
                .tools
                .iter()
                .map(|spec| AnthropicTool {
                    name: spec.name.clone(),
                    description: spec.description.clone(),
                    input_schema: spec.parameters.clone(),
                })
                .collect(),
        }
    }
}

/// Convert role-tagged generic messages into Anthropic wire messages.
///
/// - System messages are dropped (the system prompt travels in the request's
///   `system` field).
/// - Assistant tool-call messages become `tool_use` blocks.
/// - Consecutive tool-result messages merge into one `user` message carrying
///   `tool_result` blocks, as the Messages API requires.
fn to_wire_messages(messages: &[ChatMessage]) -> Vec<AnthropicMessage> {
    let mut wire: Vec<AnthropicMessage> = Vec::with_capacity(messages.len());

    for message in messages {
        match message.role {
            ChatRole::System => continue,
            ChatRole::User => wire.push(AnthropicMessage {
                role: "user".to_string(),
                content: vec![AnthropicContentBlock::Text {
                    text: message.content.clone(),
                }],
            }),
            ChatRole::Assistant => {
                let mut content = Vec::new();
                if !message.content.is_empty() {
                    content.push(AnthropicContentBlock::Text {
                        text: message.content.clone(),
                    });
                }
                for call in &message.tool_calls {
                    content.push(AnthropicContentBlock::ToolUse {
                        id: call.call_id.clone(),
                        name: call.tool_name.clone(),
                        input: serde_json::from_str(&call.arguments)
                            .unwrap_or(serde_json::Value::Null),
                    });
                }
                if content.is_empty() {
                    // The API rejects empty assistant messages.
                    content.push(AnthropicContentBlock::Text {
                        text: String::new(),
                    });
                }
                wire.push(AnthropicMessage {
                    role: "assistant".to_string(),
                    content,
                });
            }
            ChatRole::Tool => {
                let block = AnthropicContentBlock::ToolResult {
                    tool_use_id: message.tool_call_id.clone().unwrap_or_default(),
                    content: message.content.clone(),
                };
                match wire.last_mut() {
                    Some(last)
                        if last.role == "user"
                            && matches!(
                                last.content.first(),
                                Some(AnthropicContentBlock::ToolResult { .. })
                            ) =>
                    {
                        last.content.push(block);
                    }
                    _ => wire.push(AnthropicMessage {
                        role: "user".to_string(),
                        content: vec![block],
                    }),
                }
            }
        }
    }

    wire
}

/// Extract generic content and tool calls from a wire response.
fn from_wire_response(response: AnthropicResponse) -> CompletionResponse {
    let mut text_parts = Vec::new();
    let mut tool_calls = Vec::new();

    for block in response.content {
        match block {
            AnthropicContentBlock::Text { text } => text_parts.push(text),
            AnthropicContentBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                call_id: id,
                tool_name: name,
                arguments: input.to_string(),
            }),
            AnthropicContentBlock::ToolResult { .. } => {}
        }
    }

    CompletionResponse {
        content: text_parts.join(""),
        tool_calls,
    }
}

// AnthropicCompletionClient intentionally does NOT derive Debug to prevent
// accidental exposure of internal state.

#[async_trait]
impl CompletionClient for AnthropicCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = self.to_wire_request(request);
        let url = self.url("/v1/messages");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", Self::API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Provider {
                        message: format!("HTTP request failed: {e}"),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            // Error bodies carry a typed envelope; fall back to the raw text.
            let detail = serde_json::from_str::<AnthropicErrorEnvelope>(&error_body)
                .map(|envelope| {
                    format!("{}: {}", envelope.error.error_type, envelope.error.message)
                })
                .unwrap_or(error_body);
            return Err(match status.as_u16() {
                401 => LlmError::AuthenticationFailed,
                429 => LlmError::RateLimited {
                    retry_after_ms: None,
                },
                400 => LlmError::InvalidRequest(detail),
                _ => LlmError::Provider {
                    message: format!("HTTP {status}: {detail}"),
                },
            });
        }

        let wire: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Deserialization(format!("failed to parse response: {e}")))?;

        Ok(from_wire_response(wire))
    }
}
