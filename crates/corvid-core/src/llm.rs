//! The completion-service client seam.
//!
//! Object-safe so the orchestrator can hold an `Arc<dyn CompletionClient>`;
//! the HTTP implementation lives in `corvid-infra`.

use async_trait::async_trait;

use corvid_types::llm::{CompletionRequest, CompletionResponse, LlmError};

/// A text-completion service that may request tool invocations.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// One completion round trip. The response carries final text and/or an
    /// ordered list of requested tool calls.
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError>;
}
