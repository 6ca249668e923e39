//! Completion-service client implementations.

pub mod anthropic;

pub use anthropic::AnthropicCompletionClient;
