//! Anthropic Messages API implementation of [`CompletionClient`].
//!
//! [`CompletionClient`]: corvid_core::llm::CompletionClient

mod client;
mod types;

pub use client::AnthropicCompletionClient;
