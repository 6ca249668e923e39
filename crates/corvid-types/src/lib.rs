//! Shared domain types for Corvid.
//!
//! This crate contains the core domain types used across the Corvid bot:
//! inbound events, conversation messages, memories, LLM request/response
//! shapes, platform DTOs, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod event;
pub mod llm;
pub mod memory;
pub mod message;
pub mod platform;
