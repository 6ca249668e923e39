//! Configuration types for Corvid.
//!
//! `BotConfig` represents the top-level `config.toml` in the data dir. All
//! fields have sensible defaults so a missing or partial file still yields a
//! runnable configuration. Secrets (platform token, completion-service API
//! key) are NOT part of this file -- they come from the environment and are
//! handled in `corvid-infra`.

use serde::{Deserialize, Serialize};

/// Top-level configuration for the Corvid bot.
///
/// Loaded from `~/.corvid/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub rate: RateConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub persona: PersonaConfig,
}

/// Where the platform lives and who the bot is on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// REST API base, e.g. "https://social.example.com/api".
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Streaming endpoint, e.g. "wss://social.example.com/streaming".
    #[serde(default = "default_stream_url")]
    pub stream_url: String,
    /// The bot's own handle, used to strip mention markup (without '@').
    #[serde(default = "default_bot_handle")]
    pub bot_handle: String,
}

fn default_api_base() -> String {
    "https://social.example.com/api".to_string()
}

fn default_stream_url() -> String {
    "wss://social.example.com/streaming".to_string()
}

fn default_bot_handle() -> String {
    "corvid".to_string()
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            stream_url: default_stream_url(),
            bot_handle: default_bot_handle(),
        }
    }
}

/// Completion-service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base")]
    pub api_base: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Per-call timeout for completions, seconds.
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    /// Per-call timeout for a single tool execution, seconds.
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_llm_base() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_llm_timeout_secs() -> u64 {
    60
}

fn default_tool_timeout_secs() -> u64 {
    30
}

fn default_temperature() -> f64 {
    0.8
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: default_llm_base(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout_secs(),
            tool_timeout_secs: default_tool_timeout_secs(),
            temperature: default_temperature(),
        }
    }
}

/// Fixed-window message rate limiting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateConfig {
    /// Messages allowed per window for non-exempt users.
    #[serde(default = "default_rate_cap")]
    pub max_messages: u32,
    /// Window length, seconds.
    #[serde(default = "default_rate_window_secs")]
    pub window_secs: u64,
    /// User ids that bypass the rate check entirely.
    #[serde(default)]
    pub exempt_user_ids: Vec<String>,
}

fn default_rate_cap() -> u32 {
    15
}

fn default_rate_window_secs() -> u64 {
    3600
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            max_messages: default_rate_cap(),
            window_secs: default_rate_window_secs(),
            exempt_user_ids: Vec::new(),
        }
    }
}

/// Processed-event retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Days a processed-event record is remembered.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// How often the sweep runs, seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_retention_days() -> u32 {
    7
}

fn default_sweep_interval_secs() -> u64 {
    21_600
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

/// Memory engine bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Soft cap on memories per user before eviction kicks in.
    #[serde(default = "default_max_per_user")]
    pub max_per_user: usize,
    /// Memories at or above this importance survive eviction regardless of count.
    #[serde(default = "default_protected_importance")]
    pub protected_importance: u8,
    /// How many relevant memories go into the reply context.
    #[serde(default = "default_relevant_limit")]
    pub relevant_limit: usize,
    /// How often the eviction pass runs, seconds.
    #[serde(default = "default_evict_interval_secs")]
    pub evict_interval_secs: u64,
}

fn default_max_per_user() -> usize {
    200
}

fn default_protected_importance() -> u8 {
    7
}

fn default_relevant_limit() -> usize {
    5
}

fn default_evict_interval_secs() -> u64 {
    3600
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_per_user: default_max_per_user(),
            protected_importance: default_protected_importance(),
            relevant_limit: default_relevant_limit(),
            evict_interval_secs: default_evict_interval_secs(),
        }
    }
}

/// Event-connection reconnect policy and channel subscriptions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Delay between reconnect attempts, seconds.
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
    /// Attempts before the connection gives up terminally.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// Keepalive ping interval, seconds.
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    /// Logical channels to subscribe to on connect.
    #[serde(default = "default_channels")]
    pub channels: Vec<String>,
}

fn default_reconnect_delay_secs() -> u64 {
    10
}

fn default_max_reconnect_attempts() -> u32 {
    12
}

fn default_ping_interval_secs() -> u64 {
    30
}

fn default_channels() -> Vec<String> {
    vec![
        "home_timeline".to_string(),
        "global_timeline".to_string(),
        "notifications".to_string(),
        "mentions".to_string(),
        "messaging".to_string(),
    ]
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_secs: default_reconnect_delay_secs(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            ping_interval_secs: default_ping_interval_secs(),
            channels: default_channels(),
        }
    }
}

/// The bot's voice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    /// System prompt prefix for every completion.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Optional seed message inserted once before a user's first message.
    #[serde(default)]
    pub seed_message: Option<String>,
}

fn default_system_prompt() -> String {
    "You are Corvid, a friendly and concise social bot. Keep replies short \
     and conversational. Use the provided tools only when the user's request \
     genuinely needs them."
        .to_string()
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            seed_message: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bot_config_default_values() {
        let config = BotConfig::default();
        assert_eq!(config.rate.max_messages, 15);
        assert_eq!(config.rate.window_secs, 3600);
        assert_eq!(config.dedup.retention_days, 7);
        assert_eq!(config.memory.max_per_user, 200);
        assert_eq!(config.memory.protected_importance, 7);
        assert_eq!(config.connection.channels.len(), 5);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let toml_str = r#"
[rate]
max_messages = 5

[persona]
system_prompt = "You are a terse crow."
"#;
        let config: BotConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.rate.max_messages, 5);
        // Unspecified fields fall back to defaults
        assert_eq!(config.rate.window_secs, 3600);
        assert_eq!(config.memory.relevant_limit, 5);
        assert_eq!(config.persona.system_prompt, "You are a terse crow.");
        assert!(config.persona.seed_message.is_none());
    }

    #[test]
    fn test_empty_toml_is_full_default() {
        let config: BotConfig = toml::from_str("").unwrap();
        assert_eq!(config.llm.max_tokens, 1024);
        assert_eq!(config.connection.max_reconnect_attempts, 12);
    }
}
