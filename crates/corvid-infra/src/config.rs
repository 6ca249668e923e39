//! Configuration and secret loading for Corvid.
//!
//! Reads `config.toml` from the data directory (`~/.corvid/` in production)
//! and deserializes it into [`BotConfig`]. Falls back to sensible defaults
//! when the file is missing or malformed. Secrets never live in the config
//! file: the platform token and completion-service API key come from
//! environment variables and are wrapped in [`SecretString`].

use std::path::{Path, PathBuf};

use secrecy::SecretString;

use corvid_types::config::BotConfig;

/// Environment variable holding the platform API token.
pub const PLATFORM_TOKEN_VAR: &str = "CORVID_PLATFORM_TOKEN";

/// Environment variable holding the completion-service API key.
pub const LLM_API_KEY_VAR: &str = "CORVID_LLM_API_KEY";

/// Secrets required at startup.
pub struct Secrets {
    pub platform_token: SecretString,
    pub llm_api_key: SecretString,
}

/// Resolve the data directory: `CORVID_DATA_DIR`, else `~/.corvid`.
pub fn data_dir() -> PathBuf {
    match std::env::var("CORVID_DATA_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".corvid")
        }
    }
}

/// Load bot configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`BotConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the
///   default.
/// - If the file exists and parses successfully, returns the parsed config.
pub async fn load_config(data_dir: &Path) -> BotConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return BotConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return BotConfig::default();
        }
    };

    match toml::from_str::<BotConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            BotConfig::default()
        }
    }
}

/// Load required secrets from the environment.
///
/// # Errors
///
/// Returns an error naming the missing variable; the values themselves are
/// never included in errors or logs.
pub fn load_secrets() -> anyhow::Result<Secrets> {
    let platform_token = std::env::var(PLATFORM_TOKEN_VAR)
        .map_err(|_| anyhow::anyhow!("missing environment variable {PLATFORM_TOKEN_VAR}"))?;
    let llm_api_key = std::env::var(LLM_API_KEY_VAR)
        .map_err(|_| anyhow::anyhow!("missing environment variable {LLM_API_KEY_VAR}"))?;

    Ok(Secrets {
        platform_token: SecretString::from(platform_token),
        llm_api_key: SecretString::from(llm_api_key),
    })
}
