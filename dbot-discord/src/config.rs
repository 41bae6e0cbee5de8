//! Minimal transport config: token, optional REST API base and log file path.
//! Loaded from env: DISCORD_TOKEN (or BOT_TOKEN), DISCORD_API_URL, LOG_FILE.

use anyhow::Result;
use std::env;

/// Default Discord REST endpoint.
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Minimal Discord config (connectivity and logging only).
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub bot_token: String,
    pub api_base: Option<String>,
    pub log_file: Option<String>,
}

impl DiscordConfig {
    /// Loads from env: DISCORD_TOKEN (falls back to BOT_TOKEN) required; DISCORD_API_URL and LOG_FILE optional.
    pub fn from_env() -> Result<Self> {
        let bot_token = env::var("DISCORD_TOKEN")
            .or_else(|_| env::var("BOT_TOKEN"))
            .map_err(|_| anyhow::anyhow!("DISCORD_TOKEN not set"))?;
        if bot_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN is empty");
        }
        let api_base = env::var("DISCORD_API_URL").ok();
        let log_file = env::var("LOG_FILE").ok();
        Ok(Self {
            bot_token,
            api_base,
            log_file,
        })
    }

    /// Builds config with the given token; other fields None.
    pub fn with_token(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_base: None,
            log_file: None,
        }
    }

    /// REST base URL without trailing slash.
    pub fn api_base(&self) -> &str {
        self.api_base
            .as_deref()
            .map(|base| base.trim_end_matches('/'))
            .unwrap_or(DEFAULT_API_BASE)
    }
}
