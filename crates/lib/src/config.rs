//! Configuration types, loading and persistence.
//!
//! Config is loaded from a JSON file (e.g. `~/.pushlite/config.json`) and environment.
//! The API token is generated on first start and written back to the same file.

use anyhow::{Context, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Push API listener settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Destinations every push is delivered to, as `<channel>:<conversation>` (e.g. "telegram:123456").
    #[serde(default, alias = "notification_umo_list")]
    pub notification_umo_list: Vec<String>,

    /// Channel settings (e.g. Telegram).
    #[serde(default)]
    pub channels: ChannelsConfig,
}

/// Push API bind, port, and token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    /// Shared secret callers must present. Generated on first start when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Bind address (default "0.0.0.0").
    #[serde(default = "default_api_host")]
    pub host: String,

    /// Port (default 9966).
    #[serde(default = "default_api_port")]
    pub port: u16,
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    9966
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            token: None,
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

impl ApiConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host.trim(), self.port)
    }
}

/// Per-channel config (e.g. Telegram bot token).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelsConfig {
    #[serde(default)]
    pub telegram: TelegramChannelConfig,
}

/// Telegram channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramChannelConfig {
    /// Bot token from BotFather. Overridden by TELEGRAM_BOT_TOKEN env when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Resolve the API token: env PUSHLITE_API_TOKEN overrides config.
pub fn resolve_api_token(config: &Config) -> Option<String> {
    non_empty_env("PUSHLITE_API_TOKEN").or_else(|| non_empty(config.api.token.as_ref()))
}

/// Resolve the Telegram bot token: env TELEGRAM_BOT_TOKEN overrides config.
pub fn resolve_telegram_token(config: &Config) -> Option<String> {
    non_empty_env("TELEGRAM_BOT_TOKEN")
        .or_else(|| non_empty(config.channels.telegram.bot_token.as_ref()))
}

/// Configured destinations with blanks removed, order preserved.
pub fn resolve_destinations(config: &Config) -> Vec<String> {
    config
        .notification_umo_list
        .iter()
        .map(|d| d.trim())
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .collect()
}

/// URL-safe random token: 32 random bytes, base64url without padding.
pub fn generate_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    getrandom::getrandom(&mut bytes).map_err(|e| anyhow::anyhow!("getrandom: {}", e))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Make sure `config.api.token` is set. When it is missing (and no env override applies),
/// generate one and persist the config to `path`. Returns true when a token was generated.
pub fn ensure_api_token(config: &mut Config, path: &Path) -> Result<bool> {
    if resolve_api_token(config).is_some() {
        return Ok(false);
    }
    config.api.token = Some(generate_token()?);
    save_config(config, path)?;
    log::info!("generated api token and saved it to {}", path.display());
    Ok(true)
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("PUSHLITE_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".pushlite").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path, or the default path (or PUSHLITE_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used (so it can be saved back).
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

/// Write config as pretty JSON. Creates parent dirs if needed.
pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {}", parent.display()))?;
    }
    let s = serde_json::to_string_pretty(config).context("serializing config")?;
    std::fs::write(path, s).with_context(|| format!("writing config to {}", path.display()))?;
    Ok(())
}
