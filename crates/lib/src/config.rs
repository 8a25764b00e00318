//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.askbot/config.json`) and environment.
//! `API_URL`, `WEBHOOK_URL` and `PORT` override the file. Settings are resolved once at
//! startup and never change afterwards.

use crate::channels::TELEGRAM_API_BASE;
use crate::inference::DEFAULT_TIMEOUT;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_API_URL: &str = "API_URL";
pub const ENV_WEBHOOK_URL: &str = "WEBHOOK_URL";
pub const ENV_PORT: &str = "PORT";

/// Default logical name of the bot credential in the secret store.
pub const DEFAULT_TOKEN_SECRET: &str = "BOT_TOKEN";

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP listener settings (health and webhook).
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Downstream question-answering service.
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Telegram delivery settings.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Where secrets are looked up besides the environment.
    #[serde(default)]
    pub secrets: SecretsConfig,
}

/// Gateway bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for HTTP (default 8080). Overridden by PORT env.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0").
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

fn default_gateway_port() -> u16 {
    8080
}

fn default_gateway_bind() -> String {
    "0.0.0.0".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceConfig {
    /// Base URL of the inference service; `/answer` is appended. Overridden by API_URL env. Required.
    pub api_url: Option<String>,
    /// Timeout for one inference call in seconds (default 10).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Answers with a lower score are replaced by a "couldn't find the answer" reply. Unset = disabled.
    #[serde(default)]
    pub min_confidence: Option<f64>,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            timeout_secs: default_timeout_secs(),
            min_confidence: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramConfig {
    /// Public base URL; when set, webhook mode is used and Telegram POSTs to `{webhookUrl}/webhook`.
    /// If unset, long-poll getUpdates is used. Overridden by WEBHOOK_URL env.
    pub webhook_url: Option<String>,
    /// Optional secret for webhook verification (X-Telegram-Bot-Api-Secret-Token).
    pub webhook_secret: Option<String>,
    /// Bot API base (default https://api.telegram.org).
    pub api_base: Option<String>,
    /// Name of the bot token in the secret store (default BOT_TOKEN).
    pub token_secret: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretsConfig {
    /// Directory with one file per secret (e.g. a mounted secret volume). Checked before the environment.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("API_URL is not set (or inference.apiUrl in the config file)")]
    MissingApiUrl,
    #[error("invalid {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// How updates reach the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Pull updates with getUpdates.
    Polling,
    /// Telegram pushes to `{base_url}/webhook`.
    Webhook { base_url: String },
}

impl DeliveryMode {
    pub fn name(&self) -> &'static str {
        match self {
            DeliveryMode::Polling => "polling",
            DeliveryMode::Webhook { .. } => "webhook",
        }
    }
}

/// Validated, process-wide settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind: String,
    pub port: u16,
    pub api_url: String,
    pub timeout: Duration,
    pub min_confidence: Option<f64>,
    pub mode: DeliveryMode,
    pub webhook_secret: Option<String>,
    pub telegram_api_base: String,
    pub token_secret: String,
    pub secrets_dir: Option<PathBuf>,
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn env_non_empty(name: &str) -> Option<String> {
    non_empty(std::env::var(name).ok().as_deref())
}

impl Settings {
    /// Resolve settings from config plus the process environment.
    pub fn resolve(config: &Config) -> Result<Self, ConfigError> {
        Self::resolve_with(config, env_non_empty)
    }

    /// Resolve with an explicit environment lookup.
    pub fn resolve_with(
        config: &Config,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let api_url = env(ENV_API_URL)
            .or_else(|| non_empty(config.inference.api_url.as_deref()))
            .ok_or(ConfigError::MissingApiUrl)?;
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                name: ENV_API_URL,
                value: api_url,
            });
        }
        let port = match env(ENV_PORT) {
            Some(p) => p.parse::<u16>().map_err(|_| ConfigError::Invalid {
                name: ENV_PORT,
                value: p,
            })?,
            None => config.gateway.port,
        };
        if config.inference.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "inference.timeoutSecs",
                value: "0".to_string(),
            });
        }
        let webhook_url =
            env(ENV_WEBHOOK_URL).or_else(|| non_empty(config.telegram.webhook_url.as_deref()));
        let mode = match webhook_url {
            Some(url) => DeliveryMode::Webhook {
                base_url: url.trim_end_matches('/').to_string(),
            },
            None => DeliveryMode::Polling,
        };
        Ok(Self {
            bind: config.gateway.bind.trim().to_string(),
            port,
            api_url,
            timeout: Duration::from_secs(config.inference.timeout_secs),
            min_confidence: config.inference.min_confidence,
            mode,
            webhook_secret: non_empty(config.telegram.webhook_secret.as_deref()),
            telegram_api_base: non_empty(config.telegram.api_base.as_deref())
                .unwrap_or_else(|| TELEGRAM_API_BASE.to_string()),
            token_secret: non_empty(config.telegram.token_secret.as_deref())
                .unwrap_or_else(|| DEFAULT_TOKEN_SECRET.to_string()),
            secrets_dir: config.secrets.dir.clone(),
        })
    }

    /// Public URL Telegram should POST updates to, in webhook mode.
    pub fn webhook_endpoint(&self) -> Option<String> {
        match &self.mode {
            DeliveryMode::Webhook { base_url } => Some(format!("{}/webhook", base_url)),
            DeliveryMode::Polling => None,
        }
    }
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("ASKBOT_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".askbot").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from the given path, or the default path. Missing file => default config.
/// Returns the config and the path that was used.
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

/// Write a default config file if none exists. Returns true when a file was written.
pub fn init_config(path: &std::path::Path) -> Result<bool> {
    if path.exists() {
        log::debug!("config already exists at {}, skipping", path.display());
        return Ok(false);
    }
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating config directory {}", dir.display()))?;
    }
    let s =
        serde_json::to_string_pretty(&Config::default()).context("serializing default config")?;
    std::fs::write(path, s)
        .with_context(|| format!("writing default config to {}", path.display()))?;
    log::info!("created default config at {}", path.display());
    Ok(true)
}
