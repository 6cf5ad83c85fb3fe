//! TOML configuration.
//!
//! ```toml
//! [data]
//! path = "./data/data.json"
//!
//! [server]
//! bind = "127.0.0.1:5050"
//!
//! [grants]
//! max_amount = 200
//!
//! [chat]
//! base_url = "http://localhost:11434/v1"
//! model = "llama3.1"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use medsplit_core::chat::DEFAULT_KEEP_MESSAGES;
use medsplit_core::grants::DEFAULT_MAX_AMOUNT;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub data: DataConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub grants: GrantsConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5050".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct GrantsConfig {
    #[serde(default = "default_max_amount")]
    pub max_amount: f64,
}

impl Default for GrantsConfig {
    fn default() -> Self {
        Self {
            max_amount: DEFAULT_MAX_AMOUNT,
        }
    }
}

fn default_max_amount() -> f64 {
    DEFAULT_MAX_AMOUNT
}

/// OpenAI-compatible chat backend. Chat is disabled without `base_url`.
#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_chat_model")]
    pub model: String,
    /// Environment variable holding the bearer token, if the backend needs one.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_keep_messages")]
    pub keep_messages: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: default_chat_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            keep_messages: default_keep_messages(),
        }
    }
}

fn default_chat_model() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_api_key_env() -> String {
    "MEDSPLIT_CHAT_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    2
}
fn default_keep_messages() -> usize {
    DEFAULT_KEEP_MESSAGES
}

impl ChatConfig {
    pub fn is_enabled(&self) -> bool {
        self.base_url.is_some()
    }
}

impl Config {
    /// Defaults for commands that can run without a config file.
    pub fn minimal() -> Self {
        Self {
            data: DataConfig {
                path: PathBuf::from("./data/data.json"),
            },
            server: ServerConfig::default(),
            grants: GrantsConfig::default(),
            chat: ChatConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.data.path.as_os_str().is_empty() {
        anyhow::bail!("data.path must not be empty");
    }

    if !config.grants.max_amount.is_finite() || config.grants.max_amount < 1.0 {
        anyhow::bail!("grants.max_amount must be >= 1");
    }

    if let Some(url) = &config.chat.base_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            anyhow::bail!("chat.base_url must start with http:// or https://");
        }
    }
    if config.chat.timeout_secs == 0 {
        anyhow::bail!("chat.timeout_secs must be > 0");
    }
    if config.chat.keep_messages == 0 {
        anyhow::bail!("chat.keep_messages must be > 0");
    }

    Ok(())
}
