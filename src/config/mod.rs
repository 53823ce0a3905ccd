//! Host configuration for the chat node.
//!
//! This TOML file describes the *host* environment: where persisted state
//! lives, which console endpoints exist, how often the cooperative loop
//! ticks, and how logging behaves. It is distinct from [`crate::prefs`]:
//! NodePrefs are operator-mutable at the prompt and rewritten by commands,
//! while this file is edited by hand and read once at startup.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub node: NodeConfig,
    #[serde(default)]
    pub console: ConsoleConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Directory holding the identity, prefs, and contacts files.
    pub data_dir: String,
    /// Broadcast a self-advert shortly after boot.
    #[serde(default = "default_advert_on_start")]
    pub advert_on_start: bool,
    /// Delay before the boot advert, in milliseconds.
    #[serde(default = "default_advert_delay_ms")]
    pub advert_delay_ms: u64,
}

fn default_advert_on_start() -> bool {
    true
}

fn default_advert_delay_ms() -> u64 {
    1200
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// Auxiliary console endpoints (device nodes or FIFOs), in priority
    /// order after the primary console. Disabled until enabled with the
    /// `serial enable` command.
    #[serde(default)]
    pub aux_ports: Vec<String>,
    /// Cooperative loop tick interval, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    20
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            aux_ports: Vec::new(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            node: NodeConfig {
                data_dir: "./data".to_string(),
                advert_on_start: true,
                advert_delay_ms: default_advert_delay_ms(),
            },
            console: ConsoleConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("meshchat.log".to_string()),
            },
        }
    }
}
