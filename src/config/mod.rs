//! # Configuration Management Module
//!
//! Realm configuration loaded from a TOML file at startup.
//!
//! ## Configuration Structure
//!
//! - [`LoggingConfig`] - Log level, log file and security audit file
//! - [`StorageConfig`] - Where the trade store lives
//! - [`TradeConfig`] - Trade rules (distance, gold cap, faction policy, idle timeout)
//! - [`SchedulerConfig`] - Simulation tick rate and optional deterministic seed
//!
//! ## Usage
//!
//! ```rust,no_run
//! use realmkeep::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Config::create_default("config.toml").await?;
//!     let config = Config::load("config.toml").await?;
//!     println!("Trade distance: {}", config.trade.trade_distance);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [logging]
//! level = "info"
//! file = "realmkeep.log"
//! security_file = "realmkeep-security.log"
//!
//! [storage]
//! data_dir = "./data"
//!
//! [trade]
//! max_money = 2147483646
//! trade_distance = 11.11
//! allow_cross_faction = false
//! trade_level_requirement = 0
//! idle_timeout_secs = 0
//!
//! [scheduler]
//! tick_ms = 100
//! ```
//!
//! Every section is optional; missing sections and keys take their defaults.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub trade: TradeConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    #[serde(default)]
    pub security_file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: Some("realmkeep.log".to_string()),
            security_file: Some("realmkeep-security.log".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
        }
    }
}

impl StorageConfig {
    /// Location of the sled trade store.
    pub fn trade_db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("trades.sled")
    }
}

/// Trade rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeConfig {
    /// Gold cap, both for a single offer and for a player's holdings.
    #[serde(default = "default_max_money")]
    pub max_money: u64,
    /// Maximum distance between participants, checked on initiate and accept.
    #[serde(default = "default_trade_distance")]
    pub trade_distance: f32,
    #[serde(default)]
    pub allow_cross_faction: bool,
    /// Minimum level required to start a trade.
    #[serde(default)]
    pub trade_level_requirement: u8,
    /// Close trades idle for longer than this. `0` disables the timeout.
    #[serde(default)]
    pub idle_timeout_secs: u64,
}

fn default_max_money() -> u64 {
    2_147_483_646
}

fn default_trade_distance() -> f32 {
    11.11
}

impl Default for TradeConfig {
    fn default() -> Self {
        Self {
            max_money: default_max_money(),
            trade_distance: default_trade_distance(),
            allow_cross_faction: false,
            trade_level_requirement: 0,
            idle_timeout_secs: 0,
        }
    }
}

impl TradeConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Simulated frame length.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Fixed RNG seed for reproducible simulations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rng_seed: Option<u64>,
}

fn default_tick_ms() -> u64 {
    100
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            rng_seed: None,
        }
    }
}

impl SchedulerConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config.validate()?;
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

    pub fn validate(&self) -> Result<()> {
        if !(self.trade.trade_distance.is_finite() && self.trade.trade_distance > 0.0) {
            return Err(anyhow!(
                "trade.trade_distance must be a positive number, got {}",
                self.trade.trade_distance
            ));
        }
        if self.trade.max_money > i64::MAX as u64 {
            return Err(anyhow!("trade.max_money is too large"));
        }
        Ok(())
    }
}
