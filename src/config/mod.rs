//! Configuration management for the quote watcher.
//!
//! Loads settings from environment variables and config files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Remote quote API settings
    #[serde(default)]
    pub quote_api: QuoteApiConfig,
    /// Refresh and sweep scheduling
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Strategy persistence settings
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteApiConfig {
    /// Quote endpoint URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Number of backend API positions the remote service demultiplexes over.
    /// Also caps the number of requests in flight.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Maximum symbols per outbound request
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Attributes requested for each symbol, comma-joined on the wire
    #[serde(default = "default_attributes")]
    pub attributes: Vec<String>,
    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Seconds between refreshes of the active page
    #[serde(default = "default_page_reload")]
    pub page_reload_secs: u64,
    /// Seconds between strategy evaluation sweeps
    #[serde(default = "default_sweep_interval")]
    pub sweep_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database holding per-symbol strategy settings
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// JSON watchlist describing pages and their ticker symbols
    #[serde(default = "default_watchlist_path")]
    pub watchlist_path: String,
}

// Default value functions
fn default_endpoint() -> String {
    "http://localhost:8080/quote".to_string()
}

fn default_pool_size() -> usize {
    10
}

fn default_chunk_size() -> usize {
    3
}

fn default_attributes() -> Vec<String> {
    ["price", "change", "high", "low", "changepct"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_request_timeout() -> u64 {
    180 // remote attribute engine can take minutes to settle
}

fn default_page_reload() -> u64 {
    5
}

fn default_sweep_interval() -> u64 {
    5
}

fn default_db_path() -> String {
    "data/notify_settings.db".to_string()
}

fn default_watchlist_path() -> String {
    "stocks.json".to_string()
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::default().separator("__").prefix("QW"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.quote_api.pool_size >= 1, "pool_size must be >= 1");

        anyhow::ensure!(self.quote_api.chunk_size >= 1, "chunk_size must be >= 1");

        anyhow::ensure!(
            !self.quote_api.attributes.is_empty(),
            "attributes must not be empty"
        );

        anyhow::ensure!(
            self.quote_api.request_timeout_secs >= 1,
            "request_timeout_secs must be >= 1"
        );

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            quote_api: QuoteApiConfig::default(),
            schedule: ScheduleConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Default for QuoteApiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            pool_size: default_pool_size(),
            chunk_size: default_chunk_size(),
            attributes: default_attributes(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            page_reload_secs: default_page_reload(),
            sweep_secs: default_sweep_interval(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            watchlist_path: default_watchlist_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let mut config = Config::default();
        config.quote_api.chunk_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_attributes_rejected() {
        let mut config = Config::default();
        config.quote_api.attributes.clear();
        assert!(config.validate().is_err());
    }
}
