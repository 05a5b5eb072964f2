//! Configuration management for the signal relay.
//!
//! This module handles loading and validation of relay configuration from
//! TOML files, and applying command-line overrides on top.

use crate::cli::CliArgs;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use signal_network::NetworkSettings;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Default tick interval for serde deserialization
fn default_tick_interval() -> u64 {
    50 // 20 ticks per second
}

fn default_persist_network() -> bool {
    true
}

fn default_data_file() -> PathBuf {
    PathBuf::from("network.json")
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Application configuration loaded from TOML file.
///
/// Every section may be omitted, in which case its defaults apply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Sensor network tuning
    #[serde(default)]
    pub network: NetworkSettings,
    /// Tick driver and world settings
    #[serde(default)]
    pub relay: RelaySettings,
    /// Node persistence settings
    #[serde(default)]
    pub storage: StorageSettings,
    /// Logging configuration settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Tick driver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelaySettings {
    /// Milliseconds between world ticks
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// Worlds whose regions may be activated. Empty accepts every world.
    #[serde(default)]
    pub worlds: Vec<String>,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
            worlds: Vec::new(),
        }
    }
}

impl RelaySettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Node persistence settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Load the network at startup and save it at shutdown
    #[serde(default = "default_persist_network")]
    pub persist_network: bool,
    /// JSON file holding the saved sensors
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            persist_network: default_persist_network(),
            data_file: default_data_file(),
        }
    }
}

/// Logging system configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Whether to output logs in JSON format
    #[serde(default)]
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, writes the default configuration to `path`
    /// and returns it.
    pub async fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let config: AppConfig = toml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Applies command-line overrides.
    pub fn apply_cli(&mut self, args: &CliArgs) {
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }
        if args.json_logs {
            self.logging.json_format = true;
        }
        if let Some(data_file) = &args.data_file {
            self.storage.data_file = data_file.clone();
        }
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the configuration is valid, or an error string describing the issue.
    pub fn validate(&self) -> Result<(), String> {
        self.network.validate().map_err(|e| e.to_string())?;

        if self.relay.tick_interval_ms == 0 {
            return Err("Tick interval must be at least 1 ms".to_string());
        }
        if self.relay.worlds.iter().any(|world| world.trim().is_empty()) {
            return Err("World names cannot be empty".to_string());
        }

        if self.storage.persist_network && self.storage.data_file.as_os_str().is_empty() {
            return Err("Data file cannot be empty when persistence is enabled".to_string());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }
}
