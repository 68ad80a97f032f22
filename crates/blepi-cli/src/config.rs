//! blepi CLI configuration management
//!
//! Configuration is layered with figment, lowest priority first:
//! - built-in defaults
//! - a TOML file (`--config`, else `blepi.toml` in the working directory)
//! - environment variables prefixed `BLEPI_` (`BLEPI_BEACON__MAJOR` for nested keys)
//! - command-line flags
//!
//! Durations are written in milliseconds in files and the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use blepi_core::{BeaconConfig, PeripheralConfig};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cli::Cli;

/// File picked up when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "blepi.toml";

// ----------------------------------------------------------------------------
// Application Configuration
// ----------------------------------------------------------------------------

/// File and environment form of [`PeripheralConfig`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub max_connections: usize,
    /// Beacon phase length; 0 keeps advertising static
    pub beacon_duration_ms: u64,
    pub beacon_interval_ms: u64,
    pub device_name: String,
    pub advertising_channel_map: u8,
    /// Advertising interval bounds in 0.625 ms units
    pub advertising_interval_min: u16,
    pub advertising_interval_max: u16,
    pub hci_device_index: Option<u16>,
    pub require_le_support: bool,
    pub notify_join_timeout_ms: u64,
    pub beacon: BeaconConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from(&PeripheralConfig::default())
    }
}

impl From<&PeripheralConfig> for AppConfig {
    fn from(config: &PeripheralConfig) -> Self {
        let (min, max) = config.advertising_interval;
        Self {
            max_connections: config.max_connections,
            beacon_duration_ms: millis(config.beacon_duration),
            beacon_interval_ms: millis(config.beacon_interval),
            device_name: config.device_name.clone(),
            advertising_channel_map: config.advertising_channel_map,
            advertising_interval_min: min,
            advertising_interval_max: max,
            hci_device_index: config.hci_device_index,
            require_le_support: config.require_le_support,
            notify_join_timeout_ms: millis(config.notify_join_timeout),
            beacon: config.beacon.clone(),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ----------------------------------------------------------------------------
// Configuration Loading Logic
// ----------------------------------------------------------------------------

impl AppConfig {
    /// Load configuration with flags taking priority over env, file and defaults
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let figment = Self::figment(cli.config.as_deref())?;
        let mut config = Self::from_figment(Self::with_overrides(figment, cli))?;

        if let Some(dev) = cli.dev {
            config.hci_device_index = hci_device_index(dev)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Defaults, file and environment layers
    pub fn figment(config_path: Option<&Path>) -> Result<Figment, ConfigError> {
        let path = match config_path {
            Some(path) if !path.exists() => {
                return Err(ConfigError::FileSystem(format!(
                    "config file {} not found",
                    path.display()
                )));
            }
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };
        debug!("Reading configuration from {}", path.display());

        Ok(Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("BLEPI_").split("__")))
    }

    /// Apply command-line flags on top of `figment`
    pub fn with_overrides(mut figment: Figment, cli: &Cli) -> Figment {
        if let Some(max) = cli.max_connections {
            figment = figment.merge(("max_connections", max));
        }
        if let Some(duration) = cli.beacon_duration {
            figment = figment.merge(("beacon_duration_ms", millis(duration)));
        }
        if let Some(interval) = cli.beacon_interval {
            figment = figment.merge(("beacon_interval_ms", millis(interval)));
        }
        if let Some(name) = &cli.name {
            figment = figment.merge(("device_name", name.clone()));
        }
        if let Some(map) = cli.chmap {
            figment = figment.merge(("advertising_channel_map", map));
        }
        if let Some(check) = cli.chk {
            figment = figment.merge(("require_le_support", check));
        }
        figment
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        figment
            .extract()
            .map_err(|e| ConfigError::Loading(format!("Failed to load configuration: {}", e)))
    }

    pub fn peripheral_config(&self) -> PeripheralConfig {
        PeripheralConfig::new()
            .with_max_connections(self.max_connections)
            .with_beacon_duration(Duration::from_millis(self.beacon_duration_ms))
            .with_beacon_interval(Duration::from_millis(self.beacon_interval_ms))
            .with_device_name(self.device_name.clone())
            .with_advertising_channel_map(self.advertising_channel_map)
            .with_advertising_interval(self.advertising_interval_min, self.advertising_interval_max)
            .with_hci_device_index(self.hci_device_index)
            .with_require_le_support(self.require_le_support)
            .with_beacon(self.beacon.clone())
            .with_notify_join_timeout(Duration::from_millis(self.notify_join_timeout_ms))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.peripheral_config()
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))
    }

    /// Example configuration file content
    pub fn example_config() -> Result<String, ConfigError> {
        let example = Self {
            beacon_duration_ms: 2_000,
            hci_device_index: Some(0),
            ..Self::default()
        };
        toml::to_string_pretty(&example)
            .map_err(|e| ConfigError::Serialization(format!("Failed to serialize config: {}", e)))
    }
}

/// Map the `--dev` flag, where any negative value means "first available"
fn hci_device_index(dev: i32) -> Result<Option<u16>, ConfigError> {
    if dev < 0 {
        return Ok(None);
    }
    u16::try_from(dev)
        .map(Some)
        .map_err(|_| ConfigError::Validation(format!("HCI device ID {} out of range", dev)))
}

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {0}")]
    Loading(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("File system error: {0}")]
    FileSystem(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
