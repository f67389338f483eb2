//! Layered configuration for the gateway.
//!
//! Options come from three layers, later layers overriding earlier ones:
//! well-known config files, an optional explicitly passed config file, and
//! command-line flags. The merged result is immutable for one epoch; a reload
//! rebuilds it from scratch, never patches it in place.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Conventional MQTT port, used for direct host connects when no port is
/// configured and the service-record attempt has failed.
pub const MQTT_DEFAULT_PORT: u16 = 1883;

/// Fully merged options for one epoch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct GatewayConfig {
    /// Path of the serial metering device.
    pub device: String,
    /// Root topic for everything this device publishes and subscribes.
    #[serde(default = "default_device_topic")]
    pub device_topic: String,
    /// Per-sensor topic template; may reference `{{sensorId}}` and
    /// `{{sensorName}}`, and may itself render to another template.
    #[serde(default = "default_sensor_topic")]
    pub sensor_topic: String,
    /// Broker host name.
    #[serde(default = "default_host")]
    pub host: String,
    /// Broker port. When absent the connection starts in service-record mode.
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// MQTT keep-alive interval in seconds.
    #[serde(default = "default_keep_alive")]
    pub keep_alive: u64,
    /// Serial line rate.
    #[serde(default = "default_baud")]
    pub baud: u32,
}

fn default_device_topic() -> String {
    "/home/meterDigitizer".to_string()
}

fn default_sensor_topic() -> String {
    "{{sensorId}}".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_keep_alive() -> u64 {
    60
}

fn default_baud() -> u32 {
    9600
}

/// Command-line overrides applied on top of all config files.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub device: Option<String>,
    pub device_topic: Option<String>,
    pub sensor_topic: Option<String>,
    /// Extra config file path. Unlike the well-known paths, this one must be
    /// readable.
    pub config: Option<PathBuf>,
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Can't open config file \"{path}\": {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: Parse error: {source}")]
    TomlParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("No device specified")]
    NoDevice,
    #[error("No device topic specified")]
    NoDeviceTopic,
    #[error("No sensor topic specified")]
    NoSensorTopic,
}

/// One config file's worth of options; every field optional so files can be
/// partial and later layers can fill the gaps.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct FileConfig {
    device: Option<String>,
    device_topic: Option<String>,
    sensor_topic: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    keep_alive: Option<u64>,
    baud: Option<u32>,
}

impl FileConfig {
    fn merge(&mut self, other: FileConfig) {
        macro_rules! take {
            ($field:ident) => {
                if other.$field.is_some() {
                    self.$field = other.$field;
                }
            };
        }
        take!(device);
        take!(device_topic);
        take!(sensor_topic);
        take!(host);
        take!(port);
        take!(username);
        take!(password);
        take!(keep_alive);
        take!(baud);
    }
}

/// Well-known config file locations, least specific first.
fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/meter2mqtt.toml")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("meter2mqtt.toml"));
    }
    paths
}

fn read_config_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
        path: path.display().to_string(),
        source,
    })
}

impl GatewayConfig {
    /// Load and merge all configuration layers for one epoch.
    pub fn load(overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        Self::load_with_paths(overrides, &default_config_paths())
    }

    /// Same as [`load`](Self::load) but with the well-known paths injected,
    /// so tests can point it at a temp directory.
    pub fn load_with_paths(
        overrides: &ConfigOverrides,
        well_known: &[PathBuf],
    ) -> Result<Self, ConfigError> {
        let mut merged = FileConfig::default();

        // A missing well-known file is normal; a malformed one is not.
        for path in well_known {
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading config file");
                merged.merge(read_config_file(path)?);
            }
        }

        // An explicitly passed file must exist and parse.
        if let Some(path) = &overrides.config {
            tracing::debug!(path = %path.display(), "loading config file");
            merged.merge(read_config_file(path)?);
        }

        if let Some(device) = &overrides.device {
            merged.device = Some(device.clone());
        }
        if let Some(topic) = &overrides.device_topic {
            merged.device_topic = Some(topic.clone());
        }
        if let Some(topic) = &overrides.sensor_topic {
            merged.sensor_topic = Some(topic.clone());
        }

        merged.finalize()
    }
}

impl FileConfig {
    fn finalize(self) -> Result<GatewayConfig, ConfigError> {
        let config = GatewayConfig {
            device: self.device.unwrap_or_default(),
            device_topic: self.device_topic.unwrap_or_else(default_device_topic),
            sensor_topic: self.sensor_topic.unwrap_or_else(default_sensor_topic),
            host: self.host.unwrap_or_else(default_host),
            port: self.port,
            username: self.username,
            password: self.password,
            keep_alive: self.keep_alive.unwrap_or_else(default_keep_alive),
            baud: self.baud.unwrap_or_else(default_baud),
        };

        if config.device.is_empty() {
            return Err(ConfigError::NoDevice);
        }
        if config.device_topic.is_empty() {
            return Err(ConfigError::NoDeviceTopic);
        }
        if config.sensor_topic.is_empty() {
            return Err(ConfigError::NoSensorTopic);
        }
        Ok(config)
    }
}
