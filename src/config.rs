// src/config.rs
//! Configuration management backed by a JSON file

use crate::{
    error::{BridgeError, Result},
    gps::SatLayout,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where published fixes go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// One JSON object per line on stdout
    #[default]
    Json,
    /// Full screen status view
    Terminal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub serial_port: String,
    pub serial_baudrate: u32,
    pub read_timeout_ms: u64,
    pub publish_rate_hz: f64,
    pub output: OutputKind,
    pub navsat: bool,
    pub sat_layout: SatLayout,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            serial_port: "/dev/gps".to_string(),
            serial_baudrate: 115200,
            read_timeout_ms: 250,
            publish_rate_hz: 10.0,
            output: OutputKind::Json,
            navsat: false,
            sat_layout: SatLayout::Legacy,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from the default location, falling back to defaults
    /// when no file exists
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;
        self.save_to(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(config_path)
            .map_err(|e| BridgeError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| BridgeError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| BridgeError::Config(format!("Failed to create config directory: {}", e)))?;
        }

        let contents = serde_json::to_string_pretty(self)?;

        std::fs::write(config_path, contents)
            .map_err(|e| BridgeError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Get config file path
    fn get_config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .map_err(|_| BridgeError::Config("HOME environment variable not set".to_string()))?;

        Ok(PathBuf::from(home).join(".config").join("dg14-bridge").join("config.json"))
    }

    /// Reject settings the bridge cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.serial_baudrate == 0 {
            return Err(BridgeError::Config("Baud rate must be non-zero".to_string()));
        }
        if !(self.publish_rate_hz.is_finite() && self.publish_rate_hz > 0.0) {
            return Err(BridgeError::Config(format!(
                "Publish rate must be positive, got {}",
                self.publish_rate_hz
            )));
        }
        Ok(())
    }

    /// Update serial port settings
    pub fn update_serial(&mut self, port: String, baudrate: u32) {
        self.serial_port = port;
        self.serial_baudrate = baudrate;
    }

    pub fn publish_period(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.publish_rate_hz)
    }

    pub fn read_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.read_timeout_ms)
    }
}
