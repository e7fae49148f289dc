// src/config.rs
//! Configuration management with platform-specific storage

use crate::{
    error::{Result, TrackerError},
    track::Thresholds,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

const APP_DIR: &str = "exercise-tracker";
const STORE_FILE: &str = "exerciseRecords.json";

/// Radius within which a preset-route checkpoint counts as passed
pub const DEFAULT_CHECKPOINT_RADIUS_M: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub source_type: String, // "serial", "gpsd", "replay", "windows"
    pub serial_port: Option<String>,
    pub serial_baudrate: Option<u32>,
    pub gpsd_host: Option<String>,
    pub gpsd_port: Option<u16>,
    pub windows_accuracy: Option<u32>,
    pub windows_interval: Option<u64>,
    pub replay_path: Option<PathBuf>,
    pub replay_speed: Option<f64>,
    pub thresholds: Thresholds,
    pub store_path: Option<PathBuf>,
    pub checkpoint_radius_m: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::platform_default()
    }
}

impl TrackerConfig {
    /// Get platform-specific default configuration
    pub fn platform_default() -> Self {
        let source_type = if cfg!(windows) { "windows" } else { "gpsd" };

        Self {
            source_type: source_type.to_string(),
            serial_port: None,
            serial_baudrate: Some(9600),
            gpsd_host: Some("localhost".to_string()),
            gpsd_port: Some(2947),
            windows_accuracy: Some(10),
            windows_interval: Some(1),
            replay_path: None,
            replay_speed: Some(1.0),
            thresholds: Thresholds::default(),
            store_path: None,
            checkpoint_radius_m: DEFAULT_CHECKPOINT_RADIUS_M,
        }
    }

    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load from a specific file; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("no config at {}, using defaults", path.display());
            return Ok(Self::platform_default());
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| TrackerError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| TrackerError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                TrackerError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| TrackerError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, contents)
            .map_err(|e| TrackerError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// `<config dir>/exercise-tracker/config.json`
    pub fn config_path() -> Result<PathBuf> {
        let base = dirs::config_dir()
            .ok_or_else(|| TrackerError::Config("could not determine config directory".to_string()))?;
        Ok(base.join(APP_DIR).join("config.json"))
    }

    /// Configured store file, or `<data dir>/exercise-tracker/exerciseRecords.json`
    pub fn resolved_store_path(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.store_path {
            return Ok(path.clone());
        }
        let base = dirs::data_dir()
            .ok_or_else(|| TrackerError::Config("could not determine data directory".to_string()))?;
        Ok(base.join(APP_DIR).join(STORE_FILE))
    }

    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate().map_err(TrackerError::Config)?;
        if !self.checkpoint_radius_m.is_finite() || self.checkpoint_radius_m <= 0.0 {
            return Err(TrackerError::Config(
                "checkpoint_radius_m must be a positive number".to_string(),
            ));
        }
        if let Some(speed) = self.replay_speed {
            if !speed.is_finite() || speed < 0.0 {
                return Err(TrackerError::Config("replay_speed must be >= 0".to_string()));
            }
        }
        Ok(())
    }

    /// Update configuration with new source settings
    pub fn update_source(&mut self, source_type: &str) {
        self.source_type = source_type.to_string();
    }

    /// Update serial port settings
    pub fn update_serial(&mut self, port: String, baudrate: u32) {
        self.source_type = "serial".to_string();
        self.serial_port = Some(port);
        self.serial_baudrate = Some(baudrate);
    }

    /// Update gpsd settings
    pub fn update_gpsd(&mut self, host: String, port: u16) {
        self.source_type = "gpsd".to_string();
        self.gpsd_host = Some(host);
        self.gpsd_port = Some(port);
    }

    /// Update Windows location settings
    pub fn update_windows(&mut self, accuracy: u32, interval: u64) {
        self.source_type = "windows".to_string();
        self.windows_accuracy = Some(accuracy);
        self.windows_interval = Some(interval);
    }

    pub fn update_replay(&mut self, path: PathBuf, speed: f64) {
        self.source_type = "replay".to_string();
        self.replay_path = Some(path);
        self.replay_speed = Some(speed);
    }

    /// Replace the filter limits, rejecting inconsistent values
    pub fn update_thresholds(&mut self, thresholds: Thresholds) -> Result<()> {
        thresholds.validate().map_err(TrackerError::Config)?;
        self.thresholds = thresholds;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TrackerConfig::default();

        #[cfg(windows)]
        assert_eq!(config.source_type, "windows");

        #[cfg(not(windows))]
        assert_eq!(config.source_type, "gpsd");

        assert_eq!(config.thresholds, Thresholds::default());
        assert_eq!(config.checkpoint_radius_m, 10.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_update_source() {
        let mut config = TrackerConfig::default();
        config.update_source("serial");
        assert_eq!(config.source_type, "serial");
    }

    #[test]
    fn test_update_serial() {
        let mut config = TrackerConfig::default();
        config.update_serial("/dev/ttyUSB0".to_string(), 115200);
        assert_eq!(config.source_type, "serial");
        assert_eq!(config.serial_port, Some("/dev/ttyUSB0".to_string()));
        assert_eq!(config.serial_baudrate, Some(115200));
    }

    #[test]
    fn test_update_thresholds_rejects_inverted() {
        let mut config = TrackerConfig::default();
        let bad = Thresholds {
            min_displacement_m: 2.0,
            min_speed_mps: 10.0,
            max_speed_mps: 5.0,
        };
        assert!(config.update_thresholds(bad).is_err());
        assert_eq!(config.thresholds, Thresholds::default());

        let good = Thresholds {
            min_displacement_m: 2.0,
            min_speed_mps: 0.3,
            max_speed_mps: 8.3,
        };
        config.update_thresholds(good).unwrap();
        assert_eq!(config.thresholds.min_displacement_m, 2.0);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = TrackerConfig::default();
        config.update_replay(PathBuf::from("walk.jsonl"), 0.0);
        config.store_path = Some(dir.path().join("records.json"));
        config.save_to(&path).unwrap();

        let loaded = TrackerConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.resolved_store_path().unwrap(), dir.path().join("records.json"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"source_type":"serial","serial_port":"COM3"}"#).unwrap();

        let loaded = TrackerConfig::load_from(&path).unwrap();
        assert_eq!(loaded.serial_port.as_deref(), Some("COM3"));
        assert_eq!(loaded.thresholds, Thresholds::default());
        assert_eq!(loaded.gpsd_port, Some(2947));
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = TrackerConfig::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded, TrackerConfig::platform_default());
    }
}
