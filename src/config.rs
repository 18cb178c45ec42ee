//! Configuration management for Chargelog
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files with support for environment variable overrides.

use crate::error::{ChargeLogError, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod defaults;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Blob store holding the CSV tables
    pub storage: StorageConfig,

    /// Vehicle constants used by the energy estimate
    pub vehicle: VehicleConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Web API binding configuration
    pub web: WebConfig,

    /// Export service binding configuration
    pub export: WebConfig,

    /// Display settings for prices
    pub pricing: PricingConfig,

    /// Timezone used when a session starts or ends "now"
    pub timezone: String,
}

/// Blob store backend selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend name: `fs` or `memory`
    pub backend: String,

    /// Root directory for the `fs` backend
    pub root: String,
}

/// Vehicle constants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    /// Estimated range at 100% charge, in the same unit as the range readings
    pub full_range: f64,

    /// Battery capacity written to `config.csv` when that table does not exist yet
    pub initial_battery_capacity_kwh: f64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Optional console-specific level
    pub console_level: Option<String>,

    /// Optional file-specific level
    pub file_level: Option<String>,

    /// Path to log file (its directory receives the rolling files)
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Bind address
    pub host: String,

    /// TCP port
    pub port: u16,
}

/// Price display configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Currency symbol shown next to costs
    pub currency_symbol: String,
}

/// Which listener a `PORT` override applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Web,
    Export,
}

const KNOWN_BACKENDS: [&str; 2] = ["fs", "memory"];

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from `CHARGELOG_CONFIG` or the default locations
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var("CHARGELOG_CONFIG") {
            return Self::from_file(PathBuf::from(path));
        }

        let default_paths = [
            "chargelog_config.yaml",
            "/data/chargelog_config.yaml",
            "/etc/chargelog/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        // Fall back to default configuration
        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self, service: Service) -> Result<()> {
        self.apply_overrides_from(service, |key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_overrides_from<F>(&mut self, service: Service, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup("CHARGELOG_DATA_DIR") {
            self.storage.root = root;
        }
        if let Some(backend) = lookup("CHARGELOG_STORAGE") {
            self.storage.backend = backend;
        }
        if let Some(tz) = lookup("TZ_NAME") {
            self.timezone = tz;
        }
        if let Some(port) = lookup("PORT") {
            let port: u16 = port
                .trim()
                .parse()
                .map_err(|_| ChargeLogError::validation("PORT", format!("not a port: {port}")))?;
            match service {
                Service::Web => self.web.port = port,
                Service::Export => self.export.port = port,
            }
        }
        Ok(())
    }

    /// Parsed timezone
    pub fn tz(&self) -> Result<Tz> {
        self.timezone.parse::<Tz>().map_err(|_| {
            ChargeLogError::validation("timezone", format!("unknown timezone {}", self.timezone))
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !KNOWN_BACKENDS.contains(&self.storage.backend.as_str()) {
            return Err(ChargeLogError::validation(
                "storage.backend",
                format!("must be one of {}", KNOWN_BACKENDS.join(", ")),
            ));
        }

        if self.storage.backend == "fs" && self.storage.root.trim().is_empty() {
            return Err(ChargeLogError::validation(
                "storage.root",
                "Root directory cannot be empty",
            ));
        }

        if !(self.vehicle.full_range.is_finite() && self.vehicle.full_range > 0.0) {
            return Err(ChargeLogError::validation(
                "vehicle.full_range",
                "Must be positive",
            ));
        }

        if !(self.vehicle.initial_battery_capacity_kwh.is_finite()
            && self.vehicle.initial_battery_capacity_kwh >= 0.0)
        {
            return Err(ChargeLogError::validation(
                "vehicle.initial_battery_capacity_kwh",
                "Must not be negative",
            ));
        }

        if self.web.port == 0 {
            return Err(ChargeLogError::validation(
                "web.port",
                "Port must be greater than 0",
            ));
        }

        if self.export.port == 0 {
            return Err(ChargeLogError::validation(
                "export.port",
                "Port must be greater than 0",
            ));
        }

        crate::logging::parse_log_level(&self.logging.level)
            .map_err(|_| ChargeLogError::validation("logging.level", "Unknown log level"))?;

        self.tz()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.storage.backend, "fs");
        assert_eq!(config.web.port, 8501);
        assert_eq!(config.export.port, 10000);
        assert!((config.vehicle.full_range - 246.0).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.storage.backend = "s3".to_string();
        assert!(config.validate().is_err());

        config = Config::default();
        config.vehicle.full_range = 0.0;
        assert!(config.validate().is_err());

        config = Config::default();
        config.timezone = "Mars/Olympus".to_string();
        assert!(config.validate().is_err());

        config = Config::default();
        config.logging.level = "LOUD".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_port_override_targets_running_service() {
        let vars: HashMap<&str, &str> = [("PORT", "9000"), ("CHARGELOG_DATA_DIR", "/srv/ev")]
            .into_iter()
            .collect();
        let lookup = |k: &str| vars.get(k).map(|v| v.to_string());

        let mut web = Config::default();
        web.apply_overrides_from(Service::Web, lookup).unwrap();
        assert_eq!(web.web.port, 9000);
        assert_eq!(web.export.port, 10000);
        assert_eq!(web.storage.root, "/srv/ev");

        let mut export = Config::default();
        export.apply_overrides_from(Service::Export, lookup).unwrap();
        assert_eq!(export.export.port, 9000);
        assert_eq!(export.web.port, 8501);
    }

    #[test]
    fn test_bad_port_override_is_rejected() {
        let mut config = Config::default();
        let err = config
            .apply_overrides_from(Service::Web, |k| (k == "PORT").then(|| "http".to_string()))
            .unwrap_err();
        assert!(matches!(err, ChargeLogError::Validation { .. }));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: Config = serde_yaml::from_str("timezone: Europe/Lisbon\n").unwrap();
        assert_eq!(config.timezone, "Europe/Lisbon");
        assert_eq!(config.storage.root, "./data");
        assert!(config.validate().is_ok());
    }
}
