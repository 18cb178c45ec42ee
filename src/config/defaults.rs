use super::*;

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "fs".to_string(),
            root: "./data".to_string(),
        }
    }
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            full_range: 246.0,
            initial_battery_capacity_kwh: 0.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            console_level: None,
            file_level: None,
            file: "/tmp/chargelog/chargelog.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl WebConfig {
    /// Defaults for the charging-log API
    pub fn web_default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8501,
        }
    }

    /// Defaults for the CSV export service
    pub fn export_default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 10000,
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self::web_default()
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            currency_symbol: "£".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            vehicle: VehicleConfig::default(),
            logging: LoggingConfig::default(),
            web: WebConfig::web_default(),
            export: WebConfig::export_default(),
            pricing: PricingConfig::default(),
            timezone: "Europe/London".to_string(),
        }
    }
}
