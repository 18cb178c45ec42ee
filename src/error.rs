//! Error types and handling for Chargelog
//!
//! This module defines the error types used throughout the application,
//! providing consistent error handling and reporting.

use thiserror::Error;

/// Result type alias for Chargelog operations
pub type Result<T> = std::result::Result<T, ChargeLogError>;

/// Main error type for Chargelog
#[derive(Debug, Error)]
pub enum ChargeLogError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Blob store errors (missing bucket, rejected key, backend failure)
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Tariff record is malformed or out of range
    #[error("Invalid tariff: {field} - {message}")]
    InvalidTariff { field: String, message: String },

    /// Charging interval has a non-positive duration
    #[error("Invalid interval: {message}")]
    InvalidInterval { message: String },

    /// Price per kWh derived from a total over zero energy
    #[error("Zero energy: {message}")]
    ZeroEnergy { message: String },

    /// No tariff configured for the session's location or company
    #[error("Tariff not found: {message}")]
    TariffNotFound { message: String },

    /// A charging session is already open
    #[error("Session already open since {since}")]
    SessionAlreadyOpen { since: String },

    /// Finishing requires an open session
    #[error("No open charging session")]
    NoOpenSession,
}

impl ChargeLogError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        ChargeLogError::Config {
            message: message.into(),
        }
    }

    /// Create a new storage error
    pub fn storage<S: Into<String>>(message: S) -> Self {
        ChargeLogError::Storage {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<F: Into<String>, S: Into<String>>(field: F, message: S) -> Self {
        ChargeLogError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new invalid tariff error
    pub fn invalid_tariff<F: Into<String>, S: Into<String>>(field: F, message: S) -> Self {
        ChargeLogError::InvalidTariff {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new invalid interval error
    pub fn invalid_interval<S: Into<String>>(message: S) -> Self {
        ChargeLogError::InvalidInterval {
            message: message.into(),
        }
    }

    /// Create a new zero energy error
    pub fn zero_energy<S: Into<String>>(message: S) -> Self {
        ChargeLogError::ZeroEnergy {
            message: message.into(),
        }
    }

    /// Create a new tariff-not-found error
    pub fn tariff_not_found<S: Into<String>>(message: S) -> Self {
        ChargeLogError::TariffNotFound {
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        ChargeLogError::Io {
            message: message.into(),
        }
    }

    /// Whether the caller can fix this by correcting its input
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ChargeLogError::Validation { .. }
                | ChargeLogError::InvalidTariff { .. }
                | ChargeLogError::InvalidInterval { .. }
                | ChargeLogError::ZeroEnergy { .. }
        )
    }
}

impl From<std::io::Error> for ChargeLogError {
    fn from(err: std::io::Error) -> Self {
        ChargeLogError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for ChargeLogError {
    fn from(err: serde_yaml::Error) -> Self {
        ChargeLogError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<csv::Error> for ChargeLogError {
    fn from(err: csv::Error) -> Self {
        ChargeLogError::Serialization {
            message: err.to_string(),
        }
    }
}
