//! # Chargelog - personal EV charging log
//!
//! Records charging sessions and prices them under time-of-day tariffs.
//! Sessions, tariffs and vehicle parameters are kept as CSV tables in a
//! blob store, edited through a JSON HTTP API, and the log can be
//! downloaded from a separate export service.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `logging`: Structured logging and tracing
//! - `pricing`: Tariff windows, weighted price, energy estimate and cost
//! - `persistence`: Blob stores and the typed CSV tables
//! - `session`: Start/finish flow, history and price administration
//! - `web`: HTTP API with OpenAPI docs
//! - `export`: CSV download service

pub mod config;
pub mod error;
pub mod export;
pub mod logging;
pub mod persistence;
pub mod pricing;
pub mod session;
pub mod web;

#[cfg(test)]
mod web_tests;

// Re-export commonly used types
pub use config::Config;
pub use error::{ChargeLogError, Result};
pub use pricing::{ChargingInterval, PricingResult, TariffWindow, weighted_price};
pub use session::ChargeLog;
