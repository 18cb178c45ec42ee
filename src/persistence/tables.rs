//! Typed rows of the CSV tables
//!
//! Column names are the headers users see when they open the files, so they
//! are kept verbatim through serde renames. A table always carries its header
//! row, even with no data rows.

use super::BlobStore;
use crate::error::{ChargeLogError, Result};
use crate::pricing::TariffWindow;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A row type stored as one CSV document
pub trait Table: Serialize + DeserializeOwned {
    /// Blob store key
    const KEY: &'static str;

    /// Header row, in field order
    const COLUMNS: &'static [&'static str];
}

/// Where a session took place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum Location {
    Home,
    Public,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::Home => f.write_str("Home"),
            Location::Public => f.write_str("Public"),
        }
    }
}

/// One finished session in `charging_log.csv`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ChargingLogRecord {
    #[serde(rename = "Timestamp Start", with = "timestamp")]
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub timestamp_start: NaiveDateTime,

    #[serde(rename = "Timestamp End", with = "timestamp")]
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub timestamp_end: NaiveDateTime,

    #[serde(rename = "Duration Hours")]
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub duration_hours: Decimal,

    #[serde(rename = "Location")]
    pub location: Location,

    #[serde(rename = "Company", default)]
    pub company: String,

    #[serde(rename = "Battery Start %")]
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub battery_start_percent: Decimal,

    #[serde(rename = "Battery End %")]
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub battery_end_percent: Decimal,

    /// Missing in logs written before range readings were recorded
    #[serde(rename = "Range Start", default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub range_start: Option<Decimal>,

    #[serde(rename = "Range End", default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub range_end: Option<Decimal>,

    #[serde(rename = "kWh")]
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub kwh: Decimal,

    #[serde(rename = "Price per kWh")]
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub price_per_kwh: Decimal,

    #[serde(rename = "Total Cost")]
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub total_cost: Decimal,
}

impl Table for ChargingLogRecord {
    const KEY: &'static str = "charging_log.csv";
    const COLUMNS: &'static [&'static str] = &[
        "Timestamp Start",
        "Timestamp End",
        "Duration Hours",
        "Location",
        "Company",
        "Battery Start %",
        "Battery End %",
        "Range Start",
        "Range End",
        "kWh",
        "Price per kWh",
        "Total Cost",
    ];
}

/// The single row of `house_prices.csv`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeTariffRow {
    #[serde(rename = "Start Time", default)]
    pub start_time: String,

    #[serde(rename = "End Time", default)]
    pub end_time: String,

    #[serde(rename = "Price A")]
    pub price_a: Decimal,

    #[serde(rename = "Price B")]
    pub price_b: Decimal,

    #[serde(rename = "Additional Price")]
    pub additional_price: Decimal,
}

impl Table for HomeTariffRow {
    const KEY: &'static str = "house_prices.csv";
    const COLUMNS: &'static [&'static str] =
        &["Start Time", "End Time", "Price A", "Price B", "Additional Price"];
}

impl HomeTariffRow {
    pub fn tariff(&self) -> Result<TariffWindow> {
        TariffWindow::from_fields(
            &self.start_time,
            &self.end_time,
            self.price_a,
            self.price_b,
            self.additional_price,
        )
    }
}

impl From<&TariffWindow> for HomeTariffRow {
    fn from(t: &TariffWindow) -> Self {
        Self {
            start_time: t.peak_start.format(TIME_FORMAT).to_string(),
            end_time: t.peak_end.format(TIME_FORMAT).to_string(),
            price_a: t.price_peak,
            price_b: t.price_off_peak,
            additional_price: t.surcharge,
        }
    }
}

/// One company's tariff in `public_prices.csv`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicTariffRow {
    #[serde(rename = "Company")]
    pub company: String,

    #[serde(rename = "Start Time", default)]
    pub start_time: String,

    #[serde(rename = "End Time", default)]
    pub end_time: String,

    #[serde(rename = "Price A")]
    pub price_a: Decimal,

    #[serde(rename = "Price B")]
    pub price_b: Decimal,

    #[serde(rename = "Additional Price")]
    pub additional_price: Decimal,
}

impl Table for PublicTariffRow {
    const KEY: &'static str = "public_prices.csv";
    const COLUMNS: &'static [&'static str] = &[
        "Company",
        "Start Time",
        "End Time",
        "Price A",
        "Price B",
        "Additional Price",
    ];
}

impl PublicTariffRow {
    pub fn new(company: &str, t: &TariffWindow) -> Self {
        let home = HomeTariffRow::from(t);
        Self {
            company: company.to_string(),
            start_time: home.start_time,
            end_time: home.end_time,
            price_a: home.price_a,
            price_b: home.price_b,
            additional_price: home.additional_price,
        }
    }

    pub fn tariff(&self) -> Result<TariffWindow> {
        TariffWindow::from_fields(
            &self.start_time,
            &self.end_time,
            self.price_a,
            self.price_b,
            self.additional_price,
        )
    }
}

/// Vehicle parameters in `config.csv`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleRow {
    #[serde(rename = "BatteryCapacity_kWh")]
    pub battery_capacity_kwh: Decimal,
}

impl Table for VehicleRow {
    const KEY: &'static str = "config.csv";
    const COLUMNS: &'static [&'static str] = &["BatteryCapacity_kWh"];
}

/// The session in progress, at most one row in `open_session.csv`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct OpenSessionRow {
    #[serde(rename = "Timestamp Start", with = "timestamp")]
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub timestamp_start: NaiveDateTime,

    #[serde(rename = "Location")]
    pub location: Location,

    #[serde(rename = "Company", default)]
    pub company: String,

    #[serde(rename = "Battery Start %", default)]
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub battery_start_percent: Decimal,

    #[serde(rename = "Range Start", default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub range_start: Option<Decimal>,
}

impl Table for OpenSessionRow {
    const KEY: &'static str = "open_session.csv";
    const COLUMNS: &'static [&'static str] = &[
        "Timestamp Start",
        "Location",
        "Company",
        "Battery Start %",
        "Range Start",
    ];
}

const TIME_FORMAT: &str = "%H:%M:%S";

/// Read all rows of a table; a missing or empty blob reads as no rows
pub async fn read_table<T: Table>(store: &dyn BlobStore) -> Result<Vec<T>> {
    let Some(bytes) = store.get(T::KEY).await? else {
        return Ok(Vec::new());
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(bytes.as_slice());
    reader
        .deserialize()
        .enumerate()
        .map(|(i, row)| {
            row.map_err(|e| {
                ChargeLogError::Serialization {
                    message: format!("{} row {}: {}", T::KEY, i + 1, e),
                }
            })
        })
        .collect()
}

/// Replace a table with the given rows
pub async fn write_table<T: Table>(store: &dyn BlobStore, rows: &[T]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(T::COLUMNS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| ChargeLogError::io(format!("failed to flush {}: {}", T::KEY, e)))?;
    store.put(T::KEY, bytes).await
}

/// Read a table, writing an empty one with just its header if it is absent
pub async fn load_or_create<T: Table>(store: &dyn BlobStore) -> Result<Vec<T>> {
    let rows = read_table::<T>(store).await?;
    if rows.is_empty() && !store.exists(T::KEY).await? {
        write_table::<T>(store, &[]).await?;
    }
    Ok(rows)
}

/// Log timestamps: written without fractions, read in the common variants
pub mod timestamp {
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    const READ_FORMATS: [&str; 3] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];

    pub fn parse(raw: &str) -> Option<NaiveDateTime> {
        let raw = raw.trim();
        READ_FORMATS
            .iter()
            .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
            // A column whose times are all midnight is sometimes written date-only
            .or_else(|| {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .ok()
                    .map(|d| d.and_time(NaiveTime::MIN))
            })
    }

    pub fn serialize<S: Serializer>(dt: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&dt.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("not a timestamp: {raw}")))
    }
}
