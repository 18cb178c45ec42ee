//! Charging session management for Chargelog
//!
//! `ChargeLog` owns the blob store, the configuration and the cost of the
//! last home session. It drives the start/finish flow, keeps at most one
//! session open and edits the price and vehicle tables.

use crate::config::Config;
use crate::error::{ChargeLogError, Result};
use crate::logging::{LogContext, StructuredLogger, get_logger, get_logger_with_context};
use crate::persistence::tables::timestamp;
use crate::persistence::{
    BlobStore, ChargingLogRecord, HomeTariffRow, Location, OpenSessionRow, PublicTariffRow,
    VehicleRow, load_or_create, read_table, write_table,
};
use crate::pricing::{
    ChargingInterval, CostBreakdown, EnergyEstimate, EnergyInputs, PricingResult, TariffWindow,
    estimate_kwh, settle, suggested_kwh, weighted_price,
};
use chrono::{Days, NaiveDateTime, NaiveTime, SubsecRound, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Request to open a session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StartRequest {
    /// Start timestamp; "now" in the configured timezone when absent
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub start: Option<NaiveDateTime>,

    pub location: Location,

    /// Required for public sessions, ignored at home
    #[serde(default)]
    pub company: Option<String>,

    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub battery_start_percent: Decimal,

    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub range_start: Option<Decimal>,
}

/// Readings entered when a session ends
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(default)]
pub struct FinishRequest {
    /// Full end timestamp, takes precedence over `end_time`
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub end: Option<NaiveDateTime>,

    /// Wall-clock end time on the start date, or the next day when not after the start
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub end_time: Option<NaiveTime>,

    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub range_end: Option<Decimal>,

    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub battery_end_percent: Decimal,

    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub manual_kwh: Option<Decimal>,

    /// Amount actually paid; only honoured for public sessions
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub manual_total: Option<Decimal>,

    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub charge_speed_kw: Option<Decimal>,
}

/// Outcome of finishing (or previewing) a session
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SessionSummary {
    pub record: ChargingLogRecord,

    pub energy: EnergyEstimate,

    pub cost: CostBreakdown,

    /// kWh the finish form would pre-fill
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub suggested_kwh: Decimal,
}

/// A public company's tariff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CompanyTariff {
    pub company: String,

    pub tariff: TariffWindow,
}

/// Resolve a session's end timestamp.
///
/// A bare wall-clock time is placed on the start date, then moved to the next
/// day when it is not after the start (the session ran past midnight).
pub fn resolve_end(
    start: NaiveDateTime,
    end: Option<NaiveDateTime>,
    end_time: Option<NaiveTime>,
    now: NaiveDateTime,
) -> Result<NaiveDateTime> {
    if let Some(end) = end {
        return Ok(end);
    }
    let Some(time) = end_time else {
        return Ok(now);
    };

    let same_day = start.date().and_time(time);
    if same_day > start {
        return Ok(same_day);
    }
    same_day
        .checked_add_days(Days::new(1))
        .ok_or_else(|| ChargeLogError::invalid_interval("end time runs past the calendar"))
}

/// The charging log service
pub struct ChargeLog {
    store: Arc<dyn BlobStore>,
    config: Config,
    tz: Tz,
    last_home_cost: Option<Decimal>,
    logger: StructuredLogger,
}

impl ChargeLog {
    pub fn new(store: Arc<dyn BlobStore>, config: Config) -> Result<Self> {
        let tz = config.tz()?;
        Ok(Self {
            store,
            config,
            tz,
            last_home_cost: None,
            logger: get_logger("session"),
        })
    }

    /// Create the price and log tables if they do not exist yet
    pub async fn initialize(&self) -> Result<()> {
        let store = self.store.as_ref();
        load_or_create::<HomeTariffRow>(store).await?;
        load_or_create::<PublicTariffRow>(store).await?;
        load_or_create::<ChargingLogRecord>(store).await?;
        self.battery_capacity().await?;
        self.logger.info("Charging tables ready");
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Total of the last finished home session, cleared by a public one
    pub fn last_home_cost(&self) -> Option<Decimal> {
        self.last_home_cost
    }

    /// Current wall-clock time in the configured timezone, whole seconds
    pub fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.tz).naive_local().trunc_subsecs(0)
    }

    pub async fn open_session(&self) -> Result<Option<OpenSessionRow>> {
        let rows = read_table::<OpenSessionRow>(self.store.as_ref()).await?;
        Ok(rows.into_iter().next())
    }

    /// Open a new session; fails while another one is open
    pub async fn start_session(&self, req: StartRequest) -> Result<OpenSessionRow> {
        if let Some(open) = self.open_session().await? {
            return Err(ChargeLogError::SessionAlreadyOpen {
                since: open.timestamp_start.format(timestamp::FORMAT).to_string(),
            });
        }

        check_percent("battery_start_percent", req.battery_start_percent)?;
        if let Some(range) = req.range_start {
            check_non_negative("range_start", range)?;
        }

        let company = match req.location {
            Location::Home => String::new(),
            Location::Public => {
                let company = req.company.as_deref().map(str::trim).unwrap_or_default();
                if company.is_empty() {
                    return Err(ChargeLogError::validation(
                        "company",
                        "Please enter the company",
                    ));
                }
                company.to_string()
            }
        };

        let row = OpenSessionRow {
            timestamp_start: req.start.unwrap_or_else(|| self.now()),
            location: req.location,
            company,
            battery_start_percent: req.battery_start_percent,
            range_start: req.range_start,
        };
        write_table(self.store.as_ref(), std::slice::from_ref(&row)).await?;

        self.session_logger(&row).info(&format!(
            "Started charging session at {}",
            row.timestamp_start
        ));
        Ok(row)
    }

    /// Price the open session without writing anything
    pub async fn preview_finish(&self, req: &FinishRequest) -> Result<SessionSummary> {
        let open = self.open_session().await?.ok_or(ChargeLogError::NoOpenSession)?;
        self.summarize(&open, req).await
    }

    /// Close the open session and append it to the log
    pub async fn finish_session(&mut self, req: FinishRequest) -> Result<SessionSummary> {
        let open = self.open_session().await?.ok_or(ChargeLogError::NoOpenSession)?;
        let summary = self.summarize(&open, &req).await?;

        let store = self.store.as_ref();
        let mut log = read_table::<ChargingLogRecord>(store).await?;
        // A retry after a failed clear of the open session replaces its earlier row
        match log
            .iter_mut()
            .find(|r| r.timestamp_start == open.timestamp_start)
        {
            Some(existing) => *existing = summary.record.clone(),
            None => log.push(summary.record.clone()),
        }
        write_table(store, &log).await?;
        write_table::<OpenSessionRow>(store, &[]).await?;

        self.last_home_cost = match open.location {
            Location::Home => Some(summary.record.total_cost),
            Location::Public => None,
        };

        self.session_logger(&open).info(&format!(
            "Finished charging session: {} kWh at {} per kWh, total {}{}",
            summary.record.kwh,
            summary.record.price_per_kwh,
            self.config.pricing.currency_symbol,
            summary.record.total_cost
        ));
        Ok(summary)
    }

    async fn summarize(&self, open: &OpenSessionRow, req: &FinishRequest) -> Result<SessionSummary> {
        check_percent("battery_end_percent", req.battery_end_percent)?;
        if let Some(range) = req.range_end {
            check_non_negative("range_end", range)?;
        }

        let end = resolve_end(open.timestamp_start, req.end, req.end_time, self.now())?;
        let interval = ChargingInterval::new(open.timestamp_start, end)?;
        let tariff = self.find_tariff(open.location, &open.company).await?;
        let capacity = self.read_battery_capacity().await?;

        let energy = estimate_kwh(&EnergyInputs {
            manual_kwh: req.manual_kwh,
            range_start: open.range_start,
            range_end: req.range_end,
            full_range: self.full_range()?,
            battery_start_percent: open.battery_start_percent,
            battery_end_percent: req.battery_end_percent,
            battery_capacity_kwh: capacity,
        })?;
        if energy.kwh <= Decimal::ZERO {
            self.session_logger(open).warn(&format!(
                "Session delivered {} kWh by {:?} estimate",
                energy.kwh, energy.source
            ));
        }

        let manual_total = match open.location {
            Location::Public => req.manual_total,
            Location::Home => None,
        };
        let cost = settle(energy.kwh, &tariff, &interval, manual_total)?;
        let duration_hours = interval.duration_hours();

        let record = ChargingLogRecord {
            timestamp_start: open.timestamp_start,
            timestamp_end: end,
            duration_hours,
            location: open.location,
            company: open.company.clone(),
            battery_start_percent: open.battery_start_percent,
            battery_end_percent: req.battery_end_percent,
            range_start: open.range_start,
            range_end: req.range_end,
            kwh: cost.kwh,
            price_per_kwh: cost.price_per_kwh,
            total_cost: cost.total_cost,
        };

        Ok(SessionSummary {
            record,
            suggested_kwh: suggested_kwh(
                req.charge_speed_kw,
                duration_hours,
                open.battery_start_percent,
                req.battery_end_percent,
                capacity,
            )?,
            energy,
            cost,
        })
    }

    /// Tariff for a location: the home row, or the first row of the company
    pub async fn find_tariff(&self, location: Location, company: &str) -> Result<TariffWindow> {
        match location {
            Location::Home => self
                .home_tariff()
                .await?
                .ok_or_else(|| ChargeLogError::tariff_not_found("Please configure the home price first")),
            Location::Public => {
                let rows = read_table::<PublicTariffRow>(self.store.as_ref()).await?;
                rows.iter()
                    .find(|r| r.company == company)
                    .ok_or_else(|| {
                        ChargeLogError::tariff_not_found(format!("Company price not found: {}", company))
                    })?
                    .tariff()
            }
        }
    }

    /// Log rows, newest start first
    pub async fn history(&self) -> Result<Vec<ChargingLogRecord>> {
        let mut rows = read_table::<ChargingLogRecord>(self.store.as_ref()).await?;
        rows.sort_by(|a, b| b.timestamp_start.cmp(&a.timestamp_start));
        Ok(rows)
    }

    /// Overwrite the log with edited rows
    pub async fn replace_history(&self, rows: Vec<ChargingLogRecord>) -> Result<()> {
        write_table(self.store.as_ref(), &rows).await?;
        self.logger
            .info(&format!("History replaced with {} rows", rows.len()));
        Ok(())
    }

    pub async fn home_tariff(&self) -> Result<Option<TariffWindow>> {
        let rows = read_table::<HomeTariffRow>(self.store.as_ref()).await?;
        rows.first().map(HomeTariffRow::tariff).transpose()
    }

    /// Replace the home tariff (the table holds a single row)
    pub async fn set_home_tariff(&self, tariff: &TariffWindow) -> Result<()> {
        tariff.validate()?;
        write_table(self.store.as_ref(), &[HomeTariffRow::from(tariff)]).await?;
        self.logger.info("Home price saved");
        Ok(())
    }

    pub async fn public_tariffs(&self) -> Result<Vec<CompanyTariff>> {
        let rows = read_table::<PublicTariffRow>(self.store.as_ref()).await?;
        rows.iter()
            .map(|r| {
                Ok(CompanyTariff {
                    company: r.company.clone(),
                    tariff: r.tariff()?,
                })
            })
            .collect()
    }

    /// Add a company's tariff, replacing its existing row
    pub async fn upsert_public_tariff(&self, entry: &CompanyTariff) -> Result<()> {
        let company = entry.company.trim();
        if company.is_empty() {
            return Err(ChargeLogError::validation("company", "Please enter the company"));
        }
        entry.tariff.validate()?;

        let store = self.store.as_ref();
        let mut rows = read_table::<PublicTariffRow>(store).await?;
        let row = PublicTariffRow::new(company, &entry.tariff);
        match rows.iter_mut().find(|r| r.company == company) {
            Some(existing) => *existing = row,
            None => rows.push(row),
        }
        write_table(store, &rows).await?;

        get_logger_with_context(
            LogContext::new("session").with_field("company", company.to_string()),
        )
        .info("Public price saved");
        Ok(())
    }

    /// Battery capacity, creating `config.csv` from the configured default when absent
    pub async fn battery_capacity(&self) -> Result<Decimal> {
        let rows = load_or_create::<VehicleRow>(self.store.as_ref()).await?;
        if let Some(row) = rows.first() {
            return Ok(row.battery_capacity_kwh);
        }
        let initial = self.initial_capacity()?;
        write_table(
            self.store.as_ref(),
            &[VehicleRow {
                battery_capacity_kwh: initial,
            }],
        )
        .await?;
        Ok(initial)
    }

    pub async fn set_battery_capacity(&self, kwh: Decimal) -> Result<()> {
        check_non_negative("battery_capacity_kwh", kwh)?;
        write_table(
            self.store.as_ref(),
            &[VehicleRow {
                battery_capacity_kwh: kwh,
            }],
        )
        .await?;
        self.logger
            .info(&format!("Battery capacity set to {} kWh", kwh));
        Ok(())
    }

    /// Price an interval without a session
    pub fn quote(&self, tariff: &TariffWindow, interval: &ChargingInterval) -> Result<PricingResult> {
        let result = weighted_price(tariff, interval)?;
        self.logger.debug(&format!(
            "Quoted {} per kWh for {} to {}",
            result.price_per_kwh,
            interval.start(),
            interval.end()
        ));
        Ok(result)
    }

    async fn read_battery_capacity(&self) -> Result<Decimal> {
        let rows = read_table::<VehicleRow>(self.store.as_ref()).await?;
        match rows.first() {
            Some(row) => Ok(row.battery_capacity_kwh),
            None => self.initial_capacity(),
        }
    }

    fn initial_capacity(&self) -> Result<Decimal> {
        to_decimal(
            "vehicle.initial_battery_capacity_kwh",
            self.config.vehicle.initial_battery_capacity_kwh,
        )
    }

    fn full_range(&self) -> Result<Decimal> {
        to_decimal("vehicle.full_range", self.config.vehicle.full_range)
    }

    fn session_logger(&self, open: &OpenSessionRow) -> StructuredLogger {
        let mut ctx = LogContext::new("session").with_location(&open.location.to_string());
        if !open.company.is_empty() {
            ctx = ctx.with_field("company", open.company.clone());
        }
        get_logger_with_context(ctx)
    }
}

fn to_decimal(field: &str, value: f64) -> Result<Decimal> {
    Decimal::try_from(value)
        .map_err(|_| ChargeLogError::config(format!("{} is not a finite number", field)))
}

fn check_percent(field: &str, value: Decimal) -> Result<()> {
    if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
        return Err(ChargeLogError::validation(
            field,
            format!("must be between 0 and 100, got {}", value),
        ));
    }
    Ok(())
}

fn check_non_negative(field: &str, value: Decimal) -> Result<()> {
    if value < Decimal::ZERO {
        return Err(ChargeLogError::validation(
            field,
            format!("must not be negative, got {}", value),
        ));
    }
    Ok(())
}
