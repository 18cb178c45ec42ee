//! Time-of-day tariff pricing
//!
//! Computes the blended price per kWh for a charging interval under a daily
//! peak/off-peak schedule. The peak share of the interval is measured by
//! intersecting it with each day's peak window, so boundaries that fall
//! between whole minutes are weighted exactly.

use crate::error::{ChargeLogError, Result};
use chrono::{NaiveDateTime, NaiveTime, TimeDelta};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub mod cost;
pub mod energy;
pub mod tariff;

pub use cost::{CostBreakdown, PriceSource, settle};
pub use energy::{EnergyEstimate, EnergyInputs, EnergySource, estimate_kwh, suggested_kwh};
pub use tariff::TariffWindow;

/// Decimal places kept on a price per kWh
pub const PRICE_DP: u32 = 4;

/// Decimal places kept on money totals, kWh and hours
pub const AMOUNT_DP: u32 = 2;

/// A charging session's time span, `end > start`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawInterval")]
pub struct ChargingInterval {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

#[derive(Deserialize)]
struct RawInterval {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl TryFrom<RawInterval> for ChargingInterval {
    type Error = ChargeLogError;

    fn try_from(raw: RawInterval) -> Result<Self> {
        Self::new(raw.start, raw.end)
    }
}

impl ChargingInterval {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if end <= start {
            return Err(ChargeLogError::invalid_interval(format!(
                "end {} is not after start {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    /// Duration in hours, rounded to 2 places
    pub fn duration_hours(&self) -> Decimal {
        let seconds = Decimal::from(self.duration().num_seconds());
        (seconds / Decimal::from(3600)).round_dp(AMOUNT_DP)
    }
}

/// Blended price for one interval
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PricingResult {
    /// Surcharge-inclusive price per kWh, rounded to 4 places
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub price_per_kwh: Decimal,

    /// Seconds of the interval inside the peak window
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub peak_seconds: Decimal,

    /// Seconds of the interval outside the peak window
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub off_peak_seconds: Decimal,
}

/// Duration-weighted average of the peak and off-peak prices over the
/// interval, plus the surcharge once.
pub fn weighted_price(tariff: &TariffWindow, interval: &ChargingInterval) -> Result<PricingResult> {
    tariff.validate()?;

    let total = micros(interval.duration())?;
    let peak = micros(peak_overlap(tariff, interval))?;
    let off_peak = total - peak;

    let peak_cost = Decimal::from(peak)
        .checked_mul(tariff.price_peak)
        .ok_or_else(|| too_large("price_peak"))?;
    let off_peak_cost = Decimal::from(off_peak)
        .checked_mul(tariff.price_off_peak)
        .ok_or_else(|| too_large("price_off_peak"))?;
    let weighted = peak_cost
        .checked_add(off_peak_cost)
        .and_then(|sum| sum.checked_div(Decimal::from(total)))
        .ok_or_else(|| too_large("price_off_peak"))?;
    let price = weighted
        .checked_add(tariff.surcharge)
        .ok_or_else(|| too_large("surcharge"))?;

    Ok(PricingResult {
        price_per_kwh: price.round_dp(PRICE_DP),
        peak_seconds: Decimal::new(peak, 6).normalize(),
        off_peak_seconds: Decimal::new(off_peak, 6).normalize(),
    })
}

/// Total time of the interval that falls inside a peak window
pub fn peak_overlap(tariff: &TariffWindow, interval: &ChargingInterval) -> TimeDelta {
    let spans = tariff.peak_spans();
    let mut overlap = TimeDelta::zero();
    let mut day = interval.start.date();

    loop {
        let midnight = day.and_time(NaiveTime::MIN);
        if midnight >= interval.end {
            break;
        }
        for (from, to) in &spans {
            // Past the last representable instant means past the interval
            let Some(span_start) = midnight.checked_add_signed(*from) else {
                continue;
            };
            let lo = interval.start.max(span_start);
            let hi = midnight
                .checked_add_signed(*to)
                .map_or(interval.end, |span_end| interval.end.min(span_end));
            if hi > lo {
                overlap += hi - lo;
            }
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }

    overlap
}

fn too_large(field: &str) -> ChargeLogError {
    ChargeLogError::invalid_tariff(field, "price is too large to weight over this interval")
}

fn micros(delta: TimeDelta) -> Result<i64> {
    delta
        .num_microseconds()
        .ok_or_else(|| ChargeLogError::invalid_interval("interval is too long to price"))
}
