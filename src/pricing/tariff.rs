//! Daily tariff schedule: a peak window priced at "Price A", the rest of the
//! day at "Price B", plus a flat per-kWh surcharge.

use crate::error::{ChargeLogError, Result};
use chrono::{NaiveTime, TimeDelta};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One day's recurring price schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TariffWindow {
    /// Start of the peak window (inclusive)
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub peak_start: NaiveTime,

    /// End of the peak window (inclusive); earlier than `peak_start` when the
    /// window wraps past midnight
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub peak_end: NaiveTime,

    /// Price per kWh inside the peak window
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub price_peak: Decimal,

    /// Price per kWh outside the peak window
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub price_off_peak: Decimal,

    /// Flat per-kWh addition, not time weighted
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub surcharge: Decimal,
}

impl TariffWindow {
    /// Build a validated tariff
    pub fn new(
        peak_start: NaiveTime,
        peak_end: NaiveTime,
        price_peak: Decimal,
        price_off_peak: Decimal,
        surcharge: Decimal,
    ) -> Result<Self> {
        let tariff = Self {
            peak_start,
            peak_end,
            price_peak,
            price_off_peak,
            surcharge,
        };
        tariff.validate()?;
        Ok(tariff)
    }

    /// Build a tariff from the raw text fields of a price table row
    pub fn from_fields(
        start_time: &str,
        end_time: &str,
        price_peak: Decimal,
        price_off_peak: Decimal,
        surcharge: Decimal,
    ) -> Result<Self> {
        let peak_start =
            parse_clock(start_time).map_err(|m| ChargeLogError::invalid_tariff("start_time", m))?;
        let peak_end =
            parse_clock(end_time).map_err(|m| ChargeLogError::invalid_tariff("end_time", m))?;
        Self::new(peak_start, peak_end, price_peak, price_off_peak, surcharge)
    }

    /// Prices and surcharge must not be negative
    pub fn validate(&self) -> Result<()> {
        let prices = [
            ("price_peak", self.price_peak),
            ("price_off_peak", self.price_off_peak),
            ("surcharge", self.surcharge),
        ];
        for (field, value) in prices {
            if value < Decimal::ZERO {
                return Err(ChargeLogError::invalid_tariff(
                    field,
                    format!("must not be negative, got {}", value),
                ));
            }
        }
        Ok(())
    }

    /// Whether the peak window runs past midnight
    pub fn wraps_midnight(&self) -> bool {
        self.peak_start > self.peak_end
    }

    /// Classify a wall-clock time
    pub fn is_peak(&self, t: NaiveTime) -> bool {
        if self.wraps_midnight() {
            t >= self.peak_start || t <= self.peak_end
        } else {
            self.peak_start <= t && t <= self.peak_end
        }
    }

    /// Peak sub-windows of a day as offsets from midnight, at most two.
    ///
    /// The closed end point carries no duration, so the spans are treated as
    /// half-open. A window with `peak_start == peak_end` yields one empty span.
    pub fn peak_spans(&self) -> Vec<(TimeDelta, TimeDelta)> {
        let start = since_midnight(self.peak_start);
        let end = since_midnight(self.peak_end);
        if self.wraps_midnight() {
            vec![(TimeDelta::zero(), end), (start, TimeDelta::days(1))]
        } else {
            vec![(start, end)]
        }
    }
}

fn since_midnight(t: NaiveTime) -> TimeDelta {
    t.signed_duration_since(NaiveTime::MIN)
}

// Time-of-day field from a price table.
//
///
// Accepts `HH:MM:SS`, `HH:MM` and fractional hours (`7.5` is 07:30, leftover
// seconds are dropped). An empty or `NaN` field reads as midnight.
fn parse_clock(raw: &str) -> std::result::Result<NaiveTime, String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        return Ok(NaiveTime::MIN);
    }

    if raw.contains(':') {
        return NaiveTime::parse_from_str(raw, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
            .map_err(|_| format!("not a time of day: {raw}"));
    }

    let hours: f64 = raw
        .parse()
        .map_err(|_| format!("not a time of day: {raw}"))?;
    if !hours.is_finite() || !(0.0..24.0).contains(&hours) {
        return Err(format!("hour out of range: {raw}"));
    }
    let whole = hours.trunc();
    let minutes = ((hours - whole) * 60.0).trunc();
    NaiveTime::from_hms_opt(whole as u32, minutes as u32, 0)
        .ok_or_else(|| format!("not a time of day: {raw}"))
}
