//! Energy gained during a session.
//!
//! First match wins: a manual reading, then the range-estimate delta scaled by
//! the full-charge range, then the battery percentage delta.

use super::AMOUNT_DP;
use crate::error::{ChargeLogError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Readings collected when a session is finished
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnergyInputs {
    /// kWh typed in by the user
    pub manual_kwh: Option<Decimal>,

    /// Estimated range when the session started
    pub range_start: Option<Decimal>,

    /// Estimated range when the session ended
    pub range_end: Option<Decimal>,

    /// Range at 100% charge, same unit as the readings
    pub full_range: Decimal,

    pub battery_start_percent: Decimal,

    pub battery_end_percent: Decimal,

    pub battery_capacity_kwh: Decimal,
}

/// Which rule produced the estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum EnergySource {
    Manual,
    Range,
    BatteryPercent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EnergyEstimate {
    /// kWh rounded to 2 places; can be zero or negative from the battery rule
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub kwh: Decimal,
    pub source: EnergySource,
}

/// Estimate the energy delivered in a session
pub fn estimate_kwh(inputs: &EnergyInputs) -> Result<EnergyEstimate> {
    if let Some(manual) = inputs.manual_kwh.filter(|kwh| *kwh > Decimal::ZERO) {
        return Ok(EnergyEstimate {
            kwh: manual.round_dp(AMOUNT_DP),
            source: EnergySource::Manual,
        });
    }

    if let (Some(start), Some(end)) = (inputs.range_start, inputs.range_end)
        && end > start
        && inputs.full_range > Decimal::ZERO
    {
        let kwh = end
            .checked_sub(start)
            .and_then(|gained| gained.checked_div(inputs.full_range))
            .and_then(|share| share.checked_mul(inputs.battery_capacity_kwh))
            .ok_or_else(|| too_large("range_end"))?;
        return Ok(EnergyEstimate {
            kwh: kwh.round_dp(AMOUNT_DP),
            source: EnergySource::Range,
        });
    }

    Ok(EnergyEstimate {
        kwh: percent_of(
            inputs.battery_start_percent,
            inputs.battery_end_percent,
            inputs.battery_capacity_kwh,
        )?,
        source: EnergySource::BatteryPercent,
    })
}

/// Pre-filled kWh for the finish form: charging speed times duration when a
/// speed is known, otherwise a positive battery delta, otherwise zero.
pub fn suggested_kwh(
    charge_speed_kw: Option<Decimal>,
    duration_hours: Decimal,
    battery_start_percent: Decimal,
    battery_end_percent: Decimal,
    battery_capacity_kwh: Decimal,
) -> Result<Decimal> {
    if let Some(speed) = charge_speed_kw.filter(|kw| *kw > Decimal::ZERO) {
        return speed
            .checked_mul(duration_hours)
            .map(|kwh| kwh.round_dp(AMOUNT_DP))
            .ok_or_else(|| too_large("charge_speed_kw"));
    }

    let kwh = percent_of(battery_start_percent, battery_end_percent, battery_capacity_kwh)?;
    Ok(kwh.max(Decimal::ZERO))
}

fn percent_of(start_percent: Decimal, end_percent: Decimal, capacity: Decimal) -> Result<Decimal> {
    end_percent
        .checked_sub(start_percent)
        .and_then(|delta| (delta / Decimal::ONE_HUNDRED).checked_mul(capacity))
        .map(|kwh| kwh.round_dp(AMOUNT_DP))
        .ok_or_else(|| too_large("battery_capacity_kwh"))
}

fn too_large(field: &str) -> ChargeLogError {
    ChargeLogError::validation(field, "value is too large to estimate energy from")
}
