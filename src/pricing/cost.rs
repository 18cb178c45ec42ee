//! Session cost: kWh times the tariff price, or a price derived from a total
//! the user already paid.

use super::{AMOUNT_DP, ChargingInterval, PRICE_DP, PricingResult, TariffWindow, weighted_price};
use crate::error::{ChargeLogError, Result};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    /// Weighted tariff price
    Tariff,
    /// Derived from a manually entered total
    ManualTotal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CostBreakdown {
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub kwh: Decimal,
    /// Effective price per kWh stored on the log record
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub price_per_kwh: Decimal,
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub total_cost: Decimal,
    pub source: PriceSource,
    /// Present when the tariff was used
    pub pricing: Option<PricingResult>,
}

/// Settle a session's cost.
///
/// A manual total above zero overrides the tariff: the stored price becomes
/// `total / kWh` and needs a positive energy figure.
pub fn settle(
    kwh: Decimal,
    tariff: &TariffWindow,
    interval: &ChargingInterval,
    manual_total: Option<Decimal>,
) -> Result<CostBreakdown> {
    if let Some(total) = manual_total.filter(|t| *t > Decimal::ZERO) {
        return Ok(CostBreakdown {
            kwh,
            price_per_kwh: price_from_total(total, kwh)?,
            total_cost: total,
            source: PriceSource::ManualTotal,
            pricing: None,
        });
    }

    let pricing = weighted_price(tariff, interval)?;
    let total_cost = pricing
        .price_per_kwh
        .checked_mul(kwh)
        .ok_or_else(|| ChargeLogError::validation("kwh", "total cost is too large"))?;
    Ok(CostBreakdown {
        kwh,
        price_per_kwh: pricing.price_per_kwh,
        total_cost: total_cost.round_dp(AMOUNT_DP),
        source: PriceSource::Tariff,
        pricing: Some(pricing),
    })
}

/// Price per kWh implied by a total
pub fn price_from_total(total: Decimal, kwh: Decimal) -> Result<Decimal> {
    if kwh.is_zero() {
        return Err(ChargeLogError::zero_energy(
            "cannot derive a price per kWh from a total over 0 kWh",
        ));
    }
    if kwh < Decimal::ZERO {
        return Err(ChargeLogError::zero_energy(format!(
            "cannot derive a price per kWh from a total over {} kWh",
            kwh
        )));
    }
    total
        .checked_div(kwh)
        .map(|price| price.round_dp(PRICE_DP))
        .ok_or_else(|| ChargeLogError::validation("manual_total", "price per kWh is too large"))
}
