use rust_decimal::{Decimal, RoundingStrategy};

use crate::config::RoutingConfig;

pub(crate) fn round_to(value: f64, dp: i32) -> f64 {
    let scale = 10f64.powi(dp);
    (value * scale).round() / scale
}

/// Mandatory rest stops: one per full `interval_km` driven, none at the very end
pub fn rest_stops(total_km: f64, interval_km: f64) -> u32 {
    if total_km <= 0.0 || interval_km <= 0.0 {
        return 0;
    }
    ((total_km / interval_km).ceil() as i64 - 1).max(0) as u32
}

pub fn eta_hours(total_km: f64, speed_kmh: f64) -> f64 {
    if speed_kmh <= 0.0 {
        return 0.0;
    }
    total_km / speed_kmh
}

/// Fuel spend for one route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuelCost {
    pub fuel_usd: Decimal,
    pub cost_per_tonne: Decimal,
}

impl FuelCost {
    /// `litres = km / efficiency`, `fuel = litres * pump price`, split over the payload.
    /// Both figures are rounded to cents; a non-positive payload costs zero per tonne.
    pub fn compute(total_km: f64, pump_price: Decimal, payload_tonnes: f64, config: &RoutingConfig) -> Self {
        let litres = Decimal::try_from(total_km / config.fuel_efficiency_km_per_litre).unwrap_or_default();
        let fuel = litres * pump_price;

        let cost_per_tonne = match Decimal::try_from(payload_tonnes) {
            Ok(payload) if payload > Decimal::ZERO => fuel / payload,
            _ => Decimal::ZERO,
        };

        Self {
            fuel_usd: fuel.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
            cost_per_tonne: cost_per_tonne.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        }
    }
}
