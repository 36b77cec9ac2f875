//! Cost-of-carry futures value and standard-deviation bands

use serde::{Deserialize, Serialize};

use crate::error::{PricingError, PricingResult};

/// One, two and three standard-deviation price distances
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SdvLevels {
    pub one: f64,
    pub two: f64,
    pub three: f64,
}

/// Theoretical futures value: `(spot - dividend) * e^(rate * time)`
///
/// Fails only for a negative (or NaN) time to expiry.
pub fn theoretical_value(spot: f64, rate: f64, time: f64, dividend: f64) -> PricingResult<f64> {
    if !(time >= 0.0) {
        return Err(PricingError::NegativeTime(time));
    }
    Ok((spot - dividend) * (rate * time).exp())
}

/// Standard-deviation bands: `spot * volatility * sqrt(time)` and its
/// exact double and triple.
pub fn sdv_levels(spot: f64, volatility: f64, time: f64) -> PricingResult<SdvLevels> {
    if !(volatility >= 0.0) {
        return Err(PricingError::NegativeVolatility(volatility));
    }
    if !(time >= 0.0) {
        return Err(PricingError::NegativeTime(time));
    }

    let one = spot * volatility * time.sqrt();
    Ok(SdvLevels {
        one,
        two: 2.0 * one,
        three: 3.0 * one,
    })
}
