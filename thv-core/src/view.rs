//! Enriched instrument views published to pull and push consumers

use serde::{Deserialize, Serialize};
use thv_pricing::Greeks;

use crate::error::{ThvError, ThvResult};
use crate::instrument::InstrumentRecord;

/// Market parameters a snapshot is priced with
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingParams {
    /// Annualised risk-free rate as a fraction (0.064 = 6.4%)
    pub rate: f64,
    /// Time to expiry in years
    pub time_to_expiry: f64,
    /// Annualised volatility as a fraction
    pub volatility: f64,
    /// Distance of the futures bid/ask from the theoretical value
    pub half_spread: f64,
}

impl PricingParams {
    pub fn validate(&self) -> ThvResult<()> {
        if !self.rate.is_finite() {
            return Err(ThvError::validation("rate must be finite"));
        }
        if !(self.time_to_expiry >= 0.0) {
            return Err(ThvError::validation("time to expiry must be non-negative"));
        }
        if !(self.volatility >= 0.0) {
            return Err(ThvError::validation("volatility must be non-negative"));
        }
        if !(self.half_spread >= 0.0) {
            return Err(ThvError::validation("half spread must be non-negative"));
        }
        Ok(())
    }
}

impl Default for PricingParams {
    fn default() -> Self {
        Self {
            rate: 0.064,
            time_to_expiry: 30.0 / 365.0,
            volatility: 0.25,
            half_spread: 0.5,
        }
    }
}

/// Values derived from a record at snapshot time, rounded to cents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calculations {
    pub theoretical_value: f64,
    pub one_sdv: f64,
    pub two_sdv: f64,
    pub three_sdv: f64,
    /// Theoretical value minus spot
    pub futures_cash_diff: f64,
    /// Futures premium over cash, in percent
    pub percentage_over_cash: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atm_call: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atm_put: Option<f64>,
    /// At-the-money greeks, omitted when undefined
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub greeks: Option<Greeks>,
}

/// A record plus its `calculations` block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentView {
    #[serde(flatten)]
    pub record: InstrumentRecord,
    pub calculations: Calculations,
}

/// Round half away from zero to two decimals
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_cents() {
        assert_eq!(round_cents(100.411_804), 100.41);
        assert_eq!(round_cents(7.167_277), 7.17);
        assert_eq!(round_cents(-0.004), -0.0);
    }

    #[test]
    fn test_params_validation() {
        assert!(PricingParams::default().validate().is_ok());
        let bad = PricingParams {
            time_to_expiry: -1.0,
            ..PricingParams::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_view_flattens_record() {
        let view = InstrumentView {
            record: InstrumentRecord::new("AAA"),
            calculations: Calculations {
                theoretical_value: 1.0,
                one_sdv: 0.1,
                two_sdv: 0.2,
                three_sdv: 0.3,
                futures_cash_diff: 0.0,
                percentage_over_cash: 0.0,
                atm_call: None,
                atm_put: None,
                greeks: None,
            },
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["ticker"], "AAA");
        assert_eq!(json["calculations"]["theoretical_value"], 1.0);
        assert!(json["calculations"].get("greeks").is_none());
    }
}
