//! Black-Scholes European option price and greeks

use serde::{Deserialize, Serialize};

use crate::error::{PricingError, PricingResult};
use crate::normal::{norm_cdf, norm_pdf};

/// Call or put
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionSide {
    Call,
    Put,
}

/// Closed-form sensitivities for a call/put pair on the same strike
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    pub delta_call: f64,
    /// Always `delta_call - 1`
    pub delta_put: f64,
    pub gamma: f64,
    /// Per year
    pub theta_call: f64,
    /// Per year
    pub theta_put: f64,
    /// Per unit of volatility
    pub vega: f64,
}

#[inline]
fn intrinsic(side: OptionSide, spot: f64, strike: f64) -> f64 {
    match side {
        OptionSide::Call => (spot - strike).max(0.0),
        OptionSide::Put => (strike - spot).max(0.0),
    }
}

fn check_underlying(spot: f64, strike: f64) -> PricingResult<()> {
    if !(spot > 0.0) {
        return Err(PricingError::NonPositiveSpot(spot));
    }
    if !(strike > 0.0) {
        return Err(PricingError::NonPositiveStrike(strike));
    }
    Ok(())
}

fn check_volatility(volatility: f64) -> PricingResult<()> {
    if !(volatility >= 0.0) {
        return Err(PricingError::NegativeVolatility(volatility));
    }
    Ok(())
}

#[inline]
fn d1_d2(spot: f64, strike: f64, rate: f64, time: f64, volatility: f64) -> (f64, f64) {
    let sig_sqrt_t = volatility * time.sqrt();
    let d1 = ((spot / strike).ln() + (rate + 0.5 * volatility * volatility) * time) / sig_sqrt_t;
    (d1, d1 - sig_sqrt_t)
}

/// Black-Scholes price of a European option
///
/// At or past expiry (`time <= 0`) the intrinsic value is returned.
/// A zero volatility before expiry is rejected rather than divided by.
pub fn black_scholes(
    spot: f64,
    strike: f64,
    rate: f64,
    time: f64,
    volatility: f64,
    side: OptionSide,
) -> PricingResult<f64> {
    check_underlying(spot, strike)?;
    check_volatility(volatility)?;
    if time.is_nan() {
        return Err(PricingError::NegativeTime(time));
    }
    if time <= 0.0 {
        return Ok(intrinsic(side, spot, strike));
    }
    if volatility == 0.0 {
        return Err(PricingError::ZeroVolatility);
    }

    let (d1, d2) = d1_d2(spot, strike, rate, time, volatility);
    let discounted_strike = strike * (-rate * time).exp();

    Ok(match side {
        OptionSide::Call => spot * norm_cdf(d1) - discounted_strike * norm_cdf(d2),
        OptionSide::Put => discounted_strike * norm_cdf(-d2) - spot * norm_cdf(-d1),
    })
}

/// Delta, gamma, theta and vega for both sides of a strike
pub fn greeks(
    spot: f64,
    strike: f64,
    rate: f64,
    time: f64,
    volatility: f64,
) -> PricingResult<Greeks> {
    check_underlying(spot, strike)?;
    check_volatility(volatility)?;
    if !(time >= 0.0) {
        return Err(PricingError::NegativeTime(time));
    }
    if time == 0.0 {
        return Err(PricingError::Expired(time));
    }
    if volatility == 0.0 {
        return Err(PricingError::ZeroVolatility);
    }

    let sqrt_t = time.sqrt();
    let (d1, d2) = d1_d2(spot, strike, rate, time, volatility);
    let pdf_d1 = norm_pdf(d1);
    let discounted_strike = strike * (-rate * time).exp();

    let delta_call = norm_cdf(d1);
    let decay = -(spot * pdf_d1 * volatility) / (2.0 * sqrt_t);

    Ok(Greeks {
        delta_call,
        delta_put: delta_call - 1.0,
        gamma: pdf_d1 / (spot * volatility * sqrt_t),
        theta_call: decay - rate * discounted_strike * norm_cdf(d2),
        theta_put: decay + rate * discounted_strike * norm_cdf(-d2),
        vega: spot * sqrt_t * pdf_d1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_textbook_prices() {
        let call = black_scholes(100.0, 100.0, 0.05, 1.0, 0.2, OptionSide::Call).unwrap();
        let put = black_scholes(100.0, 100.0, 0.05, 1.0, 0.2, OptionSide::Put).unwrap();
        assert_abs_diff_eq!(call, 10.450_583_572, epsilon = 1e-4);
        assert_abs_diff_eq!(put, 5.573_526_022, epsilon = 1e-4);
    }

    #[test]
    fn test_put_call_parity() {
        for (spot, strike, rate, time, vol) in [
            (100.0, 90.0, 0.064, 0.25, 0.3),
            (450.0, 500.0, 0.02, 1.5, 0.18),
            (12.5, 12.5, 0.0, 0.01, 0.9),
        ] {
            let call = black_scholes(spot, strike, rate, time, vol, OptionSide::Call).unwrap();
            let put = black_scholes(spot, strike, rate, time, vol, OptionSide::Put).unwrap();
            let forward_gap = spot - strike * (-rate * time).exp();
            assert_abs_diff_eq!(call - put, forward_gap, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_expiry_returns_intrinsic() {
        for (spot, strike) in [(120.0, 100.0), (80.0, 100.0), (100.0, 100.0), (0.5, 4000.0)] {
            for vol in [0.0, 0.25, 3.0] {
                let call = black_scholes(spot, strike, 0.05, 0.0, vol, OptionSide::Call).unwrap();
                let put = black_scholes(spot, strike, 0.05, 0.0, vol, OptionSide::Put).unwrap();
                assert_eq!(call, f64::max(spot - strike, 0.0));
                assert_eq!(put, f64::max(strike - spot, 0.0));
            }
        }
    }

    #[test]
    fn test_past_expiry_returns_intrinsic() {
        let call = black_scholes(110.0, 100.0, 0.05, -0.5, 0.2, OptionSide::Call).unwrap();
        assert_eq!(call, 10.0);
    }

    #[test]
    fn test_zero_volatility_before_expiry_rejected() {
        assert_eq!(
            black_scholes(100.0, 100.0, 0.05, 0.5, 0.0, OptionSide::Call),
            Err(PricingError::ZeroVolatility)
        );
        assert_eq!(greeks(100.0, 100.0, 0.05, 0.5, 0.0), Err(PricingError::ZeroVolatility));
    }

    #[test]
    fn test_invalid_underlying_rejected() {
        assert_eq!(
            black_scholes(0.0, 100.0, 0.05, 0.5, 0.2, OptionSide::Put),
            Err(PricingError::NonPositiveSpot(0.0))
        );
        assert_eq!(
            black_scholes(100.0, -1.0, 0.05, 0.5, 0.2, OptionSide::Put),
            Err(PricingError::NonPositiveStrike(-1.0))
        );
    }

    #[test]
    fn test_textbook_greeks() {
        let g = greeks(100.0, 100.0, 0.05, 1.0, 0.2).unwrap();
        assert_abs_diff_eq!(g.delta_call, 0.636_830_651, epsilon = 1e-6);
        assert_eq!(g.delta_put, g.delta_call - 1.0);
        assert_abs_diff_eq!(g.gamma, 0.018_762_017, epsilon = 1e-6);
        assert_abs_diff_eq!(g.theta_call, -6.414_027_546, epsilon = 1e-4);
        assert_abs_diff_eq!(g.theta_put, -1.657_880_424, epsilon = 1e-4);
        assert_abs_diff_eq!(g.vega, 37.524_034_692, epsilon = 1e-6);
    }

    #[test]
    fn test_greeks_at_expiry_rejected() {
        assert_eq!(greeks(100.0, 100.0, 0.05, 0.0, 0.2), Err(PricingError::Expired(0.0)));
        assert_eq!(
            greeks(100.0, 100.0, 0.05, -1.0, 0.2),
            Err(PricingError::NegativeTime(-1.0))
        );
    }
}
