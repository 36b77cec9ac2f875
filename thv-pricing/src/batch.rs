//! Batch pricing over parallel arrays
//!
//! Each element is produced by the scalar functions in this crate, so a
//! batch result is bit-identical to N independent scalar calls.

use serde::{Deserialize, Serialize};

use crate::black_scholes::{black_scholes, OptionSide};
use crate::error::{PricingError, PricingResult};
use crate::futures::{sdv_levels, theoretical_value};

/// Parallel input arrays, one entry per instrument
#[derive(Debug, Clone, Copy)]
pub struct BatchInputs<'a> {
    pub spots: &'a [f64],
    pub rates: &'a [f64],
    pub times: &'a [f64],
    pub dividends: &'a [f64],
    pub volatilities: &'a [f64],
}

impl BatchInputs<'_> {
    fn validate_lengths(&self) -> PricingResult<usize> {
        let expected = self.spots.len();
        for (field, actual) in [
            ("rates", self.rates.len()),
            ("times", self.times.len()),
            ("dividends", self.dividends.len()),
            ("volatilities", self.volatilities.len()),
        ] {
            if actual != expected {
                return Err(PricingError::LengthMismatch {
                    field,
                    expected,
                    actual,
                });
            }
        }
        Ok(expected)
    }
}

/// Parallel output arrays, aligned with the inputs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchOutput {
    pub theoretical_values: Vec<f64>,
    pub one_sdv: Vec<f64>,
    pub two_sdv: Vec<f64>,
    pub three_sdv: Vec<f64>,
    /// At-the-money (strike = spot) call price, `None` where undefined
    /// (zero volatility before expiry)
    pub atm_call: Vec<Option<f64>>,
    /// At-the-money put price, `None` where undefined
    pub atm_put: Vec<Option<f64>>,
}

impl BatchOutput {
    fn with_capacity(len: usize) -> Self {
        Self {
            theoretical_values: Vec::with_capacity(len),
            one_sdv: Vec::with_capacity(len),
            two_sdv: Vec::with_capacity(len),
            three_sdv: Vec::with_capacity(len),
            atm_call: Vec::with_capacity(len),
            atm_put: Vec::with_capacity(len),
        }
    }

    pub fn len(&self) -> usize {
        self.theoretical_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.theoretical_values.is_empty()
    }
}

/// Price every element of `inputs`
///
/// Fails on the first element whose theoretical value or SDV bands are
/// invalid, reporting its index.
pub fn price_batch(inputs: &BatchInputs<'_>) -> PricingResult<BatchOutput> {
    let len = inputs.validate_lengths()?;
    let mut out = BatchOutput::with_capacity(len);

    for i in 0..len {
        let spot = inputs.spots[i];
        let rate = inputs.rates[i];
        let time = inputs.times[i];
        let vol = inputs.volatilities[i];

        let tv = theoretical_value(spot, rate, time, inputs.dividends[i]).map_err(|e| e.at(i))?;
        let sdv = sdv_levels(spot, vol, time).map_err(|e| e.at(i))?;

        out.theoretical_values.push(tv);
        out.one_sdv.push(sdv.one);
        out.two_sdv.push(sdv.two);
        out.three_sdv.push(sdv.three);
        out.atm_call
            .push(black_scholes(spot, spot, rate, time, vol, OptionSide::Call).ok());
        out.atm_put
            .push(black_scholes(spot, spot, rate, time, vol, OptionSide::Put).ok());
    }

    Ok(out)
}
