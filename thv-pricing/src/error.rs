//! Validation errors raised by the pricing engine

use thiserror::Error;

/// Reasons a pricing input is rejected
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PricingError {
    #[error("time to expiry must be non-negative, got {0}")]
    NegativeTime(f64),

    #[error("volatility must be non-negative, got {0}")]
    NegativeVolatility(f64),

    #[error("volatility must be positive when time to expiry is positive")]
    ZeroVolatility,

    #[error("greeks are undefined at or after expiry (time = {0})")]
    Expired(f64),

    #[error("spot must be positive, got {0}")]
    NonPositiveSpot(f64),

    #[error("strike must be positive, got {0}")]
    NonPositiveStrike(f64),

    #[error("batch input `{field}` has length {actual}, expected {expected}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("batch element {index}: {source}")]
    Element {
        index: usize,
        #[source]
        source: Box<PricingError>,
    },
}

impl PricingError {
    pub(crate) fn at(self, index: usize) -> Self {
        PricingError::Element {
            index,
            source: Box::new(self),
        }
    }
}

/// Result type alias for pricing operations
pub type PricingResult<T> = Result<T, PricingError>;
