//! Error types for the service

use thiserror::Error;
use thv_pricing::PricingError;

/// Service-wide error type
#[derive(Error, Debug)]
pub enum ThvError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Fetch error ({ticker}): {message}")]
    Fetch { ticker: String, message: String },

    #[error("Timed out fetching {ticker} after {millis}ms")]
    Timeout { ticker: String, millis: u64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ThvError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ThvError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ThvError::NotFound(msg.into())
    }

    pub fn fetch(ticker: impl Into<String>, message: impl Into<String>) -> Self {
        ThvError::Fetch {
            ticker: ticker.into(),
            message: message.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        ThvError::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ThvError::Internal(msg.into())
    }

    /// True for the "ticker is unknown" condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, ThvError::NotFound(_))
    }
}

impl From<PricingError> for ThvError {
    fn from(e: PricingError) -> Self {
        ThvError::Validation(e.to_string())
    }
}

/// Result type alias for service operations
pub type ThvResult<T> = Result<T, ThvError>;
