//! Raw quote returned by an external price source

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Last price and volume for one ticker, as fetched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub spot: f64,
    pub volume: u64,
    pub timestamp: DateTime<Utc>,
}

impl Quote {
    pub fn new(spot: f64, volume: u64) -> Self {
        Self {
            spot,
            volume,
            timestamp: Utc::now(),
        }
    }
}
