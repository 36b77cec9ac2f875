//! Random quote source

use std::ops::Range;

use async_trait::async_trait;
use rand::Rng;
use thv_core::Quote;

use crate::error::FeedError;
use crate::source::QuoteSource;

/// Returns uniformly random quotes inside fixed ranges
#[derive(Debug, Clone)]
pub struct SimulatedQuoteSource {
    spot_range: Range<f64>,
    volume_range: Range<u64>,
}

impl SimulatedQuoteSource {
    pub fn new(spot_range: Range<f64>, volume_range: Range<u64>) -> Self {
        Self {
            spot_range,
            volume_range,
        }
    }

    /// Draw one quote without going through the async trait
    pub fn sample(&self) -> Quote {
        let mut rng = rand::rng();
        let spot = if self.spot_range.is_empty() {
            self.spot_range.start
        } else {
            rng.random_range(self.spot_range.clone())
        };
        let volume = if self.volume_range.is_empty() {
            self.volume_range.start
        } else {
            rng.random_range(self.volume_range.clone())
        };
        Quote::new(spot, volume)
    }
}

impl Default for SimulatedQuoteSource {
    fn default() -> Self {
        Self::new(400.0..500.0, 10_000..100_000)
    }
}

#[async_trait]
impl QuoteSource for SimulatedQuoteSource {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn fetch(&self, _ticker: &str) -> Result<Quote, FeedError> {
        Ok(self.sample())
    }
}
