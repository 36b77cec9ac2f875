//! Quote source abstraction

use async_trait::async_trait;
use thv_core::Quote;

use crate::error::FeedError;

/// Fetches the latest quote for a ticker from some external market-data
/// provider
///
/// Implementations need not bound their own latency; callers wrap every
/// `fetch` in a timeout.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    async fn fetch(&self, ticker: &str) -> Result<Quote, FeedError>;
}
