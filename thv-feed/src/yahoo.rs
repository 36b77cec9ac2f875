//! Yahoo Finance chart API client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thv_core::Quote;
use tracing::{debug, instrument};

use crate::error::FeedError;
use crate::source::QuoteSource;
use crate::types::ChartResponse;

/// Base URL for the Yahoo Finance chart API
const YAHOO_CHART_BASE: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Yahoo Finance quote client
#[derive(Clone)]
pub struct YahooQuoteSource {
    client: Client,
    base_url: String,
    /// Exchange suffix appended to every ticker (".NS" for NSE)
    suffix: String,
}

impl YahooQuoteSource {
    /// Create a new client against the public endpoint
    pub fn new(suffix: impl Into<String>) -> Result<Self, FeedError> {
        Self::with_base_url(YAHOO_CHART_BASE, suffix)
    }

    /// Create a client against a custom base URL
    pub fn with_base_url(
        base_url: impl Into<String>,
        suffix: impl Into<String>,
    ) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("thv-feed/0.1")
            .build()
            .map_err(|e| FeedError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            suffix: suffix.into(),
        })
    }

    /// Provider symbol for a ticker
    pub fn symbol(&self, ticker: &str) -> String {
        format!("{}{}", ticker, self.suffix)
    }
}

#[async_trait]
impl QuoteSource for YahooQuoteSource {
    fn name(&self) -> &str {
        "yahoo"
    }

    #[instrument(skip(self))]
    async fn fetch(&self, ticker: &str) -> Result<Quote, FeedError> {
        let symbol = self.symbol(ticker);
        let url = format!("{}/{}?range=1d&interval=1d", self.base_url, symbol);

        debug!("Fetching Yahoo quote from: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FeedError::Network(format!("Failed to fetch quote: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::Status { status, body });
        }

        let chart: ChartResponse = response
            .json()
            .await
            .map_err(|e| FeedError::Parse(format!("Failed to parse chart response: {}", e)))?;

        chart.to_quote(&symbol)
    }
}

impl std::fmt::Debug for YahooQuoteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YahooQuoteSource")
            .field("base_url", &self.base_url)
            .field("suffix", &self.suffix)
            .finish()
    }
}
