//! Error types for quote sources

use thiserror::Error;
use thv_core::ThvError;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("No quote data for {0}")]
    NoData(String),
}

impl FeedError {
    /// Attach the ticker this error was raised for
    pub fn into_thv(self, ticker: &str) -> ThvError {
        ThvError::fetch(ticker, self.to_string())
    }
}
