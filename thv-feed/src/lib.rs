//! External quote sources for the Cash Futures THV service
//!
//! The refresh loop only sees the [`QuoteSource`] trait. This crate ships
//! an HTTP client for the Yahoo Finance chart API and a random source used
//! for simulation and as an explicit fallback.

pub mod error;
pub mod simulated;
pub mod source;
pub mod types;
pub mod yahoo;

pub use error::FeedError;
pub use simulated::SimulatedQuoteSource;
pub use source::QuoteSource;
pub use yahoo::YahooQuoteSource;
