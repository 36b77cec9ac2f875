//! Per-instrument market state

use chrono::NaiveDate;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::error::{ThvError, ThvResult};
use crate::quote::Quote;

/// Lowest spot a record may hold; every update is clamped to it
pub const SPOT_FLOOR: f64 = 0.01;

/// Upper-case and validate a ticker symbol
///
/// Accepts ASCII alphanumerics plus `.`, `-`, `_` and `&` (e.g. `M&M`,
/// `BAJAJ-AUTO`).
pub fn normalize_ticker(raw: &str) -> ThvResult<String> {
    let ticker = raw.trim().to_ascii_uppercase();
    if ticker.is_empty() {
        return Err(ThvError::validation("ticker must not be empty"));
    }
    if let Some(bad) = ticker
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '&')))
    {
        return Err(ThvError::validation(format!(
            "ticker {ticker:?} contains invalid character {bad:?}"
        )));
    }
    Ok(ticker)
}

/// Front-month futures contract. `price`, `bid` and `ask` are overwritten
/// from the theoretical value on every snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FuturesQuote {
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub bid: f64,
    #[serde(default)]
    pub ask: f64,
    #[serde(default)]
    pub volume: u64,
    #[serde(default, rename = "oi", alias = "open_interest")]
    pub open_interest: u64,
    /// Expiry label, e.g. `28NOV25`
    #[serde(default)]
    pub expiry: String,
}

/// One side of the option chain, passed through untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionQuote {
    #[serde(default)]
    pub bid: f64,
    #[serde(default)]
    pub ask: f64,
    /// Last traded price
    #[serde(default)]
    pub ltp: f64,
    #[serde(default)]
    pub volume: u64,
    #[serde(default, rename = "oi", alias = "open_interest")]
    pub open_interest: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionsChain {
    #[serde(default)]
    pub calls: OptionQuote,
    #[serde(default)]
    pub puts: OptionQuote,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dividends {
    #[serde(default)]
    pub announced: bool,
    #[serde(default)]
    pub ex_date: Option<NaiveDate>,
    #[serde(default)]
    pub amount: f64,
}

/// Market state for one ticker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentRecord {
    pub ticker: String,
    pub spot: f64,
    pub volume: u64,
    /// Listing venues, in listing order
    pub exchanges: IndexSet<String>,
    pub futures: FuturesQuote,
    pub options: OptionsChain,
    pub dividends: Dividends,
}

impl InstrumentRecord {
    /// Default record for a ticker seen for the first time
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            spot: SPOT_FLOOR,
            volume: 0,
            exchanges: IndexSet::from(["NSE".to_string()]),
            futures: FuturesQuote::default(),
            options: OptionsChain::default(),
            dividends: Dividends::default(),
        }
    }

    /// Merge a partial update into this record
    ///
    /// Merging is shallow: a present `futures`, `options`, `dividends` or
    /// `exchanges` group replaces the whole group, it is not merged field
    /// by field.
    pub fn apply(&mut self, update: InstrumentUpdate) {
        if let Some(spot) = update.spot {
            self.spot = spot;
        }
        if let Some(volume) = update.volume {
            self.volume = volume;
        }
        if let Some(exchanges) = update.exchanges {
            self.exchanges = exchanges;
        }
        if let Some(futures) = update.futures {
            self.futures = futures;
        }
        if let Some(options) = update.options {
            self.options = options;
        }
        if let Some(dividends) = update.dividends {
            self.dividends = dividends;
        }
        self.enforce_invariants();
    }

    /// Clamp spot above [`SPOT_FLOOR`] and the dividend amount at zero
    pub fn enforce_invariants(&mut self) {
        self.spot = self.spot.max(SPOT_FLOOR);
        self.dividends.amount = self.dividends.amount.max(0.0);
    }
}

/// Partial record; absent groups are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstrumentUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spot: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchanges: Option<IndexSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub futures: Option<FuturesQuote>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<OptionsChain>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dividends: Option<Dividends>,
}

impl InstrumentUpdate {
    pub fn spot(spot: f64) -> Self {
        Self {
            spot: Some(spot),
            ..Self::default()
        }
    }
}

impl From<&Quote> for InstrumentUpdate {
    fn from(quote: &Quote) -> Self {
        Self {
            spot: Some(quote.spot),
            volume: Some(quote.volume),
            ..Self::default()
        }
    }
}
