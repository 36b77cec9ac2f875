//! Core types for the Cash Futures THV service
//!
//! This crate defines the shared data structures used across the service:
//! instrument records and their partial updates, enriched snapshot views,
//! raw quotes, the WebSocket wire protocol and the error taxonomy.

pub mod error;
pub mod instrument;
pub mod quote;
pub mod view;
pub mod websocket;

pub use error::{ThvError, ThvResult};
pub use instrument::{
    normalize_ticker, Dividends, FuturesQuote, InstrumentRecord, InstrumentUpdate, OptionQuote,
    OptionsChain, SPOT_FLOOR,
};
pub use quote::Quote;
pub use view::{Calculations, InstrumentView, PricingParams};
pub use websocket::{ClientMessage, ServerMessage};
