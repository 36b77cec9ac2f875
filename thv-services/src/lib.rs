//! Services for the Cash Futures THV market-data distribution
//!
//! Data flows one way: the [`RefreshLoop`] writes quotes into the
//! [`MarketStore`], the [`SnapshotBuilder`] prices a copy of the store on
//! demand, and the [`BroadcastHub`] pushes those snapshots to every live
//! subscriber. [`MarketDataService`] owns the whole lifecycle.

pub mod config;
pub mod market_store;
pub mod refresh;
pub mod service;
pub mod snapshot;
pub mod websocket;

pub use config::{BroadcastCadence, RefreshMode, ServiceConfig};
pub use market_store::MarketStore;
pub use refresh::{fetch_with_timeout, CycleReport, RefreshLoop, RefreshStatus};
pub use service::{MarketDataService, ServiceHealth};
pub use snapshot::SnapshotBuilder;
pub use websocket::{BroadcastHub, SubscriberId, Subscription, TickReport, WebSocketState};
