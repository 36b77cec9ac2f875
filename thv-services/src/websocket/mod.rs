//! WebSocket infrastructure for real-time market data
//!
//! The [`BroadcastHub`] owns the subscriber set and fans snapshots out to
//! it; [`WebSocketState`] drives one client connection against the hub.

mod handler;
mod hub;

pub use handler::WebSocketState;
pub use hub::{BroadcastHub, Outbound, SubscriberId, Subscription, TickReport};
