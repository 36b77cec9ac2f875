//! WebSocket message types for the market-data stream

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::view::InstrumentView;

// ============================================================================
// Client -> Server Messages
// ============================================================================

/// Messages a subscriber may send; anything else is ignored
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Keep-alive probe
    Ping {
        /// Client timestamp
        timestamp: i64,
    },
}

// ============================================================================
// Server -> Client Messages
// ============================================================================

/// Messages pushed to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    /// Full snapshot sent once, right after subscribing
    InitialData { data: Vec<InstrumentView> },
    /// Periodic full snapshot
    MarketUpdate {
        data: Vec<InstrumentView>,
        timestamp: DateTime<Utc>,
    },
    /// Reply to [`ClientMessage::Ping`]
    Pong {
        client_timestamp: i64,
        server_timestamp: i64,
    },
}

impl ServerMessage {
    /// Snapshot payload carried by this message, if any
    pub fn data(&self) -> Option<&[InstrumentView]> {
        match self {
            ServerMessage::InitialData { data } | ServerMessage::MarketUpdate { data, .. } => {
                Some(data)
            }
            ServerMessage::Pong { .. } => None,
        }
    }
}
