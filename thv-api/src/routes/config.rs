//! Market configuration endpoint

use std::collections::BTreeMap;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use thv_core::PricingParams;
use thv_services::{BroadcastCadence, RefreshMode};

use crate::AppState;

/// Annualised interest rates (percent) by days to expiry
const RATE_TERM_STRUCTURE: [(u32, f64); 5] =
    [(7, 6.2), (30, 6.4), (60, 6.7), (90, 6.9), (180, 7.1)];

const EXPIRY_DAYS: [u32; 6] = [7, 30, 60, 90, 180, 365];

const EXCHANGES: [&str; 4] = ["NSE", "BSE", "MCX", "NCDEX"];

#[derive(Debug, Serialize)]
struct MarketConfigResponse {
    interest_rates: BTreeMap<u32, f64>,
    expiries: Vec<u32>,
    exchanges: Vec<&'static str>,
    vix_enabled: bool,
    pricing: PricingParams,
    mode: RefreshMode,
    refresh_interval_ms: u64,
    /// `None` when snapshots are pushed after every refresh
    broadcast_interval_ms: Option<u64>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/config", get(market_config))
}

async fn market_config(State(state): State<AppState>) -> Json<MarketConfigResponse> {
    let config = state.service.config();
    let broadcast_interval_ms = match config.broadcast {
        BroadcastCadence::Every(period) => Some(period.as_millis() as u64),
        BroadcastCadence::AfterRefresh => None,
    };

    Json(MarketConfigResponse {
        interest_rates: RATE_TERM_STRUCTURE.into_iter().collect(),
        expiries: EXPIRY_DAYS.to_vec(),
        exchanges: EXCHANGES.to_vec(),
        vix_enabled: true,
        pricing: config.pricing,
        mode: config.mode,
        refresh_interval_ms: config.refresh_interval.as_millis() as u64,
        broadcast_interval_ms,
    })
}
