//! Cash Futures THV API Server
//!
//! Serves enriched market snapshots over REST and pushes them to
//! WebSocket subscribers.

mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use thv_feed::{QuoteSource, SimulatedQuoteSource, YahooQuoteSource};
use thv_services::{MarketDataService, RefreshMode, ServiceConfig, WebSocketState};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MarketDataService>,
    pub ws_state: WebSocketState,
}

impl AppState {
    pub fn new(service: Arc<MarketDataService>) -> Self {
        let ws_state = WebSocketState::new(Arc::clone(service.hub()));
        Self { service, ws_state }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env.local file
    if let Err(e) = dotenvy::from_filename(".env.local") {
        // Not an error if the file doesn't exist
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env.local: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,thv_api=debug,thv_services=debug")),
        )
        .init();

    info!("Starting Cash Futures THV API");

    let config = ServiceConfig::from_env()?;
    let source: Arc<dyn QuoteSource> = match config.mode {
        RefreshMode::Live => Arc::new(YahooQuoteSource::new(config.quote_suffix.clone())?),
        RefreshMode::Simulated => Arc::new(SimulatedQuoteSource::default()),
    };
    info!("Using {} quote source in {:?} mode", source.name(), config.mode);

    let service = Arc::new(MarketDataService::new(config, source)?);
    service.seed_sample_data()?;
    service.start()?;

    let app = routes::router(AppState::new(Arc::clone(&service)));

    let port = std::env::var("SERVER_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(5000);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(service))
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Resolve on Ctrl+C after stopping the service, so open WebSocket
/// connections are released before the server drains
async fn shutdown_signal(service: Arc<MarketDataService>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
    service.shutdown().await;
}
