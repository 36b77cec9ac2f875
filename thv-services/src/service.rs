//! Market data service
//!
//! Wires the store, refresh loop, snapshot builder and broadcast hub
//! together and owns the background tasks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use thv_core::{
    normalize_ticker, InstrumentUpdate, InstrumentView, PricingParams, Quote, ThvError, ThvResult,
};
use thv_feed::QuoteSource;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{BroadcastCadence, ServiceConfig};
use crate::market_store::MarketStore;
use crate::refresh::{fetch_with_timeout, RefreshLoop, RefreshStatus};
use crate::snapshot::SnapshotBuilder;
use crate::websocket::BroadcastHub;

/// Liveness summary for the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealth {
    pub status: &'static str,
    pub running: bool,
    pub instruments: usize,
    pub subscribers: usize,
    pub broadcasts: u64,
    pub refresh: RefreshStatus,
    pub started_at: DateTime<Utc>,
}

pub struct MarketDataService {
    config: ServiceConfig,
    store: Arc<MarketStore>,
    builder: SnapshotBuilder,
    hub: Arc<BroadcastHub>,
    refresh: Arc<RefreshLoop>,
    source: Arc<dyn QuoteSource>,
    token: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    running: AtomicBool,
    started_at: DateTime<Utc>,
}

impl MarketDataService {
    pub fn new(config: ServiceConfig, source: Arc<dyn QuoteSource>) -> ThvResult<Self> {
        config.validate()?;

        let store = Arc::new(MarketStore::new());
        let builder = SnapshotBuilder::new(Arc::clone(&store));
        let hub = Arc::new(BroadcastHub::new(
            builder.clone(),
            config.pricing,
            config.subscriber_queue,
        ));
        let refresh = Arc::new(RefreshLoop::new(
            Arc::clone(&store),
            Arc::clone(&source),
            &config,
            Some(Arc::clone(&hub)),
        )?);

        Ok(Self {
            config,
            store,
            builder,
            hub,
            refresh,
            source,
            token: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
            started_at: Utc::now(),
        })
    }

    /// Populate the store with sample records for the configured tickers
    pub fn seed_sample_data(&self) -> ThvResult<usize> {
        self.store.seed_samples(&self.config.seed_tickers)
    }

    /// Spawn the refresh loop and, on a timer cadence, the broadcast loop
    ///
    /// Calling this again while running has no effect. A service that
    /// has been shut down cannot be restarted.
    pub fn start(&self) -> ThvResult<()> {
        if self.token.is_cancelled() {
            return Err(ThvError::internal("market data service has been shut down"));
        }
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Market data service already started");
            return Ok(());
        }

        let mut tasks = self.tasks.lock();
        tasks.push(tokio::spawn(
            Arc::clone(&self.refresh).run(self.token.child_token()),
        ));

        if let BroadcastCadence::Every(period) = self.config.broadcast {
            tasks.push(tokio::spawn(
                Arc::clone(&self.hub).run(period, self.token.child_token()),
            ));
        }

        info!(
            "Market data service started: {:?} mode, {} instruments",
            self.config.mode,
            self.store.len()
        );
        Ok(())
    }

    /// Stop both loops, wait for them, then release every subscriber
    pub async fn shutdown(&self) {
        info!("Shutting down market data service");
        self.token.cancel();

        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!("Background task ended abnormally: {}", e);
            }
        }

        self.hub.close_all();
        self.running.store(false, Ordering::SeqCst);
        info!("Market data service stopped");
    }

    /// Enriched view of every instrument
    pub fn snapshot(&self) -> ThvResult<Vec<InstrumentView>> {
        self.builder.build(&self.config.pricing)
    }

    /// Enriched view of one instrument
    pub fn instrument(&self, ticker: &str) -> ThvResult<InstrumentView> {
        self.builder.build_one(ticker, &self.config.pricing)
    }

    /// Apply a partial update and return the enriched result
    pub fn upsert(&self, ticker: &str, update: InstrumentUpdate) -> ThvResult<InstrumentView> {
        let record = self.store.upsert(ticker, update)?;
        self.builder.build_one(&record.ticker, &self.config.pricing)
    }

    /// Fetch a quote straight from the quote source, bypassing the store
    pub async fn fetch_quote(&self, ticker: &str) -> ThvResult<Quote> {
        let ticker = normalize_ticker(ticker)?;
        fetch_with_timeout(self.source.as_ref(), &ticker, self.config.fetch_timeout).await
    }

    pub fn health(&self) -> ServiceHealth {
        let running = self.is_running();
        ServiceHealth {
            status: if running { "ok" } else { "stopped" },
            running,
            instruments: self.store.len(),
            subscribers: self.hub.subscriber_count(),
            broadcasts: self.hub.tick_count(),
            refresh: self.refresh.status(),
            started_at: self.started_at,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn params(&self) -> &PricingParams {
        &self.config.pricing
    }

    pub fn store(&self) -> &Arc<MarketStore> {
        &self.store
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }
}
