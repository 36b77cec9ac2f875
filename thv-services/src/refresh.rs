//! Refresh Loop
//!
//! Periodically brings the spot price of every known ticker up to date,
//! either from an external [`QuoteSource`] or by a Gaussian random walk.
//! A failure on one ticker never touches another ticker's record and
//! never stops the loop.

use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::Serialize;
use thv_core::{InstrumentRecord, InstrumentUpdate, Quote, ThvError, ThvResult};
use thv_feed::QuoteSource;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{BroadcastCadence, RefreshMode, ServiceConfig};
use crate::market_store::MarketStore;
use crate::websocket::BroadcastHub;

/// Simulated prices never walk below this
pub const SIM_FLOOR: f64 = 1.0;

/// Fetch one quote, giving up after `timeout`
pub async fn fetch_with_timeout(
    source: &dyn QuoteSource,
    ticker: &str,
    timeout: Duration,
) -> ThvResult<Quote> {
    match tokio::time::timeout(timeout, source.fetch(ticker)).await {
        Ok(Ok(quote)) => Ok(quote),
        Ok(Err(e)) => Err(e.into_thv(ticker)),
        Err(_) => Err(ThvError::Timeout {
            ticker: ticker.to_string(),
            millis: timeout.as_millis() as u64,
        }),
    }
}

/// Outcome of one refresh cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleReport {
    pub updated: usize,
    pub failed: Vec<String>,
    /// Failed tickers that got a simulated step instead
    pub fallbacks: usize,
}

/// Point-in-time view of the loop's counters
#[derive(Debug, Clone, Serialize)]
pub struct RefreshStatus {
    pub mode: RefreshMode,
    pub source: String,
    pub cycles: u64,
    pub last_updated: usize,
    pub last_failed: usize,
    pub fallbacks: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct RefreshStats {
    cycles: AtomicU64,
    last_updated: AtomicUsize,
    last_failed: AtomicUsize,
    fallbacks: AtomicU64,
    /// Millis since epoch, 0 before the first cycle
    last_cycle_at: AtomicI64,
}

impl RefreshStats {
    fn record(&self, report: &CycleReport) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.last_updated.store(report.updated, Ordering::Relaxed);
        self.last_failed.store(report.failed.len(), Ordering::Relaxed);
        self.fallbacks
            .fetch_add(report.fallbacks as u64, Ordering::Relaxed);
        self.last_cycle_at
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }
}

pub struct RefreshLoop {
    store: Arc<MarketStore>,
    source: Arc<dyn QuoteSource>,
    mode: RefreshMode,
    interval: Duration,
    fetch_timeout: Duration,
    fallback_to_simulation: bool,
    step: Normal<f64>,
    /// Set when snapshots are pushed right after each cycle
    after_refresh: Option<Arc<BroadcastHub>>,
    stats: RefreshStats,
}

impl RefreshLoop {
    pub fn new(
        store: Arc<MarketStore>,
        source: Arc<dyn QuoteSource>,
        config: &ServiceConfig,
        hub: Option<Arc<BroadcastHub>>,
    ) -> ThvResult<Self> {
        let step = Normal::new(0.0, config.sim_step_stddev)
            .map_err(|e| ThvError::config(format!("invalid simulation step: {e}")))?;
        let after_refresh = match config.broadcast {
            BroadcastCadence::AfterRefresh => hub,
            BroadcastCadence::Every(_) => None,
        };

        Ok(Self {
            store,
            source,
            mode: config.mode,
            interval: config.refresh_interval,
            fetch_timeout: config.fetch_timeout,
            fallback_to_simulation: config.fallback_to_simulation,
            step,
            after_refresh,
            stats: RefreshStats::default(),
        })
    }

    /// Refresh every ticker once
    pub async fn run_cycle(&self) -> CycleReport {
        let report = match self.mode {
            RefreshMode::Live => self.refresh_live().await,
            RefreshMode::Simulated => self.refresh_simulated(),
        };
        self.stats.record(&report);

        if !report.failed.is_empty() {
            debug!("Refresh cycle: {:?}", report);
        }
        report
    }

    async fn refresh_live(&self) -> CycleReport {
        let tickers = self.store.list_tickers();
        let source = self.source.as_ref();
        let results = join_all(
            tickers
                .iter()
                .map(|ticker| fetch_with_timeout(source, ticker, self.fetch_timeout)),
        )
        .await;

        let mut report = CycleReport::default();
        let mut failed = Vec::new();

        for (ticker, result) in tickers.into_iter().zip(results) {
            match result {
                Ok(quote) => match self.store.upsert(&ticker, InstrumentUpdate::from(&quote)) {
                    Ok(_) => report.updated += 1,
                    Err(e) => {
                        warn!("Discarding quote for {}: {}", ticker, e);
                        failed.push(ticker);
                    }
                },
                Err(e) => {
                    warn!("Failed to refresh {} from {}: {}", ticker, self.source.name(), e);
                    failed.push(ticker);
                }
            }
        }

        if self.fallback_to_simulation && !failed.is_empty() {
            let mut rng = rand::rng();
            for ticker in &failed {
                if self.simulate_one(ticker, &mut rng).is_some() {
                    warn!("Applied simulated step to {} after fetch failure", ticker);
                    report.fallbacks += 1;
                }
            }
        }

        report.failed = failed;
        report
    }

    fn refresh_simulated(&self) -> CycleReport {
        let mut rng = rand::rng();
        let mut report = CycleReport::default();

        for ticker in self.store.list_tickers() {
            if self.simulate_one(&ticker, &mut rng).is_some() {
                report.updated += 1;
            }
        }
        report
    }

    fn simulate_one<R: Rng>(&self, ticker: &str, rng: &mut R) -> Option<InstrumentRecord> {
        let delta = self.step.sample(rng);
        self.store.update_with(ticker, |record| {
            record.spot = (record.spot + delta).max(SIM_FLOOR);
        })
    }

    /// Run cycles every interval until `token` is cancelled
    ///
    /// Cancellation takes effect between cycles; a cycle in flight always
    /// finishes.
    pub async fn run(self: Arc<Self>, token: CancellationToken) {
        info!(
            "Starting {:?} refresh loop every {:?} via {}",
            self.mode,
            self.interval,
            self.source.name()
        );

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            self.run_cycle().await;

            if let Some(hub) = &self.after_refresh {
                if let Err(e) = hub.tick() {
                    error!("Failed to broadcast after refresh: {}", e);
                }
            }
        }

        info!("Refresh loop stopped");
    }

    pub fn status(&self) -> RefreshStatus {
        let millis = self.stats.last_cycle_at.load(Ordering::Relaxed);
        RefreshStatus {
            mode: self.mode,
            source: self.source.name().to_string(),
            cycles: self.stats.cycles.load(Ordering::Relaxed),
            last_updated: self.stats.last_updated.load(Ordering::Relaxed),
            last_failed: self.stats.last_failed.load(Ordering::Relaxed),
            fallbacks: self.stats.fallbacks.load(Ordering::Relaxed),
            last_cycle_at: (millis > 0)
                .then(|| DateTime::from_timestamp_millis(millis))
                .flatten(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl std::fmt::Debug for RefreshLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshLoop")
            .field("mode", &self.mode)
            .field("interval", &self.interval)
            .field("source", &self.source.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SnapshotBuilder;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use thv_core::{FuturesQuote, PricingParams};
    use thv_feed::FeedError;

    #[derive(Clone, Copy)]
    enum Script {
        Price(f64),
        Fail,
        Hang,
    }

    struct ScriptedSource(HashMap<String, Script>);

    impl ScriptedSource {
        fn new(entries: &[(&str, Script)]) -> Arc<Self> {
            Arc::new(Self(
                entries.iter().map(|(t, s)| (t.to_string(), *s)).collect(),
            ))
        }
    }

    #[async_trait]
    impl QuoteSource for ScriptedSource {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn fetch(&self, ticker: &str) -> Result<Quote, FeedError> {
            match self.0.get(ticker) {
                Some(Script::Price(p)) => Ok(Quote::new(*p, 1_000)),
                Some(Script::Fail) | None => Err(FeedError::Network("connection reset".into())),
                Some(Script::Hang) => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(Quote::new(1.0, 0))
                }
            }
        }
    }

    fn live_config() -> ServiceConfig {
        ServiceConfig {
            mode: RefreshMode::Live,
            ..ServiceConfig::default()
        }
    }

    fn store_with(tickers: &[(&str, f64)]) -> Arc<MarketStore> {
        let store = Arc::new(MarketStore::new());
        for (ticker, spot) in tickers {
            let update = InstrumentUpdate {
                spot: Some(*spot),
                futures: Some(FuturesQuote {
                    price: spot + 1.0,
                    expiry: "28NOV25".into(),
                    ..FuturesQuote::default()
                }),
                ..InstrumentUpdate::default()
            };
            store.upsert(ticker, update).unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_failure_isolated_to_one_ticker() {
        let store = store_with(&[("AAA", 100.0), ("BBB", 200.0), ("CCC", 300.0)]);
        let before = store.get("BBB").unwrap();
        let source = ScriptedSource::new(&[
            ("AAA", Script::Price(101.0)),
            ("BBB", Script::Fail),
            ("CCC", Script::Price(303.0)),
        ]);
        let refresh = RefreshLoop::new(Arc::clone(&store), source, &live_config(), None).unwrap();

        let report = refresh.run_cycle().await;
        assert_eq!(report.updated, 2);
        assert_eq!(report.failed, vec!["BBB".to_string()]);
        assert_eq!(report.fallbacks, 0);

        assert_eq!(store.get("BBB").unwrap(), before);
        assert_eq!(store.get("AAA").unwrap().spot, 101.0);
        assert_eq!(store.get("CCC").unwrap().spot, 303.0);
        assert_eq!(store.get("AAA").unwrap().volume, 1_000);
        // groups untouched by a spot refresh
        assert_eq!(store.get("AAA").unwrap().futures.price, 101.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_fetch_times_out() {
        let store = store_with(&[("FAST", 10.0), ("SLOW", 20.0)]);
        let before = store.get("SLOW").unwrap();
        let source = ScriptedSource::new(&[("FAST", Script::Price(11.0)), ("SLOW", Script::Hang)]);
        let refresh = RefreshLoop::new(Arc::clone(&store), source, &live_config(), None).unwrap();

        let report = refresh.run_cycle().await;
        assert_eq!(report.updated, 1);
        assert_eq!(report.failed, vec!["SLOW".to_string()]);
        assert_eq!(store.get("SLOW").unwrap(), before);
        assert_eq!(store.get("FAST").unwrap().spot, 11.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_with_timeout_error_kind() {
        let source = ScriptedSource::new(&[("SLOW", Script::Hang), ("BAD", Script::Fail)]);

        let err = fetch_with_timeout(source.as_ref(), "SLOW", Duration::from_millis(250))
            .await
            .unwrap_err();
        assert!(matches!(err, ThvError::Timeout { ref ticker, millis: 250 } if ticker == "SLOW"));

        let err = fetch_with_timeout(source.as_ref(), "BAD", Duration::from_millis(250))
            .await
            .unwrap_err();
        assert!(matches!(err, ThvError::Fetch { .. }));
    }

    #[tokio::test]
    async fn test_fallback_applies_simulated_step() {
        let store = store_with(&[("AAA", 100.0)]);
        let source = ScriptedSource::new(&[("AAA", Script::Fail)]);
        let config = ServiceConfig {
            fallback_to_simulation: true,
            sim_step_stddev: 5.0,
            ..live_config()
        };
        let refresh = RefreshLoop::new(Arc::clone(&store), source, &config, None).unwrap();

        let report = refresh.run_cycle().await;
        assert_eq!(report.fallbacks, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(refresh.status().fallbacks, 1);
        assert!(store.get("AAA").unwrap().spot >= SIM_FLOOR);
    }

    #[tokio::test]
    async fn test_simulation_keeps_spot_above_floor() {
        let store = store_with(&[("LOW", 1.5), ("HIGH", 450.0)]);
        let source = ScriptedSource::new(&[]);
        let config = ServiceConfig {
            sim_step_stddev: 50.0,
            ..ServiceConfig::default()
        };
        let refresh = RefreshLoop::new(Arc::clone(&store), source, &config, None).unwrap();

        for _ in 0..200 {
            let report = refresh.run_cycle().await;
            assert_eq!(report.updated, 2);
            for record in store.records() {
                assert!(record.spot >= SIM_FLOOR);
                assert!(record.spot.is_finite());
            }
        }
        assert_eq!(refresh.status().cycles, 200);
    }

    #[tokio::test]
    async fn test_zero_step_leaves_prices() {
        let store = store_with(&[("AAA", 100.0)]);
        let config = ServiceConfig {
            sim_step_stddev: 0.0,
            ..ServiceConfig::default()
        };
        let refresh =
            RefreshLoop::new(Arc::clone(&store), ScriptedSource::new(&[]), &config, None).unwrap();
        refresh.run_cycle().await;
        assert_eq!(store.get("AAA").unwrap().spot, 100.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_cancelled() {
        let store = store_with(&[("AAA", 100.0)]);
        let refresh = Arc::new(
            RefreshLoop::new(
                Arc::clone(&store),
                ScriptedSource::new(&[]),
                &ServiceConfig::default(),
                None,
            )
            .unwrap(),
        );
        let token = CancellationToken::new();
        let task = tokio::spawn(Arc::clone(&refresh).run(token.clone()));

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        token.cancel();
        task.await.unwrap();
        assert_eq!(refresh.status().cycles, 3);
        assert!(refresh.status().last_cycle_at.is_some());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(refresh.status().cycles, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_after_refresh_cadence_broadcasts() {
        let store = store_with(&[("AAA", 100.0)]);
        let hub = Arc::new(BroadcastHub::new(
            SnapshotBuilder::new(Arc::clone(&store)),
            PricingParams::default(),
            16,
        ));
        let mut sub = hub.subscribe().unwrap();
        let config = ServiceConfig {
            broadcast: BroadcastCadence::AfterRefresh,
            ..ServiceConfig::default()
        };
        let refresh = Arc::new(
            RefreshLoop::new(store, ScriptedSource::new(&[]), &config, Some(Arc::clone(&hub)))
                .unwrap(),
        );
        let token = CancellationToken::new();
        let task = tokio::spawn(refresh.run(token.clone()));

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        token.cancel();
        task.await.unwrap();

        assert_eq!(hub.tick_count(), 2);
        let mut received = 0;
        while sub.receiver.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 3);
    }
}
