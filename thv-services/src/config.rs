//! Service configuration
//!
//! Every field has a default; [`ServiceConfig::from_env`] overrides them
//! from `THV_*` environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use thv_core::{normalize_ticker, PricingParams, ThvError, ThvResult};

const DEFAULT_TICKERS: [&str; 6] = ["HDFCBANK", "AXISBANK", "RELIANCE", "TCS", "INFY", "ICICIBANK"];

/// Where refreshed prices come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshMode {
    /// Fetch every ticker from the external quote source
    Live,
    /// Random-walk the stored spot prices
    Simulated,
}

impl FromStr for RefreshMode {
    type Err = ThvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "live" => Ok(RefreshMode::Live),
            "simulated" | "simulation" | "sim" => Ok(RefreshMode::Simulated),
            other => Err(ThvError::config(format!(
                "THV_MODE must be `live` or `simulated`, got {other:?}"
            ))),
        }
    }
}

/// When the hub pushes snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastCadence {
    /// On its own timer
    Every(Duration),
    /// Right after each refresh cycle
    AfterRefresh,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub mode: RefreshMode,
    pub refresh_interval: Duration,
    pub broadcast: BroadcastCadence,
    /// Upper bound on a single quote fetch
    pub fetch_timeout: Duration,
    pub pricing: PricingParams,
    /// Standard deviation of one simulated price step
    pub sim_step_stddev: f64,
    /// Tickers seeded with sample data at startup
    pub seed_tickers: Vec<String>,
    /// Exchange suffix for the live quote source
    pub quote_suffix: String,
    /// Substitute a simulated step when a live fetch fails
    pub fallback_to_simulation: bool,
    /// Pushes buffered per subscriber before new ones are dropped
    pub subscriber_queue: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            mode: RefreshMode::Simulated,
            refresh_interval: Duration::from_millis(1000),
            broadcast: BroadcastCadence::Every(Duration::from_millis(5000)),
            fetch_timeout: Duration::from_millis(3000),
            pricing: PricingParams::default(),
            sim_step_stddev: 1.0,
            seed_tickers: DEFAULT_TICKERS.iter().map(|t| t.to_string()).collect(),
            quote_suffix: ".NS".to_string(),
            fallback_to_simulation: false,
            subscriber_queue: 32,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables
    ///
    /// Unset variables keep their defaults; malformed ones are an error.
    pub fn from_env() -> ThvResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> ThvResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(mode) = lookup("THV_MODE") {
            config.mode = mode.parse()?;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "THV_REFRESH_INTERVAL_MS")? {
            config.refresh_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "THV_BROADCAST_INTERVAL_MS")? {
            config.broadcast = match ms {
                0 => BroadcastCadence::AfterRefresh,
                ms => BroadcastCadence::Every(Duration::from_millis(ms)),
            };
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "THV_FETCH_TIMEOUT_MS")? {
            config.fetch_timeout = Duration::from_millis(ms);
        }
        if let Some(rate) = parse_var(&lookup, "THV_INTEREST_RATE")? {
            config.pricing.rate = rate;
        }
        if let Some(vol) = parse_var(&lookup, "THV_VOLATILITY")? {
            config.pricing.volatility = vol;
        }
        if let Some(days) = parse_var::<f64, _>(&lookup, "THV_DAYS_TO_EXPIRY")? {
            config.pricing.time_to_expiry = days / 365.0;
        }
        if let Some(spread) = parse_var(&lookup, "THV_HALF_SPREAD")? {
            config.pricing.half_spread = spread;
        }
        if let Some(step) = parse_var(&lookup, "THV_SIM_STEP")? {
            config.sim_step_stddev = step;
        }
        if let Some(list) = lookup("THV_SEED_TICKERS") {
            config.seed_tickers = list
                .split(',')
                .filter(|t| !t.trim().is_empty())
                .map(normalize_ticker)
                .collect::<ThvResult<_>>()?;
        }
        if let Some(suffix) = lookup("THV_QUOTE_SUFFIX") {
            config.quote_suffix = suffix;
        }
        if let Some(fallback) = parse_var(&lookup, "THV_FALLBACK_TO_SIMULATION")? {
            config.fallback_to_simulation = fallback;
        }
        if let Some(queue) = parse_var(&lookup, "THV_SUBSCRIBER_QUEUE")? {
            config.subscriber_queue = queue;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ThvResult<()> {
        if self.refresh_interval.is_zero() {
            return Err(ThvError::config("refresh interval must be positive"));
        }
        if self.fetch_timeout.is_zero() {
            return Err(ThvError::config("fetch timeout must be positive"));
        }
        if self.subscriber_queue == 0 {
            return Err(ThvError::config("subscriber queue must hold at least one push"));
        }
        if !(self.sim_step_stddev >= 0.0) || !self.sim_step_stddev.is_finite() {
            return Err(ThvError::config("simulation step must be a finite non-negative number"));
        }
        self.pricing
            .validate()
            .map_err(|e| ThvError::config(e.to_string()))
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> ThvResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ThvError::config(format!("invalid {key} {raw:?}: {e}"))),
    }
}
