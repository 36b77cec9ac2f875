//! Broadcast Hub
//!
//! Each subscriber is a bounded mpsc queue. A tick builds one snapshot,
//! copies the membership, offers the snapshot to every queue without
//! waiting, then prunes the queues whose receiver is gone.
//!
//! `subscribe`, `tick` and `close_all` all run under one delivery gate, so
//! a subscriber's initial snapshot is always queued before any tick that
//! can reach it, and no tick is ever delivered twice or to a removed
//! handle.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use thv_core::{PricingParams, ServerMessage, ThvError, ThvResult};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::snapshot::SnapshotBuilder;

/// Unique identifier for a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SubscriberId(pub u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "subscriber-{}", self.0)
    }
}

/// A push shared between all subscribers of one tick
pub type Outbound = Arc<ServerMessage>;

/// Receiving side of a subscription
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriberId,
    pub receiver: mpsc::Receiver<Outbound>,
}

/// Outcome of one fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub delivered: usize,
    /// Subscribers removed because their receiver was gone
    pub pruned: usize,
    /// Pushes skipped because a subscriber's queue was full
    pub dropped: usize,
}

/// Owns the live subscriber set and pushes snapshots to it
pub struct BroadcastHub {
    builder: SnapshotBuilder,
    params: PricingParams,
    queue_capacity: usize,
    next_id: AtomicU64,
    subscribers: DashMap<SubscriberId, mpsc::Sender<Outbound>>,
    gate: Mutex<()>,
    closed: AtomicBool,
    ticks: AtomicU64,
}

impl BroadcastHub {
    pub fn new(builder: SnapshotBuilder, params: PricingParams, queue_capacity: usize) -> Self {
        Self {
            builder,
            params,
            queue_capacity: queue_capacity.max(1),
            next_id: AtomicU64::new(1),
            subscribers: DashMap::new(),
            gate: Mutex::new(()),
            closed: AtomicBool::new(false),
            ticks: AtomicU64::new(0),
        }
    }

    /// Register a subscriber; its queue already holds an `INITIAL_DATA`
    /// snapshot when this returns
    pub fn subscribe(&self) -> ThvResult<Subscription> {
        let _gate = self.gate.lock();
        if self.closed.load(Ordering::SeqCst) {
            return Err(ThvError::internal("broadcast hub is shut down"));
        }

        let data = self.builder.build(&self.params)?;
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        tx.try_send(Arc::new(ServerMessage::InitialData { data }))
            .map_err(|e| ThvError::internal(format!("failed to queue initial snapshot: {e}")))?;

        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.subscribers.insert(id, tx);
        info!("{} subscribed ({} total)", id, self.subscribers.len());

        Ok(Subscription { id, receiver: rx })
    }

    /// Remove a subscriber; returns whether it was still registered
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.remove(&id).is_some();
        if removed {
            debug!("{} unsubscribed ({} remaining)", id, self.subscribers.len());
        }
        removed
    }

    /// Build one snapshot and offer it to every current subscriber
    pub fn tick(&self) -> ThvResult<TickReport> {
        let mut report = TickReport::default();
        let mut dead = Vec::new();

        {
            let _gate = self.gate.lock();
            if self.subscribers.is_empty() {
                return Ok(report);
            }

            let data = self.builder.build(&self.params)?;
            let message: Outbound = Arc::new(ServerMessage::MarketUpdate {
                data,
                timestamp: Utc::now(),
            });

            let members: Vec<(SubscriberId, mpsc::Sender<Outbound>)> = self
                .subscribers
                .iter()
                .map(|entry| (*entry.key(), entry.value().clone()))
                .collect();

            for (id, tx) in members {
                match tx.try_send(Arc::clone(&message)) {
                    Ok(()) => report.delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        warn!("{} queue full, skipping this update", id);
                        report.dropped += 1;
                    }
                    Err(TrySendError::Closed(_)) => dead.push(id),
                }
            }
            self.ticks.fetch_add(1, Ordering::Relaxed);
        }

        for id in dead {
            if self.subscribers.remove(&id).is_some() {
                debug!("Pruned disconnected {}", id);
                report.pruned += 1;
            }
        }

        Ok(report)
    }

    /// Drop every subscriber handle and refuse new subscriptions
    pub fn close_all(&self) {
        let _gate = self.gate.lock();
        self.closed.store(true, Ordering::SeqCst);
        let count = self.subscribers.len();
        self.subscribers.clear();
        info!("Broadcast hub closed, released {} subscribers", count);
    }

    /// Tick every `period` until `token` is cancelled
    pub async fn run(self: Arc<Self>, period: Duration, token: CancellationToken) {
        info!("Starting broadcast hub with {:?} period", period);

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.tick() {
                Ok(report) if report.pruned > 0 || report.dropped > 0 => {
                    debug!("Broadcast tick: {:?}", report);
                }
                Ok(_) => {}
                Err(e) => error!("Failed to build broadcast snapshot: {}", e),
            }
        }

        info!("Broadcast hub stopped");
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_subscribed(&self, id: SubscriberId) -> bool {
        self.subscribers.contains_key(&id)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Completed fan-outs since startup
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn params(&self) -> &PricingParams {
        &self.params
    }
}

impl std::fmt::Debug for BroadcastHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("subscribers", &self.subscriber_count())
            .field("ticks", &self.tick_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}
