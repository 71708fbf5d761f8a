//! Cache Store Module
//!
//! The public cache facade: construction, get/set, and lifecycle. Combines
//! the sharded store with the coordinator actor and the background sweep.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::info;

use crate::cache::coordinator::{Control, Coordinator};
use crate::cache::refresh::Refresher;
use crate::cache::shard::ShardMap;
use crate::cache::stats::{CacheStats, StatsCounters};
use crate::cache::Entry;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::tasks::spawn_sweep_task;

/// Capacity of the control queue (sweep ticks and drain barriers).
const CONTROL_QUEUE_CAPACITY: usize = 16;

// == Cache ==
/// A concurrency-safe key/value cache with two-tier TTL and LRU eviction.
///
/// Reads and writes touch a shard map directly (lock-scoped to one shard)
/// and post messages to the coordinator, which asynchronously maintains the
/// recency list the background sweep walks. Neither `get` nor `set` ever
/// blocks on list mutation — only, briefly, on a full queue.
///
/// `V` is the cached payload; `R` is the collaborator that produces a fresh
/// value when a stale entry is read.
#[derive(Debug)]
pub struct Cache<V, R> {
    shards: Arc<ShardMap<V>>,
    removal_tx: mpsc::Sender<Arc<Entry<V>>>,
    promotion_tx: mpsc::Sender<Arc<Entry<V>>>,
    control_tx: mpsc::Sender<Control>,
    refresher: R,
    active_period: Duration,
    available_period: Duration,
    stats: Arc<StatsCounters>,
    closed: AtomicBool,
    coordinator_task: JoinHandle<()>,
    sweep_task: JoinHandle<()>,
}

impl<V, R> Cache<V, R>
where
    V: Send + Sync + 'static,
    R: Refresher<V>,
{
    // == Constructor ==
    /// Creates a cache with the given periods and default tuning values.
    ///
    /// Must be called from within a tokio runtime: construction spawns the
    /// coordinator and sweep tasks.
    ///
    /// # Errors
    /// Returns `CacheError::InvalidConfig` when `available_period` exceeds
    /// `active_period`.
    pub fn new(active_period: Duration, available_period: Duration, refresher: R) -> Result<Self> {
        Self::with_config(Config::with_periods(active_period, available_period), refresher)
    }

    /// Creates a cache from a full configuration.
    pub fn with_config(config: Config, refresher: R) -> Result<Self> {
        config.validate()?;

        let shards = Arc::new(ShardMap::new(config.shard_count));
        let stats = Arc::new(StatsCounters::default());

        let (removal_tx, removal_rx) = mpsc::channel(config.queue_capacity);
        let (promotion_tx, promotion_rx) = mpsc::channel(config.queue_capacity);
        let (control_tx, control_rx) = mpsc::channel(CONTROL_QUEUE_CAPACITY);

        let coordinator = Coordinator::new(shards.clone(), stats.clone(), config.gets_per_promote);
        let coordinator_task = tokio::spawn(coordinator.run(removal_rx, promotion_rx, control_rx));

        let sweep_interval = config.effective_sweep_interval();
        let sweep_task = spawn_sweep_task(control_tx.clone(), sweep_interval);

        info!(
            active_period_ms = config.active_period.as_millis() as u64,
            available_period_ms = config.available_period.as_millis() as u64,
            shard_count = config.shard_count,
            sweep_interval_ms = sweep_interval.as_millis() as u64,
            "cache started"
        );

        Ok(Self {
            shards,
            removal_tx,
            promotion_tx,
            control_tx,
            refresher,
            active_period: config.active_period,
            available_period: config.available_period,
            stats,
            closed: AtomicBool::new(false),
            coordinator_task,
            sweep_task,
        })
    }

    // == Get ==
    /// Retrieves the entry for `key`, refreshing it from upstream if stale.
    ///
    /// A missing key is `Ok(None)`. A stale entry triggers the refresher and
    /// is replaced via `set`; a fresh one gets its active deadline pushed
    /// out in place. Either way the resulting entry is promoted.
    ///
    /// # Errors
    /// Returns `CacheError::Closed` after `close`.
    pub async fn get(&self, key: &str) -> Result<Option<Arc<Entry<V>>>> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(CacheError::Closed);
        }

        let Some(entry) = self.shards.load(key).await else {
            self.stats.record_miss();
            return Ok(None);
        };

        let entry = if entry.is_stale() {
            self.stats.record_refresh();
            let value = self.refresher.refresh(&entry).await;
            self.set(key, value).await?
        } else {
            entry.refresh_active(self.active_period);
            entry
        };

        self.promote(entry.clone()).await?;
        self.stats.record_hit();
        Ok(Some(entry))
    }

    // == Set ==
    /// Stores `value` under `key`, replacing any existing entry.
    ///
    /// The superseded entry, if any, is enqueued for removal from the
    /// recency list; the new entry is enqueued for linking. Both queues are
    /// bounded and the sends block when full rather than dropping — losing
    /// either message would leave the list inconsistent with the shard.
    ///
    /// # Errors
    /// Returns `CacheError::Closed` after `close`.
    pub async fn set(&self, key: &str, value: V) -> Result<Arc<Entry<V>>> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(CacheError::Closed);
        }

        let entry = Arc::new(Entry::new(
            key.to_string(),
            value,
            self.active_period,
            self.available_period,
        ));

        if let Some(old) = self.shards.swap(key.to_string(), entry.clone()).await {
            self.removal_tx
                .send(old)
                .await
                .map_err(|_| CacheError::Closed)?;
        }

        self.promote(entry.clone()).await?;
        Ok(entry)
    }

    // == Sync ==
    /// Waits until the coordinator has applied every removal and promotion
    /// enqueued before this call.
    ///
    /// A barrier for callers (and tests) that need the recency list caught
    /// up with the shard maps.
    pub async fn sync(&self) -> Result<()> {
        let (done, ready) = oneshot::channel();
        self.control_tx
            .send(Control::Drain { done })
            .await
            .map_err(|_| CacheError::Closed)?;
        ready.await.map_err(|_| CacheError::Closed)?;
        Ok(())
    }

    // == Sweep Now ==
    /// Runs one sweep cycle immediately and returns the number of entries
    /// evicted.
    pub async fn sweep_now(&self) -> Result<usize> {
        let (done, evicted) = oneshot::channel();
        self.control_tx
            .send(Control::Sweep { done: Some(done) })
            .await
            .map_err(|_| CacheError::Closed)?;
        evicted.await.map_err(|_| CacheError::Closed)
    }

    // == Length ==
    /// Returns the current number of live entries.
    pub async fn len(&self) -> usize {
        self.shards.len().await
    }

    /// Returns true if the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    // == Stats ==
    /// Returns a snapshot of cache statistics.
    pub async fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.shards.len().await)
    }

    // == Close ==
    /// Stops both background tasks and fails all further operations with
    /// `CacheError::Closed`. Idempotent; also run on drop.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::Relaxed) {
            return;
        }
        self.coordinator_task.abort();
        self.sweep_task.abort();
        info!("cache closed");
    }

    async fn promote(&self, entry: Arc<Entry<V>>) -> Result<()> {
        self.promotion_tx
            .send(entry)
            .await
            .map_err(|_| CacheError::Closed)
    }
}

impl<V, R> Drop for Cache<V, R> {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Relaxed);
        self.coordinator_task.abort();
        self.sweep_task.abort();
    }
}
