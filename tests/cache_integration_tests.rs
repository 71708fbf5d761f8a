//! Integration Tests for the Cache
//!
//! Drives the full engine through its public surface: construction
//! validation, the two-tier TTL timeline, background sweeping, and
//! concurrent write storms.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tierkv::{Cache, CacheError, Config, Entry, Refresher};

// == Helper Functions ==

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tierkv=debug".into()),
        )
        .try_init();
}

fn echo() -> impl Fn(&Entry<String>) -> String + Send + Sync {
    |stale: &Entry<String>| stale.value().clone()
}

/// Refresher standing in for the upstream source, counting its calls.
struct Upstream {
    calls: AtomicU64,
    produce: String,
}

impl Upstream {
    fn new(produce: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU64::new(0),
            produce: produce.to_string(),
        })
    }
}

/// Shareable refresher handle. The orphan rule forbids implementing the
/// foreign `Refresher` trait directly for `Arc<Upstream>` from this external
/// test crate, so a local newtype carries the impl; behavior is unchanged.
struct SharedUpstream(Arc<Upstream>);

#[async_trait]
impl Refresher<String> for SharedUpstream {
    async fn refresh(&self, _stale: &Entry<String>) -> String {
        self.0.calls.fetch_add(1, Ordering::Relaxed);
        self.0.produce.clone()
    }
}

// == Construction ==

#[tokio::test]
async fn test_construction_validates_periods() {
    init_tracing();

    assert!(Cache::new(Duration::from_secs(20), Duration::from_secs(2), echo()).is_ok());

    let result = Cache::new(Duration::from_secs(2), Duration::from_secs(20), echo());
    assert!(matches!(result, Err(CacheError::InvalidConfig(_))));
}

// == Basic Semantics ==

#[tokio::test]
async fn test_last_set_wins() {
    init_tracing();
    let cache = Cache::new(Duration::from_secs(20), Duration::from_secs(2), echo()).unwrap();

    cache.set("user:1", "a".to_string()).await.unwrap();
    cache.set("user:1", "b".to_string()).await.unwrap();

    let entry = cache.get("user:1").await.unwrap().expect("live entry");
    assert_eq!(entry.value(), "b");
}

#[tokio::test]
async fn test_get_unknown_key_is_absent() {
    init_tracing();
    let cache = Cache::new(Duration::from_secs(20), Duration::from_secs(2), echo()).unwrap();

    assert!(cache.get("user:404").await.unwrap().is_none());
}

// == Two-Tier TTL Timeline ==

#[tokio::test]
async fn test_two_tier_ttl_timeline() {
    init_tracing();
    // active 400ms, available 250ms, background sweep every 100ms
    let upstream = Upstream::new("refreshed");
    let config = Config {
        active_period: Duration::from_millis(400),
        available_period: Duration::from_millis(250),
        sweep_interval: Some(Duration::from_millis(100)),
        ..Config::default()
    };
    let cache = Cache::with_config(config, SharedUpstream(upstream.clone())).unwrap();

    cache.set("k", "v".to_string()).await.unwrap();

    // within the available period: served as-is, upstream untouched
    tokio::time::sleep(Duration::from_millis(100)).await;
    let entry = cache.get("k").await.unwrap().expect("still available");
    assert_eq!(entry.value(), "v");
    assert_eq!(upstream.calls.load(Ordering::Relaxed), 0);

    // past the available period: exactly one refresh, value replaced
    tokio::time::sleep(Duration::from_millis(250)).await;
    let entry = cache.get("k").await.unwrap().expect("refreshed, not evicted");
    assert_eq!(entry.value(), "refreshed");
    assert_eq!(upstream.calls.load(Ordering::Relaxed), 1);

    // untouched past the active period: the sweep reclaims it
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(cache.get("k").await.unwrap().is_none());
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn test_gets_defer_eviction_but_not_staleness() {
    init_tracing();
    let upstream = Upstream::new("fresh");
    let config = Config {
        active_period: Duration::from_millis(300),
        available_period: Duration::from_millis(150),
        sweep_interval: Some(Duration::from_secs(60)),
        ..Config::default()
    };
    let cache = Cache::with_config(config, SharedUpstream(upstream.clone())).unwrap();

    cache.set("k", "v".to_string()).await.unwrap();

    // a get inside the available window refreshes the active deadline only
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        cache.get("k").await.unwrap().expect("available").value(),
        "v"
    );

    // 100ms later the entry is past its (unrefreshed) available deadline
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        cache.get("k").await.unwrap().expect("stale but active").value(),
        "fresh"
    );
    assert_eq!(upstream.calls.load(Ordering::Relaxed), 1);
}

// == Sweep ==

#[tokio::test]
async fn test_bulk_insert_fully_reclaimed() {
    init_tracing();
    let config = Config {
        active_period: Duration::from_millis(200),
        available_period: Duration::from_millis(100),
        // keep the background sweep out of the way; the test drives its own
        sweep_interval: Some(Duration::from_secs(60)),
        ..Config::default()
    };
    let cache = Cache::with_config(config, echo()).unwrap();

    for i in 0..1000 {
        cache.set(&format!("key:{i}"), format!("value:{i}")).await.unwrap();
    }
    cache.sync().await.unwrap();
    assert_eq!(cache.len().await, 1000);

    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(cache.sweep_now().await.unwrap(), 1000);
    assert!(cache.is_empty().await);
    assert_eq!(cache.stats().await.evictions, 1000);
}

#[tokio::test]
async fn test_background_sweep_reclaims_without_help() {
    init_tracing();
    let config = Config {
        active_period: Duration::from_millis(150),
        available_period: Duration::from_millis(100),
        sweep_interval: Some(Duration::from_millis(50)),
        ..Config::default()
    };
    let cache = Cache::with_config(config, echo()).unwrap();

    for i in 0..50 {
        cache.set(&format!("key:{i}"), "v".to_string()).await.unwrap();
    }

    tokio::time::sleep(Duration::from_millis(400)).await;

    assert!(cache.is_empty().await);
    assert!(cache.get("key:0").await.unwrap().is_none());
}

// == Write Storms ==

#[tokio::test]
async fn test_sequential_set_storm_converges_to_one_entry() {
    init_tracing();
    let config = Config {
        active_period: Duration::from_millis(150),
        available_period: Duration::from_millis(150),
        sweep_interval: Some(Duration::from_secs(60)),
        ..Config::default()
    };
    let cache = Cache::with_config(config, echo()).unwrap();

    for i in 0..500 {
        cache.set("user:1", format!("v{i}")).await.unwrap();
    }
    cache.sync().await.unwrap();

    assert_eq!(cache.len().await, 1);
    assert_eq!(
        cache.get("user:1").await.unwrap().expect("live").value(),
        "v499"
    );

    // exactly one recency node survived the storm: the sweep reclaims
    // exactly one entry once the key goes inactive
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(cache.sweep_now().await.unwrap(), 1);
    assert!(cache.is_empty().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_set_storm_no_loss() {
    init_tracing();
    let cache = Arc::new(
        Cache::new(Duration::from_secs(20), Duration::from_secs(20), echo()).unwrap(),
    );

    let mut handles = Vec::new();
    for task in 0..8 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..250 {
                let key = format!("key:{}", i % 25);
                cache.set(&key, format!("{task}:{i}")).await.unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    cache.sync().await.unwrap();
    assert_eq!(cache.len().await, 25);
    for i in 0..25 {
        assert!(cache.get(&format!("key:{i}")).await.unwrap().is_some());
    }
}

// == Lifecycle ==

#[tokio::test]
async fn test_close_stops_the_cache() {
    init_tracing();
    let cache = Cache::new(Duration::from_secs(20), Duration::from_secs(2), echo()).unwrap();
    cache.set("user:1", "steve".to_string()).await.unwrap();

    cache.close();

    assert!(matches!(cache.get("user:1").await, Err(CacheError::Closed)));
    assert!(matches!(
        cache.set("user:1", "x".to_string()).await,
        Err(CacheError::Closed)
    ));
    assert!(matches!(cache.sync().await, Err(CacheError::Closed)));
}

// == Stats ==

#[tokio::test]
async fn test_stats_reflect_traffic() {
    init_tracing();
    let cache = Cache::new(Duration::from_secs(20), Duration::from_secs(2), echo()).unwrap();

    cache.set("a", "1".to_string()).await.unwrap();
    cache.get("a").await.unwrap();
    cache.get("a").await.unwrap();
    cache.get("missing").await.unwrap();

    let stats = cache.stats().await;
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.entries, 1);
    assert!((stats.hit_rate() - 2.0 / 3.0).abs() < f64::EPSILON);
}
