//! Configuration Module
//!
//! Handles loading and validating cache configuration.

use std::env;
use std::time::Duration;

use crate::cache::{DEFAULT_GETS_PER_PROMOTE, DEFAULT_QUEUE_CAPACITY, DEFAULT_SHARD_COUNT};
use crate::error::{CacheError, Result};

/// Cache configuration parameters.
///
/// All values can be loaded from environment variables with sensible
/// defaults, or set directly before being passed to `Cache::with_config`.
#[derive(Debug, Clone)]
pub struct Config {
    /// How long an entry survives after its last touch before it becomes
    /// eligible for eviction
    pub active_period: Duration,
    /// How long after creation/replacement an entry is served without a
    /// refresh from the upstream source
    pub available_period: Duration,
    /// Number of independently locked shards (must be a power of two)
    pub shard_count: usize,
    /// Number of gets a linked entry absorbs before a promotion actually
    /// reorders the recency list
    pub gets_per_promote: u32,
    /// Capacity of the removal and promotion queues
    pub queue_capacity: usize,
    /// Interval between background sweeps; defaults to half the active
    /// period when unset
    pub sweep_interval: Option<Duration>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `ACTIVE_PERIOD_SECS` - Active period in seconds (default: 300)
    /// - `AVAILABLE_PERIOD_SECS` - Available period in seconds (default: 30)
    /// - `SHARD_COUNT` - Number of shards (default: 16)
    /// - `GETS_PER_PROMOTE` - Promotion throttle threshold (default: 10)
    /// - `QUEUE_CAPACITY` - Removal/promotion queue capacity (default: 1024)
    /// - `SWEEP_INTERVAL_MS` - Sweep interval in milliseconds (default: half
    ///   the active period)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            active_period: env::var("ACTIVE_PERIOD_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.active_period),
            available_period: env::var("AVAILABLE_PERIOD_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.available_period),
            shard_count: env::var("SHARD_COUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.shard_count),
            gets_per_promote: env::var("GETS_PER_PROMOTE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.gets_per_promote),
            queue_capacity: env::var("QUEUE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.queue_capacity),
            sweep_interval: env::var("SWEEP_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis),
        }
    }

    /// Creates a Config with the given periods and default tuning values.
    pub fn with_periods(active_period: Duration, available_period: Duration) -> Self {
        Self {
            active_period,
            available_period,
            ..Self::default()
        }
    }

    /// Validates the configuration.
    ///
    /// An entry must become stale no later than it becomes eligible for
    /// eviction, so the available period may not exceed the active period.
    ///
    /// # Errors
    /// Returns `CacheError::InvalidConfig` when any parameter is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.available_period > self.active_period {
            return Err(CacheError::InvalidConfig(
                "the active period must be at least as long as the available period".to_string(),
            ));
        }
        if self.active_period.is_zero() {
            return Err(CacheError::InvalidConfig(
                "the active period must be non-zero".to_string(),
            ));
        }
        if self.shard_count == 0 || !self.shard_count.is_power_of_two() {
            return Err(CacheError::InvalidConfig(format!(
                "shard count must be a non-zero power of two, got {}",
                self.shard_count
            )));
        }
        if self.queue_capacity == 0 {
            return Err(CacheError::InvalidConfig(
                "queue capacity must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the effective sweep interval: the configured one, or half the
    /// active period.
    pub fn effective_sweep_interval(&self) -> Duration {
        self.sweep_interval
            .unwrap_or_else(|| (self.active_period / 2).max(Duration::from_millis(1)))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            active_period: Duration::from_secs(300),
            available_period: Duration::from_secs(30),
            shard_count: DEFAULT_SHARD_COUNT,
            gets_per_promote: DEFAULT_GETS_PER_PROMOTE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            sweep_interval: None,
        }
    }
}
