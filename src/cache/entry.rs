//! Cache Entry Module
//!
//! Defines the unit of cached state: a value, its two deadlines, and the
//! recency bookkeeping used by the coordinator.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Slot value of an entry that has never been linked into the recency list.
pub(crate) const UNLINKED_SLOT: usize = usize::MAX;

/// Slot value marking an entry that has been unlinked from the recency list.
pub(crate) const REMOVED_SLOT: usize = usize::MAX - 1;

// == Node State ==
/// Position of an entry in the recency list, as seen by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeState {
    /// Not yet linked into the list
    Unlinked,
    /// Linked at the given list slot
    Linked(usize),
    /// Already unlinked; any further promotion is a no-op
    Removed,
}

// == Cache Entry ==
/// A single cached key/value record with its own deadlines.
///
/// Entries are immutable value-holders: replacing a value creates a new
/// entry. The active deadline is the one exception — it is refreshed in
/// place on every successful get, which needs no list coordination because
/// it is a single atomic store (last refresh wins).
pub struct Entry<V> {
    /// The cache key, fixed at creation
    key: String,
    /// The stored value
    value: V,
    /// Eviction deadline (Unix milliseconds); refreshed on every get
    active_deadline: AtomicU64,
    /// Staleness deadline (Unix milliseconds); set only at creation
    available_deadline: u64,
    /// Gets absorbed since the last actual reorder
    promotions: AtomicU32,
    /// Recency list slot; written only by the coordinator after creation
    node: AtomicUsize,
}

impl<V> Entry<V> {
    // == Constructor ==
    /// Creates a new entry whose deadlines start from the current time.
    pub(crate) fn new(key: String, value: V, active_period: Duration, available_period: Duration) -> Self {
        let now = current_timestamp_ms();
        Self {
            key,
            value,
            active_deadline: AtomicU64::new(now + active_period.as_millis() as u64),
            available_deadline: now + available_period.as_millis() as u64,
            promotions: AtomicU32::new(0),
            node: AtomicUsize::new(UNLINKED_SLOT),
        }
    }

    /// Returns the entry's key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns a reference to the stored value.
    pub fn value(&self) -> &V {
        &self.value
    }

    // == Is Inactive ==
    /// Checks whether the entry is eligible for eviction.
    ///
    /// True once the current time has passed the active deadline, i.e. the
    /// entry has not been touched for a full active period.
    pub fn is_inactive(&self) -> bool {
        current_timestamp_ms() > self.active_deadline.load(Ordering::Relaxed)
    }

    // == Is Stale ==
    /// Checks whether the entry needs a refresh from the upstream source.
    ///
    /// True once the current time has passed the available deadline. Unlike
    /// the active deadline, this one is never pushed out by gets.
    pub fn is_stale(&self) -> bool {
        current_timestamp_ms() > self.available_deadline
    }

    /// Returns remaining time before eviction eligibility, in milliseconds.
    ///
    /// Returns 0 once the entry is inactive. Useful for debugging and stats.
    pub fn active_remaining_ms(&self) -> u64 {
        self.active_deadline
            .load(Ordering::Relaxed)
            .saturating_sub(current_timestamp_ms())
    }

    // == Refresh Active Deadline ==
    /// Pushes the active deadline out to `now + active_period`.
    pub(crate) fn refresh_active(&self, active_period: Duration) {
        let deadline = current_timestamp_ms() + active_period.as_millis() as u64;
        self.active_deadline.store(deadline, Ordering::Relaxed);
    }

    // == Recency Bookkeeping ==
    /// Returns the entry's position in the recency list.
    pub(crate) fn node_state(&self) -> NodeState {
        match self.node.load(Ordering::Relaxed) {
            UNLINKED_SLOT => NodeState::Unlinked,
            REMOVED_SLOT => NodeState::Removed,
            slot => NodeState::Linked(slot),
        }
    }

    /// Records the list slot this entry was linked at.
    pub(crate) fn link(&self, slot: usize) {
        self.node.store(slot, Ordering::Relaxed);
    }

    /// Marks the entry as removed from the list.
    pub(crate) fn mark_removed(&self) {
        self.node.store(REMOVED_SLOT, Ordering::Relaxed);
    }

    /// Counts one more get against the promotion throttle and returns the
    /// new count.
    pub(crate) fn bump_promotions(&self) -> u32 {
        self.promotions.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Resets the throttle counter after an actual reorder.
    pub(crate) fn reset_promotions(&self) {
        self.promotions.store(0, Ordering::Relaxed);
    }
}

impl<V> fmt::Debug for Entry<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("key", &self.key)
            .field("active_deadline", &self.active_deadline.load(Ordering::Relaxed))
            .field("available_deadline", &self.available_deadline)
            .field("promotions", &self.promotions.load(Ordering::Relaxed))
            .field("node", &self.node_state())
            .finish()
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub(crate) fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64
}
