//! Shard Map Module
//!
//! Partitions the key space across independently locked maps so that
//! operations on different shards never contend.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::cache::Entry;

// == Shard Map ==
/// A fixed set of key→entry maps, each behind its own lock.
///
/// A key routes to exactly one shard for the cache's lifetime (the shard
/// count is fixed at construction), so per-shard mutual exclusion is all the
/// synchronization a key ever needs. The shard holds the only owning
/// reference to an entry; the recency list sees `Arc` clones used purely for
/// ordering and eviction scanning.
#[derive(Debug)]
pub(crate) struct ShardMap<V> {
    shards: Vec<RwLock<HashMap<String, Arc<Entry<V>>>>>,
    /// `shard_count - 1`; valid because the count is a power of two
    mask: usize,
}

impl<V> ShardMap<V> {
    // == Constructor ==
    /// Creates a shard map with `shard_count` shards.
    ///
    /// The count must be a non-zero power of two, which `Config::validate`
    /// guarantees before construction.
    pub(crate) fn new(shard_count: usize) -> Self {
        let shards = (0..shard_count).map(|_| RwLock::new(HashMap::new())).collect();
        Self {
            shards,
            mask: shard_count - 1,
        }
    }

    // == Route ==
    /// Maps a key to its shard index, deterministically for this map.
    pub(crate) fn route(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) & self.mask
    }

    // == Load ==
    /// Returns the live entry for `key`, if any.
    pub(crate) async fn load(&self, key: &str) -> Option<Arc<Entry<V>>> {
        self.shards[self.route(key)].read().await.get(key).cloned()
    }

    // == Swap ==
    /// Stores `entry` under `key` and returns the entry it superseded.
    ///
    /// Runs under a single write-lock acquisition so the caller observes
    /// exactly the entry it replaced, even under racing sets.
    pub(crate) async fn swap(&self, key: String, entry: Arc<Entry<V>>) -> Option<Arc<Entry<V>>> {
        self.shards[self.route(&key)].write().await.insert(key, entry)
    }

    // == Remove If Same ==
    /// Removes `entry`'s key, but only while the shard still holds this
    /// exact entry.
    ///
    /// The sweep can race a replacement set: the list may still reference a
    /// just-superseded entry whose key now maps to a fresh one. Comparing by
    /// pointer identity keeps the sweep from deleting the replacement.
    pub(crate) async fn remove_if_same(&self, entry: &Arc<Entry<V>>) -> bool {
        let mut shard = self.shards[self.route(entry.key())].write().await;
        match shard.get(entry.key()) {
            Some(current) if Arc::ptr_eq(current, entry) => {
                shard.remove(entry.key());
                true
            }
            _ => false,
        }
    }

    // == Length ==
    /// Returns the number of live entries across all shards.
    pub(crate) async fn len(&self) -> usize {
        let mut total = 0;
        for shard in &self.shards {
            total += shard.read().await.len();
        }
        total
    }
}
