//! Refresh Collaborator Module
//!
//! The seam to the authoritative upstream source. When a get finds a stale
//! entry, the cache asks the refresher for a replacement value and stores it
//! with a set; the refresher itself never mutates cache state.

use async_trait::async_trait;

use crate::cache::Entry;

// == Refresher Trait ==
/// Produces a replacement value for a stale entry.
///
/// Implementations typically call out to a remote configuration or
/// user-attribute service. The stale entry is provided for its key, old
/// value, and deadlines; the returned value is stored by the cache under the
/// same key with fresh deadlines.
#[async_trait]
pub trait Refresher<V>: Send + Sync {
    /// Fetches the current value for a stale entry.
    async fn refresh(&self, stale: &Entry<V>) -> V;
}

// == Closure Implementation ==
/// Any plain `Fn(&Entry<V>) -> V` works as a refresher, which keeps tests
/// and simple synchronous upstreams free of boilerplate.
#[async_trait]
impl<V, F> Refresher<V> for F
where
    V: Send + Sync,
    F: Fn(&Entry<V>) -> V + Send + Sync,
{
    async fn refresh(&self, stale: &Entry<V>) -> V {
        self(stale)
    }
}
