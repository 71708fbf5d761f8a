//! Coordinator Module
//!
//! The single writer for the recency list. Every link, unlink, and reorder
//! happens on this one task, driven by bounded queues, so the list itself
//! needs no lock. Callers communicate only by enqueueing entries; they never
//! touch list state directly.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

use crate::cache::entry::NodeState;
use crate::cache::list::RecencyList;
use crate::cache::shard::ShardMap;
use crate::cache::stats::StatsCounters;
use crate::cache::Entry;

// == Control Messages ==
/// Out-of-band commands consumed alongside the removal/promotion queues.
#[derive(Debug)]
pub(crate) enum Control {
    /// Run one sweep cycle; reply with the eviction count if a sender is
    /// attached
    Sweep { done: Option<oneshot::Sender<usize>> },
    /// Apply everything already enqueued on both queues, then reply with the
    /// number of linked entries
    Drain { done: oneshot::Sender<usize> },
}

// == Coordinator ==
/// Owns the recency list and applies queued mutations one at a time.
///
/// Per-entry state machine: an unlinked entry is linked at the front on its
/// first promotion; a linked entry counts promotions and only reorders past
/// the throttle threshold; a removal unlinks the entry and marks it, after
/// which any further promotion is a no-op.
pub(crate) struct Coordinator<V> {
    list: RecencyList<V>,
    shards: Arc<ShardMap<V>>,
    stats: Arc<StatsCounters>,
    gets_per_promote: u32,
}

impl<V: Send + Sync + 'static> Coordinator<V> {
    // == Constructor ==
    pub(crate) fn new(shards: Arc<ShardMap<V>>, stats: Arc<StatsCounters>, gets_per_promote: u32) -> Self {
        Self {
            list: RecencyList::new(),
            shards,
            stats,
            gets_per_promote,
        }
    }

    // == Run Loop ==
    /// Consumes the queues until every sender is gone.
    ///
    /// `tokio::select!` picks whichever queue has a ready message; there is
    /// no fixed priority between them. Exactly one message is processed at a
    /// time, which is the whole synchronization story for the list.
    pub(crate) async fn run(
        mut self,
        mut removal_rx: mpsc::Receiver<Arc<Entry<V>>>,
        mut promotion_rx: mpsc::Receiver<Arc<Entry<V>>>,
        mut control_rx: mpsc::Receiver<Control>,
    ) {
        debug!("coordinator started");
        loop {
            tokio::select! {
                message = removal_rx.recv() => match message {
                    Some(entry) => self.apply_removal(entry),
                    None => break,
                },
                message = promotion_rx.recv() => match message {
                    Some(entry) => self.apply_promotion(entry),
                    None => break,
                },
                message = control_rx.recv() => match message {
                    Some(Control::Sweep { done }) => {
                        let evicted = self.sweep().await;
                        if let Some(done) = done {
                            let _ = done.send(evicted);
                        }
                    }
                    Some(Control::Drain { done }) => {
                        self.drain(&mut removal_rx, &mut promotion_rx);
                        let _ = done.send(self.list.len());
                    }
                    None => break,
                },
            }
        }
        debug!("coordinator stopped");
    }

    // == Removal ==
    /// Unlinks an entry that a set has superseded.
    fn apply_removal(&mut self, entry: Arc<Entry<V>>) {
        match entry.node_state() {
            // removal raced ahead of the link; the pending promotion must
            // find the entry already retired
            NodeState::Unlinked => entry.mark_removed(),
            NodeState::Linked(slot) => {
                self.list.unlink(slot);
                entry.mark_removed();
            }
            NodeState::Removed => {
                trace!(key = entry.key(), "duplicate removal ignored");
            }
        }
    }

    // == Promotion ==
    /// Links a new entry or counts a get against the reorder throttle.
    ///
    /// A promotion for an already-removed entry is skipped and processing
    /// continues: a get can read an entry just as a set replaces it, and the
    /// late promotion must not resurrect the old entry or stop the loop.
    fn apply_promotion(&mut self, entry: Arc<Entry<V>>) {
        match entry.node_state() {
            NodeState::Removed => {
                trace!(key = entry.key(), "promotion for removed entry skipped");
            }
            NodeState::Unlinked => {
                let slot = self.list.push_front(entry.clone());
                entry.link(slot);
            }
            NodeState::Linked(slot) => {
                if entry.bump_promotions() > self.gets_per_promote {
                    self.list.move_to_front(slot);
                    entry.reset_promotions();
                }
            }
        }
    }

    // == Sweep ==
    /// Walks the list from the tail, evicting inactive entries.
    ///
    /// Stops at the first entry still active. Promotion throttling means the
    /// tail order only approximates recency, so an inactive entry can hide
    /// ahead of an active one until a later cycle reaches it.
    async fn sweep(&mut self) -> usize {
        let mut evicted = 0;
        while let Some(entry) = self.list.back().cloned() {
            if !entry.is_inactive() {
                break;
            }
            let slot = match entry.node_state() {
                NodeState::Linked(slot) => slot,
                _ => break,
            };
            self.list.unlink(slot);
            entry.mark_removed();
            self.shards.remove_if_same(&entry).await;
            self.stats.record_eviction();
            evicted += 1;
        }
        if evicted > 0 {
            debug!(evicted, "sweep reclaimed inactive entries");
        } else {
            trace!("sweep found nothing to reclaim");
        }
        evicted
    }

    // == Drain ==
    /// Applies every message already sitting in the two queues.
    ///
    /// Used as a barrier: once this returns, all mutations enqueued before
    /// the drain request have reached the list (assuming quiescent senders).
    fn drain(
        &mut self,
        removal_rx: &mut mpsc::Receiver<Arc<Entry<V>>>,
        promotion_rx: &mut mpsc::Receiver<Arc<Entry<V>>>,
    ) {
        loop {
            let mut progressed = false;
            while let Ok(entry) = removal_rx.try_recv() {
                self.apply_removal(entry);
                progressed = true;
            }
            while let Ok(entry) = promotion_rx.try_recv() {
                self.apply_promotion(entry);
                progressed = true;
            }
            if !progressed {
                break;
            }
        }
    }
}
