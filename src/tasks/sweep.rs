//! Periodic Sweep Task
//!
//! Background task that triggers a sweep of the recency list on a fixed
//! interval. The walk itself runs on the coordinator, which owns the list;
//! this task only sends the trigger.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::cache::Control;

/// Spawns the sweep trigger task.
///
/// Sends a `Sweep` command to the coordinator every `period`. Exits when the
/// coordinator is gone; aborted by `Cache::close` and on drop.
///
/// # Arguments
/// * `control_tx` - Control queue into the coordinator
/// * `period` - Interval between sweeps (typically half the active period)
pub(crate) fn spawn_sweep_task(control_tx: mpsc::Sender<Control>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(period_ms = period.as_millis() as u64, "sweep task started");

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick of a tokio interval fires immediately; consume it
        // so every sweep waits out a full period
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if control_tx.send(Control::Sweep { done: None }).await.is_err() {
                debug!("coordinator gone, sweep task exiting");
                break;
            }
        }
    })
}
