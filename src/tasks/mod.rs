//! Background Tasks Module
//!
//! Long-lived tasks that run for the cache's lifetime.
//!
//! # Tasks
//! - Sweep trigger: asks the coordinator to reclaim inactive entries at a
//!   fixed interval

mod sweep;

pub(crate) use sweep::spawn_sweep_task;
