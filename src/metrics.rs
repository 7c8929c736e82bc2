//! Combiner counters and the snapshot handed to callers.
//!
//! Counters are plain relaxed atomics bumped on the poll and scan paths; a snapshot copies them
//! together with the registry figures read under the coordination lock.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time view of a combiner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CombinerStats {
    /// Inputs currently held by the registry.
    pub registered_inputs: usize,
    /// Cached maximum priority used as the acceptance reference.
    pub max_weight: f64,
    /// Inputs registered since construction.
    pub total_added: u64,
    /// Inputs dropped by the eviction scan.
    pub total_evicted: u64,
    /// Values handed to consumers.
    pub total_polled: u64,
    /// Delayed retries scheduled by `poll_timeout`.
    pub delayed_retries: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub(crate) added: AtomicU64,
    pub(crate) evicted: AtomicU64,
    pub(crate) polled: AtomicU64,
    pub(crate) delayed_retries: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn bump(counter: &AtomicU64, delta: u64) {
        if delta > 0 {
            counter.fetch_add(delta, Ordering::Relaxed);
        }
    }

    /// Copy the counters into a [`CombinerStats`].
    ///
    /// # Arguments
    /// * `registered_inputs` - registry size read under the coordination lock
    /// * `max_weight` - cached maximum read under the same lock
    pub(crate) fn snapshot(&self, registered_inputs: usize, max_weight: f64) -> CombinerStats {
        CombinerStats {
            registered_inputs,
            max_weight,
            total_added: self.added.load(Ordering::Relaxed),
            total_evicted: self.evicted.load(Ordering::Relaxed),
            total_polled: self.polled.load(Ordering::Relaxed),
            delayed_retries: self.delayed_retries.load(Ordering::Relaxed),
        }
    }
}
