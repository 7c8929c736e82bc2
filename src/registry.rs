//! Input registry guarded by the combiner's coordination lock.
//!
//! The registry owns the list of live inputs and the cached maximum priority. Every mutation
//! (registration, eviction, selection) goes through `&mut Registry`, so holding the combiner's
//! mutex is the only synchronisation needed between them.

use crate::config::millis;
use crate::priority::Priority;
use crate::queue::InputQueue;
use crate::selection::stochastic_acceptance;
use rand::Rng;
use std::sync::Arc;
use std::time::Instant;

/// Result of one eviction scan.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub(crate) struct ScanOutcome {
    pub(crate) evicted: usize,
    pub(crate) max_recomputed: bool,
}

pub(crate) struct Registry<T> {
    queues: Vec<Arc<InputQueue<T>>>,
    max_weight: Priority,
}

impl<T> Registry<T> {
    pub(crate) fn new() -> Self {
        Self {
            queues: Vec::new(),
            max_weight: Priority::ZERO,
        }
    }

    pub(crate) fn register(&mut self, queue: Arc<InputQueue<T>>) {
        self.max_weight = self.max_weight.max(queue.priority());
        self.queues.push(queue);
    }

    pub(crate) fn len(&self) -> usize {
        self.queues.len()
    }

    pub(crate) fn max_weight(&self) -> Priority {
        self.max_weight
    }

    /// Draw one value from a non-empty input chosen by weight.
    pub(crate) fn poll_next<R: Rng>(&mut self, rng: &mut R) -> Option<T> {
        let candidates: Vec<&Arc<InputQueue<T>>> =
            self.queues.iter().filter(|queue| !queue.is_empty()).collect();
        if candidates.is_empty() {
            return None;
        }

        let weights: Vec<Priority> = candidates.iter().map(|queue| queue.priority()).collect();
        let index = stochastic_acceptance(&weights, self.max_weight, rng)?;
        candidates[index].pop()
    }

    /// Advance every idle clock to `now` and drop the inputs that timed out.
    ///
    /// The cached maximum is recomputed only when an evicted input held it, or when an input
    /// that its owner removed still holds it.
    pub(crate) fn scan(&mut self, now: Instant) -> ScanOutcome {
        let max_weight = self.max_weight;
        let mut outcome = ScanOutcome::default();
        let mut max_holder_gone = false;

        self.queues.retain(|queue| {
            queue.recalculate_idle(now);
            if queue.is_timed_out() {
                queue.mark_removed();
                if queue.priority() == max_weight {
                    max_holder_gone = true;
                }
                tracing::debug!(
                    priority = queue.priority().get(),
                    idle_ms = millis(queue.idle_for()),
                    timeout_ms = millis(queue.idle_timeout()),
                    "evicting idle input"
                );
                outcome.evicted += 1;
                false
            } else {
                if queue.is_removed() && queue.priority() == max_weight {
                    max_holder_gone = true;
                }
                true
            }
        });

        if max_holder_gone {
            self.max_weight = self.recompute_max();
            outcome.max_recomputed = true;
        }
        outcome
    }

    fn recompute_max(&self) -> Priority {
        self.queues
            .iter()
            .filter(|queue| !queue.is_removed())
            .fold(Priority::ZERO, |max, queue| max.max(queue.priority()))
    }
}
