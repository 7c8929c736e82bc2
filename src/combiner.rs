//! Weighted fan-in combiner.
//!
//! The combiner merges any number of producer inputs into one consumer-facing stream. Each poll
//! picks among the inputs that currently hold values with probability proportional to their
//! priority; a background thread evicts inputs that stay empty past their idle timeout.
//!
//! Threads involved:
//! 1. Producers push into their own input buffer (no registry lock on that path)
//! 2. Consumers poll on their own thread under the registry lock
//! 3. `Combiner-Eviction` scans the registry every `scan_interval` while running
//! 4. `Combiner-Retry` runs the single delayed retry of `poll_timeout` (spawned on first use)

use crate::config::{millis, CombinerConfig};
use crate::error::CombinerError;
use crate::metrics::{CombinerStats, StatsCounters};
use crate::priority::Priority;
use crate::queue::{CombinerInput, InputQueue};
use crate::registry::Registry;
use crate::retry::RetryWorker;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// State shared with the background threads.
struct Shared<T> {
    /// The coordination lock: registration, scans and selection all go through it.
    registry: Mutex<Registry<T>>,
    counters: StatsCounters,
}

impl<T> Shared<T> {
    fn poll_next(&self) -> Option<T> {
        let value = self.registry.lock().poll_next(&mut rand::rng());
        if value.is_some() {
            StatsCounters::bump(&self.counters.polled, 1);
        }
        value
    }

    fn scan(&self) {
        let outcome = self.registry.lock().scan(Instant::now());
        StatsCounters::bump(&self.counters.evicted, outcome.evicted as u64);
        if outcome.max_recomputed {
            tracing::debug!(
                max_weight = self.registry.lock().max_weight().get(),
                "max weight recomputed after eviction"
            );
        }
    }
}

enum Lifecycle {
    Idle,
    Running {
        stop: Sender<()>,
        handle: JoinHandle<()>,
    },
    Stopped,
}

/// Combiner of priority-weighted input queues.
///
/// ```no_run
/// use std::time::Duration;
/// use weighted_combiner::Combiner;
///
/// let combiner = Combiner::new();
/// combiner.start().expect("fresh combiner");
/// let urgent = combiner.add_input(8.0, Duration::from_secs(5));
/// let bulk = combiner.add_input(2.0, Duration::from_secs(5));
/// urgent.push("a").unwrap();
/// bulk.push("b").unwrap();
/// assert!(combiner.poll().is_some());
/// assert!(combiner.poll_timeout(Duration::from_millis(100)).is_some());
/// combiner.stop();
/// ```
pub struct Combiner<T> {
    shared: Arc<Shared<T>>,
    config: CombinerConfig,
    lifecycle: Mutex<Lifecycle>,
    retry: Mutex<Option<RetryWorker<T>>>,
}

impl<T> Combiner<T> {
    /// Combiner with the default configuration (100 ms scans, 1000-slot inputs).
    pub fn new() -> Self {
        Self::build(CombinerConfig::default())
    }

    /// Combiner with a validated custom configuration.
    pub fn with_config(config: CombinerConfig) -> Result<Self, CombinerError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: CombinerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry: Mutex::new(Registry::new()),
                counters: StatsCounters::default(),
            }),
            config,
            lifecycle: Mutex::new(Lifecycle::Idle),
            retry: Mutex::new(None),
        }
    }

    /// Register a new input and return its producer handle.
    ///
    /// # Panics
    /// Panics if `priority` is negative, NaN or infinite. Use [`Combiner::try_add_input`] to
    /// validate untrusted weights.
    pub fn add_input(&self, priority: f64, idle_timeout: Duration) -> CombinerInput<T> {
        self.try_add_input(priority, idle_timeout)
            .unwrap_or_else(|err| panic!("{err}"))
    }

    /// Register a new input, rejecting invalid priorities.
    pub fn try_add_input(
        &self,
        priority: f64,
        idle_timeout: Duration,
    ) -> Result<CombinerInput<T>, CombinerError> {
        let priority = Priority::new(priority)?;
        let queue = Arc::new(InputQueue::new(
            priority,
            idle_timeout,
            self.config.input_capacity,
        ));
        self.shared.registry.lock().register(queue.clone());
        StatsCounters::bump(&self.shared.counters.added, 1);
        tracing::debug!(
            priority = priority.get(),
            idle_timeout_ms = millis(idle_timeout),
            "input registered"
        );
        Ok(CombinerInput::new(queue))
    }

    /// Take one value from a non-empty input chosen by weight, without blocking.
    pub fn poll(&self) -> Option<T> {
        self.shared.poll_next()
    }

    /// Signal the eviction thread to finish and wait for it. Idempotent.
    ///
    /// Producers blocked on a full input and callers waiting in `poll_timeout` are unaffected.
    /// A stopped combiner cannot be started again.
    pub fn stop(&self) {
        let previous = std::mem::replace(&mut *self.lifecycle.lock(), Lifecycle::Stopped);
        if let Lifecycle::Running { stop, handle } = previous {
            let _ = stop.send(());
            drop(stop);
            if handle.join().is_err() {
                tracing::error!("eviction thread panicked");
            }
            tracing::info!("combiner stopped");
        }
    }

    /// True between a successful `start` and the matching `stop`.
    pub fn is_running(&self) -> bool {
        matches!(*self.lifecycle.lock(), Lifecycle::Running { .. })
    }

    /// Inputs currently registered (evicted ones excluded).
    pub fn input_count(&self) -> usize {
        self.shared.registry.lock().len()
    }

    /// Acceptance reference: highest priority among registered, non-removed inputs.
    pub fn max_weight(&self) -> f64 {
        self.shared.registry.lock().max_weight().get()
    }

    /// Snapshot of the lifetime counters plus the current registry size and max weight.
    ///
    /// # Returns
    /// A [`CombinerStats`] whose registry figures are read under one lock acquisition; the
    /// counters are read afterwards and may already include concurrent polls.
    pub fn stats(&self) -> CombinerStats {
        let (registered, max_weight) = {
            let registry = self.shared.registry.lock();
            (registry.len(), registry.max_weight().get())
        };
        self.shared.counters.snapshot(registered, max_weight)
    }
}

impl<T: Send + 'static> Combiner<T> {
    /// Start the background eviction thread.
    pub fn start(&self) -> Result<(), CombinerError> {
        let mut lifecycle = self.lifecycle.lock();
        match *lifecycle {
            Lifecycle::Running { .. } => return Err(CombinerError::AlreadyStarted),
            Lifecycle::Stopped => return Err(CombinerError::Stopped),
            Lifecycle::Idle => {}
        }

        let (stop_tx, stop_rx) = bounded(1);
        let shared = self.shared.clone();
        let interval = self.config.scan_interval;
        let handle = std::thread::Builder::new()
            .name("Combiner-Eviction".to_string())
            .spawn(move || eviction_loop(shared, stop_rx, interval))
            .map_err(|source| CombinerError::Spawn {
                name: "eviction",
                source,
            })?;

        *lifecycle = Lifecycle::Running {
            stop: stop_tx,
            handle,
        };
        tracing::info!(
            scan_interval_ms = millis(interval),
            "combiner started"
        );
        Ok(())
    }

    /// Poll now; if nothing is available, retry exactly once after `timeout`.
    ///
    /// The retry runs on the shared retry thread while the caller blocks for its result. If
    /// the retry cannot be scheduled or never reports back, the result is `None`: an empty
    /// answer is preferred over surfacing internal scheduling failures to consumers.
    ///
    /// A `timeout` too large to express as a deadline (such as `Duration::MAX`) schedules a
    /// retry that never fires, so the call waits until the combiner is dropped.
    pub fn poll_timeout(&self, timeout: Duration) -> Option<T> {
        if let Some(value) = self.poll() {
            return Some(value);
        }

        let reply = {
            let mut retry = self.retry.lock();
            if retry.is_none() {
                let shared = self.shared.clone();
                match RetryWorker::spawn(move || shared.poll_next()) {
                    Ok(worker) => *retry = Some(worker),
                    Err(err) => {
                        tracing::debug!(error = %err, "delayed retry unavailable");
                        return None;
                    }
                }
            }
            retry.as_ref().and_then(|worker| worker.schedule(timeout))
        };

        let Some(reply) = reply else {
            tracing::debug!("delayed retry could not be scheduled");
            return None;
        };
        StatsCounters::bump(&self.shared.counters.delayed_retries, 1);
        reply.recv().unwrap_or_else(|_| {
            tracing::debug!("delayed retry dropped before completing");
            None
        })
    }
}

impl<T> Default for Combiner<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Combiner<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Scan once per interval until a stop message arrives or the sender is dropped.
fn eviction_loop<T>(shared: Arc<Shared<T>>, stop: Receiver<()>, interval: Duration) {
    loop {
        match stop.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => shared.scan(),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
