//! Per-producer input queues.
//!
//! Each input owns a bounded crossbeam channel. Producers push straight into the channel, so the
//! hot path never touches the combiner's registry lock; only the combiner pops from it. The queue
//! also carries the bookkeeping the eviction thread needs: the fixed priority, the idle timeout,
//! and an idle clock advanced once per scan.

use crate::error::PushError;
use crate::priority::Priority;
use crossbeam_channel::{bounded, Receiver, Select, SendError, Sender, TrySendError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Buffer slots per input unless the combiner is configured otherwise.
pub const DEFAULT_INPUT_CAPACITY: usize = 1000;

/// Idle time bookkeeping, only touched by the eviction scan.
#[derive(Debug, Clone, Copy)]
struct IdleClock {
    /// Reference point of the current empty stretch, `None` while the queue holds values.
    since: Option<Instant>,
    /// Empty time accumulated up to `since`.
    accumulated: Duration,
}

/// Bounded buffer plus the metadata the combiner selects and evicts on.
pub(crate) struct InputQueue<T> {
    sender: Sender<T>,
    receiver: Receiver<T>,
    priority: Priority,
    idle_timeout: Duration,
    removed: AtomicBool,
    // Never sends; dropping the sender on removal wakes producers parked on a full buffer.
    removal_signal: Mutex<Option<Sender<()>>>,
    removal_watch: Receiver<()>,
    idle: Mutex<IdleClock>,
}

impl<T> InputQueue<T> {
    pub(crate) fn new(priority: Priority, idle_timeout: Duration, capacity: usize) -> Self {
        Self::new_at(priority, idle_timeout, capacity, Instant::now())
    }

    /// Build a queue whose idle clock starts at `created`.
    ///
    /// A new queue is empty, so its idle stretch begins at registration rather than at the
    /// first eviction scan.
    pub(crate) fn new_at(
        priority: Priority,
        idle_timeout: Duration,
        capacity: usize,
        created: Instant,
    ) -> Self {
        let (sender, receiver) = bounded(capacity);
        let (signal_tx, signal_rx) = bounded(0);
        Self {
            sender,
            receiver,
            priority,
            idle_timeout,
            removed: AtomicBool::new(false),
            removal_signal: Mutex::new(Some(signal_tx)),
            removal_watch: signal_rx,
            idle: Mutex::new(IdleClock {
                since: Some(created),
                accumulated: Duration::ZERO,
            }),
        }
    }

    /// Enqueue a value, blocking while the buffer is full.
    ///
    /// The removal check happens once up front. A push racing with eviction may still land in
    /// a buffer that is about to be dropped. A producer already parked on a full buffer is
    /// woken with [`PushError::Interrupted`] when the queue is removed.
    pub fn push(&self, value: T) -> Result<(), PushError<T>> {
        if self.is_removed() {
            return Err(PushError::AlreadyRemoved(value));
        }

        let value = match self.sender.try_send(value) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Full(value)) => value,
            Err(TrySendError::Disconnected(value)) => return Err(PushError::Interrupted(value)),
        };

        let mut select = Select::new();
        let send_index = select.send(&self.sender);
        let removal_index = select.recv(&self.removal_watch);
        let operation = select.select();
        let index = operation.index();
        if index == send_index {
            operation
                .send(&self.sender, value)
                .map_err(|SendError(value)| PushError::Interrupted(value))
        } else {
            debug_assert_eq!(index, removal_index);
            let _ = operation.recv(&self.removal_watch);
            Err(PushError::Interrupted(value))
        }
    }

    /// Enqueue without blocking.
    pub fn try_push(&self, value: T) -> Result<(), PushError<T>> {
        if self.is_removed() {
            return Err(PushError::AlreadyRemoved(value));
        }
        self.sender.try_send(value).map_err(|err| match err {
            TrySendError::Full(value) => PushError::Full(value),
            TrySendError::Disconnected(value) => PushError::Interrupted(value),
        })
    }

    /// Take the head value if there is one.
    pub fn pop(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    /// Flag the queue as removed. Idempotent.
    pub fn mark_removed(&self) {
        if !self.removed.swap(true, Ordering::AcqRel) {
            self.removal_signal.lock().take();
        }
    }

    /// Sticky: once true, stays true.
    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Values currently buffered.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn capacity(&self) -> usize {
        self.sender.capacity().unwrap_or(usize::MAX)
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Advance the idle clock to `now`.
    ///
    /// A non-empty queue resets the clock. An empty one starts a stretch if none is open, or
    /// adds the time since the last scan and moves the reference point forward, so the
    /// accumulated value tracks wall-clock idle time exactly.
    pub fn recalculate_idle(&self, now: Instant) {
        let mut clock = self.idle.lock();
        if !self.is_empty() {
            clock.since = None;
            clock.accumulated = Duration::ZERO;
            return;
        }

        match clock.since {
            None => {
                clock.since = Some(now);
                clock.accumulated = Duration::ZERO;
            }
            Some(since) => {
                clock.accumulated += now.saturating_duration_since(since);
                clock.since = Some(now);
            }
        }
    }

    /// Idle time measured by the last scan.
    pub fn idle_for(&self) -> Duration {
        self.idle.lock().accumulated
    }

    /// True once the queue has been continuously empty for longer than its timeout.
    pub fn is_timed_out(&self) -> bool {
        self.idle.lock().accumulated > self.idle_timeout
    }
}

/// Producer-side handle returned by [`crate::Combiner::add_input`].
///
/// Cloning the handle shares the same queue, so several threads can feed one input.
pub struct CombinerInput<T> {
    queue: Arc<InputQueue<T>>,
}

impl<T> CombinerInput<T> {
    pub(crate) fn new(queue: Arc<InputQueue<T>>) -> Self {
        Self { queue }
    }

    /// Push a value, blocking while the input's buffer is full.
    pub fn push(&self, value: T) -> Result<(), PushError<T>> {
        self.queue.push(value)
    }

    /// Push a value, failing with [`PushError::Full`] instead of blocking.
    pub fn try_push(&self, value: T) -> Result<(), PushError<T>> {
        self.queue.try_push(value)
    }

    /// Stop accepting values on this input.
    ///
    /// Values already buffered are still delivered by the combiner.
    pub fn remove(&self) {
        self.queue.mark_removed();
    }

    /// Whether the input was removed, explicitly or by idle eviction.
    ///
    /// # Returns
    /// `true` once pushes are rejected with [`PushError::AlreadyRemoved`]. Never resets.
    pub fn is_removed(&self) -> bool {
        self.queue.is_removed()
    }

    /// Weight fixed at registration.
    pub fn priority(&self) -> Priority {
        self.queue.priority()
    }

    /// How long the input may stay empty before the eviction scan drops it.
    pub fn idle_timeout(&self) -> Duration {
        self.queue.idle_timeout()
    }

    /// Values buffered and not yet polled.
    ///
    /// # Returns
    /// A racy snapshot: producers and consumers may change it immediately afterwards.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// True when nothing is buffered. Same caveat as [`CombinerInput::len`].
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Buffer slots; a blocking push waits while `len() == capacity()`.
    ///
    /// # Returns
    /// The configured `input_capacity` of the combiner that created this input.
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}

impl<T> Clone for CombinerInput<T> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
        }
    }
}
