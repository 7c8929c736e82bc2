//! Delayed single-retry worker behind `Combiner::poll_timeout`.
//!
//! One thread owns a min-heap of pending retries keyed by due time. Callers enqueue a job and
//! block on its reply channel; when the job comes due the worker runs one poll and sends back
//! whatever it produced, `None` included. Jobs are never cancelled once scheduled.

use crate::error::CombinerError;
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// One pending retry. `due` is `None` when the delay does not fit in an `Instant`; such a job
/// never fires and only resolves when the worker shuts down.
struct RetryJob<T> {
    due: Option<Instant>,
    reply: Sender<Option<T>>,
}

// Only jobs with a deadline enter the heap. Reversed: BinaryHeap is a max-heap.
impl<T> Ord for RetryJob<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        other.due.cmp(&self.due)
    }
}

impl<T> PartialOrd for RetryJob<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> PartialEq for RetryJob<T> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due
    }
}

impl<T> Eq for RetryJob<T> {}

pub(crate) struct RetryWorker<T> {
    jobs: Option<Sender<RetryJob<T>>>,
    handle: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> RetryWorker<T> {
    /// Start the worker thread. `poll` runs once per due job.
    pub(crate) fn spawn<F>(poll: F) -> Result<Self, CombinerError>
    where
        F: FnMut() -> Option<T> + Send + 'static,
    {
        let (jobs_tx, jobs_rx) = unbounded();
        let handle = std::thread::Builder::new()
            .name("Combiner-Retry".to_string())
            .spawn(move || run(jobs_rx, poll))
            .map_err(|source| CombinerError::Spawn {
                name: "retry",
                source,
            })?;
        Ok(Self {
            jobs: Some(jobs_tx),
            handle: Some(handle),
        })
    }

    /// Queue one poll to run after `delay`. Returns the channel the result will arrive on, or
    /// `None` when the worker is no longer accepting jobs.
    pub(crate) fn schedule(&self, delay: Duration) -> Option<Receiver<Option<T>>> {
        let jobs = self.jobs.as_ref()?;
        let (reply_tx, reply_rx) = bounded(1);
        let job = RetryJob {
            due: Instant::now().checked_add(delay),
            reply: reply_tx,
        };
        jobs.send(job).ok()?;
        Some(reply_rx)
    }
}

impl<T> Drop for RetryWorker<T> {
    fn drop(&mut self) {
        // Disconnecting the job channel ends the loop; pending replies are dropped with it.
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run<T, F>(jobs: Receiver<RetryJob<T>>, mut poll: F)
where
    F: FnMut() -> Option<T>,
{
    let mut pending: BinaryHeap<RetryJob<T>> = BinaryHeap::new();
    // Jobs whose deadline overflowed. Held so their callers stay blocked until shutdown.
    let mut never_due: Vec<RetryJob<T>> = Vec::new();
    loop {
        let received = match pending.peek().and_then(|job| job.due) {
            Some(due) => jobs.recv_deadline(due),
            None => jobs.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok(job) if job.due.is_some() => pending.push(job),
            Ok(job) => never_due.push(job),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        let now = Instant::now();
        while pending
            .peek()
            .and_then(|job| job.due)
            .is_some_and(|due| due <= now)
        {
            let Some(job) = pending.pop() else {
                break;
            };
            if job.reply.send(poll()).is_err() {
                tracing::warn!("poll_timeout caller vanished before its retry completed");
            }
        }
    }
    tracing::debug!(
        abandoned = pending.len() + never_due.len(),
        "retry worker exiting"
    );
}
