//! Error types surfaced by the combiner and its input handles.

use std::fmt;

/// Lifecycle and configuration failures reported by [`crate::Combiner`].
#[derive(Debug, thiserror::Error)]
pub enum CombinerError {
    /// `start` was called while the eviction thread is already running.
    #[error("combiner is already running")]
    AlreadyStarted,
    /// `start` was called after `stop`; a combiner runs at most once.
    #[error("combiner has been stopped and cannot be restarted")]
    Stopped,
    /// A priority that is negative, NaN or infinite.
    #[error("invalid priority {0}: must be finite and non-negative")]
    InvalidPriority(f64),
    /// Rejected configuration value.
    #[error("invalid combiner configuration: {0}")]
    InvalidConfig(String),
    /// The OS refused to spawn a background thread.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Why a value could not be handed to an input queue.
///
/// Every variant gives the rejected value back so producers can retry elsewhere.
#[derive(thiserror::Error)]
pub enum PushError<T> {
    /// The input was removed before the push started.
    #[error("input has already been removed")]
    AlreadyRemoved(T),
    /// The input was removed while the producer was blocked on a full buffer.
    #[error("blocking push interrupted: input was removed while waiting for capacity")]
    Interrupted(T),
    /// Non-blocking push found the buffer at capacity.
    #[error("input buffer is full")]
    Full(T),
}

impl<T> PushError<T> {
    /// Recover the value that was not enqueued.
    pub fn into_inner(self) -> T {
        match self {
            PushError::AlreadyRemoved(value)
            | PushError::Interrupted(value)
            | PushError::Full(value) => value,
        }
    }

    pub fn is_already_removed(&self) -> bool {
        matches!(self, PushError::AlreadyRemoved(_))
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, PushError::Interrupted(_))
    }
}

// Manual impl so `T` does not need to be `Debug` for `unwrap_err` and friends.
impl<T> fmt::Debug for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushError::AlreadyRemoved(_) => f.write_str("AlreadyRemoved(..)"),
            PushError::Interrupted(_) => f.write_str("Interrupted(..)"),
            PushError::Full(_) => f.write_str("Full(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_error_hands_value_back() {
        let err = PushError::AlreadyRemoved(7u32);
        assert!(err.is_already_removed());
        assert!(!err.is_interrupted());
        assert_eq!(err.into_inner(), 7);
    }

    #[test]
    fn push_error_messages_are_distinguishable() {
        let removed = PushError::AlreadyRemoved(()).to_string();
        let interrupted = PushError::Interrupted(()).to_string();
        assert_ne!(removed, interrupted);
        assert!(interrupted.contains("interrupted"));
    }
}
