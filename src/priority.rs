//! Priority weights used by the combiner's weighted selection.

use crate::error::CombinerError;

/// Selection weight attached to an input for its whole lifetime.
///
/// A priority is a finite, non-negative real number. Only the ratio between the priorities of
/// currently non-empty inputs matters: an input with priority `8.0` is drawn four times as often
/// as one with `2.0` when both have values queued. A priority of zero is legal; such an input is
/// only drawn when no positively weighted input has anything queued.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Priority(f64);

impl Priority {
    /// Weight used when no input is registered.
    pub const ZERO: Priority = Priority(0.0);

    /// Validate a raw weight.
    pub fn new(value: f64) -> Result<Self, CombinerError> {
        if value.is_finite() && value >= 0.0 {
            // Normalise -0.0 so equality against the cached maximum behaves.
            Ok(Priority(value + 0.0))
        } else {
            Err(CombinerError::InvalidPriority(value))
        }
    }

    /// Raw weight value.
    pub const fn get(self) -> f64 {
        self.0
    }

    /// Acceptance probability of this weight against the current maximum.
    ///
    /// Clamped to `[0, 1]`; a zero maximum yields zero and callers must fall back to uniform
    /// selection.
    pub fn acceptance(self, max: Priority) -> f64 {
        if max.0 <= 0.0 {
            return 0.0;
        }
        (self.0 / max.0).clamp(0.0, 1.0)
    }

    pub(crate) fn max(self, other: Priority) -> Priority {
        if other.0 > self.0 {
            other
        } else {
            self
        }
    }
}
