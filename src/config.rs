//! Combiner configuration.

use crate::error::CombinerError;
use crate::queue::DEFAULT_INPUT_CAPACITY;
use std::time::Duration;

/// Pause between two eviction scans.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_millis(100);

/// Tuning knobs applied when a [`crate::Combiner`] is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinerConfig {
    /// Delay between eviction scans. Also bounds how late an idle input is evicted.
    pub scan_interval: Duration,
    /// Buffer slots for every input registered on the combiner.
    pub input_capacity: usize,
}

/// Whole milliseconds of `duration` for log fields, saturating at `u64::MAX`.
pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Default for CombinerConfig {
    fn default() -> Self {
        Self {
            scan_interval: DEFAULT_SCAN_INTERVAL,
            input_capacity: DEFAULT_INPUT_CAPACITY,
        }
    }
}

impl CombinerConfig {
    /// Reject values the combiner cannot run with.
    ///
    /// # Returns
    /// `Err(CombinerError::InvalidConfig)` for a zero scan interval or a zero input capacity.
    pub fn validate(&self) -> Result<(), CombinerError> {
        if self.scan_interval.is_zero() {
            return Err(CombinerError::InvalidConfig(
                "scan_interval must be greater than zero".to_string(),
            ));
        }
        if self.input_capacity == 0 {
            return Err(CombinerError::InvalidConfig(
                "input_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_cadence() {
        let config = CombinerConfig::default();
        assert_eq!(config.scan_interval, Duration::from_millis(100));
        assert_eq!(config.input_capacity, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_values() {
        let no_capacity = CombinerConfig {
            input_capacity: 0,
            ..CombinerConfig::default()
        };
        assert!(matches!(
            no_capacity.validate(),
            Err(CombinerError::InvalidConfig(_))
        ));

        let no_interval = CombinerConfig {
            scan_interval: Duration::ZERO,
            ..CombinerConfig::default()
        };
        assert!(matches!(
            no_interval.validate(),
            Err(CombinerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn millis_saturates_instead_of_truncating() {
        assert_eq!(millis(Duration::from_millis(250)), 250);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }
}
