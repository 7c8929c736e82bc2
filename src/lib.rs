//! Weighted fan-in combiner.
//!
//! Many producers each own an input with a priority and an idle timeout; consumers poll one
//! stream that draws from the non-empty inputs in proportion to their priorities. Idle inputs
//! are evicted by a background scan.

pub mod combiner;
pub mod config;
pub mod error;
pub mod metrics;
pub mod priority;
pub mod queue;
mod registry;
mod retry;
pub mod selection;

pub use combiner::Combiner;
pub use config::{CombinerConfig, DEFAULT_SCAN_INTERVAL};
pub use error::{CombinerError, PushError};
pub use metrics::CombinerStats;
pub use priority::Priority;
pub use queue::{CombinerInput, DEFAULT_INPUT_CAPACITY};
pub use selection::{stochastic_acceptance, MAX_REJECTIONS};
