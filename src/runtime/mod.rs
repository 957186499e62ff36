//! Runtime core: value model, work queue, evaluator, and scheduler.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod domain;
pub mod error;
pub mod eval;
pub mod queue;
mod rng;
pub mod scheduler;
pub mod value;

/// Configuration for an evaluation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Wall-clock budget per drain pass. Soft: checked only between
    /// instructions, never mid-instruction.
    pub compute_duration: Duration,

    /// Global seed for stochastic switches.
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            compute_duration: Duration::from_millis(10),
            seed: 0,
        }
    }
}

// Re-export commonly used types
pub use domain::{
    Domain, NoopObserver, Observer, Operation, OperationOutcome, OperationTable, ScalarDomain,
};
pub use error::{EngineError, EngineResult, EvalError, EvalResult};
pub use eval::evaluate_description;
pub use queue::{Entry, WorkQueue};
pub use scheduler::{Run, Snapshot};
pub use value::{ForkIndex, Value, ValueSnapshot};
