//! Weft – an incremental, interruptible interpreter for declarative
//! content-generation programs.
//!
//! Programs are trees of composable rules: descriptions containing named
//! nouns whose bodies are transformations. A single program can produce an
//! unbounded number of result values, so evaluation is:
//! - Incremental: a priority work queue of value lineages, each advanced one
//!   instruction per scheduler step
//! - Interruptible: drain passes run under a wall-clock budget and a
//!   host-supplied interrupt predicate
//! - Resumable: runs suspend once the host's requested progress is reached
//!   and resume when the target moves
//! - Reproducible: stochastic branches are seeded from the run seed and the
//!   value's fork index, independent of scheduling order
//!
//! The content domain (geometry, agents, …) stays outside the core: payloads
//! are opaque and flow only through the host's [`runtime::Domain`] hooks and
//! operation table.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Control protocol and the asynchronous engine.
pub mod control;
/// Program data model: descriptions, nouns, transformations.
pub mod program;
/// Runtime core: values, work queue, evaluator, scheduler.
pub mod runtime;

// Re-export key types for convenience
pub use control::{Command, Engine, Event};
pub use program::{Description, DescriptionSet, Scalar, Transformation};
pub use runtime::{Domain, EngineConfig, EngineError, EvalError, Run, Snapshot};

/// Current version of the weft crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol version for run-control communication
pub const PROTOCOL_VERSION: &str = "1.0.0";
