//! Error types for the weft runtime.
//!
//! All evaluation errors are programmer/input errors (malformed program or
//! misconfigured host), not transient failures: there is no retry or partial
//! recovery, the run terminates and the host restarts with corrected input.
//! Messages name the missing or invalid identifier and its containing
//! description where applicable, to support debugging authored programs.

use thiserror::Error;

/// Fatal errors surfaced while evaluating a transformation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// A noun reference (or root noun) names a noun its description lacks.
    #[error("unknown noun '{noun}' in description '{description}'")]
    UnknownNoun {
        /// The missing noun identifier.
        noun: String,
        /// The description the reference targeted.
        description: String,
    },

    /// A noun reference targets a description that was never loaded.
    #[error("unknown description '{0}'")]
    UnknownDescription(String),

    /// A noun reference with no description reached the evaluator. Loading
    /// a program through a `DescriptionSet` qualifies every reference, so
    /// this only fires for hand-built transformations that skipped loading.
    #[error("noun reference '{0}' was never qualified with a description")]
    UnqualifiedNounReference(String),

    /// An operation name is absent from the host operation table.
    #[error("unknown operation '{0}'")]
    UnknownOperation(String),

    /// `getVariable` on a name the flowing value never set.
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    /// A switch discriminant matched no declared case.
    #[error("no switch case matches value '{value}'")]
    NoMatchingCase {
        /// Rendered discriminant value.
        value: String,
    },

    /// A forking result was produced in a forkless position (operand,
    /// condition, switch discriminant, operation argument, or variable
    /// assignment).
    #[error("forking is not allowed in operand/argument position")]
    InvalidForkContext,

    /// A payload could not be read as a scalar where an operator or
    /// condition required one.
    #[error("payload is not convertible to a scalar in {context}")]
    NotScalar {
        /// Where the conversion was required.
        context: String,
    },

    /// An operator was applied to scalar kinds it is not defined for.
    #[error("operator '{op}' is not defined for {lhs} and {rhs}")]
    InvalidOperand {
        /// Operator symbol.
        op: String,
        /// Left operand kind.
        lhs: String,
        /// Right operand kind (repeats the left kind for unary operators).
        rhs: String,
    },

    /// A host operation's execute hook reported a failure.
    #[error("operation '{name}' failed: {detail}")]
    OperationFailed {
        /// Operation name.
        name: String,
        /// Host-provided failure detail.
        detail: String,
    },

    /// A stochastic switch declared no branches.
    #[error("stochastic switch has no branches")]
    EmptyStochasticSwitch,
}

/// Convenience result alias for evaluation steps.
pub type EvalResult<T> = std::result::Result<T, EvalError>;

/// Errors surfaced by the engine control surface.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// A start message was received while a run is still active.
    #[error("a run is already active on this engine")]
    AlreadyRunning,

    /// An update message was received before any run was started.
    #[error("no run has been started on this engine")]
    NotStarted,

    /// The engine task terminated and can no longer accept messages.
    #[error("engine task has terminated")]
    Terminated,

    /// A fatal evaluation error terminated the run.
    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// Convenience result alias for engine control operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
