//! Host capability surface: the domain hooks, operation table, and
//! observability listeners an embedding supplies to the engine.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use crate::program::{Bindings, Scalar, Transformation};
use crate::runtime::value::{ForkIndex, Value};

/// Capability trait a content domain implements to drive evaluation.
///
/// The core never inspects the payload's structure; it only routes payloads
/// through these hooks. Hooks must be side-effect-safe across the sequential
/// sub-evaluations within one instruction and must not retain references
/// that alias across clones.
pub trait Domain {
    /// Domain-specific payload carried by every value.
    type Payload;

    /// Opaque, comparable measure of how complete a payload's computation
    /// is; gates interruption and waiting.
    type Progress: PartialOrd + Clone + fmt::Debug;

    /// Materialize a fresh payload for a description's root value.
    fn create_value(&self, initial_variables: &Bindings) -> Self::Payload;

    /// Produce a structurally independent copy of a payload, deep or
    /// shallow as appropriate to the domain.
    fn clone_payload(&self, payload: &Self::Payload) -> Self::Payload;

    /// Priority of `a` relative to `b`; `Greater` means `a` executes
    /// sooner. Ties are acceptable.
    fn compare_priority(&self, a: &Self::Payload, b: &Self::Payload) -> Ordering;

    /// Current progress of a payload.
    fn progress(&self, payload: &Self::Payload) -> Self::Progress;

    /// Payload carrying a literal constant.
    fn from_scalar(&self, scalar: Scalar) -> Self::Payload;

    /// Scalar view of a payload, where one exists. Operators, conditions,
    /// switch discriminants, and variable assignment read payloads through
    /// this hook.
    fn to_scalar(&self, payload: &Self::Payload) -> Option<Scalar>;

    /// Whether a drain pass should stop early given the progress of the
    /// top entry at pass start and of the entry currently on top.
    fn should_interrupt(
        &self,
        at_pass_start: &Self::Progress,
        current: &Self::Progress,
    ) -> bool {
        let _ = (at_pass_start, current);
        false
    }

    /// Whether the run should suspend instead of scheduling another pass.
    fn should_wait(&self, current: &Self::Progress, requested: &Self::Progress) -> bool {
        current >= requested
    }
}

/// Result of a domain operation: one payload, or many (a fork).
pub enum OperationOutcome<P> {
    /// Deterministic replacement of the flowing payload.
    One(P),
    /// Fork into one lineage per payload.
    Many(Vec<P>),
}

type ExecuteFn<P> = dyn Fn(Vec<P>) -> Result<OperationOutcome<P>, String> + Send + Sync;

/// A named domain operation invocable from programs.
pub struct Operation<P> {
    /// Whether the flowing payload is implicitly passed as first argument.
    pub include_this: bool,
    /// Constants filling argument positions the call site omits.
    pub default_parameters: Vec<Scalar>,
    execute: Box<ExecuteFn<P>>,
}

impl<P> Operation<P> {
    /// Create an operation from its execute hook.
    pub fn new(
        include_this: bool,
        execute: impl Fn(Vec<P>) -> Result<OperationOutcome<P>, String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            include_this,
            default_parameters: Vec::new(),
            execute: Box::new(execute),
        }
    }

    /// Attach default parameters for omitted argument positions.
    pub fn with_defaults(mut self, defaults: Vec<Scalar>) -> Self {
        self.default_parameters = defaults;
        self
    }

    /// Invoke the operation's execute hook.
    pub fn execute(&self, arguments: Vec<P>) -> Result<OperationOutcome<P>, String> {
        (self.execute)(arguments)
    }
}

impl<P> fmt::Debug for Operation<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("include_this", &self.include_this)
            .field("default_parameters", &self.default_parameters)
            .finish_non_exhaustive()
    }
}

/// Name → operation lookup table supplied by the host.
#[derive(Debug)]
pub struct OperationTable<P> {
    operations: HashMap<String, Operation<P>>,
}

impl<P> OperationTable<P> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            operations: HashMap::new(),
        }
    }

    /// Register an operation under a name, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, operation: Operation<P>) {
        self.operations.insert(name.into(), operation);
    }

    /// Look up an operation by name.
    pub fn get(&self, name: &str) -> Option<&Operation<P>> {
        self.operations.get(name)
    }
}

impl<P> Default for OperationTable<P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Observability listeners invoked around evaluation steps.
///
/// Methods take `&self`; implementations that collect use interior
/// mutability. All methods default to no-ops.
pub trait Observer<P>: Send + Sync {
    /// Called before a transformation is applied to a value.
    fn before_apply(&self, value: &Value<P>, transformation: &Transformation) {
        let _ = (value, transformation);
    }

    /// Called after a transformation was applied.
    fn after_apply(&self, value: &Value<P>, transformation: &Transformation) {
        let _ = (value, transformation);
    }

    /// Called when a stochastic switch resolves to a branch.
    fn stochastic_resolved(&self, index: &ForkIndex, branch: usize) {
        let _ = (index, branch);
    }
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl<P> Observer<P> for NoopObserver {}

/// Minimal numeric domain: payloads are scalars, progress is the numeric
/// payload value, and the least-progressed lineage executes first.
///
/// Useful for tests and for purely numeric programs.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScalarDomain;

impl Domain for ScalarDomain {
    type Payload = Scalar;
    type Progress = f64;

    fn create_value(&self, _initial_variables: &Bindings) -> Scalar {
        Scalar::Number(0.0)
    }

    fn clone_payload(&self, payload: &Scalar) -> Scalar {
        payload.clone()
    }

    fn compare_priority(&self, a: &Scalar, b: &Scalar) -> Ordering {
        // Least progress first.
        let (a, b) = (self.progress(a), self.progress(b));
        b.partial_cmp(&a).unwrap_or(Ordering::Equal)
    }

    fn progress(&self, payload: &Scalar) -> f64 {
        payload.as_number().unwrap_or(0.0)
    }

    fn from_scalar(&self, scalar: Scalar) -> Scalar {
        scalar
    }

    fn to_scalar(&self, payload: &Scalar) -> Option<Scalar> {
        Some(payload.clone())
    }
}
