//! Step-wise transformation evaluator.
//!
//! One dispatch function (`step`) handles every transformation kind and is
//! shared by two continuation strategies: the scheduler's drain loop, where
//! forking is allowed, and the forkless trampoline (`evaluate_forkless`)
//! used for operands, conditions, switch discriminants, operation arguments,
//! and variable assignments. A fork produced under the forkless strategy is
//! the fatal [`EvalError::InvalidForkContext`].
//!
//! Noun references are trampolined (the target body is pushed as a
//! follow-up) rather than natively recursive, so deep or unbounded recursive
//! programs cannot overflow the host call stack.

use crate::program::{BinaryOp, DescriptionSet, Scalar, Transformation, UnaryOp};
use crate::runtime::domain::{Domain, NoopObserver, Observer, OperationOutcome, OperationTable};
use crate::runtime::error::{EvalError, EvalResult};
use crate::runtime::rng;
use crate::runtime::value::{ForkIndex, Value};

/// Everything one evaluation step needs from its surroundings.
pub(crate) struct EvalContext<'a, D: Domain> {
    /// Host domain hooks.
    pub domain: &'a D,
    /// Host operation table.
    pub operations: &'a OperationTable<D::Payload>,
    /// The read-only program.
    pub descriptions: &'a DescriptionSet,
    /// Global stochastic seed for this run.
    pub seed: u64,
    /// Observability listeners.
    pub observer: &'a dyn Observer<D::Payload>,
}

/// Payload effect of one evaluation step.
pub(crate) enum Emitted<P> {
    /// The flowing payload is unchanged.
    Unchanged,
    /// The flowing payload is replaced.
    Replace(P),
    /// The lineage forks into one successor per payload.
    Fork(Vec<P>),
}

/// Outcome of evaluating one instruction.
pub(crate) enum StepOutcome<P> {
    /// The lineage continues: apply the payload effect and push the
    /// follow-up transformations (in order) onto the remaining stack.
    Continue {
        /// Payload effect.
        emitted: Emitted<P>,
        /// Transformations to apply next, first element first.
        followups: Vec<Transformation>,
    },
    /// Parallel composition: fork into one lineage per child, each child
    /// transformation prepended to the remaining stack of its fork.
    Branch(Vec<Transformation>),
}

/// Evaluate one instruction against a value.
pub(crate) fn step<D: Domain>(
    ctx: &EvalContext<'_, D>,
    value: &mut Value<D::Payload>,
    instruction: &Transformation,
) -> EvalResult<StepOutcome<D::Payload>> {
    match instruction {
        Transformation::Raw { value: constant } => Ok(replace(
            ctx.domain.from_scalar(constant.clone()),
        )),

        Transformation::This => Ok(StepOutcome::Continue {
            emitted: Emitted::Unchanged,
            followups: Vec::new(),
        }),

        Transformation::Sequential { steps } => Ok(StepOutcome::Continue {
            emitted: Emitted::Unchanged,
            followups: steps.clone(),
        }),

        Transformation::Parallel { branches } => Ok(StepOutcome::Branch(branches.clone())),

        Transformation::Binary { op, lhs, rhs } => {
            let lhs = sub_evaluate_scalar(ctx, value, lhs, "operand")?;
            let rhs = sub_evaluate_scalar(ctx, value, rhs, "operand")?;
            let result = apply_binary(*op, lhs, rhs)?;
            Ok(replace(ctx.domain.from_scalar(result)))
        }

        Transformation::Unary { op, operand } => {
            let operand = sub_evaluate_scalar(ctx, value, operand, "operand")?;
            let result = apply_unary(*op, operand)?;
            Ok(replace(ctx.domain.from_scalar(result)))
        }

        Transformation::Operation { name, arguments } => {
            let operation = ctx
                .operations
                .get(name)
                .ok_or_else(|| EvalError::UnknownOperation(name.clone()))?;

            let mut payloads = Vec::new();
            if operation.include_this {
                payloads.push(ctx.domain.clone_payload(&value.raw));
            }
            for argument in arguments {
                payloads.push(sub_evaluate(ctx, value, argument)?);
            }
            // Fill argument positions the call site omitted.
            for default in operation
                .default_parameters
                .iter()
                .skip(arguments.len())
            {
                payloads.push(ctx.domain.from_scalar(default.clone()));
            }

            match operation
                .execute(payloads)
                .map_err(|detail| EvalError::OperationFailed {
                    name: name.clone(),
                    detail,
                })? {
                OperationOutcome::One(payload) => Ok(replace(payload)),
                OperationOutcome::Many(payloads) => Ok(StepOutcome::Continue {
                    emitted: Emitted::Fork(payloads),
                    followups: Vec::new(),
                }),
            }
        }

        Transformation::NounReference { description, noun } => {
            // `DescriptionSet` qualifies every reference at load time.
            let target = description
                .as_deref()
                .ok_or_else(|| EvalError::UnqualifiedNounReference(noun.clone()))?;
            let description = ctx
                .descriptions
                .get(target)
                .ok_or_else(|| EvalError::UnknownDescription(target.to_string()))?;
            let body = description
                .nouns
                .get(noun)
                .ok_or_else(|| EvalError::UnknownNoun {
                    noun: noun.clone(),
                    description: target.to_string(),
                })?;
            Ok(StepOutcome::Continue {
                emitted: Emitted::Unchanged,
                followups: vec![body.clone()],
            })
        }

        Transformation::If {
            condition,
            then,
            otherwise,
        } => {
            let condition = sub_evaluate_scalar(ctx, value, condition, "condition")?;
            let branch = if condition.truthy() {
                Some(then.as_ref())
            } else {
                otherwise.as_deref()
            };
            Ok(StepOutcome::Continue {
                emitted: Emitted::Unchanged,
                followups: branch.map(|body| vec![body.clone()]).unwrap_or_default(),
            })
        }

        Transformation::Switch {
            discriminant,
            cases,
        } => {
            let discriminant = sub_evaluate_scalar(ctx, value, discriminant, "discriminant")?;
            let case = cases
                .iter()
                .find(|case| case.matches.iter().any(|m| *m == discriminant))
                .ok_or_else(|| EvalError::NoMatchingCase {
                    value: discriminant.to_string(),
                })?;
            Ok(StepOutcome::Continue {
                emitted: Emitted::Unchanged,
                followups: vec![case.body.clone()],
            })
        }

        Transformation::GetVariable { name } => {
            let bound = value
                .variables
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::UnknownVariable(name.clone()))?;
            Ok(replace(ctx.domain.from_scalar(bound)))
        }

        Transformation::SetVariable { name, value: rhs } => {
            let assigned = sub_evaluate_scalar(ctx, value, rhs, "variable assignment")?;
            value.variables.insert(name.clone(), assigned);
            Ok(StepOutcome::Continue {
                emitted: Emitted::Unchanged,
                followups: Vec::new(),
            })
        }

        Transformation::StochasticSwitch { branches } => {
            if branches.is_empty() {
                return Err(EvalError::EmptyStochasticSwitch);
            }
            let draw = rng::unit_draw(ctx.seed, &value.index);
            let mut cumulative = 0.0;
            let mut chosen = branches.len() - 1;
            for (position, branch) in branches.iter().enumerate() {
                cumulative += branch.probability;
                if draw < cumulative {
                    chosen = position;
                    break;
                }
            }
            // Probabilities summing below 1 clamp trailing draws to the
            // last declared branch.
            ctx.observer.stochastic_resolved(&value.index, chosen);
            Ok(StepOutcome::Continue {
                emitted: Emitted::Unchanged,
                followups: vec![branches[chosen].body.clone()],
            })
        }
    }
}

fn replace<P>(payload: P) -> StepOutcome<P> {
    StepOutcome::Continue {
        emitted: Emitted::Replace(payload),
        followups: Vec::new(),
    }
}

/// Clone a value for forkless sub-evaluation: payload via the domain hook,
/// variables map-copied, index unchanged (no fork takes place).
fn clone_for_sub_evaluation<D: Domain>(
    domain: &D,
    base: &Value<D::Payload>,
) -> Value<D::Payload> {
    Value {
        raw: domain.clone_payload(&base.raw),
        index: base.index.clone(),
        variables: base.variables.clone(),
    }
}

/// Run a transformation to completion under the forkless strategy, on an
/// independent clone of `base`, and return the resulting payload.
fn sub_evaluate<D: Domain>(
    ctx: &EvalContext<'_, D>,
    base: &Value<D::Payload>,
    transformation: &Transformation,
) -> EvalResult<D::Payload> {
    evaluate_forkless(ctx, clone_for_sub_evaluation(ctx.domain, base), transformation)
}

/// Like [`sub_evaluate`], then read the payload as a scalar.
fn sub_evaluate_scalar<D: Domain>(
    ctx: &EvalContext<'_, D>,
    base: &Value<D::Payload>,
    transformation: &Transformation,
    context: &str,
) -> EvalResult<Scalar> {
    let payload = sub_evaluate(ctx, base, transformation)?;
    ctx.domain
        .to_scalar(&payload)
        .ok_or_else(|| EvalError::NotScalar {
            context: context.to_string(),
        })
}

/// Depth-first, non-interruptible trampoline that forbids forking.
///
/// Used for every nested evaluation position; also the engine's synchronous
/// entry point for whole descriptions.
pub(crate) fn evaluate_forkless<D: Domain>(
    ctx: &EvalContext<'_, D>,
    mut value: Value<D::Payload>,
    transformation: &Transformation,
) -> EvalResult<D::Payload> {
    let mut stack = vec![transformation.clone()];
    while let Some(next) = stack.pop() {
        ctx.observer.before_apply(&value, &next);
        let outcome = step(ctx, &mut value, &next)?;
        ctx.observer.after_apply(&value, &next);
        match outcome {
            StepOutcome::Continue { emitted, followups } => {
                for followup in followups.into_iter().rev() {
                    stack.push(followup);
                }
                match emitted {
                    Emitted::Unchanged => {}
                    Emitted::Replace(payload) => value.raw = payload,
                    Emitted::Fork(_) => return Err(EvalError::InvalidForkContext),
                }
            }
            StepOutcome::Branch(_) => return Err(EvalError::InvalidForkContext),
        }
    }
    Ok(value.raw)
}

/// Synchronously evaluate one description's root noun to completion.
///
/// The whole evaluation runs under the forkless strategy: programs that
/// fork must go through the scheduler instead. The root value gets fork
/// index `[0]`, matching a single-description scheduler seed.
pub fn evaluate_description<D: Domain>(
    domain: &D,
    operations: &OperationTable<D::Payload>,
    descriptions: &DescriptionSet,
    name: &str,
    seed: u64,
) -> EvalResult<D::Payload> {
    let description = descriptions
        .get(name)
        .ok_or_else(|| EvalError::UnknownDescription(name.to_string()))?;
    let body = description
        .nouns
        .get(&description.root)
        .ok_or_else(|| EvalError::UnknownNoun {
            noun: description.root.clone(),
            description: name.to_string(),
        })?;

    let value = Value::root(
        domain.create_value(&description.initial_variables),
        ForkIndex::seeded(0),
        description.initial_variables.clone(),
    );
    let observer = NoopObserver;
    let ctx = EvalContext {
        domain,
        operations,
        descriptions,
        seed,
        observer: &observer,
    };
    evaluate_forkless(&ctx, value, body)
}

/// Apply a binary operator to two scalars.
fn apply_binary(op: BinaryOp, lhs: Scalar, rhs: Scalar) -> EvalResult<Scalar> {
    use BinaryOp::*;
    use Scalar::{Number, Text};

    let invalid = |lhs: &Scalar, rhs: &Scalar| EvalError::InvalidOperand {
        op: op.symbol().to_string(),
        lhs: lhs.kind_name().to_string(),
        rhs: rhs.kind_name().to_string(),
    };

    match op {
        Add => match (lhs, rhs) {
            (Number(a), Number(b)) => Ok(Number(a + b)),
            (Text(a), Text(b)) => Ok(Text(a + &b)),
            (lhs, rhs) => Err(invalid(&lhs, &rhs)),
        },
        Sub | Mul | Div | Rem => match (&lhs, &rhs) {
            (Number(a), Number(b)) => Ok(Number(match op {
                Sub => a - b,
                Mul => a * b,
                Div => a / b,
                _ => a % b,
            })),
            _ => Err(invalid(&lhs, &rhs)),
        },
        Eq => Ok(Scalar::Bool(lhs == rhs)),
        Ne => Ok(Scalar::Bool(lhs != rhs)),
        Lt | Le | Gt | Ge => match (&lhs, &rhs) {
            (Number(a), Number(b)) => Ok(Scalar::Bool(match op {
                Lt => a < b,
                Le => a <= b,
                Gt => a > b,
                _ => a >= b,
            })),
            _ => Err(invalid(&lhs, &rhs)),
        },
        And => Ok(Scalar::Bool(lhs.truthy() && rhs.truthy())),
        Or => Ok(Scalar::Bool(lhs.truthy() || rhs.truthy())),
    }
}

/// Apply a unary operator to a scalar.
fn apply_unary(op: UnaryOp, operand: Scalar) -> EvalResult<Scalar> {
    match op {
        UnaryOp::Neg => match operand {
            Scalar::Number(num) => Ok(Scalar::Number(-num)),
            other => Err(EvalError::InvalidOperand {
                op: op.symbol().to_string(),
                lhs: other.kind_name().to_string(),
                rhs: other.kind_name().to_string(),
            }),
        },
        UnaryOp::Not => Ok(Scalar::Bool(!operand.truthy())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::domain::ScalarDomain;

    #[test]
    fn bare_noun_references_are_rejected_with_the_noun_name() {
        // A reference that never went through `DescriptionSet` loading.
        let reference = Transformation::noun("ghost");
        let descriptions = DescriptionSet::default();
        let operations = OperationTable::new();
        let observer = NoopObserver;
        let ctx = EvalContext {
            domain: &ScalarDomain,
            operations: &operations,
            descriptions: &descriptions,
            seed: 0,
            observer: &observer,
        };
        let mut value = Value::root(
            Scalar::Number(0.0),
            ForkIndex::seeded(0),
            Default::default(),
        );

        match step(&ctx, &mut value, &reference) {
            Err(error) => assert_eq!(
                error,
                EvalError::UnqualifiedNounReference("ghost".to_string())
            ),
            Ok(_) => panic!("bare reference was accepted"),
        }
    }

    #[test]
    fn arithmetic_and_comparison_operators() {
        let n = Scalar::Number;
        assert_eq!(apply_binary(BinaryOp::Add, n(2.0), n(3.0)), Ok(n(5.0)));
        assert_eq!(apply_binary(BinaryOp::Rem, n(7.0), n(4.0)), Ok(n(3.0)));
        assert_eq!(
            apply_binary(BinaryOp::Le, n(2.0), n(2.0)),
            Ok(Scalar::Bool(true))
        );
        assert_eq!(
            apply_binary(BinaryOp::Eq, Scalar::Text("a".into()), Scalar::Text("a".into())),
            Ok(Scalar::Bool(true))
        );
    }

    #[test]
    fn text_concatenation_via_add() {
        assert_eq!(
            apply_binary(BinaryOp::Add, "ab".into(), "cd".into()),
            Ok(Scalar::Text("abcd".into()))
        );
    }

    #[test]
    fn mismatched_operands_are_rejected() {
        let err = apply_binary(BinaryOp::Mul, Scalar::Bool(true), Scalar::Number(2.0));
        assert!(matches!(err, Err(EvalError::InvalidOperand { .. })));
    }

    #[test]
    fn unary_operators() {
        assert_eq!(
            apply_unary(UnaryOp::Neg, Scalar::Number(4.0)),
            Ok(Scalar::Number(-4.0))
        );
        assert_eq!(
            apply_unary(UnaryOp::Not, Scalar::Number(0.0)),
            Ok(Scalar::Bool(true))
        );
    }
}
