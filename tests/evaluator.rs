//! Synchronous evaluation semantics: operators, composition, recursion,
//! dispatch, variables, stochastic branching, and the error taxonomy.

use std::collections::BTreeMap;

use weft::program::{
    BinaryOp, Description, DescriptionSet, Scalar, StochasticBranch, SwitchCase, Transformation,
    UnaryOp,
};
use weft::runtime::{
    evaluate_description, EvalError, Operation, OperationOutcome, OperationTable, ScalarDomain,
};

fn description(nouns: Vec<(&str, Transformation)>, root: &str) -> Description {
    Description::new(
        "main",
        nouns
            .into_iter()
            .map(|(name, body)| (name.to_string(), body))
            .collect(),
        root,
    )
}

fn program(nouns: Vec<(&str, Transformation)>, root: &str) -> DescriptionSet {
    DescriptionSet::new(vec![description(nouns, root)])
}

fn eval(set: &DescriptionSet) -> Result<Scalar, EvalError> {
    eval_with(set, &OperationTable::new(), 0)
}

fn eval_with(
    set: &DescriptionSet,
    operations: &OperationTable<Scalar>,
    seed: u64,
) -> Result<Scalar, EvalError> {
    evaluate_description(&ScalarDomain, operations, set, "main", seed)
}

fn number(value: f64) -> Scalar {
    Scalar::Number(value)
}

#[test]
fn sequential_composition_threads_one_flowing_value() {
    // 10 -> this * 10 -> this + 1
    let set = program(
        vec![(
            "a",
            Transformation::sequential(vec![
                Transformation::raw(10.0),
                Transformation::binary(BinaryOp::Mul, Transformation::This, Transformation::raw(10.0)),
                Transformation::binary(BinaryOp::Add, Transformation::This, Transformation::raw(1.0)),
            ]),
        )],
        "a",
    );

    assert_eq!(eval(&set).unwrap(), number(101.0));
}

#[test]
fn conditional_recursion_terminates_at_zero() {
    // countdown: if this == 0 then { 0 } else { this - 1 -> countdown }
    let countdown = Transformation::If {
        condition: Box::new(Transformation::binary(
            BinaryOp::Eq,
            Transformation::This,
            Transformation::raw(0.0),
        )),
        then: Box::new(Transformation::raw(0.0)),
        otherwise: Some(Box::new(Transformation::sequential(vec![
            Transformation::binary(BinaryOp::Sub, Transformation::This, Transformation::raw(1.0)),
            Transformation::noun("countdown"),
        ]))),
    };
    let set = program(
        vec![
            ("countdown", countdown),
            (
                "start",
                Transformation::sequential(vec![
                    Transformation::raw(7.0),
                    Transformation::noun("countdown"),
                ]),
            ),
        ],
        "start",
    );

    assert_eq!(eval(&set).unwrap(), number(0.0));
}

#[test]
fn deep_recursion_does_not_overflow_the_call_stack() {
    let countdown = Transformation::If {
        condition: Box::new(Transformation::binary(
            BinaryOp::Eq,
            Transformation::This,
            Transformation::raw(0.0),
        )),
        then: Box::new(Transformation::raw(0.0)),
        otherwise: Some(Box::new(Transformation::sequential(vec![
            Transformation::binary(BinaryOp::Sub, Transformation::This, Transformation::raw(1.0)),
            Transformation::noun("countdown"),
        ]))),
    };
    let set = program(
        vec![
            ("countdown", countdown),
            (
                "start",
                Transformation::sequential(vec![
                    Transformation::raw(200_000.0),
                    Transformation::noun("countdown"),
                ]),
            ),
        ],
        "start",
    );

    assert_eq!(eval(&set).unwrap(), number(0.0));
}

#[test]
fn switch_dispatches_through_noun_references() {
    // 2 -> switch this { case 2: b, case 3: c }
    // b: if true then { this * 10 -> c } else { c }
    // c: (20 * d)
    // d: this / 2 -> this * 2
    let root = Transformation::sequential(vec![
        Transformation::raw(2.0),
        Transformation::Switch {
            discriminant: Box::new(Transformation::This),
            cases: vec![
                SwitchCase {
                    matches: vec![number(2.0)],
                    body: Transformation::noun("b"),
                },
                SwitchCase {
                    matches: vec![number(3.0)],
                    body: Transformation::noun("c"),
                },
            ],
        },
    ]);
    let b = Transformation::If {
        condition: Box::new(Transformation::raw(true)),
        then: Box::new(Transformation::sequential(vec![
            Transformation::binary(BinaryOp::Mul, Transformation::This, Transformation::raw(10.0)),
            Transformation::noun("c"),
        ])),
        otherwise: Some(Box::new(Transformation::noun("c"))),
    };
    let c = Transformation::binary(
        BinaryOp::Mul,
        Transformation::raw(20.0),
        Transformation::noun("d"),
    );
    let d = Transformation::sequential(vec![
        Transformation::binary(BinaryOp::Div, Transformation::This, Transformation::raw(2.0)),
        Transformation::binary(BinaryOp::Mul, Transformation::This, Transformation::raw(2.0)),
    ]);
    let set = program(vec![("a", root), ("b", b), ("c", c), ("d", d)], "a");

    assert_eq!(eval(&set).unwrap(), number(400.0));
}

#[test]
fn unknown_noun_names_the_noun_and_its_description() {
    let set = program(vec![("a", Transformation::noun("b"))], "a");

    let error = eval(&set).unwrap_err();
    assert_eq!(
        error,
        EvalError::UnknownNoun {
            noun: "b".to_string(),
            description: "main".to_string(),
        }
    );
    let message = error.to_string();
    assert!(message.contains("'b'"), "message: {message}");
    assert!(message.contains("'main'"), "message: {message}");
}

#[test]
fn unknown_description_is_reported() {
    let set = program(
        vec![(
            "a",
            Transformation::NounReference {
                description: Some("elsewhere".to_string()),
                noun: "b".to_string(),
            },
        )],
        "a",
    );

    assert_eq!(
        eval(&set).unwrap_err(),
        EvalError::UnknownDescription("elsewhere".to_string())
    );
}

#[test]
fn unknown_root_noun_is_reported() {
    let set = program(vec![("a", Transformation::raw(1.0))], "missing");

    assert_eq!(
        eval(&set).unwrap_err(),
        EvalError::UnknownNoun {
            noun: "missing".to_string(),
            description: "main".to_string(),
        }
    );
}

#[test]
fn variables_are_set_and_read_on_the_flowing_value() {
    let set = program(
        vec![(
            "a",
            Transformation::sequential(vec![
                Transformation::raw(10.0),
                Transformation::SetVariable {
                    name: "x".to_string(),
                    value: Box::new(Transformation::binary(
                        BinaryOp::Add,
                        Transformation::This,
                        Transformation::raw(5.0),
                    )),
                },
                Transformation::raw(0.0),
                Transformation::GetVariable {
                    name: "x".to_string(),
                },
            ]),
        )],
        "a",
    );

    assert_eq!(eval(&set).unwrap(), number(15.0));
}

#[test]
fn initial_variables_seed_the_root_value() {
    let mut description = description(
        vec![(
            "a",
            Transformation::GetVariable {
                name: "start".to_string(),
            },
        )],
        "a",
    );
    description.initial_variables = BTreeMap::from([("start".to_string(), number(42.0))]);
    let set = DescriptionSet::new(vec![description]);

    assert_eq!(eval(&set).unwrap(), number(42.0));
}

#[test]
fn reading_an_unset_variable_fails() {
    let set = program(
        vec![(
            "a",
            Transformation::GetVariable {
                name: "ghost".to_string(),
            },
        )],
        "a",
    );

    assert_eq!(
        eval(&set).unwrap_err(),
        EvalError::UnknownVariable("ghost".to_string())
    );
}

#[test]
fn switch_without_a_matching_case_fails() {
    let set = program(
        vec![(
            "a",
            Transformation::sequential(vec![
                Transformation::raw(9.0),
                Transformation::Switch {
                    discriminant: Box::new(Transformation::This),
                    cases: vec![SwitchCase {
                        matches: vec![number(1.0), number(2.0)],
                        body: Transformation::raw(0.0),
                    }],
                },
            ]),
        )],
        "a",
    );

    assert_eq!(
        eval(&set).unwrap_err(),
        EvalError::NoMatchingCase {
            value: "9".to_string()
        }
    );
}

#[test]
fn if_without_else_passes_the_value_through() {
    let set = program(
        vec![(
            "a",
            Transformation::sequential(vec![
                Transformation::raw(5.0),
                Transformation::If {
                    condition: Box::new(Transformation::raw(false)),
                    then: Box::new(Transformation::raw(99.0)),
                    otherwise: None,
                },
            ]),
        )],
        "a",
    );

    assert_eq!(eval(&set).unwrap(), number(5.0));
}

#[test]
fn unary_operators_apply_to_the_flowing_value() {
    let set = program(
        vec![(
            "a",
            Transformation::sequential(vec![
                Transformation::raw(4.0),
                Transformation::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(Transformation::This),
                },
            ]),
        )],
        "a",
    );
    assert_eq!(eval(&set).unwrap(), number(-4.0));

    let set = program(
        vec![(
            "a",
            Transformation::Unary {
                op: UnaryOp::Not,
                operand: Box::new(Transformation::raw(false)),
            },
        )],
        "a",
    );
    assert_eq!(eval(&set).unwrap(), Scalar::Bool(true));
}

#[test]
fn text_concatenation_flows_like_numbers() {
    let set = program(
        vec![(
            "a",
            Transformation::sequential(vec![
                Transformation::raw("ab"),
                Transformation::binary(BinaryOp::Add, Transformation::This, Transformation::raw("cd")),
            ]),
        )],
        "a",
    );

    assert_eq!(eval(&set).unwrap(), Scalar::Text("abcd".to_string()));
}

fn doubling_table() -> OperationTable<Scalar> {
    let mut operations = OperationTable::new();
    operations.register(
        "double",
        Operation::new(true, |arguments: Vec<Scalar>| {
            let n = arguments[0].as_number().ok_or("expected a number")?;
            Ok(OperationOutcome::One(Scalar::Number(n * 2.0)))
        }),
    );
    operations
}

#[test]
fn operations_receive_the_flowing_value_when_include_this_is_set() {
    let set = program(
        vec![(
            "a",
            Transformation::sequential(vec![
                Transformation::raw(21.0),
                Transformation::Operation {
                    name: "double".to_string(),
                    arguments: Vec::new(),
                },
            ]),
        )],
        "a",
    );

    assert_eq!(eval_with(&set, &doubling_table(), 0).unwrap(), number(42.0));
}

#[test]
fn operation_defaults_fill_omitted_arguments() {
    let mut operations = OperationTable::new();
    operations.register(
        "sum",
        Operation::new(false, |arguments: Vec<Scalar>| {
            let total: f64 = arguments.iter().filter_map(Scalar::as_number).sum();
            Ok(OperationOutcome::One(Scalar::Number(total)))
        })
        .with_defaults(vec![number(3.0), number(4.0)]),
    );

    // One explicit argument; the second comes from the defaults.
    let set = program(
        vec![(
            "a",
            Transformation::Operation {
                name: "sum".to_string(),
                arguments: vec![Transformation::raw(10.0)],
            },
        )],
        "a",
    );

    assert_eq!(eval_with(&set, &operations, 0).unwrap(), number(14.0));
}

#[test]
fn unknown_operation_is_reported() {
    let set = program(
        vec![(
            "a",
            Transformation::Operation {
                name: "vanish".to_string(),
                arguments: Vec::new(),
            },
        )],
        "a",
    );

    assert_eq!(
        eval(&set).unwrap_err(),
        EvalError::UnknownOperation("vanish".to_string())
    );
}

#[test]
fn operation_failures_name_the_operation() {
    let mut operations = OperationTable::new();
    operations.register(
        "explode",
        Operation::new(false, |_: Vec<Scalar>| Err("boom".to_string())),
    );
    let set = program(
        vec![(
            "a",
            Transformation::Operation {
                name: "explode".to_string(),
                arguments: Vec::new(),
            },
        )],
        "a",
    );

    assert_eq!(
        eval_with(&set, &operations, 0).unwrap_err(),
        EvalError::OperationFailed {
            name: "explode".to_string(),
            detail: "boom".to_string(),
        }
    );
}

#[test]
fn forking_inside_an_operand_is_fatal() {
    let mut operations = OperationTable::new();
    operations.register(
        "split",
        Operation::new(false, |_: Vec<Scalar>| {
            Ok(OperationOutcome::Many(vec![number(1.0), number(2.0)]))
        }),
    );
    // The forking operation sits in operand position.
    let set = program(
        vec![(
            "a",
            Transformation::binary(
                BinaryOp::Add,
                Transformation::Operation {
                    name: "split".to_string(),
                    arguments: Vec::new(),
                },
                Transformation::raw(1.0),
            ),
        )],
        "a",
    );

    assert_eq!(
        eval_with(&set, &operations, 0).unwrap_err(),
        EvalError::InvalidForkContext
    );
}

#[test]
fn parallel_composition_is_rejected_in_synchronous_evaluation() {
    let set = program(
        vec![(
            "a",
            Transformation::Parallel {
                branches: vec![Transformation::raw(1.0), Transformation::raw(2.0)],
            },
        )],
        "a",
    );

    assert_eq!(eval(&set).unwrap_err(), EvalError::InvalidForkContext);
}

fn quartered(bodies: [f64; 4]) -> DescriptionSet {
    program(
        vec![(
            "a",
            Transformation::StochasticSwitch {
                branches: bodies
                    .into_iter()
                    .map(|value| StochasticBranch {
                        probability: 0.25,
                        body: Transformation::raw(value),
                    })
                    .collect(),
            },
        )],
        "a",
    )
}

#[test]
fn stochastic_switch_is_deterministic_under_a_seed() {
    let set = quartered([1.0, 2.0, 3.0, 4.0]);
    for seed in [0, 4, 8, 3, 50, 1234] {
        let first = eval_with(&set, &OperationTable::new(), seed).unwrap();
        let second = eval_with(&set, &OperationTable::new(), seed).unwrap();
        assert_eq!(first, second, "seed {seed} was not reproducible");
    }
}

#[test]
fn stochastic_branch_frequencies_approximate_declared_probabilities() {
    let set = quartered([1.0, 2.0, 3.0, 4.0]);
    let mut counts = [0usize; 4];
    let samples = 400;
    for seed in 0..samples {
        match eval_with(&set, &OperationTable::new(), seed).unwrap() {
            Scalar::Number(n) => counts[n as usize - 1] += 1,
            other => panic!("unexpected result: {other:?}"),
        }
    }
    // Expected 100 each; allow a wide band.
    for (branch, count) in counts.iter().enumerate() {
        assert!(
            (50..=150).contains(count),
            "branch {branch} drawn {count} times out of {samples}"
        );
    }
}

#[test]
fn stochastic_draws_past_the_declared_mass_clamp_to_the_last_branch() {
    // Probabilities sum to 0.4; every draw must still land on a branch.
    let set = program(
        vec![(
            "a",
            Transformation::StochasticSwitch {
                branches: vec![
                    StochasticBranch {
                        probability: 0.2,
                        body: Transformation::raw(1.0),
                    },
                    StochasticBranch {
                        probability: 0.2,
                        body: Transformation::raw(2.0),
                    },
                ],
            },
        )],
        "a",
    );

    for seed in 0..100 {
        let result = eval_with(&set, &OperationTable::new(), seed).unwrap();
        assert!(
            result == number(1.0) || result == number(2.0),
            "seed {seed} produced {result:?}"
        );
    }
}

#[test]
fn empty_stochastic_switch_is_rejected() {
    let set = program(
        vec![(
            "a",
            Transformation::StochasticSwitch {
                branches: Vec::new(),
            },
        )],
        "a",
    );

    assert_eq!(eval(&set).unwrap_err(), EvalError::EmptyStochasticSwitch);
}

#[test]
fn cross_description_references_resolve() {
    let lib = Description::new(
        "lib",
        BTreeMap::from([(
            "square".to_string(),
            Transformation::binary(BinaryOp::Mul, Transformation::This, Transformation::This),
        )]),
        "square",
    );
    let main = Description::new(
        "main",
        BTreeMap::from([(
            "a".to_string(),
            Transformation::sequential(vec![
                Transformation::raw(6.0),
                Transformation::NounReference {
                    description: Some("lib".to_string()),
                    noun: "square".to_string(),
                },
            ]),
        )]),
        "a",
    );
    let set = DescriptionSet::new(vec![lib, main]);

    assert_eq!(eval(&set).unwrap(), number(36.0));
}
