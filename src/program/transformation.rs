//! Transformation AST for the weft language.
//!
//! A transformation is one instruction node in a program's instruction tree.
//! Transformations are immutable program data: evaluation never mutates them,
//! it only produces new values. The enum is serde-taggable so programs can be
//! authored and loaded as plain data.

use serde::{Deserialize, Serialize};

/// Literal value used for raw constants, switch match sets, and variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Boolean literal.
    Bool(bool),
    /// Numeric literal (all numbers are doubles).
    Number(f64),
    /// UTF-8 text literal.
    Text(String),
}

impl Scalar {
    /// Truthiness used by conditionals and logical operators: `false`, `0`,
    /// `NaN`, and the empty string are falsy, everything else is truthy.
    pub fn truthy(&self) -> bool {
        match self {
            Scalar::Bool(flag) => *flag,
            Scalar::Number(num) => *num != 0.0 && !num.is_nan(),
            Scalar::Text(text) => !text.is_empty(),
        }
    }

    /// Numeric view, if this scalar is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(num) => Some(*num),
            _ => None,
        }
    }

    /// Human-readable kind name for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Scalar::Bool(_) => "bool",
            Scalar::Number(_) => "number",
            Scalar::Text(_) => "text",
        }
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Bool(flag) => write!(f, "{flag}"),
            Scalar::Number(num) => write!(f, "{num}"),
            Scalar::Text(text) => write!(f, "{text}"),
        }
    }
}

impl From<f64> for Scalar {
    fn from(num: f64) -> Self {
        Scalar::Number(num)
    }
}

impl From<bool> for Scalar {
    fn from(flag: bool) -> Self {
        Scalar::Bool(flag)
    }
}

impl From<&str> for Scalar {
    fn from(text: &str) -> Self {
        Scalar::Text(text.to_string())
    }
}

/// Binary operator applied to two synchronously evaluated operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    /// Numeric addition or text concatenation.
    #[serde(rename = "+")]
    Add,
    /// Numeric subtraction.
    #[serde(rename = "-")]
    Sub,
    /// Numeric multiplication.
    #[serde(rename = "*")]
    Mul,
    /// Numeric division.
    #[serde(rename = "/")]
    Div,
    /// Numeric remainder.
    #[serde(rename = "%")]
    Rem,
    /// Scalar equality.
    #[serde(rename = "==")]
    Eq,
    /// Scalar inequality.
    #[serde(rename = "!=")]
    Ne,
    /// Numeric less-than.
    #[serde(rename = "<")]
    Lt,
    /// Numeric less-or-equal.
    #[serde(rename = "<=")]
    Le,
    /// Numeric greater-than.
    #[serde(rename = ">")]
    Gt,
    /// Numeric greater-or-equal.
    #[serde(rename = ">=")]
    Ge,
    /// Logical conjunction of operand truthiness.
    #[serde(rename = "&&")]
    And,
    /// Logical disjunction of operand truthiness.
    #[serde(rename = "||")]
    Or,
}

impl BinaryOp {
    /// Operator symbol as written in programs.
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

/// Unary operator applied to one synchronously evaluated operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Numeric negation.
    #[serde(rename = "-")]
    Neg,
    /// Logical negation of truthiness.
    #[serde(rename = "!")]
    Not,
}

impl UnaryOp {
    /// Operator symbol as written in programs.
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        }
    }
}

/// One arm of a multi-way switch: a set of literal matches and a body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    /// Literals the discriminant is compared against.
    pub matches: Vec<Scalar>,
    /// Body evaluated when any literal matches.
    pub body: Transformation,
}

/// One weighted arm of a stochastic switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StochasticBranch {
    /// Probability mass of this branch, as a fraction in `[0, 1]`.
    pub probability: f64,
    /// Body evaluated when this branch is drawn.
    pub body: Transformation,
}

/// One instruction node in a program's instruction tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Transformation {
    /// Constant: replaces the flowing value's payload with a literal.
    Raw {
        /// The literal constant.
        value: Scalar,
    },
    /// Identity: reads the current value unchanged.
    This,
    /// Binary operator over two forkless operands.
    Binary {
        /// The operator.
        op: BinaryOp,
        /// Left operand, evaluated synchronously on a clone.
        lhs: Box<Transformation>,
        /// Right operand, evaluated synchronously on a clone.
        rhs: Box<Transformation>,
    },
    /// Unary operator over one forkless operand.
    Unary {
        /// The operator.
        op: UnaryOp,
        /// Operand, evaluated synchronously on a clone.
        operand: Box<Transformation>,
    },
    /// Sequential composition: each step applies to the same flowing value,
    /// one scheduler step at a time.
    Sequential {
        /// Steps in application order.
        steps: Vec<Transformation>,
    },
    /// Parallel composition: each branch forks an independent copy of the
    /// flowing value.
    Parallel {
        /// Branches, each seeding one forked lineage.
        branches: Vec<Transformation>,
    },
    /// Invocation of a named host-supplied domain operation.
    Operation {
        /// Name looked up in the host operation table.
        name: String,
        /// Argument transformations, each evaluated synchronously on a clone.
        #[serde(default)]
        arguments: Vec<Transformation>,
    },
    /// Jump to another noun's body (tail call; enables recursion).
    #[serde(rename_all = "camelCase")]
    NounReference {
        /// Target description; `None` means the containing description and is
        /// qualified at load time.
        #[serde(default)]
        description: Option<String>,
        /// Target noun within that description.
        noun: String,
    },
    /// Conditional branch on the truthiness of a forkless condition.
    If {
        /// Condition, evaluated synchronously on a clone.
        condition: Box<Transformation>,
        /// Branch taken when the condition is truthy.
        then: Box<Transformation>,
        /// Branch taken otherwise; absent means pass the value through.
        #[serde(default)]
        otherwise: Option<Box<Transformation>>,
    },
    /// Multi-way dispatch over literal match sets, scanned in declaration
    /// order.
    Switch {
        /// Discriminant, evaluated synchronously on a clone.
        discriminant: Box<Transformation>,
        /// Case arms in declaration order.
        cases: Vec<SwitchCase>,
    },
    /// Read a variable from the flowing value into its payload.
    GetVariable {
        /// Variable name.
        name: String,
    },
    /// Assign a variable on the flowing value.
    SetVariable {
        /// Variable name.
        name: String,
        /// Right-hand side, evaluated synchronously on a clone.
        value: Box<Transformation>,
    },
    /// Weighted random branch selection, deterministic under the run seed
    /// and the value's fork index.
    StochasticSwitch {
        /// Weighted arms in declaration order.
        branches: Vec<StochasticBranch>,
    },
}

impl Transformation {
    /// Shorthand for a raw constant.
    pub fn raw(value: impl Into<Scalar>) -> Self {
        Transformation::Raw {
            value: value.into(),
        }
    }

    /// Shorthand for a binary operator node.
    pub fn binary(op: BinaryOp, lhs: Transformation, rhs: Transformation) -> Self {
        Transformation::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Shorthand for a sequential composition.
    pub fn sequential(steps: Vec<Transformation>) -> Self {
        Transformation::Sequential { steps }
    }

    /// Shorthand for a noun reference within the containing description.
    pub fn noun(noun: impl Into<String>) -> Self {
        Transformation::NounReference {
            description: None,
            noun: noun.into(),
        }
    }
}
