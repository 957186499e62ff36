//! Program data model: descriptions, nouns, and the transformation AST.
//!
//! A description is a named unit of a program: initial variable bindings, a
//! noun → transformation map, and a designated root noun. Descriptions are
//! immutable once loaded; they are the read-only program being interpreted.

pub mod transformation;

pub use transformation::{
    BinaryOp, Scalar, StochasticBranch, SwitchCase, Transformation, UnaryOp,
};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Initial variable bindings of a description (name → constant).
pub type Bindings = BTreeMap<String, Scalar>;

/// A named program unit: initial variables, nouns, and a root noun.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Description {
    /// Description identifier, unique within a [`DescriptionSet`].
    pub name: String,
    /// Initial variable bindings installed on the root value.
    #[serde(default)]
    pub initial_variables: Bindings,
    /// Named, potentially recursive transformation bodies.
    pub nouns: BTreeMap<String, Transformation>,
    /// Noun evaluation starts from.
    pub root: String,
}

impl Description {
    /// Create a description with no initial variables.
    pub fn new(
        name: impl Into<String>,
        nouns: BTreeMap<String, Transformation>,
        root: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            initial_variables: Bindings::new(),
            nouns,
            root: root.into(),
        }
    }
}

/// The read-only set of descriptions a run interprets.
///
/// On construction every unqualified noun reference is qualified with its
/// containing description's name, so resolution never depends on which
/// description a value is currently flowing through.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Description>", into = "Vec<Description>")]
pub struct DescriptionSet {
    descriptions: BTreeMap<String, Description>,
}

impl DescriptionSet {
    /// Build a set from descriptions, qualifying noun references.
    pub fn new(descriptions: impl IntoIterator<Item = Description>) -> Self {
        let mut map = BTreeMap::new();
        for mut description in descriptions {
            let owner = description.name.clone();
            for body in description.nouns.values_mut() {
                qualify(body, &owner);
            }
            map.insert(owner, description);
        }
        Self { descriptions: map }
    }

    /// Look up a description by name.
    pub fn get(&self, name: &str) -> Option<&Description> {
        self.descriptions.get(name)
    }

    /// Iterate descriptions in deterministic (name) order.
    pub fn iter(&self) -> impl Iterator<Item = &Description> {
        self.descriptions.values()
    }

    /// Number of descriptions in the set.
    pub fn len(&self) -> usize {
        self.descriptions.len()
    }

    /// Whether the set contains no descriptions.
    pub fn is_empty(&self) -> bool {
        self.descriptions.is_empty()
    }
}

impl From<Vec<Description>> for DescriptionSet {
    fn from(descriptions: Vec<Description>) -> Self {
        Self::new(descriptions)
    }
}

impl From<DescriptionSet> for Vec<Description> {
    fn from(set: DescriptionSet) -> Self {
        set.descriptions.into_values().collect()
    }
}

/// Fill in the containing description on every unqualified noun reference.
fn qualify(transformation: &mut Transformation, owner: &str) {
    match transformation {
        Transformation::NounReference { description, .. } => {
            if description.is_none() {
                *description = Some(owner.to_string());
            }
        }
        Transformation::Binary { lhs, rhs, .. } => {
            qualify(lhs, owner);
            qualify(rhs, owner);
        }
        Transformation::Unary { operand, .. } => qualify(operand, owner),
        Transformation::Sequential { steps } => {
            for step in steps {
                qualify(step, owner);
            }
        }
        Transformation::Parallel { branches } => {
            for branch in branches {
                qualify(branch, owner);
            }
        }
        Transformation::Operation { arguments, .. } => {
            for argument in arguments {
                qualify(argument, owner);
            }
        }
        Transformation::If {
            condition,
            then,
            otherwise,
        } => {
            qualify(condition, owner);
            qualify(then, owner);
            if let Some(otherwise) = otherwise {
                qualify(otherwise, owner);
            }
        }
        Transformation::Switch {
            discriminant,
            cases,
        } => {
            qualify(discriminant, owner);
            for case in cases {
                qualify(&mut case.body, owner);
            }
        }
        Transformation::SetVariable { value, .. } => qualify(value, owner),
        Transformation::StochasticSwitch { branches } => {
            for branch in branches {
                qualify(&mut branch.body, owner);
            }
        }
        Transformation::Raw { .. }
        | Transformation::This
        | Transformation::GetVariable { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_noun_set(body: Transformation) -> DescriptionSet {
        let mut nouns = BTreeMap::new();
        nouns.insert("a".to_string(), body);
        DescriptionSet::new(vec![Description::new("main", nouns, "a")])
    }

    #[test]
    fn unqualified_references_are_qualified_with_their_owner() {
        let set = single_noun_set(Transformation::sequential(vec![
            Transformation::raw(1.0),
            Transformation::noun("a"),
        ]));

        let body = &set.get("main").unwrap().nouns["a"];
        match body {
            Transformation::Sequential { steps } => match &steps[1] {
                Transformation::NounReference { description, noun } => {
                    assert_eq!(description.as_deref(), Some("main"));
                    assert_eq!(noun, "a");
                }
                other => panic!("unexpected node: {other:?}"),
            },
            other => panic!("unexpected node: {other:?}"),
        }
    }

    #[test]
    fn explicit_qualification_is_preserved() {
        let set = single_noun_set(Transformation::NounReference {
            description: Some("other".to_string()),
            noun: "b".to_string(),
        });

        let body = &set.get("main").unwrap().nouns["a"];
        match body {
            Transformation::NounReference { description, .. } => {
                assert_eq!(description.as_deref(), Some("other"));
            }
            other => panic!("unexpected node: {other:?}"),
        }
    }

    #[test]
    fn description_set_loads_from_json() {
        let json = r#"[{
            "name": "main",
            "initialVariables": { "limit": 3 },
            "nouns": {
                "a": { "kind": "sequential", "steps": [
                    { "kind": "raw", "value": 1 },
                    { "kind": "nounReference", "noun": "a" }
                ] }
            },
            "root": "a"
        }]"#;

        let set: DescriptionSet = serde_json::from_str(json).unwrap();
        let description = set.get("main").unwrap();
        assert_eq!(description.root, "a");
        assert_eq!(
            description.initial_variables["limit"],
            Scalar::Number(3.0)
        );
        // References picked up their owner during deserialization.
        match &description.nouns["a"] {
            Transformation::Sequential { steps } => match &steps[1] {
                Transformation::NounReference { description, .. } => {
                    assert_eq!(description.as_deref(), Some("main"));
                }
                other => panic!("unexpected node: {other:?}"),
            },
            other => panic!("unexpected node: {other:?}"),
        }
    }
}
