//! Per-lineage computation state: payload, fork index, and variables.

use serde::{Deserialize, Serialize};

use crate::program::Bindings;

/// Ordered integer path identifying a value's position in the tree of
/// parallel forks.
///
/// Child fork `k` appends `k` to its parent's index. The index seeds
/// deterministic stochastic draws and distinguishes otherwise-identical
/// lineages, so it is extended on fork and never rewritten.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForkIndex(Vec<u32>);

impl ForkIndex {
    /// The empty index of a value that has never forked.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Index with a single component, used when seeding root values.
    pub fn seeded(position: u32) -> Self {
        Self(vec![position])
    }

    /// Index of the `k`-th child fork of this value.
    pub fn child(&self, k: u32) -> Self {
        let mut parts = self.0.clone();
        parts.push(k);
        Self(parts)
    }

    /// Components of the path, outermost fork first.
    pub fn parts(&self) -> &[u32] {
        &self.0
    }
}

impl std::fmt::Display for ForkIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for part in &self.0 {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{part}")?;
            first = false;
        }
        Ok(())
    }
}

/// The mutable unit of computation flowing through evaluation.
///
/// A value is created once (at a description root, or via forking) and is
/// exclusively owned by at most one queue entry at a time. The payload is
/// opaque to the core and manipulated only through host-supplied hooks;
/// variables are private to this value's lineage and copied, not shared,
/// on fork.
#[derive(Debug)]
pub struct Value<P> {
    /// Current domain-specific payload.
    pub raw: P,
    /// Position in the tree of parallel forks.
    pub index: ForkIndex,
    /// Lineage-private variable bindings.
    pub variables: Bindings,
}

impl<P> Value<P> {
    /// Materialize a root value for a description.
    pub fn root(raw: P, index: ForkIndex, variables: Bindings) -> Self {
        Self {
            raw,
            index,
            variables,
        }
    }
}

/// Immutable view of one queued value, published in result snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueSnapshot<P> {
    /// Payload at the moment of the snapshot.
    pub raw: P,
    /// Fork index of the lineage.
    pub index: ForkIndex,
    /// Variable bindings of the lineage.
    pub variables: Bindings,
    /// Whether the lineage has no instructions left to apply.
    pub completed: bool,
}
