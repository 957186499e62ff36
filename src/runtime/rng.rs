//! Deterministic stochastic draws.
//!
//! A draw depends only on the global run seed and the drawing value's fork
//! index, never on scheduling order or timing: identical seed and index
//! always select the same branch, which keeps time-sliced, reorderable
//! execution reproducible.

use crate::runtime::value::ForkIndex;

/// Map (seed, fork index) to a uniform draw in `[0, 1)`.
pub(crate) fn unit_draw(seed: u64, index: &ForkIndex) -> f64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&seed.to_le_bytes());
    for part in index.parts() {
        hasher.update(&u64::from(*part).to_le_bytes());
    }
    let digest = hasher.finalize();

    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest.as_bytes()[..8]);
    // 53 mantissa bits give an exact dyadic rational in [0, 1).
    (u64::from_le_bytes(bytes) >> 11) as f64 / (1u64 << 53) as f64
}
