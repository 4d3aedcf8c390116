//! Deterministic RNG utilities for reproducible tests.

use actorlink_core::types::Observation;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Create a deterministic `ChaCha8Rng` from a seed.
///
/// All test randomization should go through this to ensure reproducibility.
pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Generate a deterministic `Vec<f32>` in `[-1, 1)` of length `dim` from a seed.
pub fn deterministic_vec(dim: usize, seed: u64) -> Vec<f32> {
    let mut rng = seeded_rng(seed);
    (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

/// A random observation of length `dim` drawn from `rng`.
pub fn random_observation(rng: &mut impl Rng, dim: usize) -> Observation {
    Observation::new((0..dim).map(|_| rng.r#gen::<f32>()).collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
