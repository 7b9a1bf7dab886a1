//! The uniform random source consumed by sampling and traversal.
//!
//! Every `sample`, `pop` and traversal step takes one draw from a caller
//! supplied source. Any [`rand::Rng`] works; for reproducible runs use
//! [`seeded`].
//!
//! The collection itself does no synchronization, so a source shared between
//! threads must be synchronized by the caller.

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

/// A source of uniform floats.
pub trait RandomSource {
    /// Returns a value uniformly distributed in `[0, bound)`.
    ///
    /// A bound that is not strictly positive and finite yields `0.0`.
    fn next_below(&mut self, bound: f32) -> f32;
}

impl<R: Rng + ?Sized> RandomSource for R {
    fn next_below(&mut self, bound: f32) -> f32 {
        if !(bound.is_finite() && bound > 0.0) {
            return 0.0;
        }
        return self.gen_range(0.0..bound);
    }
}

/// A deterministic generator for a given seed.
pub fn seeded(seed: u64) -> StdRng {
    return StdRng::seed_from_u64(seed);
}
