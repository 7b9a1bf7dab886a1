//! Errors reported by [`WeightedRandomSet`](crate::WeightedRandomSet) and its
//! traversals.
//!
//! Validation happens at the call that caused the problem. Nothing is clamped
//! or corrected, and a failed call leaves the collection untouched.

use thiserror::Error;

/// Errors that can occur while mutating or traversing a set.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum Error {
    /// The weight was zero, negative, NaN or infinite, or adding it would
    /// make the total weight overflow.
    #[error("weight must be positive and finite and keep the total finite, got {0}")]
    InvalidWeight(f32),

    /// The collection changed membership, or another pass claimed the
    /// per-pass state, since this traversal started.
    #[error("traversal is no longer valid: the set changed since it started")]
    StaleTraversal,

    /// Every element has already been visited.
    #[error("traversal is exhausted")]
    Exhausted,
}

impl Error {
    /// Returns true for the invalid-state family (stale or exhausted traversal).
    pub fn is_invalid_state(&self) -> bool {
        return matches!(self, Error::StaleTraversal | Error::Exhausted);
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Checks that a weight is usable: strictly positive and finite.
pub(crate) fn validate_weight(weight: f32) -> Result<f32> {
    if weight.is_finite() && weight > 0.0 {
        return Ok(weight);
    }
    return Err(Error::InvalidWeight(weight));
}
