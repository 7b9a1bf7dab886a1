//! Weighted random set - a set of weighted elements with weighted-random access.
//!
//! Every element carries a positive weight. The set supports:
//!
//! - weighted sampling with replacement: [`WeightedRandomSet::sample`]
//! - weighted sampling with removal: [`WeightedRandomSet::pop`]
//! - weighted-random traversal, visiting every element once, earlier elements
//!   drawn proportionally to weight among those not yet visited:
//!   [`WeightedRandomSet::iter`] and [`WeightedRandomSet::traversal`]
//!
//! All operations are O(log n) or better (membership is O(1)); starting a
//! traversal pass is O(n).
//!
//! Randomness is always passed in, so a fixed seed gives a reproducible run.
//!
//! # Quick Start
//!
//! ```
//! use weighted_random_set::WeightedRandomSet;
//! use weighted_random_set::random::seeded;
//!
//! let mut rng = seeded(42);
//! let mut loot = WeightedRandomSet::new();
//! loot.insert("common", 80.0).unwrap();
//! loot.insert("rare", 19.0).unwrap();
//! loot.insert("legendary", 1.0).unwrap();
//! assert_eq!(loot.total_weight(), 100.0);
//!
//! // Draw with replacement.
//! let item = loot.sample(&mut rng).unwrap();
//! assert!(loot.contains(item));
//!
//! // Visit everything once, heavier elements tend to come first.
//! let order = loot.to_vec(&mut rng);
//! assert_eq!(order.len(), 3);
//!
//! // Draw and remove.
//! let taken = loot.pop(&mut rng).unwrap();
//! assert!(!loot.contains(taken));
//! ```
//!
//! # Thread safety
//!
//! There is no internal locking. Mutations on one set must be serialized by
//! the caller. Detached traversals detect some stale use after a mutation
//! (see [`Traversal`]), which is a debugging aid and not synchronization.

pub mod config;
pub mod error;
pub mod random;
pub mod set;
pub mod traversal;
mod tree;

pub use config::DEFAULT_WEIGHT;
pub use config::SetConfig;
pub use error::Error;
pub use error::Result;
pub use random::RandomSource;
pub use set::WeightedRandomSet;
pub use traversal::Iter;
pub use traversal::Traversal;
