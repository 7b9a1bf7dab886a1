//! Weighted-random traversal (sampling without replacement).
//!
//! A traversal visits every element exactly once. At each step, element `e`
//! comes next with probability `weight(e) / (weight of the elements not yet
//! visited)`, the same order repeated `pop` calls on a private copy would
//! produce, but done in place at O(log n) per step.
//!
//! Two ways to run one:
//!
//! - [`WeightedRandomSet::iter`] borrows the set mutably and yields every
//!   element. The borrow rules out mutation, so it cannot go stale.
//! - [`WeightedRandomSet::traversal`] returns a detached [`Traversal`] cursor.
//!   The set may be used between steps; a membership change, or another pass
//!   starting, makes every further step fail with
//!   [`Error::StaleTraversal`](crate::Error).
//!
//! With [`SetConfig::simultaneous_iteration`](crate::SetConfig) enabled, every
//! cursor runs over its own deep copy of the set, so cursors never invalidate
//! each other and later mutation of the set does not affect them.

use std::hash::Hash;
use std::iter::FusedIterator;

use tracing::debug;

use crate::error::Error;
use crate::error::Result;
use crate::random::RandomSource;
use crate::set::WeightedRandomSet;

/// A detached, caller-driven traversal.
///
/// Created by [`WeightedRandomSet::traversal`]. Drive it with the set it came
/// from: [`has_next`](Traversal::has_next) and [`advance`](Traversal::advance).
/// The pass starts lazily on the first call. Not restartable. Driving it with
/// any other set, a clone included, fails with [`Error::StaleTraversal`].
pub struct Traversal<T> {
    /// Identity of the set that created this traversal.
    origin: u64,
    pass: Pass<T>,
}

enum Pass<T> {
    /// Nothing (left) to visit.
    Finished,
    /// One element, captured up front; no per-pass state is needed.
    /// `modifications` is `None` for a snapshot.
    Single {
        element: Option<T>,
        modifications: Option<u64>,
    },
    /// Runs on the shared per-pass state of the originating set.
    Shared(Cursor),
    /// Runs on a private copy.
    Snapshot {
        set: Box<WeightedRandomSet<T>>,
        cursor: Cursor,
    },
}

/// What a multi-element traversal recorded about the set it runs on.
#[derive(Clone, Copy, Debug)]
struct Cursor {
    /// Generation when the traversal was created.
    observed: u64,
    /// Modification count when the traversal was created.
    modifications: u64,
    /// Generation claimed on the first step.
    claimed: Option<u64>,
}

impl Cursor {
    fn new<T>(set: &WeightedRandomSet<T>) -> Cursor {
        return Cursor {
            observed: set.generation(),
            modifications: set.modifications(),
            claimed: None,
        };
    }

    /// Claim the per-pass state on first use, then make sure nobody else has
    /// touched it since.
    fn check<T>(&mut self, set: &mut WeightedRandomSet<T>) -> Result<()> {
        let current = set.generation();
        let valid = set.modifications() == self.modifications
            && match self.claimed {
                Some(claimed) => claimed == current,
                None => self.observed == current,
            };

        if !valid {
            debug!(
                observed = self.observed,
                claimed = ?self.claimed,
                current,
                "stale traversal"
            );
            return Err(Error::StaleTraversal);
        }
        if self.claimed.is_none() {
            self.claimed = Some(set.begin_pass());
        }
        return Ok(());
    }
}

impl<T: Hash + Eq + Clone> Traversal<T> {
    /// True if there are elements left to visit.
    ///
    /// Fails with [`Error::StaleTraversal`] if the set changed membership, or
    /// another pass started, since this traversal began, or if `set` is not
    /// the set that created it.
    pub fn has_next(&mut self, set: &mut WeightedRandomSet<T>) -> Result<bool> {
        self.check_origin(set)?;
        return match &mut self.pass {
            Pass::Finished => Ok(false),
            Pass::Single { element, modifications } => {
                check_single(*modifications, set)?;
                Ok(element.is_some())
            }
            Pass::Shared(cursor) => {
                cursor.check(set)?;
                Ok(!set.pass_drained())
            }
            Pass::Snapshot { set: snapshot, cursor } => {
                cursor.check(&mut **snapshot)?;
                Ok(!snapshot.pass_drained())
            }
        };
    }

    /// Visit the next element.
    ///
    /// Fails with [`Error::StaleTraversal`] as [`has_next`](Traversal::has_next)
    /// does, and with [`Error::Exhausted`] once every element was visited.
    pub fn advance<R: RandomSource + ?Sized>(
        &mut self,
        set: &mut WeightedRandomSet<T>,
        rng: &mut R,
    ) -> Result<T> {
        self.check_origin(set)?;
        let next = match &mut self.pass {
            Pass::Finished => return Err(Error::Exhausted),
            Pass::Single { element, modifications } => {
                check_single(*modifications, set)?;
                return element.take().ok_or(Error::Exhausted);
            }
            Pass::Shared(cursor) => {
                cursor.check(set)?;
                return set.visit_next(rng).cloned().ok_or(Error::Exhausted);
            }
            Pass::Snapshot { set: snapshot, cursor } => {
                cursor.check(&mut **snapshot)?;
                let next = snapshot.visit_next(rng).cloned();
                if snapshot.pass_drained() {
                    self.pass = Pass::Finished;
                }
                next
            }
        };
        return next.ok_or(Error::Exhausted);
    }

    /// True if this traversal runs over a private copy of the set.
    pub fn is_snapshot(&self) -> bool {
        return match &self.pass {
            Pass::Snapshot { .. } => true,
            Pass::Single { modifications, .. } => modifications.is_none(),
            Pass::Finished | Pass::Shared(_) => false,
        };
    }

    fn check_origin(&self, set: &WeightedRandomSet<T>) -> Result<()> {
        if set.id() != self.origin {
            debug!(origin = self.origin, found = set.id(), "traversal driven with another set");
            return Err(Error::StaleTraversal);
        }
        return Ok(());
    }
}

fn check_single<T>(modifications: Option<u64>, set: &WeightedRandomSet<T>) -> Result<()> {
    return match modifications {
        Some(count) if count != set.modifications() => Err(Error::StaleTraversal),
        _ => Ok(()),
    };
}

impl<T: Hash + Eq + Clone> WeightedRandomSet<T> {
    /// Start a detached traversal. In simultaneous-iteration mode this copies
    /// the set, O(n); otherwise the pass starts lazily on the first step.
    pub fn traversal(&self) -> Traversal<T> {
        let snapshot = self.config().simultaneous_iteration;
        let pass = match self.len() {
            0 => Pass::Finished,
            1 => Pass::Single {
                element: self.elements().next().cloned(),
                modifications: if snapshot { None } else { Some(self.modifications()) },
            },
            _ if snapshot => {
                debug!(elements = self.len(), "copying set for snapshot traversal");
                let copy = Box::new(self.clone());
                let cursor = Cursor::new(&*copy);
                Pass::Snapshot { set: copy, cursor }
            }
            _ => Pass::Shared(Cursor::new(self)),
        };
        return Traversal { origin: self.id(), pass };
    }

    /// Visit every element once in weighted-random order.
    ///
    /// Runs in place on the shared per-pass state, so it invalidates any
    /// detached non-snapshot [`Traversal`] of this set.
    pub fn iter<'a, R: RandomSource + ?Sized>(&'a mut self, rng: &'a mut R) -> Iter<'a, T, R> {
        let remaining = self.len();
        if remaining > 1 {
            self.begin_pass();
        }
        return Iter { set: self, rng, remaining };
    }

    /// All elements in weighted-random order.
    pub fn to_vec<R: RandomSource + ?Sized>(&mut self, rng: &mut R) -> Vec<T> {
        return self.iter(rng).collect();
    }
}

/// Borrowing traversal returned by [`WeightedRandomSet::iter`].
pub struct Iter<'a, T, R: ?Sized> {
    set: &'a mut WeightedRandomSet<T>,
    rng: &'a mut R,
    remaining: usize,
}

impl<'a, T: Hash + Eq + Clone, R: RandomSource + ?Sized> Iterator for Iter<'a, T, R> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        if self.set.len() == 1 {
            return self.set.elements().next().cloned();
        }
        return self.set.visit_next(&mut *self.rng).cloned();
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        return (self.remaining, Some(self.remaining));
    }
}

impl<'a, T: Hash + Eq + Clone, R: RandomSource + ?Sized> ExactSizeIterator for Iter<'a, T, R> {}

impl<'a, T: Hash + Eq + Clone, R: RandomSource + ?Sized> FusedIterator for Iter<'a, T, R> {}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::random::seeded;

    fn three() -> WeightedRandomSet<u32> {
        let mut set = WeightedRandomSet::new();
        set.extend_weighted([(1, 1.0), (2, 1.0), (3, 1.0)]).unwrap();
        return set;
    }

    #[test]
    fn empty_traversal() {
        let mut set: WeightedRandomSet<u32> = WeightedRandomSet::new();
        let mut traversal = set.traversal();
        assert_eq!(traversal.has_next(&mut set), Ok(false));
        assert_eq!(traversal.advance(&mut set, &mut seeded(0)), Err(Error::Exhausted));
        assert_eq!(set.iter(&mut seeded(0)).count(), 0);
    }

    #[test]
    fn single_element_traversal_has_no_pass() {
        let mut set = WeightedRandomSet::new();
        set.insert("only", 2.0).unwrap();
        let mut rng = seeded(0);

        let mut traversal = set.traversal();
        assert_eq!(traversal.has_next(&mut set), Ok(true));
        assert_eq!(traversal.advance(&mut set, &mut rng), Ok("only"));
        assert_eq!(traversal.has_next(&mut set), Ok(false));
        assert_eq!(traversal.advance(&mut set, &mut rng), Err(Error::Exhausted));
        // No pass was claimed.
        assert_eq!(set.generation(), 0);

        assert_eq!(set.to_vec(&mut rng), vec!["only"]);
    }

    #[test]
    fn single_element_traversal_goes_stale_on_insert() {
        let mut set = WeightedRandomSet::new();
        set.insert(1, 1.0).unwrap();
        let mut traversal = set.traversal();
        set.insert(2, 1.0).unwrap();
        assert_eq!(traversal.has_next(&mut set), Err(Error::StaleTraversal));
    }

    #[test]
    fn shared_traversal_visits_everything() {
        let mut set: WeightedRandomSet<u32> = (0..100).collect();
        let mut rng = seeded(11);
        let mut traversal = set.traversal();
        let mut seen = HashSet::new();
        while traversal.has_next(&mut set).unwrap() {
            assert!(seen.insert(traversal.advance(&mut set, &mut rng).unwrap()));
        }
        assert_eq!(seen.len(), 100);
        assert_eq!(traversal.advance(&mut set, &mut rng), Err(Error::Exhausted));
        assert_eq!(set.len(), 100);
    }

    #[test]
    fn pass_starts_lazily() {
        let mut set = three();
        let mut traversal = set.traversal();
        assert_eq!(set.generation(), 0);
        traversal.has_next(&mut set).unwrap();
        assert_ne!(set.generation(), 0);
    }

    #[test]
    fn second_pass_invalidates_first() {
        let mut set = three();
        let mut rng = seeded(5);
        let mut first = set.traversal();
        let mut second = set.traversal();

        assert!(second.has_next(&mut set).is_ok());
        assert!(second.advance(&mut set, &mut rng).is_ok());
        assert_eq!(first.has_next(&mut set), Err(Error::StaleTraversal));
        assert_eq!(first.advance(&mut set, &mut rng), Err(Error::StaleTraversal));
    }

    #[test]
    fn mutation_before_first_step_is_detected() {
        let mut set = three();
        let mut traversal = set.traversal();
        set.insert(4, 1.0).unwrap();
        assert_eq!(traversal.has_next(&mut set), Err(Error::StaleTraversal));
    }

    #[test]
    fn stale_traversal_stays_stale() {
        let mut set = three();
        let mut rng = seeded(5);
        let mut traversal = set.traversal();
        traversal.advance(&mut set, &mut rng).unwrap();
        set.remove(&1);
        // A later pass cannot revive the old one.
        set.insert(1, 1.0).unwrap();
        let _ = set.to_vec(&mut rng);
        for _ in 0..3 {
            assert_eq!(traversal.advance(&mut set, &mut rng), Err(Error::StaleTraversal));
        }
    }

    #[test]
    fn iter_invalidates_detached_traversal() {
        let mut set = three();
        let mut rng = seeded(5);
        let mut traversal = set.traversal();
        traversal.advance(&mut set, &mut rng).unwrap();
        assert_eq!(set.iter(&mut rng).count(), 3);
        assert_eq!(traversal.has_next(&mut set), Err(Error::StaleTraversal));
    }

    #[test]
    fn snapshot_traversals_are_independent() {
        let mut set = WeightedRandomSet::simultaneous();
        set.extend_weighted([(1, 1.0), (2, 1.0), (3, 1.0)]).unwrap();
        let mut rng = seeded(9);

        let mut first = set.traversal();
        let mut second = set.traversal();
        assert!(first.is_snapshot() && second.is_snapshot());

        let a = second.advance(&mut set, &mut rng).unwrap();
        let b = first.advance(&mut set, &mut rng).unwrap();
        set.remove(&1);
        set.insert(4, 1.0).unwrap();

        let mut from_first = vec![b];
        while first.has_next(&mut set).unwrap() {
            from_first.push(first.advance(&mut set, &mut rng).unwrap());
        }
        let mut from_second = vec![a];
        while second.has_next(&mut set).unwrap() {
            from_second.push(second.advance(&mut set, &mut rng).unwrap());
        }

        from_first.sort();
        from_second.sort();
        assert_eq!(from_first, vec![1, 2, 3]);
        assert_eq!(from_second, vec![1, 2, 3]);
        assert_eq!(first.advance(&mut set, &mut rng), Err(Error::Exhausted));
    }

    #[test]
    fn traversal_rejects_another_set() {
        let mut a = three();
        let mut b: WeightedRandomSet<u32> = WeightedRandomSet::new();
        b.extend_weighted([(10, 1.0), (20, 1.0), (30, 1.0)]).unwrap();
        let mut rng = seeded(5);

        // Same generation and modification counts as `a`, still refused.
        let mut traversal = a.traversal();
        assert_eq!(traversal.has_next(&mut b), Err(Error::StaleTraversal));
        assert_eq!(traversal.advance(&mut b, &mut rng), Err(Error::StaleTraversal));

        // The rightful owner is unaffected.
        let mut seen = Vec::new();
        while traversal.has_next(&mut a).unwrap() {
            seen.push(traversal.advance(&mut a, &mut rng).unwrap());
        }
        seen.sort();
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn traversal_rejects_clone_of_its_set() {
        let mut set = three();
        let mut copy = set.clone();
        let mut rng = seeded(5);

        let mut traversal = set.traversal();
        assert_eq!(traversal.advance(&mut copy, &mut rng), Err(Error::StaleTraversal));
        assert!(traversal.advance(&mut set, &mut rng).is_ok());
    }

    #[test]
    fn single_and_snapshot_traversals_check_origin() {
        let mut rng = seeded(5);

        let mut one = WeightedRandomSet::new();
        one.insert(1u32, 1.0).unwrap();
        let mut other = WeightedRandomSet::new();
        other.insert(1u32, 1.0).unwrap();
        let mut traversal = one.traversal();
        assert_eq!(traversal.has_next(&mut other), Err(Error::StaleTraversal));
        assert_eq!(traversal.advance(&mut one, &mut rng), Ok(1));

        let mut snap = WeightedRandomSet::simultaneous();
        snap.extend_weighted([(1u32, 1.0), (2, 1.0)]).unwrap();
        let mut foreign = snap.clone();
        let mut traversal = snap.traversal();
        assert!(traversal.is_snapshot());
        assert_eq!(traversal.advance(&mut foreign, &mut rng), Err(Error::StaleTraversal));
        assert!(traversal.advance(&mut snap, &mut rng).is_ok());

        // Even a finished traversal refuses a foreign set.
        let mut empty: WeightedRandomSet<u32> = WeightedRandomSet::new();
        let mut traversal = empty.traversal();
        assert_eq!(traversal.has_next(&mut one), Err(Error::StaleTraversal));
        assert_eq!(traversal.has_next(&mut empty), Ok(false));
    }

    #[test]
    fn iter_is_exact_size() {
        let mut set = three();
        let mut rng = seeded(2);
        let mut iter = set.iter(&mut rng);
        assert_eq!(iter.len(), 3);
        iter.next();
        assert_eq!(iter.len(), 2);
        iter.next();
        iter.next();
        assert_eq!(iter.next(), None);
        assert_eq!(iter.next(), None);
    }

    #[test]
    fn to_vec_is_permutation() {
        let mut set = WeightedRandomSet::new();
        for i in 0..64u32 {
            set.insert(i, 1.0 + (i % 5) as f32 * 10.0).unwrap();
        }
        let mut elements = set.to_vec(&mut seeded(4));
        elements.sort();
        assert_eq!(elements, (0..64).collect::<Vec<_>>());
    }
}
