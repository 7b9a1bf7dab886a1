//! The weighted random set.
//!
//! A set of unique elements, each with a positive weight. Supports weighted
//! sampling with replacement ([`sample`](WeightedRandomSet::sample)), weighted
//! sampling with removal ([`pop`](WeightedRandomSet::pop)) and weighted-random
//! traversal (see [`crate::traversal`]).
//!
//! The tree and the membership index are always updated together: every live
//! leaf has exactly one index entry and vice versa.
//!
//! # Generations
//!
//! `generation` is 0 whenever no pass owns the per-pass state, and otherwise
//! the unique id of the pass that last reset it. Any change in membership sets
//! it back to 0 and bumps `modifications`. Traversals compare both against the
//! values they recorded, which catches stale use after a mutation that already
//! completed. It is a fail-fast detector, not a lock: it does not make
//! concurrent mutation from several threads safe.

use std::borrow::Borrow;
use std::collections::hash_map::Entry;
use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use rustc_hash::FxHashMap;
use rustc_hash::FxHashSet;
use rustc_hash::FxHasher;
use tracing::debug;
use tracing::trace;

use crate::config::DEFAULT_WEIGHT;
use crate::config::SetConfig;
use crate::error::Error;
use crate::error::Result;
use crate::error::validate_weight;
use crate::random::RandomSource;
use crate::tree::NodeIdx;
use crate::tree::Tree;

/// Source of set identities. Every constructed or cloned set takes a fresh one.
static NEXT_SET_ID: AtomicU64 = AtomicU64::new(1);

#[inline]
fn next_set_id() -> u64 {
    return NEXT_SET_ID.fetch_add(1, Ordering::Relaxed);
}

/// A set of weighted elements with weighted-random access.
pub struct WeightedRandomSet<T> {
    /// Identity of this set, so a traversal cannot be driven by another one.
    id: u64,
    tree: Tree<T>,
    /// Element to its leaf in `tree`.
    index: FxHashMap<T, NodeIdx>,
    /// Id of the pass owning the per-pass state, 0 for none.
    generation: u64,
    /// Source of pass ids; never reset, so an id is never handed out twice.
    issued: u64,
    /// Bumped on every change in membership.
    modifications: u64,
    config: SetConfig,
}

impl<T> WeightedRandomSet<T> {
    /// Create an empty set with default options.
    pub fn new() -> WeightedRandomSet<T> {
        return WeightedRandomSet::with_config(SetConfig::default());
    }

    /// Create an empty set with the given options.
    pub fn with_config(config: SetConfig) -> WeightedRandomSet<T> {
        return WeightedRandomSet {
            id: next_set_id(),
            tree: Tree::new(),
            index: FxHashMap::default(),
            generation: 0,
            issued: 0,
            modifications: 0,
            config,
        };
    }

    /// Create an empty set whose traversals each run over a private snapshot.
    pub fn simultaneous() -> WeightedRandomSet<T> {
        return WeightedRandomSet::with_config(SetConfig::new().simultaneous_iteration(true));
    }

    pub fn config(&self) -> SetConfig {
        return self.config;
    }

    /// Number of elements. O(1).
    pub fn len(&self) -> usize {
        return self.tree.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.tree.len() == 0;
    }

    /// Sum of all weights, 0 when empty. O(1).
    pub fn total_weight(&self) -> f32 {
        return self.tree.total_weight();
    }

    /// The elements in unspecified order, without consuming randomness.
    pub fn elements(&self) -> impl Iterator<Item = &T> + '_ {
        return self.index.keys();
    }

    /// Remove every element.
    pub fn clear(&mut self) {
        if !self.is_empty() {
            self.modifications += 1;
        }
        debug!(elements = self.len(), "clearing weighted set");
        self.tree.clear();
        self.index.clear();
        self.generation = 0;
    }

    /// Draw one element with probability proportional to its weight.
    /// Returns `None` when empty.
    pub fn sample<R: RandomSource + ?Sized>(&self, rng: &mut R) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        let leaf = self.tree.lookup(rng.next_below(self.tree.total_weight()))?;
        return Some(&self.tree.leaf(leaf).element);
    }

    // --- Pass bookkeeping used by traversals ---

    pub(crate) fn id(&self) -> u64 {
        return self.id;
    }

    pub(crate) fn generation(&self) -> u64 {
        return self.generation;
    }

    pub(crate) fn modifications(&self) -> u64 {
        return self.modifications;
    }

    /// Claim a fresh generation and reset the per-pass state. O(n).
    pub(crate) fn begin_pass(&mut self) -> u64 {
        self.issued += 1;
        self.generation = self.issued;
        self.tree.reset_pass();
        debug!(generation = self.generation, elements = self.len(), "started traversal pass");
        return self.generation;
    }

    /// True once the current pass has visited every element.
    pub(crate) fn pass_drained(&self) -> bool {
        return self.tree.pass_drained();
    }

    /// Draw the next unvisited element of the current pass and mark it visited.
    /// Requires at least two elements.
    pub(crate) fn visit_next<R: RandomSource + ?Sized>(&mut self, rng: &mut R) -> Option<&T> {
        let leaf = self.tree.draw(rng.next_below(self.tree.pass_remaining()))?;
        self.tree.mark_visited(leaf);
        return Some(&self.tree.leaf(leaf).element);
    }

    fn touch(&mut self) {
        self.generation = 0;
        self.modifications += 1;
    }
}

impl<T: Hash + Eq> WeightedRandomSet<T> {
    /// True if `element` is a member. O(1).
    pub fn contains<Q>(&self, element: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        return self.index.contains_key(element);
    }

    /// The weight `element` was inserted with.
    pub fn weight<Q>(&self, element: &Q) -> Option<f32>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let &leaf = self.index.get(element)?;
        return Some(self.tree.leaf(leaf).weight);
    }

    /// Remove `element`. Returns false, and changes nothing, if it was absent.
    /// O(log n).
    pub fn remove<Q>(&mut self, element: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let Some(leaf) = self.index.remove(element) else {
            return false;
        };
        let (_, weight) = self.tree.remove(leaf);
        self.touch();
        trace!(leaf, weight, "removed element");
        self.check_invariants();
        return true;
    }

    /// Draw one element proportionally to weight and remove it.
    /// Returns `None` when empty.
    pub fn pop<R: RandomSource + ?Sized>(&mut self, rng: &mut R) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let leaf = self.tree.lookup(rng.next_below(self.tree.total_weight()))?;
        let (element, weight) = self.tree.remove(leaf);
        self.index.remove(&element);
        self.touch();
        trace!(leaf, weight, "popped element");
        self.check_invariants();
        return Some(element);
    }

    /// True if every item is a member.
    pub fn contains_all<'a, I>(&self, items: I) -> bool
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        return items.into_iter().all(|item| self.index.contains_key(item));
    }

    /// Remove every listed element. Returns true if anything was removed.
    pub fn remove_all<'a, I>(&mut self, items: I) -> bool
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        let mut modified = false;
        for item in items {
            modified |= self.remove(item);
        }
        return modified;
    }

    /// Keep only the listed elements. Returns true if anything was removed.
    pub fn retain_all<'a, I>(&mut self, items: I) -> bool
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        let keep: FxHashSet<&T> = items.into_iter().collect();
        return self.retain(|element| keep.contains(element));
    }

    /// Keep only the elements for which `keep` returns true. Returns true if
    /// anything was removed.
    pub fn retain<F>(&mut self, mut keep: F) -> bool
    where
        F: FnMut(&T) -> bool,
    {
        let tree = &mut self.tree;
        let mut removed = 0usize;
        self.index.retain(|element, leaf| {
            if keep(element) {
                return true;
            }
            tree.remove(*leaf);
            removed += 1;
            return false;
        });

        if removed == 0 {
            return false;
        }
        self.touch();
        trace!(removed, "retained elements");
        self.check_invariants();
        return true;
    }

    // --- Invariant checking ---

    #[cfg(debug_assertions)]
    fn check_invariants(&self) {
        let leaves = self.tree.check_invariants();
        assert_eq!(
            leaves,
            self.index.len(),
            "INVARIANT VIOLATED: {} leaves but {} index entries",
            leaves,
            self.index.len()
        );
        for (element, &leaf) in &self.index {
            assert!(
                self.tree.leaf(leaf).element == *element,
                "INVARIANT VIOLATED: index entry points at leaf {} holding another element",
                leaf
            );
        }
    }

    #[cfg(not(debug_assertions))]
    #[inline(always)]
    fn check_invariants(&self) {}
}

impl<T: Hash + Eq + Clone> WeightedRandomSet<T> {
    /// Insert `element` with `weight`.
    ///
    /// Returns `Ok(true)` if it was inserted and `Ok(false)` if it was already
    /// a member (its weight is left as is). A weight that is not positive and
    /// finite, or that would push the total weight past `f32::MAX`, is rejected
    /// with [`Error::InvalidWeight`](crate::Error) and the set is unchanged.
    /// O(log n).
    pub fn insert(&mut self, element: T, weight: f32) -> Result<bool> {
        let weight = validate_weight(weight)?;
        return self.insert_valid(element, weight);
    }

    fn insert_valid(&mut self, element: T, weight: f32) -> Result<bool> {
        let slot = match self.index.entry(element) {
            Entry::Occupied(_) => return Ok(false),
            Entry::Vacant(slot) => slot,
        };
        let leaf = self.tree.insert(slot.key().clone(), weight);
        if !self.tree.total_weight().is_finite() {
            // Splicing the leaf back out restores every aggregate exactly.
            self.tree.remove(leaf);
            debug!(weight, total = self.tree.total_weight(), "rejected weight: total would overflow");
            return Err(Error::InvalidWeight(weight));
        }
        slot.insert(leaf);
        self.touch();
        trace!(leaf, weight, "inserted element");
        self.check_invariants();
        return Ok(true);
    }

    /// Insert every item with [`DEFAULT_WEIGHT`]. Returns true if anything was
    /// inserted. Items that would overflow the total weight are skipped.
    pub fn add_all<I>(&mut self, items: I) -> bool
    where
        I: IntoIterator<Item = T>,
    {
        let mut modified = false;
        for item in items {
            modified |= self.insert_valid(item, DEFAULT_WEIGHT).unwrap_or(false);
        }
        return modified;
    }

    /// Insert every `(element, weight)` pair. All weights, and the total they
    /// add up to, are validated before anything is inserted, so an invalid
    /// weight leaves the set's membership unchanged. Returns true if anything
    /// was inserted.
    pub fn extend_weighted<I>(&mut self, items: I) -> Result<bool>
    where
        I: IntoIterator<Item = (T, f32)>,
    {
        let items: Vec<(T, f32)> = items.into_iter().collect();

        let mut added = self.tree.total_weight() as f64;
        let mut seen: FxHashSet<&T> = FxHashSet::default();
        for (element, weight) in &items {
            let weight = validate_weight(*weight)?;
            // Only the first occurrence of a new element is inserted.
            if !self.index.contains_key(element) && seen.insert(element) {
                added += weight as f64;
                if added > f32::MAX as f64 {
                    return Err(Error::InvalidWeight(weight));
                }
            }
        }

        let mut inserted: Vec<T> = Vec::new();
        for (element, weight) in items {
            match self.insert_valid(element.clone(), weight) {
                Ok(true) => inserted.push(element),
                Ok(false) => {}
                Err(err) => {
                    // Rounding in the tree sums can still overflow at the edge.
                    for element in &inserted {
                        self.remove(element);
                    }
                    return Err(err);
                }
            }
        }
        return Ok(!inserted.is_empty());
    }
}

impl<T> Default for WeightedRandomSet<T> {
    fn default() -> Self {
        return WeightedRandomSet::new();
    }
}

/// An independent copy with the same elements, weights and options.
///
/// The arena is copied as is, so the copy has the same shape and a total
/// weight that matches the original bit for bit. The copy is a distinct set:
/// no traversal state carries over and traversals of one cannot be driven
/// with the other.
impl<T: Clone> Clone for WeightedRandomSet<T> {
    fn clone(&self) -> Self {
        return WeightedRandomSet {
            id: next_set_id(),
            tree: self.tree.clone(),
            index: self.index.clone(),
            generation: 0,
            issued: 0,
            modifications: 0,
            config: self.config,
        };
    }
}

/// Two sets are equal when they hold the same elements; weights and tree
/// shape are ignored.
impl<T: Hash + Eq> PartialEq for WeightedRandomSet<T> {
    fn eq(&self, other: &Self) -> bool {
        return self.len() == other.len() && other.index.keys().all(|e| self.index.contains_key(e));
    }
}

impl<T: Hash + Eq> Eq for WeightedRandomSet<T> {}

/// Hashes the element set only, independent of enumeration order.
impl<T: Hash + Eq> Hash for WeightedRandomSet<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut sum = 0u64;
        for element in self.index.keys() {
            let mut hasher = FxHasher::default();
            element.hash(&mut hasher);
            sum = sum.wrapping_add(hasher.finish());
        }
        state.write_usize(self.len());
        state.write_u64(sum);
    }
}

impl<T: fmt::Debug> fmt::Debug for WeightedRandomSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.debug_set().entries(self.index.keys()).finish();
    }
}

impl<T: Hash + Eq + Clone> Extend<T> for WeightedRandomSet<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, items: I) {
        self.add_all(items);
    }
}

impl<T: Hash + Eq + Clone> FromIterator<T> for WeightedRandomSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(items: I) -> Self {
        let mut set = WeightedRandomSet::new();
        set.add_all(items);
        return set;
    }
}
