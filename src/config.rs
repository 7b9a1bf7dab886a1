//! Construction options for a weighted random set.

/// Weight given to elements inserted through the unweighted surface
/// (`add_all`, `Extend<T>`, `FromIterator<T>`).
pub const DEFAULT_WEIGHT: f32 = 1.0;

/// Options fixed when a set is constructed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SetConfig {
    /// When set, every traversal runs over a private deep copy of the
    /// collection, so several traversals can advance independently and later
    /// mutation of the original does not affect them. Costs O(n) per traversal.
    pub simultaneous_iteration: bool,
}

impl SetConfig {
    /// Default options: traversals share the collection's per-pass state.
    pub fn new() -> SetConfig {
        return SetConfig::default();
    }

    /// Enable or disable snapshot traversals.
    pub fn simultaneous_iteration(mut self, enabled: bool) -> SetConfig {
        self.simultaneous_iteration = enabled;
        return self;
    }
}
