//! Per-pass traversal state layered on the tree.
//!
//! A pass visits every leaf once, drawing each next leaf with probability
//! proportional to its weight among the leaves not yet visited. Nothing is
//! removed; instead every internal node tracks:
//!
//! - `remaining`: weight of its unvisited leaves (`None` means "all of it")
//! - `drained_left` / `drained_right`: that child subtree is fully visited
//!
//! Visiting a leaf subtracts its weight from every ancestor once, then marks
//! drained slots upward for as long as both slots of a node are drained.
//!
//! Single-leaf trees carry no internal node and are handled by the caller.

use smallvec::SmallVec;

use super::Node;
use super::NodeIdx;
use super::Tree;
use super::NONE;

/// Transient state of one internal node for the current pass.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct PassState {
    pub remaining: Option<f32>,
    pub drained_left: bool,
    pub drained_right: bool,
}

impl PassState {
    #[inline(always)]
    fn is_drained(&self) -> bool {
        return self.drained_left && self.drained_right;
    }
}

impl<T> Tree<T> {
    /// Reset the pass state of every internal node. O(n).
    pub fn reset_pass(&mut self) {
        if self.root == NONE {
            return;
        }
        let mut stack: SmallVec<[NodeIdx; 64]> = SmallVec::new();
        stack.push(self.root);
        while let Some(idx) = stack.pop() {
            if let Node::Internal(internal) = self.node_mut(idx) {
                internal.pass = PassState::default();
                stack.push(internal.left);
                stack.push(internal.right);
            }
        }
    }

    /// Unvisited weight below `idx`.
    #[inline]
    fn remaining(&self, idx: NodeIdx) -> f32 {
        return match self.node(idx) {
            Node::Leaf(leaf) => leaf.weight,
            Node::Internal(internal) => internal.pass.remaining.unwrap_or(internal.weight),
        };
    }

    /// Unvisited weight of the whole tree.
    pub fn pass_remaining(&self) -> f32 {
        if self.root == NONE {
            return 0.0;
        }
        return self.remaining(self.root);
    }

    /// True once every leaf has been visited in this pass.
    pub fn pass_drained(&self) -> bool {
        if self.root == NONE {
            return true;
        }
        return match self.node(self.root) {
            Node::Internal(internal) => internal.pass.is_drained(),
            Node::Leaf(_) => false,
        };
    }

    /// Find the unvisited leaf covering `value`, where
    /// `0 <= value < pass_remaining()`. Drained subtrees count as weight 0.
    /// Returns `None` once the pass is drained.
    pub fn draw(&self, mut value: f32) -> Option<NodeIdx> {
        if self.root == NONE {
            return None;
        }

        let mut idx = self.root;
        loop {
            let internal = match self.node(idx) {
                Node::Leaf(_) => return Some(idx),
                Node::Internal(internal) => internal,
            };
            idx = match (internal.pass.drained_left, internal.pass.drained_right) {
                (true, true) => return None,
                (true, false) => internal.right,
                (false, true) => internal.left,
                (false, false) => {
                    let left_weight = self.remaining(internal.left);
                    if value < left_weight {
                        internal.left
                    } else {
                        value -= left_weight;
                        internal.right
                    }
                }
            };
        }
    }

    /// Record that `leaf` was visited in this pass.
    pub fn mark_visited(&mut self, leaf: NodeIdx) {
        let weight = self.leaf(leaf).weight;
        let first = self.leaf(leaf).parent;

        let mut idx = first;
        while idx != NONE {
            let internal = self.internal_mut(idx);
            let remaining = internal.pass.remaining.unwrap_or(internal.weight);
            internal.pass.remaining = Some((remaining - weight).max(0.0));
            idx = internal.parent;
        }

        let mut child = leaf;
        let mut idx = first;
        while idx != NONE {
            let internal = self.internal_mut(idx);
            if internal.left == child {
                internal.pass.drained_left = true;
            } else {
                internal.pass.drained_right = true;
            }
            if !internal.pass.is_drained() {
                break;
            }
            // Nothing left below: pin the aggregate to zero to shed rounding.
            internal.pass.remaining = Some(0.0);
            child = idx;
            idx = internal.parent;
        }
    }
}
