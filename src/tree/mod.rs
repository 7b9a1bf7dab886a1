//! Leaf-count balanced binary tree
//!
//! Elements live in leaves; internal nodes carry the summed weight and the
//! leaf count of their subtree. Insertion always descends toward the child
//! with fewer leaves, so depth stays O(log n) no matter how skewed the
//! weights are.
//!
//! All nodes are stored in a Vec arena (no raw pointers). Children and the
//! upward parent link are arena indices; the parent link is only used to walk
//! back up and refresh aggregates.
//!
//! Operations:
//! - insert: O(log n) - descend by leaf count, split the reached leaf
//! - remove: O(log n) - splice the leaf out, its sibling takes the parent's slot
//! - lookup: O(log n) - descend by cumulative weight
//!
//! ```text
//!              (w=10, n=3)
//!             /           \
//!       (w=7, n=2)       C (w=3)
//!       /        \
//!   A (w=5)    B (w=2)
//! ```

mod pass;

pub(crate) use pass::PassState;

/// Index into the node arena.
pub(crate) type NodeIdx = u32;
/// Sentinel value for no parent / empty tree.
pub(crate) const NONE: NodeIdx = NodeIdx::MAX;

/// A leaf holding one element.
#[derive(Clone, Debug)]
pub(crate) struct Leaf<T> {
    pub element: T,
    /// Always strictly positive and finite.
    pub weight: f32,
    pub parent: NodeIdx,
}

/// An internal node with exactly two children.
#[derive(Clone, Debug)]
pub(crate) struct Internal {
    /// weight(left) + weight(right).
    pub weight: f32,
    /// leaves(left) + leaves(right).
    pub leaves: usize,
    pub left: NodeIdx,
    pub right: NodeIdx,
    pub parent: NodeIdx,
    /// Transient state of the current traversal pass.
    pub pass: PassState,
}

#[derive(Clone, Debug)]
pub(crate) enum Node<T> {
    Leaf(Leaf<T>),
    Internal(Internal),
}

impl<T> Node<T> {
    #[inline(always)]
    fn weight(&self) -> f32 {
        return match self {
            Node::Leaf(leaf) => leaf.weight,
            Node::Internal(internal) => internal.weight,
        };
    }

    #[inline(always)]
    fn leaves(&self) -> usize {
        return match self {
            Node::Leaf(_) => 1,
            Node::Internal(internal) => internal.leaves,
        };
    }

    #[inline(always)]
    fn parent(&self) -> NodeIdx {
        return match self {
            Node::Leaf(leaf) => leaf.parent,
            Node::Internal(internal) => internal.parent,
        };
    }

    #[inline(always)]
    fn set_parent(&mut self, parent: NodeIdx) {
        match self {
            Node::Leaf(leaf) => leaf.parent = parent,
            Node::Internal(internal) => internal.parent = parent,
        }
    }
}

/// The arena-backed tree.
#[derive(Clone, Debug)]
pub(crate) struct Tree<T> {
    /// Arena of nodes; `None` marks a released slot.
    nodes: Vec<Option<Node<T>>>,
    /// Released slots available for reuse.
    free_list: Vec<NodeIdx>,
    /// NONE when empty, a leaf for one element, otherwise an internal node.
    root: NodeIdx,
}

impl<T> Tree<T> {
    pub fn new() -> Tree<T> {
        return Tree {
            nodes: Vec::new(),
            free_list: Vec::new(),
            root: NONE,
        };
    }

    #[cfg(test)]
    pub fn root(&self) -> NodeIdx {
        return self.root;
    }

    /// Number of leaves.
    pub fn len(&self) -> usize {
        if self.root == NONE {
            return 0;
        }
        return self.node(self.root).leaves();
    }

    /// Sum of all leaf weights.
    pub fn total_weight(&self) -> f32 {
        if self.root == NONE {
            return 0.0;
        }
        return self.node(self.root).weight();
    }

    /// Drops every node at once.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free_list.clear();
        self.root = NONE;
    }

    // --- Node access helpers ---

    #[inline]
    fn node(&self, idx: NodeIdx) -> &Node<T> {
        return match &self.nodes[idx as usize] {
            Some(node) => node,
            None => panic!("arena slot {} is vacant", idx),
        };
    }

    #[inline]
    fn node_mut(&mut self, idx: NodeIdx) -> &mut Node<T> {
        return match &mut self.nodes[idx as usize] {
            Some(node) => node,
            None => panic!("arena slot {} is vacant", idx),
        };
    }

    #[inline]
    pub fn leaf(&self, idx: NodeIdx) -> &Leaf<T> {
        return match self.node(idx) {
            Node::Leaf(leaf) => leaf,
            Node::Internal(_) => panic!("node {} is not a leaf", idx),
        };
    }

    #[inline]
    fn internal(&self, idx: NodeIdx) -> &Internal {
        return match self.node(idx) {
            Node::Internal(internal) => internal,
            Node::Leaf(_) => panic!("node {} is not internal", idx),
        };
    }

    #[inline]
    fn internal_mut(&mut self, idx: NodeIdx) -> &mut Internal {
        return match self.node_mut(idx) {
            Node::Internal(internal) => internal,
            Node::Leaf(_) => panic!("node {} is not internal", idx),
        };
    }

    fn alloc(&mut self, node: Node<T>) -> NodeIdx {
        if let Some(idx) = self.free_list.pop() {
            self.nodes[idx as usize] = Some(node);
            return idx;
        }
        let idx = self.nodes.len() as NodeIdx;
        assert!(idx != NONE, "node arena is full");
        self.nodes.push(Some(node));
        return idx;
    }

    fn release(&mut self, idx: NodeIdx) -> Node<T> {
        let node = match self.nodes[idx as usize].take() {
            Some(node) => node,
            None => panic!("arena slot {} released twice", idx),
        };
        self.free_list.push(idx);
        return node;
    }

    // --- Core operations ---

    /// Insert a new leaf and return its index. The caller guarantees the
    /// element is not already present and the weight is valid.
    pub fn insert(&mut self, element: T, weight: f32) -> NodeIdx {
        let leaf = self.alloc(Node::Leaf(Leaf { element, weight, parent: NONE }));
        if self.root == NONE {
            self.root = leaf;
            return leaf;
        }

        // Descend toward the lighter side by leaf count, ties go left.
        let mut idx = self.root;
        while let Node::Internal(internal) = self.node(idx) {
            idx = if self.node(internal.left).leaves() <= self.node(internal.right).leaves() {
                internal.left
            } else {
                internal.right
            };
        }

        self.split_leaf(idx, leaf);
        return leaf;
    }

    /// Replace `existing` with a fresh internal node holding `existing` on
    /// the left and `new` on the right.
    fn split_leaf(&mut self, existing: NodeIdx, new: NodeIdx) {
        let parent = self.node(existing).parent();
        let joint = self.alloc(Node::Internal(Internal {
            weight: 0.0,
            leaves: 0,
            left: existing,
            right: new,
            parent,
            pass: PassState::default(),
        }));

        if parent == NONE {
            self.root = joint;
        } else {
            let parent_node = self.internal_mut(parent);
            if parent_node.left == existing {
                parent_node.left = joint;
            } else {
                parent_node.right = joint;
            }
        }

        self.node_mut(existing).set_parent(joint);
        self.node_mut(new).set_parent(joint);
        self.refresh_from(joint);
    }

    /// Remove a leaf, returning its element and weight.
    pub fn remove(&mut self, leaf: NodeIdx) -> (T, f32) {
        let parent = self.node(leaf).parent();

        if parent == NONE {
            debug_assert_eq!(self.root, leaf);
            self.root = NONE;
        } else {
            let (sibling, grandparent) = {
                let parent_node = self.internal(parent);
                let sibling = if parent_node.left == leaf {
                    parent_node.right
                } else {
                    parent_node.left
                };
                (sibling, parent_node.parent)
            };

            if grandparent == NONE {
                self.root = sibling;
            } else {
                let grandparent_node = self.internal_mut(grandparent);
                if grandparent_node.left == parent {
                    grandparent_node.left = sibling;
                } else {
                    grandparent_node.right = sibling;
                }
            }
            self.node_mut(sibling).set_parent(grandparent);
            self.release(parent);
            self.refresh_from(grandparent);
        }

        let removed = match self.release(leaf) {
            Node::Leaf(Leaf { element, weight, .. }) => (element, weight),
            Node::Internal(_) => panic!("node {} is not a leaf", leaf),
        };

        // Nothing left to reuse: hand the arena memory back in one go.
        if self.root == NONE {
            self.clear();
        }
        return removed;
    }

    /// Recompute weight and leaf count of `idx` and every ancestor from their
    /// children, so each aggregate is exactly the sum of its two children.
    fn refresh_from(&mut self, mut idx: NodeIdx) {
        while idx != NONE {
            let (left, right) = {
                let internal = self.internal(idx);
                (internal.left, internal.right)
            };
            let weight = self.node(left).weight() + self.node(right).weight();
            let leaves = self.node(left).leaves() + self.node(right).leaves();

            let internal = self.internal_mut(idx);
            internal.weight = weight;
            internal.leaves = leaves;
            idx = internal.parent;
        }
    }

    /// Find the leaf covering `value`, where `0 <= value < total_weight()`.
    /// Values past the end land on the rightmost leaf.
    pub fn lookup(&self, mut value: f32) -> Option<NodeIdx> {
        if self.root == NONE {
            return None;
        }

        let mut idx = self.root;
        while let Node::Internal(internal) = self.node(idx) {
            let left_weight = self.node(internal.left).weight();
            if value < left_weight {
                idx = internal.left;
            } else {
                value -= left_weight;
                idx = internal.right;
            }
        }
        return Some(idx);
    }

    // --- Invariant checking ---

    /// Walk the whole tree and verify every structural invariant.
    /// Returns the number of leaves reached from the root.
    #[cfg(any(test, debug_assertions))]
    pub fn check_invariants(&self) -> usize {
        if self.root == NONE {
            assert!(
                self.nodes.iter().all(Option::is_none),
                "INVARIANT VIOLATED: empty tree still owns nodes"
            );
            return 0;
        }
        assert_eq!(
            self.node(self.root).parent(),
            NONE,
            "INVARIANT VIOLATED: root has a parent"
        );

        let mut leaves = 0usize;
        let mut stack = vec![self.root];
        while let Some(idx) = stack.pop() {
            match self.node(idx) {
                Node::Leaf(leaf) => {
                    assert!(
                        leaf.weight.is_finite() && leaf.weight > 0.0,
                        "INVARIANT VIOLATED: leaf {} has weight {}",
                        idx,
                        leaf.weight
                    );
                    leaves += 1;
                }
                Node::Internal(internal) => {
                    let left = self.node(internal.left);
                    let right = self.node(internal.right);
                    assert_eq!(left.parent(), idx, "INVARIANT VIOLATED: left child of {} has wrong parent", idx);
                    assert_eq!(right.parent(), idx, "INVARIANT VIOLATED: right child of {} has wrong parent", idx);
                    assert_eq!(
                        internal.weight,
                        left.weight() + right.weight(),
                        "INVARIANT VIOLATED: weight of {} is not the sum of its children",
                        idx
                    );
                    assert_eq!(
                        internal.leaves,
                        left.leaves() + right.leaves(),
                        "INVARIANT VIOLATED: leaf count of {} is not the sum of its children",
                        idx
                    );
                    stack.push(internal.left);
                    stack.push(internal.right);
                }
            }
        }

        let live = self.nodes.iter().filter(|slot| slot.is_some()).count();
        assert_eq!(
            live,
            2 * leaves - 1,
            "INVARIANT VIOLATED: {} live nodes for {} leaves",
            live,
            leaves
        );
        return leaves;
    }

    #[cfg(test)]
    pub fn depth(&self) -> usize {
        if self.root == NONE {
            return 0;
        }
        let mut deepest = 0;
        let mut stack = vec![(self.root, 1usize)];
        while let Some((idx, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            if let Node::Internal(internal) = self.node(idx) {
                stack.push((internal.left, depth + 1));
                stack.push((internal.right, depth + 1));
            }
        }
        return deepest;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(weights: &[f32]) -> (Tree<usize>, Vec<NodeIdx>) {
        let mut tree = Tree::new();
        let leaves = weights
            .iter()
            .enumerate()
            .map(|(i, &w)| tree.insert(i, w))
            .collect();
        return (tree, leaves);
    }

    #[test]
    fn empty_tree() {
        let tree: Tree<u32> = Tree::new();
        assert_eq!(tree.len(), 0);
        assert_eq!(tree.total_weight(), 0.0);
        assert_eq!(tree.lookup(0.0), None);
        assert_eq!(tree.root(), NONE);
    }

    #[test]
    fn single_leaf_is_root() {
        let (tree, leaves) = build(&[3.0]);
        assert_eq!(tree.root(), leaves[0]);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.total_weight(), 3.0);
        assert_eq!(tree.lookup(2.9), Some(leaves[0]));
    }

    #[test]
    fn aggregates_follow_inserts() {
        let (tree, _) = build(&[5.0, 2.0, 3.0]);
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.total_weight(), 10.0);
        assert_eq!(tree.check_invariants(), 3);
    }

    #[test]
    fn lookup_by_cumulative_weight() {
        // Insertion order 0, 1, 2 produces ((0, 2), 1).
        let (tree, leaves) = build(&[5.0, 2.0, 3.0]);
        assert_eq!(tree.lookup(0.0), Some(leaves[0]));
        assert_eq!(tree.lookup(4.99), Some(leaves[0]));
        assert_eq!(tree.lookup(5.0), Some(leaves[2]));
        assert_eq!(tree.lookup(7.99), Some(leaves[2]));
        assert_eq!(tree.lookup(8.0), Some(leaves[1]));
        assert_eq!(tree.lookup(9.99), Some(leaves[1]));
    }

    #[test]
    fn depth_is_logarithmic_under_skewed_weights() {
        let weights: Vec<f32> = (0..1024).map(|i| if i % 2 == 0 { 1e-3 } else { 1e6 }).collect();
        let (tree, _) = build(&weights);
        // 1024 leaves: a perfectly balanced tree has depth 11.
        assert_eq!(tree.depth(), 11);
    }

    #[test]
    fn remove_splices_sibling_into_place() {
        let (mut tree, leaves) = build(&[5.0, 2.0, 3.0]);
        let (element, weight) = tree.remove(leaves[2]);
        assert_eq!((element, weight), (2, 3.0));
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.total_weight(), 7.0);
        assert_eq!(tree.check_invariants(), 2);
        assert_eq!(tree.leaf(leaves[0]).parent, tree.root());
    }

    #[test]
    fn remove_down_to_single_and_empty() {
        let (mut tree, leaves) = build(&[1.0, 2.0]);
        tree.remove(leaves[0]);
        assert_eq!(tree.root(), leaves[1]);
        assert_eq!(tree.leaf(leaves[1]).parent, NONE);
        assert_eq!(tree.total_weight(), 2.0);

        tree.remove(leaves[1]);
        assert_eq!(tree.root(), NONE);
        assert_eq!(tree.len(), 0);
        assert_eq!(tree.check_invariants(), 0);
    }

    #[test]
    fn slots_are_reused() {
        let (mut tree, leaves) = build(&[1.0, 1.0, 1.0, 1.0]);
        let before = tree.nodes.len();
        tree.remove(leaves[1]);
        tree.insert(9, 4.0);
        assert_eq!(tree.nodes.len(), before);
        assert_eq!(tree.total_weight(), 7.0);
        assert_eq!(tree.check_invariants(), 4);
    }

    #[test]
    fn interleaved_insert_remove_keeps_invariants() {
        let mut tree = Tree::new();
        let mut live = Vec::new();
        for i in 0..200usize {
            live.push(tree.insert(i, (i % 7 + 1) as f32));
            if i % 3 == 2 {
                let victim = live.remove(i % live.len());
                tree.remove(victim);
            }
            tree.check_invariants();
        }
        assert_eq!(tree.len(), live.len());
    }
}
