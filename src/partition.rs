//! Leaf–observation tracking for MCMC moves: an unsorted partition of
//! observation indices per tree, and the observation→leaf mapper shared by
//! both tree samplers.
//!
//! The partition stores one permutation of `0..N` per tree together with a
//! half-open `[begin, end)` range per node. A split stably re-partitions the
//! parent's range in place; a prune concatenates the two child ranges, which
//! restores the parent's range because splits are stable.

use crate::data::Dataset;
use crate::tree::Tree;

const NONE: i32 = -1;

/// Per-tree partition of observation indices over tree nodes, with no
/// feature-specific ordering.
#[derive(Debug, Clone)]
pub struct FeatureUnsortedPartition {
    indices: Vec<usize>,
    node_begin: Vec<usize>,
    node_length: Vec<usize>,
    parent: Vec<i32>,
    left: Vec<i32>,
    right: Vec<i32>,
    scratch: Vec<usize>,
}

impl FeatureUnsortedPartition {
    /// Creates a partition with every observation assigned to the root.
    pub fn new(num_observations: usize) -> Self {
        Self {
            indices: (0..num_observations).collect(),
            node_begin: vec![0],
            node_length: vec![num_observations],
            parent: vec![NONE],
            left: vec![NONE],
            right: vec![NONE],
            scratch: Vec::with_capacity(num_observations),
        }
    }

    /// Resets every observation to the root node.
    pub fn reset(&mut self) {
        let n = self.indices.len();
        for (position, index) in self.indices.iter_mut().enumerate() {
            *index = position;
        }
        self.node_begin.clear();
        self.node_begin.push(0);
        self.node_length.clear();
        self.node_length.push(n);
        self.parent.clear();
        self.parent.push(NONE);
        self.left.clear();
        self.left.push(NONE);
        self.right.clear();
        self.right.push(NONE);
    }

    fn ensure_node(&mut self, id: usize) {
        if id >= self.node_begin.len() {
            self.node_begin.resize(id + 1, 0);
            self.node_length.resize(id + 1, 0);
            self.parent.resize(id + 1, NONE);
            self.left.resize(id + 1, NONE);
            self.right.resize(id + 1, NONE);
        }
    }

    /// First index position of `node`'s observations.
    #[inline(always)]
    pub fn node_begin(&self, node: usize) -> usize {
        self.node_begin[node]
    }

    /// One past the last index position of `node`'s observations.
    #[inline(always)]
    pub fn node_end(&self, node: usize) -> usize {
        self.node_begin[node] + self.node_length[node]
    }

    /// Number of observations in `node`.
    #[inline(always)]
    pub fn node_size(&self, node: usize) -> usize {
        self.node_length[node]
    }

    /// Observation indices currently assigned to `node`.
    pub fn node_indices(&self, node: usize) -> &[usize] {
        &self.indices[self.node_begin(node)..self.node_end(node)]
    }

    /// Whether `node` is a leaf of the partition topology.
    pub fn is_leaf(&self, node: usize) -> bool {
        self.left[node] == NONE
    }

    /// Live leaf nodes reachable from the root.
    pub fn leaf_nodes(&self) -> Vec<usize> {
        let mut leaves = Vec::new();
        let mut stack = vec![0usize];
        while let Some(node) = stack.pop() {
            if self.is_leaf(node) {
                leaves.push(node);
            } else {
                stack.push(self.right[node] as usize);
                stack.push(self.left[node] as usize);
            }
        }
        leaves
    }

    /// Splits `node` into `(left_id, right_id)` by stably re-partitioning its
    /// index range with the routing predicate.
    ///
    /// Returns the sizes of the two children.
    pub fn split_node<F>(
        &mut self,
        node: usize,
        left_id: usize,
        right_id: usize,
        goes_left: F,
    ) -> (usize, usize)
    where
        F: Fn(usize) -> bool,
    {
        let begin = self.node_begin(node);
        let end = self.node_end(node);

        // Stable partition of indices[begin..end): left rows keep their
        // relative order, then right rows keep theirs.
        self.scratch.clear();
        let mut num_left = 0;
        for position in begin..end {
            if goes_left(self.indices[position]) {
                self.scratch.push(self.indices[position]);
                num_left += 1;
            }
        }
        for position in begin..end {
            if !goes_left(self.indices[position]) {
                self.scratch.push(self.indices[position]);
            }
        }
        self.indices[begin..end].copy_from_slice(&self.scratch);

        let num_right = end - begin - num_left;

        self.ensure_node(left_id.max(right_id));
        self.node_begin[left_id] = begin;
        self.node_length[left_id] = num_left;
        self.node_begin[right_id] = begin + num_left;
        self.node_length[right_id] = num_right;
        self.parent[left_id] = node as i32;
        self.parent[right_id] = node as i32;
        self.left[left_id] = NONE;
        self.right[left_id] = NONE;
        self.left[right_id] = NONE;
        self.right[right_id] = NONE;
        self.left[node] = left_id as i32;
        self.right[node] = right_id as i32;

        (num_left, num_right)
    }

    /// Converts a currently split node back into a leaf.
    ///
    /// The child ranges are adjacent by construction, so the parent's range
    /// already covers their union; only the topology needs rewinding.
    pub fn prune_to_leaf(&mut self, node: usize) {
        debug_assert!(!self.is_leaf(node));
        let left_id = self.left[node] as usize;
        let right_id = self.right[node] as usize;
        debug_assert!(self.is_leaf(left_id) && self.is_leaf(right_id));
        debug_assert_eq!(self.node_end(left_id), self.node_begin(right_id));

        self.parent[left_id] = NONE;
        self.parent[right_id] = NONE;
        self.node_length[left_id] = 0;
        self.node_length[right_id] = 0;
        self.left[node] = NONE;
        self.right[node] = NONE;
    }

    /// Rebuilds the partition for an existing tree by routing every node's
    /// range through the tree's split rules.
    ///
    /// Relies on parent ids preceding child ids, which holds for any tree
    /// grown from a fresh root.
    pub fn from_tree(tree: &Tree, dataset: &Dataset) -> Self {
        let mut partition = Self::new(dataset.num_observations());
        for id in 0..tree.node_capacity() {
            if !tree.is_valid(id) || tree.is_leaf(id) {
                continue;
            }
            let feature = tree.split_feature(id);
            let rule = tree.split_rule(id).cloned().unwrap();
            let left_id = tree.left_child(id).unwrap();
            let right_id = tree.right_child(id).unwrap();
            partition.split_node(id, left_id, right_id, |row| {
                rule.goes_left(dataset.covariate_value(row, feature))
            });
        }
        partition
    }
}

/// Maps every observation to its leaf node, per tree.
///
/// The Gibbs driver reads cached per-tree predictions through this map; the
/// samplers refresh the affected leaves after every structural rewrite.
#[derive(Debug, Clone)]
pub struct SampleNodeMapper {
    node_ids: Vec<Vec<usize>>,
}

impl SampleNodeMapper {
    /// Creates a mapper assigning every observation of every tree to the root.
    pub fn new(num_trees: usize, num_observations: usize) -> Self {
        Self {
            node_ids: vec![vec![0; num_observations]; num_trees],
        }
    }

    /// Leaf node of `observation` in `tree_id`.
    #[inline(always)]
    pub fn node_id(&self, tree_id: usize, observation: usize) -> usize {
        self.node_ids[tree_id][observation]
    }

    /// Reassigns every observation of `tree_id` to the root.
    pub fn assign_all_to_root(&mut self, tree_id: usize) {
        self.node_ids[tree_id].fill(0);
    }

    /// Points the given rows of `tree_id` at `node`.
    pub fn set_rows(&mut self, tree_id: usize, rows: &[usize], node: usize) {
        for &row in rows {
            self.node_ids[tree_id][row] = node;
        }
    }
}
