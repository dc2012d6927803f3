//! Binary regression tree stored as an id-indexed arena.
//!
//! The tree is implemented as parallel vectors indexed by node id, with
//! parent/left/right links kept as integers and deleted ids recycled through
//! a free list. Index access avoids the borrow-checker friction of pointer
//! based binary trees and keeps the hot traversal paths cache friendly.
//!
//! Split rules are either a numeric threshold (route left iff `x ≤ τ`) or a
//! category set (route left iff `x ∈ S`). Leaf values are stored in a single
//! strided buffer so that constant leaves (`leaf_dim == 1`) and regression
//! leaves (`leaf_dim == d`) share one representation.

use core::fmt;

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// Id of the root node. Fixed for the lifetime of a tree.
pub const ROOT_ID: usize = 0;

const NONE: i32 = -1;

/// Decision rule attached to an internal node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SplitRule {
    /// Route left iff the feature value is less than or equal to the threshold.
    Numeric(f64),
    /// Route left iff the feature code belongs to the category set.
    Categories(Vec<u32>),
}

impl SplitRule {
    /// Evaluates the routing decision for a raw feature value.
    #[inline(always)]
    pub fn goes_left(&self, value: f64) -> bool {
        match self {
            SplitRule::Numeric(threshold) => value <= *threshold,
            SplitRule::Categories(categories) => categories.contains(&(value as u32)),
        }
    }
}

/// Errors raised by structural tree rewrites.
#[derive(Debug, PartialEq, Eq)]
pub enum TreeError {
    /// Attempted to split a node that is not a leaf.
    NonLeafSplit,
    /// Attempted to collapse a node whose children are not both leaves.
    NonLeafParentCollapse,
    /// The node id does not address a live node.
    InvalidNodeIndex,
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TreeError::NonLeafSplit => write!(f, "Cannot split a non-leaf node"),
            TreeError::NonLeafParentCollapse => {
                write!(f, "Cannot collapse a node whose children are not leaves")
            }
            TreeError::InvalidNodeIndex => write!(f, "Node index does not exist"),
        }
    }
}

/// An arena-allocated binary decision tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    parent: Vec<i32>,
    left: Vec<i32>,
    right: Vec<i32>,
    split_feature: Vec<usize>,
    rule: Vec<Option<SplitRule>>,
    deleted: Vec<bool>,
    free: Vec<usize>,
    /// Leaf values, strided by `leaf_dim`; slots of internal nodes are stale.
    values: Vec<f64>,
    leaf_dim: usize,
}

impl Tree {
    /// Creates a tree consisting of a single root leaf holding `root_value`.
    pub fn new(leaf_dim: usize, root_value: &[f64]) -> Self {
        debug_assert_eq!(root_value.len(), leaf_dim);
        Self {
            parent: vec![NONE],
            left: vec![NONE],
            right: vec![NONE],
            split_feature: vec![0],
            rule: vec![None],
            deleted: vec![false],
            free: Vec::new(),
            values: root_value.to_vec(),
            leaf_dim,
        }
    }

    /// Resets the tree to a single root leaf holding `root_value`.
    pub fn reset(&mut self, root_value: &[f64]) {
        debug_assert_eq!(root_value.len(), self.leaf_dim);
        self.parent.clear();
        self.parent.push(NONE);
        self.left.clear();
        self.left.push(NONE);
        self.right.clear();
        self.right.push(NONE);
        self.split_feature.clear();
        self.split_feature.push(0);
        self.rule.clear();
        self.rule.push(None);
        self.deleted.clear();
        self.deleted.push(false);
        self.free.clear();
        self.values.clear();
        self.values.extend_from_slice(root_value);
    }

    /// Number of leaf-value dimensions.
    #[inline(always)]
    pub fn leaf_dim(&self) -> usize {
        self.leaf_dim
    }

    /// Upper bound on node ids (deleted slots included).
    pub fn node_capacity(&self) -> usize {
        self.parent.len()
    }

    /// Whether `id` addresses a live node.
    #[inline(always)]
    pub fn is_valid(&self, id: usize) -> bool {
        id < self.parent.len() && !self.deleted[id]
    }

    /// Whether `id` is a live leaf.
    #[inline(always)]
    pub fn is_leaf(&self, id: usize) -> bool {
        self.is_valid(id) && self.left[id] == NONE
    }

    /// Parent of `id`, if any.
    #[inline(always)]
    pub fn parent(&self, id: usize) -> Option<usize> {
        match self.parent[id] {
            NONE => None,
            p => Some(p as usize),
        }
    }

    /// Left child of `id`, if `id` is internal.
    #[inline(always)]
    pub fn left_child(&self, id: usize) -> Option<usize> {
        match self.left[id] {
            NONE => None,
            c => Some(c as usize),
        }
    }

    /// Right child of `id`, if `id` is internal.
    #[inline(always)]
    pub fn right_child(&self, id: usize) -> Option<usize> {
        match self.right[id] {
            NONE => None,
            c => Some(c as usize),
        }
    }

    /// Split feature of an internal node.
    #[inline(always)]
    pub fn split_feature(&self, id: usize) -> usize {
        self.split_feature[id]
    }

    /// Split rule of an internal node, `None` for leaves.
    #[inline(always)]
    pub fn split_rule(&self, id: usize) -> Option<&SplitRule> {
        self.rule[id].as_ref()
    }

    /// Depth of a node (root has depth 0).
    pub fn depth(&self, id: usize) -> usize {
        let mut depth = 0;
        let mut current = id;
        while let Some(p) = self.parent(current) {
            depth += 1;
            current = p;
        }
        depth
    }

    /// Number of live nodes.
    pub fn num_valid_nodes(&self) -> usize {
        self.parent.len() - self.free.len()
    }

    /// Number of live leaves.
    pub fn num_leaves(&self) -> usize {
        (0..self.parent.len()).filter(|&id| self.is_leaf(id)).count()
    }

    /// Ids of all live leaves, in increasing id order.
    pub fn leaves(&self) -> Vec<usize> {
        (0..self.parent.len())
            .filter(|&id| self.is_leaf(id))
            .collect()
    }

    /// Ids of all internal nodes whose children are both leaves.
    pub fn leaf_parents(&self) -> Vec<usize> {
        (0..self.parent.len())
            .filter(|&id| self.is_leaf_parent(id))
            .collect()
    }

    /// Whether `id` is an internal node with two leaf children.
    pub fn is_leaf_parent(&self, id: usize) -> bool {
        if !self.is_valid(id) || self.left[id] == NONE {
            return false;
        }
        self.is_leaf(self.left[id] as usize) && self.is_leaf(self.right[id] as usize)
    }

    /// Leaf value slice of a node.
    #[inline(always)]
    pub fn leaf_value(&self, id: usize) -> &[f64] {
        let start = id * self.leaf_dim;
        &self.values[start..start + self.leaf_dim]
    }

    /// Overwrites the leaf value of a node.
    pub fn set_leaf_value(&mut self, id: usize, value: &[f64]) {
        debug_assert_eq!(value.len(), self.leaf_dim);
        let start = id * self.leaf_dim;
        self.values[start..start + self.leaf_dim].copy_from_slice(value);
    }

    /// Allocates a node slot, recycling the most recently freed id first.
    fn alloc_node(&mut self) -> usize {
        if let Some(id) = self.free.pop() {
            self.parent[id] = NONE;
            self.left[id] = NONE;
            self.right[id] = NONE;
            self.split_feature[id] = 0;
            self.rule[id] = None;
            self.deleted[id] = false;
            let start = id * self.leaf_dim;
            self.values[start..start + self.leaf_dim].fill(0.0);
            id
        } else {
            let id = self.parent.len();
            self.parent.push(NONE);
            self.left.push(NONE);
            self.right.push(NONE);
            self.split_feature.push(0);
            self.rule.push(None);
            self.deleted.push(false);
            self.values.extend(std::iter::repeat(0.0).take(self.leaf_dim));
            id
        }
    }

    /// Turns the leaf `id` into an internal node with the given rule and two
    /// fresh leaf children holding placeholder zero values.
    ///
    /// Returns the (left, right) child ids.
    pub fn expand_node(
        &mut self,
        id: usize,
        feature: usize,
        rule: SplitRule,
    ) -> Result<(usize, usize), TreeError> {
        if !self.is_valid(id) {
            return Err(TreeError::InvalidNodeIndex);
        }
        if !self.is_leaf(id) {
            return Err(TreeError::NonLeafSplit);
        }

        let left_id = self.alloc_node();
        let right_id = self.alloc_node();

        self.split_feature[id] = feature;
        self.rule[id] = Some(rule);
        self.left[id] = left_id as i32;
        self.right[id] = right_id as i32;
        self.parent[left_id] = id as i32;
        self.parent[right_id] = id as i32;

        Ok((left_id, right_id))
    }

    /// Collapses a leaf-parent back into a leaf with a placeholder zero value.
    ///
    /// The freed child ids are queued so that an immediate re-expansion
    /// reuses them in the same left/right order, and trailing freed slots are
    /// truncated so a split-then-collapse round trip restores the arena
    /// exactly.
    pub fn collapse_to_leaf(&mut self, id: usize) -> Result<(), TreeError> {
        if !self.is_valid(id) {
            return Err(TreeError::InvalidNodeIndex);
        }
        if !self.is_leaf_parent(id) {
            return Err(TreeError::NonLeafParentCollapse);
        }

        let left_id = self.left[id] as usize;
        let right_id = self.right[id] as usize;

        self.deleted[left_id] = true;
        self.deleted[right_id] = true;
        self.free.push(right_id);
        self.free.push(left_id);

        self.left[id] = NONE;
        self.right[id] = NONE;
        self.split_feature[id] = 0;
        self.rule[id] = None;
        let start = id * self.leaf_dim;
        self.values[start..start + self.leaf_dim].fill(0.0);

        while self
            .deleted
            .last()
            .map_or(false, |&last_deleted| last_deleted)
        {
            let last = self.parent.len() - 1;
            self.parent.pop();
            self.left.pop();
            self.right.pop();
            self.split_feature.pop();
            self.rule.pop();
            self.deleted.pop();
            self.values.truncate(self.values.len() - self.leaf_dim);
            if let Some(pos) = self.free.iter().position(|&id| id == last) {
                self.free.remove(pos);
            }
        }

        Ok(())
    }

    /// Predicts the response of a single sample by root-to-leaf traversal.
    ///
    /// Regression leaves dot the leaf vector with the basis row; constant
    /// leaves ignore the basis.
    pub fn predict_row(&self, sample: ArrayView1<f64>, basis: Option<ArrayView1<f64>>) -> f64 {
        let mut node = ROOT_ID;
        loop {
            if self.left[node] == NONE {
                return self.leaf_response(node, basis);
            }
            let feature = self.split_feature[node];
            let rule = self.rule[node].as_ref().unwrap();
            node = if rule.goes_left(sample[feature]) {
                self.left[node] as usize
            } else {
                self.right[node] as usize
            };
        }
    }

    /// Response contributed by a leaf for a given basis row.
    #[inline(always)]
    pub fn leaf_response(&self, id: usize, basis: Option<ArrayView1<f64>>) -> f64 {
        let value = self.leaf_value(id);
        match basis {
            Some(w) => value.iter().zip(w.iter()).map(|(b, w)| b * w).sum(),
            None => value[0],
        }
    }

    /// Sum of squared leaf values over the live leaves.
    pub fn sum_leaf_squared(&self) -> f64 {
        let mut total = 0.0;
        for id in 0..self.parent.len() {
            if self.is_leaf(id) {
                total += self.leaf_value(id).iter().map(|v| v * v).sum::<f64>();
            }
        }
        total
    }
}
