//! Pre-sorted leaf–observation tracking for grow-from-root construction.
//!
//! Each feature is argsorted once per dataset ([`FeaturePresortRootContainer`]);
//! every tree reset then clones those root orders into a
//! [`SortedNodePartition`], which keeps, for every node, a half-open range
//! into each feature's order. Splitting a node stably re-partitions every
//! feature's range so both children remain sorted per feature, which is what
//! lets cutpoint enumeration sweep bins left to right without re-sorting.

use crate::data::Dataset;
use crate::tree::SplitRule;

/// One stable argsort per feature over the full dataset, computed once.
#[derive(Debug, Clone)]
pub struct FeaturePresortRootContainer {
    sort_indices: Vec<Vec<usize>>,
}

impl FeaturePresortRootContainer {
    /// Argsorts every feature of the dataset.
    pub fn new(dataset: &Dataset) -> Self {
        let n = dataset.num_observations();
        let sort_indices = (0..dataset.num_covariates())
            .map(|feature| {
                let mut order: Vec<usize> = (0..n).collect();
                order.sort_by(|&a, &b| {
                    dataset
                        .covariate_value(a, feature)
                        .partial_cmp(&dataset.covariate_value(b, feature))
                        .unwrap()
                });
                order
            })
            .collect();
        Self { sort_indices }
    }

    /// Root sort order of one feature.
    pub fn feature_order(&self, feature: usize) -> &[usize] {
        &self.sort_indices[feature]
    }
}

/// Per-tree pre-sorted partition over all features.
///
/// Node ranges are shared across features: a node covers the same `[begin,
/// end)` positions in every feature's order, with each feature's positions
/// listing the node's observations in non-decreasing feature value.
#[derive(Debug, Clone)]
pub struct SortedNodePartition {
    feature_indices: Vec<Vec<usize>>,
    node_begin: Vec<usize>,
    node_size: Vec<usize>,
    scratch_left: Vec<usize>,
    scratch_right: Vec<usize>,
}

impl SortedNodePartition {
    /// Initializes a fresh tree's partition from the root sort orders.
    pub fn new(root: &FeaturePresortRootContainer, num_observations: usize) -> Self {
        Self {
            feature_indices: root.sort_indices.clone(),
            node_begin: vec![0],
            node_size: vec![num_observations],
            scratch_left: Vec::with_capacity(num_observations),
            scratch_right: Vec::with_capacity(num_observations),
        }
    }

    /// Rewinds to the root sort orders for the next tree, reusing buffers.
    pub fn reset(&mut self, root: &FeaturePresortRootContainer) {
        for (order, root_order) in self
            .feature_indices
            .iter_mut()
            .zip(root.sort_indices.iter())
        {
            order.copy_from_slice(root_order);
        }
        let n = self.feature_indices[0].len();
        self.node_begin.clear();
        self.node_begin.push(0);
        self.node_size.clear();
        self.node_size.push(n);
    }

    fn ensure_node(&mut self, id: usize) {
        if id >= self.node_begin.len() {
            self.node_begin.resize(id + 1, 0);
            self.node_size.resize(id + 1, 0);
        }
    }

    /// First position of `node`'s observations in every feature order.
    #[inline(always)]
    pub fn node_begin(&self, node: usize) -> usize {
        self.node_begin[node]
    }

    /// One past the last position of `node`'s observations.
    #[inline(always)]
    pub fn node_end(&self, node: usize) -> usize {
        self.node_begin[node] + self.node_size[node]
    }

    /// Number of observations in `node`.
    #[inline(always)]
    pub fn node_size(&self, node: usize) -> usize {
        self.node_size[node]
    }

    /// Observation at `position` of `feature`'s sort order.
    #[inline(always)]
    pub fn sort_index(&self, feature: usize, position: usize) -> usize {
        self.feature_indices[feature][position]
    }

    /// Observations of `node` in `feature`'s sorted order.
    pub fn node_indices(&self, node: usize, feature: usize) -> &[usize] {
        &self.feature_indices[feature][self.node_begin(node)..self.node_end(node)]
    }

    /// Splits `node` into `(left_id, right_id)` by the rule on
    /// `split_feature`, stably sifting every feature's order so both sides
    /// stay per-feature sorted.
    ///
    /// Returns the left child's size.
    pub fn partition_node(
        &mut self,
        dataset: &Dataset,
        node: usize,
        left_id: usize,
        right_id: usize,
        split_feature: usize,
        rule: &SplitRule,
    ) -> usize {
        let begin = self.node_begin(node);
        let end = self.node_end(node);
        let mut num_left = 0;

        for feature in 0..self.feature_indices.len() {
            self.scratch_left.clear();
            self.scratch_right.clear();
            for position in begin..end {
                let row = self.feature_indices[feature][position];
                if rule.goes_left(dataset.covariate_value(row, split_feature)) {
                    self.scratch_left.push(row);
                } else {
                    self.scratch_right.push(row);
                }
            }
            num_left = self.scratch_left.len();
            let order = &mut self.feature_indices[feature];
            order[begin..begin + num_left].copy_from_slice(&self.scratch_left);
            order[begin + num_left..end].copy_from_slice(&self.scratch_right);
        }

        self.ensure_node(left_id.max(right_id));
        self.node_begin[left_id] = begin;
        self.node_size[left_id] = num_left;
        self.node_begin[right_id] = begin + num_left;
        self.node_size[right_id] = end - begin - num_left;

        num_left
    }
}
