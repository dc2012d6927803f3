//! Candidate cutpoint grids for grow-from-root split enumeration.
//!
//! For numeric and ordered-categorical features the node's sorted order is
//! cut into at most `grid_size` adjacent bins by quantile-like striding, with
//! ties kept inside a single bin so every bin boundary is a usable threshold.
//! For unordered categorical features each category present in the node forms
//! one bin, and bins are ordered by the category's mean residual so the
//! enumeration can treat them like an ordered feature; the chosen bin decodes
//! back to the category set of every bin at or before it.

use crate::data::{Dataset, FeatureType};
use crate::presort::SortedNodePartition;

/// One candidate bin: a run of positions in the feature's sorted order.
#[derive(Debug, Clone, Copy)]
pub struct CutpointBin {
    /// Absolute start position in the feature's sort order.
    pub begin: usize,
    /// Number of observations in the bin.
    pub length: usize,
}

/// Candidate cutpoints for one (node, feature) pair.
#[derive(Debug, Clone)]
pub struct CutpointGrid {
    bins: Vec<CutpointBin>,
    values: Vec<f64>,
    categories: Vec<u32>,
    feature_type: FeatureType,
}

impl CutpointGrid {
    /// Builds the grid for `feature` over `node`'s observations.
    pub fn build(
        dataset: &Dataset,
        sorted: &SortedNodePartition,
        node: usize,
        feature: usize,
        grid_size: usize,
    ) -> Self {
        match dataset.feature_type(feature) {
            FeatureType::UnorderedCategorical => {
                Self::build_categorical(dataset, sorted, node, feature)
            }
            feature_type => Self::build_strided(dataset, sorted, node, feature, grid_size, feature_type),
        }
    }

    fn build_strided(
        dataset: &Dataset,
        sorted: &SortedNodePartition,
        node: usize,
        feature: usize,
        grid_size: usize,
        feature_type: FeatureType,
    ) -> Self {
        let begin = sorted.node_begin(node);
        let end = sorted.node_end(node);
        let node_size = end - begin;
        let stride = (node_size + grid_size - 1) / grid_size;
        let stride = stride.max(1);

        let mut bins = Vec::new();
        let mut values = Vec::new();

        let mut position = begin;
        while position < end {
            let target = (position + stride).min(end);
            // The bin's representative value is its last observation; ties
            // with the next positions are pulled into the same bin so the
            // boundary between adjacent bins is always a strict value change.
            let mut bin_end = target;
            let value = dataset.covariate_value(sorted.sort_index(feature, bin_end - 1), feature);
            while bin_end < end
                && dataset.covariate_value(sorted.sort_index(feature, bin_end), feature) == value
            {
                bin_end += 1;
            }
            bins.push(CutpointBin {
                begin: position,
                length: bin_end - position,
            });
            values.push(value);
            position = bin_end;
        }

        Self {
            bins,
            values,
            categories: Vec::new(),
            feature_type,
        }
    }

    fn build_categorical(
        dataset: &Dataset,
        sorted: &SortedNodePartition,
        node: usize,
        feature: usize,
    ) -> Self {
        let begin = sorted.node_begin(node);
        let end = sorted.node_end(node);

        // Categories form contiguous runs of the node's code-sorted order.
        // Each run is collected with its residual sum, then the runs are
        // ordered by mean residual (ties broken by code) so downstream
        // enumeration can sweep them like an ordered feature.
        struct CategoryRun {
            code: u32,
            begin: usize,
            length: usize,
            residual_sum: f64,
        }

        let mut runs: Vec<CategoryRun> = Vec::new();
        let mut position = begin;
        while position < end {
            let row = sorted.sort_index(feature, position);
            let code = dataset.covariate_value(row, feature) as u32;
            let run_begin = position;
            let mut residual_sum = 0.0;
            while position < end {
                let row = sorted.sort_index(feature, position);
                if dataset.covariate_value(row, feature) as u32 != code {
                    break;
                }
                residual_sum += dataset.residual_value(row);
                position += 1;
            }
            runs.push(CategoryRun {
                code,
                begin: run_begin,
                length: position - run_begin,
                residual_sum,
            });
        }

        runs.sort_by(|a, b| {
            let mean_a = a.residual_sum / a.length as f64;
            let mean_b = b.residual_sum / b.length as f64;
            mean_a
                .partial_cmp(&mean_b)
                .unwrap()
                .then(a.code.cmp(&b.code))
        });

        let bins = runs
            .iter()
            .map(|run| CutpointBin {
                begin: run.begin,
                length: run.length,
            })
            .collect();
        let values = runs.iter().map(|run| run.code as f64).collect();
        let categories = runs.iter().map(|run| run.code).collect();

        Self {
            bins,
            values,
            categories,
            feature_type: FeatureType::UnorderedCategorical,
        }
    }

    /// Feature type the grid was built for.
    pub fn feature_type(&self) -> FeatureType {
        self.feature_type
    }

    /// Number of bins.
    pub fn num_bins(&self) -> usize {
        self.bins.len()
    }

    /// Bin `k`.
    #[inline(always)]
    pub fn bin(&self, k: usize) -> CutpointBin {
        self.bins[k]
    }

    /// Numeric threshold decoded from bin `k` (numeric / ordered features):
    /// the largest feature value routed left.
    pub fn cutpoint_value(&self, k: usize) -> f64 {
        self.values[k]
    }

    /// Category set decoded from bin `k` (unordered features): the categories
    /// of every bin at or before `k`, in ascending code order.
    pub fn category_set(&self, k: usize) -> Vec<u32> {
        let mut set: Vec<u32> = self.categories[..=k].to_vec();
        set.sort_unstable();
        set
    }
}
