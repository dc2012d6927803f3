//! Grow-from-root tree construction with marginalized cutpoint evaluation.
//!
//! Starting from a single root holding the whole dataset, every node draws
//! among all valid cutpoints and an explicit no-split option, in proportion
//! to their marginal likelihoods. Left statistics are accumulated bin by bin
//! over each feature's pre-sorted order and the right statistics derived by
//! subtraction from the node total, so the full enumeration costs one sweep
//! per feature. Children are pushed on a FIFO queue, so siblings are
//! processed before grandchildren and construction is depth balanced.

use std::collections::VecDeque;

use rand::distributions::WeightedIndex;
use rand::rngs::StdRng;
use rand_distr::Distribution;

use crate::cutpoints::CutpointGrid;
use crate::data::{Dataset, FeatureType};
use crate::math::exp_normalize;
use crate::partition::SampleNodeMapper;
use crate::presort::SortedNodePartition;
use crate::prior::TreePrior;
use crate::suffstats::{LeafModel, SuffStat};
use crate::tree::{SplitRule, Tree, ROOT_ID};

/// Grows `tree` from a fresh root by recursive marginalized cutpoint draws.
///
/// `tree` must be a single root leaf and `sorted` freshly reset from the
/// dataset's presort container; both are left describing the final tree.
/// Leaf values are placeholders until the leaf sampler runs.
#[allow(clippy::too_many_arguments)]
pub fn sample_tree<M: LeafModel>(
    tree: &mut Tree,
    dataset: &Dataset,
    sorted: &mut SortedNodePartition,
    mapper: &mut SampleNodeMapper,
    model: &M,
    prior: &TreePrior,
    sigma2: f64,
    cutpoint_grid_size: usize,
    tree_id: usize,
    rng: &mut StdRng,
) {
    let mut split_queue: VecDeque<usize> = VecDeque::new();
    split_queue.push_back(ROOT_ID);

    while let Some(node) = split_queue.pop_front() {
        sample_split_rule(
            tree,
            dataset,
            sorted,
            mapper,
            model,
            prior,
            sigma2,
            cutpoint_grid_size,
            tree_id,
            node,
            &mut split_queue,
            rng,
        );
    }
}

/// Evaluates every valid cutpoint of `node` plus the no-split option, draws
/// one of them, and materializes the chosen split.
#[allow(clippy::too_many_arguments)]
fn sample_split_rule<M: LeafModel>(
    tree: &mut Tree,
    dataset: &Dataset,
    sorted: &mut SortedNodePartition,
    mapper: &mut SampleNodeMapper,
    model: &M,
    prior: &TreePrior,
    sigma2: f64,
    cutpoint_grid_size: usize,
    tree_id: usize,
    node: usize,
    split_queue: &mut VecDeque<usize>,
    rng: &mut StdRng,
) {
    let node_begin = sorted.node_begin(node);
    let node_end = sorted.node_end(node);

    // Node totals, swept once in feature-0 sorted order.
    let mut root_stat = model.new_stat();
    for position in node_begin..node_end {
        root_stat.increment(dataset, sorted.sort_index(0, position));
    }
    let no_split_log_ml = model.no_split_log_ml(&root_stat, sigma2);

    let num_features = dataset.num_covariates();
    let grids: Vec<CutpointGrid> = (0..num_features)
        .map(|feature| CutpointGrid::build(dataset, sorted, node, feature, cutpoint_grid_size))
        .collect();

    let mut log_cutpoint_evaluations: Vec<f64> = Vec::new();
    let mut cutpoint_features: Vec<usize> = Vec::new();
    let mut cutpoint_bins: Vec<usize> = Vec::new();

    let mut left_stat = model.new_stat();
    let mut right_stat = model.new_stat();
    for (feature, grid) in grids.iter().enumerate() {
        left_stat.reset();
        let num_bins = grid.num_bins();
        if num_bins < 2 {
            continue;
        }
        // The final bin is excluded: assigning every bin to the left leaves
        // nothing on the right.
        for bin_index in 0..num_bins - 1 {
            let bin = grid.bin(bin_index);
            for offset in 0..bin.length {
                left_stat.increment(dataset, sorted.sort_index(feature, bin.begin + offset));
            }
            right_stat.assign_difference(&root_stat, &left_stat);

            if left_stat.num_samples() >= prior.min_samples_leaf
                && right_stat.num_samples() >= prior.min_samples_leaf
            {
                log_cutpoint_evaluations.push(model.split_log_ml(&left_stat, &right_stat, sigma2));
                cutpoint_features.push(feature);
                cutpoint_bins.push(bin_index);
            }
        }
    }

    // No-split adjustment: the marginalized choice matches the BART
    // structural prior once the no-split likelihood carries the depth-prior
    // odds and the number of competing cutpoints.
    let depth = tree.depth(node);
    let mut no_split_adjustment =
        (((1.0 + depth as f64).powf(prior.beta) / prior.alpha) - 1.0).ln();
    let valid_cutpoint_count = log_cutpoint_evaluations.len();
    if valid_cutpoint_count > 0 {
        no_split_adjustment += (valid_cutpoint_count as f64).ln();
    }
    log_cutpoint_evaluations.push(no_split_log_ml + no_split_adjustment);

    let cutpoint_evaluations = exp_normalize(&log_cutpoint_evaluations);
    let split_dist = WeightedIndex::new(&cutpoint_evaluations).unwrap();
    let split_chosen = split_dist.sample(rng);
    if split_chosen == valid_cutpoint_count {
        // No-split sampled; the node stays a leaf.
        return;
    }

    let feature = cutpoint_features[split_chosen];
    let bin_index = cutpoint_bins[split_chosen];
    let grid = &grids[feature];
    let rule = match grid.feature_type() {
        FeatureType::UnorderedCategorical => SplitRule::Categories(grid.category_set(bin_index)),
        _ => SplitRule::Numeric(grid.cutpoint_value(bin_index)),
    };

    if let Ok((left_id, right_id)) = tree.expand_node(node, feature, rule.clone()) {
        sorted.partition_node(dataset, node, left_id, right_id, feature, &rule);
        mapper.set_rows(tree_id, sorted.node_indices(left_id, 0), left_id);
        mapper.set_rows(tree_id, sorted.node_indices(right_id, 0), right_id);
        split_queue.push_back(left_id);
        split_queue.push_back(right_id);
    }
}
