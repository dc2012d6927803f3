//! Reversible-jump MCMC over a single tree: grow and prune proposals with
//! Metropolis–Hastings acceptance against the current partial residual.
//!
//! A grow proposal picks an eligible leaf (at least `2·min_samples_leaf`
//! observations), a feature from the user's variable weights, and a uniform
//! threshold inside the leaf's observed feature range; a prune proposal picks
//! a leaf-parent uniformly. Sufficient statistics are accumulated on local
//! copies only, and the tree, partition, and observation map are rewritten
//! only after acceptance, so every rejection path leaves the sampler state
//! untouched.

use rand::distributions::WeightedIndex;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

use crate::data::Dataset;
use crate::error::XBartError;
use crate::partition::{FeatureUnsortedPartition, SampleNodeMapper};
use crate::prior::TreePrior;
use crate::suffstats::{LeafModel, SuffStat};
use crate::tree::{SplitRule, Tree};

/// The structural move a proposal attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveKind {
    /// Split a leaf into two children.
    Grow,
    /// Collapse a leaf-parent back into a leaf.
    Prune,
}

/// Outcome of one MCMC proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    /// Which move was proposed.
    pub kind: MoveKind,
    /// Whether the move was accepted.
    pub accepted: bool,
}

/// Runs one grow-or-prune step on `tree` conditional on the current residual.
///
/// Returns the proposal record, or an error when neither move is
/// structurally possible.
#[allow(clippy::too_many_arguments)]
pub fn sample_tree<M: LeafModel>(
    tree: &mut Tree,
    dataset: &Dataset,
    partition: &mut FeatureUnsortedPartition,
    mapper: &mut SampleNodeMapper,
    model: &M,
    prior: &TreePrior,
    feature_dist: &WeightedIndex<f64>,
    sigma2: f64,
    tree_id: usize,
    rng: &mut StdRng,
) -> Result<MoveRecord, XBartError> {
    let min_grow_size = 2 * prior.min_samples_leaf;
    let eligible_leaves: Vec<usize> = tree
        .leaves()
        .into_iter()
        .filter(|&leaf| partition.node_size(leaf) >= min_grow_size)
        .collect();

    let grow_possible = !eligible_leaves.is_empty();
    let prune_possible = tree.num_valid_nodes() > 1;

    let prob_grow = match (grow_possible, prune_possible) {
        (true, true) => 0.5,
        (true, false) => 1.0,
        (false, true) => 0.0,
        (false, false) => return Err(XBartError::EmptyMoveSet { tree: tree_id }),
    };

    if rng.gen::<f64>() < prob_grow {
        grow(
            tree,
            dataset,
            partition,
            mapper,
            model,
            prior,
            feature_dist,
            sigma2,
            tree_id,
            &eligible_leaves,
            prob_grow,
            rng,
        )
    } else {
        prune(
            tree,
            dataset,
            partition,
            mapper,
            model,
            prior,
            sigma2,
            tree_id,
            &eligible_leaves,
            1.0 - prob_grow,
            rng,
        )
    }
}

/// Observed [min, max] of a feature within one node's index range.
///
/// Both bounds are updated independently for every observation.
fn feature_range(
    dataset: &Dataset,
    partition: &FeatureUnsortedPartition,
    node: usize,
    feature: usize,
) -> (f64, f64) {
    let mut var_min = f64::MAX;
    let mut var_max = f64::MIN;
    for &row in partition.node_indices(node) {
        let value = dataset.covariate_value(row, feature);
        if value < var_min {
            var_min = value;
        }
        if value > var_max {
            var_max = value;
        }
    }
    (var_min, var_max)
}

#[allow(clippy::too_many_arguments)]
fn grow<M: LeafModel>(
    tree: &mut Tree,
    dataset: &Dataset,
    partition: &mut FeatureUnsortedPartition,
    mapper: &mut SampleNodeMapper,
    model: &M,
    prior: &TreePrior,
    feature_dist: &WeightedIndex<f64>,
    sigma2: f64,
    tree_id: usize,
    eligible_leaves: &[usize],
    prob_grow_old: f64,
    rng: &mut StdRng,
) -> Result<MoveRecord, XBartError> {
    let rejected = MoveRecord {
        kind: MoveKind::Grow,
        accepted: false,
    };

    let leaf = eligible_leaves[rng.gen_range(0..eligible_leaves.len())];
    let depth = tree.depth(leaf);
    let feature = feature_dist.sample(rng);

    let (var_min, var_max) = feature_range(dataset, partition, leaf, feature);
    if var_max <= var_min {
        return Ok(rejected);
    }
    let threshold = Uniform::new(var_min, var_max).sample(rng);
    let rule = SplitRule::Numeric(threshold);

    // Evaluate the proposal on local accumulators only.
    let mut root_stat = model.new_stat();
    let mut left_stat = model.new_stat();
    let mut right_stat = model.new_stat();
    for &row in partition.node_indices(leaf) {
        root_stat.increment(dataset, row);
        if rule.goes_left(dataset.covariate_value(row, feature)) {
            left_stat.increment(dataset, row);
        } else {
            right_stat.increment(dataset, row);
        }
    }
    let left_n = left_stat.num_samples();
    let right_n = right_stat.num_samples();
    if left_n == 0 || right_n == 0 {
        return Ok(rejected);
    }

    let split_log_ml = model.split_log_ml(&left_stat, &right_stat, sigma2);
    let no_split_log_ml = model.no_split_log_ml(&root_stat, sigma2);

    let pg = prior.split_prob(depth);
    let pg_child = prior.split_prob(depth + 1);

    // Reverse-move availability: after the split, grow stays possible when
    // another eligible leaf exists or either child is itself eligible.
    let min_grow_size = 2 * prior.min_samples_leaf;
    let new_grow_possible =
        eligible_leaves.len() > 1 || left_n >= min_grow_size || right_n >= min_grow_size;
    let prob_prune_new: f64 = if new_grow_possible { 0.5 } else { 1.0 };

    let parent_was_leaf_parent = tree
        .parent(leaf)
        .map_or(false, |parent| tree.is_leaf_parent(parent));
    let num_leaf_parents_new =
        tree.leaf_parents().len() + 1 - usize::from(parent_was_leaf_parent);

    let mut log_mh_ratio = pg.ln() + 2.0 * (1.0 - pg_child).ln() - (1.0 - pg).ln()
        + prob_prune_new.ln()
        - prob_grow_old.ln()
        - (num_leaf_parents_new as f64).ln()
        + (eligible_leaves.len() as f64).ln()
        + split_log_ml
        - no_split_log_ml;
    if log_mh_ratio > 0.0 {
        log_mh_ratio = 0.0;
    }

    if rng.gen::<f64>().ln() > log_mh_ratio {
        return Ok(rejected);
    }

    match tree.expand_node(leaf, feature, rule.clone()) {
        Ok((left_id, right_id)) => {
            partition.split_node(leaf, left_id, right_id, |row| {
                rule.goes_left(dataset.covariate_value(row, feature))
            });
            mapper.set_rows(tree_id, partition.node_indices(left_id), left_id);
            mapper.set_rows(tree_id, partition.node_indices(right_id), right_id);
            Ok(MoveRecord {
                kind: MoveKind::Grow,
                accepted: true,
            })
        }
        Err(_) => Ok(rejected),
    }
}

#[allow(clippy::too_many_arguments)]
fn prune<M: LeafModel>(
    tree: &mut Tree,
    dataset: &Dataset,
    partition: &mut FeatureUnsortedPartition,
    mapper: &mut SampleNodeMapper,
    model: &M,
    prior: &TreePrior,
    sigma2: f64,
    tree_id: usize,
    eligible_leaves: &[usize],
    prob_prune_old: f64,
    rng: &mut StdRng,
) -> Result<MoveRecord, XBartError> {
    let rejected = MoveRecord {
        kind: MoveKind::Prune,
        accepted: false,
    };

    let leaf_parents = tree.leaf_parents();
    let node = leaf_parents[rng.gen_range(0..leaf_parents.len())];
    let depth = tree.depth(node);
    let left_id = tree.left_child(node).unwrap();
    let right_id = tree.right_child(node).unwrap();

    let mut root_stat = model.new_stat();
    let mut left_stat = model.new_stat();
    let mut right_stat = model.new_stat();
    for &row in partition.node_indices(left_id) {
        root_stat.increment(dataset, row);
        left_stat.increment(dataset, row);
    }
    for &row in partition.node_indices(right_id) {
        root_stat.increment(dataset, row);
        right_stat.increment(dataset, row);
    }

    let split_log_ml = model.split_log_ml(&left_stat, &right_stat, sigma2);
    let no_split_log_ml = model.no_split_log_ml(&root_stat, sigma2);

    let pg = prior.split_prob(depth);
    let pg_child = prior.split_prob(depth + 1);

    // Reverse-move bookkeeping in the pruned tree: the merged node always
    // holds at least 2·min_samples_leaf observations, so it is growable.
    let num_eligible_new = 1 + eligible_leaves
        .iter()
        .filter(|&&leaf| leaf != left_id && leaf != right_id)
        .count();
    let prune_possible_new = tree.num_valid_nodes() - 2 > 1;
    let prob_grow_new: f64 = if prune_possible_new { 0.5 } else { 1.0 };

    let mut log_mh_ratio = (1.0 - pg).ln() - pg.ln() - 2.0 * (1.0 - pg_child).ln()
        + prob_grow_new.ln()
        - prob_prune_old.ln()
        - (num_eligible_new as f64).ln()
        + (leaf_parents.len() as f64).ln()
        + no_split_log_ml
        - split_log_ml;
    if log_mh_ratio > 0.0 {
        log_mh_ratio = 0.0;
    }

    if rng.gen::<f64>().ln() > log_mh_ratio {
        return Ok(rejected);
    }

    match tree.collapse_to_leaf(node) {
        Ok(()) => {
            partition.prune_to_leaf(node);
            mapper.set_rows(tree_id, partition.node_indices(node), node);
            Ok(MoveRecord {
                kind: MoveKind::Prune,
                accepted: true,
            })
        }
        Err(_) => Ok(rejected),
    }
}
