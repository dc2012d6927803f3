//! Conjugate posterior draws: per-leaf parameters after tree structure is
//! fixed, the global error variance, and the leaf-scale hyperparameter.

use rand::rngs::StdRng;
use rand_distr::{Distribution, Gamma};

use crate::data::Dataset;
use crate::ensemble::Ensemble;
use crate::partition::FeatureUnsortedPartition;
use crate::presort::SortedNodePartition;
use crate::prior::VariancePrior;
use crate::suffstats::{LeafModel, SuffStat};
use crate::tree::Tree;

/// Redraws every leaf of `tree` from its conjugate posterior, gathering each
/// leaf's statistics from the unsorted partition (MCMC phase).
pub fn sample_leaf_parameters_unsorted<M: LeafModel>(
    tree: &mut Tree,
    dataset: &Dataset,
    partition: &FeatureUnsortedPartition,
    model: &M,
    sigma2: f64,
    rng: &mut StdRng,
) {
    let mut stat = model.new_stat();
    for leaf in tree.leaves() {
        stat.reset();
        for &row in partition.node_indices(leaf) {
            stat.increment(dataset, row);
        }
        let value = model.sample_leaf(&stat, sigma2, rng);
        tree.set_leaf_value(leaf, &value);
    }
}

/// Redraws every leaf of `tree` from its conjugate posterior, gathering each
/// leaf's statistics from the pre-sorted partition (GFR phase).
pub fn sample_leaf_parameters_sorted<M: LeafModel>(
    tree: &mut Tree,
    dataset: &Dataset,
    sorted: &SortedNodePartition,
    model: &M,
    sigma2: f64,
    rng: &mut StdRng,
) {
    let mut stat = model.new_stat();
    for leaf in tree.leaves() {
        stat.reset();
        for position in sorted.node_begin(leaf)..sorted.node_end(leaf) {
            stat.increment(dataset, sorted.sort_index(0, position));
        }
        let value = model.sample_leaf(&stat, sigma2, rng);
        tree.set_leaf_value(leaf, &value);
    }
}

/// Draws the global error variance σ² from its inverse-gamma posterior:
/// shape `a/2 + N`, scale `a·b/2 + Σr²`.
///
/// The gamma distribution is parameterized by shape and scale, and
/// `1 / Gamma(a, 1/b) ~ IG(a, b)` when `b` is a rate, so the inverse-gamma
/// scale is inverted before sampling and the draw reciprocated.
pub fn sample_global_variance(
    dataset: &Dataset,
    prior: &VariancePrior,
    rng: &mut StdRng,
) -> f64 {
    let n = dataset.num_observations() as f64;
    let sum_squared_residual: f64 = dataset.residual().iter().map(|r| r * r).sum();

    let ig_shape = prior.shape / 2.0 + n;
    let ig_scale = prior.shape * prior.scale / 2.0 + sum_squared_residual;

    let gamma = Gamma::new(ig_shape, 1.0 / ig_scale).unwrap();
    1.0 / gamma.sample(rng)
}

/// Draws the leaf-scale hyperparameter τ from its inverse-gamma posterior:
/// shape `a_leaf/2 + #leaves`, scale `b_leaf/2 + Σ_leaves μ²`.
///
/// Applies only to the constant leaf model, where every leaf holds a scalar.
pub fn sample_leaf_scale(ensemble: &Ensemble, prior: &VariancePrior, rng: &mut StdRng) -> f64 {
    let num_leaves = ensemble.num_leaves() as f64;
    let sum_leaf_squared = ensemble.sum_leaf_squared();

    let ig_shape = prior.shape / 2.0 + num_leaves;
    let ig_scale = prior.scale / 2.0 + sum_leaf_squared;

    let gamma = Gamma::new(ig_shape, 1.0 / ig_scale).unwrap();
    1.0 / gamma.sample(rng)
}
