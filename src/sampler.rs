//! Gibbs coordination of the BART/XBART sampler.
//!
//! The driver walks trees in fixed order; for each tree it adds the tree's
//! current predictions back into the residual, resamples the structure with
//! either the grow-from-root sampler or the MCMC sampler, redraws the leaf
//! parameters, and subtracts the new predictions. After the tree loop the
//! global error variance is redrawn, then the leaf scale τ for constant
//! leaves with a leaf-scale prior. The residual is mutated here and nowhere
//! else.
//!
//! Warm starts compose the two phases: `run` uses grow-from-root for the
//! first `num_gfr` iterations, then rebuilds the unsorted partitions from
//! the final GFR trees and continues with MCMC.

use ndarray::Array2;
use rand::distributions::WeightedIndex;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::data::Dataset;
use crate::ensemble::{Ensemble, SampleContainer};
use crate::error::XBartError;
use crate::gfr;
use crate::mcmc::{self, MoveRecord};
use crate::partition::{FeatureUnsortedPartition, SampleNodeMapper};
use crate::posterior;
use crate::presort::{FeaturePresortRootContainer, SortedNodePartition};
use crate::prior::{TreePrior, VariancePrior};
use crate::suffstats::{
    GaussianConstantLeaf, GaussianMultivariateLeaf, GaussianUnivariateLeaf, LeafModel,
};
use crate::tree::Tree;

/// Leaf model selection and its prior scale.
#[derive(Debug, Clone)]
pub enum LeafModelConfig {
    /// Constant scalar leaves with prior `μ ~ N(0, scale)`.
    Constant {
        /// Prior leaf variance τ.
        scale: f64,
    },
    /// Scalar regression on a one-column basis, `β ~ N(0, scale)`.
    UnivariateRegression {
        /// Prior coefficient variance τ.
        scale: f64,
    },
    /// Vector regression on a d-column basis, `β ~ N(0, scale)`.
    MultivariateRegression {
        /// Prior coefficient covariance Σ (d×d).
        scale: Array2<f64>,
    },
}

/// Sampler hyperparameters and priors.
#[derive(Debug, Clone)]
pub struct XBartSettings {
    /// Number of trees T.
    pub num_trees: usize,
    /// Minimum observations a newly created child must hold.
    pub min_samples_leaf: usize,
    /// Depth-prior base split probability α ∈ (0, 1).
    pub alpha: f64,
    /// Depth-prior penalty β ≥ 0.
    pub beta: f64,
    /// Unnormalized selection weight per covariate, length p.
    pub variable_weights: Vec<f64>,
    /// Leaf model and its prior scale.
    pub leaf_model: LeafModelConfig,
    /// Inverse-gamma prior (a, b) on the global error variance.
    pub sigma2_prior: VariancePrior,
    /// Optional inverse-gamma prior (a_leaf, b_leaf) on the leaf scale τ.
    /// Only valid with the constant leaf model.
    pub leaf_scale_prior: Option<VariancePrior>,
    /// Initial global error variance.
    pub sigma2_init: f64,
    /// Cap G on candidate cutpoints per feature per node.
    pub cutpoint_grid_size: usize,
    /// RNG seed; every stochastic draw derives from it.
    pub seed: u64,
}

/// Summary of one outer Gibbs iteration.
#[derive(Debug, Clone)]
pub struct StepInfo {
    /// The new global-variance draw.
    pub sigma2: f64,
    /// The new leaf-scale draw, when a leaf-scale prior is set.
    pub leaf_scale: Option<f64>,
    /// MCMC proposal records, one per tree; empty for GFR iterations.
    pub moves: Vec<MoveRecord>,
}

/// The posterior sampler handle.
///
/// The concrete leaf model is bound once at construction; every inner loop
/// below the dispatch is monomorphic over it.
pub struct XBartSampler {
    state: ModelState,
}

enum ModelState {
    Constant(GibbsState<GaussianConstantLeaf>),
    Univariate(GibbsState<GaussianUnivariateLeaf>),
    Multivariate(GibbsState<GaussianMultivariateLeaf>),
}

impl XBartSampler {
    /// Validates the settings against the dataset and builds the sampler.
    ///
    /// Every tree starts as a root leaf holding `ȳ/T` and the constant
    /// initial predictions are subtracted from the residual once.
    pub fn new(dataset: Dataset, settings: XBartSettings) -> Result<Self, XBartError> {
        validate_settings(&dataset, &settings)?;

        let state = match settings.leaf_model.clone() {
            LeafModelConfig::Constant { scale } => {
                ModelState::Constant(GibbsState::new(dataset, settings, GaussianConstantLeaf::new(scale))?)
            }
            LeafModelConfig::UnivariateRegression { scale } => ModelState::Univariate(
                GibbsState::new(dataset, settings, GaussianUnivariateLeaf::new(scale))?,
            ),
            LeafModelConfig::MultivariateRegression { scale } => ModelState::Multivariate(
                GibbsState::new(dataset, settings, GaussianMultivariateLeaf::new(scale)?)?,
            ),
        };

        Ok(Self { state })
    }

    /// Runs one outer Gibbs iteration with the requested structure sampler.
    pub fn step(&mut self, use_gfr: bool) -> Result<StepInfo, XBartError> {
        match &mut self.state {
            ModelState::Constant(state) => state.step(use_gfr),
            ModelState::Univariate(state) => state.step(use_gfr),
            ModelState::Multivariate(state) => state.step(use_gfr),
        }
    }

    /// Runs `num_gfr` grow-from-root iterations followed by `num_mcmc` MCMC
    /// iterations, retaining every draw from `num_burnin` onwards.
    pub fn run(
        &mut self,
        num_gfr: usize,
        num_mcmc: usize,
        num_burnin: usize,
    ) -> Result<(), XBartError> {
        match &mut self.state {
            ModelState::Constant(state) => state.run(num_gfr, num_mcmc, num_burnin),
            ModelState::Univariate(state) => state.run(num_gfr, num_mcmc, num_burnin),
            ModelState::Multivariate(state) => state.run(num_gfr, num_mcmc, num_burnin),
        }
    }

    /// The training dataset, including the current residual.
    pub fn dataset(&self) -> &Dataset {
        match &self.state {
            ModelState::Constant(state) => &state.dataset,
            ModelState::Univariate(state) => &state.dataset,
            ModelState::Multivariate(state) => &state.dataset,
        }
    }

    /// The current ensemble.
    pub fn ensemble(&self) -> &Ensemble {
        match &self.state {
            ModelState::Constant(state) => &state.ensemble,
            ModelState::Univariate(state) => &state.ensemble,
            ModelState::Multivariate(state) => &state.ensemble,
        }
    }

    /// The retained draws.
    pub fn samples(&self) -> &SampleContainer {
        match &self.state {
            ModelState::Constant(state) => &state.samples,
            ModelState::Univariate(state) => &state.samples,
            ModelState::Multivariate(state) => &state.samples,
        }
    }

    /// Current global error variance.
    pub fn sigma2(&self) -> f64 {
        match &self.state {
            ModelState::Constant(state) => state.sigma2,
            ModelState::Univariate(state) => state.sigma2,
            ModelState::Multivariate(state) => state.sigma2,
        }
    }

    /// Overrides the current global error variance.
    pub fn set_sigma2(&mut self, sigma2: f64) {
        match &mut self.state {
            ModelState::Constant(state) => state.sigma2 = sigma2,
            ModelState::Univariate(state) => state.sigma2 = sigma2,
            ModelState::Multivariate(state) => state.sigma2 = sigma2,
        }
    }

    /// Current scalar leaf scale, for models that have one.
    pub fn leaf_scale(&self) -> Option<f64> {
        match &self.state {
            ModelState::Constant(state) => state.model.scalar_scale(),
            ModelState::Univariate(state) => state.model.scalar_scale(),
            ModelState::Multivariate(state) => state.model.scalar_scale(),
        }
    }

    /// Overrides the current scalar leaf scale. No-op for the multivariate
    /// leaf model, whose prior covariance is fixed at construction.
    pub fn set_leaf_scale(&mut self, scale: f64) {
        match &mut self.state {
            ModelState::Constant(state) => state.model.set_scalar_scale(scale),
            ModelState::Univariate(state) => state.model.set_scalar_scale(scale),
            ModelState::Multivariate(state) => state.model.set_scalar_scale(scale),
        }
    }
}

fn validate_settings(dataset: &Dataset, settings: &XBartSettings) -> Result<(), XBartError> {
    if settings.num_trees == 0 {
        return Err(XBartError::NonPositiveParameter {
            name: "num_trees",
            value: 0.0,
        });
    }
    if settings.min_samples_leaf == 0 {
        return Err(XBartError::NonPositiveParameter {
            name: "min_samples_leaf",
            value: 0.0,
        });
    }
    if settings.cutpoint_grid_size == 0 {
        return Err(XBartError::NonPositiveParameter {
            name: "cutpoint_grid_size",
            value: 0.0,
        });
    }
    if !(settings.alpha > 0.0 && settings.alpha < 1.0) {
        return Err(XBartError::ParameterOutOfRange {
            name: "alpha",
            value: settings.alpha,
        });
    }
    if !(settings.beta >= 0.0) {
        return Err(XBartError::ParameterOutOfRange {
            name: "beta",
            value: settings.beta,
        });
    }
    if !(settings.sigma2_init > 0.0) {
        return Err(XBartError::NonPositiveParameter {
            name: "sigma2_init",
            value: settings.sigma2_init,
        });
    }
    for (name, prior) in [("sigma2_prior", Some(settings.sigma2_prior)), ("leaf_scale_prior", settings.leaf_scale_prior)] {
        if let Some(prior) = prior {
            if !(prior.shape > 0.0) || !(prior.scale > 0.0) {
                return Err(XBartError::ParameterOutOfRange {
                    name,
                    value: if prior.shape > 0.0 { prior.scale } else { prior.shape },
                });
            }
        }
    }

    let p = dataset.num_covariates();
    if settings.variable_weights.len() != p {
        return Err(XBartError::VariableWeightCountMismatch {
            expected: p,
            found: settings.variable_weights.len(),
        });
    }
    let weight_sum: f64 = settings.variable_weights.iter().sum();
    if settings.variable_weights.iter().any(|&w| !(w >= 0.0)) || !(weight_sum > 0.0) {
        return Err(XBartError::InvalidVariableWeights);
    }

    match &settings.leaf_model {
        LeafModelConfig::Constant { scale } => {
            if !(*scale > 0.0) {
                return Err(XBartError::NonPositiveParameter {
                    name: "leaf scale",
                    value: *scale,
                });
            }
        }
        LeafModelConfig::UnivariateRegression { scale } => {
            if !(*scale > 0.0) {
                return Err(XBartError::NonPositiveParameter {
                    name: "leaf scale",
                    value: *scale,
                });
            }
            if dataset.basis_dim() != 1 {
                return Err(XBartError::BasisDimensionMismatch {
                    expected: 1,
                    found: dataset.basis_dim(),
                });
            }
        }
        LeafModelConfig::MultivariateRegression { scale } => {
            if scale.nrows() != scale.ncols() || scale.nrows() == 0 {
                return Err(XBartError::LeafScaleNotPositiveDefinite);
            }
            if dataset.basis_dim() != scale.nrows() {
                return Err(XBartError::BasisDimensionMismatch {
                    expected: scale.nrows(),
                    found: dataset.basis_dim(),
                });
            }
        }
    }

    if settings.leaf_scale_prior.is_some()
        && !matches!(settings.leaf_model, LeafModelConfig::Constant { .. })
    {
        return Err(XBartError::LeafScalePriorUnsupported);
    }

    Ok(())
}

/// Monomorphic Gibbs state for one leaf model.
struct GibbsState<M: LeafModel> {
    dataset: Dataset,
    num_trees: usize,
    tree_prior: TreePrior,
    sigma2_prior: VariancePrior,
    leaf_scale_prior: Option<VariancePrior>,
    cutpoint_grid_size: usize,
    feature_dist: WeightedIndex<f64>,
    model: M,
    ensemble: Ensemble,
    partitions: Vec<FeatureUnsortedPartition>,
    mapper: SampleNodeMapper,
    presort: FeaturePresortRootContainer,
    sorted: SortedNodePartition,
    samples: SampleContainer,
    sigma2: f64,
    rng: StdRng,
}

impl<M: LeafModel> GibbsState<M> {
    fn new(mut dataset: Dataset, settings: XBartSettings, model: M) -> Result<Self, XBartError> {
        let n = dataset.num_observations();
        let num_trees = settings.num_trees;

        let tree_prior = TreePrior {
            alpha: settings.alpha,
            beta: settings.beta,
            min_samples_leaf: settings.min_samples_leaf,
        };

        let feature_dist = WeightedIndex::new(settings.variable_weights.iter().copied())
            .map_err(|_| XBartError::InvalidVariableWeights)?;

        // Every tree starts as a root leaf holding ȳ/T in its first
        // dimension, so the initial sum of trees is the outcome mean for
        // constant leaves.
        let outcome_mean = dataset.outcome().mean().unwrap();
        let mut root_value = vec![0.0; model.leaf_dim()];
        root_value[0] = outcome_mean / num_trees as f64;
        let ensemble = Ensemble::new(num_trees, model.leaf_dim(), model.uses_basis(), &root_value);

        let partitions = (0..num_trees)
            .map(|_| FeatureUnsortedPartition::new(n))
            .collect();
        let mapper = SampleNodeMapper::new(num_trees, n);
        let presort = FeaturePresortRootContainer::new(&dataset);
        let sorted = SortedNodePartition::new(&presort, n);

        let rng = StdRng::seed_from_u64(settings.seed);

        // Subtract the initial predictions from the residual once.
        dataset.residual_reset()?;
        let mut state = Self {
            dataset,
            num_trees,
            tree_prior,
            sigma2_prior: settings.sigma2_prior,
            leaf_scale_prior: settings.leaf_scale_prior,
            cutpoint_grid_size: settings.cutpoint_grid_size,
            feature_dist,
            model,
            ensemble,
            partitions,
            mapper,
            presort,
            sorted,
            samples: SampleContainer::new(),
            sigma2: settings.sigma2_init,
            rng,
        };
        for tree_id in 0..state.num_trees {
            state.apply_tree_predictions(tree_id, -1.0);
        }
        Ok(state)
    }

    /// Adds (`sign = 1`) or subtracts (`sign = -1`) tree `tree_id`'s cached
    /// predictions to/from the residual, reading leaf assignments from the
    /// observation map.
    fn apply_tree_predictions(&mut self, tree_id: usize, sign: f64) {
        let tree = self.ensemble.tree(tree_id);
        let uses_basis = self.ensemble.leaf_regression();
        for row in 0..self.dataset.num_observations() {
            let node = self.mapper.node_id(tree_id, row);
            let prediction = {
                let basis = if uses_basis {
                    self.dataset.basis_row(row)
                } else {
                    None
                };
                tree.leaf_response(node, basis)
            };
            if sign > 0.0 {
                self.dataset.residual_add(row, prediction);
            } else {
                self.dataset.residual_subtract(row, prediction);
            }
        }
    }

    fn step(&mut self, use_gfr: bool) -> Result<StepInfo, XBartError> {
        let mut moves = Vec::new();
        let leaf_dim = self.model.leaf_dim();
        let zero_root = vec![0.0; leaf_dim];

        for tree_id in 0..self.num_trees {
            // Restore the partial residual for this tree.
            self.apply_tree_predictions(tree_id, 1.0);

            if use_gfr {
                self.sorted.reset(&self.presort);
                self.ensemble.tree_mut(tree_id).reset(&zero_root);
                self.mapper.assign_all_to_root(tree_id);
                gfr::sample_tree(
                    self.ensemble.tree_mut(tree_id),
                    &self.dataset,
                    &mut self.sorted,
                    &mut self.mapper,
                    &self.model,
                    &self.tree_prior,
                    self.sigma2,
                    self.cutpoint_grid_size,
                    tree_id,
                    &mut self.rng,
                );
                posterior::sample_leaf_parameters_sorted(
                    self.ensemble.tree_mut(tree_id),
                    &self.dataset,
                    &self.sorted,
                    &self.model,
                    self.sigma2,
                    &mut self.rng,
                );
            } else {
                let record = mcmc::sample_tree(
                    self.ensemble.tree_mut(tree_id),
                    &self.dataset,
                    &mut self.partitions[tree_id],
                    &mut self.mapper,
                    &self.model,
                    &self.tree_prior,
                    &self.feature_dist,
                    self.sigma2,
                    tree_id,
                    &mut self.rng,
                )?;
                moves.push(record);
                posterior::sample_leaf_parameters_unsorted(
                    self.ensemble.tree_mut(tree_id),
                    &self.dataset,
                    &self.partitions[tree_id],
                    &self.model,
                    self.sigma2,
                    &mut self.rng,
                );
            }

            // Subtract the new predictions.
            self.apply_tree_predictions(tree_id, -1.0);
        }

        self.sigma2 = posterior::sample_global_variance(&self.dataset, &self.sigma2_prior, &mut self.rng);

        let leaf_scale = match self.leaf_scale_prior {
            Some(prior) => {
                let scale = posterior::sample_leaf_scale(&self.ensemble, &prior, &mut self.rng);
                self.model.set_scalar_scale(scale);
                Some(scale)
            }
            None => None,
        };

        Ok(StepInfo {
            sigma2: self.sigma2,
            leaf_scale,
            moves,
        })
    }

    fn run(&mut self, num_gfr: usize, num_mcmc: usize, num_burnin: usize) -> Result<(), XBartError> {
        let total = num_gfr + num_mcmc;
        for iteration in 0..total {
            let use_gfr = iteration < num_gfr;
            if iteration == num_gfr && num_gfr > 0 {
                // Phase hand-off: the pre-sorted indices are discarded and
                // the unsorted partitions rebuilt from the final GFR trees.
                self.rebuild_unsorted_partitions();
            }
            self.step(use_gfr)?;

            let retained = iteration >= num_burnin;
            let leaf_scale = self.model.scalar_scale().unwrap_or(0.0);
            self.samples
                .store(self.ensemble.clone(), self.sigma2, leaf_scale, retained);
        }
        Ok(())
    }

    fn rebuild_unsorted_partitions(&mut self) {
        for tree_id in 0..self.num_trees {
            let tree: &Tree = self.ensemble.tree(tree_id);
            let partition = FeatureUnsortedPartition::from_tree(tree, &self.dataset);
            for leaf in tree.leaves() {
                self.mapper.set_rows(tree_id, partition.node_indices(leaf), leaf);
            }
            self.partitions[tree_id] = partition;
        }
    }
}
