//! Priors over tree structure and variance parameters.

use serde::{Deserialize, Serialize};

/// Depth prior over tree structure: a node at depth `d` splits with
/// probability `α · (1 + d)^(−β)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreePrior {
    /// Base split probability α ∈ (0, 1).
    pub alpha: f64,
    /// Depth penalty β ≥ 0.
    pub beta: f64,
    /// Minimum number of observations a newly created child must hold.
    pub min_samples_leaf: usize,
}

impl TreePrior {
    /// Probability that a node at `depth` splits.
    #[inline(always)]
    pub fn split_prob(&self, depth: usize) -> f64 {
        self.alpha * (1.0 + depth as f64).powf(-self.beta)
    }
}

/// Inverse-gamma prior `IG(shape, scale)` used for the global error variance
/// and for the leaf-scale hyperparameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VariancePrior {
    /// Shape parameter.
    pub shape: f64,
    /// Scale parameter.
    pub scale: f64,
}

impl VariancePrior {
    /// Creates the prior.
    pub fn new(shape: f64, scale: f64) -> Self {
        Self { shape, scale }
    }
}
