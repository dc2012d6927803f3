//! Sufficient statistics and conjugate leaf models.
//!
//! Three Gaussian leaf models are supported: a constant leaf (scalar μ with
//! prior `N(0, τ)`), a univariate regression leaf (scalar β on a one-column
//! basis), and a multivariate regression leaf (vector β with prior
//! `N(0, Σ)`). Each model pairs with a sufficient-statistic accumulator that
//! supports incrementing by one observation and deriving a complement by
//! subtraction, which is what lets cutpoint enumeration sweep bins while the
//! right-node statistic is recovered from the node total.
//!
//! The sampler binds one concrete model at construction, so the structure
//! samplers and the Gibbs driver are monomorphic over [`LeafModel`].

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::data::Dataset;
use crate::error::XBartError;
use crate::math::{cholesky, cholesky_inverse, cholesky_solve, log_det_from_cholesky};

const LN_2_PI: f64 = 1.8378770664093453;

/// Tag selecting the leaf model at sampler construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeafModelKind {
    /// Scalar leaf value, no basis.
    Constant,
    /// Scalar coefficient on a one-column basis.
    UnivariateRegression,
    /// Coefficient vector on a multi-column basis.
    MultivariateRegression,
}

/// Per-leaf accumulator of the statistics its model needs.
pub trait SuffStat: Clone {
    /// Clears the accumulator.
    fn reset(&mut self);
    /// Folds one observation's residual (and basis row, if used) in.
    fn increment(&mut self, dataset: &Dataset, row: usize);
    /// Sets `self` to `total − part`.
    fn assign_difference(&mut self, total: &Self, part: &Self);
    /// Number of accumulated observations.
    fn num_samples(&self) -> usize;
}

/// A conjugate Gaussian leaf model: marginal likelihoods for structure
/// proposals and posterior draws for leaf values.
pub trait LeafModel {
    /// Accumulator type for this model.
    type Stat: SuffStat;

    /// Model tag.
    fn kind(&self) -> LeafModelKind;
    /// Leaf-value dimension.
    fn leaf_dim(&self) -> usize;
    /// Whether prediction multiplies the leaf value with the basis row.
    fn uses_basis(&self) -> bool;
    /// A zeroed accumulator.
    fn new_stat(&self) -> Self::Stat;
    /// Closed-form log marginal likelihood of one group.
    fn no_split_log_ml(&self, stat: &Self::Stat, sigma2: f64) -> f64;
    /// Log marginal likelihood of a split: the sum of the two pieces.
    fn split_log_ml(&self, left: &Self::Stat, right: &Self::Stat, sigma2: f64) -> f64 {
        self.no_split_log_ml(left, sigma2) + self.no_split_log_ml(right, sigma2)
    }
    /// Draws a leaf value from the conjugate posterior.
    fn sample_leaf(&self, stat: &Self::Stat, sigma2: f64, rng: &mut StdRng) -> Vec<f64>;
    /// The scalar leaf scale τ, for models that have one.
    fn scalar_scale(&self) -> Option<f64> {
        None
    }
    /// Replaces the scalar leaf scale τ, for models that have one.
    fn set_scalar_scale(&mut self, _scale: f64) {}
}

// ---------------------------------------------------------------------------
// Constant leaf
// ---------------------------------------------------------------------------

/// Sufficient statistics of a constant leaf: count, Σr, Σr².
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstantSuffStat {
    /// Number of observations.
    pub n: usize,
    /// Residual sum.
    pub sum_r: f64,
    /// Residual sum of squares.
    pub sum_r_squared: f64,
}

impl SuffStat for ConstantSuffStat {
    fn reset(&mut self) {
        self.n = 0;
        self.sum_r = 0.0;
        self.sum_r_squared = 0.0;
    }

    #[inline(always)]
    fn increment(&mut self, dataset: &Dataset, row: usize) {
        let r = dataset.residual_value(row);
        self.n += 1;
        self.sum_r += r;
        self.sum_r_squared += r * r;
    }

    fn assign_difference(&mut self, total: &Self, part: &Self) {
        self.n = total.n - part.n;
        self.sum_r = total.sum_r - part.sum_r;
        self.sum_r_squared = total.sum_r_squared - part.sum_r_squared;
    }

    fn num_samples(&self) -> usize {
        self.n
    }
}

/// Constant leaf value with prior `μ ~ N(0, τ)`.
#[derive(Debug, Clone)]
pub struct GaussianConstantLeaf {
    /// Prior leaf-scale τ.
    pub scale: f64,
    standard_normal: Normal<f64>,
}

impl GaussianConstantLeaf {
    /// Creates the model with leaf-scale τ.
    pub fn new(scale: f64) -> Self {
        Self {
            scale,
            standard_normal: Normal::new(0.0, 1.0).unwrap(),
        }
    }

    /// Posterior mean τS / (σ² + τn).
    pub fn posterior_mean(&self, stat: &ConstantSuffStat, sigma2: f64) -> f64 {
        let n = stat.n as f64;
        (self.scale * stat.sum_r) / (sigma2 + self.scale * n)
    }

    /// Posterior variance τσ² / (σ² + τn).
    pub fn posterior_variance(&self, stat: &ConstantSuffStat, sigma2: f64) -> f64 {
        let n = stat.n as f64;
        (self.scale * sigma2) / (sigma2 + self.scale * n)
    }
}

impl LeafModel for GaussianConstantLeaf {
    type Stat = ConstantSuffStat;

    fn kind(&self) -> LeafModelKind {
        LeafModelKind::Constant
    }

    fn leaf_dim(&self) -> usize {
        1
    }

    fn uses_basis(&self) -> bool {
        false
    }

    fn new_stat(&self) -> ConstantSuffStat {
        ConstantSuffStat::default()
    }

    fn no_split_log_ml(&self, stat: &ConstantSuffStat, sigma2: f64) -> f64 {
        let tau = self.scale;
        let n = stat.n as f64;
        let sum_r = stat.sum_r;
        let sum_r_squared = stat.sum_r_squared;

        -(n / 2.0) * LN_2_PI - (n / 2.0) * sigma2.ln()
            + 0.5 * (sigma2 / (sigma2 + tau * n)).ln()
            - sum_r_squared / (2.0 * sigma2)
            + (tau * sum_r * sum_r) / (2.0 * sigma2 * (sigma2 + tau * n))
    }

    fn sample_leaf(&self, stat: &ConstantSuffStat, sigma2: f64, rng: &mut StdRng) -> Vec<f64> {
        let mean = self.posterior_mean(stat, sigma2);
        let variance = self.posterior_variance(stat, sigma2);
        vec![mean + variance.sqrt() * self.standard_normal.sample(rng)]
    }

    fn scalar_scale(&self) -> Option<f64> {
        Some(self.scale)
    }

    fn set_scalar_scale(&mut self, scale: f64) {
        self.scale = scale;
    }
}

// ---------------------------------------------------------------------------
// Univariate regression leaf
// ---------------------------------------------------------------------------

/// Sufficient statistics of a univariate regression leaf: count, Σw·r, Σw².
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnivariateSuffStat {
    /// Number of observations.
    pub n: usize,
    /// Basis-weighted residual sum.
    pub sum_wr: f64,
    /// Basis sum of squares.
    pub sum_w_squared: f64,
}

impl SuffStat for UnivariateSuffStat {
    fn reset(&mut self) {
        self.n = 0;
        self.sum_wr = 0.0;
        self.sum_w_squared = 0.0;
    }

    #[inline(always)]
    fn increment(&mut self, dataset: &Dataset, row: usize) {
        let w = dataset.basis_value(row, 0);
        let r = dataset.residual_value(row);
        self.n += 1;
        self.sum_wr += w * r;
        self.sum_w_squared += w * w;
    }

    fn assign_difference(&mut self, total: &Self, part: &Self) {
        self.n = total.n - part.n;
        self.sum_wr = total.sum_wr - part.sum_wr;
        self.sum_w_squared = total.sum_w_squared - part.sum_w_squared;
    }

    fn num_samples(&self) -> usize {
        self.n
    }
}

/// Univariate regression leaf with prior `β ~ N(0, τ)`.
#[derive(Debug, Clone)]
pub struct GaussianUnivariateLeaf {
    /// Prior coefficient scale τ.
    pub scale: f64,
    standard_normal: Normal<f64>,
}

impl GaussianUnivariateLeaf {
    /// Creates the model with coefficient scale τ.
    pub fn new(scale: f64) -> Self {
        Self {
            scale,
            standard_normal: Normal::new(0.0, 1.0).unwrap(),
        }
    }
}

impl LeafModel for GaussianUnivariateLeaf {
    type Stat = UnivariateSuffStat;

    fn kind(&self) -> LeafModelKind {
        LeafModelKind::UnivariateRegression
    }

    fn leaf_dim(&self) -> usize {
        1
    }

    fn uses_basis(&self) -> bool {
        true
    }

    fn new_stat(&self) -> UnivariateSuffStat {
        UnivariateSuffStat::default()
    }

    fn no_split_log_ml(&self, stat: &UnivariateSuffStat, sigma2: f64) -> f64 {
        let tau = self.scale;
        let n = stat.n as f64;
        // The rᵀr/(2σ²) term is identical for a node's split and no-split
        // evaluations and so drops out of every comparison this value
        // participates in.
        -(n / 2.0) * LN_2_PI - (n / 2.0) * sigma2.ln()
            + 0.5 * (sigma2 / (sigma2 + tau * stat.sum_w_squared)).ln()
            + (tau * stat.sum_wr * stat.sum_wr)
                / (2.0 * sigma2 * (sigma2 + tau * stat.sum_w_squared))
    }

    fn sample_leaf(&self, stat: &UnivariateSuffStat, sigma2: f64, rng: &mut StdRng) -> Vec<f64> {
        let tau = self.scale;
        let mean = (tau * stat.sum_wr) / (sigma2 + tau * stat.sum_w_squared);
        let variance = (tau * sigma2) / (sigma2 + tau * stat.sum_w_squared);
        vec![mean + variance.sqrt() * self.standard_normal.sample(rng)]
    }

    fn scalar_scale(&self) -> Option<f64> {
        Some(self.scale)
    }

    fn set_scalar_scale(&mut self, scale: f64) {
        self.scale = scale;
    }
}

// ---------------------------------------------------------------------------
// Multivariate regression leaf
// ---------------------------------------------------------------------------

/// Sufficient statistics of a multivariate regression leaf: count, WᵀW, Wᵀr.
#[derive(Debug, Clone, PartialEq)]
pub struct MultivariateSuffStat {
    /// Number of observations.
    pub n: usize,
    /// Basis Gram matrix WᵀW.
    pub wtw: Array2<f64>,
    /// Basis-weighted residual vector Wᵀr.
    pub wtr: Array1<f64>,
}

impl MultivariateSuffStat {
    /// A zeroed accumulator of basis width `dim`.
    pub fn zeros(dim: usize) -> Self {
        Self {
            n: 0,
            wtw: Array2::zeros((dim, dim)),
            wtr: Array1::zeros(dim),
        }
    }
}

impl SuffStat for MultivariateSuffStat {
    fn reset(&mut self) {
        self.n = 0;
        self.wtw.fill(0.0);
        self.wtr.fill(0.0);
    }

    #[inline(always)]
    fn increment(&mut self, dataset: &Dataset, row: usize) {
        let r = dataset.residual_value(row);
        let dim = self.wtr.len();
        self.n += 1;
        for a in 0..dim {
            let wa = dataset.basis_value(row, a);
            self.wtr[a] += wa * r;
            for b in 0..dim {
                self.wtw[[a, b]] += wa * dataset.basis_value(row, b);
            }
        }
    }

    fn assign_difference(&mut self, total: &Self, part: &Self) {
        self.n = total.n - part.n;
        for (value, (&t, &p)) in self
            .wtw
            .iter_mut()
            .zip(total.wtw.iter().zip(part.wtw.iter()))
        {
            *value = t - p;
        }
        for (value, (&t, &p)) in self
            .wtr
            .iter_mut()
            .zip(total.wtr.iter().zip(part.wtr.iter()))
        {
            *value = t - p;
        }
    }

    fn num_samples(&self) -> usize {
        self.n
    }
}

/// Multivariate regression leaf with prior `β ~ N(0, Σ)`.
#[derive(Debug, Clone)]
pub struct GaussianMultivariateLeaf {
    scale: Array2<f64>,
    scale_inv: Array2<f64>,
    log_det_scale: f64,
    standard_normal: Normal<f64>,
}

impl GaussianMultivariateLeaf {
    /// Creates the model with prior covariance Σ, which must be symmetric
    /// positive definite.
    pub fn new(scale: Array2<f64>) -> Result<Self, XBartError> {
        let factor = cholesky(&scale).ok_or(XBartError::LeafScaleNotPositiveDefinite)?;
        let scale_inv = cholesky_inverse(&factor);
        let log_det_scale = log_det_from_cholesky(&factor);
        Ok(Self {
            scale,
            scale_inv,
            log_det_scale,
            standard_normal: Normal::new(0.0, 1.0).unwrap(),
        })
    }

    /// Prior covariance Σ.
    pub fn scale(&self) -> &Array2<f64> {
        &self.scale
    }

    /// Posterior precision Λ = Σ⁻¹ + WᵀW/σ².
    fn posterior_precision(&self, stat: &MultivariateSuffStat, sigma2: f64) -> Array2<f64> {
        let mut precision = self.scale_inv.clone();
        for (value, &gram) in precision.iter_mut().zip(stat.wtw.iter()) {
            *value += gram / sigma2;
        }
        precision
    }
}

impl LeafModel for GaussianMultivariateLeaf {
    type Stat = MultivariateSuffStat;

    fn kind(&self) -> LeafModelKind {
        LeafModelKind::MultivariateRegression
    }

    fn leaf_dim(&self) -> usize {
        self.scale.nrows()
    }

    fn uses_basis(&self) -> bool {
        true
    }

    fn new_stat(&self) -> MultivariateSuffStat {
        MultivariateSuffStat::zeros(self.leaf_dim())
    }

    fn no_split_log_ml(&self, stat: &MultivariateSuffStat, sigma2: f64) -> f64 {
        let n = stat.n as f64;
        let precision = self.posterior_precision(stat, sigma2);
        let factor = match cholesky(&precision) {
            Some(factor) => factor,
            None => return f64::NEG_INFINITY,
        };
        let log_det_precision = log_det_from_cholesky(&factor);
        // b = Wᵀr/σ²; the quadratic form bᵀΛ⁻¹b is evaluated through one
        // triangular solve. The rᵀr/(2σ²) term drops out of every comparison.
        let b = stat.wtr.mapv(|value| value / sigma2);
        let solved = cholesky_solve(&factor, &b);
        let quadratic = b.dot(&solved);

        -(n / 2.0) * (LN_2_PI + sigma2.ln())
            - 0.5 * (self.log_det_scale + log_det_precision)
            + 0.5 * quadratic
    }

    fn sample_leaf(&self, stat: &MultivariateSuffStat, sigma2: f64, rng: &mut StdRng) -> Vec<f64> {
        let dim = self.leaf_dim();
        let precision = self.posterior_precision(stat, sigma2);
        let factor = cholesky(&precision).unwrap();
        let b = stat.wtr.mapv(|value| value / sigma2);
        let mean = cholesky_solve(&factor, &b);

        let covariance = cholesky_inverse(&factor);
        let covariance_factor = cholesky(&covariance).unwrap();

        let z: Array1<f64> =
            Array1::from_iter((0..dim).map(|_| self.standard_normal.sample(rng)));
        let noise = covariance_factor.dot(&z);

        (0..dim).map(|i| mean[i] + noise[i]).collect()
    }
}
