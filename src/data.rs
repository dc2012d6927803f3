//! In-memory dataset view used for training: covariates, an optional leaf
//! regression basis, the outcome, and the mutable partial residual.
#![allow(non_snake_case)]

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::XBartError;

/// Per-column covariate type tag.
///
/// Ordered categorical columns are treated like numeric columns everywhere
/// except cutpoint-grid construction; unordered categorical columns split on
/// category sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureType {
    /// Continuous covariate, split by threshold.
    Numeric,
    /// Integer-coded covariate whose codes carry an ordering.
    OrderedCategorical,
    /// Integer-coded covariate with no ordering, split by category set.
    UnorderedCategorical,
}

/// Training dataset handle.
///
/// Owns the covariate matrix `X` (N×p, row-major), an optional leaf-basis
/// matrix `W` (N×d), the outcome `y`, and the residual vector. The residual
/// is initialized to a copy of `y` and afterwards mutated only through
/// [`Dataset::residual_add`] and [`Dataset::residual_subtract`], which the
/// Gibbs driver calls around each tree update.
#[derive(Debug, Clone)]
pub struct Dataset {
    covariates: Array2<f64>,
    basis: Option<Array2<f64>>,
    outcome: Array1<f64>,
    residual: Array1<f64>,
    feature_types: Vec<FeatureType>,
}

impl Dataset {
    /// Builds a dataset from dense row-major buffers, validating shapes and
    /// values.
    ///
    /// Covariates must be finite; categorical columns must hold non-negative
    /// integer codes; the basis, when present, must have one row per
    /// observation and at least one column.
    pub fn new(
        covariates: Array2<f64>,
        basis: Option<Array2<f64>>,
        outcome: Array1<f64>,
        feature_types: Vec<FeatureType>,
    ) -> Result<Self, XBartError> {
        let n = covariates.nrows();
        let p = covariates.ncols();

        if outcome.len() != n {
            return Err(XBartError::OutcomeLengthMismatch {
                x_rows: n,
                y_len: outcome.len(),
            });
        }
        if feature_types.len() != p {
            return Err(XBartError::FeatureTypeCountMismatch {
                expected: p,
                found: feature_types.len(),
            });
        }

        for row in 0..n {
            for col in 0..p {
                let value = covariates[[row, col]];
                if !value.is_finite() {
                    return Err(XBartError::NonFiniteCovariate { row, col });
                }
                if feature_types[col] != FeatureType::Numeric
                    && (value < 0.0 || value.fract() != 0.0)
                {
                    return Err(XBartError::InvalidCategoryCode { row, col });
                }
            }
        }

        if let Some(ref W) = basis {
            if W.nrows() != n {
                return Err(XBartError::BasisRowMismatch {
                    x_rows: n,
                    basis_rows: W.nrows(),
                });
            }
            if W.ncols() == 0 {
                return Err(XBartError::EmptyBasis);
            }
        }

        let residual = outcome.clone();

        Ok(Self {
            covariates,
            basis,
            outcome,
            residual,
            feature_types,
        })
    }

    /// Number of observations N.
    pub fn num_observations(&self) -> usize {
        self.covariates.nrows()
    }

    /// Number of covariate columns p.
    pub fn num_covariates(&self) -> usize {
        self.covariates.ncols()
    }

    /// Width of the leaf basis, or 0 when the dataset has none.
    pub fn basis_dim(&self) -> usize {
        self.basis.as_ref().map_or(0, |W| W.ncols())
    }

    /// Whether a leaf basis is loaded.
    pub fn has_basis(&self) -> bool {
        self.basis.is_some()
    }

    /// Covariate value at a given row and column.
    #[inline(always)]
    pub fn covariate_value(&self, row: usize, col: usize) -> f64 {
        self.covariates[[row, col]]
    }

    /// Covariate row view.
    #[inline(always)]
    pub fn covariate_row(&self, row: usize) -> ArrayView1<f64> {
        self.covariates.row(row)
    }

    /// Basis row view; only meaningful when [`Dataset::has_basis`] is true.
    #[inline(always)]
    pub fn basis_row(&self, row: usize) -> Option<ArrayView1<f64>> {
        self.basis.as_ref().map(|W| W.row(row))
    }

    /// Basis value at a given row and column.
    #[inline(always)]
    pub fn basis_value(&self, row: usize, col: usize) -> f64 {
        self.basis.as_ref().map_or(0.0, |W| W[[row, col]])
    }

    /// Outcome vector.
    pub fn outcome(&self) -> &Array1<f64> {
        &self.outcome
    }

    /// Residual vector.
    pub fn residual(&self) -> &Array1<f64> {
        &self.residual
    }

    /// Residual value at a given row.
    #[inline(always)]
    pub fn residual_value(&self, row: usize) -> f64 {
        self.residual[row]
    }

    /// Type of feature `col`.
    #[inline(always)]
    pub fn feature_type(&self, col: usize) -> FeatureType {
        self.feature_types[col]
    }

    /// All feature types, in column order.
    pub fn feature_types(&self) -> &[FeatureType] {
        &self.feature_types
    }

    /// Adds `value` to the residual at `row`. Driver use only.
    #[inline(always)]
    pub(crate) fn residual_add(&mut self, row: usize, value: f64) {
        self.residual[row] += value;
    }

    /// Subtracts `value` from the residual at `row`. Driver use only.
    #[inline(always)]
    pub(crate) fn residual_subtract(&mut self, row: usize, value: f64) {
        self.residual[row] -= value;
    }

    /// Resets the residual to the raw outcome values.
    pub(crate) fn residual_reset(&mut self) -> Result<(), XBartError> {
        if self.residual.len() != self.outcome.len() {
            return Err(XBartError::ResidualLengthMismatch {
                expected: self.outcome.len(),
                found: self.residual.len(),
            });
        }
        self.residual.assign(&self.outcome);
        Ok(())
    }
}
