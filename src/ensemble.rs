//! Tree ensembles and the retained-draw container.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::data::Dataset;
use crate::tree::Tree;

/// An ordered collection of trees whose predictions are summed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ensemble {
    trees: Vec<Tree>,
    leaf_regression: bool,
}

impl Ensemble {
    /// Creates an ensemble of `num_trees` root-leaf trees, each holding
    /// `root_value`.
    ///
    /// `leaf_regression` selects whether prediction dots the leaf vector with
    /// the dataset's basis row or reads the leaf value directly.
    pub fn new(num_trees: usize, leaf_dim: usize, leaf_regression: bool, root_value: &[f64]) -> Self {
        let trees = (0..num_trees)
            .map(|_| Tree::new(leaf_dim, root_value))
            .collect();
        Self {
            trees,
            leaf_regression,
        }
    }

    /// Number of trees.
    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Whether leaves regress on the dataset's basis.
    pub fn leaf_regression(&self) -> bool {
        self.leaf_regression
    }

    /// Borrow a tree.
    pub fn tree(&self, index: usize) -> &Tree {
        &self.trees[index]
    }

    /// Mutably borrow a tree.
    pub fn tree_mut(&mut self, index: usize) -> &mut Tree {
        &mut self.trees[index]
    }

    /// Trees in fixed order.
    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    /// Sum-of-trees prediction for a single row.
    pub fn predict_row(&self, dataset: &Dataset, row: usize) -> f64 {
        let sample = dataset.covariate_row(row);
        let basis = if self.leaf_regression {
            dataset.basis_row(row)
        } else {
            None
        };
        self.trees
            .iter()
            .map(|tree| tree.predict_row(sample, basis))
            .sum()
    }

    /// Sum-of-trees prediction for every row of a dataset.
    pub fn predict(&self, dataset: &Dataset) -> Array1<f64> {
        let n = dataset.num_observations();
        let mut predictions = Array1::zeros(n);
        for row in 0..n {
            predictions[row] = self.predict_row(dataset, row);
        }
        predictions
    }

    /// Total number of leaves across all trees.
    pub fn num_leaves(&self) -> usize {
        self.trees.iter().map(Tree::num_leaves).sum()
    }

    /// Sum of squared leaf values across all trees.
    pub fn sum_leaf_squared(&self) -> f64 {
        self.trees.iter().map(Tree::sum_leaf_squared).sum()
    }
}

/// Result buffer holding the retained posterior draws.
///
/// Burn-in draws overwrite slot 0; retained draws advance the write cursor,
/// and each retained draw stores a deep clone of the ensemble alongside the
/// matching σ² and leaf-scale values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleContainer {
    ensembles: Vec<Ensemble>,
    sigma2_draws: Vec<f64>,
    leaf_scale_draws: Vec<f64>,
    cursor: usize,
}

impl SampleContainer {
    /// Creates an empty container.
    pub fn new() -> Self {
        Self {
            ensembles: Vec::new(),
            sigma2_draws: Vec::new(),
            leaf_scale_draws: Vec::new(),
            cursor: 0,
        }
    }

    /// Stores one draw. Burn-in draws (`retained == false`) overwrite the
    /// current slot without advancing the cursor.
    pub fn store(&mut self, ensemble: Ensemble, sigma2: f64, leaf_scale: f64, retained: bool) {
        if self.cursor < self.ensembles.len() {
            self.ensembles[self.cursor] = ensemble;
            self.sigma2_draws[self.cursor] = sigma2;
            self.leaf_scale_draws[self.cursor] = leaf_scale;
        } else {
            self.ensembles.push(ensemble);
            self.sigma2_draws.push(sigma2);
            self.leaf_scale_draws.push(leaf_scale);
        }
        if retained {
            self.cursor += 1;
        }
    }

    /// Number of retained draws.
    pub fn num_retained(&self) -> usize {
        self.cursor
    }

    /// Retained ensemble `k`.
    pub fn ensemble(&self, k: usize) -> &Ensemble {
        &self.ensembles[k]
    }

    /// Retained ensembles, in draw order.
    pub fn ensembles(&self) -> &[Ensemble] {
        &self.ensembles[..self.cursor]
    }

    /// Retained σ² draws.
    pub fn sigma2_draws(&self) -> &[f64] {
        &self.sigma2_draws[..self.cursor]
    }

    /// Retained leaf-scale draws.
    pub fn leaf_scale_draws(&self) -> &[f64] {
        &self.leaf_scale_draws[..self.cursor]
    }

    /// Mean prediction across the retained draws.
    pub fn predict_mean(&self, dataset: &Dataset) -> Array1<f64> {
        let n = dataset.num_observations();
        let mut mean = Array1::zeros(n);
        if self.cursor == 0 {
            return mean;
        }
        for ensemble in self.ensembles() {
            mean += &ensemble.predict(dataset);
        }
        mean / self.cursor as f64
    }

    /// N×K prediction matrix, one column per retained draw.
    pub fn predict_matrix(&self, dataset: &Dataset) -> Array2<f64> {
        let n = dataset.num_observations();
        let k = self.cursor;
        let mut matrix = Array2::zeros((n, k));
        for (col, ensemble) in self.ensembles().iter().enumerate() {
            let predictions = ensemble.predict(dataset);
            for row in 0..n {
                matrix[[row, col]] = predictions[row];
            }
        }
        matrix
    }
}

impl Default for SampleContainer {
    fn default() -> Self {
        Self::new()
    }
}
