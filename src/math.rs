//! Numeric helpers shared by the tree samplers: normalization of log-scale
//! weights and small dense Cholesky routines for the multivariate leaf model.

use ndarray::{Array1, Array2};

/// Converts a slice of log-scale weights into normalized probabilities.
///
/// The maximum log weight is subtracted before exponentiating so the
/// normalization is numerically stable for widely spread evaluations.
pub fn exp_normalize(log_weights: &[f64]) -> Vec<f64> {
    let max_log_weight = log_weights
        .iter()
        .cloned()
        .fold(f64::NEG_INFINITY, f64::max);

    let exp_shifted: Vec<f64> = log_weights
        .iter()
        .map(|&w| (w - max_log_weight).exp())
        .collect();

    let sum_exp: f64 = exp_shifted.iter().sum();

    exp_shifted.iter().map(|&w| w / sum_exp).collect()
}

/// Computes the lower-triangular Cholesky factor `L` with `A = L Lᵀ`.
///
/// Returns `None` when `A` is not positive definite. Intended for the small
/// (basis-dimension sized) matrices of the multivariate leaf model.
pub fn cholesky(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    debug_assert_eq!(n, a.ncols());

    let mut l: Array2<f64> = Array2::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            if i == j {
                for k in 0..j {
                    sum += l[[j, k]] * l[[j, k]];
                }
                let diag = a[[j, j]] - sum;
                if diag <= 0.0 {
                    return None;
                }
                l[[j, j]] = diag.sqrt();
            } else {
                for k in 0..j {
                    sum += l[[i, k]] * l[[j, k]];
                }
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    Some(l)
}

/// Solves `L Lᵀ x = b` by forward then backward substitution.
pub fn cholesky_solve(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = l.nrows();
    debug_assert_eq!(n, b.len());

    // Forward substitution: L y = b
    let mut y = Array1::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // Backward substitution: Lᵀ x = y
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    x
}

/// Computes `(L Lᵀ)⁻¹` by solving against the columns of the identity.
pub fn cholesky_inverse(l: &Array2<f64>) -> Array2<f64> {
    let n = l.nrows();
    let mut inverse = Array2::zeros((n, n));
    let mut unit = Array1::zeros(n);

    for col in 0..n {
        unit.fill(0.0);
        unit[col] = 1.0;
        let solved = cholesky_solve(l, &unit);
        for row in 0..n {
            inverse[[row, col]] = solved[row];
        }
    }

    inverse
}

/// Log determinant of `L Lᵀ` given its Cholesky factor `L`.
pub fn log_det_from_cholesky(l: &Array2<f64>) -> f64 {
    let mut log_det = 0.0;
    for i in 0..l.nrows() {
        log_det += l[[i, i]].ln();
    }
    2.0 * log_det
}
