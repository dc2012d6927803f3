use approx::assert_relative_eq;
use ndarray::{array, Array1, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;

use xbart::data::{Dataset, FeatureType};
use xbart::math::{cholesky, cholesky_inverse, cholesky_solve, log_det_from_cholesky};
use xbart::suffstats::{
    ConstantSuffStat, GaussianConstantLeaf, GaussianMultivariateLeaf, GaussianUnivariateLeaf,
    LeafModel, SuffStat,
};

fn dataset_with_residual(residual: &[f64], basis: Option<Array2<f64>>) -> Dataset {
    let n = residual.len();
    let x = Array2::zeros((n, 1));
    let y = Array1::from_vec(residual.to_vec());
    Dataset::new(x, basis, y, vec![FeatureType::Numeric]).unwrap()
}

#[test]
fn test_constant_stat_increment_and_subtract() {
    let dataset = dataset_with_residual(&[1.0, 2.0, 3.0, 4.0], None);
    let model = GaussianConstantLeaf::new(0.5);

    let mut total = model.new_stat();
    let mut left = model.new_stat();
    for row in 0..4 {
        total.increment(&dataset, row);
        if row < 2 {
            left.increment(&dataset, row);
        }
    }

    let mut right = model.new_stat();
    right.assign_difference(&total, &left);

    assert_eq!(total.n, 4);
    assert_relative_eq!(total.sum_r, 10.0);
    assert_relative_eq!(total.sum_r_squared, 30.0);
    assert_eq!(right.n, 2);
    assert_relative_eq!(right.sum_r, 7.0);
    assert_relative_eq!(right.sum_r_squared, 25.0);
}

#[test]
fn test_constant_log_ml_matches_closed_form() {
    let tau = 0.4;
    let sigma2: f64 = 1.3;
    let model = GaussianConstantLeaf::new(tau);

    let stat = ConstantSuffStat {
        n: 3,
        sum_r: 2.1,
        sum_r_squared: 5.0,
    };

    let n = 3.0;
    let expected = -(n / 2.0) * (2.0 * std::f64::consts::PI).ln()
        - (n / 2.0) * sigma2.ln()
        + 0.5 * (sigma2 / (sigma2 + tau * n)).ln()
        - 5.0 / (2.0 * sigma2)
        + (tau * 2.1 * 2.1) / (2.0 * sigma2 * (sigma2 + tau * n));

    assert_relative_eq!(model.no_split_log_ml(&stat, sigma2), expected, epsilon = 1e-12);
}

#[test]
fn test_empty_stat_log_ml_is_zero() {
    let model = GaussianConstantLeaf::new(0.4);
    let stat = model.new_stat();

    assert_relative_eq!(model.no_split_log_ml(&stat, 2.0), 0.0);
}

#[test]
fn test_constant_posterior_mean_formula() {
    // The closed-form posterior mean τΣr / (σ² + τn), computed independently
    // from the statistics.
    let tau = 0.25;
    let sigma2 = 0.8;
    let model = GaussianConstantLeaf::new(tau);
    let dataset = dataset_with_residual(&[0.5, 1.5, -0.5, 2.5, 1.0], None);

    let mut stat = model.new_stat();
    for row in 0..5 {
        stat.increment(&dataset, row);
    }

    let sum_r: f64 = 0.5 + 1.5 - 0.5 + 2.5 + 1.0;
    let expected = tau * sum_r / (sigma2 + tau * 5.0);
    assert_relative_eq!(model.posterior_mean(&stat, sigma2), expected, epsilon = 1e-12);

    let expected_variance = tau * sigma2 / (sigma2 + tau * 5.0);
    assert_relative_eq!(
        model.posterior_variance(&stat, sigma2),
        expected_variance,
        epsilon = 1e-12
    );
}

#[test]
fn test_univariate_stat_uses_basis() {
    let basis = array![[2.0], [3.0]];
    let dataset = dataset_with_residual(&[1.0, -1.0], Some(basis));
    let model = GaussianUnivariateLeaf::new(1.0);

    let mut stat = model.new_stat();
    stat.increment(&dataset, 0);
    stat.increment(&dataset, 1);

    assert_eq!(stat.n, 2);
    assert_relative_eq!(stat.sum_wr, 2.0 * 1.0 + 3.0 * (-1.0));
    assert_relative_eq!(stat.sum_w_squared, 4.0 + 9.0);
}

#[test]
fn test_multivariate_reduces_to_univariate_when_one_dimensional() {
    let tau = 0.6;
    let sigma2 = 1.1;
    let basis = array![[1.5], [-0.5], [2.0], [0.7]];
    let dataset = dataset_with_residual(&[0.3, 1.2, -0.8, 0.9], Some(basis));

    let univariate = GaussianUnivariateLeaf::new(tau);
    let multivariate = GaussianMultivariateLeaf::new(array![[tau]]).unwrap();

    let mut stat_uni = univariate.new_stat();
    let mut stat_multi = multivariate.new_stat();
    for row in 0..4 {
        stat_uni.increment(&dataset, row);
        stat_multi.increment(&dataset, row);
    }

    assert_relative_eq!(
        univariate.no_split_log_ml(&stat_uni, sigma2),
        multivariate.no_split_log_ml(&stat_multi, sigma2),
        epsilon = 1e-10
    );
}

#[test]
fn test_multivariate_sample_leaf_is_finite() {
    let scale = array![[0.5, 0.1], [0.1, 0.4]];
    let model = GaussianMultivariateLeaf::new(scale).unwrap();
    let basis = array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
    let dataset = dataset_with_residual(&[1.0, 2.0, 3.0], Some(basis));

    let mut stat = model.new_stat();
    for row in 0..3 {
        stat.increment(&dataset, row);
    }

    let mut rng = StdRng::seed_from_u64(17);
    let value = model.sample_leaf(&stat, 0.9, &mut rng);
    assert_eq!(value.len(), 2);
    assert!(value.iter().all(|v| v.is_finite()));
}

#[test]
fn test_non_positive_definite_scale_is_rejected() {
    let scale = array![[1.0, 2.0], [2.0, 1.0]];
    assert!(GaussianMultivariateLeaf::new(scale).is_err());
}

#[test]
fn test_cholesky_solve_round_trip() {
    let a = array![[4.0, 1.0, 0.2], [1.0, 3.0, 0.5], [0.2, 0.5, 2.0]];
    let factor = cholesky(&a).unwrap();

    // L Lᵀ reproduces A.
    let reconstructed = factor.dot(&factor.t());
    for (expected, actual) in a.iter().zip(reconstructed.iter()) {
        assert_relative_eq!(*expected, *actual, epsilon = 1e-12);
    }

    let b = array![1.0, -2.0, 0.5];
    let x = cholesky_solve(&factor, &b);
    let residual = a.dot(&x) - &b;
    for value in residual.iter() {
        assert_relative_eq!(*value, 0.0, epsilon = 1e-10);
    }

    let inverse = cholesky_inverse(&factor);
    let identity = a.dot(&inverse);
    for i in 0..3 {
        for j in 0..3 {
            let expected = if i == j { 1.0 } else { 0.0 };
            assert_relative_eq!(identity[[i, j]], expected, epsilon = 1e-10);
        }
    }

    // det(A) through the factor, against direct expansion for 2×2 blocks.
    let a2 = array![[2.0, 0.3], [0.3, 1.0]];
    let factor2 = cholesky(&a2).unwrap();
    let det = (2.0_f64 * 1.0 - 0.3 * 0.3).ln();
    assert_relative_eq!(log_det_from_cholesky(&factor2), det, epsilon = 1e-12);
}
