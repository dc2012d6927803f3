use ndarray::{Array1, Array2};

use xbart::tree::{SplitRule, ROOT_ID};
use xbart::{Dataset, Ensemble, FeatureType, SampleContainer};

fn toy_dataset(n: usize) -> Dataset {
    let x = Array2::from_shape_fn((n, 1), |(i, _)| i as f64);
    let y = Array1::zeros(n);
    Dataset::new(x, None, y, vec![FeatureType::Numeric]).unwrap()
}

fn constant_ensemble(num_trees: usize, value: f64) -> Ensemble {
    Ensemble::new(num_trees, 1, false, &[value])
}

#[test]
fn test_predict_sums_trees() {
    let dataset = toy_dataset(4);
    let mut ensemble = constant_ensemble(3, 0.5);

    // Make one tree non-trivial.
    let tree = ensemble.tree_mut(0);
    let (left, right) = tree.expand_node(ROOT_ID, 0, SplitRule::Numeric(1.0)).unwrap();
    tree.set_leaf_value(left, &[-1.0]);
    tree.set_leaf_value(right, &[1.0]);

    let predictions = ensemble.predict(&dataset);
    // Rows 0 and 1 route left (value ≤ 1.0).
    assert_eq!(predictions[0], -1.0 + 0.5 + 0.5);
    assert_eq!(predictions[1], -1.0 + 0.5 + 0.5);
    assert_eq!(predictions[2], 1.0 + 0.5 + 0.5);
    assert_eq!(predictions[3], 1.0 + 0.5 + 0.5);
}

#[test]
fn test_deep_clone_is_independent() {
    let mut ensemble = constant_ensemble(2, 1.0);
    let snapshot = ensemble.clone();

    ensemble
        .tree_mut(0)
        .expand_node(ROOT_ID, 0, SplitRule::Numeric(0.0))
        .unwrap();

    assert!(snapshot.tree(0).is_leaf(ROOT_ID));
    assert!(!ensemble.tree(0).is_leaf(ROOT_ID));
}

#[test]
fn test_leaf_accounting() {
    let mut ensemble = constant_ensemble(2, 2.0);
    let tree = ensemble.tree_mut(1);
    let (left, right) = tree.expand_node(ROOT_ID, 0, SplitRule::Numeric(0.0)).unwrap();
    tree.set_leaf_value(left, &[3.0]);
    tree.set_leaf_value(right, &[-1.0]);

    assert_eq!(ensemble.num_leaves(), 3);
    assert_eq!(ensemble.sum_leaf_squared(), 4.0 + 9.0 + 1.0);
}

#[test]
fn test_burn_in_overwrites_slot_zero() {
    let mut container = SampleContainer::new();

    container.store(constant_ensemble(1, 1.0), 1.0, 0.1, false);
    container.store(constant_ensemble(1, 2.0), 2.0, 0.2, false);
    assert_eq!(container.num_retained(), 0);

    container.store(constant_ensemble(1, 3.0), 3.0, 0.3, true);
    container.store(constant_ensemble(1, 4.0), 4.0, 0.4, true);

    assert_eq!(container.num_retained(), 2);
    assert_eq!(container.sigma2_draws(), &[3.0, 4.0]);
    assert_eq!(container.leaf_scale_draws(), &[0.3, 0.4]);
    assert_eq!(container.ensemble(0).tree(0).leaf_value(ROOT_ID), &[3.0]);
}

#[test]
fn test_predict_matrix_has_one_column_per_draw() {
    let dataset = toy_dataset(3);
    let mut container = SampleContainer::new();
    container.store(constant_ensemble(1, 1.0), 1.0, 0.0, true);
    container.store(constant_ensemble(1, 2.0), 1.0, 0.0, true);
    container.store(constant_ensemble(1, 5.0), 1.0, 0.0, true);

    let matrix = container.predict_matrix(&dataset);
    assert_eq!(matrix.dim(), (3, 3));
    for row in 0..3 {
        assert_eq!(matrix[[row, 0]], 1.0);
        assert_eq!(matrix[[row, 1]], 2.0);
        assert_eq!(matrix[[row, 2]], 5.0);
    }

    let mean = container.predict_mean(&dataset);
    for row in 0..3 {
        assert_eq!(mean[row], (1.0 + 2.0 + 5.0) / 3.0);
    }
}
