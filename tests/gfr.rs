use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use xbart::gfr::sample_tree;
use xbart::partition::SampleNodeMapper;
use xbart::presort::{FeaturePresortRootContainer, SortedNodePartition};
use xbart::suffstats::GaussianConstantLeaf;
use xbart::tree::{SplitRule, Tree, ROOT_ID};
use xbart::{Dataset, FeatureType, TreePrior};

fn prior(min_samples_leaf: usize) -> TreePrior {
    TreePrior {
        alpha: 0.95,
        beta: 2.0,
        min_samples_leaf,
    }
}

#[test]
fn test_gfr_recovers_a_step_function_split() {
    let n = 200;
    let mut data_rng = StdRng::seed_from_u64(7);
    let x = Array2::from_shape_fn((n, 2), |_| data_rng.gen::<f64>());
    let y = Array1::from_shape_fn(n, |i| if x[[i, 0]] < 0.5 { 1.0 } else { -1.0 });
    let dataset = Dataset::new(x, None, y, vec![FeatureType::Numeric; 2]).unwrap();

    let presort = FeaturePresortRootContainer::new(&dataset);
    let mut sorted = SortedNodePartition::new(&presort, n);
    let mut mapper = SampleNodeMapper::new(1, n);
    let mut tree = Tree::new(1, &[0.0]);
    let model = GaussianConstantLeaf::new(1.0);
    let mut rng = StdRng::seed_from_u64(99);

    sample_tree(
        &mut tree,
        &dataset,
        &mut sorted,
        &mut mapper,
        &model,
        &prior(5),
        0.25,
        50,
        0,
        &mut rng,
    );

    // The dominant cutpoint separates the two plateaus on feature 0.
    assert!(!tree.is_leaf(ROOT_ID));
    assert_eq!(tree.split_feature(ROOT_ID), 0);
    match tree.split_rule(ROOT_ID).unwrap() {
        SplitRule::Numeric(threshold) => {
            assert!(*threshold > 0.4 && *threshold < 0.6);
        }
        other => panic!("unexpected root rule {:?}", other),
    }

    // Every leaf range agrees with the observation map and the tree routing.
    let mut seen = vec![false; n];
    for leaf in tree.leaves() {
        for position in sorted.node_begin(leaf)..sorted.node_end(leaf) {
            let row = sorted.sort_index(0, position);
            assert!(!seen[row]);
            seen[row] = true;
            assert_eq!(mapper.node_id(0, row), leaf);
        }
    }
    assert!(seen.iter().all(|&s| s));
}

#[test]
fn test_gfr_honors_min_samples_leaf() {
    let n = 40;
    let mut data_rng = StdRng::seed_from_u64(23);
    let x = Array2::from_shape_fn((n, 1), |_| data_rng.gen::<f64>());
    let y = Array1::from_shape_fn(n, |i| x[[i, 0]] * 4.0);
    let dataset = Dataset::new(x, None, y, vec![FeatureType::Numeric]).unwrap();

    let presort = FeaturePresortRootContainer::new(&dataset);
    let mut sorted = SortedNodePartition::new(&presort, n);
    let mut mapper = SampleNodeMapper::new(1, n);
    let mut tree = Tree::new(1, &[0.0]);
    let model = GaussianConstantLeaf::new(1.0);
    let min_samples_leaf = 8;
    let mut rng = StdRng::seed_from_u64(5);

    sample_tree(
        &mut tree,
        &dataset,
        &mut sorted,
        &mut mapper,
        &model,
        &prior(min_samples_leaf),
        0.1,
        20,
        0,
        &mut rng,
    );

    for leaf in tree.leaves() {
        assert!(sorted.node_size(leaf) >= min_samples_leaf || tree.num_valid_nodes() == 1);
    }
}

#[test]
fn test_gfr_single_observation_node_stays_leaf() {
    // With one observation there is no valid cutpoint; the no-split slot is
    // the only option.
    let x = Array2::from_elem((1, 1), 0.0);
    let y = Array1::from_elem(1, 1.0);
    let dataset = Dataset::new(x, None, y, vec![FeatureType::Numeric]).unwrap();

    let presort = FeaturePresortRootContainer::new(&dataset);
    let mut sorted = SortedNodePartition::new(&presort, 1);
    let mut mapper = SampleNodeMapper::new(1, 1);
    let mut tree = Tree::new(1, &[0.0]);
    let model = GaussianConstantLeaf::new(1.0);
    let mut rng = StdRng::seed_from_u64(1);

    sample_tree(
        &mut tree,
        &dataset,
        &mut sorted,
        &mut mapper,
        &model,
        &prior(1),
        1.0,
        10,
        0,
        &mut rng,
    );

    assert!(tree.is_leaf(ROOT_ID));
}

#[test]
fn test_gfr_splits_unordered_categories_by_set() {
    // Five levels, two of which carry a +1 outcome and three a −1 outcome.
    let n = 250;
    let x = Array2::from_shape_fn((n, 1), |(i, _)| (i % 5) as f64);
    let y = Array1::from_shape_fn(n, |i| if i % 5 <= 1 { 1.0 } else { -1.0 });
    let dataset = Dataset::new(x, None, y, vec![FeatureType::UnorderedCategorical]).unwrap();

    let presort = FeaturePresortRootContainer::new(&dataset);
    let mut sorted = SortedNodePartition::new(&presort, n);
    let mut mapper = SampleNodeMapper::new(1, n);
    let mut tree = Tree::new(1, &[0.0]);
    let model = GaussianConstantLeaf::new(1.0);
    let mut rng = StdRng::seed_from_u64(31);

    sample_tree(
        &mut tree,
        &dataset,
        &mut sorted,
        &mut mapper,
        &model,
        &prior(5),
        0.25,
        10,
        0,
        &mut rng,
    );

    assert!(!tree.is_leaf(ROOT_ID));
    match tree.split_rule(ROOT_ID).unwrap() {
        SplitRule::Categories(set) => {
            // The separating partition, up to complementation.
            assert!(set == &vec![0, 1] || set == &vec![2, 3, 4]);
        }
        other => panic!("unexpected root rule {:?}", other),
    }
}
