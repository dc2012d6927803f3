use ndarray::{Array1, Array2};
use rand::distributions::WeightedIndex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use xbart::mcmc::{sample_tree, MoveKind};
use xbart::partition::{FeatureUnsortedPartition, SampleNodeMapper};
use xbart::suffstats::GaussianConstantLeaf;
use xbart::tree::{Tree, ROOT_ID};
use xbart::{Dataset, FeatureType, TreePrior, XBartError};

fn constant_feature_dataset(n: usize) -> Dataset {
    let x = Array2::from_elem((n, 1), 1.0);
    let y = Array1::from_shape_fn(n, |i| i as f64);
    Dataset::new(x, None, y, vec![FeatureType::Numeric]).unwrap()
}

fn step_dataset(n: usize, seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let x = Array2::from_shape_fn((n, 1), |_| rng.gen::<f64>());
    let y = Array1::from_shape_fn(n, |i| if x[[i, 0]] < 0.5 { 1.0 } else { -1.0 });
    Dataset::new(x, None, y, vec![FeatureType::Numeric]).unwrap()
}

fn prior(min_samples_leaf: usize) -> TreePrior {
    TreePrior {
        alpha: 0.95,
        beta: 2.0,
        min_samples_leaf,
    }
}

#[test]
fn test_degenerate_grow_is_rejected() {
    let dataset = constant_feature_dataset(10);
    let mut tree = Tree::new(1, &[0.0]);
    let mut partition = FeatureUnsortedPartition::new(10);
    let mut mapper = SampleNodeMapper::new(1, 10);
    let model = GaussianConstantLeaf::new(1.0);
    let feature_dist = WeightedIndex::new([1.0]).unwrap();
    let mut rng = StdRng::seed_from_u64(3);

    // The only feature is constant, so every grow proposal collapses to a
    // degenerate range and is rejected locally.
    for _ in 0..5 {
        let record = sample_tree(
            &mut tree,
            &dataset,
            &mut partition,
            &mut mapper,
            &model,
            &prior(1),
            &feature_dist,
            1.0,
            0,
            &mut rng,
        )
        .unwrap();
        assert_eq!(record.kind, MoveKind::Grow);
        assert!(!record.accepted);
    }
    assert!(tree.is_leaf(ROOT_ID));
    assert_eq!(tree.num_valid_nodes(), 1);
}

#[test]
fn test_empty_move_set_is_fatal() {
    // Three observations cannot satisfy a 2-per-child minimum, and a root
    // leaf cannot be pruned.
    let dataset = constant_feature_dataset(3);
    let mut tree = Tree::new(1, &[0.0]);
    let mut partition = FeatureUnsortedPartition::new(3);
    let mut mapper = SampleNodeMapper::new(1, 3);
    let model = GaussianConstantLeaf::new(1.0);
    let feature_dist = WeightedIndex::new([1.0]).unwrap();
    let mut rng = StdRng::seed_from_u64(3);

    let result = sample_tree(
        &mut tree,
        &dataset,
        &mut partition,
        &mut mapper,
        &model,
        &prior(2),
        &feature_dist,
        1.0,
        0,
        &mut rng,
    );
    assert!(matches!(result, Err(XBartError::EmptyMoveSet { tree: 0 })));
}

#[test]
fn test_moves_keep_tree_and_partition_consistent() {
    let n = 100;
    let dataset = step_dataset(n, 11);
    let mut tree = Tree::new(1, &[0.0]);
    let mut partition = FeatureUnsortedPartition::new(n);
    let mut mapper = SampleNodeMapper::new(1, n);
    let model = GaussianConstantLeaf::new(1.0);
    let feature_dist = WeightedIndex::new([1.0]).unwrap();
    let tree_prior = prior(2);
    let mut rng = StdRng::seed_from_u64(42);

    let mut accepted = 0;
    for _ in 0..50 {
        let record = sample_tree(
            &mut tree,
            &dataset,
            &mut partition,
            &mut mapper,
            &model,
            &tree_prior,
            &feature_dist,
            1.0,
            0,
            &mut rng,
        )
        .unwrap();
        if record.accepted {
            accepted += 1;
        }

        // Leaf ranges cover every observation exactly once and agree with
        // the tree's routing.
        let mut seen = vec![false; n];
        for leaf in tree.leaves() {
            for &row in partition.node_indices(leaf) {
                assert!(!seen[row]);
                seen[row] = true;
                assert_eq!(mapper.node_id(0, row), leaf);

                let mut node = ROOT_ID;
                while !tree.is_leaf(node) {
                    let value = dataset.covariate_value(row, tree.split_feature(node));
                    node = if tree.split_rule(node).unwrap().goes_left(value) {
                        tree.left_child(node).unwrap()
                    } else {
                        tree.right_child(node).unwrap()
                    };
                }
                assert_eq!(node, leaf);
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    // A clean step function yields accepted grows within 50 proposals.
    assert!(accepted > 0);
    assert!(tree.num_valid_nodes() > 1);

    // The sampler never touches the residual.
    for row in 0..n {
        assert_eq!(dataset.residual_value(row), dataset.outcome()[row]);
    }

    // Every split threshold lies strictly inside its node's observed range.
    for id in 0..tree.node_capacity() {
        if tree.is_valid(id) && !tree.is_leaf(id) {
            if let Some(xbart::SplitRule::Numeric(threshold)) = tree.split_rule(id) {
                let rows: Vec<usize> = partition
                    .node_indices(tree.left_child(id).unwrap())
                    .iter()
                    .chain(partition.node_indices(tree.right_child(id).unwrap()).iter())
                    .copied()
                    .collect();
                let feature = tree.split_feature(id);
                let min = rows
                    .iter()
                    .map(|&row| dataset.covariate_value(row, feature))
                    .fold(f64::MAX, f64::min);
                let max = rows
                    .iter()
                    .map(|&row| dataset.covariate_value(row, feature))
                    .fold(f64::MIN, f64::max);
                assert!(*threshold >= min && *threshold < max);
            }
        }
    }
}
