use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use xbart::serialize::{from_json, to_json, SampleDocument, FORMAT_VERSION};
use xbart::{
    Dataset, FeatureType, LeafModelConfig, LeafModelKind, VariancePrior, XBartSampler,
    XBartSettings,
};

fn sampled_document() -> (XBartSampler, SampleDocument) {
    let n = 80;
    let p = 3;
    let mut rng = StdRng::seed_from_u64(12);
    let x = Array2::from_shape_fn((n, p), |_| rng.gen::<f64>());
    let y = Array1::from_shape_fn(n, |i| if x[[i, 0]] < 0.4 { 2.0 } else { -1.0 });
    let dataset = Dataset::new(x, None, y, vec![FeatureType::Numeric; p]).unwrap();

    let settings = XBartSettings {
        num_trees: 8,
        min_samples_leaf: 3,
        alpha: 0.95,
        beta: 2.0,
        variable_weights: vec![1.0; p],
        leaf_model: LeafModelConfig::Constant { scale: 0.1 },
        sigma2_prior: VariancePrior::new(1.0, 0.5),
        leaf_scale_prior: None,
        sigma2_init: 1.0,
        cutpoint_grid_size: 50,
        seed: 21,
    };
    let mut sampler = XBartSampler::new(dataset, settings).unwrap();
    sampler.run(5, 10, 5).unwrap();

    let document = SampleDocument::new(LeafModelKind::Constant, sampler.samples());
    (sampler, document)
}

#[test]
fn test_round_trip_is_identity() {
    let (_sampler, document) = sampled_document();

    let json = to_json(&document).unwrap();
    let decoded = from_json(&json).unwrap();

    assert_eq!(decoded, document);
    assert_eq!(decoded.format_version, FORMAT_VERSION);
    assert_eq!(decoded.leaf_model, LeafModelKind::Constant);
}

#[test]
fn test_encoding_is_deterministic() {
    let (_sampler, document) = sampled_document();

    let first = to_json(&document).unwrap();
    let second = to_json(&document).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_round_trip_preserves_predictions() {
    let (sampler, document) = sampled_document();

    let json = to_json(&document).unwrap();
    let decoded = from_json(&json).unwrap();

    let original = document.samples.predict_mean(sampler.dataset());
    let restored = decoded.samples.predict_mean(sampler.dataset());
    for (a, b) in original.iter().zip(restored.iter()) {
        assert_eq!(a, b);
    }
}

#[test]
fn test_document_carries_hyperparameter_history() {
    let (sampler, document) = sampled_document();

    assert_eq!(
        document.samples.sigma2_draws(),
        sampler.samples().sigma2_draws()
    );
    assert_eq!(document.samples.num_retained(), 10);
    assert!(document
        .samples
        .sigma2_draws()
        .iter()
        .all(|sigma2| sigma2.is_finite() && *sigma2 > 0.0));
}

#[test]
fn test_malformed_document_is_rejected() {
    assert!(from_json("{\"format_version\":").is_err());
    assert!(from_json("{}").is_err());
}
