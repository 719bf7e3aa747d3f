//! Stratifying with a forest loaded from JSON.

mod common;

use std::fs::File;

use common::{assert_evidence_eq, test_cases_dir};
use stratx::evidence::Evidence::Measured;
use stratx::partition::leaf_samples;
use stratx::repr::{ForestValidationError, Tree, TreeValidationError};
use stratx::testing::{synthetic_additive, STATE_EFFECTS};
use stratx::{
    assert_approx_eq_f64, compute_cat_pd_with_oracle, compute_pd_with_oracle, partition_tree, Evidence,
    Forest, ForestLoadError, Parallelism, StratConfig,
};

fn load_fixture() -> Forest {
    let path = test_cases_dir().join("forest/additive_x1.json");
    Forest::from_json_reader(File::open(&path).expect("fixture exists")).expect("fixture is valid")
}

#[test]
fn fixture_loads() {
    let forest = load_fixture();
    assert_eq!(forest.n_trees(), 2);
    assert_eq!(forest.n_leaves(), 5);
}

#[test]
fn continuous_pd_from_loaded_forest() {
    // Features seen by the forest: [x2, state].
    let ds = synthetic_additive(400, 101, 0.0);
    let forest = load_fixture();
    let pd = compute_pd_with_oracle(&ds, "x1", &StratConfig::default(), &forest).unwrap();

    // Five leaves in total, each covering every x1 below 9.
    assert!(pd.slope_counts[..9].iter().all(|&c| c == 5));
    for (x, y) in pd.points() {
        assert_approx_eq_f64!(y, x * x, 1e-9);
    }
}

#[test]
fn categorical_pd_from_loaded_forest() {
    // Same shape reinterpreted over [x1, x2].
    let ds = synthetic_additive(400, 102, 0.0);
    let forest = load_fixture();
    let pd = compute_cat_pd_with_oracle(&ds, "state", &StratConfig::default(), &forest).unwrap();

    let expected: Vec<Evidence> = STATE_EFFECTS.iter().map(|&v| Measured(v)).collect();
    assert_evidence_eq(pd.vector.values(), &expected, 1e-9, "state");
    assert_eq!(pd.leaves_merged, 5);
}

#[test]
fn forest_round_trips_through_json() {
    let forest = Forest::from_trees(vec![partition_tree! {
        0 => split(0, 0.5, L) -> 1, 2,
        1 => leaf,
        2 => split(1, 3.0, R) -> 3, 4,
        3 => leaf,
        4 => leaf,
    }])
    .unwrap();
    let json = forest.to_json(Some(2)).unwrap();
    let loaded = Forest::from_json_str(&json).unwrap();

    let ds = synthetic_additive(200, 103, 0.0);
    let features = ds.features_excluding("x1").unwrap();
    let a = leaf_samples(&forest, features.view(), Parallelism::Sequential).unwrap();
    let b = leaf_samples(&loaded, features.view(), Parallelism::Sequential).unwrap();
    assert_eq!(a, b);
}

#[test]
fn too_few_features_rejected() {
    let json = std::fs::read_to_string(test_cases_dir().join("forest/additive_x1.json")).unwrap();
    let json = json.replace("\"n_features\": 2", "\"n_features\": 1");
    let err = Forest::from_json_str(&json).unwrap_err();
    assert!(matches!(
        err,
        ForestLoadError::Validation(ForestValidationError::FeatureOutOfRange { tree_idx: 1, feature: 1, .. })
    ));
}

#[test]
fn hand_built_forest_is_validated() {
    let err = Forest::from_trees(vec![Tree::from_nodes(&[])]).unwrap_err();
    assert_eq!(
        err,
        ForestValidationError::InvalidTree {
            tree_idx: 0,
            error: TreeValidationError::EmptyTree
        }
    );
}
