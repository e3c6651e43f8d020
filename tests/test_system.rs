//! Integration test: end-to-end training, prediction and persistence

use exoplanet_classifier::data::{ClassLabel, Observation};
use exoplanet_classifier::diagnostics::diagnose;
use exoplanet_classifier::error::ExoplanetError;
use exoplanet_classifier::synthetic::{training_catalog, CatalogGenerator};
use exoplanet_classifier::system::{ClassificationSystem, StartupPolicy, SystemConfig, TrainingReport};
use exoplanet_classifier::validation::ModelValidator;
use std::sync::OnceLock;

fn trained() -> &'static (ClassificationSystem, TrainingReport) {
    static SYSTEM: OnceLock<(ClassificationSystem, TrainingReport)> = OnceLock::new();
    SYSTEM.get_or_init(|| {
        let config = SystemConfig::fast();
        let catalog = training_catalog(config.synthetic_samples, config.random_state).unwrap();
        let mut system = ClassificationSystem::new();
        let report = system.train(&catalog, &config).unwrap();
        (system, report)
    })
}

fn system() -> &'static ClassificationSystem {
    &trained().0
}

fn kepler_22b() -> Observation {
    Observation::from_values([289.9, 7.4, 0.00492, 12.0, 0.97, 5627.0, 11.7])
}

fn eclipsing_binary() -> Observation {
    Observation::from_values([2.1, 2.5, 0.15, 12.0, 1.0, 5800.0, 12.0])
}

#[test]
fn test_training_report() {
    let (system, report) = trained();
    assert!(system.is_ready());
    assert_eq!(report.rows_input, 900);
    assert_eq!(report.train_rows + report.test_rows, report.preprocessing.rows_output);
    assert_eq!(report.class_counts.iter().sum::<usize>(), report.preprocessing.rows_output);
    assert!(report.evaluation.metrics.accuracy > 0.6, "accuracy {}", report.evaluation.metrics.accuracy);
    assert_eq!(report.member_training_secs.len(), 6);
}

#[test]
fn test_scenario_kepler_22b_is_planet_like_with_properties() {
    let prediction = system().predict(&kepler_22b()).unwrap();
    assert!(prediction.result.label.is_planet_like(), "got {}", prediction.result.label);

    let properties = prediction.properties.as_ref().unwrap();
    let radius = properties["planet_radius"].unwrap();
    assert!((2.0..=10.0).contains(&radius), "radius {}", radius);
    assert!(prediction.property_uncertainties.is_some());
}

#[test]
fn test_scenario_deep_short_transit_is_false_positive() {
    let prediction = system().predict(&eclipsing_binary()).unwrap();
    assert_eq!(prediction.result.label, ClassLabel::FalsePositive);
    assert!(prediction.properties.is_none());
    assert!(prediction.property_uncertainties.is_none());
}

#[test]
fn test_properties_present_iff_planet_like() {
    let catalog = CatalogGenerator::new().with_n_samples(60).with_seed(11).generate().unwrap();
    let observations: Vec<Observation> = catalog.entries.iter().map(|e| e.observation).collect();
    let predictions = system().predict_batch(&observations).unwrap();

    assert_eq!(predictions.len(), observations.len());
    for prediction in &predictions {
        assert_eq!(prediction.properties.is_some(), prediction.result.label.is_planet_like());
        let sum: f64 = prediction.result.probabilities.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!((0.0..=1.0).contains(&prediction.result.uncertainty));
        assert_eq!(prediction.correction_applied, prediction.original_classification.is_some());
    }
}

#[test]
fn test_prediction_is_idempotent() {
    let a = serde_json::to_vec(&system().predict(&kepler_22b()).unwrap()).unwrap();
    let b = serde_json::to_vec(&system().predict(&kepler_22b()).unwrap()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_batch_matches_single_predictions() {
    let observations = vec![kepler_22b(), eclipsing_binary()];
    let batch = system().predict_batch(&observations).unwrap();
    for (obs, from_batch) in observations.iter().zip(batch.iter()) {
        let single = system().predict(obs).unwrap();
        assert_eq!(single.result.label, from_batch.result.label);
        assert!((single.result.confidence - from_batch.result.confidence).abs() < 1e-9);
    }
}

#[test]
fn test_batch_neighbours_do_not_change_a_prediction() {
    // zero depth makes several derived features non-finite
    let zero_depth = Observation::from_values([10.0, 3.0, 0.0, 9.0, 1.0, 5700.0, 12.0]);
    let hot_jupiter = Observation::from_values([3.52, 3.0, 0.015, 30.0, 1.11, 6091.0, 7.7]);
    let single = system().predict(&zero_depth).unwrap();
    let batch = system()
        .predict_batch(&[kepler_22b(), eclipsing_binary(), hot_jupiter, zero_depth])
        .unwrap();
    let from_batch = &batch[3];

    assert_eq!(single.result.label, from_batch.result.label);
    assert_eq!(single.correction_applied, from_batch.correction_applied);
    assert_eq!(single.properties.is_some(), from_batch.properties.is_some());
    for (a, b) in single.result.probabilities.iter().zip(from_batch.result.probabilities.iter()) {
        assert!((a - b).abs() < 1e-12, "{} vs {}", a, b);
    }
}

#[test]
fn test_non_finite_observation_still_predicts() {
    let mut obs = kepler_22b();
    obs.stellar_magnitude = f64::NAN;
    let prediction = system().predict(&obs).unwrap();
    let sum: f64 = prediction.result.probabilities.iter().sum();
    assert!((sum - 1.0).abs() < 1e-6);
    assert!(prediction.confirmation_score.is_none());
    assert!(!prediction.correction_applied);
}

#[test]
fn test_save_and_load_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = system().save(dir.path()).unwrap();
    assert!(path.exists());

    let loaded = ClassificationSystem::load(dir.path()).unwrap();
    let before = system().predict(&kepler_22b()).unwrap();
    let after = loaded.predict(&kepler_22b()).unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_untrained_system_reports_not_fitted() {
    let system = ClassificationSystem::new();
    assert!(matches!(system.predict(&kepler_22b()), Err(ExoplanetError::ModelNotFitted)));
}

#[test]
fn test_require_bundle_policy_fails_clearly() {
    let dir = tempfile::tempdir().unwrap();
    let result = ClassificationSystem::load_or_train(dir.path(), &SystemConfig::fast(), StartupPolicy::RequireBundle);
    assert!(matches!(result, Err(ExoplanetError::ConfigError(_))));
}

#[test]
fn test_train_if_missing_policy_writes_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let config = SystemConfig::fast()
        .with_members(&["random_forest", "logistic_regression"])
        .with_synthetic_samples(300);
    let system = ClassificationSystem::load_or_train(dir.path(), &config, StartupPolicy::TrainIfMissing).unwrap();
    assert!(system.is_ready());

    let reloaded = ClassificationSystem::load_or_train(dir.path(), &config, StartupPolicy::RequireBundle).unwrap();
    assert_eq!(
        reloaded.bundle().unwrap().metadata.training.members,
        vec!["random_forest".to_string(), "logistic_regression".to_string()]
    );
}

#[test]
fn test_diagnose_explains_prediction() {
    let report = diagnose(system(), &kepler_22b()).unwrap();
    assert_eq!(report.member_votes.len(), 6);
    assert!(!report.score_breakdown.is_empty());
    assert_eq!(report.confirmation_score, Some(100));
    assert!(!report.key_features.is_empty());
    assert!(!report.correction_explanation.is_empty());
    assert_eq!(report.prediction, system().predict(&kepler_22b()).unwrap());
}

#[test]
fn test_validator_runs_cross_validation_and_holdout() {
    let config = SystemConfig::fast()
        .with_members(&["random_forest", "logistic_regression"])
        .with_synthetic_samples(300);
    let catalog = training_catalog(config.synthetic_samples, config.random_state).unwrap();
    let (system, report) = ModelValidator::new(config).with_folds(3).run(&catalog).unwrap();

    assert!(system.is_ready());
    assert_eq!(report.cross_validation.fold_scores.len(), 3);
    assert!(report.cross_validation.fold_scores.iter().all(|s| (0.0..=1.0).contains(s)));
    assert!(report.holdout.n_samples > 0);
    assert!((0.0..=1.0).contains(&report.holdout.calibration.ece));
}
