//! End-to-end classification system
//!
//! Ties feature engineering, preprocessing, the classifier ensemble, the
//! property regressors and the confirmation corrector together, and owns the
//! persisted [`ModelBundle`].
//!
//! ```no_run
//! use exoplanet_classifier::prelude::*;
//! use std::path::Path;
//!
//! let config = SystemConfig::fast();
//! let system = ClassificationSystem::load_or_train(Path::new("models"), &config, StartupPolicy::TrainIfMissing)?;
//! let obs = Observation::from_values([289.9, 7.4, 0.00492, 12.0, 0.97, 5627.0, 11.7]);
//! let prediction = system.predict(&obs)?;
//! println!("{} ({:.2})", prediction.result.label, prediction.result.confidence);
//! # Ok::<(), exoplanet_classifier::ExoplanetError>(())
//! ```

mod bundle;
mod config;

pub use bundle::{BundleMetadata, ModelBundle, TrainingSummary, BUNDLE_FILE, FORMAT_VERSION};
pub use config::{StartupPolicy, SystemConfig};

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

use crate::correction::{ConfirmationCorrector, Correction};
use crate::data::{
    catalog_to_dataframe, labels_from_dataframe, observations_to_dataframe, Catalog, ClassLabel,
    ClassificationResult, Observation, PROPERTY_COLUMNS,
};
use crate::ensemble::{
    EnsembleEvaluation, EnsembleOutput, ExoplanetEnsemble, MemberOutput, PropertyPrediction, PropertyRegressors,
};
use crate::error::{ExoplanetError, Result};
use crate::feature_engineering::TransitFeatureEngineer;
use crate::preprocessing::{ExoplanetPreprocessor, PreprocessingReport};
use crate::synthetic::training_catalog;
use crate::training::{stratified_train_test_split, RegressionMetrics};
use crate::utils::frame::columns_to_array2;

/// Outcome of a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub rows_input: usize,
    pub preprocessing: PreprocessingReport,
    pub train_rows: usize,
    pub test_rows: usize,
    /// Rows per class after preprocessing, in encoding order
    pub class_counts: [usize; 3],
    pub evaluation: EnsembleEvaluation,
    pub property_metrics: Vec<(String, RegressionMetrics)>,
    pub member_training_secs: Vec<(String, f64)>,
    pub training_secs: f64,
}

/// One served prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Final result after correction
    pub result: ClassificationResult,
    /// Present only for planet-like labels; skipped properties are `None`
    pub properties: Option<BTreeMap<String, Option<f64>>>,
    pub property_uncertainties: Option<BTreeMap<String, Option<f64>>>,
    pub correction_applied: bool,
    /// Ensemble label before the correction, when it was applied
    pub original_classification: Option<ClassLabel>,
    /// Confirmation score, absent when the corrector fell back
    pub confirmation_score: Option<u32>,
}

/// Everything the pipeline computed for one observation
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Raw and derived feature values, in `TransitFeatureEngineer::feature_names` order
    pub engineered: Vec<f64>,
    pub members: Vec<MemberOutput>,
    pub ensemble: ClassificationResult,
    pub correction: Correction,
    pub prediction: Prediction,
}

/// Trained pipeline ready for inference
#[derive(Debug, Clone, Default)]
pub struct ClassificationSystem {
    bundle: Option<ModelBundle>,
    corrector: ConfirmationCorrector,
}

fn property_map(values: &[Option<f64>; 4]) -> BTreeMap<String, Option<f64>> {
    PROPERTY_COLUMNS
        .iter()
        .zip(values.iter())
        .map(|(name, v)| (name.to_string(), *v))
        .collect()
}

impl ClassificationSystem {
    /// An untrained system
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bundle(bundle: ModelBundle) -> Self {
        Self {
            bundle: Some(bundle),
            corrector: ConfirmationCorrector::new(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.bundle.is_some()
    }

    pub fn bundle(&self) -> Option<&ModelBundle> {
        self.bundle.as_ref()
    }

    pub fn corrector(&self) -> &ConfirmationCorrector {
        &self.corrector
    }

    fn ready_bundle(&self) -> Result<&ModelBundle> {
        self.bundle.as_ref().ok_or(ExoplanetError::ModelNotFitted)
    }

    /// Fit every component on `catalog` and evaluate on a stratified hold-out
    pub fn train(&mut self, catalog: &Catalog, config: &SystemConfig) -> Result<TrainingReport> {
        config.validate()?;
        if catalog.is_empty() {
            return Err(ExoplanetError::DataError("training catalog is empty".to_string()));
        }
        let start = Instant::now();
        info!(rows = catalog.len(), "Training classification system");

        let raw = catalog_to_dataframe(catalog)?;
        let mut feature_engineer = TransitFeatureEngineer::new();
        let engineered = feature_engineer.fit_transform(&raw)?;

        let mut preprocessor = ExoplanetPreprocessor::with_config(config.preprocessing.clone());
        let cleaned = preprocessor.fit_transform(&engineered, &TransitFeatureEngineer::feature_names())?;
        let preprocessing = preprocessor.report().cloned().unwrap_or_default();

        let x = preprocessor.to_matrix(&cleaned)?;
        let labels = labels_from_dataframe(&cleaned)?;
        let y: Array1<usize> = labels.iter().map(|l| l.index()).collect();
        let property_names: Vec<String> = PROPERTY_COLUMNS.iter().map(|s| s.to_string()).collect();
        let targets = columns_to_array2(&cleaned, &property_names)?;

        let mut class_counts = [0usize; 3];
        for label in &labels {
            class_counts[label.index()] += 1;
        }
        if class_counts.iter().filter(|&&c| c > 0).count() < 2 {
            return Err(ExoplanetError::TrainingError(format!(
                "need at least two classes after preprocessing, got counts {:?}",
                class_counts
            )));
        }

        let (train_idx, test_idx) = stratified_train_test_split(&y, config.test_size, config.random_state)?;
        let x_train = x.select(Axis(0), &train_idx);
        let y_train = y.select(Axis(0), &train_idx);
        let x_test = x.select(Axis(0), &test_idx);
        let y_test = y.select(Axis(0), &test_idx);
        let targets_train = targets.select(Axis(0), &train_idx);
        let targets_test = targets.select(Axis(0), &test_idx);
        let planet_mask = |idx: &[usize]| -> Vec<bool> { idx.iter().map(|&i| labels[i].is_planet_like()).collect() };

        let mut classifier = ExoplanetEnsemble::new(config.ensemble.clone());
        classifier.fit(&x_train, &y_train, ClassLabel::ALL.len())?;

        let mut regressor_config = config.regressors.clone();
        regressor_config.min_samples = config.min_property_samples;
        let mut regressors = PropertyRegressors::new(regressor_config);
        regressors.fit(&x_train, &targets_train, &planet_mask(&train_idx))?;

        let evaluation = if test_idx.is_empty() {
            classifier.evaluate(&x_train, &y_train)?
        } else {
            classifier.evaluate(&x_test, &y_test)?
        };
        let property_metrics = regressors.evaluate(&x_test, &targets_test, &planet_mask(&test_idx))?;

        for (name, acc) in &evaluation.member_accuracy {
            info!(member = %name, accuracy = acc, "Member evaluation");
        }
        for (name, m) in &property_metrics {
            info!(property = %name, mae = m.mae, r2 = m.r2, "Property evaluation");
        }
        info!(
            accuracy = evaluation.metrics.accuracy,
            macro_f1 = evaluation.metrics.macro_f1,
            train_rows = train_idx.len(),
            test_rows = test_idx.len(),
            "Ensemble evaluation"
        );

        let summary = TrainingSummary {
            training_rows: train_idx.len(),
            test_rows: test_idx.len(),
            test_accuracy: evaluation.metrics.accuracy,
            members: classifier.member_names().iter().map(|s| s.to_string()).collect(),
            trained_properties: regressors.trained_properties().iter().map(|s| s.to_string()).collect(),
        };
        let member_training_secs = classifier.training_secs().to_vec();

        self.bundle = Some(ModelBundle {
            metadata: BundleMetadata::new(summary),
            feature_engineer,
            preprocessor,
            classifier,
            regressors,
        });

        let report = TrainingReport {
            rows_input: catalog.len(),
            preprocessing,
            train_rows: train_idx.len(),
            test_rows: test_idx.len(),
            class_counts,
            evaluation,
            property_metrics,
            member_training_secs,
            training_secs: start.elapsed().as_secs_f64(),
        };
        info!(secs = report.training_secs, "Training complete");
        Ok(report)
    }

    /// Model input matrix for a batch: feature engineering then the fitted transform
    pub fn model_matrix(&self, observations: &[Observation]) -> Result<Array2<f64>> {
        let bundle = self.ready_bundle()?;
        let raw = observations_to_dataframe(observations)?;
        let engineered = bundle.feature_engineer.transform(&raw)?;
        bundle.preprocessor.transform_to_matrix(&engineered)
    }

    fn assemble(
        &self,
        obs: &Observation,
        ensemble: &EnsembleOutput,
        properties: &[PropertyPrediction],
        row: usize,
    ) -> (ClassificationResult, Correction, Prediction) {
        let probs = ensemble.probabilities.row(row);
        let distribution = [probs[0], probs[1], probs[2]];
        let original = ClassificationResult::from_distribution(distribution, ensemble.model_agreement[row]);
        let correction = self.corrector.correct(obs, &original);
        let result = *correction.result();

        let (props, uncertainties) = if result.label.is_planet_like() {
            let p = &properties[row];
            (Some(property_map(&p.values)), Some(property_map(&p.uncertainties)))
        } else {
            (None, None)
        };

        let prediction = Prediction {
            result,
            properties: props,
            property_uncertainties: uncertainties,
            correction_applied: correction.is_applied(),
            original_classification: correction.original().map(|o| o.label),
            confirmation_score: correction.score(),
        };
        (original, correction, prediction)
    }

    fn run(&self, observations: &[Observation]) -> Result<(Vec<MemberOutput>, EnsembleOutput, Vec<PropertyPrediction>)> {
        let bundle = self.ready_bundle()?;
        let x = self.model_matrix(observations)?;
        let members = bundle.classifier.member_outputs(&x)?;
        let ensemble = bundle.classifier.combine(&members)?;
        let properties = bundle.regressors.predict(&x)?;
        Ok((members, ensemble, properties))
    }

    /// Classify one observation
    pub fn predict(&self, observation: &Observation) -> Result<Prediction> {
        self.predict_batch(std::slice::from_ref(observation))?
            .pop()
            .ok_or_else(|| ExoplanetError::InferenceError("no prediction produced".to_string()))
    }

    /// Classify a batch; output order matches input order
    pub fn predict_batch(&self, observations: &[Observation]) -> Result<Vec<Prediction>> {
        if observations.is_empty() {
            return Ok(Vec::new());
        }
        let (_, ensemble, properties) = self.run(observations)?;
        Ok(observations
            .iter()
            .enumerate()
            .map(|(i, obs)| self.assemble(obs, &ensemble, &properties, i).2)
            .collect())
    }

    /// Full intermediate state for one observation
    pub fn analyze(&self, observation: &Observation) -> Result<Analysis> {
        let bundle = self.ready_bundle()?;
        let (members, ensemble, properties) = self.run(std::slice::from_ref(observation))?;
        let (original, correction, prediction) = self.assemble(observation, &ensemble, &properties, 0);

        Ok(Analysis {
            engineered: bundle.feature_engineer.transform_observation(observation),
            members,
            ensemble: original,
            correction,
            prediction,
        })
    }

    /// Persist the bundle under `dir`
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        self.ready_bundle()?.save(dir)
    }

    /// Load a bundle from `dir`
    pub fn load(dir: &Path) -> Result<Self> {
        Ok(Self::from_bundle(ModelBundle::load(dir)?))
    }

    /// Load the bundle from `dir`, or apply `policy` when there is none
    pub fn load_or_train(dir: &Path, config: &SystemConfig, policy: StartupPolicy) -> Result<Self> {
        if ModelBundle::exists_in(dir) {
            return Self::load(dir);
        }
        match policy {
            StartupPolicy::RequireBundle => Err(ExoplanetError::ConfigError(format!(
                "no model bundle at {}; run `exoplanet train` first",
                ModelBundle::path_in(dir).display()
            ))),
            StartupPolicy::TrainIfMissing => {
                warn!(dir = %dir.display(), "No model bundle found, training on generated catalog");
                let catalog = training_catalog(config.synthetic_samples, config.random_state)?;
                let mut system = Self::new();
                system.train(&catalog, config)?;
                system.save(dir)?;
                Ok(system)
            }
        }
    }
}
