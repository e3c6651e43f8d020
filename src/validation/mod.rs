//! Model validation
//!
//! Stratified k-fold cross-validation of the classifier ensemble and a
//! held-out report covering calibration, misclassification patterns,
//! uncertainty quality and property regression error.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::calibration::{compute_calibration_metrics, CalibrationMetrics, DEFAULT_BINS};
use crate::data::{
    catalog_to_dataframe, labels_from_dataframe, observations_to_dataframe, Catalog, ClassLabel, Observation,
    PROPERTY_COLUMNS,
};
use crate::ensemble::ExoplanetEnsemble;
use crate::error::{ExoplanetError, Result};
use crate::feature_engineering::TransitFeatureEngineer;
use crate::preprocessing::ExoplanetPreprocessor;
use crate::system::{ClassificationSystem, SystemConfig};
use crate::training::{
    accuracy, stratified_train_test_split, CVResults, CVStrategy, ClassificationMetrics, CrossValidator,
    RegressionMetrics,
};
use crate::utils::frame::columns_to_array2;

/// Misclassification count for one (true, predicted) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Confusion {
    pub actual: ClassLabel,
    pub predicted: ClassLabel,
    pub count: usize,
}

/// Where and how confidently the ensemble is wrong
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorAnalysis {
    pub n_errors: usize,
    /// Off-diagonal confusions, largest first
    pub confusions: Vec<Confusion>,
    pub mean_confidence_correct: Option<f64>,
    pub mean_confidence_incorrect: Option<f64>,
}

/// How well the uncertainty score flags errors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UncertaintyQuality {
    /// Pearson correlation between uncertainty and the error indicator
    pub error_correlation: Option<f64>,
    pub mean_uncertainty_correct: Option<f64>,
    pub mean_uncertainty_incorrect: Option<f64>,
}

/// Held-out evaluation of a trained system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldoutReport {
    pub n_samples: usize,
    /// Ensemble metrics before correction
    pub metrics: ClassificationMetrics,
    /// Accuracy of the served labels after correction
    pub corrected_accuracy: f64,
    pub corrections_applied: usize,
    pub calibration: CalibrationMetrics,
    pub errors: ErrorAnalysis,
    pub uncertainty: UncertaintyQuality,
    pub property_metrics: Vec<(String, RegressionMetrics)>,
}

/// Cross-validation plus hold-out evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub cross_validation: CVResults,
    pub holdout: HoldoutReport,
}

fn mean_of(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Pearson correlation; `None` when either side has zero variance
pub fn pearson_correlation(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.len() < 2 {
        return None;
    }
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (&x, &y) in a.iter().zip(b.iter()) {
        cov += (x - mean_a) * (y - mean_b);
        var_a += (x - mean_a).powi(2);
        var_b += (y - mean_b).powi(2);
    }
    if var_a <= 0.0 || var_b <= 0.0 {
        return None;
    }
    Some(cov / (var_a.sqrt() * var_b.sqrt()))
}

/// Feature engineer and preprocessor fitted on one fold's training rows
struct FoldFeatures {
    feature_engineer: TransitFeatureEngineer,
    preprocessor: ExoplanetPreprocessor,
}

impl FoldFeatures {
    fn fit(catalog: &Catalog, config: &SystemConfig) -> Result<(Self, Array2<f64>, Array1<usize>)> {
        let raw = catalog_to_dataframe(catalog)?;
        let mut feature_engineer = TransitFeatureEngineer::new();
        let engineered = feature_engineer.fit_transform(&raw)?;
        let mut preprocessor = ExoplanetPreprocessor::with_config(config.preprocessing.clone());
        let cleaned = preprocessor.fit_transform(&engineered, &TransitFeatureEngineer::feature_names())?;
        let x = preprocessor.to_matrix(&cleaned)?;
        let y = labels_from_dataframe(&cleaned)?.iter().map(|l| l.index()).collect();
        Ok((Self { feature_engineer, preprocessor }, x, y))
    }

    fn transform(&self, observations: &[Observation]) -> Result<Array2<f64>> {
        let engineered = self.feature_engineer.transform(&observations_to_dataframe(observations)?)?;
        self.preprocessor.transform_to_matrix(&engineered)
    }
}

fn subset(catalog: &Catalog, indices: &[usize]) -> Catalog {
    Catalog::new(indices.iter().map(|&i| catalog.entries[i]).collect())
}

fn catalog_labels(catalog: &Catalog) -> Array1<usize> {
    catalog.entries.iter().map(|e| e.label.index()).collect()
}

/// Validates the classification pipeline on a labeled catalog
#[derive(Debug, Clone)]
pub struct ModelValidator {
    config: SystemConfig,
    n_folds: usize,
    n_bins: usize,
}

impl ModelValidator {
    pub fn new(config: SystemConfig) -> Self {
        Self {
            config,
            n_folds: 5,
            n_bins: DEFAULT_BINS,
        }
    }

    pub fn with_folds(mut self, n_folds: usize) -> Self {
        self.n_folds = n_folds;
        self
    }

    pub fn with_bins(mut self, n_bins: usize) -> Self {
        self.n_bins = n_bins;
        self
    }

    /// Stratified k-fold accuracy of the ensemble. Each fold fits its own
    /// feature pipeline on the training rows only.
    pub fn cross_validate(&self, catalog: &Catalog) -> Result<CVResults> {
        let y = catalog_labels(catalog);
        let splits = CrossValidator::new(CVStrategy::StratifiedKFold {
            n_splits: self.n_folds,
            shuffle: true,
        })
        .with_random_state(self.config.random_state)
        .split(catalog.len(), Some(&y))?;

        let mut scores = Vec::with_capacity(splits.len());
        for split in &splits {
            let train = subset(catalog, &split.train_indices);
            let test = subset(catalog, &split.test_indices);

            let (features, x_train, y_train) = FoldFeatures::fit(&train, &self.config)?;
            let mut ensemble = ExoplanetEnsemble::new(self.config.ensemble.clone());
            ensemble.fit(&x_train, &y_train, ClassLabel::ALL.len())?;

            let observations: Vec<Observation> = test.entries.iter().map(|e| e.observation).collect();
            let x_test = features.transform(&observations)?;
            let predicted = ensemble.predict_with_uncertainty(&x_test)?.labels;
            let score = accuracy(&catalog_labels(&test), &predicted);
            info!(fold = split.fold_idx, accuracy = score, "Cross-validation fold");
            scores.push(score);
        }

        let results = CVResults::from_scores(scores);
        info!(
            folds = self.n_folds,
            mean = results.mean_score,
            std = results.std_score,
            "Cross-validation complete"
        );
        Ok(results)
    }

    /// Evaluate a trained system on labeled rows it was not trained on
    pub fn evaluate(&self, system: &ClassificationSystem, catalog: &Catalog) -> Result<HoldoutReport> {
        let bundle = system.bundle().ok_or(ExoplanetError::ModelNotFitted)?;
        if catalog.is_empty() {
            return Err(ExoplanetError::ValidationError("evaluation catalog is empty".to_string()));
        }
        let observations: Vec<Observation> = catalog.entries.iter().map(|e| e.observation).collect();
        let y = catalog_labels(catalog);

        let x = system.model_matrix(&observations)?;
        let output = bundle.classifier.predict_with_uncertainty(&x)?;
        let metrics = ClassificationMetrics::compute(&y, &output.labels, ClassLabel::ALL.len());
        let calibration = compute_calibration_metrics(&output.probabilities, &y, self.n_bins)?;

        let predictions = system.predict_batch(&observations)?;
        let served: Array1<usize> = predictions.iter().map(|p| p.result.label.index()).collect();
        let corrections_applied = predictions.iter().filter(|p| p.correction_applied).count();

        let correct: Vec<bool> = y.iter().zip(output.labels.iter()).map(|(a, b)| a == b).collect();
        let errors = self.error_analysis(&y, &output.labels, &output.confidence, &correct);

        let error_indicator: Vec<f64> = correct.iter().map(|&c| if c { 0.0 } else { 1.0 }).collect();
        let uncertainty = UncertaintyQuality {
            error_correlation: pearson_correlation(&output.uncertainty.to_vec(), &error_indicator),
            mean_uncertainty_correct: mean_of(output.uncertainty.iter().zip(&correct).filter(|(_, c)| **c).map(|(u, _)| *u)),
            mean_uncertainty_incorrect: mean_of(
                output.uncertainty.iter().zip(&correct).filter(|(_, c)| !**c).map(|(u, _)| *u),
            ),
        };

        let property_names: Vec<String> = PROPERTY_COLUMNS.iter().map(|s| s.to_string()).collect();
        let targets = columns_to_array2(&catalog_to_dataframe(catalog)?, &property_names)?;
        let planet_mask: Vec<bool> = catalog.entries.iter().map(|e| e.label.is_planet_like()).collect();
        let property_metrics = bundle.regressors.evaluate(&x, &targets, &planet_mask)?;

        Ok(HoldoutReport {
            n_samples: catalog.len(),
            metrics,
            corrected_accuracy: accuracy(&y, &served),
            corrections_applied,
            calibration,
            errors,
            uncertainty,
            property_metrics,
        })
    }

    fn error_analysis(
        &self,
        y: &Array1<usize>,
        predicted: &Array1<usize>,
        confidence: &Array1<f64>,
        correct: &[bool],
    ) -> ErrorAnalysis {
        let k = ClassLabel::ALL.len();
        let mut counts = vec![vec![0usize; k]; k];
        for (&t, &p) in y.iter().zip(predicted.iter()) {
            if t != p && t < k && p < k {
                counts[t][p] += 1;
            }
        }
        let mut confusions: Vec<Confusion> = ClassLabel::ALL
            .iter()
            .flat_map(|&actual| {
                let counts = &counts;
                ClassLabel::ALL.iter().filter_map(move |&predicted| {
                    let count = counts[actual.index()][predicted.index()];
                    (count > 0).then_some(Confusion { actual, predicted, count })
                })
            })
            .collect();
        confusions.sort_by(|a, b| b.count.cmp(&a.count));

        ErrorAnalysis {
            n_errors: correct.iter().filter(|&&c| !c).count(),
            confusions,
            mean_confidence_correct: mean_of(confidence.iter().zip(correct).filter(|(_, c)| **c).map(|(v, _)| *v)),
            mean_confidence_incorrect: mean_of(confidence.iter().zip(correct).filter(|(_, c)| !**c).map(|(v, _)| *v)),
        }
    }

    /// Hold out a stratified split, cross-validate and train on the rest,
    /// then evaluate on the held-out rows
    pub fn run(&self, catalog: &Catalog) -> Result<(ClassificationSystem, ValidationReport)> {
        let y = catalog_labels(catalog);
        let (train_idx, test_idx) = stratified_train_test_split(&y, self.config.test_size, self.config.random_state)?;
        let train = subset(catalog, &train_idx);
        let test = subset(catalog, &test_idx);

        let cross_validation = self.cross_validate(&train)?;
        let mut system = ClassificationSystem::new();
        system.train(&train, &self.config)?;
        let holdout = self.evaluate(&system, &test)?;

        Ok((system, ValidationReport { cross_validation, holdout }))
    }
}
