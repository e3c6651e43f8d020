//! Soft-voting classification ensemble over heterogeneous learners
//!
//! The member list is fixed when the ensemble is built: each [`MemberSpec`]
//! names a learner family and its hyperparameters. Whether a member
//! contributes a probability distribution is a property of the built model
//! ([`Classifier::as_probabilistic`]); members without one still take part in
//! the agreement measure.

use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

use super::voting::{model_agreement, normalized_entropy, VotingClassifier, VotingStrategy};
use crate::error::{ExoplanetError, Result};
use crate::training::{
    accuracy, argmax_rows, ClassWeight, ClassificationMetrics, Classifier, GradientBoostingClassifier,
    GradientBoostingConfig, LightGBMClassifier, LightGBMConfig, LogisticRegression, MLPClassifier,
    MLPConfig, MaxFeatures, ProbabilisticClassifier, RandomForest, XGBoostClassifier, XGBoostConfig,
};

/// Learner family and hyperparameters of one ensemble member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MemberKind {
    RandomForest {
        n_estimators: usize,
        max_depth: Option<usize>,
        min_samples_split: usize,
        min_samples_leaf: usize,
        max_features: MaxFeatures,
    },
    GradientBoosting(GradientBoostingConfig),
    NeuralNetwork(MLPConfig),
    LogisticRegression { c: f64, max_iter: usize },
    XGBoost(XGBoostConfig),
    LightGBM(LightGBMConfig),
}

/// A named member configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberSpec {
    pub name: String,
    pub kind: MemberKind,
}

impl MemberSpec {
    pub fn new(name: impl Into<String>, kind: MemberKind) -> Self {
        Self { name: name.into(), kind }
    }

    /// Instantiate an unfitted model for `n_classes` classes
    pub fn build(&self, n_classes: usize, seed: u64) -> EnsembleMember {
        match &self.kind {
            MemberKind::RandomForest {
                n_estimators,
                max_depth,
                min_samples_split,
                min_samples_leaf,
                max_features,
            } => {
                let mut forest = RandomForest::new_classifier(*n_estimators)
                    .with_min_samples_split(*min_samples_split)
                    .with_min_samples_leaf(*min_samples_leaf)
                    .with_max_features(*max_features)
                    .with_n_classes(n_classes)
                    .with_random_state(seed);
                if let Some(depth) = max_depth {
                    forest = forest.with_max_depth(*depth);
                }
                EnsembleMember::RandomForest(forest)
            }
            MemberKind::GradientBoosting(config) => EnsembleMember::GradientBoosting(
                GradientBoostingClassifier::new(GradientBoostingConfig {
                    random_state: Some(seed),
                    ..config.clone()
                })
                .with_n_classes(n_classes),
            ),
            MemberKind::NeuralNetwork(config) => EnsembleMember::NeuralNetwork(
                MLPClassifier::new(MLPConfig { random_state: Some(seed), ..config.clone() }).with_n_classes(n_classes),
            ),
            MemberKind::LogisticRegression { c, max_iter } => EnsembleMember::LogisticRegression(
                LogisticRegression::new()
                    .with_c(*c)
                    .with_max_iter(*max_iter)
                    .with_n_classes(n_classes),
            ),
            MemberKind::XGBoost(config) => EnsembleMember::XGBoost(
                XGBoostClassifier::new(XGBoostConfig { random_state: Some(seed), ..config.clone() })
                    .with_n_classes(n_classes),
            ),
            MemberKind::LightGBM(config) => EnsembleMember::LightGBM(
                LightGBMClassifier::new(LightGBMConfig { random_state: Some(seed), ..config.clone() })
                    .with_n_classes(n_classes),
            ),
        }
    }
}

/// A built ensemble member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EnsembleMember {
    RandomForest(RandomForest),
    GradientBoosting(GradientBoostingClassifier),
    NeuralNetwork(MLPClassifier),
    LogisticRegression(LogisticRegression),
    XGBoost(XGBoostClassifier),
    LightGBM(LightGBMClassifier),
}

impl EnsembleMember {
    fn inner(&self) -> &dyn Classifier {
        match self {
            EnsembleMember::RandomForest(m) => m,
            EnsembleMember::GradientBoosting(m) => m,
            EnsembleMember::NeuralNetwork(m) => m,
            EnsembleMember::LogisticRegression(m) => m,
            EnsembleMember::XGBoost(m) => m,
            EnsembleMember::LightGBM(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Classifier {
        match self {
            EnsembleMember::RandomForest(m) => m,
            EnsembleMember::GradientBoosting(m) => m,
            EnsembleMember::NeuralNetwork(m) => m,
            EnsembleMember::LogisticRegression(m) => m,
            EnsembleMember::XGBoost(m) => m,
            EnsembleMember::LightGBM(m) => m,
        }
    }
}

impl Classifier for EnsembleMember {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>, sample_weight: Option<&Array1<f64>>) -> Result<()> {
        self.inner_mut().fit(x, y, sample_weight)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        self.inner().predict(x)
    }

    fn n_classes(&self) -> usize {
        self.inner().n_classes()
    }

    fn as_probabilistic(&self) -> Option<&dyn ProbabilisticClassifier> {
        self.inner().as_probabilistic()
    }
}

/// Ensemble configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleConfig {
    pub members: Vec<MemberSpec>,
    pub voting: VotingStrategy,
    /// Class reweighting shared by every member
    pub class_weight: ClassWeight,
    pub random_state: u64,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            members: vec![
                MemberSpec::new(
                    "random_forest",
                    MemberKind::RandomForest {
                        n_estimators: 200,
                        max_depth: Some(15),
                        min_samples_split: 10,
                        min_samples_leaf: 4,
                        max_features: MaxFeatures::Sqrt,
                    },
                ),
                MemberSpec::new(
                    "gradient_boosting",
                    MemberKind::GradientBoosting(GradientBoostingConfig {
                        n_estimators: 150,
                        learning_rate: 0.05,
                        max_depth: 7,
                        subsample: 0.8,
                        ..Default::default()
                    }),
                ),
                MemberSpec::new(
                    "neural_network",
                    MemberKind::NeuralNetwork(MLPConfig {
                        hidden_layers: vec![128, 64, 32],
                        max_epochs: 500,
                        learning_rate: 0.01,
                        early_stopping_patience: 10,
                        validation_split: 0.1,
                        ..Default::default()
                    }),
                ),
                MemberSpec::new("logistic_regression", MemberKind::LogisticRegression { c: 1.0, max_iter: 1000 }),
                MemberSpec::new(
                    "xgboost",
                    MemberKind::XGBoost(XGBoostConfig {
                        n_estimators: 200,
                        learning_rate: 0.05,
                        max_depth: 8,
                        subsample: 0.8,
                        colsample_bytree: 0.8,
                        ..Default::default()
                    }),
                ),
                MemberSpec::new(
                    "lightgbm",
                    MemberKind::LightGBM(LightGBMConfig {
                        n_estimators: 200,
                        learning_rate: 0.05,
                        max_depth: Some(8),
                        max_leaves: 31,
                        subsample: 0.8,
                        ..Default::default()
                    }),
                ),
            ],
            voting: VotingStrategy::Soft,
            class_weight: ClassWeight::Balanced,
            random_state: 42,
        }
    }
}

impl EnsembleConfig {
    /// Same six families with small sizes, for tests and demos
    pub fn fast() -> Self {
        let mut config = Self::default();
        for spec in config.members.iter_mut() {
            match &mut spec.kind {
                MemberKind::RandomForest { n_estimators, max_depth, .. } => {
                    *n_estimators = 20;
                    *max_depth = Some(8);
                }
                MemberKind::GradientBoosting(c) => {
                    c.n_estimators = 20;
                    c.max_depth = 3;
                    c.learning_rate = 0.2;
                }
                MemberKind::NeuralNetwork(c) => {
                    c.hidden_layers = vec![32, 16];
                    c.max_epochs = 40;
                }
                MemberKind::LogisticRegression { max_iter, .. } => *max_iter = 300,
                MemberKind::XGBoost(c) => {
                    c.n_estimators = 20;
                    c.max_depth = 4;
                    c.learning_rate = 0.2;
                }
                MemberKind::LightGBM(c) => {
                    c.n_estimators = 20;
                    c.max_depth = Some(4);
                    c.max_leaves = 15;
                    c.learning_rate = 0.2;
                }
            }
        }
        config
    }

    /// Keep only the named members, in their configured order
    pub fn with_members(mut self, names: &[&str]) -> Self {
        self.members.retain(|m| names.contains(&m.name.as_str()));
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }
}

/// Per-row ensemble output
#[derive(Debug, Clone)]
pub struct EnsembleOutput {
    /// Combined class distribution, shape (n_rows, n_classes)
    pub probabilities: Array2<f64>,
    pub labels: Array1<usize>,
    /// Max probability per row
    pub confidence: Array1<f64>,
    /// Normalized entropy per row
    pub uncertainty: Array1<f64>,
    pub model_agreement: Array1<f64>,
}

/// Hard and soft outputs of one member
#[derive(Debug, Clone)]
pub struct MemberOutput {
    pub name: String,
    pub predictions: Array1<usize>,
    pub probabilities: Option<Array2<f64>>,
}

/// Held-out evaluation of the ensemble and each member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleEvaluation {
    pub metrics: ClassificationMetrics,
    pub member_accuracy: Vec<(String, f64)>,
}

/// Soft-voting ensemble classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExoplanetEnsemble {
    config: EnsembleConfig,
    members: Vec<(String, EnsembleMember)>,
    voter: VotingClassifier,
    n_classes: usize,
    training_secs: Vec<(String, f64)>,
    is_fitted: bool,
}

impl ExoplanetEnsemble {
    pub fn new(config: EnsembleConfig) -> Self {
        Self {
            voter: VotingClassifier::new(config.voting, 0),
            config,
            members: Vec::new(),
            n_classes: 0,
            training_secs: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn config(&self) -> &EnsembleConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn member_names(&self) -> Vec<&str> {
        self.members.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Wall-clock fit time per member from the last `fit`
    pub fn training_secs(&self) -> &[(String, f64)] {
        &self.training_secs
    }

    /// Build and fit every configured member on the same data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>, n_classes: usize) -> Result<()> {
        if self.config.members.is_empty() {
            return Err(ExoplanetError::ConfigError("ensemble has no members".to_string()));
        }
        if n_classes < 2 {
            return Err(ExoplanetError::TrainingError(format!(
                "need at least two classes, got {}",
                n_classes
            )));
        }

        let weights = self.config.class_weight.sample_weights(y, n_classes);
        let seed = self.config.random_state;
        info!(
            members = self.config.members.len(),
            rows = x.nrows(),
            features = x.ncols(),
            "Training classifier ensemble"
        );

        let fitted: Vec<(String, EnsembleMember, f64)> = self
            .config
            .members
            .par_iter()
            .map(|spec| {
                let start = Instant::now();
                let mut member = spec.build(n_classes, seed);
                member
                    .fit(x, y, weights.as_ref())
                    .map_err(|e| ExoplanetError::TrainingError(format!("{}: {}", spec.name, e)))?;
                let secs = start.elapsed().as_secs_f64();
                debug!(member = %spec.name, secs, "Member trained");
                Ok((spec.name.clone(), member, secs))
            })
            .collect::<Result<_>>()?;

        self.training_secs = fitted.iter().map(|(n, _, s)| (n.clone(), *s)).collect();
        self.members = fitted.into_iter().map(|(n, m, _)| (n, m)).collect();
        self.n_classes = n_classes;
        self.voter = VotingClassifier::new(self.config.voting, n_classes);
        self.is_fitted = true;
        Ok(())
    }

    /// Hard and (when available) soft outputs of every member
    pub fn member_outputs(&self, x: &Array2<f64>) -> Result<Vec<MemberOutput>> {
        if !self.is_fitted {
            return Err(ExoplanetError::ModelNotFitted);
        }
        self.members
            .iter()
            .map(|(name, member)| {
                let probabilities = member.as_probabilistic().map(|p| p.predict_proba(x)).transpose()?;
                let predictions = match &probabilities {
                    Some(p) => argmax_rows(p),
                    None => member.predict(x)?,
                };
                Ok(MemberOutput { name: name.clone(), predictions, probabilities })
            })
            .collect()
    }

    /// Combined distribution, labels, confidence, uncertainty and agreement
    pub fn predict_with_uncertainty(&self, x: &Array2<f64>) -> Result<EnsembleOutput> {
        let outputs = self.member_outputs(x)?;
        self.combine(&outputs)
    }

    /// Combine previously computed member outputs
    pub fn combine(&self, outputs: &[MemberOutput]) -> Result<EnsembleOutput> {
        let probas: Vec<Array2<f64>> = outputs.iter().filter_map(|o| o.probabilities.clone()).collect();
        let preds: Vec<Array1<usize>> = outputs.iter().map(|o| o.predictions.clone()).collect();

        let probabilities = self.voter.combine(&probas, &preds)?;
        let labels = self.voter.labels(&probabilities);
        let confidence: Array1<f64> = probabilities
            .rows()
            .into_iter()
            .map(|row| row.iter().cloned().fold(0.0, f64::max))
            .collect();
        let uncertainty: Array1<f64> = probabilities
            .rows()
            .into_iter()
            .map(|row| normalized_entropy(&row.to_vec()))
            .collect();

        Ok(EnsembleOutput {
            probabilities,
            labels,
            confidence,
            uncertainty,
            model_agreement: model_agreement(&preds),
        })
    }

    /// Combined class distribution
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        Ok(self.predict_with_uncertainty(x)?.probabilities)
    }

    /// Accuracy, per-class metrics and per-member accuracy on labeled data
    pub fn evaluate(&self, x: &Array2<f64>, y: &Array1<usize>) -> Result<EnsembleEvaluation> {
        let outputs = self.member_outputs(x)?;
        let combined = self.combine(&outputs)?;
        let metrics = ClassificationMetrics::compute(y, &combined.labels, self.n_classes);
        let member_accuracy = outputs
            .iter()
            .map(|o| (o.name.clone(), accuracy(y, &o.predictions)))
            .collect();
        Ok(EnsembleEvaluation { metrics, member_accuracy })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> (Array2<f64>, Array1<usize>) {
        let mut data = Vec::new();
        let mut labels = Vec::new();
        for i in 0..90 {
            let class = i % 3;
            let jitter = (i as f64 * 0.37).sin() * 0.3;
            data.push(class as f64 * 3.0 + jitter);
            data.push(-(class as f64) * 2.0 + jitter * 0.5);
            labels.push(class);
        }
        (Array2::from_shape_vec((90, 2), data).unwrap(), Array1::from_vec(labels))
    }

    #[test]
    fn test_fast_ensemble_fits_and_predicts() {
        let (x, y) = blobs();
        let mut ensemble = ExoplanetEnsemble::new(EnsembleConfig::fast());
        ensemble.fit(&x, &y, 3).unwrap();
        assert_eq!(ensemble.member_names().len(), 6);

        let out = ensemble.predict_with_uncertainty(&x).unwrap();
        for (i, row) in out.probabilities.rows().into_iter().enumerate() {
            assert!((row.sum() - 1.0).abs() < 1e-6);
            let max = row.iter().cloned().fold(0.0, f64::max);
            assert!((out.confidence[i] - max).abs() < 1e-12);
            assert!((0.0..=1.0).contains(&out.uncertainty[i]));
            assert!((0.0..=1.0).contains(&out.model_agreement[i]));
        }

        let eval = ensemble.evaluate(&x, &y).unwrap();
        assert!(eval.metrics.accuracy > 0.9);
        assert_eq!(eval.member_accuracy.len(), 6);
    }

    #[test]
    fn test_member_subset() {
        let config = EnsembleConfig::fast().with_members(&["random_forest", "logistic_regression"]);
        assert_eq!(config.members.len(), 2);
        let (x, y) = blobs();
        let mut ensemble = ExoplanetEnsemble::new(config);
        ensemble.fit(&x, &y, 3).unwrap();
        assert_eq!(ensemble.member_names(), vec!["random_forest", "logistic_regression"]);
    }

    #[test]
    fn test_unfitted_prediction_errors() {
        let ensemble = ExoplanetEnsemble::new(EnsembleConfig::fast());
        let x = Array2::zeros((1, 2));
        assert!(matches!(
            ensemble.predict_with_uncertainty(&x),
            Err(ExoplanetError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_empty_member_list_rejected() {
        let (x, y) = blobs();
        let mut ensemble = ExoplanetEnsemble::new(EnsembleConfig::fast().with_members(&[]));
        assert!(matches!(ensemble.fit(&x, &y, 3), Err(ExoplanetError::ConfigError(_))));
    }
}
