//! Gradient Boosting implementation
//!
//! Regression trees fitted to residuals. The classifier boosts one tree per
//! class per round on the softmax residuals `y_onehot - p`.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use super::decision_tree::DecisionTree;
use super::models::{
    argmax_rows, check_xy, infer_n_classes, softmax, Classifier, ProbabilisticClassifier, Regressor,
};
use crate::error::{ExoplanetError, Result};

/// Gradient Boosting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples to split a node
    pub min_samples_split: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Row subsample ratio for each round
    pub subsample: f64,
    /// Column subsample ratio for each round
    pub colsample_bytree: f64,
    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
            subsample: 1.0,
            colsample_bytree: 1.0,
            random_state: Some(42),
        }
    }
}

impl GradientBoostingConfig {
    fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 || !(self.learning_rate > 0.0) {
            return Err(ExoplanetError::InvalidParameter {
                name: "n_estimators/learning_rate".to_string(),
                value: format!("{}/{}", self.n_estimators, self.learning_rate),
                reason: "both must be positive".to_string(),
            });
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(ExoplanetError::InvalidParameter {
                name: "subsample".to_string(),
                value: self.subsample.to_string(),
                reason: "must be in (0, 1]".to_string(),
            });
        }
        Ok(())
    }

    fn rng(&self) -> Xoshiro256PlusPlus {
        match self.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        }
    }

    fn tree(&self) -> DecisionTree {
        DecisionTree::new_regressor()
            .with_max_depth(self.max_depth)
            .with_min_samples_split(self.min_samples_split)
            .with_min_samples_leaf(self.min_samples_leaf)
    }

    /// Row mask for one round: 1.0 for sampled rows, 0.0 otherwise
    fn subsample_mask(&self, n: usize, rng: &mut Xoshiro256PlusPlus) -> Array1<f64> {
        if self.subsample >= 1.0 {
            return Array1::ones(n);
        }
        let sample_size = (((n as f64) * self.subsample).ceil() as usize).max(1);
        let mut mask = Array1::zeros(n);
        for i in rand::seq::index::sample(rng, n, sample_size).into_iter() {
            mask[i] = 1.0;
        }
        mask
    }

    fn colsample_indices(&self, n: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        if self.colsample_bytree >= 1.0 {
            return (0..n).collect();
        }
        let sample_size = (((n as f64) * self.colsample_bytree).ceil() as usize).max(1);
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(rng);
        indices.truncate(sample_size);
        indices.sort();
        indices
    }
}

fn accumulate_importances(acc: &mut [f64], tree: &DecisionTree, col_indices: &[usize]) {
    if let Some(tree_importance) = tree.feature_importances() {
        for (j, &col_idx) in col_indices.iter().enumerate() {
            acc[col_idx] += tree_importance[j];
        }
    }
}

fn normalize(values: &mut [f64]) {
    let total: f64 = values.iter().sum();
    if total > 0.0 {
        for v in values.iter_mut() {
            *v /= total;
        }
    }
}

/// Gradient Boosting Regressor (squared error)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    config: GradientBoostingConfig,
    trees: Vec<DecisionTree>,
    col_indices_per_tree: Vec<Vec<usize>>,
    initial_prediction: f64,
    feature_importances: Vec<f64>,
}

impl GradientBoostingRegressor {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            col_indices_per_tree: Vec::new(),
            initial_prediction: 0.0,
            feature_importances: Vec::new(),
        }
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }
}

impl Regressor for GradientBoostingRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.config.validate()?;
        check_xy(x, y.len())?;
        let n_samples = x.nrows();
        let n_features = x.ncols();

        self.initial_prediction = y.mean().unwrap_or(0.0);
        let mut predictions = Array1::from_elem(n_samples, self.initial_prediction);

        let mut rng = self.config.rng();
        self.trees.clear();
        self.col_indices_per_tree.clear();
        self.feature_importances = vec![0.0; n_features];

        for _ in 0..self.config.n_estimators {
            let residuals: Array1<f64> = y - &predictions;

            let mask = self.config.subsample_mask(n_samples, &mut rng);
            let col_indices = self.config.colsample_indices(n_features, &mut rng);
            let x_sub = x.select(Axis(1), &col_indices);

            let mut tree = self.config.tree();
            tree.fit_regressor(&x_sub, &residuals, Some(&mask))?;

            let tree_pred = tree.predict_value(&x_sub)?;
            predictions.scaled_add(self.config.learning_rate, &tree_pred);

            accumulate_importances(&mut self.feature_importances, &tree, &col_indices);
            self.trees.push(tree);
            self.col_indices_per_tree.push(col_indices);
        }

        normalize(&mut self.feature_importances);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(ExoplanetError::ModelNotFitted);
        }
        let mut predictions = Array1::from_elem(x.nrows(), self.initial_prediction);
        for (tree, col_indices) in self.trees.iter().zip(self.col_indices_per_tree.iter()) {
            let x_sub = x.select(Axis(1), col_indices);
            predictions.scaled_add(self.config.learning_rate, &tree.predict_value(&x_sub)?);
        }
        Ok(predictions)
    }
}

/// Gradient Boosting Classifier (multinomial deviance)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    config: GradientBoostingConfig,
    /// `rounds[r][k]` is the tree for class k in round r
    rounds: Vec<Vec<DecisionTree>>,
    col_indices_per_round: Vec<Vec<usize>>,
    initial_scores: Vec<f64>,
    n_classes: usize,
    feature_importances: Vec<f64>,
}

impl GradientBoostingClassifier {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            rounds: Vec::new(),
            col_indices_per_round: Vec::new(),
            initial_scores: Vec::new(),
            n_classes: 0,
            feature_importances: Vec::new(),
        }
    }

    /// Fix the class count instead of inferring it from the labels
    pub fn with_n_classes(mut self, n_classes: usize) -> Self {
        self.n_classes = n_classes;
        self
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    fn raw_scores(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.rounds.is_empty() {
            return Err(ExoplanetError::ModelNotFitted);
        }
        let n = x.nrows();
        let mut scores = Array2::zeros((n, self.n_classes));
        for (k, &s) in self.initial_scores.iter().enumerate() {
            scores.column_mut(k).fill(s);
        }
        for (trees, col_indices) in self.rounds.iter().zip(self.col_indices_per_round.iter()) {
            let x_sub = x.select(Axis(1), col_indices);
            for (k, tree) in trees.iter().enumerate() {
                let pred = tree.predict_value(&x_sub)?;
                scores.column_mut(k).scaled_add(self.config.learning_rate, &pred);
            }
        }
        Ok(scores)
    }
}

/// Row-wise softmax of raw class scores
pub(crate) fn softmax_rows(scores: &Array2<f64>) -> Array2<f64> {
    let mut probs = scores.clone();
    for mut row in probs.rows_mut() {
        let p = softmax(&row.to_vec());
        row.assign(&Array1::from_vec(p));
    }
    probs
}

/// Log of the weighted class priors, floored to avoid `ln(0)`
pub(crate) fn log_priors(y: &Array1<usize>, weights: &Array1<f64>, n_classes: usize) -> Vec<f64> {
    let mut totals = vec![0.0; n_classes];
    for (&c, &w) in y.iter().zip(weights.iter()) {
        totals[c] += w;
    }
    let sum: f64 = totals.iter().sum();
    totals
        .iter()
        .map(|t| (t / sum).clamp(1e-7, 1.0).ln())
        .collect()
}

impl Classifier for GradientBoostingClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>, sample_weight: Option<&Array1<f64>>) -> Result<()> {
        self.config.validate()?;
        check_xy(x, y.len())?;
        let n_samples = x.nrows();
        let n_features = x.ncols();
        if self.n_classes == 0 {
            self.n_classes = infer_n_classes(y);
        }
        let n_classes = self.n_classes;

        let weights = sample_weight.cloned().unwrap_or_else(|| Array1::ones(n_samples));
        self.initial_scores = log_priors(y, &weights, n_classes);

        let mut scores = Array2::zeros((n_samples, n_classes));
        for (k, &s) in self.initial_scores.iter().enumerate() {
            scores.column_mut(k).fill(s);
        }

        let mut rng = self.config.rng();
        self.rounds.clear();
        self.col_indices_per_round.clear();
        self.feature_importances = vec![0.0; n_features];

        for _ in 0..self.config.n_estimators {
            let probs = softmax_rows(&scores);
            let mask = self.config.subsample_mask(n_samples, &mut rng);
            let round_weights = &mask * &weights;
            let col_indices = self.config.colsample_indices(n_features, &mut rng);
            let x_sub = x.select(Axis(1), &col_indices);

            let mut trees = Vec::with_capacity(n_classes);
            for k in 0..n_classes {
                let residuals: Array1<f64> = (0..n_samples)
                    .map(|i| (if y[i] == k { 1.0 } else { 0.0 }) - probs[[i, k]])
                    .collect();

                let mut tree = self.config.tree();
                tree.fit_regressor(&x_sub, &residuals, Some(&round_weights))?;
                let pred = tree.predict_value(&x_sub)?;
                scores.column_mut(k).scaled_add(self.config.learning_rate, &pred);

                accumulate_importances(&mut self.feature_importances, &tree, &col_indices);
                trees.push(tree);
            }

            self.rounds.push(trees);
            self.col_indices_per_round.push(col_indices);
        }

        normalize(&mut self.feature_importances);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        Ok(argmax_rows(&self.predict_proba(x)?))
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn as_probabilistic(&self) -> Option<&dyn ProbabilisticClassifier> {
        Some(self)
    }
}

impl ProbabilisticClassifier for GradientBoostingClassifier {
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        Ok(softmax_rows(&self.raw_scores(x)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::models::accuracy;

    fn create_regression_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec((100, 2), (0..200).map(|i| i as f64 * 0.1).collect()).unwrap();
        let y: Array1<f64> = x
            .rows()
            .into_iter()
            .map(|row| row[0] * 2.0 + row[1] * 0.5 + 1.0)
            .collect();
        (x, y)
    }

    fn create_classification_data() -> (Array2<f64>, Array1<usize>) {
        let x = Array2::from_shape_vec((90, 2), (0..180).map(|i| i as f64 * 0.1).collect()).unwrap();
        let y: Array1<usize> = x
            .rows()
            .into_iter()
            .map(|row| {
                let s = row[0] + row[1];
                if s < 6.0 {
                    0
                } else if s < 12.0 {
                    1
                } else {
                    2
                }
            })
            .collect();
        (x, y)
    }

    #[test]
    fn test_gradient_boosting_regressor() {
        let (x, y) = create_regression_data();
        let config = GradientBoostingConfig {
            n_estimators: 20,
            max_depth: 3,
            learning_rate: 0.1,
            ..Default::default()
        };

        let mut model = GradientBoostingRegressor::new(config);
        Regressor::fit(&mut model, &x, &y).unwrap();

        let predictions = Regressor::predict(&model, &x).unwrap();
        assert_eq!(predictions.len(), 100);

        let mse: f64 = y
            .iter()
            .zip(predictions.iter())
            .map(|(yi, pi)| (yi - pi).powi(2))
            .sum::<f64>()
            / y.len() as f64;
        let y_var = y.var(0.0);
        assert!(mse < y_var, "MSE ({}) should be less than variance ({})", mse, y_var);
    }

    #[test]
    fn test_gradient_boosting_classifier_multiclass() {
        let (x, y) = create_classification_data();
        let config = GradientBoostingConfig {
            n_estimators: 20,
            max_depth: 3,
            learning_rate: 0.2,
            subsample: 0.8,
            ..Default::default()
        };

        let mut model = GradientBoostingClassifier::new(config);
        Classifier::fit(&mut model, &x, &y, None).unwrap();

        let predictions = Classifier::predict(&model, &x).unwrap();
        let acc = accuracy(&y, &predictions);
        assert!(acc > 0.9, "Accuracy ({}) should be above 90%", acc);

        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.ncols(), 3);
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_feature_importances() {
        let (x, y) = create_regression_data();
        let mut model = GradientBoostingRegressor::new(GradientBoostingConfig {
            n_estimators: 10,
            ..Default::default()
        });
        Regressor::fit(&mut model, &x, &y).unwrap();

        let importances = model.feature_importances();
        assert_eq!(importances.len(), 2);
        let sum: f64 = importances.iter().sum();
        assert!((sum - 1.0).abs() < 0.01, "Sum of importances ({}) should be ~1", sum);
    }

    #[test]
    fn test_unfitted_classifier() {
        let model = GradientBoostingClassifier::new(Default::default());
        let x = Array2::zeros((1, 2));
        assert!(matches!(model.predict_proba(&x), Err(ExoplanetError::ModelNotFitted)));
    }
}
