//! Random Forest implementation

use super::decision_tree::{Criterion, DecisionTree};
use super::models::{
    argmax_rows, check_xy, combine_weights, infer_n_classes, ClassWeight, Classifier,
    ProbabilisticClassifier, Regressor,
};
use crate::error::{ExoplanetError, Result};
use ndarray::{Array1, Array2};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Random Forest model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    /// Individual trees
    trees: Vec<DecisionTree>,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features drawn per split (sqrt by default)
    pub max_features: MaxFeatures,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Class reweighting (classification only)
    pub class_weight: ClassWeight,
    /// Random state
    pub random_state: Option<u64>,
    /// Is classification task
    is_classification: bool,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
    /// Number of features
    n_features: usize,
    n_classes: usize,
}

/// Strategy for max features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fraction of n_features
    Fraction(f64),
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new_classifier(100)
    }
}

impl RandomForest {
    /// Create a new classifier forest
    pub fn new_classifier(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            criterion: Criterion::Gini,
            class_weight: ClassWeight::Uniform,
            random_state: None,
            is_classification: true,
            feature_importances: None,
            n_features: 0,
            n_classes: 0,
        }
    }

    /// Create a new regressor forest
    pub fn new_regressor(n_estimators: usize) -> Self {
        Self {
            max_features: MaxFeatures::All,
            criterion: Criterion::MSE,
            is_classification: false,
            ..Self::new_classifier(n_estimators)
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set max features strategy
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_class_weight(mut self, class_weight: ClassWeight) -> Self {
        self.class_weight = class_weight;
        self
    }

    /// Fix the class count instead of inferring it from the labels
    pub fn with_n_classes(mut self, n_classes: usize) -> Self {
        self.n_classes = n_classes;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    fn compute_max_features(&self, n_features: usize) -> usize {
        match self.max_features {
            MaxFeatures::Sqrt => (n_features as f64).sqrt() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).ceil() as usize,
            MaxFeatures::Fixed(n) => n.min(n_features),
            MaxFeatures::All => n_features,
        }
        .max(1)
    }

    fn base_tree(&self, max_features: usize, seed: u64) -> DecisionTree {
        let mut tree = if self.is_classification {
            DecisionTree::new_classifier()
        } else {
            DecisionTree::new_regressor()
        };
        if let Some(d) = self.max_depth {
            tree = tree.with_max_depth(d);
        }
        tree.with_min_samples_split(self.min_samples_split)
            .with_min_samples_leaf(self.min_samples_leaf)
            .with_criterion(self.criterion)
            .with_max_features(max_features)
            .with_random_state(seed)
    }

    /// Bootstrap multiplicities for one tree; drawing with replacement is
    /// expressed as integer weights.
    fn bootstrap_weights(&self, rng: &mut ChaCha8Rng, n_samples: usize) -> Array1<f64> {
        let mut counts = Array1::zeros(n_samples);
        if self.bootstrap {
            for _ in 0..n_samples {
                counts[rng.gen_range(0..n_samples)] += 1.0;
            }
        } else {
            counts.fill(1.0);
        }
        counts
    }

    fn grow<F>(&mut self, x: &Array2<f64>, base_weights: Option<&Array1<f64>>, fit_tree: F) -> Result<()>
    where
        F: Fn(&mut DecisionTree, &Array1<f64>) -> Result<()> + Sync,
    {
        if self.n_estimators == 0 {
            return Err(ExoplanetError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "forest needs at least one tree".to_string(),
            });
        }
        let n_samples = x.nrows();
        self.n_features = x.ncols();
        let max_features = self.compute_max_features(self.n_features);
        let base_seed = self.random_state.unwrap_or(42);

        // Build trees in parallel
        let trees: Vec<DecisionTree> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                let boot = self.bootstrap_weights(&mut rng, n_samples);
                let weights = match base_weights {
                    Some(w) => &boot * w,
                    None => boot,
                };

                let mut tree = self.base_tree(max_features, seed);
                fit_tree(&mut tree, &weights)?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        self.trees = trees;
        self.compute_feature_importances();
        Ok(())
    }

    fn compute_feature_importances(&mut self) {
        if self.trees.is_empty() {
            return;
        }

        let mut total_importances = vec![0.0; self.n_features];
        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                for (i, &val) in imp.iter().enumerate() {
                    total_importances[i] += val;
                }
            }
        }

        let total: f64 = total_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut total_importances {
                *imp /= total;
            }
        }

        self.feature_importances = Some(Array1::from_vec(total_importances));
    }

    fn average_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(ExoplanetError::ModelNotFitted);
        }
        if !self.is_classification {
            return Err(ExoplanetError::ValidationError(
                "predict_proba is only available for classification".to_string(),
            ));
        }

        let per_tree: Vec<Array2<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict_proba(x))
            .collect::<Result<Vec<_>>>()?;

        let mut proba = Array2::zeros((x.nrows(), self.n_classes));
        for p in &per_tree {
            proba += p;
        }
        proba /= per_tree.len() as f64;
        Ok(proba)
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for RandomForest {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>, sample_weight: Option<&Array1<f64>>) -> Result<()> {
        if !self.is_classification {
            return Err(ExoplanetError::TrainingError("regression forest fitted with class labels".to_string()));
        }
        check_xy(x, y.len())?;
        if self.n_classes == 0 {
            self.n_classes = infer_n_classes(y);
        }
        let n_classes = self.n_classes;
        let class_weights = self.class_weight.sample_weights(y, n_classes);
        let weights = combine_weights(sample_weight, class_weights.as_ref());

        self.grow(x, weights.as_ref(), |tree, w| {
            tree.fit_classifier(x, y, Some(n_classes), Some(w)).map(|_| ())
        })
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        Ok(argmax_rows(&self.average_proba(x)?))
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn as_probabilistic(&self) -> Option<&dyn ProbabilisticClassifier> {
        Some(self)
    }
}

impl ProbabilisticClassifier for RandomForest {
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.average_proba(x)
    }
}

impl Regressor for RandomForest {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if self.is_classification {
            return Err(ExoplanetError::TrainingError("classification forest fitted with continuous targets".to_string()));
        }
        check_xy(x, y.len())?;
        self.grow(x, None, |tree, w| tree.fit_regressor(x, y, Some(w)).map(|_| ()))
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(ExoplanetError::ModelNotFitted);
        }
        let per_tree: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict_value(x))
            .collect::<Result<Vec<_>>>()?;

        let mut mean = Array1::zeros(x.nrows());
        for p in &per_tree {
            mean += p;
        }
        mean /= per_tree.len() as f64;
        Ok(mean)
    }
}
