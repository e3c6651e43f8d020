//! CART decision tree with weighted samples
//!
//! Splits are found by sorting the node's rows on each candidate feature and
//! sweeping left-to-right with running class weights (classification) or
//! running sums (regression).

use crate::error::{ExoplanetError, Result};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::models::infer_n_classes;

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf with a class distribution (classification) or a single mean (regression)
    Leaf {
        value: Vec<f64>,
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

impl TreeNode {
    fn leaf_value(&self, sample: &[f64]) -> &[f64] {
        match self {
            TreeNode::Leaf { value, .. } => value,
            TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                if sample[*feature_idx] <= *threshold {
                    left.leaf_value(sample)
                } else {
                    right.leaf_value(sample)
                }
            }
        }
    }
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Entropy (classification)
    Entropy,
    /// Mean squared error (regression)
    MSE,
}

/// Targets seen by the split search
enum Target<'a> {
    Class { y: &'a Array1<usize>, n_classes: usize },
    Value(&'a Array1<f64>),
}

/// Running statistics on one side of a split
#[derive(Clone)]
struct SideStats {
    weight: f64,
    count: usize,
    class_weights: Vec<f64>,
    sum: f64,
    sq_sum: f64,
}

impl SideStats {
    fn new(n_classes: usize) -> Self {
        Self {
            weight: 0.0,
            count: 0,
            class_weights: vec![0.0; n_classes],
            sum: 0.0,
            sq_sum: 0.0,
        }
    }

    fn add(&mut self, target: &Target<'_>, i: usize, w: f64) {
        self.weight += w;
        self.count += 1;
        match target {
            Target::Class { y, .. } => self.class_weights[y[i]] += w,
            Target::Value(y) => {
                self.sum += w * y[i];
                self.sq_sum += w * y[i] * y[i];
            }
        }
    }

    fn minus(&self, other: &SideStats) -> SideStats {
        SideStats {
            weight: self.weight - other.weight,
            count: self.count - other.count,
            class_weights: self
                .class_weights
                .iter()
                .zip(other.class_weights.iter())
                .map(|(a, b)| a - b)
                .collect(),
            sum: self.sum - other.sum,
            sq_sum: self.sq_sum - other.sq_sum,
        }
    }

    fn impurity(&self, criterion: Criterion) -> f64 {
        if self.weight <= 0.0 {
            return 0.0;
        }
        match criterion {
            Criterion::Gini => {
                1.0 - self
                    .class_weights
                    .iter()
                    .map(|c| (c / self.weight).powi(2))
                    .sum::<f64>()
            }
            Criterion::Entropy => -self
                .class_weights
                .iter()
                .filter(|&&c| c > 0.0)
                .map(|c| {
                    let p = c / self.weight;
                    p * p.ln()
                })
                .sum::<f64>(),
            Criterion::MSE => {
                let mean = self.sum / self.weight;
                (self.sq_sum / self.weight - mean * mean).max(0.0)
            }
        }
    }

    fn leaf_value(&self, target: &Target<'_>) -> Vec<f64> {
        match target {
            Target::Class { n_classes, .. } => {
                if self.weight > 0.0 {
                    self.class_weights.iter().map(|c| c / self.weight).collect()
                } else {
                    vec![1.0 / *n_classes as f64; *n_classes]
                }
            }
            Target::Value(_) => {
                vec![if self.weight > 0.0 { self.sum / self.weight } else { 0.0 }]
            }
        }
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Tree root
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features drawn at each node; `None` uses all
    pub max_features: Option<usize>,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Seed for the per-node feature draw
    pub random_state: Option<u64>,
    n_features: usize,
    n_classes: usize,
    feature_importances: Option<Array1<f64>>,
    is_classification: bool,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl DecisionTree {
    /// Create a new classifier tree
    pub fn new_classifier() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            random_state: None,
            n_features: 0,
            n_classes: 0,
            feature_importances: None,
            is_classification: true,
        }
    }

    /// Create a new regressor tree
    pub fn new_regressor() -> Self {
        Self {
            criterion: Criterion::MSE,
            is_classification: false,
            ..Self::new_classifier()
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

    /// Set features drawn per node
    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    /// Set criterion
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.root.is_some()
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Fit a classification tree. Rows with zero weight are ignored.
    pub fn fit_classifier(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<usize>,
        n_classes: Option<usize>,
        sample_weight: Option<&Array1<f64>>,
    ) -> Result<&mut Self> {
        if !self.is_classification {
            return Err(ExoplanetError::TrainingError("regressor tree fitted with class labels".to_string()));
        }
        let n_classes = n_classes.unwrap_or_else(|| infer_n_classes(y));
        if y.iter().any(|&c| c >= n_classes) {
            return Err(ExoplanetError::ValidationError(format!(
                "class label out of range for {} classes",
                n_classes
            )));
        }
        self.n_classes = n_classes;
        self.fit_target(x, y.len(), Target::Class { y, n_classes }, sample_weight)
    }

    /// Fit a regression tree
    pub fn fit_regressor(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        sample_weight: Option<&Array1<f64>>,
    ) -> Result<&mut Self> {
        if self.is_classification {
            return Err(ExoplanetError::TrainingError("classifier tree fitted with continuous targets".to_string()));
        }
        self.n_classes = 0;
        self.fit_target(x, y.len(), Target::Value(y), sample_weight)
    }

    fn fit_target(
        &mut self,
        x: &Array2<f64>,
        n_targets: usize,
        target: Target<'_>,
        sample_weight: Option<&Array1<f64>>,
    ) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != n_targets {
            return Err(ExoplanetError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", n_targets),
            });
        }
        let weights = match sample_weight {
            Some(w) if w.len() != n_samples => {
                return Err(ExoplanetError::ShapeError {
                    expected: format!("sample_weight length = {}", n_samples),
                    actual: format!("sample_weight length = {}", w.len()),
                })
            }
            Some(w) => w.clone(),
            None => Array1::ones(n_samples),
        };

        let indices: Vec<usize> = (0..n_samples).filter(|&i| weights[i] > 0.0).collect();
        if indices.is_empty() {
            return Err(ExoplanetError::ValidationError("no rows with positive weight".to_string()));
        }

        self.n_features = n_features;
        let mut rng = match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let mut importances = vec![0.0; n_features];
        let root = self.build_tree(x, &target, &weights, &indices, 0, &mut importances, &mut rng);
        self.root = Some(root);

        // Normalize feature importances
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    fn node_stats(&self, target: &Target<'_>, weights: &Array1<f64>, indices: &[usize]) -> SideStats {
        let mut stats = SideStats::new(self.n_classes);
        for &i in indices {
            stats.add(target, i, weights[i]);
        }
        stats
    }

    #[allow(clippy::too_many_arguments)]
    fn build_tree(
        &self,
        x: &Array2<f64>,
        target: &Target<'_>,
        weights: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let stats = self.node_stats(target, weights, indices);
        let impurity = stats.impurity(self.criterion);

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || impurity <= 1e-12;

        if should_stop {
            return TreeNode::Leaf {
                value: stats.leaf_value(target),
                n_samples,
            };
        }

        let features = self.draw_features(rng);
        let best = self.find_best_split(x, target, weights, indices, &stats, impurity, &features);

        let Some(split) = best else {
            return TreeNode::Leaf {
                value: stats.leaf_value(target),
                n_samples,
            };
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, split.feature]] <= split.threshold);

        if left_indices.is_empty() || right_indices.is_empty() {
            return TreeNode::Leaf {
                value: stats.leaf_value(target),
                n_samples,
            };
        }

        importances[split.feature] += stats.weight * split.gain;

        let left = Box::new(self.build_tree(x, target, weights, &left_indices, depth + 1, importances, rng));
        let right = Box::new(self.build_tree(x, target, weights, &right_indices, depth + 1, importances, rng));

        TreeNode::Split {
            feature_idx: split.feature,
            threshold: split.threshold,
            left,
            right,
            n_samples,
            impurity,
        }
    }

    fn draw_features(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let k = self.max_features.unwrap_or(self.n_features).clamp(1, self.n_features.max(1));
        if k >= self.n_features {
            return (0..self.n_features).collect();
        }
        let mut features = rand::seq::index::sample(rng, self.n_features, k).into_vec();
        features.sort_unstable();
        features
    }

    #[allow(clippy::too_many_arguments)]
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        target: &Target<'_>,
        weights: &Array1<f64>,
        indices: &[usize],
        total: &SideStats,
        parent_impurity: f64,
        features: &[usize],
    ) -> Option<SplitCandidate> {
        // Each feature is scanned independently
        let candidates: Vec<Option<SplitCandidate>> = features
            .par_iter()
            .map(|&feature| {
                let mut sorted: Vec<usize> = indices.to_vec();
                sorted.sort_by(|&a, &b| {
                    x[[a, feature]]
                        .partial_cmp(&x[[b, feature]])
                        .unwrap_or(std::cmp::Ordering::Equal)
                });

                let mut left = SideStats::new(self.n_classes);
                let mut best: Option<SplitCandidate> = None;

                for pos in 0..sorted.len().saturating_sub(1) {
                    let idx = sorted[pos];
                    left.add(target, idx, weights[idx]);

                    let here = x[[idx, feature]];
                    let next = x[[sorted[pos + 1], feature]];
                    if next - here <= 1e-12 {
                        continue;
                    }
                    let right_count = sorted.len() - left.count;
                    if left.count < self.min_samples_leaf || right_count < self.min_samples_leaf {
                        continue;
                    }

                    let right = total.minus(&left);
                    let child = (left.weight * left.impurity(self.criterion)
                        + right.weight * right.impurity(self.criterion))
                        / total.weight;
                    let gain = parent_impurity - child;

                    if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                        best = Some(SplitCandidate {
                            feature,
                            threshold: (here + next) / 2.0,
                            gain,
                        });
                    }
                }
                best
            })
            .collect();

        // Best across features; ties keep the lowest feature index
        candidates
            .into_iter()
            .flatten()
            .fold(None, |acc: Option<SplitCandidate>, c| match acc {
                Some(a) if a.gain >= c.gain => Some(a),
                _ => Some(c),
            })
    }

    fn root(&self) -> Result<&TreeNode> {
        self.root.as_ref().ok_or(ExoplanetError::ModelNotFitted)
    }

    fn check_width(&self, x: &Array2<f64>) -> Result<()> {
        if x.ncols() != self.n_features {
            return Err(ExoplanetError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(())
    }

    /// Class distribution per row (classification trees)
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let root = self.root()?;
        if !self.is_classification {
            return Err(ExoplanetError::InferenceError("regression tree has no class distribution".to_string()));
        }
        self.check_width(x)?;

        let mut out = Array2::zeros((x.nrows(), self.n_classes));
        for (i, row) in x.rows().into_iter().enumerate() {
            let sample = row.to_vec();
            for (k, &p) in root.leaf_value(&sample).iter().enumerate() {
                out[[i, k]] = p;
            }
        }
        Ok(out)
    }

    /// Predicted value per row (regression trees)
    pub fn predict_value(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root()?;
        if self.is_classification {
            return Err(ExoplanetError::InferenceError("classification tree has no scalar output".to_string()));
        }
        self.check_width(x)?;

        Ok(x.rows()
            .into_iter()
            .map(|row| root.leaf_value(&row.to_vec())[0])
            .collect())
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Number of split levels on the longest root-to-leaf path
    pub fn get_depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        self.root.as_ref().map_or(0, depth)
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        fn leaves(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => leaves(left) + leaves(right),
            }
        }
        self.root.as_ref().map_or(0, leaves)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_separates_three_classes() {
        let x = array![[0.0], [0.1], [0.2], [1.0], [1.1], [1.2], [2.0], [2.1], [2.2]];
        let y = array![0usize, 0, 0, 1, 1, 1, 2, 2, 2];

        let mut tree = DecisionTree::new_classifier();
        tree.fit_classifier(&x, &y, None, None).unwrap();

        let proba = tree.predict_proba(&x).unwrap();
        assert_eq!(proba.ncols(), 3);
        for (i, &c) in y.iter().enumerate() {
            assert_eq!(proba[[i, c]], 1.0);
        }
    }

    #[test]
    fn test_sample_weights_shift_leaf_distribution() {
        let x = array![[0.0], [0.0], [0.0]];
        let y = array![0usize, 1, 1];
        let w = array![4.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit_classifier(&x, &y, Some(2), Some(&w)).unwrap();
        let proba = tree.predict_proba(&array![[0.0]]).unwrap();
        assert!((proba[[0, 0]] - 4.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_regressor_simple() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let mut tree = DecisionTree::new_regressor();
        tree.fit_regressor(&x, &y, None).unwrap();

        let predictions = tree.predict_value(&x).unwrap();
        let mse: f64 = predictions
            .iter()
            .zip(y.iter())
            .map(|(p, a)| (p - a).powi(2))
            .sum::<f64>()
            / y.len() as f64;
        assert!(mse < 1e-12, "MSE too high: {}", mse);
    }

    #[test]
    fn test_max_depth() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![0usize, 1, 0, 1];

        let mut tree = DecisionTree::new_classifier().with_max_depth(2);
        tree.fit_classifier(&x, &y, None, None).unwrap();
        assert!(tree.get_depth() <= 2);
    }

    #[test]
    fn test_min_samples_leaf_respected() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![0usize, 1, 1, 1];

        let mut tree = DecisionTree::new_classifier().with_min_samples_leaf(2);
        tree.fit_classifier(&x, &y, None, None).unwrap();
        assert!(tree.get_n_leaves() <= 2);
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0usize, 0, 1, 1];

        let mut tree = DecisionTree::new_classifier();
        tree.fit_classifier(&x, &y, None, None).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert_eq!(importances[0], 1.0);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_unfitted_and_wrong_width() {
        let tree = DecisionTree::new_classifier();
        assert!(matches!(tree.predict_proba(&array![[1.0]]), Err(ExoplanetError::ModelNotFitted)));

        let mut tree = DecisionTree::new_classifier();
        tree.fit_classifier(&array![[1.0], [2.0]], &array![0usize, 1], None, None).unwrap();
        assert!(tree.predict_proba(&array![[1.0, 2.0]]).is_err());
    }
}
