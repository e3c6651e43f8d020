//! Model traits and evaluation metrics

use crate::error::{ExoplanetError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Hard-label classifier over integer class indices `0..n_classes`
pub trait Classifier: Send + Sync {
    /// Fit the model. `sample_weight`, when given, has one entry per row.
    fn fit(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<usize>,
        sample_weight: Option<&Array1<f64>>,
    ) -> Result<()>;

    /// Predict class indices
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>>;

    /// Number of classes the model emits
    fn n_classes(&self) -> usize;

    /// Probability capability, if the model has one
    fn as_probabilistic(&self) -> Option<&dyn ProbabilisticClassifier> {
        None
    }
}

/// Classifier that also produces a class distribution per row
pub trait ProbabilisticClassifier: Classifier {
    /// Row-stochastic matrix of shape (n_rows, n_classes)
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>>;
}

/// Single-target regressor
pub trait Regressor: Send + Sync {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;
}

/// Check that x and y agree on the row count and that x is non-empty
pub fn check_xy(x: &Array2<f64>, n_targets: usize) -> Result<()> {
    if x.nrows() != n_targets {
        return Err(ExoplanetError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", n_targets),
        });
    }
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(ExoplanetError::TrainingError("empty training matrix".to_string()));
    }
    Ok(())
}

/// `max(y) + 1`, or 0 for empty labels
pub fn infer_n_classes(y: &Array1<usize>) -> usize {
    y.iter().max().map_or(0, |&m| m + 1)
}

/// Per-class reweighting applied on top of any sample weights
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassWeight {
    #[default]
    Uniform,
    /// Inverse class frequency
    Balanced,
}

impl ClassWeight {
    /// Row weights for `y`, `None` when uniform
    pub fn sample_weights(&self, y: &Array1<usize>, n_classes: usize) -> Option<Array1<f64>> {
        match self {
            ClassWeight::Uniform => None,
            ClassWeight::Balanced => {
                Some(class_sample_weights(y, &balanced_class_weights(y, n_classes)))
            }
        }
    }
}

/// Inverse-frequency class weights: `n / (n_present * count_c)`; absent classes get 0.
pub fn balanced_class_weights(y: &Array1<usize>, n_classes: usize) -> Vec<f64> {
    let mut counts = vec![0usize; n_classes];
    for &c in y.iter() {
        if c < n_classes {
            counts[c] += 1;
        }
    }
    let present = counts.iter().filter(|&&c| c > 0).count().max(1) as f64;
    let n = y.len() as f64;
    counts
        .iter()
        .map(|&c| if c > 0 { n / (present * c as f64) } else { 0.0 })
        .collect()
}

/// Per-row weights from per-class weights
pub fn class_sample_weights(y: &Array1<usize>, class_weights: &[f64]) -> Array1<f64> {
    y.mapv(|c| class_weights.get(c).copied().unwrap_or(1.0))
}

/// Multiply two optional weight vectors
pub fn combine_weights(a: Option<&Array1<f64>>, b: Option<&Array1<f64>>) -> Option<Array1<f64>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a * b),
        (Some(a), None) => Some(a.clone()),
        (None, Some(b)) => Some(b.clone()),
        (None, None) => None,
    }
}

/// Index of the largest value per row; ties go to the lowest index
pub fn argmax_rows(probs: &Array2<f64>) -> Array1<usize> {
    probs
        .axis_iter(Axis(0))
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0usize, f64::NEG_INFINITY), |(bi, bv), (i, &v)| {
                    if v > bv { (i, v) } else { (bi, bv) }
                })
                .0
        })
        .collect()
}

/// Numerically stable softmax over a slice of scores
pub fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Precision, recall and F1 of one class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Multiclass evaluation of hard predictions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub per_class: Vec<ClassMetrics>,
    pub macro_f1: f64,
    pub weighted_f1: f64,
    /// `confusion_matrix[true][predicted]`
    pub confusion_matrix: Vec<Vec<usize>>,
    pub n_samples: usize,
}

impl ClassificationMetrics {
    pub fn compute(y_true: &Array1<usize>, y_pred: &Array1<usize>, n_classes: usize) -> Self {
        let n = y_true.len();
        let mut confusion = vec![vec![0usize; n_classes]; n_classes];
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            if t < n_classes && p < n_classes {
                confusion[t][p] += 1;
            }
        }

        let correct: usize = (0..n_classes).map(|c| confusion[c][c]).sum();
        let accuracy = if n > 0 { correct as f64 / n as f64 } else { 0.0 };

        let per_class: Vec<ClassMetrics> = (0..n_classes)
            .map(|c| {
                let tp = confusion[c][c] as f64;
                let predicted: usize = (0..n_classes).map(|t| confusion[t][c]).sum();
                let support: usize = confusion[c].iter().sum();
                let precision = if predicted > 0 { tp / predicted as f64 } else { 0.0 };
                let recall = if support > 0 { tp / support as f64 } else { 0.0 };
                let f1_score = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics { precision, recall, f1_score, support }
            })
            .collect();

        let macro_f1 = if n_classes > 0 {
            per_class.iter().map(|m| m.f1_score).sum::<f64>() / n_classes as f64
        } else {
            0.0
        };
        let weighted_f1 = if n > 0 {
            per_class.iter().map(|m| m.f1_score * m.support as f64).sum::<f64>() / n as f64
        } else {
            0.0
        };

        Self {
            accuracy,
            per_class,
            macro_f1,
            weighted_f1,
            confusion_matrix: confusion,
            n_samples: n,
        }
    }
}

/// Fraction of matching labels
pub fn accuracy(y_true: &Array1<usize>, y_pred: &Array1<usize>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true.iter().zip(y_pred.iter()).filter(|(t, p)| t == p).count();
    correct as f64 / y_true.len() as f64
}

/// Regression error summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mae: f64,
    pub rmse: f64,
    /// Mean absolute percentage error over non-zero targets
    pub mape: Option<f64>,
    pub r2: f64,
    pub n_samples: usize,
}

impl RegressionMetrics {
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let n = y_true.len() as f64;
        if y_true.is_empty() {
            return Self { mae: 0.0, rmse: 0.0, mape: None, r2: 0.0, n_samples: 0 };
        }
        let errors: Vec<f64> = y_true.iter().zip(y_pred.iter()).map(|(t, p)| t - p).collect();

        let mse: f64 = errors.iter().map(|e| e * e).sum::<f64>() / n;
        let mae: f64 = errors.iter().map(|e| e.abs()).sum::<f64>() / n;

        let pct: Vec<f64> = y_true
            .iter()
            .zip(errors.iter())
            .filter(|(t, _)| **t != 0.0)
            .map(|(t, e)| (e / t).abs())
            .collect();
        let mape = if pct.is_empty() {
            None
        } else {
            Some(pct.iter().sum::<f64>() / pct.len() as f64 * 100.0)
        };

        let y_mean: f64 = y_true.iter().sum::<f64>() / n;
        let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
        let ss_res: f64 = errors.iter().map(|e| e.powi(2)).sum();
        let r2 = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

        Self {
            mae,
            rmse: mse.sqrt(),
            mape,
            r2,
            n_samples: y_true.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classification_metrics() {
        let y_true = array![0usize, 0, 1, 1, 2, 2, 2, 1];
        let y_pred = array![0usize, 1, 1, 1, 2, 2, 0, 1];

        let metrics = ClassificationMetrics::compute(&y_true, &y_pred, 3);
        assert!((metrics.accuracy - 0.75).abs() < 1e-12);
        assert_eq!(metrics.confusion_matrix[2][0], 1);
        assert_eq!(metrics.per_class[1].support, 3);
        assert!((metrics.per_class[1].recall - 1.0).abs() < 1e-12);
        assert!((metrics.per_class[1].precision - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_regression_metrics() {
        let y_true = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let y_pred = array![1.1, 2.0, 2.9, 4.1, 5.0];

        let metrics = RegressionMetrics::compute(&y_true, &y_pred);
        assert!(metrics.r2 > 0.9);
        assert!((metrics.mae - 0.06).abs() < 1e-9);
        assert!(metrics.mape.is_some());
    }

    #[test]
    fn test_mape_skips_zero_targets() {
        let metrics = RegressionMetrics::compute(&array![0.0, 2.0], &array![1.0, 1.0]);
        assert!((metrics.mape.unwrap() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_balanced_class_weights() {
        let y = array![0usize, 0, 0, 1];
        let w = balanced_class_weights(&y, 3);
        assert!((w[0] - 4.0 / 6.0).abs() < 1e-12);
        assert!((w[1] - 2.0).abs() < 1e-12);
        assert_eq!(w[2], 0.0);
    }

    #[test]
    fn test_argmax_and_softmax() {
        let probs = array![[0.2, 0.5, 0.3], [0.4, 0.4, 0.2]];
        assert_eq!(argmax_rows(&probs), array![1usize, 0]);

        let s = softmax(&[1.0, 1.0, 1.0]);
        assert!(s.iter().all(|p| (p - 1.0 / 3.0).abs() < 1e-12));
    }
}
