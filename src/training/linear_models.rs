//! Linear models
//!
//! Multinomial logistic regression fitted by full-batch gradient descent on
//! the weighted cross-entropy with an L2 penalty parameterized by inverse
//! regularization strength `C`.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use super::models::{
    argmax_rows, check_xy, infer_n_classes, Classifier, ClassWeight, ProbabilisticClassifier,
    combine_weights,
};
use crate::error::{ExoplanetError, Result};

/// Multinomial logistic regression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Fitted coefficients, shape (n_features, n_classes)
    pub coefficients: Option<Array2<f64>>,
    /// Fitted intercepts, one per class
    pub intercept: Option<Array1<f64>>,
    /// Inverse L2 regularization strength
    pub c: f64,
    pub class_weight: ClassWeight,
    pub max_iter: usize,
    /// Stop when the gradient norm drops below this
    pub tol: f64,
    pub learning_rate: f64,
    n_classes: usize,
    n_iter: usize,
    pub is_fitted: bool,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            c: 1.0,
            class_weight: ClassWeight::Uniform,
            max_iter: 1000,
            tol: 1e-6,
            learning_rate: 0.5,
            n_classes: 0,
            n_iter: 0,
            is_fitted: false,
        }
    }

    /// Set inverse regularization strength
    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_class_weight(mut self, class_weight: ClassWeight) -> Self {
        self.class_weight = class_weight;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Fix the class count instead of inferring it from the labels
    pub fn with_n_classes(mut self, n_classes: usize) -> Self {
        self.n_classes = n_classes;
        self
    }

    /// Gradient steps taken by the last `fit`
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    fn softmax_scores(x: &Array2<f64>, w: &Array2<f64>, b: &Array1<f64>) -> Array2<f64> {
        let mut z = x.dot(w) + b;
        for mut row in z.rows_mut() {
            let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            row.mapv_inplace(|v| (v - max).exp());
            let sum = row.sum();
            row.mapv_inplace(|v| v / sum);
        }
        z
    }
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>, sample_weight: Option<&Array1<f64>>) -> Result<()> {
        check_xy(x, y.len())?;
        if !(self.c > 0.0) {
            return Err(ExoplanetError::InvalidParameter {
                name: "C".to_string(),
                value: self.c.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        let n_samples = x.nrows();
        let n_features = x.ncols();
        if self.n_classes == 0 {
            self.n_classes = infer_n_classes(y);
        }
        let k = self.n_classes;

        let class_w = self.class_weight.sample_weights(y, k);
        let weights = combine_weights(sample_weight, class_w.as_ref()).unwrap_or_else(|| Array1::ones(n_samples));
        let total_weight = weights.sum().max(1e-12);

        let mut onehot = Array2::<f64>::zeros((n_samples, k));
        for (i, &c) in y.iter().enumerate() {
            if c < k {
                onehot[[i, c]] = 1.0;
            }
        }

        let mut w = Array2::<f64>::zeros((n_features, k));
        let mut b = Array1::<f64>::zeros(k);
        let l2 = 1.0 / (self.c * total_weight);
        let lr = self.learning_rate;
        let row_w = weights.view().insert_axis(Axis(1));

        self.n_iter = 0;
        for iter in 0..self.max_iter {
            let probs = Self::softmax_scores(x, &w, &b);
            let errors = (&probs - &onehot) * &row_w / total_weight;

            let dw = x.t().dot(&errors) + &w * l2;
            let db = errors.sum_axis(Axis(0));

            self.n_iter = iter + 1;
            let grad_norm = (dw.mapv(|v| v * v).sum() + db.mapv(|v| v * v).sum()).sqrt();
            if grad_norm < self.tol {
                break;
            }

            w = w - lr * dw;
            b = b - lr * db;
        }

        self.coefficients = Some(w);
        self.intercept = Some(b);
        self.is_fitted = true;
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

impl ProbabilisticClassifier for LogisticRegression {
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        match (&self.coefficients, &self.intercept) {
            (Some(w), Some(b)) if self.is_fitted => {
                if x.ncols() != w.nrows() {
                    return Err(ExoplanetError::ShapeError {
                        expected: format!("{} features", w.nrows()),
                        actual: format!("{} features", x.ncols()),
                    });
                }
                Ok(Self::softmax_scores(x, w, b))
            }
            _ => Err(ExoplanetError::ModelNotFitted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::models::accuracy;
    use ndarray::array;

    #[test]
    fn test_logistic_regression() {
        let x = array![
            [1.0, 1.0],
            [1.5, 1.5],
            [2.0, 2.0],
            [5.0, 5.0],
            [5.5, 5.5],
            [6.0, 6.0],
            [9.0, 1.0],
            [9.5, 0.5],
            [10.0, 1.5],
        ];
        let y = array![0usize, 0, 0, 1, 1, 1, 2, 2, 2];

        let mut model = LogisticRegression::new().with_max_iter(2000).with_learning_rate(0.1);
        model.fit(&x, &y, None).unwrap();
        assert!(model.is_fitted);

        let acc = accuracy(&y, &model.predict(&x).unwrap());
        assert!(acc >= 0.8, "Accuracy should be >= 0.8, got {}", acc);
    }

    #[test]
    fn test_predict_proba() {
        let x = array![[0.0, 0.0], [10.0, 10.0]];
        let y = array![0usize, 1];

        let mut model = LogisticRegression::new().with_max_iter(500).with_learning_rate(0.1);
        model.fit(&x, &y, None).unwrap();

        let proba = model.predict_proba(&x).unwrap();
        assert!(proba[[0, 0]] > 0.5);
        assert!(proba[[1, 1]] > 0.5);
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_balanced_weights_shift_minority() {
        let x = array![[0.0], [0.1], [0.2], [0.3], [0.4], [0.5], [0.6], [1.0]];
        let y = array![0usize, 0, 0, 0, 0, 0, 0, 1];

        let mut plain = LogisticRegression::new().with_max_iter(300);
        plain.fit(&x, &y, None).unwrap();
        let mut balanced = LogisticRegression::new().with_max_iter(300).with_class_weight(ClassWeight::Balanced);
        balanced.fit(&x, &y, None).unwrap();

        let probe = array![[0.8]];
        let p_plain = plain.predict_proba(&probe).unwrap()[[0, 1]];
        let p_balanced = balanced.predict_proba(&probe).unwrap()[[0, 1]];
        assert!(p_balanced > p_plain);
    }

    #[test]
    fn test_unfitted_and_invalid() {
        let model = LogisticRegression::new();
        assert!(matches!(model.predict_proba(&array![[1.0]]), Err(ExoplanetError::ModelNotFitted)));

        let mut bad = LogisticRegression::new().with_c(0.0);
        assert!(bad.fit(&array![[1.0], [2.0]], &array![0usize, 1], None).is_err());
    }
}
