//! Neural Network (Multi-Layer Perceptron) classifier
//!
//! A feedforward network with a softmax output layer trained by mini-batch
//! momentum SGD on weighted cross-entropy. A held-out validation slice drives
//! early stopping; the best weights seen are restored at the end of training.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::models::{argmax_rows, check_xy, infer_n_classes, Classifier, ProbabilisticClassifier};
use crate::error::{ExoplanetError, Result};

/// Activation function for hidden layers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    /// Rectified Linear Unit
    #[default]
    ReLU,
    /// Sigmoid
    Sigmoid,
    /// Hyperbolic tangent
    Tanh,
}

impl Activation {
    fn apply(&self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::ReLU => z.mapv(|v| v.max(0.0)),
            Activation::Sigmoid => z.mapv(|v| 1.0 / (1.0 + (-v).exp())),
            Activation::Tanh => z.mapv(|v| v.tanh()),
        }
    }

    fn derivative(&self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::ReLU => z.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
            Activation::Sigmoid => {
                let sig = self.apply(z);
                &sig * &(1.0 - &sig)
            }
            Activation::Tanh => {
                let t = z.mapv(|v| v.tanh());
                1.0 - &t * &t
            }
        }
    }
}

/// Neural Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLPConfig {
    /// Hidden layer sizes
    pub hidden_layers: Vec<usize>,
    /// Activation function for hidden layers
    pub activation: Activation,
    pub learning_rate: f64,
    pub max_epochs: usize,
    pub batch_size: usize,
    /// L2 regularization
    pub alpha: f64,
    pub random_state: Option<u64>,
    /// Epochs without validation improvement before stopping
    pub early_stopping_patience: usize,
    /// Fraction of rows held out for early stopping; 0 disables it
    pub validation_split: f64,
    pub momentum: f64,
}

impl Default for MLPConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![100],
            activation: Activation::ReLU,
            learning_rate: 0.01,
            max_epochs: 200,
            batch_size: 32,
            alpha: 0.0001,
            random_state: Some(42),
            early_stopping_patience: 10,
            validation_split: 0.1,
            momentum: 0.9,
        }
    }
}

/// Multi-Layer Perceptron Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLPClassifier {
    config: MLPConfig,
    weights: Vec<Array2<f64>>,
    biases: Vec<Array1<f64>>,
    n_features: usize,
    n_classes: usize,
    epochs_run: usize,
    is_fitted: bool,
}

impl MLPClassifier {
    pub fn new(config: MLPConfig) -> Self {
        Self {
            config,
            weights: Vec::new(),
            biases: Vec::new(),
            n_features: 0,
            n_classes: 0,
            epochs_run: 0,
            is_fitted: false,
        }
    }

    /// Fix the class count instead of inferring it from the labels
    pub fn with_n_classes(mut self, n_classes: usize) -> Self {
        self.n_classes = n_classes;
        self
    }

    /// Number of epochs the last `fit` ran before stopping
    pub fn epochs_run(&self) -> usize {
        self.epochs_run
    }

    fn rng(&self) -> Xoshiro256PlusPlus {
        match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        }
    }

    fn initialize_weights(&mut self, rng: &mut Xoshiro256PlusPlus) -> Result<()> {
        self.weights.clear();
        self.biases.clear();

        let mut layer_sizes = vec![self.n_features];
        layer_sizes.extend(&self.config.hidden_layers);
        layer_sizes.push(self.n_classes);

        for pair in layer_sizes.windows(2) {
            let (n_in, n_out) = (pair[0], pair[1]);

            // Xavier/Glorot initialization
            let scale = (2.0 / (n_in + n_out) as f64).sqrt();
            let weights: Vec<f64> = (0..n_in * n_out)
                .map(|_| rng.gen::<f64>() * 2.0 * scale - scale)
                .collect();

            self.weights.push(Array2::from_shape_vec((n_in, n_out), weights)?);
            self.biases.push(Array1::zeros(n_out));
        }
        Ok(())
    }

    /// Returns the activations of every layer (input first) and the hidden pre-activations
    fn forward(&self, x: &Array2<f64>) -> (Vec<Array2<f64>>, Vec<Array2<f64>>) {
        let mut activations = vec![x.clone()];
        let mut z_values = Vec::with_capacity(self.weights.len());
        let last = self.weights.len().saturating_sub(1);

        for (i, (w, b)) in self.weights.iter().zip(self.biases.iter()).enumerate() {
            let z = activations[i].dot(w) + b;
            let a = if i < last {
                self.config.activation.apply(&z)
            } else {
                softmax_matrix(&z)
            };
            z_values.push(z);
            activations.push(a);
        }

        (activations, z_values)
    }

    fn backward(
        &self,
        y_onehot: &Array2<f64>,
        row_weights: &Array1<f64>,
        activations: &[Array2<f64>],
        z_values: &[Array2<f64>],
    ) -> Vec<(Array2<f64>, Array1<f64>)> {
        let total_weight = row_weights.sum().max(1e-12);
        let mut gradients = Vec::with_capacity(self.weights.len());

        // Cross-entropy gradient with softmax, each row scaled by its weight
        let Some(output) = activations.last() else {
            return gradients;
        };
        let mut delta = (output - y_onehot) * &row_weights.view().insert_axis(Axis(1)) / total_weight;

        for i in (0..self.weights.len()).rev() {
            let a_prev = &activations[i];
            let grad_w = a_prev.t().dot(&delta);
            let grad_b = delta.sum_axis(Axis(0));
            gradients.push((grad_w, grad_b));

            if i > 0 {
                delta = delta.dot(&self.weights[i].t()) * self.config.activation.derivative(&z_values[i - 1]);
            }
        }

        gradients.reverse();
        gradients
    }

    fn to_onehot(&self, y: &Array1<usize>) -> Array2<f64> {
        let mut onehot = Array2::zeros((y.len(), self.n_classes));
        for (i, &label) in y.iter().enumerate() {
            if label < self.n_classes {
                onehot[[i, label]] = 1.0;
            }
        }
        onehot
    }

    fn weighted_log_loss(&self, x: &Array2<f64>, y: &Array1<usize>, w: &Array1<f64>) -> f64 {
        let (activations, _) = self.forward(x);
        let Some(proba) = activations.last() else {
            return f64::INFINITY;
        };
        let total = w.sum().max(1e-12);
        y.iter()
            .enumerate()
            .map(|(i, &c)| -w[i] * (proba[[i, c]] + 1e-15).ln())
            .sum::<f64>()
            / total
    }
}

fn softmax_matrix(z: &Array2<f64>) -> Array2<f64> {
    let mut result = z.clone();
    for mut row in result.rows_mut() {
        let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let exp_sum: f64 = row.iter().map(|&v| (v - max).exp()).sum();
        for v in row.iter_mut() {
            *v = (*v - max).exp() / exp_sum;
        }
    }
    result
}

fn gather_rows(x: &Array2<f64>, indices: &[usize]) -> Array2<f64> {
    x.select(Axis(0), indices)
}

impl Classifier for MLPClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>, sample_weight: Option<&Array1<f64>>) -> Result<()> {
        check_xy(x, y.len())?;
        if self.config.batch_size == 0 {
            return Err(ExoplanetError::InvalidParameter {
                name: "batch_size".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        let n_samples = x.nrows();
        self.n_features = x.ncols();
        if self.n_classes == 0 {
            self.n_classes = infer_n_classes(y);
        }

        let mut rng = self.rng();
        self.initialize_weights(&mut rng)?;

        let weights = sample_weight.cloned().unwrap_or_else(|| Array1::ones(n_samples));
        let y_onehot = self.to_onehot(y);

        // Shuffled hold-out for early stopping
        let mut order: Vec<usize> = (0..n_samples).collect();
        order.shuffle(&mut rng);
        let val_size = ((n_samples as f64 * self.config.validation_split) as usize).min(n_samples - 1);
        let (val_idx, train_idx) = order.split_at(val_size);
        let train_idx = train_idx.to_vec();

        let x_val = gather_rows(x, val_idx);
        let y_val: Array1<usize> = val_idx.iter().map(|&i| y[i]).collect();
        let w_val: Array1<f64> = val_idx.iter().map(|&i| weights[i]).collect();

        let mut velocities_w: Vec<Array2<f64>> = self.weights.iter().map(|w| Array2::zeros(w.raw_dim())).collect();
        let mut velocities_b: Vec<Array1<f64>> = self.biases.iter().map(|b| Array1::zeros(b.len())).collect();

        let mut best_val_loss = f64::INFINITY;
        let mut best_params: Option<(Vec<Array2<f64>>, Vec<Array1<f64>>)> = None;
        let mut patience_counter = 0;
        self.epochs_run = 0;

        for epoch in 0..self.config.max_epochs {
            let mut indices = train_idx.clone();
            indices.shuffle(&mut rng);

            for batch in indices.chunks(self.config.batch_size) {
                let x_batch = gather_rows(x, batch);
                let y_batch = y_onehot.select(Axis(0), batch);
                let w_batch: Array1<f64> = batch.iter().map(|&i| weights[i]).collect();

                let (activations, z_values) = self.forward(&x_batch);
                let gradients = self.backward(&y_batch, &w_batch, &activations, &z_values);

                for (i, (grad_w, grad_b)) in gradients.into_iter().enumerate() {
                    velocities_w[i] = &velocities_w[i] * self.config.momentum - &grad_w * self.config.learning_rate;
                    velocities_b[i] = &velocities_b[i] * self.config.momentum - &grad_b * self.config.learning_rate;

                    self.weights[i] = &self.weights[i] + &velocities_w[i];
                    self.biases[i] = &self.biases[i] + &velocities_b[i];

                    // L2 regularization
                    self.weights[i] *= 1.0 - self.config.alpha * self.config.learning_rate;
                }
            }
            self.epochs_run = epoch + 1;

            if val_size > 0 {
                let val_loss = self.weighted_log_loss(&x_val, &y_val, &w_val);
                if val_loss < best_val_loss {
                    best_val_loss = val_loss;
                    best_params = Some((self.weights.clone(), self.biases.clone()));
                    patience_counter = 0;
                } else {
                    patience_counter += 1;
                    if patience_counter >= self.config.early_stopping_patience {
                        debug!(epoch, val_loss = best_val_loss, "MLP early stopping");
                        break;
                    }
                }
            }
        }

        if let Some((w, b)) = best_params {
            self.weights = w;
            self.biases = b;
        }
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

impl ProbabilisticClassifier for MLPClassifier {
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(ExoplanetError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(ExoplanetError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        let (mut activations, _) = self.forward(x);
        activations.pop().ok_or(ExoplanetError::ModelNotFitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::models::accuracy;

    fn create_classification_data() -> (Array2<f64>, Array1<usize>) {
        let x = Array2::from_shape_vec((150, 2), (0..300).map(|i| ((i * 37) % 300) as f64 / 30.0).collect())
            .unwrap();
        let y: Array1<usize> = x
            .rows()
            .into_iter()
            .map(|row| match row[0] + row[1] {
                s if s < 7.0 => 0,
                s if s < 13.0 => 1,
                _ => 2,
            })
            .collect();
        (x, y)
    }

    #[test]
    fn test_mlp_classifier() {
        let (x, y) = create_classification_data();
        let config = MLPConfig {
            hidden_layers: vec![32, 16],
            max_epochs: 200,
            learning_rate: 0.01,
            early_stopping_patience: 20,
            ..Default::default()
        };

        let mut mlp = MLPClassifier::new(config);
        mlp.fit(&x, &y, None).unwrap();

        let predictions = mlp.predict(&x).unwrap();
        assert_eq!(predictions.len(), 150);
        let acc = accuracy(&y, &predictions);
        assert!(acc > 0.7, "Accuracy ({}) should be above 70%", acc);
    }

    #[test]
    fn test_proba_rows_sum_to_one() {
        let (x, y) = create_classification_data();
        let mut mlp = MLPClassifier::new(MLPConfig { max_epochs: 5, ..Default::default() }).with_n_classes(3);
        mlp.fit(&x, &y, None).unwrap();
        let proba = mlp.predict_proba(&x).unwrap();
        assert_eq!(proba.ncols(), 3);
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_deterministic_with_seed() {
        let (x, y) = create_classification_data();
        let config = MLPConfig { hidden_layers: vec![8], max_epochs: 10, ..Default::default() };
        let mut a = MLPClassifier::new(config.clone());
        let mut b = MLPClassifier::new(config);
        a.fit(&x, &y, None).unwrap();
        b.fit(&x, &y, None).unwrap();
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_unfitted_errors() {
        let mlp = MLPClassifier::new(MLPConfig::default());
        let x = Array2::zeros((2, 2));
        assert!(matches!(mlp.predict_proba(&x), Err(ExoplanetError::ModelNotFitted)));
    }

    #[test]
    fn test_activation_functions() {
        let z = Array2::from_shape_vec((2, 3), vec![-1.0, 0.0, 1.0, -2.0, 0.5, 2.0]).unwrap();

        let relu = Activation::ReLU.apply(&z);
        assert_eq!(relu[[0, 0]], 0.0);
        assert_eq!(relu[[0, 2]], 1.0);

        let sigmoid = Activation::Sigmoid.apply(&z);
        assert!((sigmoid[[0, 1]] - 0.5).abs() < 0.001);
    }
}
