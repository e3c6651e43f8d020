//! Voting combiners and per-row uncertainty measures

use crate::error::{ExoplanetError, Result};
use crate::training::argmax_rows;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Voting strategy for classification
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum VotingStrategy {
    /// Hard voting: majority vote
    Hard,
    /// Soft voting: average probabilities
    #[default]
    Soft,
}

/// Voting classifier combiner over member outputs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VotingClassifier {
    strategy: VotingStrategy,
    /// Weights for each member, uniform when `None`
    weights: Option<Vec<f64>>,
    n_classes: usize,
}

impl VotingClassifier {
    pub fn new(strategy: VotingStrategy, n_classes: usize) -> Self {
        Self {
            strategy,
            weights: None,
            n_classes,
        }
    }

    /// Set member weights
    pub fn with_weights(mut self, weights: Vec<f64>) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn strategy(&self) -> VotingStrategy {
        self.strategy
    }

    fn normalized_weights(&self, n_members: usize) -> Result<Vec<f64>> {
        let weights = match &self.weights {
            Some(w) if w.len() != n_members => {
                return Err(ExoplanetError::ShapeError {
                    expected: format!("{} member weights", n_members),
                    actual: format!("{} member weights", w.len()),
                })
            }
            Some(w) => w.clone(),
            None => vec![1.0; n_members],
        };
        let weight_sum: f64 = weights.iter().sum();
        if !(weight_sum > 0.0) {
            return Err(ExoplanetError::ValidationError("member weights must sum to a positive value".to_string()));
        }
        Ok(weights.iter().map(|w| w / weight_sum).collect())
    }

    /// Weighted average of member class distributions
    pub fn soft_vote(&self, probabilities: &[Array2<f64>]) -> Result<Array2<f64>> {
        let first = probabilities
            .first()
            .ok_or_else(|| ExoplanetError::ValidationError("No probability outputs provided".to_string()))?;
        let weights = self.normalized_weights(probabilities.len())?;

        let mut result = Array2::zeros(first.raw_dim());
        for (proba, &weight) in probabilities.iter().zip(weights.iter()) {
            if proba.dim() != first.dim() {
                return Err(ExoplanetError::ShapeError {
                    expected: format!("{:?}", first.dim()),
                    actual: format!("{:?}", proba.dim()),
                });
            }
            result.scaled_add(weight, proba);
        }

        // Renormalize rows so floating error never leaks out of the simplex
        for mut row in result.rows_mut() {
            let sum = row.sum();
            if sum > 0.0 {
                row /= sum;
            }
        }
        Ok(result)
    }

    /// Weighted vote share of each class from hard predictions
    pub fn hard_vote(&self, predictions: &[Array1<usize>]) -> Result<Array2<f64>> {
        let first = predictions
            .first()
            .ok_or_else(|| ExoplanetError::ValidationError("No predictions provided".to_string()))?;
        let weights = self.normalized_weights(predictions.len())?;

        let mut shares = Array2::zeros((first.len(), self.n_classes));
        for (pred, &weight) in predictions.iter().zip(weights.iter()) {
            for (i, &class) in pred.iter().enumerate() {
                if class < self.n_classes {
                    shares[[i, class]] += weight;
                }
            }
        }
        Ok(shares)
    }

    /// Combined distribution per the configured strategy
    pub fn combine(&self, probabilities: &[Array2<f64>], predictions: &[Array1<usize>]) -> Result<Array2<f64>> {
        match self.strategy {
            VotingStrategy::Soft if !probabilities.is_empty() => {
                // Member weights only line up when every member is probabilistic
                if probabilities.len() == predictions.len() {
                    self.soft_vote(probabilities)
                } else {
                    Self { weights: None, ..self.clone() }.soft_vote(probabilities)
                }
            }
            _ => self.hard_vote(predictions),
        }
    }

    /// Final labels from a combined distribution
    pub fn labels(&self, combined: &Array2<f64>) -> Array1<usize> {
        argmax_rows(combined)
    }
}

/// Normalized Shannon entropy `-Σ p ln(p + 1e-10) / ln(K)`, clamped to [0, 1].
///
/// Zero for a one-hot distribution, one for a uniform one.
pub fn normalized_entropy(probabilities: &[f64]) -> f64 {
    let k = probabilities.len();
    if k < 2 {
        return 0.0;
    }
    let entropy: f64 = probabilities.iter().map(|&p| -p * (p + 1e-10).ln()).sum();
    (entropy / (k as f64).ln()).clamp(0.0, 1.0)
}

/// Per-row mean over members of the fraction of members agreeing with that member
pub fn model_agreement(predictions: &[Array1<usize>]) -> Array1<f64> {
    let n_members = predictions.len();
    let n_rows = predictions.first().map_or(0, |p| p.len());
    if n_members == 0 {
        return Array1::zeros(n_rows);
    }

    (0..n_rows)
        .map(|i| {
            let votes: Vec<usize> = predictions.iter().map(|p| p[i]).collect();
            let total: usize = votes
                .iter()
                .map(|v| votes.iter().filter(|&w| w == v).count())
                .sum();
            total as f64 / (n_members * n_members) as f64
        })
        .collect()
}

/// Mean combiner for regression members
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VotingRegressor;

impl VotingRegressor {
    pub fn new() -> Self {
        Self
    }

    /// Arithmetic mean and sample standard deviation (n - 1) across members per row.
    ///
    /// The deviation is zero when there is a single member.
    pub fn mean_and_std(&self, predictions: &[Array1<f64>]) -> Result<(Array1<f64>, Array1<f64>)> {
        let first = predictions
            .first()
            .ok_or_else(|| ExoplanetError::ValidationError("No predictions provided".to_string()))?;
        let n_members = predictions.len() as f64;
        let n_rows = first.len();

        let mut mean = Array1::zeros(n_rows);
        for pred in predictions {
            mean += pred;
        }
        mean /= n_members;

        let std = if predictions.len() < 2 {
            Array1::zeros(n_rows)
        } else {
            let mut sq = Array1::<f64>::zeros(n_rows);
            for pred in predictions {
                sq += &(pred - &mean).mapv(|d| d * d);
            }
            (sq / (n_members - 1.0)).mapv(f64::sqrt)
        };

        Ok((mean, std))
    }
}
