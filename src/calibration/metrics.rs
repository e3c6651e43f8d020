//! Calibration metrics

use crate::error::{ExoplanetError, Result};
use crate::training::argmax_rows;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Number of reliability bins used by validation reports
pub const DEFAULT_BINS: usize = 10;

/// Calibration metrics container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationMetrics {
    /// Expected Calibration Error
    pub ece: f64,
    /// Maximum Calibration Error
    pub mce: f64,
    /// Multiclass Brier score
    pub brier_score: f64,
    /// Average max-probability confidence
    pub avg_confidence: f64,
    pub accuracy: f64,
    pub reliability: ReliabilityDiagram,
}

/// Reliability diagram data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReliabilityDiagram {
    /// Bin edges
    pub bin_edges: Vec<f64>,
    /// Mean confidence in each bin
    pub bin_confidences: Vec<f64>,
    /// Fraction correct in each bin
    pub bin_accuracies: Vec<f64>,
    /// Number of samples in each bin
    pub bin_counts: Vec<usize>,
}

fn check_lengths(confidences: &Array1<f64>, correct: &Array1<f64>) -> Result<()> {
    if confidences.len() != correct.len() {
        return Err(ExoplanetError::ValidationError(
            "Confidences and correctness indicators must have same length".to_string(),
        ));
    }
    Ok(())
}

/// Compute Expected Calibration Error (ECE)
///
/// ECE = sum_i (|B_i| / n) * |acc(B_i) - conf(B_i)|
pub fn expected_calibration_error(confidences: &Array1<f64>, correct: &Array1<f64>, n_bins: usize) -> Result<f64> {
    let reliability = reliability_diagram(confidences, correct, n_bins)?;
    let n = confidences.len() as f64;
    if n == 0.0 {
        return Ok(0.0);
    }

    let ece = (0..reliability.bin_counts.len())
        .filter(|&i| reliability.bin_counts[i] > 0)
        .map(|i| {
            let weight = reliability.bin_counts[i] as f64 / n;
            weight * (reliability.bin_accuracies[i] - reliability.bin_confidences[i]).abs()
        })
        .sum();
    Ok(ece)
}

/// Compute Maximum Calibration Error (MCE)
///
/// MCE = max_i |acc(B_i) - conf(B_i)|
pub fn maximum_calibration_error(confidences: &Array1<f64>, correct: &Array1<f64>, n_bins: usize) -> Result<f64> {
    let reliability = reliability_diagram(confidences, correct, n_bins)?;

    let mut mce: f64 = 0.0;
    for i in 0..reliability.bin_counts.len() {
        if reliability.bin_counts[i] > 0 {
            mce = mce.max((reliability.bin_accuracies[i] - reliability.bin_confidences[i]).abs());
        }
    }
    Ok(mce)
}

/// Binary Brier score, (1/n) * sum_i (p_i - y_i)^2
pub fn brier_score(probs: &Array1<f64>, labels: &Array1<f64>) -> Result<f64> {
    check_lengths(probs, labels)?;
    if probs.is_empty() {
        return Ok(0.0);
    }
    let score: f64 = probs.iter().zip(labels.iter()).map(|(&p, &y)| (p - y).powi(2)).sum();
    Ok(score / probs.len() as f64)
}

/// Multiclass Brier score: mean over rows of the squared distance to the one-hot truth
pub fn multiclass_brier_score(probas: &Array2<f64>, y_true: &Array1<usize>) -> Result<f64> {
    if probas.nrows() != y_true.len() {
        return Err(ExoplanetError::ShapeError {
            expected: format!("{} rows", y_true.len()),
            actual: format!("{} rows", probas.nrows()),
        });
    }
    if y_true.is_empty() {
        return Ok(0.0);
    }
    let total: f64 = probas
        .rows()
        .into_iter()
        .zip(y_true.iter())
        .map(|(row, &y)| {
            row.iter()
                .enumerate()
                .map(|(k, &p)| {
                    let target = if k == y { 1.0 } else { 0.0 };
                    (p - target).powi(2)
                })
                .sum::<f64>()
        })
        .sum();
    Ok(total / y_true.len() as f64)
}

/// Compute reliability diagram data over equal-width confidence bins
pub fn reliability_diagram(confidences: &Array1<f64>, correct: &Array1<f64>, n_bins: usize) -> Result<ReliabilityDiagram> {
    check_lengths(confidences, correct)?;

    let n_bins = n_bins.max(1);
    let bin_width = 1.0 / n_bins as f64;
    let bin_edges: Vec<f64> = (0..=n_bins).map(|i| i as f64 * bin_width).collect();

    let mut bin_sums = vec![0.0; n_bins];
    let mut bin_correct = vec![0.0; n_bins];
    let mut bin_counts = vec![0usize; n_bins];

    for (&p, &y) in confidences.iter().zip(correct.iter()) {
        let bin_idx = ((p.clamp(0.0, 1.0) / bin_width) as usize).min(n_bins - 1);
        bin_sums[bin_idx] += p;
        bin_correct[bin_idx] += y;
        bin_counts[bin_idx] += 1;
    }

    let mean = |sums: &[f64]| -> Vec<f64> {
        sums.iter()
            .zip(bin_counts.iter())
            .map(|(&sum, &count)| if count > 0 { sum / count as f64 } else { 0.0 })
            .collect()
    };

    Ok(ReliabilityDiagram {
        bin_edges,
        bin_confidences: mean(&bin_sums),
        bin_accuracies: mean(&bin_correct),
        bin_counts,
    })
}

/// Calibration of a multiclass model from its class distributions and the true labels
pub fn compute_calibration_metrics(probas: &Array2<f64>, y_true: &Array1<usize>, n_bins: usize) -> Result<CalibrationMetrics> {
    if probas.nrows() != y_true.len() {
        return Err(ExoplanetError::ShapeError {
            expected: format!("{} rows", y_true.len()),
            actual: format!("{} rows", probas.nrows()),
        });
    }

    let predicted = argmax_rows(probas);
    let confidences: Array1<f64> = probas
        .rows()
        .into_iter()
        .map(|row| row.iter().cloned().fold(0.0, f64::max))
        .collect();
    let correct: Array1<f64> = predicted
        .iter()
        .zip(y_true.iter())
        .map(|(p, t)| if p == t { 1.0 } else { 0.0 })
        .collect();

    Ok(CalibrationMetrics {
        ece: expected_calibration_error(&confidences, &correct, n_bins)?,
        mce: maximum_calibration_error(&confidences, &correct, n_bins)?,
        brier_score: multiclass_brier_score(probas, y_true)?,
        avg_confidence: confidences.mean().unwrap_or(0.0),
        accuracy: correct.mean().unwrap_or(0.0),
        reliability: reliability_diagram(&confidences, &correct, n_bins)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_brier_score() {
        let probs = array![1.0, 0.0, 1.0, 0.0];
        let labels = array![1.0, 0.0, 1.0, 0.0];
        assert!(brier_score(&probs, &labels).unwrap().abs() < 1e-10);

        let probs = array![0.0, 1.0, 0.0, 1.0];
        assert!((brier_score(&probs, &labels).unwrap() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_multiclass_brier() {
        let probas = array![[1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
        assert!(multiclass_brier_score(&probas, &array![0usize, 2]).unwrap().abs() < 1e-12);
        // Wrong one-hot costs 2 per row
        assert!((multiclass_brier_score(&probas, &array![1usize, 1]).unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_ece_perfectly_calibrated_bin() {
        // Four rows at 0.75 confidence, three correct
        let conf = array![0.75, 0.75, 0.75, 0.75];
        let correct = array![1.0, 1.0, 1.0, 0.0];
        assert!(expected_calibration_error(&conf, &correct, 10).unwrap().abs() < 1e-12);
        let mce = maximum_calibration_error(&array![0.95, 0.95], &array![0.0, 0.0], 10).unwrap();
        assert!((mce - 0.95).abs() < 1e-12);
    }

    #[test]
    fn test_reliability_diagram() {
        let conf = array![0.1, 0.3, 0.5, 0.7, 0.9, 1.0];
        let correct = array![0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        let diagram = reliability_diagram(&conf, &correct, 5).unwrap();

        assert_eq!(diagram.bin_edges.len(), 6);
        assert_eq!(diagram.bin_counts, vec![1, 1, 1, 1, 2]);
        assert_eq!(diagram.bin_accuracies[4], 1.0);
    }

    #[test]
    fn test_calibration_metrics() {
        let probas = array![[0.8, 0.1, 0.1], [0.2, 0.7, 0.1], [0.3, 0.3, 0.4], [0.6, 0.2, 0.2]];
        let y = array![0usize, 1, 0, 0];

        let metrics = compute_calibration_metrics(&probas, &y, DEFAULT_BINS).unwrap();
        assert!((metrics.accuracy - 0.75).abs() < 1e-12);
        assert!((metrics.avg_confidence - 0.625).abs() < 1e-12);
        assert!(metrics.ece >= 0.0 && metrics.ece <= 1.0);
        assert!(metrics.mce >= metrics.ece);
        assert_eq!(metrics.reliability.bin_counts.iter().sum::<usize>(), 4);
    }
}
