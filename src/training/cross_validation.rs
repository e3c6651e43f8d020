//! Cross-validation and hold-out splitting

use crate::error::{ExoplanetError, Result};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cross-validation strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CVStrategy {
    /// K-Fold cross-validation
    KFold { n_splits: usize, shuffle: bool },
    /// Stratified K-Fold (maintains class distribution)
    StratifiedKFold { n_splits: usize, shuffle: bool },
}

impl Default for CVStrategy {
    fn default() -> Self {
        CVStrategy::StratifiedKFold { n_splits: 5, shuffle: true }
    }
}

/// A single train/test split
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Per-fold scores with their summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVResults {
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
    /// Population standard deviation over folds
    pub std_score: f64,
}

impl CVResults {
    pub fn from_scores(fold_scores: Vec<f64>) -> Self {
        let n = fold_scores.len().max(1) as f64;
        let mean_score = fold_scores.iter().sum::<f64>() / n;
        let std_score = (fold_scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>() / n).sqrt();
        Self { fold_scores, mean_score, std_score }
    }
}

/// Cross-validation splitter
pub struct CrossValidator {
    strategy: CVStrategy,
    random_state: Option<u64>,
}

impl CrossValidator {
    pub fn new(strategy: CVStrategy) -> Self {
        Self {
            strategy,
            random_state: None,
        }
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    fn rng(&self) -> ChaCha8Rng {
        match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }

    /// Generate train/test splits
    pub fn split(&self, n_samples: usize, y: Option<&Array1<usize>>) -> Result<Vec<CVSplit>> {
        match &self.strategy {
            CVStrategy::KFold { n_splits, shuffle } => self.k_fold_split(n_samples, *n_splits, *shuffle),
            CVStrategy::StratifiedKFold { n_splits, shuffle } => {
                let y = y.ok_or_else(|| {
                    ExoplanetError::ValidationError("StratifiedKFold requires target array".to_string())
                })?;
                self.stratified_k_fold_split(y, *n_splits, *shuffle)
            }
        }
    }

    fn check_splits(n_samples: usize, n_splits: usize) -> Result<()> {
        if n_splits < 2 {
            return Err(ExoplanetError::ValidationError("n_splits must be at least 2".to_string()));
        }
        if n_samples < n_splits {
            return Err(ExoplanetError::ValidationError(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, n_splits
            )));
        }
        Ok(())
    }

    fn k_fold_split(&self, n_samples: usize, n_splits: usize, shuffle: bool) -> Result<Vec<CVSplit>> {
        Self::check_splits(n_samples, n_splits)?;

        let mut indices: Vec<usize> = (0..n_samples).collect();
        if shuffle {
            indices.shuffle(&mut self.rng());
        }

        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;

        let mut splits = Vec::with_capacity(n_splits);
        let mut current = 0;
        for fold_idx in 0..n_splits {
            let fold_size = if fold_idx < remainder { base + 1 } else { base };
            let test_indices: Vec<usize> = indices[current..current + fold_size].to_vec();
            let train_indices: Vec<usize> = indices[..current]
                .iter()
                .chain(indices[current + fold_size..].iter())
                .copied()
                .collect();

            splits.push(CVSplit { train_indices, test_indices, fold_idx });
            current += fold_size;
        }

        Ok(splits)
    }

    fn stratified_k_fold_split(&self, y: &Array1<usize>, n_splits: usize, shuffle: bool) -> Result<Vec<CVSplit>> {
        Self::check_splits(y.len(), n_splits)?;

        let mut class_indices = group_by_class(y);
        if shuffle {
            let mut rng = self.rng();
            for indices in class_indices.values_mut() {
                indices.shuffle(&mut rng);
            }
        }

        // Deal each class round-robin, continuing where the previous class stopped
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];
        let mut next = 0;
        for indices in class_indices.values() {
            for &idx in indices {
                folds[next % n_splits].push(idx);
                next += 1;
            }
        }

        let splits = (0..n_splits)
            .map(|fold_idx| {
                let mut test_indices = folds[fold_idx].clone();
                test_indices.sort_unstable();
                let mut train_indices: Vec<usize> = folds
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != fold_idx)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect();
                train_indices.sort_unstable();
                CVSplit { train_indices, test_indices, fold_idx }
            })
            .collect();

        Ok(splits)
    }
}

fn group_by_class(y: &Array1<usize>) -> BTreeMap<usize, Vec<usize>> {
    let mut class_indices: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (idx, &class) in y.iter().enumerate() {
        class_indices.entry(class).or_default().push(idx);
    }
    class_indices
}

/// Stratified hold-out split returning sorted `(train, test)` row indices.
///
/// Each class contributes `round(count * test_size)` rows to the test side,
/// keeping at least one training row per class.
pub fn stratified_train_test_split(
    y: &Array1<usize>,
    test_size: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(ExoplanetError::InvalidParameter {
            name: "test_size".to_string(),
            value: test_size.to_string(),
            reason: "must lie in (0, 1)".to_string(),
        });
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(y.len());
    let mut test = Vec::new();

    for (_, mut indices) in group_by_class(y) {
        indices.shuffle(&mut rng);
        let n_test = ((indices.len() as f64 * test_size).round() as usize).min(indices.len().saturating_sub(1));
        test.extend_from_slice(&indices[..n_test]);
        train.extend_from_slice(&indices[n_test..]);
    }

    if test.is_empty() {
        return Err(ExoplanetError::ValidationError(format!(
            "too few rows ({}) for a {:.0}% test split",
            y.len(),
            test_size * 100.0
        )));
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok((train, test))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_k_fold() {
        let cv = CrossValidator::new(CVStrategy::KFold { n_splits: 5, shuffle: false });
        let splits = cv.split(100, None).unwrap();

        assert_eq!(splits.len(), 5);
        for split in &splits {
            assert_eq!(split.test_indices.len(), 20);
            assert_eq!(split.train_indices.len(), 80);
        }
    }

    #[test]
    fn test_stratified_k_fold() {
        let y = Array1::from_vec((0..100).map(|i| if i < 70 { 0 } else { 1 }).collect::<Vec<usize>>());
        let cv = CrossValidator::new(CVStrategy::StratifiedKFold { n_splits: 5, shuffle: true })
            .with_random_state(42);
        let splits = cv.split(100, Some(&y)).unwrap();

        assert_eq!(splits.len(), 5);
        for split in &splits {
            let minority = split.test_indices.iter().filter(|&&i| y[i] == 1).count();
            assert_eq!(minority, 6);
            assert_eq!(split.test_indices.len() + split.train_indices.len(), 100);
        }
    }

    #[test]
    fn test_stratified_requires_labels() {
        let cv = CrossValidator::new(CVStrategy::default());
        assert!(cv.split(10, None).is_err());
    }

    #[test]
    fn test_train_test_split_is_stratified_and_disjoint() {
        let y = Array1::from_vec((0..200).map(|i| i % 4).map(|c| c.min(2)).collect::<Vec<usize>>());
        let (train, test) = stratified_train_test_split(&y, 0.2, 42).unwrap();

        assert_eq!(train.len() + test.len(), 200);
        assert!(test.iter().all(|i| train.binary_search(i).is_err()));
        let test_class2 = test.iter().filter(|&&i| y[i] == 2).count();
        assert_eq!(test_class2, 20);

        let again = stratified_train_test_split(&y, 0.2, 42).unwrap();
        assert_eq!(again.1, test);
    }

    #[test]
    fn test_cv_results_summary() {
        let r = CVResults::from_scores(vec![0.8, 0.9, 1.0]);
        assert!((r.mean_score - 0.9).abs() < 1e-12);
        assert!(r.std_score > 0.0);
    }
}
