//! Per-property regression ensembles
//!
//! One independent ensemble per physical property. Each is trained only on
//! planet-like rows whose target is finite; a property with too few such rows
//! is skipped and predicts `None`.

use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::voting::VotingRegressor;
use crate::data::PROPERTY_COLUMNS;
use crate::error::{ExoplanetError, Result};
use crate::training::{
    GradientBoostingConfig, GradientBoostingRegressor, RandomForest, RegressionMetrics, Regressor,
    XGBoostConfig, XGBoostRegressor,
};

/// Hyperparameters shared by all property ensembles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressorConfig {
    pub forest_estimators: usize,
    pub forest_max_depth: Option<usize>,
    pub forest_min_samples_split: usize,
    pub gradient_boosting: GradientBoostingConfig,
    pub xgboost: XGBoostConfig,
    /// Fewer valid rows than this skips the property
    pub min_samples: usize,
    pub random_state: u64,
}

impl Default for RegressorConfig {
    fn default() -> Self {
        Self {
            forest_estimators: 200,
            forest_max_depth: Some(15),
            forest_min_samples_split: 10,
            gradient_boosting: GradientBoostingConfig {
                n_estimators: 150,
                learning_rate: 0.05,
                max_depth: 7,
                subsample: 0.8,
                ..Default::default()
            },
            xgboost: XGBoostConfig {
                n_estimators: 200,
                learning_rate: 0.05,
                max_depth: 8,
                subsample: 0.8,
                ..Default::default()
            },
            min_samples: 10,
            random_state: 42,
        }
    }
}

impl RegressorConfig {
    pub fn fast() -> Self {
        let mut config = Self {
            forest_estimators: 15,
            forest_max_depth: Some(8),
            ..Self::default()
        };
        config.gradient_boosting.n_estimators = 20;
        config.gradient_boosting.max_depth = 3;
        config.gradient_boosting.learning_rate = 0.2;
        config.xgboost.n_estimators = 20;
        config.xgboost.max_depth = 4;
        config.xgboost.learning_rate = 0.2;
        config
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum RegressorMember {
    RandomForest(RandomForest),
    GradientBoosting(GradientBoostingRegressor),
    XGBoost(XGBoostRegressor),
}

impl RegressorMember {
    fn inner(&self) -> &dyn Regressor {
        match self {
            RegressorMember::RandomForest(m) => m,
            RegressorMember::GradientBoosting(m) => m,
            RegressorMember::XGBoost(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Regressor {
        match self {
            RegressorMember::RandomForest(m) => m,
            RegressorMember::GradientBoosting(m) => m,
            RegressorMember::XGBoost(m) => m,
        }
    }

    fn build_all(config: &RegressorConfig) -> Vec<RegressorMember> {
        let mut forest = RandomForest::new_regressor(config.forest_estimators)
            .with_min_samples_split(config.forest_min_samples_split)
            .with_random_state(config.random_state);
        if let Some(depth) = config.forest_max_depth {
            forest = forest.with_max_depth(depth);
        }
        vec![
            RegressorMember::RandomForest(forest),
            RegressorMember::GradientBoosting(GradientBoostingRegressor::new(GradientBoostingConfig {
                random_state: Some(config.random_state),
                ..config.gradient_boosting.clone()
            })),
            RegressorMember::XGBoost(XGBoostRegressor::new(XGBoostConfig {
                random_state: Some(config.random_state),
                ..config.xgboost.clone()
            })),
        ]
    }
}

/// Fitted ensemble for one property
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PropertyModel {
    members: Vec<RegressorMember>,
    n_train: usize,
}

impl PropertyModel {
    fn predict(&self, x: &Array2<f64>) -> Result<(Array1<f64>, Array1<f64>)> {
        let per_member: Vec<Array1<f64>> = self
            .members
            .iter()
            .map(|m| m.inner().predict(x))
            .collect::<Result<_>>()?;
        VotingRegressor::new().mean_and_std(&per_member)
    }
}

/// Mean estimate and member spread for the four properties of one row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PropertyPrediction {
    /// In `PROPERTY_COLUMNS` order; `None` for skipped properties
    pub values: [Option<f64>; 4],
    pub uncertainties: [Option<f64>; 4],
}

/// Regression ensembles for planet radius, temperature, orbit and impact parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyRegressors {
    config: RegressorConfig,
    models: Vec<Option<PropertyModel>>,
    is_fitted: bool,
}

impl PropertyRegressors {
    pub fn new(config: RegressorConfig) -> Self {
        Self {
            config,
            models: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Names of properties that were trained
    pub fn trained_properties(&self) -> Vec<&'static str> {
        PROPERTY_COLUMNS
            .iter()
            .zip(self.models.iter())
            .filter(|(_, m)| m.is_some())
            .map(|(name, _)| *name)
            .collect()
    }

    fn valid_rows(targets: &Array2<f64>, planet_mask: &[bool], property: usize) -> Vec<usize> {
        (0..targets.nrows())
            .filter(|&i| planet_mask[i] && targets[[i, property]].is_finite())
            .collect()
    }

    /// Fit one ensemble per column of `targets` (shape n_rows x 4), using
    /// rows flagged in `planet_mask` whose target is finite.
    pub fn fit(&mut self, x: &Array2<f64>, targets: &Array2<f64>, planet_mask: &[bool]) -> Result<()> {
        if targets.nrows() != x.nrows() || planet_mask.len() != x.nrows() {
            return Err(ExoplanetError::ShapeError {
                expected: format!("{} rows", x.nrows()),
                actual: format!("{} target rows, {} mask entries", targets.nrows(), planet_mask.len()),
            });
        }
        if targets.ncols() != PROPERTY_COLUMNS.len() {
            return Err(ExoplanetError::ShapeError {
                expected: format!("{} property columns", PROPERTY_COLUMNS.len()),
                actual: format!("{} property columns", targets.ncols()),
            });
        }

        let config = &self.config;
        self.models = (0..PROPERTY_COLUMNS.len())
            .into_par_iter()
            .map(|p| {
                let rows = Self::valid_rows(targets, planet_mask, p);
                if rows.len() < config.min_samples {
                    warn!(
                        property = PROPERTY_COLUMNS[p],
                        valid_rows = rows.len(),
                        required = config.min_samples,
                        "Skipping property regressor"
                    );
                    return Ok(None);
                }
                let x_p = x.select(Axis(0), &rows);
                let y_p: Array1<f64> = rows.iter().map(|&i| targets[[i, p]]).collect();

                let mut members = RegressorMember::build_all(config);
                for member in members.iter_mut() {
                    member.inner_mut().fit(&x_p, &y_p).map_err(|e| {
                        ExoplanetError::TrainingError(format!("{} regressor: {}", PROPERTY_COLUMNS[p], e))
                    })?;
                }
                info!(property = PROPERTY_COLUMNS[p], rows = rows.len(), "Property regressor trained");
                Ok(Some(PropertyModel { members, n_train: rows.len() }))
            })
            .collect::<Result<_>>()?;

        self.is_fitted = true;
        Ok(())
    }

    /// Per-row property estimates
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<PropertyPrediction>> {
        if !self.is_fitted {
            return Err(ExoplanetError::ModelNotFitted);
        }
        let mut out = vec![
            PropertyPrediction { values: [None; 4], uncertainties: [None; 4] };
            x.nrows()
        ];
        for (p, model) in self.models.iter().enumerate() {
            let Some(model) = model else { continue };
            let (mean, std) = model.predict(x)?;
            for (i, row) in out.iter_mut().enumerate() {
                row.values[p] = Some(mean[i]);
                row.uncertainties[p] = Some(std[i]);
            }
        }
        Ok(out)
    }

    /// Error metrics per trained property on planet-like rows with finite targets
    pub fn evaluate(
        &self,
        x: &Array2<f64>,
        targets: &Array2<f64>,
        planet_mask: &[bool],
    ) -> Result<Vec<(String, RegressionMetrics)>> {
        if !self.is_fitted {
            return Err(ExoplanetError::ModelNotFitted);
        }
        let mut results = Vec::new();
        for (p, model) in self.models.iter().enumerate() {
            let Some(model) = model else { continue };
            let rows = Self::valid_rows(targets, planet_mask, p);
            if rows.is_empty() {
                continue;
            }
            let (mean, _) = model.predict(&x.select(Axis(0), &rows))?;
            let truth: Array1<f64> = rows.iter().map(|&i| targets[[i, p]]).collect();
            results.push((PROPERTY_COLUMNS[p].to_string(), RegressionMetrics::compute(&truth, &mean)));
        }
        Ok(results)
    }

    /// Training row count per trained property
    pub fn training_rows(&self) -> Vec<(&'static str, usize)> {
        PROPERTY_COLUMNS
            .iter()
            .zip(self.models.iter())
            .filter_map(|(name, m)| m.as_ref().map(|m| (*name, m.n_train)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(n: usize) -> (Array2<f64>, Array2<f64>, Vec<bool>) {
        let x = Array2::from_shape_fn((n, 3), |(i, j)| (i as f64 * 0.1) + j as f64);
        let targets = Array2::from_shape_fn((n, 4), |(i, j)| match j {
            0 => 2.0 * x[[i, 0]] + 1.0,
            1 => 300.0 + x[[i, 1]],
            2 => f64::NAN,
            _ => 0.5,
        });
        let mask = (0..n).map(|i| i % 5 != 0).collect();
        (x, targets, mask)
    }

    #[test]
    fn test_fit_skips_properties_without_targets() {
        let (x, targets, mask) = data(60);
        let mut regs = PropertyRegressors::new(RegressorConfig::fast());
        regs.fit(&x, &targets, &mask).unwrap();

        assert_eq!(regs.trained_properties(), vec!["planet_radius", "planet_temp", "impact_parameter"]);
        let preds = regs.predict(&x).unwrap();
        assert_eq!(preds.len(), 60);
        assert!(preds[0].values[2].is_none());
        assert!(preds[0].uncertainties[2].is_none());
        assert!(preds[0].values[0].is_some());
        assert!(preds[10].uncertainties[0].unwrap() >= 0.0);
    }

    #[test]
    fn test_too_few_rows_skips_everything() {
        let (x, targets, _) = data(12);
        let mask = vec![false; 12];
        let mut regs = PropertyRegressors::new(RegressorConfig::fast());
        regs.fit(&x, &targets, &mask).unwrap();
        assert!(regs.trained_properties().is_empty());
        assert!(regs.predict(&x).unwrap().iter().all(|p| p.values.iter().all(Option::is_none)));
    }

    #[test]
    fn test_evaluate_reports_trained_properties() {
        let (x, targets, mask) = data(60);
        let mut regs = PropertyRegressors::new(RegressorConfig::fast());
        regs.fit(&x, &targets, &mask).unwrap();
        let metrics = regs.evaluate(&x, &targets, &mask).unwrap();
        assert_eq!(metrics.len(), 3);
        assert!(metrics[0].1.r2 > 0.8);
    }

    #[test]
    fn test_unfitted_errors() {
        let regs = PropertyRegressors::new(RegressorConfig::fast());
        assert!(matches!(regs.predict(&Array2::zeros((1, 3))), Err(ExoplanetError::ModelNotFitted)));
    }
}
