//! Preprocessing pipeline fitted once on training data

use super::{
    artifacts::remove_artifacts,
    config::PreprocessingConfig,
    imputer::Imputer,
    outlier::{OutlierFilter, OutlierReport},
    quality::{add_quality_column, QUALITY_COLUMN},
    scaler::Scaler,
    transforms::LogTransform,
};
use crate::error::{ExoplanetError, Result};
use crate::utils::frame::columns_to_array2;
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

/// What happened to the rows during `fit_transform`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreprocessingReport {
    pub rows_input: usize,
    pub artifacts_removed: usize,
    pub outliers: OutlierReport,
    pub rows_output: usize,
    pub fit_time_secs: f64,
}

/// Cleaning, skew correction, quality scoring and robust scaling.
///
/// `fit_transform` may drop rows (artifacts and outliers); `transform`
/// never drops rows and never refits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExoplanetPreprocessor {
    config: PreprocessingConfig,
    feature_columns: Vec<String>,
    imputer: Imputer,
    log_transform: LogTransform,
    scaler: Scaler,
    report: Option<PreprocessingReport>,
    is_fitted: bool,
}

impl Default for ExoplanetPreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ExoplanetPreprocessor {
    /// Create a new preprocessor with default configuration
    pub fn new() -> Self {
        Self::with_config(PreprocessingConfig::default())
    }

    /// Create a new preprocessor with custom configuration
    pub fn with_config(config: PreprocessingConfig) -> Self {
        let scaler = Scaler::new();
        Self {
            config,
            feature_columns: Vec::new(),
            imputer: Imputer::new(),
            log_transform: LogTransform::new(),
            scaler,
            report: None,
            is_fitted: false,
        }
    }

    pub fn config(&self) -> &PreprocessingConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn report(&self) -> Option<&PreprocessingReport> {
        self.report.as_ref()
    }

    pub fn imputer(&self) -> &Imputer {
        &self.imputer
    }

    pub fn log_transform(&self) -> &LogTransform {
        &self.log_transform
    }

    pub fn scaler(&self) -> &Scaler {
        &self.scaler
    }

    /// Scaled feature columns followed by the quality score
    pub fn model_columns(&self) -> Vec<String> {
        let mut columns = self.feature_columns.clone();
        columns.push(QUALITY_COLUMN.to_string());
        columns
    }

    /// Fit every stage and return the cleaned training frame.
    /// Columns outside `feature_columns` (labels, targets) ride along with
    /// the surviving rows.
    pub fn fit_transform(&mut self, df: &DataFrame, feature_columns: &[String]) -> Result<DataFrame> {
        let start = Instant::now();
        for name in feature_columns {
            if df.column(name).is_err() {
                return Err(ExoplanetError::FeatureNotFound(name.clone()));
            }
        }
        if df.height() == 0 {
            return Err(ExoplanetError::PreprocessingError("empty training frame".to_string()));
        }

        let rows_input = df.height();
        let (mut data, artifacts_removed) = if self.config.remove_artifacts {
            remove_artifacts(df, &self.config.bounds)?
        } else {
            (df.clone(), 0)
        };

        data = self.imputer.fit_transform(&data, feature_columns)?;
        data = add_quality_column(&data, &self.config)?;
        data = self.log_transform.fit_transform(&data, &self.config.log_columns)?;

        let mut outliers = OutlierReport {
            rows_before: data.height(),
            rows_after: data.height(),
            per_column: Vec::new(),
        };
        if self.config.handle_outliers {
            let filter = OutlierFilter::new(self.config.outlier_threshold)?;
            let screened = self
                .config
                .outlier_columns
                .clone()
                .unwrap_or_else(|| feature_columns.to_vec());
            let (filtered, report) = filter.filter(&data, &screened)?;
            data = filtered;
            outliers = report;
        }

        if data.height() == 0 {
            return Err(ExoplanetError::PreprocessingError(
                "no rows left after artifact and outlier filtering".to_string(),
            ));
        }

        data = self.scaler.fit_transform(&data, feature_columns)?;

        self.feature_columns = feature_columns.to_vec();
        self.is_fitted = true;

        let report = PreprocessingReport {
            rows_input,
            artifacts_removed,
            rows_output: data.height(),
            outliers,
            fit_time_secs: start.elapsed().as_secs_f64(),
        };
        info!(
            rows_input = report.rows_input,
            artifacts_removed = report.artifacts_removed,
            outliers_removed = report.outliers.total_removed(),
            rows_output = report.rows_output,
            "Preprocessor fitted"
        );
        self.report = Some(report);

        Ok(data)
    }

    /// Apply the fitted imputation, quality score, log transform and scaling
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(ExoplanetError::ModelNotFitted);
        }

        let mut data = self.imputer.transform(df)?;
        data = add_quality_column(&data, &self.config)?;
        data = self.log_transform.transform(&data)?;
        self.scaler.transform(&data)
    }

    /// Extract the model input matrix; non-finite cells become 0.0
    pub fn to_matrix(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(ExoplanetError::ModelNotFitted);
        }
        let mut x = columns_to_array2(df, &self.model_columns())?;
        x.mapv_inplace(|v| if v.is_finite() { v } else { 0.0 });
        Ok(x)
    }

    /// `transform` followed by `to_matrix`
    pub fn transform_to_matrix(&self, df: &DataFrame) -> Result<Array2<f64>> {
        let data = self.transform(df)?;
        self.to_matrix(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::frame::column_values;

    fn training_frame() -> DataFrame {
        df!(
            "orbital_period" => &[3.5, 10.0, 1.2, 50.0, -4.0, 7.0, 2.2, 15.0],
            "transit_duration" => &[3.0, 4.0, 2.0, 6.0, 3.0, 3.5, 1.8, 5.0],
            "transit_depth" => &[0.01, 0.005, 0.02, 0.003, 0.01, 0.008, 0.024, 0.004],
            "snr" => &[30.0, 12.0, 8.0, 15.0, 10.0, 5.0, 35.0, 20.0],
            "stellar_mass" => &[1.1, 0.9, 1.3, 1.0, 1.0, 0.8, 0.82, 1.2],
            "stellar_temp" => &[6000.0, 5500.0, 6300.0, 5700.0, 5600.0, 5000.0, 5040.0, 6100.0],
            "stellar_magnitude" => &[8.0, 12.0, 11.0, 13.0, 12.0, 14.0, 7.7, 10.0],
            "label" => &["a", "b", "c", "d", "e", "f", "g", "h"]
        )
        .unwrap()
    }

    fn raw_columns() -> Vec<String> {
        crate::data::FEATURE_COLUMNS.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_fit_transform_drops_artifacts_and_keeps_labels() {
        let mut pre = ExoplanetPreprocessor::with_config(
            PreprocessingConfig::default().with_outlier_handling(false, 4.0),
        );
        let out = pre.fit_transform(&training_frame(), &raw_columns()).unwrap();

        assert_eq!(out.height(), 7);
        assert_eq!(pre.report().unwrap().artifacts_removed, 1);
        assert!(out.column("label").is_ok());
        assert!(out.column(QUALITY_COLUMN).is_ok());
    }

    #[test]
    fn test_transform_never_drops_rows() {
        let mut pre = ExoplanetPreprocessor::new();
        pre.fit_transform(&training_frame(), &raw_columns()).unwrap();

        let out = pre.transform(&training_frame()).unwrap();
        assert_eq!(out.height(), 8);
    }

    #[test]
    fn test_transform_is_deterministic() {
        let mut pre = ExoplanetPreprocessor::new();
        pre.fit_transform(&training_frame(), &raw_columns()).unwrap();

        let a = pre.transform_to_matrix(&training_frame()).unwrap();
        let b = pre.transform_to_matrix(&training_frame()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.ncols(), 8);
        assert!(a.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_quality_column_is_not_scaled() {
        let mut pre = ExoplanetPreprocessor::new();
        let out = pre.fit_transform(&training_frame(), &raw_columns()).unwrap();
        let q = column_values(&out, QUALITY_COLUMN).unwrap();
        assert!(q.iter().all(|v| *v > 0.0 && *v <= 1.0));
    }

    #[test]
    fn test_missing_feature_column_fails_before_fit() {
        let mut pre = ExoplanetPreprocessor::new();
        let df = df!("orbital_period" => &[1.0]).unwrap();
        let err = pre.fit_transform(&df, &raw_columns()).unwrap_err();
        assert!(matches!(err, ExoplanetError::FeatureNotFound(_)));
        assert!(!pre.is_fitted());
    }

    #[test]
    fn test_unfitted_transform_fails() {
        let pre = ExoplanetPreprocessor::new();
        assert!(matches!(pre.transform(&training_frame()), Err(ExoplanetError::ModelNotFitted)));
    }
}
