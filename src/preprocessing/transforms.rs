//! Skew correction for right-skewed observation columns

use crate::error::{ExoplanetError, Result};
use crate::utils::frame::column_values;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Added on top of `-min` when a column has non-positive values
const SHIFT_EPSILON: f64 = 1e-10;

/// log1p transform with per-column offsets fitted on training data
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogTransform {
    offsets: HashMap<String, f64>,
    columns: Vec<String>,
    is_fitted: bool,
}

impl LogTransform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Fitted shift for a column (0.0 when the training minimum was positive)
    pub fn offset(&self, column: &str) -> Option<f64> {
        self.offsets.get(column).copied()
    }

    /// Fit the offsets. A column whose minimum is <= 0 is shifted by `-min + 1e-10`.
    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        self.offsets.clear();
        for name in columns {
            let min_val = column_values(df, name)?
                .into_iter()
                .filter(|v| v.is_finite())
                .fold(f64::INFINITY, f64::min);

            let offset = if min_val.is_finite() && min_val <= 0.0 {
                -min_val + SHIFT_EPSILON
            } else {
                0.0
            };
            self.offsets.insert(name.clone(), offset);
        }
        self.columns = columns.to_vec();
        self.is_fitted = true;
        Ok(self)
    }

    /// Apply `ln(1 + x + offset)` to every fitted column
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(ExoplanetError::ModelNotFitted);
        }

        let mut result = df.clone();
        for name in &self.columns {
            let offset = self.offsets[name];
            let values: Vec<f64> = column_values(df, name)?
                .into_iter()
                .map(|x| (x + offset).ln_1p())
                .collect();
            result
                .with_column(Series::new(name.as_str().into(), values))
                .map_err(|e| ExoplanetError::DataError(e.to_string()))?;
        }
        Ok(result)
    }

    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    /// Map a transformed value back to the original scale
    pub fn inverse_value(&self, column: &str, y: f64) -> Option<f64> {
        self.offsets.get(column).map(|offset| y.exp_m1() - offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_column_has_no_offset() {
        let df = df!("p" => &[1.0, 10.0, 100.0]).unwrap();
        let mut log = LogTransform::new();
        let out = log.fit_transform(&df, &["p".to_string()]).unwrap();

        assert_eq!(log.offset("p"), Some(0.0));
        let values = column_values(&out, "p").unwrap();
        assert!((values[1] - 11.0f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_non_positive_minimum_is_shifted() {
        let df = df!("p" => &[-2.0, 0.0, 3.0]).unwrap();
        let mut log = LogTransform::new();
        log.fit(&df, &["p".to_string()]).unwrap();
        assert!((log.offset("p").unwrap() - (2.0 + 1e-10)).abs() < 1e-15);
    }

    #[test]
    fn test_offset_reused_at_inference() {
        let train = df!("p" => &[-1.0, 5.0]).unwrap();
        let mut log = LogTransform::new();
        log.fit(&train, &["p".to_string()]).unwrap();

        let new = df!("p" => &[-1.0]).unwrap();
        let out = log.transform(&new).unwrap();
        let v = column_values(&out, "p").unwrap()[0];
        assert!(v.is_finite());
        assert!((log.inverse_value("p", v).unwrap() + 1.0).abs() < 1e-9);
    }
}
