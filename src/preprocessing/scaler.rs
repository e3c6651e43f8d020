//! Feature scaling implementations

use crate::error::{ExoplanetError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fitted median and IQR of one column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub center: f64,
    pub scale: f64,
}

/// Column-wise robust scaler: `(x - median) / IQR`, with a zero IQR mapped to 1
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scaler {
    params: HashMap<String, ScalerParams>,
    columns: Vec<String>,
    is_fitted: bool,
}

impl Scaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Fitted parameters for a column
    pub fn params(&self, column: &str) -> Option<ScalerParams> {
        self.params.get(column).copied()
    }

    /// Fit the scaler to the data
    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        self.params.clear();
        for col_name in columns {
            let column = df
                .column(col_name)
                .map_err(|_| ExoplanetError::FeatureNotFound(col_name.clone()))?;
            let series = column
                .as_materialized_series()
                .cast(&DataType::Float64)
                .map_err(|e| ExoplanetError::DataError(e.to_string()))?;

            let params = self.compute_params(&series)?;
            self.params.insert(col_name.clone(), params);
        }

        self.columns = columns.to_vec();
        self.is_fitted = true;
        Ok(self)
    }

    /// Transform the data.
    /// Builds all replacement columns first, then applies them in place.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(ExoplanetError::ModelNotFitted);
        }

        let replacements: Vec<Series> = self
            .columns
            .iter()
            .map(|col_name| {
                let column = df
                    .column(col_name)
                    .map_err(|_| ExoplanetError::FeatureNotFound(col_name.clone()))?;
                let series = column
                    .as_materialized_series()
                    .cast(&DataType::Float64)
                    .map_err(|e| ExoplanetError::DataError(e.to_string()))?;
                self.scale_series(&series, &self.params[col_name])
            })
            .collect::<Result<Vec<_>>>()?;

        let mut result = df.clone();
        for scaled in replacements {
            result
                .with_column(scaled)
                .map_err(|e| ExoplanetError::DataError(e.to_string()))?;
        }

        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    /// Inverse transform the data
    pub fn inverse_transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(ExoplanetError::ModelNotFitted);
        }

        let mut result = df.clone();
        for col_name in &self.columns {
            let Ok(column) = df.column(col_name) else { continue };
            let params = self.params[col_name];
            let ca = column
                .as_materialized_series()
                .f64()
                .map_err(|e| ExoplanetError::DataError(e.to_string()))?
                .clone();
            let unscaled: Float64Chunked = ca
                .into_iter()
                .map(|opt| opt.map(|v| v * params.scale + params.center))
                .collect();
            result
                .with_column(unscaled.with_name(col_name.as_str().into()).into_series())
                .map_err(|e| ExoplanetError::DataError(e.to_string()))?;
        }

        Ok(result)
    }

    /// Scale a single value of a fitted column
    pub fn scale_value(&self, column: &str, value: f64) -> Result<f64> {
        let params = self
            .params
            .get(column)
            .ok_or_else(|| ExoplanetError::FeatureNotFound(column.to_string()))?;
        Ok((value - params.center) / params.scale)
    }

    fn compute_params(&self, series: &Series) -> Result<ScalerParams> {
        let ca = series
            .f64()
            .map_err(|e| ExoplanetError::DataError(e.to_string()))?;

        let median = ca.median().unwrap_or(0.0);
        let q1 = ca.quantile(0.25, QuantileMethod::Linear).ok().flatten().unwrap_or(0.0);
        let q3 = ca.quantile(0.75, QuantileMethod::Linear).ok().flatten().unwrap_or(1.0);
        let params = ScalerParams { center: median, scale: non_zero(q3 - q1) };
        Ok(params)
    }

    fn scale_series(&self, series: &Series, params: &ScalerParams) -> Result<Series> {
        let ca = series
            .f64()
            .map_err(|e| ExoplanetError::DataError(e.to_string()))?;

        let scaled: Float64Chunked = ca
            .into_iter()
            .map(|opt| opt.map(|v| (v - params.center) / params.scale))
            .collect();

        Ok(scaled.with_name(series.name().clone()).into_series())
    }
}

fn non_zero(scale: f64) -> f64 {
    if scale == 0.0 || !scale.is_finite() {
        1.0
    } else {
        scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_robust_scaler_uses_median_and_iqr() {
        let df = DataFrame::new(vec![
            Series::new("a".into(), &[1.0, 2.0, 3.0, 4.0, 5.0]).into(),
        ])
        .unwrap();

        let mut scaler = Scaler::new();
        let result = scaler.fit_transform(&df, &cols(&["a"])).unwrap();

        let params = scaler.params("a").unwrap();
        assert_eq!(params.center, 3.0);
        assert_eq!(params.scale, 2.0);

        let col = result.column("a").unwrap().f64().unwrap();
        assert_eq!(col.get(0), Some(-1.0));
        assert_eq!(col.get(2), Some(0.0));
    }

    #[test]
    fn test_constant_column_has_unit_scale() {
        let df = df!("a" => &[7.0, 7.0, 7.0]).unwrap();
        let mut scaler = Scaler::new();
        scaler.fit(&df, &cols(&["a"])).unwrap();
        assert_eq!(scaler.params("a").unwrap().scale, 1.0);
    }

    #[test]
    fn test_inverse_transform() {
        let df = df!("a" => &[1.0, 2.0, 3.0, 4.0, 10.0], "b" => &[0.5, 0.1, 0.2, 0.9, 0.3]).unwrap();

        let mut scaler = Scaler::new();
        let scaled = scaler.fit_transform(&df, &cols(&["a", "b"])).unwrap();
        let unscaled = scaler.inverse_transform(&scaled).unwrap();

        for name in ["a", "b"] {
            let original = df.column(name).unwrap().f64().unwrap();
            let restored = unscaled.column(name).unwrap().f64().unwrap();
            for (o, r) in original.into_iter().zip(restored.into_iter()) {
                assert!((o.unwrap() - r.unwrap()).abs() < 1e-10);
            }
        }
    }

    #[test]
    fn test_transform_before_fit_fails() {
        let df = df!("a" => &[1.0]).unwrap();
        let scaler = Scaler::new();
        assert!(matches!(scaler.transform(&df), Err(ExoplanetError::ModelNotFitted)));
    }

    #[test]
    fn test_scale_value_matches_frame_transform() {
        let df = df!("a" => &[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let mut scaler = Scaler::new();
        scaler.fit(&df, &cols(&["a"])).unwrap();
        assert_eq!(scaler.scale_value("a", 5.0).unwrap(), 1.0);
    }
}
