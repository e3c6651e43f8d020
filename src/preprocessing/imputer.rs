//! Missing value imputation

use crate::error::{ExoplanetError, Result};
use crate::utils::frame::{column_values, finite_median};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Median imputer fitted once on training data
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Imputer {
    medians: HashMap<String, f64>,
    columns: Vec<String>,
    is_fitted: bool,
}

impl Imputer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn median(&self, column: &str) -> Option<f64> {
        self.medians.get(column).copied()
    }

    /// Record the median of every column's finite values (0.0 if none)
    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        self.medians.clear();
        for name in columns {
            let values = column_values(df, name)?;
            self.medians.insert(name.clone(), finite_median(&values).unwrap_or(0.0));
        }
        self.columns = columns.to_vec();
        self.is_fitted = true;
        Ok(self)
    }

    /// Replace nulls and non-finite values with the fitted medians
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(ExoplanetError::ModelNotFitted);
        }

        let mut result = df.clone();
        for name in &self.columns {
            let median = self.medians[name];
            let filled: Vec<f64> = column_values(df, name)?
                .into_iter()
                .map(|v| if v.is_finite() { v } else { median })
                .collect();
            result
                .with_column(Series::new(name.as_str().into(), filled))
                .map_err(|e| ExoplanetError::DataError(e.to_string()))?;
        }
        Ok(result)
    }

    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_fill() {
        let df = DataFrame::new(vec![
            Series::new("a".into(), &[Some(1.0), None, Some(3.0), Some(10.0)]).into(),
        ])
        .unwrap();

        let mut imputer = Imputer::new();
        let out = imputer.fit_transform(&df, &["a".to_string()]).unwrap();
        assert_eq!(imputer.median("a"), Some(3.0));
        assert_eq!(column_values(&out, "a").unwrap(), vec![1.0, 3.0, 3.0, 10.0]);
    }

    #[test]
    fn test_uses_training_median_at_inference() {
        let train = df!("a" => &[2.0, 4.0, 6.0]).unwrap();
        let mut imputer = Imputer::new();
        imputer.fit(&train, &["a".to_string()]).unwrap();

        let new = DataFrame::new(vec![Series::new("a".into(), &[None::<f64>]).into()]).unwrap();
        let out = imputer.transform(&new).unwrap();
        assert_eq!(column_values(&out, "a").unwrap(), vec![4.0]);
    }
}
