//! Outlier rejection using the modified Z-score
//!
//! `z = 0.6745 * (x - median) / MAD`, where MAD is the median absolute
//! deviation. Columns are screened one after another, each on the frame left
//! over by the previous column.

use crate::error::{ExoplanetError, Result};
use crate::utils::frame::{column_values, finite_median};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

const MODIFIED_Z_CONSTANT: f64 = 0.6745;

/// Rows removed while screening one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnOutliers {
    pub column: String,
    pub removed: usize,
    /// `true` when the column had zero MAD and was not screened
    pub skipped: bool,
}

/// Summary of a filtering pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutlierReport {
    pub rows_before: usize,
    pub rows_after: usize,
    pub per_column: Vec<ColumnOutliers>,
}

impl OutlierReport {
    pub fn total_removed(&self) -> usize {
        self.rows_before - self.rows_after
    }
}

/// Modified Z-score outlier filter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlierFilter {
    threshold: f64,
}

impl Default for OutlierFilter {
    fn default() -> Self {
        Self { threshold: 4.0 }
    }
}

impl OutlierFilter {
    pub fn new(threshold: f64) -> Result<Self> {
        if !(threshold > 0.0) {
            return Err(ExoplanetError::InvalidParameter {
                name: "outlier_threshold".to_string(),
                value: threshold.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Modified Z-scores for a column, `None` when MAD is zero or undefined
    pub fn modified_z_scores(values: &[f64]) -> Option<Vec<f64>> {
        let median = finite_median(values)?;
        let deviations: Vec<f64> = values.iter().map(|v| (v - median).abs()).collect();
        let mad = finite_median(&deviations)?;
        if mad == 0.0 {
            return None;
        }
        Some(
            values
                .iter()
                .map(|v| MODIFIED_Z_CONSTANT * (v - median) / mad)
                .collect(),
        )
    }

    /// Drop rows whose |z| is not below the threshold, column by column
    pub fn filter(&self, df: &DataFrame, columns: &[String]) -> Result<(DataFrame, OutlierReport)> {
        let mut current = df.clone();
        let mut report = OutlierReport {
            rows_before: df.height(),
            rows_after: df.height(),
            per_column: Vec::with_capacity(columns.len()),
        };

        for name in columns {
            let values = column_values(&current, name)?;
            let Some(scores) = Self::modified_z_scores(&values) else {
                debug!(column = %name, "Zero MAD, skipping outlier screen");
                report.per_column.push(ColumnOutliers {
                    column: name.clone(),
                    removed: 0,
                    skipped: true,
                });
                continue;
            };

            let mask: BooleanChunked = scores
                .iter()
                .map(|z| z.abs() < self.threshold)
                .collect();
            let before = current.height();
            current = current
                .filter(&mask)
                .map_err(|e| ExoplanetError::PreprocessingError(e.to_string()))?;

            report.per_column.push(ColumnOutliers {
                column: name.clone(),
                removed: before - current.height(),
                skipped: false,
            });
        }

        report.rows_after = current.height();
        Ok((current, report))
    }
}
