//! Per-observation quality score

use super::config::PreprocessingConfig;
use crate::error::{ExoplanetError, Result};
use crate::utils::frame::column_values;
use polars::prelude::*;

/// Name of the appended quality column
pub const QUALITY_COLUMN: &str = "quality_score";

/// Quality score in (0, 1]: starts at 1.0, penalized for low SNR and for a
/// depth below the 1/SNR noise floor. Both inputs are in raw units.
pub fn quality_score(snr: f64, depth: f64, config: &PreprocessingConfig) -> f64 {
    let mut score = 1.0;
    if snr < config.low_snr_threshold {
        score *= config.low_snr_penalty;
    }
    if snr > 0.0 && depth < 1.0 / snr {
        score *= config.depth_noise_penalty;
    }
    score
}

/// Append (or replace) the quality column computed from raw `snr` and `transit_depth`
pub fn add_quality_column(df: &DataFrame, config: &PreprocessingConfig) -> Result<DataFrame> {
    let snr = column_values(df, "snr")?;
    let depth = column_values(df, "transit_depth")?;

    let scores: Vec<f64> = snr
        .iter()
        .zip(depth.iter())
        .map(|(&s, &d)| quality_score(s, d, config))
        .collect();

    let mut result = df.clone();
    result
        .with_column(Series::new(QUALITY_COLUMN.into(), scores))
        .map_err(|e| ExoplanetError::DataError(e.to_string()))?;
    Ok(result)
}
