//! Preprocessing configuration

use serde::{Deserialize, Serialize};
use crate::data::FEATURE_COLUMNS;

/// Open interval bounds for physically plausible observations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalBounds {
    /// Exclusive (min, max) transit depth
    pub transit_depth: (f64, f64),
    /// Exclusive (min, max) stellar temperature in Kelvin
    pub stellar_temp: (f64, f64),
    /// Exclusive (min, max) stellar mass in solar masses
    pub stellar_mass: (f64, f64),
}

impl Default for PhysicalBounds {
    fn default() -> Self {
        Self {
            transit_depth: (0.0, 1.0),
            stellar_temp: (2000.0, 50000.0),
            stellar_mass: (0.1, 100.0),
        }
    }
}

/// Configuration for the training-time cleaning pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Drop rows outside physical bounds
    pub remove_artifacts: bool,

    pub bounds: PhysicalBounds,

    /// Right-skewed columns that get a log1p transform
    pub log_columns: Vec<String>,

    /// Whether to reject outlier rows during fit
    pub handle_outliers: bool,

    /// Modified Z-score threshold
    pub outlier_threshold: f64,

    /// Columns screened for outliers; `None` screens every scaled column
    pub outlier_columns: Option<Vec<String>>,

    /// Quality score penalty applies below this SNR
    pub low_snr_threshold: f64,

    pub low_snr_penalty: f64,

    /// Penalty when the depth is below the 1/SNR noise floor
    pub depth_noise_penalty: f64,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            remove_artifacts: true,
            bounds: PhysicalBounds::default(),
            log_columns: vec![
                "orbital_period".to_string(),
                "transit_duration".to_string(),
                "transit_depth".to_string(),
            ],
            handle_outliers: true,
            outlier_threshold: 4.0,
            outlier_columns: Some(FEATURE_COLUMNS.iter().map(|s| s.to_string()).collect()),
            low_snr_threshold: 7.0,
            low_snr_penalty: 0.7,
            depth_noise_penalty: 0.5,
        }
    }
}

impl PreprocessingConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to enable/disable outlier rejection
    pub fn with_outlier_handling(mut self, enabled: bool, threshold: f64) -> Self {
        self.handle_outliers = enabled;
        self.outlier_threshold = threshold;
        self
    }

    /// Builder method to choose the screened columns (`None` = all)
    pub fn with_outlier_columns(mut self, columns: Option<Vec<String>>) -> Self {
        self.outlier_columns = columns;
        self
    }

    /// Builder method to enable/disable artifact removal
    pub fn with_artifact_removal(mut self, enabled: bool) -> Self {
        self.remove_artifacts = enabled;
        self
    }

    /// Builder method to set the log-transformed columns
    pub fn with_log_columns(mut self, columns: Vec<String>) -> Self {
        self.log_columns = columns;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PreprocessingConfig::default();
        assert_eq!(config.outlier_threshold, 4.0);
        assert_eq!(config.log_columns.len(), 3);
        assert_eq!(config.outlier_columns.as_ref().map(|c| c.len()), Some(7));
    }

    #[test]
    fn test_builder() {
        let config = PreprocessingConfig::new()
            .with_outlier_handling(false, 3.5)
            .with_outlier_columns(None);
        assert!(!config.handle_outliers);
        assert_eq!(config.outlier_threshold, 3.5);
        assert!(config.outlier_columns.is_none());
    }
}
