//! System configuration

use serde::{Deserialize, Serialize};

use crate::ensemble::{EnsembleConfig, RegressorConfig};
use crate::error::{ExoplanetError, Result};
use crate::preprocessing::PreprocessingConfig;

/// What `load_or_train` does when no bundle exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartupPolicy {
    /// Train on a generated catalog and save the bundle
    TrainIfMissing,
    /// Fail with a clear error
    RequireBundle,
}

/// Configuration for training the full pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    pub ensemble: EnsembleConfig,

    pub regressors: RegressorConfig,

    pub preprocessing: PreprocessingConfig,

    /// Fraction of rows held out for evaluation
    pub test_size: f64,

    /// Seed for the split and every member
    pub random_state: u64,

    /// Properties with fewer valid planet rows are not trained
    pub min_property_samples: usize,

    /// Synthetic rows generated when training without a catalog
    pub synthetic_samples: usize,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            ensemble: EnsembleConfig::default(),
            regressors: RegressorConfig::default(),
            preprocessing: PreprocessingConfig::default(),
            test_size: 0.2,
            random_state: 42,
            min_property_samples: 10,
            synthetic_samples: 5000,
        }
    }
}

impl SystemConfig {
    /// Create a new configuration with production hyperparameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Reduced model sizes and catalog, for tests and demos
    pub fn fast() -> Self {
        Self {
            ensemble: EnsembleConfig::fast(),
            regressors: RegressorConfig::fast(),
            synthetic_samples: 800,
            ..Self::default()
        }
    }

    /// Builder method to set the held-out fraction
    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    /// Builder method to set the seed everywhere it is used
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self.ensemble.random_state = seed;
        self.regressors.random_state = seed;
        self
    }

    /// Builder method to set the property training threshold
    pub fn with_min_property_samples(mut self, n: usize) -> Self {
        self.min_property_samples = n;
        self.regressors.min_samples = n;
        self
    }

    /// Builder method to set the synthetic catalog size
    pub fn with_synthetic_samples(mut self, n: usize) -> Self {
        self.synthetic_samples = n;
        self
    }

    /// Builder method to keep only the named ensemble members
    pub fn with_members(mut self, names: &[&str]) -> Self {
        self.ensemble = self.ensemble.with_members(names);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(ExoplanetError::InvalidParameter {
                name: "test_size".to_string(),
                value: self.test_size.to_string(),
                reason: "must be in (0, 1)".to_string(),
            });
        }
        if self.ensemble.members.is_empty() {
            return Err(ExoplanetError::ConfigError("ensemble has no members".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SystemConfig::default();
        assert_eq!(config.test_size, 0.2);
        assert_eq!(config.random_state, 42);
        assert_eq!(config.ensemble.members.len(), 6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_seed_propagates() {
        let config = SystemConfig::fast().with_random_state(7).with_min_property_samples(25);
        assert_eq!(config.ensemble.random_state, 7);
        assert_eq!(config.regressors.random_state, 7);
        assert_eq!(config.regressors.min_samples, 25);
    }

    #[test]
    fn test_invalid_test_size() {
        assert!(SystemConfig::default().with_test_size(1.0).validate().is_err());
        assert!(SystemConfig::default().with_members(&[]).validate().is_err());
    }
}
