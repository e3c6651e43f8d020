//! Exoplanet transit classifier
//!
//! Classifies transit observations as confirmed exoplanets, planetary
//! candidates or false positives, and estimates planet properties for the
//! planet-like ones.
//!
//! # Modules
//!
//! ## Pipeline
//! - [`feature_engineering`] - Physics-derived transit features
//! - [`preprocessing`] - Artifact removal, imputation, outlier filtering, robust scaling
//! - [`ensemble`] - Soft-voting classifier ensemble and property regressors
//! - [`correction`] - Heuristic confirmation corrector
//! - [`system`] - End-to-end training, prediction and bundle persistence
//!
//! ## Models and evaluation
//! - [`training`] - Tree, boosting, linear and neural models, metrics, cross-validation
//! - [`calibration`] - Calibration metrics
//! - [`validation`] - Cross-validation and hold-out reports
//! - [`diagnostics`] - Per-observation explanations
//!
//! ## Data
//! - [`data`] - Observation, label and catalog types, CSV loading
//! - [`synthetic`] - Seeded synthetic catalogs and reference planets
//!
//! ## Services
//! - [`server`] - HTTP API
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Data
pub mod data;
pub mod synthetic;

// Pipeline
pub mod feature_engineering;
pub mod preprocessing;
pub mod training;
pub mod ensemble;
pub mod correction;
pub mod system;

// Evaluation
pub mod calibration;
pub mod validation;
pub mod diagnostics;

// Services
pub mod server;
pub mod cli;

// Utilities
pub mod utils;

pub use error::{ExoplanetError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{ExoplanetError, Result};

    // Data
    pub use crate::data::{Catalog, CatalogEntry, ClassLabel, ClassificationResult, Observation, PropertyTargets};

    // Pipeline
    pub use crate::feature_engineering::TransitFeatureEngineer;
    pub use crate::preprocessing::{ExoplanetPreprocessor, PreprocessingConfig};
    pub use crate::ensemble::{EnsembleConfig, ExoplanetEnsemble, PropertyRegressors, RegressorConfig};
    pub use crate::correction::{ConfirmationCorrector, Correction};
    pub use crate::system::{ClassificationSystem, Prediction, StartupPolicy, SystemConfig};

    // Evaluation
    pub use crate::validation::{ModelValidator, ValidationReport};
    pub use crate::diagnostics::{diagnose, DiagnosticReport};

    // Synthetic data
    pub use crate::synthetic::{training_catalog, CatalogGenerator};
}
