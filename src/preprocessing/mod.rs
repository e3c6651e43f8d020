//! Data preprocessing module
//!
//! Training-time cleaning and inference-time transformation of engineered
//! observation frames:
//! - Physical artifact removal
//! - Median imputation
//! - log1p skew correction with fitted offsets
//! - Modified Z-score outlier rejection
//! - Quality scoring
//! - Robust scaling

mod artifacts;
mod config;
mod imputer;
mod pipeline;
mod quality;
mod scaler;
pub mod outlier;
pub mod transforms;

pub use artifacts::{is_plausible, remove_artifacts};
pub use config::{PhysicalBounds, PreprocessingConfig};
pub use imputer::Imputer;
pub use outlier::{ColumnOutliers, OutlierFilter, OutlierReport};
pub use pipeline::{ExoplanetPreprocessor, PreprocessingReport};
pub use quality::{add_quality_column, quality_score, QUALITY_COLUMN};
pub use scaler::{Scaler, ScalerParams};
pub use transforms::LogTransform;
