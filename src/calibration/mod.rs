//! Probability calibration diagnostics
//!
//! Measures how well the ensemble's confidence tracks its accuracy:
//! - Expected and maximum calibration error over equal-width bins
//! - Multiclass Brier score
//! - Reliability diagram data

mod metrics;

pub use metrics::{
    brier_score, compute_calibration_metrics, expected_calibration_error, maximum_calibration_error,
    multiclass_brier_score, reliability_diagram, CalibrationMetrics, ReliabilityDiagram, DEFAULT_BINS,
};
