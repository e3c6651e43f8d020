//! Error types for the exoplanet classification pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, ExoplanetError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum ExoplanetError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Preprocessing error: {0}")]
    PreprocessingError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Inference error: {0}")]
    InferenceError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Model bundle version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

impl From<polars::error::PolarsError> for ExoplanetError {
    fn from(err: polars::error::PolarsError) -> Self {
        ExoplanetError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for ExoplanetError {
    fn from(err: serde_json::Error) -> Self {
        ExoplanetError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for ExoplanetError {
    fn from(err: bincode::Error) -> Self {
        ExoplanetError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for ExoplanetError {
    fn from(err: ndarray::ShapeError) -> Self {
        ExoplanetError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ExoplanetError::DataError("test error".to_string());
        assert_eq!(err.to_string(), "Data error: test error");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ExoplanetError = io_err.into();
        assert!(matches!(err, ExoplanetError::IoError(_)));
    }

    #[test]
    fn test_version_mismatch_display() {
        let err = ExoplanetError::VersionMismatch { expected: 2, found: 1 };
        assert_eq!(
            err.to_string(),
            "Model bundle version mismatch: expected 2, found 1"
        );
    }
}
