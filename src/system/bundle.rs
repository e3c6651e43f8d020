//! Versioned model bundle persistence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::ensemble::{ExoplanetEnsemble, PropertyRegressors};
use crate::error::{ExoplanetError, Result};
use crate::feature_engineering::TransitFeatureEngineer;
use crate::preprocessing::ExoplanetPreprocessor;

/// Bumped whenever the serialized layout changes
pub const FORMAT_VERSION: u32 = 1;

/// File name of the bundle inside the models directory
pub const BUNDLE_FILE: &str = "exoplanet_bundle.bin";

/// Written ahead of the bundle body so a layout change is detected before decoding it
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BundleHeader {
    format_version: u32,
}

/// Short description of the training run stored with the bundle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub training_rows: usize,
    pub test_rows: usize,
    pub test_accuracy: f64,
    pub members: Vec<String>,
    pub trained_properties: Vec<String>,
}

/// Bundle metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleMetadata {
    pub format_version: u32,
    /// Crate version that produced the bundle
    pub crate_version: String,
    pub created_at: DateTime<Utc>,
    pub training: TrainingSummary,
}

impl BundleMetadata {
    pub fn new(training: TrainingSummary) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: Utc::now(),
            training,
        }
    }
}

/// Every fitted pipeline component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelBundle {
    pub metadata: BundleMetadata,
    pub feature_engineer: TransitFeatureEngineer,
    pub preprocessor: ExoplanetPreprocessor,
    pub classifier: ExoplanetEnsemble,
    pub regressors: PropertyRegressors,
}

impl ModelBundle {
    /// Path of the bundle file inside `dir`
    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(BUNDLE_FILE)
    }

    /// Whether `dir` holds a bundle file
    pub fn exists_in(dir: &Path) -> bool {
        Self::path_in(dir).is_file()
    }

    /// Serialize into `dir`, creating it when needed. Returns the file path.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = Self::path_in(dir);

        let mut writer = BufWriter::new(File::create(&path)?);
        let header = BundleHeader { format_version: FORMAT_VERSION };
        bincode::serialize_into(&mut writer, &header)?;
        bincode::serialize_into(&mut writer, self)?;
        writer.flush()?;

        info!(
            path = %path.display(),
            format_version = FORMAT_VERSION,
            "Saved model bundle"
        );
        Ok(path)
    }

    /// Load from `dir`; a different format version is a hard error
    pub fn load(dir: &Path) -> Result<Self> {
        let path = Self::path_in(dir);
        let file = File::open(&path).map_err(|e| {
            ExoplanetError::DataError(format!("Failed to open model bundle {}: {}", path.display(), e))
        })?;
        let mut reader = BufReader::new(file);

        let header: BundleHeader = bincode::deserialize_from(&mut reader)?;
        if header.format_version != FORMAT_VERSION {
            return Err(ExoplanetError::VersionMismatch {
                expected: FORMAT_VERSION,
                found: header.format_version,
            });
        }
        let bundle: ModelBundle = bincode::deserialize_from(&mut reader)?;

        info!(
            path = %path.display(),
            crate_version = %bundle.metadata.crate_version,
            created_at = %bundle.metadata.created_at,
            "Loaded model bundle"
        );
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_mismatch_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = ModelBundle::path_in(dir.path());
        let bytes = bincode::serialize(&BundleHeader { format_version: FORMAT_VERSION + 1 }).unwrap();
        fs::write(&path, bytes).unwrap();

        match ModelBundle::load(dir.path()) {
            Err(ExoplanetError::VersionMismatch { expected, found }) => {
                assert_eq!(expected, FORMAT_VERSION);
                assert_eq!(found, FORMAT_VERSION + 1);
            }
            other => panic!("expected version mismatch, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_missing_bundle() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!ModelBundle::exists_in(dir.path()));
        assert!(matches!(ModelBundle::load(dir.path()), Err(ExoplanetError::DataError(_))));
    }

    #[test]
    fn test_metadata_records_crate_version() {
        let meta = BundleMetadata::new(TrainingSummary::default());
        assert_eq!(meta.format_version, FORMAT_VERSION);
        assert_eq!(meta.crate_version, env!("CARGO_PKG_VERSION"));
    }
}
