//! CSV catalog loading and writing

use crate::error::{ExoplanetError, Result};
use crate::utils::frame::{column_values, nullable_column};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use std::time::Instant;
use tracing::info;

use super::{Catalog, CatalogEntry, ClassLabel, Observation, PropertyTargets};
use super::{FEATURE_COLUMNS, LABEL_COLUMN, PROPERTY_COLUMNS};

/// Load a labeled catalog from CSV.
///
/// The 7 feature columns and the `classification` column are required.
/// Property columns are optional; absent columns and empty cells become NaN.
pub fn load_catalog(path: &Path) -> Result<Catalog> {
    let start = Instant::now();
    let file = File::open(path)?;

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(100))
        .into_reader_with_file_handle(file)
        .finish()
        .map_err(|e| ExoplanetError::DataError(e.to_string()))?;

    let catalog = catalog_from_dataframe(&df)?;
    info!(
        path = %path.display(),
        rows = catalog.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Loaded catalog"
    );
    Ok(catalog)
}

/// Write a catalog to CSV with a header row
pub fn write_catalog(path: &Path, catalog: &Catalog) -> Result<()> {
    let mut df = catalog_to_dataframe(catalog)?;
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)
        .map_err(|e| ExoplanetError::DataError(e.to_string()))?;
    info!(path = %path.display(), rows = catalog.len(), "Wrote catalog");
    Ok(())
}

/// Load unlabeled observations from CSV; only the 7 feature columns are read
pub fn load_observations(path: &Path) -> Result<Vec<Observation>> {
    let file = File::open(path)?;
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(100))
        .into_reader_with_file_handle(file)
        .finish()
        .map_err(|e| ExoplanetError::DataError(e.to_string()))?;

    let observations = observations_from_dataframe(&df)?;
    info!(path = %path.display(), rows = observations.len(), "Loaded observations");
    Ok(observations)
}

/// Read the 7 feature columns; nulls become NaN
pub fn observations_from_dataframe(df: &DataFrame) -> Result<Vec<Observation>> {
    let features: Vec<Vec<f64>> = FEATURE_COLUMNS
        .iter()
        .map(|name| column_values(df, name))
        .collect::<Result<_>>()?;

    Ok((0..df.height())
        .map(|row| {
            let mut obs = [0.0; 7];
            for (j, col) in features.iter().enumerate() {
                obs[j] = col[row];
            }
            Observation::from_values(obs)
        })
        .collect())
}

/// Convert a DataFrame with catalog columns into typed entries
pub fn catalog_from_dataframe(df: &DataFrame) -> Result<Catalog> {
    let observations = observations_from_dataframe(df)?;

    let n_rows = df.height();
    let properties: Vec<Vec<f64>> = PROPERTY_COLUMNS
        .iter()
        .map(|name| {
            if df.column(name).is_ok() {
                column_values(df, name)
            } else {
                Ok(vec![f64::NAN; n_rows])
            }
        })
        .collect::<Result<_>>()?;

    let labels = labels_from_dataframe(df)?;

    let entries = observations
        .into_iter()
        .enumerate()
        .map(|(row, observation)| {
            let mut props = [0.0; 4];
            for (j, col) in properties.iter().enumerate() {
                props[j] = col[row];
            }
            CatalogEntry {
                observation,
                label: labels[row],
                properties: PropertyTargets::from_values(props),
            }
        })
        .collect();

    Ok(Catalog::new(entries))
}

/// Parse the `classification` column into labels
pub fn labels_from_dataframe(df: &DataFrame) -> Result<Vec<ClassLabel>> {
    let labels_column = df
        .column(LABEL_COLUMN)
        .map_err(|_| ExoplanetError::FeatureNotFound(LABEL_COLUMN.to_string()))?;
    labels_column
        .as_materialized_series()
        .str()
        .map_err(|e| ExoplanetError::DataError(e.to_string()))?
        .into_iter()
        .enumerate()
        .map(|(row, label)| {
            label
                .ok_or_else(|| ExoplanetError::DataError(format!("Missing classification at row {}", row)))
                .and_then(|s| s.parse::<ClassLabel>())
        })
        .collect()
}

/// Unlabeled frame with the 7 feature columns, one row per observation
pub fn observations_to_dataframe(observations: &[Observation]) -> Result<DataFrame> {
    let columns: Vec<Column> = FEATURE_COLUMNS
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let values: Vec<f64> = observations.iter().map(|o| o.values()[j]).collect();
            nullable_column(name, &values)
        })
        .collect();
    DataFrame::new(columns).map_err(|e| ExoplanetError::DataError(e.to_string()))
}

/// Convert a catalog into a DataFrame with feature, label and property columns
pub fn catalog_to_dataframe(catalog: &Catalog) -> Result<DataFrame> {
    let mut columns: Vec<Column> = Vec::with_capacity(FEATURE_COLUMNS.len() + PROPERTY_COLUMNS.len() + 1);

    for (j, name) in FEATURE_COLUMNS.iter().enumerate() {
        let values: Vec<f64> = catalog.entries.iter().map(|e| e.observation.values()[j]).collect();
        columns.push(nullable_column(name, &values));
    }

    let labels: Vec<&str> = catalog.entries.iter().map(|e| e.label.as_str()).collect();
    columns.push(Series::new(LABEL_COLUMN.into(), labels).into());

    for (j, name) in PROPERTY_COLUMNS.iter().enumerate() {
        let values: Vec<f64> = catalog.entries.iter().map(|e| e.properties.values()[j]).collect();
        columns.push(nullable_column(name, &values));
    }

    DataFrame::new(columns).map_err(|e| ExoplanetError::DataError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_catalog() -> Catalog {
        Catalog::new(vec![
            CatalogEntry {
                observation: Observation::from_values([3.52, 3.0, 0.015, 30.0, 1.11, 6091.0, 7.7]),
                label: ClassLabel::ConfirmedExoplanet,
                properties: PropertyTargets::from_values([13.8, 14.9, 0.047, 0.3]),
            },
            CatalogEntry {
                observation: Observation::from_values([1.2, 5.0, 0.2, 4.0, 1.0, 5400.0, 15.0]),
                label: ClassLabel::FalsePositive,
                properties: PropertyTargets::missing(),
            },
        ])
    }

    #[test]
    fn test_dataframe_conversion_keeps_labels_and_missing_targets() {
        let catalog = sample_catalog();
        let df = catalog_to_dataframe(&catalog).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 12);

        let back = catalog_from_dataframe(&df).unwrap();
        assert_eq!(back.entries[0].label, ClassLabel::ConfirmedExoplanet);
        assert_eq!(back.entries[1].label, ClassLabel::FalsePositive);
        assert!(back.entries[1].properties.planet_radius.is_nan());
        assert_eq!(back.entries[0].observation.snr, 30.0);
    }

    #[test]
    fn test_csv_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.csv");
        write_catalog(&path, &sample_catalog()).unwrap();

        let loaded = load_catalog(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert!((loaded.entries[0].properties.semi_major_axis - 0.047).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_label_is_rejected() {
        let df = df!(
            "orbital_period" => &[1.0],
            "transit_duration" => &[1.0],
            "transit_depth" => &[0.01],
            "snr" => &[10.0],
            "stellar_mass" => &[1.0],
            "stellar_temp" => &[5700.0],
            "stellar_magnitude" => &[12.0],
            "classification" => &["brown_dwarf"]
        )
        .unwrap();
        assert!(matches!(catalog_from_dataframe(&df), Err(ExoplanetError::DataError(_))));
    }

    #[test]
    fn test_missing_feature_column_is_reported() {
        let df = df!("orbital_period" => &[1.0], "classification" => &["false_positive"]).unwrap();
        assert!(matches!(catalog_from_dataframe(&df), Err(ExoplanetError::FeatureNotFound(_))));
    }

    #[test]
    fn test_observations_to_dataframe_writes_non_finite_as_null() {
        let obs = vec![
            Observation::from_values([3.52, 3.0, 0.015, 30.0, 1.11, 6091.0, 7.7]),
            Observation::from_values([f64::NAN, 3.0, 0.015, 30.0, 1.11, 6091.0, 7.7]),
        ];
        let df = observations_to_dataframe(&obs).unwrap();
        assert_eq!(df.shape(), (2, 7));
        assert_eq!(df.column("orbital_period").unwrap().null_count(), 1);
    }

    #[test]
    fn test_observations_load_without_labels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("observations.csv");
        let mut df = observations_to_dataframe(&[
            Observation::from_values([289.9, 7.4, 0.00492, 12.0, 0.97, 5627.0, 11.7]),
            Observation::from_values([f64::NAN, 3.0, 0.015, 30.0, 1.11, 6091.0, 7.7]),
        ])
        .unwrap();
        let mut file = File::create(&path).unwrap();
        CsvWriter::new(&mut file).include_header(true).finish(&mut df).unwrap();

        let loaded = load_observations(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].orbital_period, 289.9);
        assert!(loaded[1].orbital_period.is_nan());
    }
}
