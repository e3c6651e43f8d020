//! Observation, label and catalog types
//!
//! An [`Observation`] is the 7-field input every prediction path starts from.
//! A [`Catalog`] is a labeled collection of observations with optional
//! physical property targets, used for training and validation.

pub mod loader;

pub use loader::{
    catalog_from_dataframe, catalog_to_dataframe, labels_from_dataframe, load_catalog, load_observations,
    observations_from_dataframe, observations_to_dataframe, write_catalog,
};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::error::{ExoplanetError, Result};

/// Raw observational columns, in canonical order
pub const FEATURE_COLUMNS: [&str; 7] = [
    "orbital_period",
    "transit_duration",
    "transit_depth",
    "snr",
    "stellar_mass",
    "stellar_temp",
    "stellar_magnitude",
];

/// Physical property targets, in canonical order
pub const PROPERTY_COLUMNS: [&str; 4] = [
    "planet_radius",
    "planet_temp",
    "semi_major_axis",
    "impact_parameter",
];

/// Label column name in catalogs
pub const LABEL_COLUMN: &str = "classification";

/// Error raised while validating a raw observation payload
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ObservationError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("Invalid input values: field '{field}' is not numeric ({value})")]
    NonNumeric { field: String, value: String },

    #[error("Invalid input values: expected a JSON object")]
    NotAnObject,
}

/// A single transit observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Orbital period in days
    pub orbital_period: f64,
    /// Transit duration in hours
    pub transit_duration: f64,
    /// Fractional transit depth
    pub transit_depth: f64,
    /// Detection signal-to-noise ratio
    pub snr: f64,
    /// Stellar mass in solar masses
    pub stellar_mass: f64,
    /// Stellar effective temperature in Kelvin
    pub stellar_temp: f64,
    /// Apparent stellar magnitude
    pub stellar_magnitude: f64,
}

impl Observation {
    /// Build from values in `FEATURE_COLUMNS` order
    pub fn from_values(values: [f64; 7]) -> Self {
        Self {
            orbital_period: values[0],
            transit_duration: values[1],
            transit_depth: values[2],
            snr: values[3],
            stellar_mass: values[4],
            stellar_temp: values[5],
            stellar_magnitude: values[6],
        }
    }

    /// Values in `FEATURE_COLUMNS` order
    pub fn values(&self) -> [f64; 7] {
        [
            self.orbital_period,
            self.transit_duration,
            self.transit_depth,
            self.snr,
            self.stellar_mass,
            self.stellar_temp,
            self.stellar_magnitude,
        ]
    }

    /// Validate and coerce a JSON payload.
    ///
    /// Presence of all fields is checked first so that the caller gets the
    /// complete list of missing names. Numbers and numeric strings are
    /// accepted; anything else is rejected as non-numeric.
    pub fn from_json(value: &serde_json::Value) -> std::result::Result<Self, ObservationError> {
        let map = value.as_object().ok_or(ObservationError::NotAnObject)?;

        let missing: Vec<String> = FEATURE_COLUMNS
            .iter()
            .filter(|name| !map.contains_key(**name))
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ObservationError::MissingFields(missing));
        }

        let mut values = [0.0; 7];
        for (slot, name) in values.iter_mut().zip(FEATURE_COLUMNS.iter()) {
            let raw = &map[*name];
            *slot = coerce_f64(raw).ok_or_else(|| ObservationError::NonNumeric {
                field: name.to_string(),
                value: raw.to_string(),
            })?;
        }

        Ok(Self::from_values(values))
    }

    /// True when every field is finite
    pub fn is_finite(&self) -> bool {
        self.values().iter().all(|v| v.is_finite())
    }
}

fn coerce_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Classification outcome for a transit signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassLabel {
    ConfirmedExoplanet,
    FalsePositive,
    PlanetaryCandidate,
}

impl ClassLabel {
    /// All labels in encoding order (alphabetical by name)
    pub const ALL: [ClassLabel; 3] = [
        ClassLabel::ConfirmedExoplanet,
        ClassLabel::FalsePositive,
        ClassLabel::PlanetaryCandidate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClassLabel::ConfirmedExoplanet => "confirmed_exoplanet",
            ClassLabel::FalsePositive => "false_positive",
            ClassLabel::PlanetaryCandidate => "planetary_candidate",
        }
    }

    /// Encoded class index
    pub fn index(&self) -> usize {
        match self {
            ClassLabel::ConfirmedExoplanet => 0,
            ClassLabel::FalsePositive => 1,
            ClassLabel::PlanetaryCandidate => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Confirmed planets and candidates get property estimates
    pub fn is_planet_like(&self) -> bool {
        matches!(self, ClassLabel::ConfirmedExoplanet | ClassLabel::PlanetaryCandidate)
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClassLabel {
    type Err = ExoplanetError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "confirmed_exoplanet" => Ok(ClassLabel::ConfirmedExoplanet),
            "false_positive" => Ok(ClassLabel::FalsePositive),
            "planetary_candidate" => Ok(ClassLabel::PlanetaryCandidate),
            other => Err(ExoplanetError::DataError(format!("Unknown classification label: {}", other))),
        }
    }
}

/// Physical property targets for one catalog row (NaN when unknown)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PropertyTargets {
    pub planet_radius: f64,
    pub planet_temp: f64,
    pub semi_major_axis: f64,
    pub impact_parameter: f64,
}

impl PropertyTargets {
    pub fn missing() -> Self {
        Self {
            planet_radius: f64::NAN,
            planet_temp: f64::NAN,
            semi_major_axis: f64::NAN,
            impact_parameter: f64::NAN,
        }
    }

    /// Values in `PROPERTY_COLUMNS` order
    pub fn values(&self) -> [f64; 4] {
        [self.planet_radius, self.planet_temp, self.semi_major_axis, self.impact_parameter]
    }

    pub fn from_values(values: [f64; 4]) -> Self {
        Self {
            planet_radius: values[0],
            planet_temp: values[1],
            semi_major_axis: values[2],
            impact_parameter: values[3],
        }
    }
}

/// Ensemble verdict for one observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: ClassLabel,
    /// Class distribution in encoding order
    pub probabilities: [f64; 3],
    /// Probability of `label`, the largest entry of `probabilities`
    pub confidence: f64,
    /// Normalized entropy of `probabilities`
    pub uncertainty: f64,
    pub model_agreement: f64,
}

impl ClassificationResult {
    /// Build from a distribution; label, confidence and uncertainty are derived from it
    pub fn from_distribution(probabilities: [f64; 3], model_agreement: f64) -> Self {
        let (index, confidence) = probabilities
            .iter()
            .enumerate()
            .fold((0usize, f64::NEG_INFINITY), |(bi, bv), (i, &v)| if v > bv { (i, v) } else { (bi, bv) });
        Self {
            label: ClassLabel::from_index(index).unwrap_or(ClassLabel::FalsePositive),
            probabilities,
            confidence,
            uncertainty: crate::ensemble::normalized_entropy(&probabilities),
            model_agreement,
        }
    }

    pub fn probability(&self, label: ClassLabel) -> f64 {
        self.probabilities[label.index()]
    }

    /// Probabilities keyed by label name
    pub fn class_probabilities(&self) -> BTreeMap<String, f64> {
        ClassLabel::ALL
            .iter()
            .map(|l| (l.as_str().to_string(), self.probability(*l)))
            .collect()
    }
}

/// One labeled catalog row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub observation: Observation,
    pub label: ClassLabel,
    pub properties: PropertyTargets,
}

/// Labeled training catalog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn extend(&mut self, other: Catalog) {
        self.entries.extend(other.entries);
    }

    /// Row counts per label, in encoding order
    pub fn class_counts(&self) -> [usize; 3] {
        let mut counts = [0usize; 3];
        for entry in &self.entries {
            counts[entry.label.index()] += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_observation_from_json() {
        let payload = json!({
            "orbital_period": 289.9,
            "transit_duration": 7.4,
            "transit_depth": 0.00492,
            "snr": 12,
            "stellar_mass": 0.97,
            "stellar_temp": "5627",
            "stellar_magnitude": 11.7
        });
        let obs = Observation::from_json(&payload).unwrap();
        assert_eq!(obs.snr, 12.0);
        assert_eq!(obs.stellar_temp, 5627.0);
    }

    #[test]
    fn test_observation_missing_fields_listed() {
        let payload = json!({ "orbital_period": 3.0, "transit_duration": 2.0 });
        let err = Observation::from_json(&payload).unwrap_err();
        match err {
            ObservationError::MissingFields(fields) => {
                assert_eq!(fields.len(), 5);
                assert!(fields.contains(&"snr".to_string()));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_observation_non_numeric() {
        let payload = json!({
            "orbital_period": "abc",
            "transit_duration": 7.4,
            "transit_depth": 0.00492,
            "snr": 12,
            "stellar_mass": 0.97,
            "stellar_temp": 5627,
            "stellar_magnitude": 11.7
        });
        let err = Observation::from_json(&payload).unwrap_err();
        assert!(matches!(err, ObservationError::NonNumeric { ref field, .. } if field == "orbital_period"));
    }

    #[test]
    fn test_label_encoding_is_alphabetical() {
        let mut names: Vec<&str> = ClassLabel::ALL.iter().map(|l| l.as_str()).collect();
        let encoded = names.clone();
        names.sort();
        assert_eq!(names, encoded);
        for label in ClassLabel::ALL {
            assert_eq!(ClassLabel::from_index(label.index()), Some(label));
            assert_eq!(label.as_str().parse::<ClassLabel>().unwrap(), label);
        }
    }

    #[test]
    fn test_classification_result_from_distribution() {
        let result = ClassificationResult::from_distribution([0.2, 0.1, 0.7], 0.8);
        assert_eq!(result.label, ClassLabel::PlanetaryCandidate);
        assert_eq!(result.confidence, 0.7);
        assert!(result.uncertainty > 0.0 && result.uncertainty < 1.0);
        assert_eq!(result.class_probabilities()["false_positive"], 0.1);
    }

    #[test]
    fn test_label_serde_snake_case() {
        let s = serde_json::to_string(&ClassLabel::PlanetaryCandidate).unwrap();
        assert_eq!(s, "\"planetary_candidate\"");
    }
}
