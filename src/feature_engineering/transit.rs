//! Physics-informed transit features
//!
//! Derives 23 features from the 7 raw observation columns, grouped as
//! transit geometry, stellar, orbital, detection and statistical terms.
//! The transform has no fitted state: every value is a function of the row.

use crate::data::{Observation, FEATURE_COLUMNS};
use crate::error::{ExoplanetError, Result};
use crate::utils::frame::{column_values, finite_median};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const SOLAR_TEMP: f64 = 5778.0;
const DAYS_PER_YEAR: f64 = 365.25;
const ASSUMED_TRANSITS: f64 = 10.0;
const EARTH_RADII_PER_SOLAR_RADIUS: f64 = 109.1;

/// Derived feature names, in output order
pub const DERIVED_FEATURES: [&str; 23] = [
    // transit
    "duration_period_ratio",
    "radius_ratio",
    "estimated_impact",
    "transit_shape",
    "signal_strength",
    // stellar
    "stellar_density_proxy",
    "stellar_luminosity",
    "brightness_metric",
    "stellar_radius_estimate",
    // orbital
    "semimajor_axis_estimate",
    "orbital_velocity_proxy",
    "insolation_flux",
    "equilibrium_temp_estimate",
    // detection
    "mes_proxy",
    "transit_probability",
    "depth_noise_ratio",
    "duration_anomaly",
    "transit_shape_indicator",
    // statistical
    "period_snr_interaction",
    "depth_duration_interaction",
    "stellar_planet_interaction",
    "snr_per_depth",
    "period_normalized_duration",
];

/// Compute the derived features for one raw row (`FEATURE_COLUMNS` order).
///
/// Values may be non-finite for degenerate inputs; callers clean them.
pub fn derive_features(raw: &[f64; 7]) -> [f64; 23] {
    let [period, duration, depth, snr, mass, temp, magnitude] = *raw;

    let duration_period_ratio = (duration / 24.0) / period;
    let radius_ratio = depth.sqrt();
    let estimated_impact = (1.0 - duration_period_ratio / (2.0 * depth.sqrt())).clamp(0.0, 1.0);
    let transit_shape = depth * duration;
    let signal_strength = snr * depth.sqrt();

    let stellar_density_proxy = mass / (temp / SOLAR_TEMP).powi(4);
    let stellar_luminosity = mass.powf(3.5);
    let brightness_metric = 1.0 / 10f64.powf(magnitude / 2.5);
    let stellar_radius_estimate = mass.powf(0.8) * (temp / SOLAR_TEMP).powf(0.5);

    let semimajor_axis_estimate = (period / DAYS_PER_YEAR).powf(2.0 / 3.0) * mass.powf(1.0 / 3.0);
    let orbital_velocity_proxy = 1.0 / semimajor_axis_estimate.sqrt();
    let insolation_flux = stellar_luminosity / semimajor_axis_estimate.powi(2);
    let equilibrium_temp_estimate =
        temp * (stellar_radius_estimate / (2.0 * semimajor_axis_estimate)).sqrt();

    let mes_proxy = snr * ASSUMED_TRANSITS.sqrt();
    let transit_probability = stellar_radius_estimate / semimajor_axis_estimate;
    let depth_noise_ratio = depth * snr;
    let expected_duration = period * transit_probability * 0.1;
    let duration_anomaly = (duration / 24.0 - expected_duration).abs() / expected_duration;
    let transit_shape_indicator = duration_period_ratio / depth.sqrt();

    let period_snr_interaction = period.ln_1p() * snr.ln_1p();
    let depth_duration_interaction = depth * duration;
    let stellar_planet_interaction = mass * radius_ratio;
    let snr_per_depth = snr / (depth + 1e-6);
    let period_normalized_duration = duration / period.ln_1p();

    // clamp() keeps NaN, matching a pandas clip
    [
        duration_period_ratio,
        radius_ratio,
        estimated_impact,
        transit_shape,
        signal_strength,
        stellar_density_proxy,
        stellar_luminosity,
        brightness_metric,
        stellar_radius_estimate,
        semimajor_axis_estimate,
        orbital_velocity_proxy,
        insolation_flux,
        equilibrium_temp_estimate,
        mes_proxy,
        transit_probability,
        depth_noise_ratio,
        duration_anomaly,
        transit_shape_indicator,
        period_snr_interaction,
        depth_duration_interaction,
        stellar_planet_interaction,
        snr_per_depth,
        period_normalized_duration,
    ]
}

/// Closed-form physical estimate of planet properties
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalEstimate {
    pub planet_radius: f64,
    pub planet_temp: f64,
    pub semi_major_axis: f64,
    pub impact_parameter: f64,
}

/// Planet properties computed directly from the observation.
///
/// Radius in Earth radii from depth and the mass/temperature stellar radius,
/// semi-major axis from Kepler's third law, impact parameter clipped to
/// [0, 0.99].
pub fn planet_properties(obs: &Observation) -> PhysicalEstimate {
    let stellar_radius = obs.stellar_mass.powf(0.8) * (obs.stellar_temp / SOLAR_TEMP).powf(0.5);
    let planet_radius = obs.transit_depth.sqrt() * stellar_radius * EARTH_RADII_PER_SOLAR_RADIUS;
    let semi_major_axis =
        (obs.orbital_period / DAYS_PER_YEAR).powf(2.0 / 3.0) * obs.stellar_mass.powf(1.0 / 3.0);
    let planet_temp = obs.stellar_temp
        * (stellar_radius / (2.0 * semi_major_axis)).sqrt()
        * 0.01
        * EARTH_RADII_PER_SOLAR_RADIUS;
    let duration_ratio = (obs.transit_duration / 24.0) / obs.orbital_period;
    let impact_parameter = (1.0 - duration_ratio / (2.0 * obs.transit_depth.sqrt())).clamp(0.0, 0.99);

    PhysicalEstimate {
        planet_radius,
        planet_temp,
        semi_major_axis,
        impact_parameter,
    }
}

/// Transit feature engineer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransitFeatureEngineer {
    /// Column medians recorded from the training batch, used to fill
    /// non-finite values at inference
    fallback_medians: HashMap<String, f64>,
}

impl TransitFeatureEngineer {
    pub fn new() -> Self {
        Self::default()
    }

    /// All output feature names: raw columns then derived columns
    pub fn feature_names() -> Vec<String> {
        FEATURE_COLUMNS
            .iter()
            .chain(DERIVED_FEATURES.iter())
            .map(|s| s.to_string())
            .collect()
    }

    /// Transform a batch and remember its column medians for later
    /// batches that cannot supply their own.
    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<DataFrame> {
        let (result, medians) = self.transform_inner(df, true)?;
        self.fallback_medians = medians;
        Ok(result)
    }

    /// Append derived columns to `df`. Non-finite values are replaced by the
    /// medians recorded at fit time, so each row is cleaned independently of
    /// the rest of the batch. An unfitted engineer uses the batch median.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        self.transform_inner(df, false).map(|(result, _)| result)
    }

    /// Derived and cleaned feature row for one observation
    pub fn transform_observation(&self, obs: &Observation) -> Vec<f64> {
        let raw = obs.values();
        let derived = derive_features(&raw);
        let names = Self::feature_names();
        raw.iter()
            .chain(derived.iter())
            .zip(names.iter())
            .map(|(&v, name)| {
                if v.is_finite() {
                    v
                } else {
                    self.fallback_medians.get(name).copied().unwrap_or(0.0)
                }
            })
            .collect()
    }

    fn transform_inner(&self, df: &DataFrame, fit: bool) -> Result<(DataFrame, HashMap<String, f64>)> {
        // All raw columns must be present before any computation
        for name in FEATURE_COLUMNS {
            if df.column(name).is_err() {
                return Err(ExoplanetError::FeatureNotFound(name.to_string()));
            }
        }

        let raw_columns: Vec<Vec<f64>> = FEATURE_COLUMNS
            .iter()
            .map(|name| column_values(df, name))
            .collect::<Result<_>>()?;

        let n_rows = df.height();
        let mut derived_columns: Vec<Vec<f64>> = vec![Vec::with_capacity(n_rows); DERIVED_FEATURES.len()];
        for row in 0..n_rows {
            let mut raw = [0.0; 7];
            for (j, col) in raw_columns.iter().enumerate() {
                raw[j] = col[row];
            }
            for (j, value) in derive_features(&raw).into_iter().enumerate() {
                derived_columns[j].push(value);
            }
        }

        let mut result = df.clone();
        let mut medians = HashMap::new();
        let names = FEATURE_COLUMNS.iter().chain(DERIVED_FEATURES.iter());
        for (name, mut values) in names.zip(raw_columns.into_iter().chain(derived_columns)) {
            let fitted = self.fallback_medians.get(*name).copied();
            let median = if fit {
                finite_median(&values).or(fitted)
            } else {
                fitted.or_else(|| finite_median(&values))
            }
            .unwrap_or(0.0);
            for v in values.iter_mut() {
                if !v.is_finite() {
                    *v = median;
                }
            }
            medians.insert(name.to_string(), median);
            result
                .with_column(Series::new((*name).into(), values))
                .map_err(|e| ExoplanetError::DataError(e.to_string()))?;
        }

        Ok((result, medians))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEPLER_22B: [f64; 7] = [289.9, 7.4, 0.00492, 12.0, 0.97, 5627.0, 11.7];

    fn index_of(name: &str) -> usize {
        DERIVED_FEATURES.iter().position(|n| *n == name).unwrap()
    }

    #[test]
    fn test_transit_formulas() {
        let f = derive_features(&KEPLER_22B);
        let dpr = (7.4 / 24.0) / 289.9;
        assert!((f[index_of("duration_period_ratio")] - dpr).abs() < 1e-15);
        assert!((f[index_of("radius_ratio")] - 0.00492f64.sqrt()).abs() < 1e-15);
        let impact = 1.0 - dpr / (2.0 * 0.00492f64.sqrt());
        assert!((f[index_of("estimated_impact")] - impact).abs() < 1e-12);
        assert!((f[index_of("signal_strength")] - 12.0 * 0.00492f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_stellar_and_orbital_formulas() {
        let f = derive_features(&KEPLER_22B);
        let a = (289.9f64 / 365.25).powf(2.0 / 3.0) * 0.97f64.powf(1.0 / 3.0);
        let lum = 0.97f64.powf(3.5);
        let rs = 0.97f64.powf(0.8) * (5627.0f64 / 5778.0).sqrt();
        assert!((f[index_of("semimajor_axis_estimate")] - a).abs() < 1e-12);
        assert!((f[index_of("insolation_flux")] - lum / (a * a)).abs() < 1e-12);
        assert!((f[index_of("transit_probability")] - rs / a).abs() < 1e-12);
        assert!((f[index_of("brightness_metric")] - 1.0 / 10f64.powf(11.7 / 2.5)).abs() < 1e-18);
        assert!((f[index_of("mes_proxy")] - 12.0 * 10f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_duration_anomaly() {
        let f = derive_features(&KEPLER_22B);
        let expected = 289.9 * f[index_of("transit_probability")] * 0.1;
        let anomaly = (7.4 / 24.0 - expected).abs() / expected;
        assert!((f[index_of("duration_anomaly")] - anomaly).abs() < 1e-12);
    }

    #[test]
    fn test_estimated_impact_is_clipped() {
        // very long duration relative to period drives the raw value negative
        let f = derive_features(&[0.5, 20.0, 0.0001, 10.0, 1.0, 5778.0, 12.0]);
        assert_eq!(f[index_of("estimated_impact")], 0.0);
    }

    #[test]
    fn test_transform_appends_columns_and_cleans_non_finite() {
        let df = df!(
            "orbital_period" => &[289.9, 3.5, 10.0],
            "transit_duration" => &[7.4, 3.0, 2.0],
            "transit_depth" => &[0.00492, 0.0, 0.01],
            "snr" => &[12.0, 30.0, 9.0],
            "stellar_mass" => &[0.97, 1.1, 1.0],
            "stellar_temp" => &[5627.0, 6091.0, 5700.0],
            "stellar_magnitude" => &[11.7, 7.7, 13.0]
        )
        .unwrap();

        let engineer = TransitFeatureEngineer::new();
        let out = engineer.transform(&df).unwrap();
        assert_eq!(out.width(), 30);

        for name in TransitFeatureEngineer::feature_names() {
            let values = column_values(&out, &name).unwrap();
            assert!(values.iter().all(|v| v.is_finite()), "{} has non-finite values", name);
        }

        // zero depth gives an infinite shape indicator, replaced by the batch median
        let indicator = column_values(&out, "transit_shape_indicator").unwrap();
        let finite = [indicator[0], indicator[2]];
        let median = (finite[0] + finite[1]) / 2.0;
        assert!((indicator[1] - median).abs() < 1e-12);
    }

    #[test]
    fn test_missing_column_fails_before_computation() {
        let df = df!("orbital_period" => &[1.0], "transit_duration" => &[2.0]).unwrap();
        let err = TransitFeatureEngineer::new().transform(&df).unwrap_err();
        assert!(matches!(err, ExoplanetError::FeatureNotFound(ref c) if c == "transit_depth"));
    }

    #[test]
    fn test_single_row_uses_fitted_medians() {
        let train = df!(
            "orbital_period" => &[10.0, 20.0, 30.0],
            "transit_duration" => &[2.0, 3.0, 4.0],
            "transit_depth" => &[0.01, 0.02, 0.03],
            "snr" => &[10.0, 12.0, 14.0],
            "stellar_mass" => &[1.0, 1.0, 1.0],
            "stellar_temp" => &[5700.0, 5800.0, 5900.0],
            "stellar_magnitude" => &[12.0, 12.0, 12.0]
        )
        .unwrap();
        let mut engineer = TransitFeatureEngineer::new();
        let fitted = engineer.fit_transform(&train).unwrap();
        let train_median = finite_median(&column_values(&fitted, "transit_shape_indicator").unwrap()).unwrap();

        let single = Observation::from_values([10.0, 2.0, 0.0, 10.0, 1.0, 5700.0, 12.0]);
        let row = engineer.transform_observation(&single);
        let idx = TransitFeatureEngineer::feature_names()
            .iter()
            .position(|n| n == "transit_shape_indicator")
            .unwrap();
        assert!((row[idx] - train_median).abs() < 1e-12);
    }

    #[test]
    fn test_fitted_transform_ignores_batch_neighbours() {
        let train = df!(
            "orbital_period" => &[10.0, 20.0, 30.0],
            "transit_duration" => &[2.0, 3.0, 4.0],
            "transit_depth" => &[0.01, 0.02, 0.03],
            "snr" => &[10.0, 12.0, 14.0],
            "stellar_mass" => &[1.0, 1.0, 1.0],
            "stellar_temp" => &[5700.0, 5800.0, 5900.0],
            "stellar_magnitude" => &[12.0, 12.0, 12.0]
        )
        .unwrap();
        let mut engineer = TransitFeatureEngineer::new();
        engineer.fit_transform(&train).unwrap();

        let zero_depth = Observation::from_values([10.0, 3.0, 0.0, 9.0, 1.0, 5700.0, 12.0]);
        let alone = engineer
            .transform(&crate::data::observations_to_dataframe(&[zero_depth]).unwrap())
            .unwrap();
        let mixed = engineer
            .transform(
                &crate::data::observations_to_dataframe(&[
                    Observation::from_values(KEPLER_22B),
                    Observation::from_values([3.5, 3.0, 0.015, 30.0, 1.1, 6091.0, 7.7]),
                    zero_depth,
                ])
                .unwrap(),
            )
            .unwrap();

        for name in TransitFeatureEngineer::feature_names() {
            let a = column_values(&alone, &name).unwrap()[0];
            let b = column_values(&mixed, &name).unwrap()[2];
            assert_eq!(a, b, "{} depends on the batch", name);
        }
        let single = engineer.transform_observation(&zero_depth);
        let idx = TransitFeatureEngineer::feature_names()
            .iter()
            .position(|n| n == "transit_shape_indicator")
            .unwrap();
        assert_eq!(single[idx], column_values(&alone, "transit_shape_indicator").unwrap()[0]);
    }

    #[test]
    fn test_planet_properties_kepler_22b() {
        let props = planet_properties(&Observation::from_values(KEPLER_22B));
        assert!(props.planet_radius > 6.0 && props.planet_radius < 9.0);
        assert!(props.semi_major_axis > 0.8 && props.semi_major_axis < 0.9);
        assert!((0.0..=0.99).contains(&props.impact_parameter));
    }
}
