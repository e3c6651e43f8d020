//! Integration test: transit feature engineering

use exoplanet_classifier::data::{observations_to_dataframe, Observation, FEATURE_COLUMNS};
use exoplanet_classifier::feature_engineering::{planet_properties, TransitFeatureEngineer, DERIVED_FEATURES};
use exoplanet_classifier::utils::frame::column_values;

fn kepler_22b() -> Observation {
    Observation::from_values([289.9, 7.4, 0.00492, 12.0, 0.97, 5627.0, 11.7])
}

fn hot_jupiter() -> Observation {
    Observation::from_values([3.52, 3.0, 0.015, 30.0, 1.11, 6091.0, 7.7])
}

#[test]
fn test_feature_names_start_with_raw_columns() {
    let names = TransitFeatureEngineer::feature_names();
    assert_eq!(names.len(), FEATURE_COLUMNS.len() + DERIVED_FEATURES.len());
    assert_eq!(names.len(), 30);
    for (name, raw) in names.iter().zip(FEATURE_COLUMNS.iter()) {
        assert_eq!(name, raw);
    }
}

#[test]
fn test_batch_and_single_row_agree() {
    let observations = vec![kepler_22b(), hot_jupiter()];
    let df = observations_to_dataframe(&observations).unwrap();

    let mut engineer = TransitFeatureEngineer::new();
    let engineered = engineer.fit_transform(&df).unwrap();

    for (row, obs) in observations.iter().enumerate() {
        let single = engineer.transform_observation(obs);
        for (j, name) in TransitFeatureEngineer::feature_names().iter().enumerate() {
            let batch = column_values(&engineered, name).unwrap()[row];
            assert!((batch - single[j]).abs() < 1e-9, "{} row {}", name, row);
        }
    }
}

#[test]
fn test_non_finite_values_use_fitted_medians() {
    let mut engineer = TransitFeatureEngineer::new();
    let df = observations_to_dataframe(&[kepler_22b(), hot_jupiter(), kepler_22b()]).unwrap();
    engineer.fit_transform(&df).unwrap();

    let mut broken = hot_jupiter();
    broken.snr = f64::NAN;
    let row = engineer.transform_observation(&broken);
    assert_eq!(row.len(), 30);
    assert!(row.iter().all(|v| v.is_finite()));
    assert_eq!(row[3], 12.0);
}

#[test]
fn test_planet_properties_for_known_planets() {
    let kepler = planet_properties(&kepler_22b());
    assert!(kepler.planet_radius > 2.0 && kepler.planet_radius < 10.0);
    assert!(kepler.semi_major_axis > 0.7 && kepler.semi_major_axis < 1.0);
    assert!((0.0..=0.99).contains(&kepler.impact_parameter));

    let jupiter = planet_properties(&hot_jupiter());
    assert!(jupiter.semi_major_axis < 0.1);
    assert!(jupiter.planet_temp > kepler.planet_temp);
}
