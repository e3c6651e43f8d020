//! Removal of physically impossible observations

use super::config::PhysicalBounds;
use crate::error::{ExoplanetError, Result};
use crate::utils::frame::column_values;
use polars::prelude::*;

fn inside(v: f64, (lo, hi): (f64, f64)) -> bool {
    v > lo && v < hi
}

/// Whether a single row is physically plausible. NaN fields are treated as
/// missing and pass, so they can be imputed later.
pub fn is_plausible(
    period: f64,
    duration: f64,
    depth: f64,
    temp: f64,
    mass: f64,
    bounds: &PhysicalBounds,
) -> bool {
    let ok = |v: f64, check: bool| v.is_nan() || check;
    ok(period, period > 0.0)
        && ok(duration, duration > 0.0)
        && ok(depth, inside(depth, bounds.transit_depth))
        && ok(temp, inside(temp, bounds.stellar_temp))
        && ok(mass, inside(mass, bounds.stellar_mass))
}

/// Drop rows outside the physical bounds. Returns the filtered frame and the
/// number of rows removed.
pub fn remove_artifacts(df: &DataFrame, bounds: &PhysicalBounds) -> Result<(DataFrame, usize)> {
    let period = column_values(df, "orbital_period")?;
    let duration = column_values(df, "transit_duration")?;
    let depth = column_values(df, "transit_depth")?;
    let temp = column_values(df, "stellar_temp")?;
    let mass = column_values(df, "stellar_mass")?;

    let mask: BooleanChunked = (0..df.height())
        .map(|i| is_plausible(period[i], duration[i], depth[i], temp[i], mass[i], bounds))
        .collect();

    let filtered = df
        .filter(&mask)
        .map_err(|e| ExoplanetError::PreprocessingError(e.to_string()))?;
    let removed = df.height() - filtered.height();
    Ok((filtered, removed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_impossible_rows_removed() {
        let df = DataFrame::new(vec![
            Series::new("orbital_period".into(), &[Some(3.0), Some(-1.0), Some(5.0), None, Some(2.0)]).into(),
            Series::new("transit_duration".into(), &[3.0, 2.0, 2.0, 2.0, 2.0]).into(),
            Series::new("transit_depth".into(), &[0.01, 0.01, 1.2, 0.01, 0.02]).into(),
            Series::new("stellar_temp".into(), &[5700.0, 5700.0, 5700.0, 5700.0, 1500.0]).into(),
            Series::new("stellar_mass".into(), &[1.0, 1.0, 1.0, 1.0, 1.0]).into(),
        ])
        .unwrap();

        let (out, removed) = remove_artifacts(&df, &PhysicalBounds::default()).unwrap();
        assert_eq!(removed, 3);
        assert_eq!(out.height(), 2);
    }

    #[test]
    fn test_bounds_are_exclusive() {
        let b = PhysicalBounds::default();
        assert!(!is_plausible(1.0, 1.0, 0.01, 5700.0, 0.1, &b));
        assert!(is_plausible(1.0, 1.0, 0.01, 5700.0, 0.11, &b));
        assert!(!is_plausible(1.0, 1.0, 1.0, 5700.0, 1.0, &b));
    }
}
