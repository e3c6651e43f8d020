//! DataFrame helpers shared by the loaders and the preprocessing stages

use crate::error::{ExoplanetError, Result};
use ndarray::Array2;
use polars::prelude::*;

/// Read a column as f64 values; nulls become NaN.
pub fn column_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df
        .column(name)
        .map_err(|_| ExoplanetError::FeatureNotFound(name.to_string()))?;
    let series = column
        .as_materialized_series()
        .cast(&DataType::Float64)
        .map_err(|e| ExoplanetError::DataError(e.to_string()))?;
    let values = series
        .f64()
        .map_err(|e| ExoplanetError::DataError(e.to_string()))?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect();
    Ok(values)
}

/// Build an f64 column, writing non-finite values as nulls
pub fn nullable_column(name: &str, values: &[f64]) -> Column {
    let opt: Vec<Option<f64>> = values
        .iter()
        .map(|&v| if v.is_finite() { Some(v) } else { None })
        .collect();
    Series::new(name.into(), opt).into()
}

/// Extract named columns from a DataFrame into a row-major `Array2<f64>`.
pub fn columns_to_array2(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let n_cols = col_names.len();

    let col_data: Vec<Vec<f64>> = col_names
        .iter()
        .map(|name| column_values(df, name))
        .collect::<Result<Vec<Vec<f64>>>>()?;

    let col_refs: Vec<&[f64]> = col_data.iter().map(|c| c.as_slice()).collect();
    Ok(Array2::from_shape_fn((n_rows, n_cols), |(r, c)| col_refs[c][r]))
}

/// Median of the finite values, `None` when there are none
pub fn finite_median(values: &[f64]) -> Option<f64> {
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    finite.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = finite.len() / 2;
    if finite.len() % 2 == 0 {
        Some((finite[mid - 1] + finite[mid]) / 2.0)
    } else {
        Some(finite[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_values_nulls_become_nan() {
        let df = DataFrame::new(vec![
            Series::new("a".into(), &[Some(1.0), None, Some(3.0)]).into(),
        ])
        .unwrap();
        let values = column_values(&df, "a").unwrap();
        assert_eq!(values[0], 1.0);
        assert!(values[1].is_nan());
    }

    #[test]
    fn test_column_values_casts_integers() {
        let df = df!("n" => &[1i64, 2, 3]).unwrap();
        assert_eq!(column_values(&df, "n").unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_missing_column_is_feature_not_found() {
        let df = df!("a" => &[1.0]).unwrap();
        assert!(matches!(column_values(&df, "b"), Err(ExoplanetError::FeatureNotFound(_))));
    }

    #[test]
    fn test_columns_to_array2_row_major() {
        let df = df!("a" => &[1.0, 2.0], "b" => &[3.0, 4.0]).unwrap();
        let arr = columns_to_array2(&df, &["a".to_string(), "b".to_string()]).unwrap();
        assert_eq!(arr[[0, 1]], 3.0);
        assert_eq!(arr[[1, 0]], 2.0);
    }

    #[test]
    fn test_finite_median() {
        assert_eq!(finite_median(&[3.0, f64::NAN, 1.0, 2.0]), Some(2.0));
        assert_eq!(finite_median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(finite_median(&[f64::INFINITY]), None);
    }
}
