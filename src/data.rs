//! Tabular data loading and conversion to ndarray

use crate::error::{Result, TuneError};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// Load a DataFrame from a CSV, JSON or Parquet file, chosen by extension
pub fn load_data(path: &Path) -> Result<DataFrame> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let df = match ext.as_str() {
        "csv" => CsvReadOptions::default()
            .with_infer_schema_length(Some(1000))
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?,
        "json" => JsonReader::new(File::open(path)?).finish()?,
        "parquet" | "pq" => ParquetReader::new(File::open(path)?).finish()?,
        other => {
            return Err(TuneError::DataError(format!("Unsupported file format: '{}'", other)))
        }
    };

    Ok(df)
}

/// Column names other than `target`, in frame order
pub fn feature_names(df: &DataFrame, target: &str) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .filter(|name| name != target)
        .collect()
}

/// Split a cleaned frame into a feature matrix and a target vector.
///
/// Every column must cast to `Float64` without nulls.
pub fn split_features_target(df: &DataFrame, target: &str) -> Result<(Array2<f64>, Array1<f64>)> {
    if df.column(target).is_err() {
        return Err(TuneError::MissingTarget(target.to_string()));
    }

    let features = feature_names(df, target);
    if features.is_empty() {
        return Err(TuneError::DataError("no feature columns besides the target".to_string()));
    }

    let x = columns_to_array2(df, &features)?;
    let y = Array1::from_vec(column_to_vec(df, target)?);
    Ok((x, y))
}

/// Convert the named columns into a row-major matrix
pub fn columns_to_array2(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let col_data: Vec<Vec<f64>> = col_names
        .iter()
        .map(|name| column_to_vec(df, name))
        .collect::<Result<_>>()?;

    let col_refs: Vec<&[f64]> = col_data.iter().map(Vec::as_slice).collect();
    Ok(Array2::from_shape_fn((df.height(), col_names.len()), |(r, c)| col_refs[c][r]))
}

fn column_to_vec(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df
        .column(name)
        .map_err(|_| TuneError::DataError(format!("column not found: {}", name)))?;
    let cast = column.cast(&DataType::Float64)?;
    cast.f64()?
        .into_iter()
        .map(|v| v.ok_or_else(|| TuneError::DataError(format!("column '{}' has null or non-numeric values", name))))
        .collect()
}
