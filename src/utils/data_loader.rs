//! Data loading and preparation
//!
//! Reads the delimited transaction file with polars, validates the header,
//! drops incomplete rows and hands back an immutable [`Dataset`].

use crate::dataset::Dataset;
use crate::error::{FraudBenchError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// Header of the credit-card transaction file: `Time, V1..V28, Amount, Class`.
pub fn credit_card_columns() -> Vec<String> {
    let mut columns = Vec::with_capacity(31);
    columns.push("Time".to_string());
    columns.extend((1..=28).map(|i| format!("V{}", i)));
    columns.push("Amount".to_string());
    columns.push("Class".to_string());
    columns
}

/// Row accounting for one preparation run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparationSummary {
    /// Rows read from the source
    pub rows_read: usize,
    /// Rows dropped because a field was null
    pub rows_dropped_null: usize,
    /// Rows dropped because a field was NaN
    pub rows_dropped_nan: usize,
}

impl PreparationSummary {
    /// Total rows removed by row-wise deletion
    pub fn rows_dropped(&self) -> usize {
        self.rows_dropped_null + self.rows_dropped_nan
    }

    /// Rows left after preparation
    pub fn rows_kept(&self) -> usize {
        self.rows_read - self.rows_dropped()
    }
}

/// A prepared dataset and the accounting that produced it
#[derive(Debug, Clone)]
pub struct PreparedDataset {
    pub dataset: Dataset,
    pub summary: PreparationSummary,
}

/// Loader for labeled transaction files
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Field delimiter
    delimiter: u8,
    /// Name of the 0/1 label column
    label_column: String,
    /// Columns that must be present in the header, if any
    required_columns: Option<Vec<String>>,
    /// Rows used for schema inference
    infer_schema_length: usize,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new("Class")
    }
}

impl DataLoader {
    /// Create a loader for any numeric file labeled by `label_column`
    pub fn new(label_column: impl Into<String>) -> Self {
        Self {
            delimiter: b',',
            label_column: label_column.into(),
            required_columns: None,
            infer_schema_length: 1000,
        }
    }

    /// Loader that enforces the credit-card header
    pub fn credit_card() -> Self {
        Self::new("Class").with_required_columns(credit_card_columns())
    }

    /// Set field delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Require these columns in the header
    pub fn with_required_columns(mut self, columns: Vec<String>) -> Self {
        self.required_columns = Some(columns);
        self
    }

    /// Set number of rows used for schema inference
    pub fn with_infer_schema_length(mut self, n: usize) -> Self {
        self.infer_schema_length = n.max(1);
        self
    }

    /// Label column name
    pub fn label_column(&self) -> &str {
        &self.label_column
    }

    /// Read the raw file into a DataFrame
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(FraudBenchError::LoadError(format!(
                "file not found: {}",
                path.display()
            )));
        }

        let parse_opts = CsvParseOptions::default().with_separator(self.delimiter);

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .with_parse_options(parse_opts)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .map_err(|e| FraudBenchError::LoadError(format!("{}: {}", path.display(), e)))?
            .finish()
            .map_err(|e| FraudBenchError::LoadError(format!("{}: {}", path.display(), e)))?;

        debug!(path = %path.display(), rows = df.height(), cols = df.width(), "Read CSV");
        Ok(df)
    }

    /// Load and prepare a dataset from a file
    pub fn load_dataset(&self, path: impl AsRef<Path>) -> Result<PreparedDataset> {
        let df = self.load_csv(path.as_ref())?;
        let prepared = self.prepare(&df)?;

        info!(
            path = %path.as_ref().display(),
            rows = prepared.dataset.len(),
            dropped = prepared.summary.rows_dropped(),
            "Dataset prepared"
        );
        Ok(prepared)
    }

    /// Validate a frame, drop incomplete rows and build a [`Dataset`]
    pub fn prepare(&self, df: &DataFrame) -> Result<PreparedDataset> {
        self.validate_schema(df)?;

        let rows_read = df.height();
        let complete = df.drop_nulls::<String>(None)?;
        let rows_dropped_null = rows_read - complete.height();
        if rows_dropped_null > 0 {
            warn!(rows = rows_dropped_null, "Dropped rows with missing values");
        }

        let feature_names: Vec<String> = complete
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .filter(|name| name != &self.label_column)
            .collect();

        let columns = feature_names
            .iter()
            .map(|name| column_as_f64(&complete, name))
            .collect::<Result<Vec<Vec<f64>>>>()?;
        let labels = column_as_f64(&complete, &self.label_column)?;

        // NaN counts as missing, same as an empty field
        let keep: Vec<usize> = (0..complete.height())
            .filter(|&row| {
                !labels[row].is_nan() && columns.iter().all(|col| !col[row].is_nan())
            })
            .collect();
        let rows_dropped_nan = complete.height() - keep.len();
        if rows_dropped_nan > 0 {
            warn!(rows = rows_dropped_nan, "Dropped rows with NaN values");
        }

        let features = Array2::from_shape_fn((keep.len(), feature_names.len()), |(i, j)| {
            columns[j][keep[i]]
        });
        let labels = keep
            .iter()
            .map(|&row| parse_label(labels[row], row, &self.label_column))
            .collect::<Result<Array1<i64>>>()?;

        let dataset = Dataset::new(feature_names, self.label_column.clone(), features, labels)
            .map_err(|e| FraudBenchError::LoadError(e.to_string()))?;

        Ok(PreparedDataset {
            dataset,
            summary: PreparationSummary {
                rows_read,
                rows_dropped_null,
                rows_dropped_nan,
            },
        })
    }

    fn validate_schema(&self, df: &DataFrame) -> Result<()> {
        let present: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();

        if let Some(required) = &self.required_columns {
            let missing: Vec<&String> = required.iter().filter(|c| !present.contains(c)).collect();
            if !missing.is_empty() {
                return Err(FraudBenchError::LoadError(format!(
                    "missing columns: {}",
                    missing.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
                )));
            }
        }

        if !present.contains(&self.label_column) {
            return Err(FraudBenchError::LoadError(format!(
                "label column '{}' not found",
                self.label_column
            )));
        }
        if present.len() < 2 {
            return Err(FraudBenchError::LoadError(
                "need at least one feature column besides the label".to_string(),
            ));
        }

        for column in df.get_columns() {
            if !is_numeric_dtype(column.dtype()) {
                return Err(FraudBenchError::LoadError(format!(
                    "column '{}' is not numeric (found {})",
                    column.name(),
                    column.dtype()
                )));
            }
        }

        Ok(())
    }
}

fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float64
            | DataType::Float32
            | DataType::Int64
            | DataType::Int32
            | DataType::Int16
            | DataType::Int8
            | DataType::UInt64
            | DataType::UInt32
            | DataType::UInt16
            | DataType::UInt8
            // An all-null column has no inferred type; rows holding it get dropped
            | DataType::Null
    )
}

fn column_as_f64(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let series = df
        .column(name)
        .map_err(|_| FraudBenchError::FeatureNotFound(name.to_string()))?
        .as_materialized_series()
        .cast(&DataType::Float64)
        .map_err(|e| FraudBenchError::LoadError(e.to_string()))?;

    let values = series
        .f64()
        .map_err(|e| FraudBenchError::LoadError(e.to_string()))?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect();
    Ok(values)
}

fn parse_label(value: f64, row: usize, column: &str) -> Result<i64> {
    if value == 0.0 {
        Ok(0)
    } else if value == 1.0 {
        Ok(1)
    } else {
        Err(FraudBenchError::LoadError(format!(
            "row {}: '{}' must be 0 or 1, found {}",
            row, column, value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    #[test]
    fn test_credit_card_columns() {
        let cols = credit_card_columns();
        assert_eq!(cols.len(), 31);
        assert_eq!(cols[0], "Time");
        assert_eq!(cols[1], "V1");
        assert_eq!(cols[28], "V28");
        assert_eq!(cols[29], "Amount");
        assert_eq!(cols[30], "Class");
    }

    #[test]
    fn test_load_simple_dataset() {
        let file = write_csv("a,b,Class\n1.0,2.0,0\n3.0,4.0,1\n5.0,6.0,0\n");
        let prepared = DataLoader::new("Class").load_dataset(file.path()).unwrap();

        assert_eq!(prepared.dataset.len(), 3);
        assert_eq!(prepared.dataset.n_features(), 2);
        assert_eq!(prepared.dataset.feature_names(), &["a".to_string(), "b".to_string()]);
        assert_eq!(prepared.summary.rows_dropped(), 0);
    }

    #[test]
    fn test_drops_row_with_missing_value() {
        let file = write_csv("a,Amount,Class\n1.0,2.0,0\n3.0,,1\n5.0,6.0,0\n7.0,8.0,0\n");
        let prepared = DataLoader::new("Class").load_dataset(file.path()).unwrap();

        assert_eq!(prepared.summary.rows_read, 4);
        assert_eq!(prepared.summary.rows_dropped_null, 1);
        assert_eq!(prepared.dataset.len(), 3);
        assert!(prepared.dataset.features().iter().all(|v| !v.is_nan()));
    }

    #[test]
    fn test_drops_row_with_nan_value() {
        let file = write_csv("a,Amount,Class\n1.0,2.0,0\n3.0,NaN,1\n5.0,6.0,0\n7.0,8.0,1\n");
        let prepared = DataLoader::new("Class").load_dataset(file.path()).unwrap();

        assert_eq!(prepared.summary.rows_read, 4);
        assert_eq!(prepared.summary.rows_dropped_null, 0);
        assert_eq!(prepared.summary.rows_dropped_nan, 1);
        assert_eq!(prepared.summary.rows_kept(), 3);
        assert_eq!(prepared.dataset.len(), 3);
        assert_eq!(prepared.dataset.column("Amount").unwrap().to_vec(), vec![2.0, 6.0, 8.0]);
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let err = DataLoader::default().load_dataset("/nonexistent/creditcard.csv").unwrap_err();
        assert!(matches!(err, FraudBenchError::LoadError(_)));
    }

    #[test]
    fn test_missing_required_columns() {
        let file = write_csv("Time,Amount,Class\n0,1.5,0\n");
        let err = DataLoader::credit_card().load_dataset(file.path()).unwrap_err();
        match err {
            FraudBenchError::LoadError(msg) => assert!(msg.contains("V1")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_non_numeric_column_rejected() {
        let file = write_csv("a,b,Class\n1.0,x,0\n2.0,y,1\n");
        let err = DataLoader::new("Class").load_dataset(file.path()).unwrap_err();
        assert!(matches!(err, FraudBenchError::LoadError(_)));
    }

    #[test]
    fn test_label_outside_zero_one_rejected() {
        let file = write_csv("a,Class\n1.0,0\n2.0,2\n");
        let err = DataLoader::new("Class").load_dataset(file.path()).unwrap_err();
        assert!(matches!(err, FraudBenchError::LoadError(_)));
    }

    #[test]
    fn test_missing_label_column() {
        let file = write_csv("a,b\n1.0,2.0\n");
        let err = DataLoader::new("Class").load_dataset(file.path()).unwrap_err();
        assert!(matches!(err, FraudBenchError::LoadError(_)));
    }
}
