//! Labeled transaction datasets
//!
//! A [`Dataset`] is built once by the loader and never mutated afterwards.
//! Partitions and subsamples are derived from it:
//! - [`partition`] - normal/fraud views and the outlier fraction
//! - [`sampling`] - seeded subsampling without replacement
//! - [`stats`] - per-column descriptive statistics

pub mod partition;
pub mod sampling;
pub mod stats;

pub use partition::{ClassPartition, ContaminationSource, OutlierFraction};
pub use stats::ColumnSummary;

use crate::error::{FraudBenchError, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ground-truth class of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TransactionClass {
    Normal,
    Fraud,
}

impl TransactionClass {
    /// Dataset label value
    pub fn label(self) -> i64 {
        match self {
            TransactionClass::Normal => 0,
            TransactionClass::Fraud => 1,
        }
    }

    /// Parse a dataset label value
    pub fn from_label(label: i64) -> Option<Self> {
        match label {
            0 => Some(TransactionClass::Normal),
            1 => Some(TransactionClass::Fraud),
            _ => None,
        }
    }

    /// Display name used in reports
    pub fn name(self) -> &'static str {
        match self {
            TransactionClass::Normal => "Normal",
            TransactionClass::Fraud => "Fraud",
        }
    }
}

impl fmt::Display for TransactionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Borrowed view of one record
#[derive(Debug, Clone, Copy)]
pub struct RecordView<'a> {
    /// Position in the dataset
    pub index: usize,
    /// Feature values, in `feature_names` order
    pub features: ArrayView1<'a, f64>,
    /// Ground-truth class
    pub class: TransactionClass,
}

/// Immutable labeled dataset: a feature matrix plus a 0/1 label vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    feature_names: Vec<String>,
    label_column: String,
    features: Array2<f64>,
    labels: Array1<i64>,
}

impl Dataset {
    /// Build a dataset, checking shapes, labels and the no-missing-values invariant
    pub fn new(
        feature_names: Vec<String>,
        label_column: impl Into<String>,
        features: Array2<f64>,
        labels: Array1<i64>,
    ) -> Result<Self> {
        if features.ncols() != feature_names.len() {
            return Err(FraudBenchError::ShapeError {
                expected: format!("{} feature columns", feature_names.len()),
                actual: format!("{} columns", features.ncols()),
            });
        }
        if features.nrows() != labels.len() {
            return Err(FraudBenchError::ShapeError {
                expected: format!("{} labels", features.nrows()),
                actual: format!("{} labels", labels.len()),
            });
        }
        if let Some(pos) = labels.iter().position(|&l| TransactionClass::from_label(l).is_none()) {
            return Err(FraudBenchError::ValidationError(format!(
                "row {}: label must be 0 or 1, found {}",
                pos, labels[pos]
            )));
        }
        if features.iter().any(|v| v.is_nan()) {
            return Err(FraudBenchError::ValidationError(
                "dataset contains missing (NaN) feature values".to_string(),
            ));
        }

        Ok(Self {
            feature_names,
            label_column: label_column.into(),
            features,
            labels,
        })
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the dataset has no records
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of feature columns
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Feature column names
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Label column name
    pub fn label_column(&self) -> &str {
        &self.label_column
    }

    /// Feature matrix `X` (every column except the label)
    pub fn features(&self) -> ArrayView2<'_, f64> {
        self.features.view()
    }

    /// Label vector `Y`
    pub fn labels(&self) -> ArrayView1<'_, i64> {
        self.labels.view()
    }

    /// Values of one feature column
    pub fn column(&self, name: &str) -> Result<ArrayView1<'_, f64>> {
        let idx = self
            .feature_names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| FraudBenchError::FeatureNotFound(name.to_string()))?;
        Ok(self.features.column(idx))
    }

    /// Borrow one record
    pub fn record(&self, index: usize) -> Option<RecordView<'_>> {
        if index >= self.len() {
            return None;
        }
        Some(RecordView {
            index,
            features: self.features.row(index),
            class: TransactionClass::from_label(self.labels[index])?,
        })
    }

    /// Iterate over records in order
    pub fn records(&self) -> impl Iterator<Item = RecordView<'_>> + '_ {
        (0..self.len()).filter_map(move |i| self.record(i))
    }

    /// Partition into normal and fraud views
    pub fn partition(&self) -> ClassPartition<'_> {
        ClassPartition::new(self)
    }

    /// New dataset holding the given rows, in the given order
    pub fn select_rows(&self, indices: &[usize]) -> Result<Dataset> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.len()) {
            return Err(FraudBenchError::ValidationError(format!(
                "row index {} out of bounds for {} records",
                bad,
                self.len()
            )));
        }
        Ok(Dataset {
            feature_names: self.feature_names.clone(),
            label_column: self.label_column.clone(),
            features: self.features.select(Axis(0), indices),
            labels: self.labels.select(Axis(0), indices),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::ten_record_dataset;
    use super::*;

    #[test]
    fn test_dataset_accessors() {
        let ds = ten_record_dataset();
        assert_eq!(ds.len(), 10);
        assert_eq!(ds.n_features(), 2);
        assert_eq!(ds.label_column(), "Class");
        assert_eq!(ds.column("Amount").unwrap()[3], 6.0);
        assert!(matches!(ds.column("V1"), Err(FraudBenchError::FeatureNotFound(_))));
    }

    #[test]
    fn test_records_carry_class() {
        let ds = ten_record_dataset();
        let frauds: Vec<usize> = ds
            .records()
            .filter(|r| r.class == TransactionClass::Fraud)
            .map(|r| r.index)
            .collect();
        assert_eq!(frauds, vec![3, 7]);
        assert!(ds.record(10).is_none());
    }

    #[test]
    fn test_rejects_bad_labels() {
        let x = Array2::zeros((2, 1));
        let y = Array1::from_vec(vec![0, 3]);
        let err = Dataset::new(vec!["a".to_string()], "Class", x, y).unwrap_err();
        assert!(matches!(err, FraudBenchError::ValidationError(_)));
    }

    #[test]
    fn test_rejects_nan_features() {
        let x = Array2::from_shape_vec((2, 1), vec![1.0, f64::NAN]).unwrap();
        let y = Array1::from_vec(vec![0, 1]);
        assert!(Dataset::new(vec!["a".to_string()], "Class", x, y).is_err());
    }

    #[test]
    fn test_rejects_shape_mismatch() {
        let x = Array2::zeros((3, 2));
        let y = Array1::from_vec(vec![0, 1]);
        let err = Dataset::new(vec!["a".to_string(), "b".to_string()], "Class", x, y).unwrap_err();
        assert!(matches!(err, FraudBenchError::ShapeError { .. }));
    }

    #[test]
    fn test_select_rows() {
        let ds = ten_record_dataset();
        let sub = ds.select_rows(&[3, 0]).unwrap();
        assert_eq!(sub.len(), 2);
        assert_eq!(sub.labels()[0], 1);
        assert_eq!(sub.features()[[1, 0]], 0.0);
        assert!(ds.select_rows(&[42]).is_err());
    }
}
