//! Class partitioning and the outlier fraction

use super::{ColumnSummary, Dataset, TransactionClass};
use crate::error::{FraudBenchError, Result};
use serde::{Deserialize, Serialize};

/// Where a contamination prior came from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ContaminationSource {
    /// `fraud / normal` counted from the data
    Computed { fraud: usize, normal: usize },
    /// Supplied by configuration
    Override,
}

/// Expected anomaly rate passed to detectors that take a contamination
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierFraction {
    value: f64,
    source: ContaminationSource,
}

impl OutlierFraction {
    /// `fraud / normal`; an empty normal subset is a [`FraudBenchError::DivisionError`]
    pub fn from_counts(fraud: usize, normal: usize) -> Result<Self> {
        if normal == 0 {
            return Err(FraudBenchError::DivisionError(format!(
                "outlier fraction undefined: {} fraud and 0 normal records",
                fraud
            )));
        }
        Ok(Self {
            value: fraud as f64 / normal as f64,
            source: ContaminationSource::Computed { fraud, normal },
        })
    }

    /// A user-supplied prior
    pub fn fixed(value: f64) -> Result<Self> {
        if !value.is_finite() || value < 0.0 {
            return Err(FraudBenchError::invalid_parameter(
                "contamination_override",
                value,
                "must be a finite non-negative number",
            ));
        }
        Ok(Self {
            value,
            source: ContaminationSource::Override,
        })
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn source(&self) -> ContaminationSource {
        self.source
    }
}

/// Disjoint normal/fraud index views over a dataset
#[derive(Debug, Clone)]
pub struct ClassPartition<'a> {
    dataset: &'a Dataset,
    normal: Vec<usize>,
    fraud: Vec<usize>,
}

impl<'a> ClassPartition<'a> {
    /// Split a dataset by label
    pub fn new(dataset: &'a Dataset) -> Self {
        let (fraud, normal): (Vec<usize>, Vec<usize>) =
            (0..dataset.len()).partition(|&i| dataset.labels()[i] == TransactionClass::Fraud.label());
        Self {
            dataset,
            normal,
            fraud,
        }
    }

    /// Underlying dataset
    pub fn dataset(&self) -> &'a Dataset {
        self.dataset
    }

    /// Row indices labeled normal
    pub fn normal(&self) -> &[usize] {
        &self.normal
    }

    /// Row indices labeled fraud
    pub fn fraud(&self) -> &[usize] {
        &self.fraud
    }

    /// Row indices of one class
    pub fn indices(&self, class: TransactionClass) -> &[usize] {
        match class {
            TransactionClass::Normal => &self.normal,
            TransactionClass::Fraud => &self.fraud,
        }
    }

    pub fn n_normal(&self) -> usize {
        self.normal.len()
    }

    pub fn n_fraud(&self) -> usize {
        self.fraud.len()
    }

    /// `|fraud| / |normal|`
    pub fn outlier_fraction(&self) -> Result<OutlierFraction> {
        OutlierFraction::from_counts(self.n_fraud(), self.n_normal())
    }

    /// Class counts in label order: `[(Normal, n), (Fraud, n)]`
    pub fn class_counts(&self) -> [(TransactionClass, usize); 2] {
        [
            (TransactionClass::Normal, self.n_normal()),
            (TransactionClass::Fraud, self.n_fraud()),
        ]
    }

    /// Descriptive statistics of a feature column restricted to one class
    pub fn describe(&self, column: &str, class: TransactionClass) -> Result<ColumnSummary> {
        let values = self.dataset.column(column)?;
        let selected: Vec<f64> = self.indices(class).iter().map(|&i| values[i]).collect();
        Ok(ColumnSummary::from_values(&selected))
    }
}
