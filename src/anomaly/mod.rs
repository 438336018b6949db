//! Anomaly detection module
//!
//! Provides the detector capability used by the evaluation harness and the
//! built-in detectors:
//! - Isolation Forest
//! - Local Outlier Factor (LOF)
//! - One-Class SVM
//!
//! Detectors speak their native label encoding (`+1` inlier, `-1` outlier).
//! [`RawPredictions::normalize`] maps it onto the dataset convention
//! (`0` normal, `1` fraud) without touching the raw labels.

mod isolation_forest;
mod lof;
mod one_class_svm;

pub use isolation_forest::{IsolationForest, IsolationTree, MaxSamples};
pub use lof::{LocalOutlierFactor, LOFResult};
pub use one_class_svm::{KernelType, OneClassSvm, OneClassSvmConfig};

use crate::error::{FraudBenchError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// How a detector is driven to produce labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionProtocol {
    /// `fit`, then `decision_function` and `predict` as separate calls
    Separate,
    /// A single `fit_predict`; scores, if any, come from the fitted state
    Combined,
}

/// Native label values emitted by a detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeEncoding {
    pub inlier: i32,
    pub outlier: i32,
}

impl Default for NativeEncoding {
    fn default() -> Self {
        Self {
            inlier: 1,
            outlier: -1,
        }
    }
}

/// Labels exactly as a detector produced them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPredictions {
    labels: Array1<i32>,
    encoding: NativeEncoding,
}

impl RawPredictions {
    pub fn new(labels: Array1<i32>, encoding: NativeEncoding) -> Self {
        Self { labels, encoding }
    }

    pub fn labels(&self) -> &Array1<i32> {
        &self.labels
    }

    pub fn encoding(&self) -> NativeEncoding {
        self.encoding
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Map native inlier to 0 and native outlier to 1.
    ///
    /// Fails on any value outside the detector's encoding.
    pub fn normalize(&self) -> Result<NormalizedPredictions> {
        let enc = self.encoding;
        let labels = self
            .labels
            .iter()
            .enumerate()
            .map(|(i, &l)| {
                if l == enc.inlier {
                    Ok(0)
                } else if l == enc.outlier {
                    Ok(1)
                } else {
                    Err(FraudBenchError::ValidationError(format!(
                        "prediction {} is {}, expected {} (inlier) or {} (outlier)",
                        i, l, enc.inlier, enc.outlier
                    )))
                }
            })
            .collect::<Result<Array1<i64>>>()?;
        Ok(NormalizedPredictions(labels))
    }
}

/// Predictions in the dataset convention: `0` normal, `1` fraud
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedPredictions(Array1<i64>);

impl NormalizedPredictions {
    pub fn labels(&self) -> &Array1<i64> {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Already in the dataset convention; returns an identical copy
    pub fn normalize(&self) -> NormalizedPredictions {
        self.clone()
    }

    /// Number of rows flagged as outliers
    pub fn n_outliers(&self) -> usize {
        self.0.iter().filter(|&&l| l == 1).count()
    }
}

/// Trait for anomaly detectors
pub trait AnomalyDetector: Send + Sync {
    /// Which calls the harness should make
    fn protocol(&self) -> DetectionProtocol {
        DetectionProtocol::Separate
    }

    /// Native label values
    fn encoding(&self) -> NativeEncoding {
        NativeEncoding::default()
    }

    /// Fit the detector on training data
    fn fit(&mut self, x: &Array2<f64>) -> Result<()>;

    /// Compute anomaly scores for new data (higher = more anomalous)
    fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Predict labels (-1 = anomaly, 1 = normal)
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<i32>>;

    /// Fit and predict in one step
    fn fit_predict(&mut self, x: &Array2<f64>) -> Result<Array1<i32>> {
        self.fit(x)?;
        self.predict(x)
    }

    /// Signed distance to the decision threshold; negative means outlier
    fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let threshold = self.threshold();
        Ok(self.score_samples(x)?.mapv(|s| threshold - s))
    }

    /// Scores of the training set computed during `fit`, if the detector keeps them
    fn training_scores(&self) -> Option<Array1<f64>> {
        None
    }

    /// Get the decision threshold
    fn threshold(&self) -> f64;
}

/// Score cut-off that flags `round(contamination * n)` of `scores` as outliers.
///
/// A score is an outlier when it is strictly greater than the returned value.
pub(crate) fn contamination_threshold(scores: &[f64], contamination: f64) -> f64 {
    let n = scores.len();
    if n == 0 {
        return f64::INFINITY;
    }

    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(Ordering::Equal));

    let k = (contamination * n as f64).round() as usize;
    if k == 0 {
        sorted[0]
    } else if k >= n {
        f64::NEG_INFINITY
    } else {
        (sorted[k - 1] + sorted[k]) / 2.0
    }
}

/// Turn scores into native labels given a threshold
pub(crate) fn label_scores(scores: &Array1<f64>, threshold: f64) -> Array1<i32> {
    scores.mapv(|s| if s > threshold { -1 } else { 1 })
}

pub(crate) fn validate_input(x: &Array2<f64>, min_samples: usize) -> Result<()> {
    if x.nrows() < min_samples {
        return Err(FraudBenchError::ValidationError(format!(
            "need at least {} samples, got {}",
            min_samples,
            x.nrows()
        )));
    }
    if x.ncols() == 0 {
        return Err(FraudBenchError::ValidationError(
            "input has no feature columns".to_string(),
        ));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(FraudBenchError::ValidationError(
            "input contains NaN or infinite values".to_string(),
        ));
    }
    Ok(())
}
