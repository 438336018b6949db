//! Model evaluation harness
//!
//! Fits every registered detector on the same feature matrix, in
//! registration order, and scores its normalized predictions against the
//! ground-truth labels. A detector that errors or panics becomes a failed
//! outcome; the remaining detectors still run.

use crate::anomaly::{AnomalyDetector, DetectionProtocol, NormalizedPredictions, RawPredictions};
use crate::dataset::{Dataset, TransactionClass};
use crate::error::{FraudBenchError, Result};
use crate::metrics::{accuracy_score, count_errors, ClassificationReport};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Everything measured for a detector that completed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorEvaluation {
    /// Labels in the detector's native encoding
    pub raw: RawPredictions,
    /// Labels mapped to `0` normal / `1` fraud
    pub predictions: NormalizedPredictions,
    /// Continuous scores, when the protocol yields them
    pub scores: Option<Array1<f64>>,
    /// Count of predictions that differ from the ground truth
    pub errors: usize,
    pub accuracy: f64,
    pub report: ClassificationReport,
    /// Wall time for fitting, predicting and scoring
    pub elapsed: Duration,
}

/// Result of one detector
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Evaluated(DetectorEvaluation),
    Failed { reason: String },
}

/// A named detector outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorOutcome {
    pub name: String,
    pub status: OutcomeStatus,
}

impl DetectorOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Evaluated(_))
    }

    pub fn evaluation(&self) -> Option<&DetectorEvaluation> {
        match &self.status {
            OutcomeStatus::Evaluated(eval) => Some(eval),
            OutcomeStatus::Failed { .. } => None,
        }
    }

    /// The failure as a [`FraudBenchError::DetectorFitError`]
    pub fn error(&self) -> Option<FraudBenchError> {
        match &self.status {
            OutcomeStatus::Evaluated(_) => None,
            OutcomeStatus::Failed { reason } => Some(FraudBenchError::DetectorFitError {
                detector: self.name.clone(),
                reason: reason.clone(),
            }),
        }
    }
}

/// Outcomes of one harness run, in registration order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub n_samples: usize,
    /// Contamination prior the detectors were built with
    pub outlier_fraction: f64,
    pub outcomes: Vec<DetectorOutcome>,
}

impl EvaluationReport {
    pub fn outcome(&self, name: &str) -> Option<&DetectorOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }

    pub fn n_failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_success()).count()
    }
}

/// Runs a set of named detectors against one labeled feature matrix
pub struct EvaluationHarness {
    detectors: Vec<(String, Box<dyn AnomalyDetector>)>,
    outlier_fraction: f64,
    target_names: Vec<String>,
    parallel: bool,
}

impl EvaluationHarness {
    /// `outlier_fraction` is recorded on the report; detectors receive it
    /// at construction
    pub fn new(outlier_fraction: f64) -> Self {
        Self {
            detectors: Vec::new(),
            outlier_fraction,
            target_names: [TransactionClass::Normal, TransactionClass::Fraud]
                .iter()
                .map(|c| c.name().to_string())
                .collect(),
            parallel: false,
        }
    }

    /// Register a detector; names must be unique
    pub fn register(
        &mut self,
        name: impl Into<String>,
        detector: Box<dyn AnomalyDetector>,
    ) -> Result<&mut Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(FraudBenchError::ConfigError(
                "detector name must not be empty".to_string(),
            ));
        }
        if self.detectors.iter().any(|(n, _)| *n == name) {
            return Err(FraudBenchError::ConfigError(format!(
                "detector '{}' registered twice",
                name
            )));
        }
        self.detectors.push((name, detector));
        Ok(self)
    }

    /// Evaluate detectors on rayon worker threads
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Names used for classes `0` and `1` in reports
    pub fn with_target_names(mut self, names: Vec<String>) -> Self {
        self.target_names = names;
        self
    }

    /// Registered names, in order
    pub fn detector_names(&self) -> Vec<&str> {
        self.detectors.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// Evaluate on a dataset's features and labels
    pub fn evaluate_dataset(&mut self, dataset: &Dataset) -> Result<EvaluationReport> {
        let x = dataset.features().to_owned();
        self.evaluate(&x, dataset.labels())
    }

    /// Fit and score every detector. `y` is used for scoring only.
    pub fn evaluate(&mut self, x: &Array2<f64>, y: ArrayView1<'_, i64>) -> Result<EvaluationReport> {
        if x.nrows() != y.len() {
            return Err(FraudBenchError::ShapeError {
                expected: format!("{} labels", x.nrows()),
                actual: format!("{} labels", y.len()),
            });
        }

        info!(
            detectors = self.detectors.len(),
            samples = x.nrows(),
            parallel = self.parallel,
            "Evaluating detectors"
        );

        let names: Vec<&str> = self.target_names.iter().map(String::as_str).collect();
        let names = names.as_slice();

        let outcomes: Vec<DetectorOutcome> = if self.parallel {
            self.detectors
                .par_iter_mut()
                .map(|(name, detector)| evaluate_one(name, detector.as_mut(), x, y, names))
                .collect()
        } else {
            self.detectors
                .iter_mut()
                .map(|(name, detector)| evaluate_one(name, detector.as_mut(), x, y, names))
                .collect()
        };

        Ok(EvaluationReport {
            n_samples: x.nrows(),
            outlier_fraction: self.outlier_fraction,
            outcomes,
        })
    }
}

fn evaluate_one(
    name: &str,
    detector: &mut dyn AnomalyDetector,
    x: &Array2<f64>,
    y: ArrayView1<'_, i64>,
    target_names: &[&str],
) -> DetectorOutcome {
    debug!(detector = name, protocol = ?detector.protocol(), "Fitting detector");

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        run_detector(detector, x, y, target_names)
    }));

    let status = match result {
        Ok(Ok(eval)) => {
            info!(
                detector = name,
                errors = eval.errors,
                accuracy = eval.accuracy,
                elapsed_ms = eval.elapsed.as_millis() as u64,
                "Detector evaluated"
            );
            OutcomeStatus::Evaluated(eval)
        }
        Ok(Err(e)) => {
            warn!(detector = name, error = %e, "Detector failed");
            OutcomeStatus::Failed {
                reason: e.to_string(),
            }
        }
        Err(payload) => {
            let reason = format!("panicked: {}", panic_message(payload.as_ref()));
            warn!(detector = name, reason = %reason, "Detector failed");
            OutcomeStatus::Failed { reason }
        }
    };

    DetectorOutcome {
        name: name.to_string(),
        status,
    }
}

fn run_detector(
    detector: &mut dyn AnomalyDetector,
    x: &Array2<f64>,
    y: ArrayView1<'_, i64>,
    target_names: &[&str],
) -> Result<DetectorEvaluation> {
    let start = Instant::now();

    let (labels, scores) = match detector.protocol() {
        DetectionProtocol::Combined => {
            let labels = detector.fit_predict(x)?;
            (labels, detector.training_scores())
        }
        DetectionProtocol::Separate => {
            detector.fit(x)?;
            let scores = detector.decision_function(x)?;
            let labels = detector.predict(x)?;
            (labels, Some(scores))
        }
    };

    if labels.len() != y.len() {
        return Err(FraudBenchError::ShapeError {
            expected: format!("{} predictions", y.len()),
            actual: format!("{} predictions", labels.len()),
        });
    }

    let raw = RawPredictions::new(labels, detector.encoding());
    let predictions = raw.normalize()?;
    let pred = predictions.labels().view();

    let errors = count_errors(y, pred)?;
    let accuracy = accuracy_score(y, pred)?;
    let report = ClassificationReport::new(y, pred, Some(target_names))?;

    Ok(DetectorEvaluation {
        raw,
        predictions,
        scores,
        errors,
        accuracy,
        report,
        elapsed: start.elapsed(),
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
