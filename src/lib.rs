//! fraudbench - anomaly-detector evaluation on labeled card transactions
//!
//! Loads a labeled transaction file, optionally subsamples it, derives the
//! fraud/normal outlier fraction and fits a set of unsupervised detectors on
//! the features alone. Each detector's predictions are normalized to the
//! dataset's `0` normal / `1` fraud convention and scored against the
//! ground truth.
//!
//! # Modules
//!
//! ## Data
//! - [`utils`] - CSV loading and preparation, stage timing
//! - [`dataset`] - Immutable labeled dataset, class partition, subsampling
//!
//! ## Detection
//! - [`anomaly`] - Detector trait, Isolation Forest, LOF, One-Class SVM
//! - [`metrics`] - Accuracy, error counts, classification report
//! - [`evaluation`] - Harness running detectors with failure isolation
//!
//! ## Orchestration
//! - [`config`] - Run configuration and detector specs
//! - [`pipeline`] - End-to-end run
//! - [`report`] - Text rendering of outcomes
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Data
pub mod utils;
pub mod dataset;

// Detection
pub mod anomaly;
pub mod metrics;
pub mod evaluation;

// Orchestration
pub mod config;
pub mod pipeline;
pub mod report;
pub mod cli;

pub use error::{FraudBenchError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{FraudBenchError, Result};

    // Data
    pub use crate::dataset::{ClassPartition, ColumnSummary, Dataset, OutlierFraction, TransactionClass};
    pub use crate::utils::{DataLoader, PreparationSummary, PreparedDataset, Timer};

    // Detectors
    pub use crate::anomaly::{
        AnomalyDetector, DetectionProtocol, IsolationForest, LocalOutlierFactor, NormalizedPredictions,
        OneClassSvm, OneClassSvmConfig, RawPredictions,
    };

    // Evaluation
    pub use crate::evaluation::{DetectorOutcome, EvaluationHarness, EvaluationReport, OutcomeStatus};
    pub use crate::metrics::{accuracy_score, count_errors, ClassificationReport};

    // Orchestration
    pub use crate::config::{DetectorSpec, EvaluationConfig, NamedDetector};
    pub use crate::pipeline::{run, PipelineReport};
}
