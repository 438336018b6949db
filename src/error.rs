//! Error types for fraudbench

use thiserror::Error;

/// Result type alias for fraudbench operations
pub type Result<T> = std::result::Result<T, FraudBenchError>;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum FraudBenchError {
    /// The input source is unreadable or malformed. Fatal.
    #[error("Load error: {0}")]
    LoadError(String),

    /// Outlier fraction requested with no normal records. Fatal.
    #[error("Division error: {0}")]
    DivisionError(String),

    /// A single detector failed to fit or predict. Recoverable.
    #[error("Detector '{detector}' failed: {reason}")]
    DetectorFitError { detector: String, reason: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Computation error: {0}")]
    ComputationError(String),
}

impl FraudBenchError {
    /// Whether the run may continue after this error.
    ///
    /// Only per-detector failures are recoverable; everything else aborts
    /// the evaluation.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FraudBenchError::DetectorFitError { .. })
    }

    pub(crate) fn invalid_parameter(
        name: &str,
        value: impl ToString,
        reason: &str,
    ) -> Self {
        FraudBenchError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<polars::error::PolarsError> for FraudBenchError {
    fn from(err: polars::error::PolarsError) -> Self {
        FraudBenchError::LoadError(err.to_string())
    }
}

impl From<serde_json::Error> for FraudBenchError {
    fn from(err: serde_json::Error) -> Self {
        FraudBenchError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for FraudBenchError {
    fn from(err: ndarray::ShapeError) -> Self {
        FraudBenchError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
