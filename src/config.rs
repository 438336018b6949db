//! Evaluation configuration

use crate::anomaly::{
    AnomalyDetector, IsolationForest, KernelType, LocalOutlierFactor, MaxSamples, OneClassSvm,
    OneClassSvmConfig,
};
use crate::error::{FraudBenchError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Built-in detector kinds and their hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectorSpec {
    IsolationForest {
        #[serde(default = "default_n_estimators")]
        n_estimators: usize,
        #[serde(default = "default_max_samples")]
        max_samples: MaxSamples,
    },
    LocalOutlierFactor {
        #[serde(default = "default_n_neighbors")]
        n_neighbors: usize,
        /// Minkowski power; 2 is Euclidean
        #[serde(default = "default_p")]
        p: f64,
    },
    OneClassSvm {
        #[serde(default)]
        kernel: KernelType,
        #[serde(default = "default_nu")]
        nu: f64,
        #[serde(default = "default_tol")]
        tol: f64,
        #[serde(default)]
        max_iter: Option<usize>,
    },
}

fn default_n_estimators() -> usize {
    100
}

fn default_max_samples() -> MaxSamples {
    MaxSamples::All
}

fn default_n_neighbors() -> usize {
    20
}

fn default_p() -> f64 {
    2.0
}

fn default_nu() -> f64 {
    0.05
}

fn default_tol() -> f64 {
    1e-3
}

impl DetectorSpec {
    pub fn isolation_forest() -> Self {
        DetectorSpec::IsolationForest {
            n_estimators: default_n_estimators(),
            max_samples: default_max_samples(),
        }
    }

    pub fn local_outlier_factor() -> Self {
        DetectorSpec::LocalOutlierFactor {
            n_neighbors: default_n_neighbors(),
            p: default_p(),
        }
    }

    pub fn one_class_svm() -> Self {
        DetectorSpec::OneClassSvm {
            kernel: KernelType::default(),
            nu: default_nu(),
            tol: default_tol(),
            max_iter: None,
        }
    }

    /// Whether the detector is given the contamination prior
    pub fn uses_contamination(&self) -> bool {
        !matches!(self, DetectorSpec::OneClassSvm { .. })
    }

    /// Check hyperparameters without building the detector
    pub fn validate(&self) -> Result<()> {
        match self {
            DetectorSpec::IsolationForest { n_estimators, .. } => {
                if *n_estimators == 0 {
                    return Err(FraudBenchError::invalid_parameter(
                        "n_estimators",
                        n_estimators,
                        "must be at least 1",
                    ));
                }
                Ok(())
            }
            DetectorSpec::LocalOutlierFactor { n_neighbors, p } => {
                if *n_neighbors == 0 {
                    return Err(FraudBenchError::invalid_parameter(
                        "n_neighbors",
                        n_neighbors,
                        "must be at least 1",
                    ));
                }
                LocalOutlierFactor::new(*n_neighbors).with_p(*p).map(|_| ())
            }
            DetectorSpec::OneClassSvm {
                kernel,
                nu,
                tol,
                max_iter,
            } => Self::svm_config(kernel, *nu, *tol, *max_iter).validate(),
        }
    }

    fn svm_config(kernel: &KernelType, nu: f64, tol: f64, max_iter: Option<usize>) -> OneClassSvmConfig {
        OneClassSvmConfig {
            kernel: kernel.clone(),
            nu,
            tol,
            max_iter,
        }
    }

    /// Construct the detector. `seed` feeds randomized detectors only.
    pub fn build(&self, contamination: f64, seed: u64) -> Result<Box<dyn AnomalyDetector>> {
        self.validate()?;
        match self {
            DetectorSpec::IsolationForest {
                n_estimators,
                max_samples,
            } => Ok(Box::new(
                IsolationForest::new()
                    .with_n_estimators(*n_estimators)
                    .with_max_samples(*max_samples)
                    .with_contamination(contamination)
                    .with_seed(seed),
            )),
            DetectorSpec::LocalOutlierFactor { n_neighbors, p } => {
                let lof = LocalOutlierFactor::new(*n_neighbors)
                    .with_contamination(contamination)
                    .with_p(*p)?;
                Ok(Box::new(lof))
            }
            DetectorSpec::OneClassSvm {
                kernel,
                nu,
                tol,
                max_iter,
            } => Ok(Box::new(OneClassSvm::new(Self::svm_config(
                kernel, *nu, *tol, *max_iter,
            )))),
        }
    }
}

/// A detector spec under a display name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedDetector {
    pub name: String,
    #[serde(flatten)]
    pub spec: DetectorSpec,
}

impl NamedDetector {
    pub fn new(name: impl Into<String>, spec: DetectorSpec) -> Self {
        Self {
            name: name.into(),
            spec,
        }
    }
}

/// Configuration for one evaluation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Ground-truth label column
    pub label_column: String,

    /// Fraction of records to evaluate on, in (0, 1]
    pub sample_fraction: f64,

    /// Seed for subsampling and randomized detectors
    pub random_seed: u64,

    /// Contamination prior used instead of the computed outlier fraction
    pub contamination_override: Option<f64>,

    /// Evaluate detectors on worker threads
    pub parallel: bool,

    /// Detectors in evaluation order
    pub detectors: Vec<NamedDetector>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            label_column: "Class".to_string(),
            sample_fraction: 1.0,
            random_seed: 42,
            contamination_override: None,
            parallel: false,
            detectors: vec![
                NamedDetector::new("Isolation Forest", DetectorSpec::isolation_forest()),
                NamedDetector::new("Local Outlier Factor", DetectorSpec::local_outlier_factor()),
                NamedDetector::new("Support Vector Machine", DetectorSpec::one_class_svm()),
            ],
        }
    }
}

impl EvaluationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            FraudBenchError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| FraudBenchError::ConfigError(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Write as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn with_label_column(mut self, column: impl Into<String>) -> Self {
        self.label_column = column.into();
        self
    }

    pub fn with_sample_fraction(mut self, fraction: f64) -> Self {
        self.sample_fraction = fraction;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    pub fn with_contamination_override(mut self, contamination: f64) -> Self {
        self.contamination_override = Some(contamination);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_detectors(mut self, detectors: Vec<NamedDetector>) -> Self {
        self.detectors = detectors;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.label_column.trim().is_empty() {
            return Err(FraudBenchError::ConfigError(
                "label_column must not be empty".to_string(),
            ));
        }
        if !(self.sample_fraction > 0.0 && self.sample_fraction <= 1.0) {
            return Err(FraudBenchError::ConfigError(format!(
                "sample_fraction must be in (0, 1], got {}",
                self.sample_fraction
            )));
        }
        if let Some(c) = self.contamination_override {
            if !(c > 0.0 && c <= 0.5) {
                return Err(FraudBenchError::ConfigError(format!(
                    "contamination_override must be in (0, 0.5], got {}",
                    c
                )));
            }
        }
        if self.detectors.is_empty() {
            return Err(FraudBenchError::ConfigError(
                "at least one detector is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for d in &self.detectors {
            if d.name.trim().is_empty() {
                return Err(FraudBenchError::ConfigError(
                    "detector name must not be empty".to_string(),
                ));
            }
            if !seen.insert(d.name.as_str()) {
                return Err(FraudBenchError::ConfigError(format!(
                    "duplicate detector name '{}'",
                    d.name
                )));
            }
            d.spec.validate().map_err(|e| {
                FraudBenchError::ConfigError(format!("detector '{}': {}", d.name, e))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::DetectionProtocol;

    #[test]
    fn test_default_config() {
        let config = EvaluationConfig::default();
        assert_eq!(config.label_column, "Class");
        assert_eq!(config.sample_fraction, 1.0);
        assert_eq!(config.random_seed, 42);
        assert!(config.contamination_override.is_none());

        let names: Vec<&str> = config.detectors.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Isolation Forest", "Local Outlier Factor", "Support Vector Machine"]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = EvaluationConfig::new()
            .with_sample_fraction(0.1)
            .with_seed(1)
            .with_contamination_override(0.01)
            .with_parallel(true);

        assert_eq!(config.sample_fraction, 0.1);
        assert_eq!(config.random_seed, 1);
        assert_eq!(config.contamination_override, Some(0.01));
        assert!(config.parallel);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(EvaluationConfig::new().with_sample_fraction(0.0).validate().is_err());
        assert!(EvaluationConfig::new().with_sample_fraction(1.5).validate().is_err());
        assert!(EvaluationConfig::new()
            .with_contamination_override(0.7)
            .validate()
            .is_err());
        assert!(EvaluationConfig::new().with_detectors(vec![]).validate().is_err());

        let dup = vec![
            NamedDetector::new("a", DetectorSpec::isolation_forest()),
            NamedDetector::new("a", DetectorSpec::one_class_svm()),
        ];
        assert!(EvaluationConfig::new().with_detectors(dup).validate().is_err());
    }

    #[test]
    fn test_json_partial_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "sample_fraction": 0.5,
                "detectors": [
                    {"name": "forest", "kind": "isolation_forest", "n_estimators": 10},
                    {"name": "svm", "kind": "one_class_svm", "kernel": {"type": "linear"}}
                ]
            }"#,
        )
        .unwrap();

        let config = EvaluationConfig::from_json_file(&path).unwrap();
        assert_eq!(config.sample_fraction, 0.5);
        assert_eq!(config.random_seed, 42);
        assert_eq!(
            config.detectors[0].spec,
            DetectorSpec::IsolationForest {
                n_estimators: 10,
                max_samples: MaxSamples::All,
            }
        );
        match &config.detectors[1].spec {
            DetectorSpec::OneClassSvm { kernel, nu, .. } => {
                assert_eq!(*kernel, KernelType::Linear);
                assert_eq!(*nu, 0.05);
            }
            other => panic!("unexpected spec {:?}", other),
        }
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = EvaluationConfig::new().with_seed(7);
        config.save(&path).unwrap();
        assert_eq!(EvaluationConfig::from_json_file(&path).unwrap(), config);
    }

    #[test]
    fn test_build_detectors() {
        let lof = DetectorSpec::local_outlier_factor().build(0.1, 0).unwrap();
        assert_eq!(lof.protocol(), DetectionProtocol::Combined);

        let forest = DetectorSpec::isolation_forest().build(0.1, 3).unwrap();
        assert_eq!(forest.protocol(), DetectionProtocol::Separate);

        assert!(!DetectorSpec::one_class_svm().uses_contamination());

        let bad = DetectorSpec::LocalOutlierFactor { n_neighbors: 5, p: 0.5 };
        assert!(bad.build(0.1, 0).is_err());
    }

    #[test]
    fn test_validation_checks_detector_hyperparameters() {
        let invalid = [
            DetectorSpec::IsolationForest {
                n_estimators: 0,
                max_samples: MaxSamples::All,
            },
            DetectorSpec::LocalOutlierFactor { n_neighbors: 20, p: 0.5 },
            DetectorSpec::OneClassSvm {
                kernel: KernelType::default(),
                nu: 1.5,
                tol: 1e-3,
                max_iter: None,
            },
            DetectorSpec::OneClassSvm {
                kernel: KernelType::RBF { gamma: -1.0 },
                nu: 0.05,
                tol: 1e-3,
                max_iter: None,
            },
        ];

        for spec in invalid {
            assert!(spec.validate().is_err());
            let config = EvaluationConfig::new().with_detectors(vec![NamedDetector::new("bad", spec)]);
            match config.validate() {
                Err(FraudBenchError::ConfigError(msg)) => assert!(msg.contains("'bad'")),
                other => panic!("expected config error, got {:?}", other),
            }
        }

        assert!(DetectorSpec::one_class_svm().validate().is_ok());
    }
}
