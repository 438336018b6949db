//! End-to-end evaluation run
//!
//! load → optional subsample → partition → build detectors → evaluate.
//! One `Xoshiro256PlusPlus` generator, seeded from the configuration,
//! drives both the subsample and every detector seed.

use crate::config::EvaluationConfig;
use crate::dataset::{ColumnSummary, Dataset, OutlierFraction, TransactionClass};
use crate::error::{FraudBenchError, Result};
use crate::evaluation::{EvaluationHarness, EvaluationReport};
use crate::utils::{credit_card_columns, DataLoader, PreparationSummary, PreparedDataset, Timer};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Records of one class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCount {
    pub class: TransactionClass,
    pub count: usize,
}

/// Everything produced by [`run`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Row accounting from preparation
    pub preparation: PreparationSummary,
    /// Records after subsampling
    pub n_records: usize,
    pub class_counts: Vec<ClassCount>,
    /// Contamination prior handed to the detectors
    pub outlier_fraction: OutlierFraction,
    pub evaluation: EvaluationReport,
    pub elapsed: Duration,
}

impl PipelineReport {
    pub fn count(&self, class: TransactionClass) -> usize {
        self.class_counts
            .iter()
            .find(|c| c.class == class)
            .map(|c| c.count)
            .unwrap_or(0)
    }
}

/// Class balance and per-class statistics of a prepared file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub preparation: PreparationSummary,
    pub n_features: usize,
    pub class_counts: Vec<ClassCount>,
    /// `None` when there are no normal records
    pub outlier_fraction: Option<f64>,
    /// Column described per class
    pub column: String,
    pub column_summaries: Vec<(TransactionClass, ColumnSummary)>,
}

/// Loader for a configuration: the credit-card header with the configured label
pub fn loader_for(config: &EvaluationConfig) -> DataLoader {
    let mut columns = credit_card_columns();
    columns.retain(|c| c != "Class");
    columns.push(config.label_column.clone());

    DataLoader::new(config.label_column.clone()).with_required_columns(columns)
}

/// Load, prepare and evaluate the file at `path`
pub fn run(path: impl AsRef<Path>, config: &EvaluationConfig) -> Result<PipelineReport> {
    config.validate()?;
    let mut timer = Timer::start("evaluation pipeline");

    let PreparedDataset { dataset, summary } = loader_for(config).load_dataset(path)?;
    timer.checkpoint("load");

    let report = run_on_dataset(&dataset, summary, config, &mut timer)?;
    timer.stop_with_report();
    Ok(report)
}

/// Evaluate an already prepared dataset
pub fn evaluate_dataset(
    dataset: &Dataset,
    summary: PreparationSummary,
    config: &EvaluationConfig,
) -> Result<PipelineReport> {
    config.validate()?;
    let mut timer = Timer::start("evaluation");
    let report = run_on_dataset(dataset, summary, config, &mut timer)?;
    timer.stop();
    Ok(report)
}

fn run_on_dataset(
    dataset: &Dataset,
    summary: PreparationSummary,
    config: &EvaluationConfig,
    timer: &mut Timer,
) -> Result<PipelineReport> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(config.random_seed);

    let sampled;
    let data = if config.sample_fraction < 1.0 {
        sampled = dataset.subsample(config.sample_fraction, &mut rng)?;
        timer.checkpoint("subsample");
        &sampled
    } else {
        dataset
    };

    if data.is_empty() {
        return Err(FraudBenchError::LoadError(
            "no complete records left to evaluate".to_string(),
        ));
    }

    let partition = data.partition();
    let computed = partition.outlier_fraction()?;
    let class_counts: Vec<ClassCount> = partition
        .class_counts()
        .iter()
        .map(|&(class, count)| ClassCount { class, count })
        .collect();

    info!(
        fraud = partition.n_fraud(),
        valid = partition.n_normal(),
        outlier_fraction = computed.value(),
        "Class balance"
    );

    let outlier_fraction = match config.contamination_override {
        Some(c) => {
            info!(contamination = c, "Using contamination override");
            OutlierFraction::fixed(c)?
        }
        None => computed,
    };

    let mut harness = EvaluationHarness::new(outlier_fraction.value()).with_parallel(config.parallel);
    for named in &config.detectors {
        let seed: u64 = rng.gen();
        let detector = named.spec.build(outlier_fraction.value(), seed)?;
        harness.register(named.name.clone(), detector)?;
    }

    let evaluation = harness.evaluate_dataset(data)?;
    timer.checkpoint("evaluate");

    Ok(PipelineReport {
        preparation: summary,
        n_records: data.len(),
        class_counts,
        outlier_fraction,
        evaluation,
        elapsed: timer.elapsed(),
    })
}

/// Load a file and summarise its class balance and one column per class
pub fn describe(
    path: impl AsRef<Path>,
    config: &EvaluationConfig,
    column: &str,
) -> Result<DatasetInfo> {
    let PreparedDataset { dataset, summary } = loader_for(config).load_dataset(path)?;
    let partition = dataset.partition();

    let column_summaries = [TransactionClass::Normal, TransactionClass::Fraud]
        .iter()
        .map(|&class| Ok((class, partition.describe(column, class)?)))
        .collect::<Result<Vec<_>>>()?;

    Ok(DatasetInfo {
        preparation: summary,
        n_features: dataset.n_features(),
        class_counts: partition
            .class_counts()
            .iter()
            .map(|&(class, count)| ClassCount { class, count })
            .collect(),
        outlier_fraction: partition.outlier_fraction().ok().map(|f| f.value()),
        column: column.to_string(),
        column_summaries,
    })
}
