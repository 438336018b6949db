//! fraudbench CLI Module
//!
//! Command-line interface for evaluating detectors and inspecting data files.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};

use crate::config::EvaluationConfig;
use crate::evaluation::OutcomeStatus;
use crate::pipeline::{self, PipelineReport};
use crate::report::render_outcome;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn indent(text: &str) {
    for line in text.lines() {
        println!("    {}", line);
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "fraudbench")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Evaluate unsupervised anomaly detectors on labeled card transactions")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fit every configured detector and report errors, accuracy and per-class metrics
    Evaluate {
        /// Input transaction file (CSV)
        #[arg(short, long)]
        data: PathBuf,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Fraction of records to evaluate on, in (0, 1]. LOF is quadratic in the
        /// row count; use about 0.1 on the full credit-card file
        #[arg(long)]
        sample_fraction: Option<f64>,

        /// Random seed for subsampling and detectors
        #[arg(long)]
        seed: Option<u64>,

        /// Contamination prior instead of the computed outlier fraction
        #[arg(long)]
        contamination: Option<f64>,

        /// Evaluate detectors in parallel
        #[arg(long)]
        parallel: bool,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show class balance and per-class statistics of a data file
    Info {
        /// Input transaction file (CSV)
        #[arg(short, long)]
        data: PathBuf,

        /// JSON configuration file (for the label column)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Column to describe per class
        #[arg(long, default_value = "Amount")]
        column: String,
    },
}

/// Configuration from an optional file, with command-line overrides applied
pub fn resolve_config(
    config_path: Option<&Path>,
    sample_fraction: Option<f64>,
    seed: Option<u64>,
    contamination: Option<f64>,
    parallel: bool,
) -> anyhow::Result<EvaluationConfig> {
    let mut config = match config_path {
        Some(path) => EvaluationConfig::from_json_file(path)?,
        None => EvaluationConfig::default(),
    };

    if let Some(f) = sample_fraction {
        config = config.with_sample_fraction(f);
    }
    if let Some(s) = seed {
        config = config.with_seed(s);
    }
    if let Some(c) = contamination {
        config = config.with_contamination_override(c);
    }
    if parallel {
        config = config.with_parallel(true);
    }

    config.validate()?;
    Ok(config)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_evaluate(data_path: &Path, config: &EvaluationConfig, json: bool) -> anyhow::Result<()> {
    if json {
        let report = pipeline::run(data_path, config)?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    section("Evaluate");
    step_run("Running detectors");
    let report = pipeline::run(data_path, config)?;
    step_done(&format!(
        "{} records, {:.2?}",
        report.n_records, report.elapsed
    ));

    print_class_balance(&report);
    print_results_table(&report);

    section("Reports");
    for outcome in &report.evaluation.outcomes {
        println!();
        let text = render_outcome(outcome);
        if outcome.is_success() {
            indent(&text);
        } else {
            for line in text.lines() {
                println!("    {}", line.red());
            }
        }
    }

    println!();
    Ok(())
}

fn print_class_balance(report: &PipelineReport) {
    use crate::dataset::TransactionClass;

    section("Class Balance");
    println!("  {:<18} {}", muted("Rows read"), report.preparation.rows_read);
    println!("  {:<18} {}", muted("Rows dropped"), report.preparation.rows_dropped());
    println!("  {:<18} {}", muted("Evaluated"), report.n_records);
    println!("  {:<18} {}", muted("Fraud Cases"), report.count(TransactionClass::Fraud));
    println!("  {:<18} {}", muted("Valid Cases"), report.count(TransactionClass::Normal));
    println!("  {:<18} {:.6}", muted("Outlier fraction"), report.outlier_fraction.value());
}

fn print_results_table(report: &PipelineReport) {
    section("Results");
    println!(
        "  {:<26} {:>8} {:>10} {:>10}",
        muted("Detector"),
        muted("Errors"),
        muted("Accuracy"),
        muted("Time")
    );
    println!("  {}", dim(&"─".repeat(56)));

    for outcome in &report.evaluation.outcomes {
        match &outcome.status {
            OutcomeStatus::Evaluated(eval) => {
                println!(
                    "  {:<26} {:>8} {:>10.4} {:>10.2?}",
                    outcome.name, eval.errors, eval.accuracy, eval.elapsed
                );
            }
            OutcomeStatus::Failed { reason } => {
                println!("  {:<26} {}", outcome.name, format!("err: {}", reason).red());
            }
        }
    }
    println!("  {}", dim(&"─".repeat(56)));

    let best = report
        .evaluation
        .outcomes
        .iter()
        .filter_map(|o| o.evaluation().map(|e| (o.name.as_str(), e.errors)))
        .min_by_key(|(_, errors)| *errors);
    if let Some((name, errors)) = best {
        println!();
        println!("  {} {} {} {}", ok("fewest errors"), name.white().bold(), muted("errors:"), errors);
    }
}

pub fn cmd_info(data_path: &Path, config: &EvaluationConfig, column: &str) -> anyhow::Result<()> {
    section("Data Info");

    step_run("Loading data");
    let info = pipeline::describe(data_path, config, column)?;
    step_done(&format!(
        "{} rows kept, {} dropped",
        info.preparation.rows_kept(),
        info.preparation.rows_dropped()
    ));

    println!();
    println!("  {:<18} {}", muted("File"), data_path.display());
    println!("  {:<18} {}", muted("Features"), info.n_features);
    for count in &info.class_counts {
        println!("  {:<18} {}", muted(count.class.name()), count.count);
    }
    match info.outlier_fraction {
        Some(f) => println!("  {:<18} {:.6}", muted("Outlier fraction"), f),
        None => println!("  {:<18} {}", muted("Outlier fraction"), "undefined (no normal records)".red()),
    }

    for (class, summary) in &info.column_summaries {
        section(&format!("{} ({})", info.column, class));
        indent(&summary.to_string());
    }

    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_evaluate() {
        let cli = Cli::try_parse_from([
            "fraudbench",
            "evaluate",
            "--data",
            "creditcard.csv",
            "--sample-fraction",
            "0.1",
            "--seed",
            "1",
            "--json",
        ])
        .unwrap();

        match cli.command {
            Commands::Evaluate { data, sample_fraction, seed, json, parallel, .. } => {
                assert_eq!(data, PathBuf::from("creditcard.csv"));
                assert_eq!(sample_fraction, Some(0.1));
                assert_eq!(seed, Some(1));
                assert!(json);
                assert!(!parallel);
            }
            _ => panic!("expected evaluate"),
        }
    }

    #[test]
    fn test_parse_info_default_column() {
        let cli = Cli::try_parse_from(["fraudbench", "info", "-d", "x.csv"]).unwrap();
        match cli.command {
            Commands::Info { column, .. } => assert_eq!(column, "Amount"),
            _ => panic!("expected info"),
        }
    }

    #[test]
    fn test_resolve_config_overrides() {
        let config = resolve_config(None, Some(0.25), Some(9), Some(0.02), true).unwrap();
        assert_eq!(config.sample_fraction, 0.25);
        assert_eq!(config.random_seed, 9);
        assert_eq!(config.contamination_override, Some(0.02));
        assert!(config.parallel);

        assert!(resolve_config(None, Some(2.0), None, None, false).is_err());
    }
}
