//! Plain-text rendering of evaluation outcomes

use crate::evaluation::{DetectorOutcome, EvaluationReport, OutcomeStatus};

/// Render one outcome.
///
/// ```text
/// Isolation Forest: 71
/// Accuracy Score :
/// 0.9975
/// Classification Report :
/// ...
/// ```
pub fn render_outcome(outcome: &DetectorOutcome) -> String {
    let mut out = String::new();
    match &outcome.status {
        OutcomeStatus::Evaluated(eval) => {
            out.push_str(&format!("{}: {}\n", outcome.name, eval.errors));
            out.push_str("Accuracy Score :\n");
            out.push_str(&format!("{}\n", eval.accuracy));
            out.push_str("Classification Report :\n");
            out.push_str(&eval.report.to_string());
        }
        OutcomeStatus::Failed { reason } => {
            out.push_str(&format!("{}: FAILED\n", outcome.name));
            out.push_str(&format!("Reason : {}\n", reason));
        }
    }
    out
}

/// Render every outcome in order, separated by blank lines
pub fn render_report(report: &EvaluationReport) -> String {
    report
        .outcomes
        .iter()
        .map(render_outcome)
        .collect::<Vec<_>>()
        .join("\n")
}
