//! Accuracy, error counts and per-class precision/recall/F1
//!
//! Undefined ratios (no predicted or no true members of a class) are
//! reported as `0.0`.

use crate::error::{FraudBenchError, Result};
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

fn check_lengths(y_true: ArrayView1<'_, i64>, y_pred: ArrayView1<'_, i64>) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(FraudBenchError::ShapeError {
            expected: format!("{} predictions", y_true.len()),
            actual: format!("{} predictions", y_pred.len()),
        });
    }
    if y_true.is_empty() {
        return Err(FraudBenchError::ValidationError(
            "cannot score an empty label vector".to_string(),
        ));
    }
    Ok(())
}

/// Number of positions where prediction and truth differ
pub fn count_errors(y_true: ArrayView1<'_, i64>, y_pred: ArrayView1<'_, i64>) -> Result<usize> {
    check_lengths(y_true, y_pred)?;
    Ok(y_true.iter().zip(y_pred.iter()).filter(|(t, p)| t != p).count())
}

/// Fraction of correct predictions
pub fn accuracy_score(y_true: ArrayView1<'_, i64>, y_pred: ArrayView1<'_, i64>) -> Result<f64> {
    let errors = count_errors(y_true, y_pred)?;
    Ok((y_true.len() - errors) as f64 / y_true.len() as f64)
}

/// Sorted union of the labels in both vectors
fn class_labels(y_true: ArrayView1<'_, i64>, y_pred: ArrayView1<'_, i64>) -> Vec<i64> {
    y_true
        .iter()
        .chain(y_pred.iter())
        .copied()
        .collect::<BTreeSet<i64>>()
        .into_iter()
        .collect()
}

/// Confusion matrix with rows as true classes and columns as predicted classes
///
/// Returns the class labels that index both axes.
pub fn confusion_matrix(
    y_true: ArrayView1<'_, i64>,
    y_pred: ArrayView1<'_, i64>,
) -> Result<(Vec<i64>, Array2<usize>)> {
    check_lengths(y_true, y_pred)?;
    let classes = class_labels(y_true, y_pred);
    let mut matrix = Array2::zeros((classes.len(), classes.len()));

    for (t, p) in y_true.iter().zip(y_pred.iter()) {
        // Both labels come from `classes`, so the searches succeed
        if let (Ok(i), Ok(j)) = (classes.binary_search(t), classes.binary_search(p)) {
            matrix[[i, j]] += 1;
        }
    }
    Ok((classes, matrix))
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

/// Metrics for one class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: i64,
    pub name: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Averaged precision, recall and F1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AverageMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class precision, recall, F1 and support, plus accuracy and averages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: AverageMetrics,
    pub weighted_avg: AverageMetrics,
}

impl ClassificationReport {
    /// Build a report. `target_names[k]` names label `k`; labels without a
    /// name are shown as their numeric value.
    pub fn new(
        y_true: ArrayView1<'_, i64>,
        y_pred: ArrayView1<'_, i64>,
        target_names: Option<&[&str]>,
    ) -> Result<Self> {
        let (labels, matrix) = confusion_matrix(y_true, y_pred)?;
        let total = y_true.len();

        let classes: Vec<ClassMetrics> = labels
            .iter()
            .enumerate()
            .map(|(k, &label)| {
                let tp = matrix[[k, k]];
                let predicted: usize = matrix.column(k).sum();
                let support: usize = matrix.row(k).sum();
                let precision = ratio(tp, predicted);
                let recall = ratio(tp, support);
                let name = target_names
                    .zip(usize::try_from(label).ok())
                    .and_then(|(names, idx)| names.get(idx))
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| label.to_string());

                ClassMetrics {
                    label,
                    name,
                    precision,
                    recall,
                    f1: f1(precision, recall),
                    support,
                }
            })
            .collect();

        let correct: usize = (0..labels.len()).map(|k| matrix[[k, k]]).sum();
        let n_classes = classes.len() as f64;

        let macro_avg = AverageMetrics {
            precision: classes.iter().map(|c| c.precision).sum::<f64>() / n_classes,
            recall: classes.iter().map(|c| c.recall).sum::<f64>() / n_classes,
            f1: classes.iter().map(|c| c.f1).sum::<f64>() / n_classes,
            support: total,
        };

        let weighted = |value: fn(&ClassMetrics) -> f64| -> f64 {
            classes
                .iter()
                .map(|c| value(c) * c.support as f64)
                .sum::<f64>()
                / total as f64
        };
        let weighted_avg = AverageMetrics {
            precision: weighted(|c| c.precision),
            recall: weighted(|c| c.recall),
            f1: weighted(|c| c.f1),
            support: total,
        };

        Ok(Self {
            accuracy: correct as f64 / total as f64,
            classes,
            macro_avg,
            weighted_avg,
        })
    }

    /// Metrics for a class label, if present
    pub fn class(&self, label: i64) -> Option<&ClassMetrics> {
        self.classes.iter().find(|c| c.label == label)
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .classes
            .iter()
            .map(|c| c.name.len())
            .chain(std::iter::once("weighted avg".len()))
            .max()
            .unwrap_or(12);

        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for c in &self.classes {
            writeln!(
                f,
                "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                c.name, c.precision, c.recall, c.f1, c.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        for (name, avg) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, avg.precision, avg.recall, avg.f1, avg.support
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_accuracy_and_errors() {
        let y_true = array![0, 0, 1, 1, 0];
        let y_pred = array![0, 1, 1, 0, 0];

        assert_eq!(count_errors(y_true.view(), y_pred.view()).unwrap(), 2);
        assert!((accuracy_score(y_true.view(), y_pred.view()).unwrap() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_length_mismatch() {
        let y_true = array![0, 1];
        let y_pred = array![0];
        assert!(matches!(
            count_errors(y_true.view(), y_pred.view()),
            Err(FraudBenchError::ShapeError { .. })
        ));
    }

    #[test]
    fn test_confusion_matrix() {
        let y_true = array![0, 0, 1, 1];
        let y_pred = array![0, 1, 1, 1];
        let (classes, m) = confusion_matrix(y_true.view(), y_pred.view()).unwrap();

        assert_eq!(classes, vec![0, 1]);
        assert_eq!(m, ndarray::arr2(&[[1, 1], [0, 2]]));
    }

    #[test]
    fn test_report_values() {
        let y_true = array![0, 0, 0, 0, 1, 1];
        let y_pred = array![0, 0, 0, 1, 1, 0];
        let report =
            ClassificationReport::new(y_true.view(), y_pred.view(), Some(&["Normal", "Fraud"]))
                .unwrap();

        let fraud = report.class(1).unwrap();
        assert_eq!(fraud.name, "Fraud");
        assert_eq!(fraud.support, 2);
        assert!((fraud.precision - 0.5).abs() < 1e-12);
        assert!((fraud.recall - 0.5).abs() < 1e-12);

        let normal = report.class(0).unwrap();
        assert!((normal.precision - 0.75).abs() < 1e-12);
        assert!((normal.recall - 0.75).abs() < 1e-12);

        assert!((report.macro_avg.f1 - 0.625).abs() < 1e-12);
        assert!((report.weighted_avg.recall - 4.0 / 6.0).abs() < 1e-12);
        assert!((report.accuracy - 4.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_division_is_zero() {
        // Nothing predicted as fraud
        let y_true = array![0, 0, 1];
        let y_pred = array![0, 0, 0];
        let report = ClassificationReport::new(y_true.view(), y_pred.view(), None).unwrap();

        let fraud = report.class(1).unwrap();
        assert_eq!(fraud.name, "1");
        assert_eq!(fraud.precision, 0.0);
        assert_eq!(fraud.recall, 0.0);
        assert_eq!(fraud.f1, 0.0);
    }

    #[test]
    fn test_report_display() {
        let y_true = array![0, 1];
        let y_pred = array![0, 1];
        let report =
            ClassificationReport::new(y_true.view(), y_pred.view(), Some(&["Normal", "Fraud"]))
                .unwrap();
        let text = report.to_string();

        assert!(text.contains("precision"));
        assert!(text.contains("Normal"));
        assert!(text.contains("weighted avg"));
        assert!(text.contains("1.00"));
    }
}
