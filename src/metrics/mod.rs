//! Classification metrics for scoring normalized detector output against
//! ground-truth labels.

pub mod classification;

pub use classification::{
    accuracy_score, confusion_matrix, count_errors, AverageMetrics, ClassMetrics,
    ClassificationReport,
};
