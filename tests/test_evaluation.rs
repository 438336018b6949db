//! Integration test: evaluation harness with built-in and user detectors

use fraudbench::anomaly::{
    AnomalyDetector, DetectionProtocol, IsolationForest, LocalOutlierFactor, NativeEncoding,
};
use fraudbench::dataset::Dataset;
use fraudbench::evaluation::{EvaluationHarness, OutcomeStatus};
use fraudbench::Result;
use ndarray::{Array1, Array2};

/// 40 points on a small grid plus 4 far-away fraud rows
fn grid_dataset() -> Dataset {
    let mut data = Vec::new();
    let mut labels = Vec::new();
    for i in 0..40 {
        data.push((i % 8) as f64 * 0.5);
        data.push((i / 8) as f64 * 0.5);
        labels.push(0);
    }
    for (x, y) in [(20.0, 20.0), (-20.0, 15.0), (25.0, -18.0), (-22.0, -22.0)] {
        data.push(x);
        data.push(y);
        labels.push(1);
    }
    Dataset::new(
        vec!["V1".to_string(), "V2".to_string()],
        "Class",
        Array2::from_shape_vec((44, 2), data).unwrap(),
        Array1::from_vec(labels),
    )
    .unwrap()
}

/// Flags everything beyond a fixed distance from the origin, encoded as 0/1
struct RadiusRule {
    radius: f64,
}

impl AnomalyDetector for RadiusRule {
    fn encoding(&self) -> NativeEncoding {
        NativeEncoding { inlier: 0, outlier: 1 }
    }

    fn fit(&mut self, _x: &Array2<f64>) -> Result<()> {
        Ok(())
    }

    fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(x.rows().into_iter().map(|r| r.dot(&r).sqrt()).collect())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<i32>> {
        Ok(self.score_samples(x)?.mapv(|d| if d > self.radius { 1 } else { 0 }))
    }

    fn threshold(&self) -> f64 {
        self.radius
    }
}

/// Returns one label too few
struct ShortPredictions;

impl AnomalyDetector for ShortPredictions {
    fn protocol(&self) -> DetectionProtocol {
        DetectionProtocol::Combined
    }

    fn fit(&mut self, _x: &Array2<f64>) -> Result<()> {
        Ok(())
    }

    fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(Array1::zeros(x.nrows()))
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<i32>> {
        Ok(Array1::ones(x.nrows().saturating_sub(1)))
    }

    fn threshold(&self) -> f64 {
        0.0
    }
}

#[test]
fn test_builtin_detectors_find_far_points() {
    let ds = grid_dataset();
    let fraction = 4.0 / 40.0;

    let mut harness = EvaluationHarness::new(fraction);
    harness
        .register(
            "Isolation Forest",
            Box::new(
                IsolationForest::new()
                    .with_n_estimators(100)
                    .with_contamination(fraction)
                    .with_seed(42),
            ),
        )
        .unwrap()
        .register(
            "Local Outlier Factor",
            Box::new(LocalOutlierFactor::new(10).with_contamination(fraction)),
        )
        .unwrap();

    let report = harness.evaluate_dataset(&ds).unwrap();
    assert_eq!(report.n_failed(), 0);

    let lof = report.outcome("Local Outlier Factor").unwrap().evaluation().unwrap();
    // Combined protocol exposes the negative outlier factor
    assert_eq!(lof.scores.as_ref().map(|s| s.len()), Some(44));
    assert_eq!(lof.report.class(1).unwrap().recall, 1.0);

    let forest = report.outcome("Isolation Forest").unwrap().evaluation().unwrap();
    assert!(forest.report.class(1).unwrap().recall >= 0.75);
}

#[test]
fn test_custom_encoding_is_normalized() {
    let ds = grid_dataset();
    let mut harness = EvaluationHarness::new(0.1);
    harness.register("radius", Box::new(RadiusRule { radius: 10.0 })).unwrap();

    let report = harness.evaluate_dataset(&ds).unwrap();
    let eval = report.outcomes[0].evaluation().unwrap();

    assert_eq!(eval.errors, 0);
    assert_eq!(eval.accuracy, 1.0);
    assert_eq!(eval.raw.encoding().outlier, 1);
    assert_eq!(eval.predictions.n_outliers(), 4);
}

#[test]
fn test_wrong_length_is_isolated_failure() {
    let ds = grid_dataset();
    let mut harness = EvaluationHarness::new(0.1);
    harness
        .register("short", Box::new(ShortPredictions))
        .unwrap()
        .register("radius", Box::new(RadiusRule { radius: 10.0 }))
        .unwrap();

    let report = harness.evaluate_dataset(&ds).unwrap();
    assert!(matches!(report.outcomes[0].status, OutcomeStatus::Failed { .. }));
    assert!(report.outcomes[0].error().unwrap().is_recoverable());
    assert!(report.outcomes[1].is_success());
}
