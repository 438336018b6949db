//! Local Outlier Factor (LOF) anomaly detection

use crate::anomaly::{
    contamination_threshold, label_scores, validate_input, AnomalyDetector, DetectionProtocol,
};
use crate::error::{FraudBenchError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::warn;

/// Added to the mean reachability distance so duplicate points keep a finite density
const LRD_EPSILON: f64 = 1e-10;

/// Above this many rows the brute-force neighbor search gets slow (O(n²) distances)
pub const LARGE_INPUT_ROWS: usize = 50_000;

/// Whether fitting on `n_rows` rows warrants a slow-search warning
pub fn is_large_input(n_rows: usize) -> bool {
    n_rows > LARGE_INPUT_ROWS
}

/// Neighbor candidate ordered by distance
#[derive(Debug, Clone, Copy)]
struct Neighbor(f64, usize);

impl PartialEq for Neighbor {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Neighbor {}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap on distance: peek() is the current k-th nearest
        self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal)
    }
}

/// LOF details for a batch of points
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LOFResult {
    /// LOF scores for each point
    pub lof_scores: Array1<f64>,
    /// k-distances for each point
    pub k_distances: Array1<f64>,
    /// Local reachability densities
    pub lrd: Array1<f64>,
}

/// Local Outlier Factor anomaly detector
///
/// Driven through `fit_predict`: labels refer to the training rows, scored
/// with each row excluded from its own neighborhood.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalOutlierFactor {
    /// Number of neighbors
    n_neighbors: usize,
    /// Minkowski exponent (2 = Euclidean)
    p: f64,
    /// Contamination ratio
    contamination: f64,
    /// Training data
    x_train: Option<Array2<f64>>,
    /// k-distances of the training rows
    k_distances: Option<Array1<f64>>,
    /// LRD of the training rows
    lrd: Option<Array1<f64>>,
    /// LOF of the training rows
    training_lof: Option<Array1<f64>>,
    /// Decision threshold
    threshold: Option<f64>,
}

impl LocalOutlierFactor {
    /// Create new LOF detector
    pub fn new(n_neighbors: usize) -> Self {
        Self {
            n_neighbors: n_neighbors.max(1),
            p: 2.0,
            contamination: 0.1,
            x_train: None,
            k_distances: None,
            lrd: None,
            training_lof: None,
            threshold: None,
        }
    }

    /// Set contamination ratio
    pub fn with_contamination(mut self, c: f64) -> Self {
        self.contamination = c.clamp(0.0, 0.5);
        self
    }

    /// Set Minkowski exponent; must be at least 1
    pub fn with_p(mut self, p: f64) -> Result<Self> {
        if !(p >= 1.0 && p.is_finite()) {
            return Err(FraudBenchError::invalid_parameter(
                "p",
                p,
                "Minkowski exponent must be a finite number >= 1",
            ));
        }
        self.p = p;
        Ok(self)
    }

    pub fn n_neighbors(&self) -> usize {
        self.n_neighbors
    }

    pub fn contamination(&self) -> f64 {
        self.contamination
    }

    /// Opposite of the training LOF scores; lower means more anomalous
    pub fn negative_outlier_factor(&self) -> Option<Array1<f64>> {
        self.training_lof.as_ref().map(|lof| lof.mapv(|v| -v))
    }

    fn distance(&self, a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
        let pairs = a.iter().zip(b.iter());
        if self.p == 2.0 {
            pairs.map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt()
        } else if self.p == 1.0 {
            pairs.map(|(x, y)| (x - y).abs()).sum()
        } else {
            pairs
                .map(|(x, y)| (x - y).abs().powf(self.p))
                .sum::<f64>()
                .powf(1.0 / self.p)
        }
    }

    /// k nearest rows of `data` to `point`, nearest first
    fn k_nearest_neighbors(
        &self,
        point: ArrayView1<'_, f64>,
        data: &Array2<f64>,
        k: usize,
        exclude_self: Option<usize>,
    ) -> Vec<(usize, f64)> {
        let mut heap: BinaryHeap<Neighbor> = BinaryHeap::with_capacity(k + 1);

        for (i, row) in data.outer_iter().enumerate() {
            if Some(i) == exclude_self {
                continue;
            }

            let dist = self.distance(point, row);

            if heap.len() < k {
                heap.push(Neighbor(dist, i));
            } else if let Some(&Neighbor(max_dist, _)) = heap.peek() {
                if dist < max_dist {
                    heap.pop();
                    heap.push(Neighbor(dist, i));
                }
            }
        }

        heap.into_sorted_vec()
            .into_iter()
            .map(|Neighbor(d, i)| (i, d))
            .collect()
    }

    /// Distance to the k-th nearest neighbor
    fn k_distance(neighbors: &[(usize, f64)]) -> f64 {
        neighbors.iter().map(|(_, d)| *d).fold(0.0, f64::max)
    }

    /// Local reachability density: inverse mean reachability distance
    fn compute_lrd(neighbors: &[(usize, f64)], k_distances: &Array1<f64>) -> f64 {
        if neighbors.is_empty() {
            return 0.0;
        }

        let sum_reach_dist: f64 = neighbors
            .iter()
            .map(|&(idx, dist)| k_distances[idx].max(dist))
            .sum();

        1.0 / (sum_reach_dist / neighbors.len() as f64 + LRD_EPSILON)
    }

    /// Mean ratio of neighbor densities to the point's density
    fn compute_lof_single(lrd_point: f64, neighbors: &[(usize, f64)], lrd_values: &Array1<f64>) -> f64 {
        if neighbors.is_empty() || lrd_point == 0.0 {
            return 1.0;
        }

        let sum_lrd_ratio: f64 = neighbors
            .iter()
            .map(|&(idx, _)| lrd_values[idx] / lrd_point)
            .sum();

        sum_lrd_ratio / neighbors.len() as f64
    }

    fn effective_k(&self, n_train: usize) -> usize {
        self.n_neighbors.min(n_train.saturating_sub(1)).max(1)
    }

    /// LOF details for new points scored against the training set
    pub fn compute_lof_details(&self, x: &Array2<f64>) -> Result<LOFResult> {
        let (x_train, train_k_distances, train_lrd) =
            match (&self.x_train, &self.k_distances, &self.lrd) {
                (Some(x_train), Some(k), Some(lrd)) => (x_train, k, lrd),
                _ => return Err(FraudBenchError::ModelNotFitted),
            };

        if x.ncols() != x_train.ncols() {
            return Err(FraudBenchError::ShapeError {
                expected: format!("{} features", x_train.ncols()),
                actual: format!("{} features", x.ncols()),
            });
        }

        let k = self.effective_k(x_train.nrows());

        let per_point: Vec<(f64, f64, f64)> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let neighbors = self.k_nearest_neighbors(x.row(i), x_train, k, None);
                let k_dist = Self::k_distance(&neighbors);
                let lrd = Self::compute_lrd(&neighbors, train_k_distances);
                let lof = Self::compute_lof_single(lrd, &neighbors, train_lrd);
                (lof, k_dist, lrd)
            })
            .collect();

        Ok(LOFResult {
            lof_scores: per_point.iter().map(|t| t.0).collect(),
            k_distances: per_point.iter().map(|t| t.1).collect(),
            lrd: per_point.iter().map(|t| t.2).collect(),
        })
    }
}

impl Default for LocalOutlierFactor {
    fn default() -> Self {
        Self::new(20)
    }
}

impl AnomalyDetector for LocalOutlierFactor {
    fn protocol(&self) -> DetectionProtocol {
        DetectionProtocol::Combined
    }

    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        validate_input(x, 2)?;

        let n = x.nrows();
        let k = self.effective_k(n);
        if is_large_input(n) {
            warn!(
                rows = n,
                limit = LARGE_INPUT_ROWS,
                "LOF neighbor search is quadratic in the row count; consider a smaller sample_fraction"
            );
        }

        let all_neighbors: Vec<Vec<(usize, f64)>> = (0..n)
            .into_par_iter()
            .map(|i| self.k_nearest_neighbors(x.row(i), x, k, Some(i)))
            .collect();

        let k_distances: Array1<f64> = all_neighbors.iter().map(|nb| Self::k_distance(nb)).collect();

        let lrd: Array1<f64> = all_neighbors
            .iter()
            .map(|nb| Self::compute_lrd(nb, &k_distances))
            .collect();

        let lof_scores: Array1<f64> = all_neighbors
            .iter()
            .enumerate()
            .map(|(i, nb)| Self::compute_lof_single(lrd[i], nb, &lrd))
            .collect();

        if lof_scores.iter().any(|v| !v.is_finite()) {
            return Err(FraudBenchError::ComputationError(
                "non-finite local outlier factor".to_string(),
            ));
        }

        self.threshold = Some(contamination_threshold(&lof_scores.to_vec(), self.contamination));
        self.x_train = Some(x.clone());
        self.k_distances = Some(k_distances);
        self.lrd = Some(lrd);
        self.training_lof = Some(lof_scores);

        Ok(())
    }

    fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.compute_lof_details(x)?.lof_scores)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<i32>> {
        let threshold = self.threshold.ok_or(FraudBenchError::ModelNotFitted)?;
        let scores = self.score_samples(x)?;
        Ok(label_scores(&scores, threshold))
    }

    /// Labels the training rows from their leave-self-out scores
    fn fit_predict(&mut self, x: &Array2<f64>) -> Result<Array1<i32>> {
        self.fit(x)?;
        match (&self.training_lof, self.threshold) {
            (Some(lof), Some(threshold)) => Ok(label_scores(lof, threshold)),
            _ => Err(FraudBenchError::ModelNotFitted),
        }
    }

    fn training_scores(&self) -> Option<Array1<f64>> {
        self.negative_outlier_factor()
    }

    fn threshold(&self) -> f64 {
        self.threshold.unwrap_or(1.5)
    }
}
