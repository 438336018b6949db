//! One-Class Support Vector Machine
//!
//! ν-formulation (Schölkopf et al.) solved with SMO: minimise `½ αᵀKα`
//! subject to `0 ≤ αᵢ ≤ 1` and `Σ αᵢ = ν·n`. The decision function is
//! `f(x) = Σ αᵢ K(xᵢ, x) − ρ`; `f(x) ≥ 0` marks an inlier.

use crate::anomaly::{label_scores, validate_input, AnomalyDetector};
use crate::error::{FraudBenchError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Largest training set for which the full kernel matrix is precomputed.
/// Beyond this, kernel columns are computed on demand.
const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// Kernel columns kept in memory when computing on demand
const COLUMN_CACHE_ENTRIES: usize = 256;

/// Alphas below this are not support vectors
const SUPPORT_EPSILON: f64 = 1e-8;

/// Kernel function type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KernelType {
    /// Linear kernel: K(x, y) = x · y
    Linear,
    /// Polynomial kernel: K(x, y) = (γ * x · y + r)^d
    Polynomial { degree: usize, gamma: f64, coef0: f64 },
    /// Radial Basis Function (Gaussian): K(x, y) = exp(-γ * ||x - y||²)
    #[serde(rename = "rbf")]
    RBF { gamma: f64 },
    /// Sigmoid kernel: K(x, y) = tanh(γ * x · y + r)
    Sigmoid { gamma: f64, coef0: f64 },
}

impl Default for KernelType {
    fn default() -> Self {
        KernelType::RBF { gamma: 0.1 }
    }
}

impl KernelType {
    /// Evaluate the kernel on two vectors
    pub fn compute(&self, a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
        match self {
            KernelType::Linear => a.dot(&b),
            KernelType::Polynomial { degree, gamma, coef0 } => {
                (*gamma * a.dot(&b) + coef0).powi((*degree).min(i32::MAX as usize) as i32)
            }
            KernelType::RBF { gamma } => {
                let norm_sq: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum();
                (-gamma * norm_sq).exp()
            }
            KernelType::Sigmoid { gamma, coef0 } => (*gamma * a.dot(&b) + coef0).tanh(),
        }
    }

    fn validate(&self) -> Result<()> {
        let gamma = match self {
            KernelType::Linear => return Ok(()),
            KernelType::Polynomial { gamma, .. }
            | KernelType::RBF { gamma }
            | KernelType::Sigmoid { gamma, .. } => *gamma,
        };
        if !(gamma > 0.0 && gamma.is_finite()) {
            return Err(FraudBenchError::invalid_parameter("gamma", gamma, "must be positive"));
        }
        Ok(())
    }
}

/// One-Class SVM configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneClassSvmConfig {
    /// Kernel function
    pub kernel: KernelType,
    /// Upper bound on the training outlier fraction, lower bound on the support-vector fraction
    pub nu: f64,
    /// Tolerance for stopping criterion
    pub tol: f64,
    /// Maximum SMO iterations; `None` runs until convergence
    pub max_iter: Option<usize>,
}

impl Default for OneClassSvmConfig {
    fn default() -> Self {
        Self {
            kernel: KernelType::RBF { gamma: 0.1 },
            nu: 0.05,
            tol: 1e-3,
            max_iter: None,
        }
    }
}

impl OneClassSvmConfig {
    /// Check `nu`, `tol` and the kernel parameters
    pub fn validate(&self) -> Result<()> {
        if !(self.nu > 0.0 && self.nu <= 1.0) {
            return Err(FraudBenchError::invalid_parameter("nu", self.nu, "must be in (0, 1]"));
        }
        if !(self.tol > 0.0) {
            return Err(FraudBenchError::invalid_parameter("tol", self.tol, "must be positive"));
        }
        self.kernel.validate()
    }
}

/// Kernel values over the training set, dense or computed column by column
struct KernelMatrix<'a> {
    x: &'a Array2<f64>,
    kernel: &'a KernelType,
    dense: Option<Array2<f64>>,
    diag: Array1<f64>,
    cache: HashMap<usize, Array1<f64>>,
}

impl<'a> KernelMatrix<'a> {
    fn new(x: &'a Array2<f64>, kernel: &'a KernelType, dense_limit: usize) -> Self {
        let n = x.nrows();
        let diag: Array1<f64> = (0..n).map(|i| kernel.compute(x.row(i), x.row(i))).collect();

        let dense = if n <= dense_limit {
            // Upper triangle rows in parallel, mirrored afterwards
            let rows: Vec<Vec<f64>> = (0..n)
                .into_par_iter()
                .map(|i| (i..n).map(|j| kernel.compute(x.row(i), x.row(j))).collect())
                .collect();

            let mut k = Array2::zeros((n, n));
            for (i, row) in rows.into_iter().enumerate() {
                for (offset, val) in row.into_iter().enumerate() {
                    let j = i + offset;
                    k[[i, j]] = val;
                    k[[j, i]] = val;
                }
            }
            Some(k)
        } else {
            None
        };

        Self {
            x,
            kernel,
            dense,
            diag,
            cache: HashMap::new(),
        }
    }

    fn is_dense(&self) -> bool {
        self.dense.is_some()
    }

    fn diag(&self, i: usize) -> f64 {
        self.diag[i]
    }

    /// K(x_t, x_i) for every training row t
    fn column(&mut self, i: usize) -> Array1<f64> {
        if let Some(k) = &self.dense {
            return k.column(i).to_owned();
        }
        if let Some(col) = self.cache.get(&i) {
            return col.clone();
        }

        let (x, kernel) = (self.x, self.kernel);
        let col: Array1<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|t| kernel.compute(x.row(t), x.row(i)))
            .collect::<Vec<f64>>()
            .into();

        if self.cache.len() >= COLUMN_CACHE_ENTRIES {
            self.cache.clear();
        }
        self.cache.insert(i, col.clone());
        col
    }
}

/// One-Class SVM anomaly detector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneClassSvm {
    config: OneClassSvmConfig,
    /// Support vectors
    support_vectors: Option<Array2<f64>>,
    /// Dual coefficients of the support vectors
    dual_coef: Option<Array1<f64>>,
    /// Offset ρ
    rho: f64,
    /// SMO iterations used by the last fit
    n_iter: usize,
    #[serde(skip)]
    dense_limit: Option<usize>,
}

impl OneClassSvm {
    /// Create a new One-Class SVM
    pub fn new(config: OneClassSvmConfig) -> Self {
        Self {
            config,
            support_vectors: None,
            dual_coef: None,
            rho: 0.0,
            n_iter: 0,
            dense_limit: None,
        }
    }

    pub fn config(&self) -> &OneClassSvmConfig {
        &self.config
    }

    /// Get number of support vectors
    pub fn n_support_vectors(&self) -> usize {
        self.support_vectors.as_ref().map(|sv| sv.nrows()).unwrap_or(0)
    }

    /// Dual coefficients of the support vectors
    pub fn dual_coef(&self) -> Option<&Array1<f64>> {
        self.dual_coef.as_ref()
    }

    /// Offset ρ of the decision function
    pub fn rho(&self) -> f64 {
        self.rho
    }

    /// SMO iterations used by the last fit
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    #[cfg(test)]
    fn with_dense_limit(mut self, limit: usize) -> Self {
        self.dense_limit = Some(limit);
        self
    }

    /// SMO with maximal-violating-pair selection; returns (alphas, rho, iterations)
    fn smo_train(&self, x: &Array2<f64>) -> Result<(Array1<f64>, f64, usize)> {
        let n = x.nrows();
        let c = 1.0;
        let total = self.config.nu * n as f64;

        let mut kernel = KernelMatrix::new(
            x,
            &self.config.kernel,
            self.dense_limit.unwrap_or(MAX_KERNEL_MATRIX_SAMPLES),
        );
        debug!(samples = n, dense = kernel.is_dense(), "One-class SVM kernel ready");

        // Feasible start: the first floor(ν·n) alphas at the bound, the remainder on the next
        let mut alphas = Array1::<f64>::zeros(n);
        let n_full = (total.floor() as usize).min(n);
        for a in alphas.iter_mut().take(n_full) {
            *a = c;
        }
        if n_full < n {
            alphas[n_full] = total - n_full as f64;
        }

        // Gradient of ½ αᵀKα is Kα
        let mut grad = Array1::<f64>::zeros(n);
        for t in 0..n {
            if alphas[t] > 0.0 {
                let col = kernel.column(t);
                grad.scaled_add(alphas[t], &col);
            }
        }

        let mut iter = 0;
        loop {
            // i: lowest gradient that can still grow, j: highest that can still shrink
            let mut i = None;
            let mut j = None;
            for t in 0..n {
                if alphas[t] < c && i.map_or(true, |i: usize| grad[t] < grad[i]) {
                    i = Some(t);
                }
                if alphas[t] > 0.0 && j.map_or(true, |j: usize| grad[t] > grad[j]) {
                    j = Some(t);
                }
            }
            let (i, j) = match (i, j) {
                (Some(i), Some(j)) => (i, j),
                _ => break,
            };

            if grad[j] - grad[i] < self.config.tol {
                break;
            }

            if let Some(max_iter) = self.config.max_iter {
                if iter >= max_iter {
                    warn!(max_iter, "One-class SVM stopped before convergence");
                    break;
                }
            }

            let col_i = kernel.column(i);
            let col_j = kernel.column(j);

            let mut eta = kernel.diag(i) + kernel.diag(j) - 2.0 * col_i[j];
            if eta <= 0.0 {
                eta = 1e-12;
            }

            let delta = ((grad[j] - grad[i]) / eta).min(c - alphas[i]).min(alphas[j]);
            alphas[i] += delta;
            alphas[j] -= delta;

            grad.scaled_add(delta, &col_i);
            grad.scaled_add(-delta, &col_j);

            iter += 1;
        }

        if grad.iter().any(|g| !g.is_finite()) {
            return Err(FraudBenchError::ComputationError(
                "one-class SVM gradient diverged".to_string(),
            ));
        }

        let rho = Self::compute_rho(&alphas, &grad, c);
        Ok((alphas, rho, iter))
    }

    /// ρ from the KKT conditions: mean gradient over free alphas, or the
    /// midpoint of the feasible interval when every alpha sits at a bound
    fn compute_rho(alphas: &Array1<f64>, grad: &Array1<f64>, c: f64) -> f64 {
        let mut free_sum = 0.0;
        let mut n_free = 0usize;
        let mut upper = f64::INFINITY;
        let mut lower = f64::NEG_INFINITY;

        for (&a, &g) in alphas.iter().zip(grad.iter()) {
            if a >= c {
                lower = lower.max(g);
            } else if a <= 0.0 {
                upper = upper.min(g);
            } else {
                free_sum += g;
                n_free += 1;
            }
        }

        if n_free > 0 {
            free_sum / n_free as f64
        } else if upper.is_finite() && lower.is_finite() {
            (upper + lower) / 2.0
        } else if upper.is_finite() {
            upper
        } else {
            lower
        }
    }

    fn fitted(&self) -> Result<(&Array2<f64>, &Array1<f64>)> {
        match (&self.support_vectors, &self.dual_coef) {
            (Some(sv), Some(coef)) => Ok((sv, coef)),
            _ => Err(FraudBenchError::ModelNotFitted),
        }
    }
}

impl Default for OneClassSvm {
    fn default() -> Self {
        Self::new(OneClassSvmConfig::default())
    }
}

impl AnomalyDetector for OneClassSvm {
    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        self.config.validate()?;
        validate_input(x, 1)?;

        let (alphas, rho, n_iter) = self.smo_train(x)?;

        let support: Vec<usize> = alphas
            .iter()
            .enumerate()
            .filter(|(_, &a)| a > SUPPORT_EPSILON)
            .map(|(i, _)| i)
            .collect();

        let mut support_vectors = Array2::zeros((support.len(), x.ncols()));
        let mut dual_coef = Array1::zeros(support.len());
        for (row, &idx) in support.iter().enumerate() {
            support_vectors.row_mut(row).assign(&x.row(idx));
            dual_coef[row] = alphas[idx];
        }

        debug!(
            support_vectors = support.len(),
            rho,
            iterations = n_iter,
            "One-class SVM fitted"
        );

        self.support_vectors = Some(support_vectors);
        self.dual_coef = Some(dual_coef);
        self.rho = rho;
        self.n_iter = n_iter;
        Ok(())
    }

    /// `ρ − Σ αᵢ K(xᵢ, x)`; positive values are outliers
    fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(|f| -f))
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<i32>> {
        let scores = self.score_samples(x)?;
        Ok(label_scores(&scores, self.threshold()))
    }

    fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (sv, coef) = self.fitted()?;
        if x.ncols() != sv.ncols() {
            return Err(FraudBenchError::ShapeError {
                expected: format!("{} features", sv.ncols()),
                actual: format!("{} features", x.ncols()),
            });
        }

        let kernel = &self.config.kernel;
        let values: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let sample = x.row(i);
                let sum: f64 = sv
                    .outer_iter()
                    .zip(coef.iter())
                    .map(|(sv_row, &a)| a * kernel.compute(sv_row, sample))
                    .sum();
                sum - self.rho
            })
            .collect();

        Ok(Array1::from_vec(values))
    }

    fn threshold(&self) -> f64 {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tight_cluster_with_outlier() -> Array2<f64> {
        let mut data = Vec::new();
        for i in 0..20 {
            data.push((i % 5) as f64 * 0.1);
            data.push((i / 5) as f64 * 0.1);
        }
        data.extend_from_slice(&[8.0, 8.0]);
        Array2::from_shape_vec((21, 2), data).unwrap()
    }

    fn config(nu: f64) -> OneClassSvmConfig {
        OneClassSvmConfig {
            kernel: KernelType::RBF { gamma: 0.5 },
            nu,
            ..Default::default()
        }
    }

    #[test]
    fn test_outlier_gets_lowest_decision() {
        let x = tight_cluster_with_outlier();
        let mut svm = OneClassSvm::new(config(0.2));
        svm.fit(&x).unwrap();

        let decision = svm.decision_function(&x).unwrap();
        let labels = svm.predict(&x).unwrap();

        let argmin = decision
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(argmin, 20);
        assert_eq!(labels[20], -1);
        assert!(labels.iter().take(20).filter(|&&l| l == 1).count() >= 10);
    }

    #[test]
    fn test_dual_coefficients_sum_to_nu_n() {
        let x = tight_cluster_with_outlier();
        let mut svm = OneClassSvm::new(config(0.2));
        svm.fit(&x).unwrap();

        let total: f64 = svm.dual_coef().unwrap().sum();
        assert!((total - 0.2 * 21.0).abs() < 1e-6);
        assert!(svm.n_support_vectors() >= 5);
        assert!(svm.dual_coef().unwrap().iter().all(|&a| a <= 1.0 + 1e-12));
    }

    #[test]
    fn test_on_demand_kernel_matches_dense() {
        let x = tight_cluster_with_outlier();
        let mut dense = OneClassSvm::new(config(0.2));
        let mut lazy = OneClassSvm::new(config(0.2)).with_dense_limit(0);
        dense.fit(&x).unwrap();
        lazy.fit(&x).unwrap();

        let a = dense.decision_function(&x).unwrap();
        let b = lazy.decision_function(&x).unwrap();
        for (u, v) in a.iter().zip(b.iter()) {
            assert!((u - v).abs() < 1e-9);
        }
    }

    #[test]
    fn test_score_sign_matches_labels() {
        let x = tight_cluster_with_outlier();
        let mut svm = OneClassSvm::new(config(0.3));
        svm.fit(&x).unwrap();

        let scores = svm.score_samples(&x).unwrap();
        let labels = svm.predict(&x).unwrap();
        for (s, l) in scores.iter().zip(labels.iter()) {
            assert_eq!(*s > 0.0, *l == -1);
        }
    }

    #[test]
    fn test_invalid_parameters() {
        let x = tight_cluster_with_outlier();

        let mut svm = OneClassSvm::new(config(0.0));
        assert!(matches!(svm.fit(&x), Err(FraudBenchError::InvalidParameter { .. })));

        let mut svm = OneClassSvm::new(OneClassSvmConfig {
            kernel: KernelType::RBF { gamma: -1.0 },
            ..Default::default()
        });
        assert!(svm.fit(&x).is_err());
    }

    #[test]
    fn test_predict_before_fit() {
        let svm = OneClassSvm::default();
        let x = Array2::zeros((2, 2));
        assert!(matches!(svm.predict(&x), Err(FraudBenchError::ModelNotFitted)));
    }

    #[test]
    fn test_kernels() {
        let a = Array1::from_vec(vec![1.0, 2.0]);
        let b = Array1::from_vec(vec![3.0, 4.0]);

        assert_eq!(KernelType::Linear.compute(a.view(), b.view()), 11.0);
        let rbf = KernelType::RBF { gamma: 0.5 }.compute(a.view(), b.view());
        assert!((rbf - (-4.0f64).exp()).abs() < 1e-12);
        let poly = KernelType::Polynomial { degree: 2, gamma: 1.0, coef0: 1.0 };
        assert_eq!(poly.compute(a.view(), b.view()), 144.0);
    }
}
