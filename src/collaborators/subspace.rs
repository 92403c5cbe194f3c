//! Subspace separation — signal/noise split of sample covariances.
//!
//! Purpose
//! -------
//! Define the [`SubspaceSeparator`] seam and a reference [`EigenSeparator`]
//! built on a Hermitian eigen-decomposition.
//!
//! Key behaviors
//! -------------
//! - Eigenvalues are sorted in decreasing order; the leading `M` eigenvectors
//!   span the signal subspace and the remaining `N - M` the noise subspace.
//! - Source-count estimation per [`ModelOrder`]: pass-through, a threshold on
//!   eigenvalues normalized by the largest one, or the AIC / MDL information
//!   criteria of Wax and Kailath.
//! - Eigen-regularization term `(λ̃_{M-1} - t)(λ̃_M - t)` on normalized
//!   eigenvalues, negative when the threshold separates signal from noise.
//!
//! Invariants & assumptions
//! ------------------------
//! - Covariances are `batch × N × N`; they are Hermitian-symmetrized before
//!   decomposition.
//! - `1 <= M < N`.
//!
//! Conventions
//! -----------
//! - Failures are reported as `anyhow::Error`, matching the collaborator seam.
use crate::estimation::errors::{MusicError, MusicResult};
use nalgebra::DMatrix;
use ndarray::{Array1, Array2, Array3, ArrayView2, ArrayView3, Axis};
use num_complex::Complex64;

/// Default threshold on normalized eigenvalues.
pub const DEFAULT_EIGEN_THRESHOLD: f64 = 0.05;

/// Output of a subspace separation.
///
/// Fields
/// ------
/// - `signal_subspace`: `batch × N × M`.
/// - `noise_subspace`: `batch × N × (N - M)`.
/// - `source_estimation`: per-item source-count estimate, when available.
/// - `eigen_regularization`: per-item regularization term, when available.
#[derive(Debug, Clone, PartialEq)]
pub struct Separation {
    pub signal_subspace: Array3<Complex64>,
    pub noise_subspace: Array3<Complex64>,
    pub source_estimation: Option<Array1<usize>>,
    pub eigen_regularization: Option<Array1<f64>>,
}

/// Subspace-separation collaborator consumed by the estimator.
pub trait SubspaceSeparator {
    fn separate(
        &self, covariance: ArrayView3<'_, Complex64>, number_of_sources: usize,
    ) -> anyhow::Result<Separation>;
}

/// How the separator estimates the number of sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelOrder {
    /// Report the requested number of sources.
    Given,
    /// Count normalized eigenvalues above the separator threshold.
    #[default]
    Threshold,
    /// Akaike information criterion over `snapshots` samples.
    Aic { snapshots: usize },
    /// Minimum description length over `snapshots` samples.
    Mdl { snapshots: usize },
}

/// EigenSeparator — Hermitian eigen-decomposition separator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EigenSeparator {
    order: ModelOrder,
    threshold: f64,
}

impl EigenSeparator {
    /// Errors
    /// ------
    /// - `MusicError::InvalidEigenThreshold` when `threshold` is non-finite or
    ///   outside `(0, 1)`.
    pub fn new(order: ModelOrder, threshold: f64) -> MusicResult<Self> {
        if !threshold.is_finite() || threshold <= 0.0 || threshold >= 1.0 {
            return Err(MusicError::InvalidEigenThreshold { value: threshold });
        }
        Ok(EigenSeparator { order, threshold })
    }

    pub fn order(&self) -> ModelOrder {
        self.order
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    fn estimate_sources(&self, eigenvalues: &[f64], number_of_sources: usize) -> usize {
        let n = eigenvalues.len();
        match self.order {
            ModelOrder::Given => number_of_sources,
            ModelOrder::Threshold => {
                let max = eigenvalues[0];
                let count = eigenvalues.iter().filter(|&&l| l / max > self.threshold).count();
                count.clamp(1, n - 1)
            }
            ModelOrder::Aic { snapshots } => aic_source_count(eigenvalues, snapshots),
            ModelOrder::Mdl { snapshots } => mdl_source_count(eigenvalues, snapshots),
        }
    }
}

impl Default for EigenSeparator {
    fn default() -> Self {
        EigenSeparator { order: ModelOrder::default(), threshold: DEFAULT_EIGEN_THRESHOLD }
    }
}

impl SubspaceSeparator for EigenSeparator {
    fn separate(
        &self, covariance: ArrayView3<'_, Complex64>, number_of_sources: usize,
    ) -> anyhow::Result<Separation> {
        let (batch, rows, cols) = covariance.dim();
        anyhow::ensure!(rows == cols, "covariance must be square, got {rows} x {cols}");
        anyhow::ensure!(
            number_of_sources >= 1 && number_of_sources < rows,
            "number of sources must satisfy 1 <= M < N (M = {number_of_sources}, N = {rows})"
        );
        let m = number_of_sources;
        let mut signal = Array3::<Complex64>::zeros((batch, rows, m));
        let mut noise = Array3::<Complex64>::zeros((batch, rows, rows - m));
        let mut estimates = Array1::<usize>::zeros(batch);
        let mut regularization = Array1::<f64>::zeros(batch);

        for (b, cov) in covariance.outer_iter().enumerate() {
            let (eigenvalues, eigenvectors) = hermitian_eigen(cov);
            anyhow::ensure!(
                eigenvalues.iter().all(|l| l.is_finite()) && eigenvalues[0] > 0.0,
                "covariance of batch item {b} has no positive finite spectrum"
            );
            signal.index_axis_mut(Axis(0), b).assign(&eigenvectors.slice(ndarray::s![.., ..m]));
            noise.index_axis_mut(Axis(0), b).assign(&eigenvectors.slice(ndarray::s![.., m..]));
            estimates[b] = self.estimate_sources(&eigenvalues, m);
            let max = eigenvalues[0];
            regularization[b] =
                (eigenvalues[m - 1] / max - self.threshold) * (eigenvalues[m] / max - self.threshold);
        }

        Ok(Separation {
            signal_subspace: signal,
            noise_subspace: noise,
            source_estimation: Some(estimates),
            eigen_regularization: Some(regularization),
        })
    }
}

/// Eigenvalues (decreasing) and matching eigenvector columns of a Hermitian
/// matrix. The input is symmetrized as `(R + Rᴴ) / 2` first.
pub fn hermitian_eigen(cov: ArrayView2<'_, Complex64>) -> (Vec<f64>, Array2<Complex64>) {
    let n = cov.nrows();
    let hermitian = DMatrix::<Complex64>::from_fn(n, n, |i, j| (cov[[i, j]] + cov[[j, i]].conj()) * 0.5);
    let eig = hermitian.symmetric_eigen();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| eig.eigenvalues[b].total_cmp(&eig.eigenvalues[a]));
    let values = order.iter().map(|&i| eig.eigenvalues[i]).collect();
    let vectors = Array2::from_shape_fn((n, n), |(row, col)| eig.eigenvectors[(row, order[col])]);
    (values, vectors)
}

/// Log of the arithmetic-to-geometric mean ratio of `values`, or `None` when a
/// value is non-positive.
fn log_sphericity(values: &[f64]) -> Option<f64> {
    if values.is_empty() || values.iter().any(|&l| l <= 0.0) {
        return None;
    }
    let len = values.len() as f64;
    let arithmetic = values.iter().sum::<f64>() / len;
    let log_geometric = values.iter().map(|l| l.ln()).sum::<f64>() / len;
    Some(arithmetic.ln() - log_geometric)
}

fn information_criterion<P: Fn(usize, usize) -> f64>(
    eigenvalues: &[f64], snapshots: usize, scale: f64, penalty: P,
) -> usize {
    let n = eigenvalues.len();
    if n < 2 {
        return 0;
    }
    let k = snapshots as f64;
    let mut best = (0, f64::INFINITY);
    for d in 0..n {
        let Some(ratio) = log_sphericity(&eigenvalues[d..]) else {
            continue;
        };
        let score = scale * k * (n - d) as f64 * ratio + penalty(d, n);
        if score < best.1 {
            best = (d, score);
        }
    }
    best.0
}

/// AIC source count from decreasing eigenvalues.
pub fn aic_source_count(eigenvalues: &[f64], snapshots: usize) -> usize {
    information_criterion(eigenvalues, snapshots, 2.0, |d, n| {
        2.0 * d as f64 * (2.0 * n as f64 - d as f64)
    })
}

/// MDL source count from decreasing eigenvalues.
pub fn mdl_source_count(eigenvalues: &[f64], snapshots: usize) -> usize {
    let log_k = (snapshots.max(1) as f64).ln();
    information_criterion(eigenvalues, snapshots, 1.0, move |d, n| {
        0.5 * d as f64 * (2.0 * n as f64 - d as f64) * log_k
    })
}
