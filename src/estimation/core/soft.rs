//! Soft localizer — differentiable peak refinement by windowed softmax.
//!
//! Purpose
//! -------
//! Replace the discrete argmax of the hard extractor with a softmax-weighted
//! average of grid values around each hard peak. The result is continuous in
//! the spectrum, and its gradient with respect to the spectrum is available in
//! closed form.
//!
//! Key behaviors
//! -------------
//! - 1D windows span `peak - c ..= peak + c`; indices outside the grid are
//!   replaced by the peak index.
//! - 2D windows span `2c_a + 1` rows by `2c_r + 1` columns and wrap modulo
//!   the grid lengths.
//! - Weights are a max-shifted softmax of the spectrum values in the window;
//!   2D uses one joint softmax over the whole window.
//! - 2D estimates are computed from the row and column marginals of the joint
//!   weights, which equals the expectation of each coordinate under the joint
//!   distribution.
//! - Gradients: `∂ŷ/∂s_i = Σ_{j: idx_j = i} w_j (g_j - ŷ)`.
//!
//! Invariants & assumptions
//! ------------------------
//! - Window lengths are always odd.
//! - Estimates lie within `[min, max]` of the grid values inside the window.
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// Max-shifted softmax.
pub fn softmax(values: &[f64]) -> Vec<f64> {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = values.iter().map(|v| (v - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

/// `2 · half + 1` indices around `centre`; out-of-range entries become `centre`.
pub fn window_indices_clamped(centre: usize, half: usize, len: usize) -> Vec<usize> {
    (0..=2 * half)
        .map(|j| {
            let idx = centre as i64 - half as i64 + j as i64;
            if idx < 0 || idx >= len as i64 { centre } else { idx as usize }
        })
        .collect()
}

/// `2 · half + 1` indices around `centre`, wrapped modulo `len`.
pub fn window_indices_wrapped(centre: usize, half: usize, len: usize) -> Vec<usize> {
    (0..=2 * half)
        .map(|j| (centre as i64 - half as i64 + j as i64).rem_euclid(len as i64) as usize)
        .collect()
}

/// One soft 1D estimate with the data needed for its gradient.
#[derive(Debug, Clone, PartialEq)]
pub struct SoftWindow1d {
    /// Softmax-weighted grid value.
    pub value: f64,
    /// Spectrum indices of the window.
    pub indices: Vec<usize>,
    /// Softmax weights, aligned with `indices`.
    pub weights: Vec<f64>,
    grid_values: Vec<f64>,
}

impl SoftWindow1d {
    /// Gradient of `value` with respect to a spectrum of length `len`.
    pub fn spectrum_gradient(&self, len: usize) -> Array1<f64> {
        let mut grad = Array1::<f64>::zeros(len);
        for ((&i, &w), &g) in self.indices.iter().zip(&self.weights).zip(&self.grid_values) {
            grad[i] += w * (g - self.value);
        }
        grad
    }
}

/// Soft estimates around each hard peak of a 1D spectrum.
///
/// Parameters
/// ----------
/// - `spectrum`: one batch item's spectrum.
/// - `peaks`: hard peak indices.
/// - `grid`: grid values aligned with `spectrum`.
/// - `half`: window half-width `c`.
pub fn soft_localize_1d(
    spectrum: ArrayView1<'_, f64>, peaks: &[usize], grid: ArrayView1<'_, f64>, half: usize,
) -> Vec<SoftWindow1d> {
    peaks
        .iter()
        .map(|&peak| {
            let indices = window_indices_clamped(peak, half, spectrum.len());
            let logits: Vec<f64> = indices.iter().map(|&i| spectrum[i]).collect();
            let weights = softmax(&logits);
            let grid_values: Vec<f64> = indices.iter().map(|&i| grid[i]).collect();
            let value = weights.iter().zip(&grid_values).map(|(w, g)| w * g).sum();
            SoftWindow1d { value, indices, weights, grid_values }
        })
        .collect()
}

/// One soft 2D estimate with the joint window weights.
#[derive(Debug, Clone, PartialEq)]
pub struct SoftWindow2d {
    /// Angle estimate from the row marginal.
    pub angle: f64,
    /// Range estimate from the column marginal.
    pub range: f64,
    /// Surface rows of the window.
    pub rows: Vec<usize>,
    /// Surface columns of the window.
    pub cols: Vec<usize>,
    /// Joint softmax weights, `rows.len() × cols.len()`.
    pub weights: Array2<f64>,
    angle_values: Vec<f64>,
    range_values: Vec<f64>,
}

impl SoftWindow2d {
    /// Row marginal of the joint weights.
    pub fn angle_marginal(&self) -> Array1<f64> {
        self.weights.sum_axis(ndarray::Axis(1))
    }

    /// Column marginal of the joint weights.
    pub fn range_marginal(&self) -> Array1<f64> {
        self.weights.sum_axis(ndarray::Axis(0))
    }

    /// Gradient of `angle` with respect to a surface of shape `dim`.
    pub fn angle_gradient(&self, dim: (usize, usize)) -> Array2<f64> {
        self.gradient(dim, |i, _| self.angle_values[i] - self.angle)
    }

    /// Gradient of `range` with respect to a surface of shape `dim`.
    pub fn range_gradient(&self, dim: (usize, usize)) -> Array2<f64> {
        self.gradient(dim, |_, j| self.range_values[j] - self.range)
    }

    fn gradient<F: Fn(usize, usize) -> f64>(&self, dim: (usize, usize), delta: F) -> Array2<f64> {
        let mut grad = Array2::<f64>::zeros(dim);
        for (i, &r) in self.rows.iter().enumerate() {
            for (j, &c) in self.cols.iter().enumerate() {
                grad[[r, c]] += self.weights[[i, j]] * delta(i, j);
            }
        }
        grad
    }
}

/// Soft estimates around each hard peak of a 2D spectrum.
///
/// Parameters
/// ----------
/// - `surface`: one batch item's `angles × ranges` spectrum.
/// - `peaks`: hard peak cells.
/// - `angles`, `ranges`: grid values for rows and columns.
/// - `half_angle`, `half_range`: window half-widths.
pub fn soft_localize_2d(
    surface: ArrayView2<'_, f64>, peaks: &[(usize, usize)], angles: ArrayView1<'_, f64>,
    ranges: ArrayView1<'_, f64>, half_angle: usize, half_range: usize,
) -> Vec<SoftWindow2d> {
    let (n_rows, n_cols) = surface.dim();
    peaks
        .iter()
        .map(|&(row, col)| {
            let rows = window_indices_wrapped(row, half_angle, n_rows);
            let cols = window_indices_wrapped(col, half_range, n_cols);
            let logits: Vec<f64> =
                rows.iter().flat_map(|&r| cols.iter().map(move |&c| surface[[r, c]])).collect();
            let flat = softmax(&logits);
            let weights = Array2::from_shape_fn((rows.len(), cols.len()), |(i, j)| {
                flat[i * cols.len() + j]
            });
            let angle_values: Vec<f64> = rows.iter().map(|&r| angles[r]).collect();
            let range_values: Vec<f64> = cols.iter().map(|&c| ranges[c]).collect();
            let angle_marginal = weights.sum_axis(ndarray::Axis(1));
            let range_marginal = weights.sum_axis(ndarray::Axis(0));
            let angle = angle_marginal.iter().zip(&angle_values).map(|(w, a)| w * a).sum();
            let range = range_marginal.iter().zip(&range_values).map(|(w, r)| w * r).sum();
            SoftWindow2d { angle, range, rows, cols, weights, angle_values, range_values }
        })
        .collect()
}
