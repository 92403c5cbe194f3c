//! Peak extractor — discrete top-k maxima of 1D and 2D spectra.
//!
//! Purpose
//! -------
//! Select the `k` strongest local maxima of a MUSIC spectrum. This is the
//! hard (non-differentiable) extraction used at inference time and as the
//! seed for the soft localizer.
//!
//! Key behaviors
//! -------------
//! - 1D: a sample is a peak when its left neighbour is strictly lower, the
//!   following samples are equal (a plateau) or the next is strictly lower, and
//!   the plateau ends on a strictly lower sample. Plateaus report their middle
//!   index; the first and last samples are never peaks.
//! - 2D: a cell belongs to a maximum when it equals the maximum of the
//!   `window × window` neighbourhood (cells outside the surface count as
//!   `-inf`). Maximum cells are grouped into 4-connected components, each
//!   represented by the centre of its bounding box.
//! - Peaks are ordered by spectrum value, highest first; ties keep index
//!   order.
//! - Fewer peaks than requested is not an error: the list is padded and a
//!   warning is logged (see [`PeakPadder`]).
//!
//! Invariants & assumptions
//! ------------------------
//! - Inputs are finite (the spectrum evaluator guarantees this).
//! - For a non-empty input the result always has exactly `k` entries.
//!
//! Testing notes
//! -------------
//! - Unit tests cover impulse spectra, plateaus, both padding stages, seeded
//!   reproducibility, Gaussian surface bumps, and flat 2D components.
use crate::estimation::core::options::PaddingPolicy;
use ndarray::{Array2, ArrayView1, ArrayView2};
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::collections::VecDeque;
use tracing::warn;

/// Padding state for insufficient peak lists.
///
/// `Deterministic` pads with the largest remaining samples and, when the
/// spectrum is exhausted, repeats the selection. `Seeded` and `Entropy` keep a
/// generator across calls and draw uniformly random grid locations instead.
#[derive(Debug, Clone)]
pub struct PeakPadder {
    policy: PaddingPolicy,
    rng: Option<StdRng>,
}

impl PeakPadder {
    pub fn new(policy: PaddingPolicy) -> Self {
        let rng = match policy {
            PaddingPolicy::Deterministic => None,
            PaddingPolicy::Seeded(seed) => Some(StdRng::seed_from_u64(seed)),
            PaddingPolicy::Entropy => Some(StdRng::from_entropy()),
        };
        PeakPadder { policy, rng }
    }

    pub fn deterministic() -> Self {
        Self::new(PaddingPolicy::Deterministic)
    }

    pub fn policy(&self) -> PaddingPolicy {
        self.policy
    }

    fn random_index(&mut self, len: usize) -> Option<usize> {
        self.rng.as_mut().map(|rng| rng.gen_range(0..len))
    }
}

/// Indices of local maxima, in increasing index order.
pub fn local_maxima_1d(x: ArrayView1<'_, f64>) -> Vec<usize> {
    let n = x.len();
    let mut peaks = Vec::new();
    if n < 3 {
        return peaks;
    }
    let i_max = n - 1;
    let mut i = 1;
    while i < i_max {
        if x[i - 1] < x[i] {
            let mut i_ahead = i + 1;
            while i_ahead < i_max && x[i_ahead] == x[i] {
                i_ahead += 1;
            }
            if x[i_ahead] < x[i] {
                peaks.push((i + i_ahead - 1) / 2);
                i = i_ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Top-k peak indices of a 1D spectrum, strongest first.
///
/// Parameters
/// ----------
/// - `spectrum`: finite spectrum samples.
/// - `k`: number of sources.
/// - `padder`: padding state used only when the spectrum is shorter than `k`.
///
/// Returns
/// -------
/// Exactly `k` indices for a non-empty spectrum (empty when `k == 0` or the
/// spectrum is empty).
///
/// Notes
/// -----
/// - When fewer than `k` local maxima exist, the largest remaining samples
///   fill the gap and the union is re-sorted by value.
pub fn find_top_k_1d(
    spectrum: ArrayView1<'_, f64>, k: usize, padder: &mut PeakPadder,
) -> Vec<usize> {
    let n = spectrum.len();
    if k == 0 || n == 0 {
        return Vec::new();
    }
    let by_value = |a: &usize, b: &usize| spectrum[*b].total_cmp(&spectrum[*a]);

    let mut peaks = local_maxima_1d(spectrum);
    peaks.sort_by(by_value);
    peaks.truncate(k);
    if peaks.len() == k {
        return peaks;
    }

    warn!(found = peaks.len(), requested = k, "padding 1D peaks with largest samples");
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(by_value);
    for idx in order {
        if peaks.len() == k {
            break;
        }
        if !peaks.contains(&idx) {
            peaks.push(idx);
        }
    }
    peaks.sort_by(by_value);
    pad_exhausted(&mut peaks, k, n, padder);
    peaks
}

/// 2D maximum filter with a square odd window and `-inf` outside the surface.
pub fn maximum_filter(surface: ArrayView2<'_, f64>, window: usize) -> Array2<f64> {
    let (rows, cols) = surface.dim();
    let half = window / 2;
    let mut row_max = Array2::<f64>::from_elem((rows, cols), f64::NEG_INFINITY);
    for i in 0..rows {
        for j in 0..cols {
            let lo = j.saturating_sub(half);
            let hi = (j + half).min(cols - 1);
            row_max[[i, j]] = (lo..=hi).map(|c| surface[[i, c]]).fold(f64::NEG_INFINITY, f64::max);
        }
    }
    let mut out = Array2::<f64>::from_elem((rows, cols), f64::NEG_INFINITY);
    for i in 0..rows {
        let lo = i.saturating_sub(half);
        let hi = (i + half).min(rows - 1);
        for j in 0..cols {
            out[[i, j]] = (lo..=hi).map(|r| row_max[[r, j]]).fold(f64::NEG_INFINITY, f64::max);
        }
    }
    out
}

/// Bounding-box centres of the 4-connected components of `mask`, in raster
/// order of each component's first cell.
pub fn component_centres(mask: &Array2<bool>) -> Vec<(usize, usize)> {
    let (rows, cols) = mask.dim();
    let mut seen = Array2::<bool>::from_elem((rows, cols), false);
    let mut centres = Vec::new();
    let mut queue = VecDeque::new();
    for i in 0..rows {
        for j in 0..cols {
            if !mask[[i, j]] || seen[[i, j]] {
                continue;
            }
            let (mut r0, mut r1, mut c0, mut c1) = (i, i, j, j);
            seen[[i, j]] = true;
            queue.push_back((i, j));
            while let Some((r, c)) = queue.pop_front() {
                r0 = r0.min(r);
                r1 = r1.max(r);
                c0 = c0.min(c);
                c1 = c1.max(c);
                let mut visit = |rr: usize, cc: usize| {
                    if mask[[rr, cc]] && !seen[[rr, cc]] {
                        seen[[rr, cc]] = true;
                        queue.push_back((rr, cc));
                    }
                };
                if r > 0 {
                    visit(r - 1, c);
                }
                if r + 1 < rows {
                    visit(r + 1, c);
                }
                if c > 0 {
                    visit(r, c - 1);
                }
                if c + 1 < cols {
                    visit(r, c + 1);
                }
            }
            centres.push(((r0 + r1) / 2, (c0 + c1) / 2));
        }
    }
    centres
}

/// Top-k peak cells of a 2D spectrum, strongest first.
///
/// Parameters
/// ----------
/// - `surface`: finite `angles × ranges` spectrum.
/// - `k`: number of sources.
/// - `window`: odd maximum-filter side length.
/// - `padder`: padding state for insufficient peaks.
///
/// Returns
/// -------
/// Exactly `k` `(row, col)` cells for a non-empty surface.
pub fn find_top_k_2d(
    surface: ArrayView2<'_, f64>, k: usize, window: usize, padder: &mut PeakPadder,
) -> Vec<(usize, usize)> {
    let (rows, cols) = surface.dim();
    if k == 0 || rows == 0 || cols == 0 {
        return Vec::new();
    }
    let by_value = |a: &(usize, usize), b: &(usize, usize)| surface[*b].total_cmp(&surface[*a]);

    let filtered = maximum_filter(surface, window);
    let mask = Array2::from_shape_fn((rows, cols), |idx| surface[idx] == filtered[idx]);
    let mut peaks = component_centres(&mask);
    peaks.sort_by(by_value);
    peaks.truncate(k);
    if peaks.len() == k {
        return peaks;
    }

    warn!(
        found = peaks.len(),
        requested = k,
        policy = ?padder.policy(),
        "padding 2D peaks"
    );
    let total = rows * cols;
    if padder.rng.is_some() {
        while peaks.len() < k {
            if let Some(flat) = padder.random_index(total) {
                peaks.push((flat / cols, flat % cols));
            }
        }
        return peaks;
    }
    let mut order: Vec<(usize, usize)> = (0..total).map(|f| (f / cols, f % cols)).collect();
    order.sort_by(by_value);
    for cell in order {
        if peaks.len() == k {
            break;
        }
        if !peaks.contains(&cell) {
            peaks.push(cell);
        }
    }
    peaks.sort_by(by_value);
    let mut flat: Vec<usize> = peaks.iter().map(|&(r, c)| r * cols + c).collect();
    pad_exhausted(&mut flat, k, total, padder);
    flat.into_iter().map(|f| (f / cols, f % cols)).collect()
}

/// Last-resort padding once every grid location has been used.
fn pad_exhausted(peaks: &mut Vec<usize>, k: usize, len: usize, padder: &mut PeakPadder) {
    if peaks.len() >= k {
        return;
    }
    warn!(selected = peaks.len(), requested = k, len, "more sources than grid samples");
    let selected = peaks.len();
    let mut i = 0;
    while peaks.len() < k {
        let next = match padder.random_index(len) {
            Some(idx) => idx,
            None => peaks[i % selected],
        };
        peaks.push(next);
        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, array};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - 1D peaks on impulse spectra, plateaus, and edge exclusion.
    // - Both 1D padding stages and seeded reproducibility.
    // - 2D peaks on Gaussian bumps and on flat components.
    // - 2D deterministic and seeded padding.
    // -------------------------------------------------------------------------

    fn gaussian_surface(rows: usize, cols: usize, bumps: &[(f64, f64, f64)]) -> Array2<f64> {
        Array2::from_shape_fn((rows, cols), |(i, j)| {
            bumps
                .iter()
                .map(|&(r, c, h)| {
                    let d2 = (i as f64 - r).powi(2) + (j as f64 - c).powi(2);
                    h * (-d2 / 8.0).exp()
                })
                .sum()
        })
    }

    #[test]
    // Purpose
    // -------
    // Verify well-separated impulses are returned by decreasing value.
    //
    // Given
    // -----
    // - 60 zero samples with impulses 1.0 at 5, 3.0 at 20, 2.0 at 40.
    //
    // Expect
    // ------
    // - `find_top_k_1d(.., 3)` returns [20, 40, 5].
    fn impulses_are_returned_by_value() {
        // Arrange
        let mut x = Array1::<f64>::zeros(60);
        x[5] = 1.0;
        x[20] = 3.0;
        x[40] = 2.0;

        // Act
        let peaks = find_top_k_1d(x.view(), 3, &mut PeakPadder::deterministic());

        // Assert
        assert_eq!(peaks, vec![20, 40, 5]);
    }

    #[test]
    // Purpose
    // -------
    // Check plateau handling and edge exclusion.
    //
    // Given
    // -----
    // - [5, 0, 2, 2, 2, 0, 9]: maxima at both edges and a plateau at 2..=4.
    //
    // Expect
    // ------
    // - Only the plateau middle (3) is a local maximum.
    fn plateau_reports_middle_and_edges_are_excluded() {
        // Act
        let peaks = local_maxima_1d(array![5.0, 0.0, 2.0, 2.0, 2.0, 0.0, 9.0].view());

        // Assert
        assert_eq!(peaks, vec![3]);
    }

    #[test]
    // Purpose
    // -------
    // Ensure insufficient maxima are padded with the largest samples.
    //
    // Given
    // -----
    // - A strictly increasing spectrum (no interior maxima), k = 2.
    // - A single peak spectrum [0, 1, 5, 1, 0, 0, 0], k = 3.
    //
    // Expect
    // ------
    // - [4, 3] for the ramp.
    // - [2, 1, 3]: the peak, then the largest remaining samples.
    fn insufficient_maxima_are_padded_with_largest_samples() {
        // Arrange
        let ramp = array![0.0, 1.0, 2.0, 3.0, 4.0];
        let single = array![0.0, 1.0, 5.0, 1.0, 0.0, 0.0, 0.0];
        let mut padder = PeakPadder::deterministic();

        // Act
        let ramp_peaks = find_top_k_1d(ramp.view(), 2, &mut padder);
        let single_peaks = find_top_k_1d(single.view(), 3, &mut padder);

        // Assert
        assert_eq!(ramp_peaks, vec![4, 3]);
        assert_eq!(single_peaks, vec![2, 1, 3]);
    }

    #[test]
    // Purpose
    // -------
    // Check requests larger than the spectrum still return exactly k entries.
    //
    // Given
    // -----
    // - A 3-sample spectrum and k = 5, once deterministic and twice with the
    //   same seed.
    //
    // Expect
    // ------
    // - Deterministic: [1, 2, 0, 1, 2] (selection repeated).
    // - Seeded: five in-range indices, identical across equal seeds.
    fn oversized_requests_are_padded_to_k() {
        // Arrange
        let x = array![1.0, 3.0, 2.0];

        // Act
        let det = find_top_k_1d(x.view(), 5, &mut PeakPadder::deterministic());
        let a = find_top_k_1d(x.view(), 5, &mut PeakPadder::new(PaddingPolicy::Seeded(11)));
        let b = find_top_k_1d(x.view(), 5, &mut PeakPadder::new(PaddingPolicy::Seeded(11)));

        // Assert
        assert_eq!(det, vec![1, 2, 0, 1, 2]);
        assert_eq!(a.len(), 5);
        assert!(a.iter().all(|&i| i < 3));
        assert_eq!(a, b);
    }

    #[test]
    // Purpose
    // -------
    // Verify two Gaussian bumps are found at their centres, strongest first.
    //
    // Given
    // -----
    // - 50 × 40 surface with bumps of height 2 at (10, 8) and 1 at (35, 30).
    //
    // Expect
    // ------
    // - `find_top_k_2d(.., 2, 21, ..)` returns [(10, 8), (35, 30)].
    fn gaussian_bumps_are_located() {
        // Arrange
        let surface = gaussian_surface(50, 40, &[(10.0, 8.0, 2.0), (35.0, 30.0, 1.0)]);

        // Act
        let peaks = find_top_k_2d(surface.view(), 2, 21, &mut PeakPadder::deterministic());

        // Assert
        assert_eq!(peaks, vec![(10, 8), (35, 30)]);
    }

    #[test]
    // Purpose
    // -------
    // Check flat maxima collapse to the bounding-box centre.
    //
    // Given
    // -----
    // - 20 × 30 zeros with a 3 × 3 block of ones at rows 4..=6, cols 10..=12.
    //
    // Expect
    // ------
    // - The top peak is (5, 11).
    fn flat_component_reports_bounding_box_centre() {
        // Arrange
        let mut surface = Array2::<f64>::zeros((20, 30));
        for i in 4..=6 {
            for j in 10..=12 {
                surface[[i, j]] = 1.0;
            }
        }

        // Act
        let peaks = find_top_k_2d(surface.view(), 1, 5, &mut PeakPadder::deterministic());

        // Assert
        assert_eq!(peaks, vec![(5, 11)]);
    }

    #[test]
    // Purpose
    // -------
    // Ensure 2D shortfalls are padded under both policies.
    //
    // Given
    // -----
    // - One Gaussian bump on a 15 × 15 surface; k = 3 with window 31 so the
    //   bump is the only maximum.
    //
    // Expect
    // ------
    // - Deterministic: bump centre first, then its two largest neighbours.
    // - Seeded: bump centre first, three in-range cells, reproducible.
    fn insufficient_2d_peaks_are_padded() {
        // Arrange
        let surface = gaussian_surface(15, 15, &[(7.0, 7.0, 1.0)]);

        // Act
        let det = find_top_k_2d(surface.view(), 3, 31, &mut PeakPadder::deterministic());
        let a = find_top_k_2d(surface.view(), 3, 31, &mut PeakPadder::new(PaddingPolicy::Seeded(3)));
        let b = find_top_k_2d(surface.view(), 3, 31, &mut PeakPadder::new(PaddingPolicy::Seeded(3)));

        // Assert
        assert_eq!(det.len(), 3);
        assert_eq!(det[0], (7, 7));
        for &(r, c) in &det[1..] {
            assert_eq!((r as i64 - 7).abs() + (c as i64 - 7).abs(), 1);
        }
        assert_eq!(a.len(), 3);
        assert_eq!(a[0], (7, 7));
        assert!(a.iter().all(|&(r, c)| r < 15 && c < 15));
        assert_eq!(a, b);
    }
}
