//! Spectrum evaluator — noise-subspace projections and the MUSIC spectrum.
//!
//! Purpose
//! -------
//! Project steering dictionaries onto per-item noise subspaces and turn the
//! resulting inverse spectra into MUSIC pseudo-spectra.
//!
//! Key behaviors
//! -------------
//! - Inverse spectrum: `‖a(g)ᴴ E_n‖²` for every grid point `g`.
//! - MUSIC spectrum: `1 / (inverse + SPECTRUM_EPS)`.
//! - Line dictionaries (shared or per-item) produce `batch × grid`; surface
//!   dictionaries produce `batch × angles × ranges`.
//! - The surface projection has two strategies with identical results:
//!   [`ProjectionStrategy::Batched`] materializes the full
//!   `batch × angles × ranges × (N - M)` projection tensor;
//!   [`ProjectionStrategy::Iterative`] keeps one item's projection alive at a
//!   time. The batched strategy is skipped, with a warning, when it exceeds the
//!   byte budget or its buffer cannot be reserved.
//! - Dictionaries built for more sensors than the noise subspace are
//!   truncated to their leading rows.
//! - [`aggregate_spectrum`] sums per-dictionary spectra over a trailing axis.
//!
//! Invariants & assumptions
//! ------------------------
//! - Returned spectra are finite and strictly positive; a non-finite inverse
//!   spectrum is reported as `MusicError::NonFiniteSpectrum`.
//! - The noise subspace has layout `batch × sensors × (sensors - sources)`.
//!
//! Testing notes
//! -------------
//! - Unit tests cover orthogonality (zero inverse at the true grid point),
//!   strategy equivalence, the budget fallback, sensor truncation, the
//!   aggregation variant, and the non-finite guard.
use crate::estimation::{
    core::steering::SteeringDictionary,
    errors::{MusicError, MusicResult},
};
use ndarray::{
    Array, Array2, Array3, ArrayView2, ArrayView3, ArrayViewMut2, Axis, Dimension, RemoveAxis,
    linalg::general_mat_mul, s,
};
use num_complex::Complex64;
use tracing::{debug, warn};

/// Regularizer added to the inverse spectrum before reciprocation.
pub const SPECTRUM_EPS: f64 = 1e-10;

const COMPLEX_BYTES: usize = std::mem::size_of::<Complex64>();

/// Real-valued spectrum over the search grid, one slice per batch item.
#[derive(Debug, Clone, PartialEq)]
pub enum MusicSpectrum {
    /// `batch × grid`.
    Line(Array2<f64>),
    /// `batch × angles × ranges`.
    Surface(Array3<f64>),
}

impl MusicSpectrum {
    pub fn batch_size(&self) -> usize {
        match self {
            MusicSpectrum::Line(s) => s.nrows(),
            MusicSpectrum::Surface(s) => s.len_of(Axis(0)),
        }
    }

    /// Apply `1 / (x + SPECTRUM_EPS)` elementwise.
    pub fn reciprocal(&self) -> MusicSpectrum {
        let f = |x: f64| 1.0 / (x + SPECTRUM_EPS);
        match self {
            MusicSpectrum::Line(s) => MusicSpectrum::Line(s.mapv(f)),
            MusicSpectrum::Surface(s) => MusicSpectrum::Surface(s.mapv(f)),
        }
    }
}

/// Execution strategy for the surface projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionStrategy {
    Batched,
    Iterative,
}

/// Inverse spectrum of every batch item over the dictionary's grid.
///
/// Parameters
/// ----------
/// - `dictionary`: shared, per-item, or surface steering dictionary.
/// - `noise`: `batch × sensors × (sensors - sources)` noise subspaces.
/// - `max_batched_bytes`: byte budget for the batched surface projection.
///
/// Returns
/// -------
/// `MusicSpectrum::Line` for line dictionaries, `MusicSpectrum::Surface` for
/// surface dictionaries.
///
/// Errors
/// ------
/// - `MusicError::ShapeMismatch` when the noise subspace has more sensors than
///   the dictionary or a per-item dictionary has a different batch size.
/// - `MusicError::NonFiniteSpectrum` when any projection is NaN/±inf.
/// - `MusicError::ResourceExhausted` when even the per-item surface buffer
///   cannot be allocated.
pub fn inverse_spectrum(
    dictionary: &SteeringDictionary, noise: ArrayView3<'_, Complex64>, max_batched_bytes: usize,
) -> MusicResult<MusicSpectrum> {
    let sensors = noise.len_of(Axis(1));
    if sensors > dictionary.sensors() {
        return Err(MusicError::ShapeMismatch {
            what: "noise subspace sensors",
            expected: dictionary.sensors(),
            actual: sensors,
        });
    }
    let spectrum = match dictionary {
        SteeringDictionary::Shared(d) => {
            let adjoint = conj_transpose(d.slice(s![..sensors, ..]));
            let mut out = Array2::<f64>::zeros((noise.len_of(Axis(0)), adjoint.nrows()));
            for (b, e) in noise.outer_iter().enumerate() {
                out.row_mut(b).assign(&projection_power(&adjoint, e));
            }
            MusicSpectrum::Line(out)
        }
        SteeringDictionary::PerItem(d) => {
            let batch = noise.len_of(Axis(0));
            if d.len_of(Axis(0)) != batch {
                return Err(MusicError::ShapeMismatch {
                    what: "per-item steering batch",
                    expected: batch,
                    actual: d.len_of(Axis(0)),
                });
            }
            let mut out = Array2::<f64>::zeros((batch, d.len_of(Axis(2))));
            for (b, e) in noise.outer_iter().enumerate() {
                let adjoint = conj_transpose(d.slice(s![b, ..sensors, ..]));
                out.row_mut(b).assign(&projection_power(&adjoint, e));
            }
            MusicSpectrum::Line(out)
        }
        SteeringDictionary::Surface(d) => {
            let surface = d.slice(s![..sensors, .., ..]);
            let bytes = projection_bytes(surface, noise);
            let strategy = if bytes <= max_batched_bytes {
                ProjectionStrategy::Batched
            } else {
                warn!(bytes, max_batched_bytes, "surface projection exceeds budget; iterating");
                ProjectionStrategy::Iterative
            };
            MusicSpectrum::Surface(surface_inverse_spectrum(surface, noise, strategy)?)
        }
    };
    ensure_finite(&spectrum)?;
    Ok(spectrum)
}

/// Surface inverse spectrum with an explicit strategy.
///
/// A batched request whose buffer cannot be reserved falls back to the
/// iterative strategy and logs a warning.
///
/// Errors
/// ------
/// - `MusicError::ResourceExhausted` when the iterative buffer cannot be
///   reserved.
pub fn surface_inverse_spectrum(
    surface: ArrayView3<'_, Complex64>, noise: ArrayView3<'_, Complex64>,
    strategy: ProjectionStrategy,
) -> MusicResult<Array3<f64>> {
    let (sensors, n_angles, n_ranges) = surface.dim();
    let (batch, noise_sensors, noise_dim) = noise.dim();
    if noise_sensors != sensors {
        return Err(MusicError::ShapeMismatch {
            what: "surface dictionary sensors",
            expected: noise_sensors,
            actual: sensors,
        });
    }
    let cells = n_angles * n_ranges;
    let adjoint = Array2::from_shape_fn((cells, sensors), |(g, n)| {
        surface[[n, g / n_ranges, g % n_ranges]].conj()
    });

    if strategy == ProjectionStrategy::Batched {
        let len = batch * cells * noise_dim;
        let mut buffer: Vec<Complex64> = Vec::new();
        if buffer.try_reserve_exact(len).is_ok() {
            debug!(batch, cells, noise_dim, "batched surface projection");
            buffer.resize(len, Complex64::new(0.0, 0.0));
            for (b, e) in noise.outer_iter().enumerate() {
                let chunk = &mut buffer[b * cells * noise_dim..(b + 1) * cells * noise_dim];
                let mut projection = ArrayViewMut2::from_shape((cells, noise_dim), chunk)
                    .map_err(|_| MusicError::ShapeMismatch {
                        what: "projection buffer",
                        expected: cells * noise_dim,
                        actual: len,
                    })?;
                general_mat_mul(one(), &adjoint, &e, zero(), &mut projection);
            }
            let projection = Array::from_shape_vec((batch, n_angles, n_ranges, noise_dim), buffer)
                .map_err(|_| MusicError::ShapeMismatch {
                    what: "projection tensor",
                    expected: len,
                    actual: len,
                })?;
            return Ok(projection.mapv(|c| c.norm_sqr()).sum_axis(Axis(3)));
        }
        warn!(bytes = len * COMPLEX_BYTES, "could not reserve batched projection; iterating");
    }

    let mut out = Array3::<f64>::zeros((batch, n_angles, n_ranges));
    for (b, e) in noise.outer_iter().enumerate() {
        let len = cells * noise_dim;
        let mut buffer: Vec<Complex64> = Vec::new();
        buffer
            .try_reserve_exact(len)
            .map_err(|_| MusicError::ResourceExhausted { bytes: len * COMPLEX_BYTES })?;
        buffer.resize(len, Complex64::new(0.0, 0.0));
        let mut projection = Array2::from_shape_vec((cells, noise_dim), buffer).map_err(|_| {
            MusicError::ShapeMismatch { what: "projection buffer", expected: len, actual: len }
        })?;
        general_mat_mul(one(), &adjoint, &e, zero(), &mut projection);
        let power = projection.mapv(|c| c.norm_sqr()).sum_axis(Axis(1));
        for (g, p) in power.iter().enumerate() {
            out[[b, g / n_ranges, g % n_ranges]] = *p;
        }
    }
    Ok(out)
}

/// MUSIC spectrum `1 / (inverse + SPECTRUM_EPS)`.
pub fn music_spectrum(inverse: &MusicSpectrum) -> MusicSpectrum {
    inverse.reciprocal()
}

/// Aggregate per-dictionary inverse spectra along the trailing axis:
/// `Σ_d 1 / (inverse[.., d] + SPECTRUM_EPS)`.
pub fn aggregate_spectrum<D>(inverse: &Array<f64, D>) -> Array<f64, D::Smaller>
where
    D: Dimension + RemoveAxis,
{
    let last = Axis(inverse.ndim() - 1);
    inverse.mapv(|x| 1.0 / (x + SPECTRUM_EPS)).sum_axis(last)
}

fn conj_transpose(d: ArrayView2<'_, Complex64>) -> Array2<Complex64> {
    d.t().mapv(|c| c.conj())
}

fn projection_power(
    adjoint: &Array2<Complex64>, noise: ArrayView2<'_, Complex64>,
) -> ndarray::Array1<f64> {
    adjoint.dot(&noise).mapv(|c| c.norm_sqr()).sum_axis(Axis(1))
}

fn projection_bytes(surface: ArrayView3<'_, Complex64>, noise: ArrayView3<'_, Complex64>) -> usize {
    let (_, n_angles, n_ranges) = surface.dim();
    let (batch, _, noise_dim) = noise.dim();
    batch
        .saturating_mul(n_angles)
        .saturating_mul(n_ranges)
        .saturating_mul(noise_dim)
        .saturating_mul(COMPLEX_BYTES)
}

fn first_non_finite<'a>(values: impl Iterator<Item = &'a f64>) -> Option<(usize, f64)> {
    values.enumerate().find(|(_, v)| !v.is_finite()).map(|(i, v)| (i, *v))
}

fn ensure_finite(spectrum: &MusicSpectrum) -> MusicResult<()> {
    let found = match spectrum {
        MusicSpectrum::Line(s) => s.outer_iter().enumerate().find_map(|(b, row)| {
            first_non_finite(row.iter()).map(|(index, value)| (b, index, value))
        }),
        MusicSpectrum::Surface(s) => s.outer_iter().enumerate().find_map(|(b, item)| {
            first_non_finite(item.iter()).map(|(index, value)| (b, index, value))
        }),
    };
    match found {
        Some((batch, index, value)) => Err(MusicError::NonFiniteSpectrum { batch, index, value }),
        None => Ok(()),
    }
}

fn one() -> Complex64 {
    Complex64::new(1.0, 0.0)
}

fn zero() -> Complex64 {
    Complex64::new(0.0, 0.0)
}
