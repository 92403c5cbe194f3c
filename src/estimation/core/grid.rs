//! Search grid — angle and range sampling for the MUSIC spectrum.
//!
//! Purpose
//! -------
//! Build the discrete search grids over which the spectrum is evaluated. The
//! angle grid is uniform over `[-angle_range, +angle_range]`; the range grid is
//! uniform between the Fresnel distance and a fraction of the Fraunhofer
//! distance of the array.
//!
//! Key behaviors
//! -------------
//! - The angle step is half the configured angular resolution, in radians.
//! - Far-field angle grids are rounded to
//!   `ceil(log10(1 / half_resolution_rad))` decimals.
//! - Angle grids are built symmetrically about zero, sample by sample, so
//!   `grid[i] == -grid[n - 1 - i]` holds exactly.
//! - Range grids run from `ceil(fresnel)` up to (excluding)
//!   `min(fraunhofer, fraunhofer · max_range_ratio + range_resolution / 2)`
//!   with step `range_resolution / 2`.
//!
//! Invariants & assumptions
//! ------------------------
//! - Every grid that is present has length ≥ 1 and is strictly increasing.
//! - A collapsed range interval (`lower >= upper`) is a configuration error,
//!   not an empty grid.
//!
//! Downstream usage
//! ----------------
//! - `steering` turns a [`SearchGrid`] into steering dictionaries.
//! - The estimator maps peak indices back to grid values.
use crate::estimation::{
    core::{
        field::{EstimationTarget, FieldType},
        options::GridOptions,
    },
    errors::{MusicError, MusicResult},
};
use ndarray::Array1;

/// Tolerance used when counting grid steps across a floating-point span.
const STEP_COUNT_TOL: f64 = 1e-9;

/// Angle and/or range samples, fixed between rebuilds.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchGrid {
    angles: Option<Array1<f64>>,
    ranges: Option<Array1<f64>>,
}

impl SearchGrid {
    /// Angle samples in radians, when the target includes angles.
    pub fn angles(&self) -> Option<&Array1<f64>> {
        self.angles.as_ref()
    }

    /// Range samples, when the target includes ranges.
    pub fn ranges(&self) -> Option<&Array1<f64>> {
        self.ranges.as_ref()
    }
}

/// Half of the angular resolution, converted to radians.
pub fn half_resolution_rad(angle_resolution_deg: f64) -> f64 {
    (angle_resolution_deg / 2.0).to_radians()
}

/// Number of decimals far-field angle grids are rounded to.
pub fn angle_decimals(half_resolution_rad: f64) -> i32 {
    (1.0 / half_resolution_rad).log10().ceil() as i32
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Uniform, symmetric angle grid in radians.
///
/// Parameters
/// ----------
/// - `opts`: grid options supplying the half-range and resolution.
/// - `round`: apply far-field decimal rounding.
///
/// Returns
/// -------
/// `Array1<f64>` of length `floor(2 · range / step) + 1`.
///
/// Errors
/// ------
/// - `MusicError::InvalidResolution` when the step is not positive or the
///   sample count does not fit in `usize`.
///
/// Notes
/// -----
/// - Samples are `(2i - (n - 1)) · step / 2`; when the half-range is not a
///   multiple of the step the grid stays symmetric and inside the interval.
pub fn angle_grid(opts: &GridOptions, round: bool) -> MusicResult<Array1<f64>> {
    let half_range = opts.angle_range_deg.to_radians();
    let step = half_resolution_rad(opts.angle_resolution_deg);
    let invalid =
        MusicError::InvalidResolution { name: "Angle resolution", value: opts.angle_resolution_deg };
    if !(step.is_finite() && step > 0.0) {
        return Err(invalid);
    }
    let span = (2.0 * half_range / step + STEP_COUNT_TOL).floor();
    if !(span.is_finite() && span >= 0.0 && span < usize::MAX as f64) {
        return Err(invalid);
    }
    let n = (span as usize).checked_add(1).ok_or(invalid)?;
    let decimals = angle_decimals(step);
    Ok(Array1::from_iter((0..n).map(|i| {
        let value = (2.0 * i as f64 - (n as f64 - 1.0)) * step / 2.0;
        if round { round_to(value, decimals) } else { value }
    })))
}

/// Lower (inclusive) and upper (exclusive) range-grid bounds.
///
/// Errors
/// ------
/// - `MusicError::InvalidGrid` when `lower >= upper` or either bound is not a
///   number.
pub fn range_bounds(opts: &GridOptions, fresnel: f64, fraunhofer: f64) -> MusicResult<(f64, f64)> {
    let lower = fresnel.ceil();
    let upper = fraunhofer.min(fraunhofer * opts.max_range_ratio + opts.range_resolution / 2.0);
    if !(lower < upper) {
        return Err(MusicError::InvalidGrid { lower, upper });
    }
    Ok((lower, upper))
}

/// Uniform range grid with step `range_resolution / 2`, upper bound excluded.
///
/// Errors
/// ------
/// - `MusicError::InvalidResolution` for a non-positive step.
/// - `MusicError::InvalidGrid` from [`range_bounds`].
pub fn range_grid(opts: &GridOptions, fresnel: f64, fraunhofer: f64) -> MusicResult<Array1<f64>> {
    let step = opts.range_resolution / 2.0;
    let invalid =
        MusicError::InvalidResolution { name: "Range resolution", value: opts.range_resolution };
    if !(step.is_finite() && step > 0.0) {
        return Err(invalid);
    }
    let (lower, upper) = range_bounds(opts, fresnel, fraunhofer)?;
    let span = (((upper - lower) / step) - STEP_COUNT_TOL).ceil().max(1.0);
    if !(span.is_finite() && span < usize::MAX as f64) {
        return Err(invalid);
    }
    let n = span as usize;
    Ok(Array1::from_iter((0..n).map(|i| lower + i as f64 * step)))
}

/// Build the search grid for a field regime and estimation target.
///
/// Parameters
/// ----------
/// - `field`, `target`: validated configuration pair.
/// - `opts`: grid options.
/// - `fresnel`, `fraunhofer`: array distances bounding the near field; only
///   read when the target includes ranges.
///
/// Returns
/// -------
/// - Far field: rounded angle grid only.
/// - Near/full field: unrounded angle grid when the target has angles, range
///   grid when it has ranges.
///
/// Errors
/// ------
/// - `MusicError::InvalidResolution` from [`angle_grid`].
/// - `MusicError::InvalidGrid` from [`range_bounds`].
pub fn build_search_grid(
    field: FieldType, target: EstimationTarget, opts: &GridOptions, fresnel: f64,
    fraunhofer: f64,
) -> MusicResult<SearchGrid> {
    if !field.is_near() {
        return Ok(SearchGrid { angles: Some(angle_grid(opts, true)?), ranges: None });
    }
    let angles = if target.has_angle() { Some(angle_grid(opts, false)?) } else { None };
    let ranges =
        if target.has_range() { Some(range_grid(opts, fresnel, fraunhofer)?) } else { None };
    Ok(SearchGrid { angles, ranges })
}
