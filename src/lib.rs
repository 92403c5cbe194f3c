//! rust_doa — MUSIC direction-of-arrival and range estimation with Python bindings.
//!
//! Purpose
//! -------
//! Serve as the crate root for Rust callers and as the PyO3 bridge that exposes
//! the MUSIC estimator to Python via the `_rust_doa` extension module. When the
//! `python-bindings` feature is enabled, this module defines the Python-facing
//! class and submodule used by the `rust_doa` package.
//!
//! Key behaviors
//! -------------
//! - Re-export the core Rust modules (`estimation` and `collaborators`) as the
//!   public crate surface.
//! - Define the `Music` `#[pyclass]` wrapper and the `#[pymodule]` initializer
//!   for the `_rust_doa` Python extension.
//! - Register the `music` submodule under `rust_doa` so dotted imports work.
//!
//! Invariants & assumptions
//! ------------------------
//! - All numerical work lives in the inner Rust modules; this file performs
//!   only FFI glue, input conversion, and error mapping.
//! - The Python class wraps a uniform linear array and an eigen-decomposition
//!   separator; Rust callers can plug in their own collaborators.
//!
//! Conventions
//! -----------
//! - Angles are radians; ranges share the array wavelength's unit.
//! - Errors from core Rust code are propagated as [`estimation::MusicError`]
//!   and converted to `PyErr` at the PyO3 boundary.
//!
//! Downstream usage
//! ----------------
//! - Native Rust code should depend on [`estimation`] and [`collaborators`]
//!   and can ignore the items guarded by the `python-bindings` feature.
//! - The Python packaging layer imports `_rust_doa` and wraps `Music` in a
//!   user-facing API.
//!
//! Testing notes
//! -------------
//! - Numerical behavior is covered by unit tests in the inner modules and by
//!   `tests/integration_music_pipeline.rs`.

pub mod collaborators;
pub mod estimation;
pub mod utils;

#[cfg(feature = "python-bindings")]
use numpy::IntoPyArray;

#[cfg(feature = "python-bindings")]
use pyo3::{
    prelude::*,
    types::{PyAny, PyDict},
};

#[cfg(feature = "python-bindings")]
use crate::{
    collaborators::{array::UniformLinearArray, subspace::EigenSeparator},
    estimation::{
        core::field::PeakMode,
        models::music::{MusicEstimator, ParameterEstimate},
    },
    utils::{build_music_estimator, extract_covariance, extract_f64_matrix},
};

/// Music — Python-facing wrapper for the MUSIC estimator.
///
/// Parameters
/// ----------
/// Constructed from Python via
/// `Music(sensors, field_type="far", estimation_target="angle", ...)`:
/// - `sensors`: number of array elements (≥ 2).
/// - `field_type`: `"far"`, `"near"`, or `"full"`.
/// - `estimation_target`: `"angle"`, `"range"`, or `"angle, range"`.
/// - `spacing`, `wavelength`: array geometry (spacing in wavelengths).
/// - `angle_range`, `angle_resolution`: angle grid in degrees.
/// - `range_resolution`, `max_range_ratio`: near-field range grid.
/// - `peak_window`: odd 2D maximum-filter size.
/// - `cell_coefficient`: initial soft-window fraction.
/// - `eigen_threshold`: source-count threshold on normalized eigenvalues.
/// - `seed`: when set, starved 2D peak searches pad with seeded random cells.
///
/// Notes
/// -----
/// - Rust callers should use [`MusicEstimator`] directly.
#[cfg(feature = "python-bindings")]
#[pyclass(module = "rust_doa.music", unsendable)]
pub struct Music {
    pub inner: MusicEstimator<UniformLinearArray, EigenSeparator>,
}

#[cfg(feature = "python-bindings")]
#[pymethods]
impl Music {
    #[new]
    #[pyo3(
        signature = (
            sensors,
            field_type = "far",
            estimation_target = "angle",
            spacing = 0.5,
            wavelength = 1.0,
            angle_range = 60.0,
            angle_resolution = 1.0,
            range_resolution = 0.5,
            max_range_ratio = 0.5,
            peak_window = 21,
            cell_coefficient = 0.2,
            eigen_threshold = 0.05,
            seed = None,
        ),
        text_signature = "(sensors, /, field_type='far', estimation_target='angle', \
                          spacing=0.5, wavelength=1.0, angle_range=60.0, \
                          angle_resolution=1.0, range_resolution=0.5, max_range_ratio=0.5, \
                          peak_window=21, cell_coefficient=0.2, eigen_threshold=0.05, seed=None)"
    )]
    pub fn new(
        sensors: usize, field_type: &str, estimation_target: &str, spacing: f64, wavelength: f64,
        angle_range: f64, angle_resolution: f64, range_resolution: f64, max_range_ratio: f64,
        peak_window: usize, cell_coefficient: f64, eigen_threshold: f64, seed: Option<u64>,
    ) -> PyResult<Self> {
        let inner = build_music_estimator(
            sensors,
            field_type,
            estimation_target,
            spacing,
            wavelength,
            angle_range,
            angle_resolution,
            range_resolution,
            max_range_ratio,
            peak_window,
            cell_coefficient,
            eigen_threshold,
            seed,
        )?;
        Ok(Music { inner })
    }

    /// Estimate source parameters; returns a dict of numpy arrays with keys
    /// among `angles`, `ranges`, `source_estimation`, `eigen_regularization`.
    #[pyo3(
        signature = (
            covariance,
            number_of_sources,
            known_angles = None,
            known_distances = None,
            soft = false,
        )
    )]
    pub fn estimate<'py>(
        &mut self, py: Python<'py>, covariance: &Bound<'py, PyAny>, number_of_sources: usize,
        known_angles: Option<&Bound<'py, PyAny>>, known_distances: Option<&Bound<'py, PyAny>>,
        soft: bool,
    ) -> PyResult<Bound<'py, PyDict>> {
        let cov = extract_covariance(covariance)?;
        let angles = known_angles.map(extract_f64_matrix).transpose()?;
        let distances = known_distances.map(extract_f64_matrix).transpose()?;
        let mode = if soft { PeakMode::Soft } else { PeakMode::Hard };
        let out = self.inner.estimate(
            cov.view(),
            number_of_sources,
            angles.as_ref().map(|a| a.view()),
            distances.as_ref().map(|d| d.view()),
            mode,
        )?;

        let dict = PyDict::new(py);
        match out.parameters {
            ParameterEstimate::Angles(a) => dict.set_item("angles", a.into_pyarray(py))?,
            ParameterEstimate::Ranges(r) => dict.set_item("ranges", r.into_pyarray(py))?,
            ParameterEstimate::AnglesRanges { angles, ranges } => {
                dict.set_item("angles", angles.into_pyarray(py))?;
                dict.set_item("ranges", ranges.into_pyarray(py))?;
            }
        }
        if let Some(est) = out.source_estimation {
            dict.set_item("source_estimation", est.into_pyarray(py))?;
        }
        if let Some(reg) = out.eigen_regularization {
            dict.set_item("eigen_regularization", reg.into_pyarray(py))?;
        }
        Ok(dict)
    }

    pub fn shrink_cell_size(&mut self) {
        self.inner.shrink_cell_size();
    }

    pub fn rebuild_grid(&mut self) -> PyResult<()> {
        Ok(self.inner.rebuild_grid()?)
    }

    pub fn resize_array(&mut self, sensors: usize) -> PyResult<()> {
        Ok(self.inner.resize_array(sensors)?)
    }

    #[getter]
    pub fn name(&self) -> String {
        self.inner.to_string()
    }

    #[getter]
    pub fn angle_grid(&self) -> Option<Vec<f64>> {
        self.inner.grid().angles().map(|a| a.to_vec())
    }

    #[getter]
    pub fn range_grid(&self) -> Option<Vec<f64>> {
        self.inner.grid().ranges().map(|r| r.to_vec())
    }
}

/// music — register the MUSIC submodule classes.
#[cfg(feature = "python-bindings")]
fn music<'py>(
    _py: Python<'py>, rust_doa: &Bound<'py, PyModule>, m: &Bound<'py, PyModule>,
) -> PyResult<()> {
    m.add_class::<Music>()?;
    rust_doa.add_submodule(m)?;
    Ok(())
}

/// _rust_doa — PyO3 module initializer for the Python extension.
///
/// Creates the `music` submodule, attaches it to `_rust_doa`, and registers
/// it in `sys.modules` so it is importable via a dotted path.
#[cfg(feature = "python-bindings")]
#[pymodule]
fn _rust_doa<'py>(_py: Python<'py>, m: &Bound<'py, PyModule>) -> PyResult<()> {
    let music_mod = PyModule::new(_py, "music")?;
    music(_py, m, &music_mod)?;

    // Manually add the submodule into sys.modules to allow for dot notation.
    _py.import("sys")?.getattr("modules")?.set_item("rust_doa.music", music_mod)?;
    Ok(())
}
