#[cfg(feature = "python-bindings")]
use ndarray::{Array2, Array3, Axis};

#[cfg(feature = "python-bindings")]
use num_complex::Complex64;

#[cfg(feature = "python-bindings")]
use pyo3::{exceptions::PyTypeError, prelude::*, types::PyAny};

#[cfg(feature = "python-bindings")]
use numpy::{PyReadonlyArray1, PyReadonlyArray2, PyReadonlyArray3};

#[cfg(feature = "python-bindings")]
use crate::{
    collaborators::{
        array::UniformLinearArray,
        subspace::{EigenSeparator, ModelOrder},
    },
    estimation::{
        core::{
            field::{EstimationTarget, FieldType},
            options::{GridOptions, MusicOptions, PaddingPolicy, PeakOptions},
        },
        models::music::MusicEstimator,
    },
};

/// Covariance batch from a complex128 array of shape `(N, N)` or
/// `(batch, N, N)`.
#[cfg(feature = "python-bindings")]
pub fn extract_covariance<'py>(raw: &Bound<'py, PyAny>) -> PyResult<Array3<Complex64>> {
    if let Ok(arr) = raw.extract::<PyReadonlyArray3<Complex64>>() {
        return Ok(arr.as_array().to_owned());
    }
    if let Ok(arr) = raw.extract::<PyReadonlyArray2<Complex64>>() {
        return Ok(arr.as_array().to_owned().insert_axis(Axis(0)));
    }
    if let Ok(obj) = raw.call_method("to_numpy", (false,), None) {
        if let Ok(arr) = obj.extract::<PyReadonlyArray3<Complex64>>() {
            return Ok(arr.as_array().to_owned());
        }
    }
    Err(PyTypeError::new_err("expected a complex128 numpy.ndarray of shape (N, N) or (batch, N, N)"))
}

/// Known-parameter matrix `(batch, columns)`; 1-D input is one column.
#[cfg(feature = "python-bindings")]
pub fn extract_f64_matrix<'py>(raw: &Bound<'py, PyAny>) -> PyResult<Array2<f64>> {
    if let Ok(arr) = raw.extract::<PyReadonlyArray2<f64>>() {
        return Ok(arr.as_array().to_owned());
    }
    if let Ok(arr) = raw.extract::<PyReadonlyArray1<f64>>() {
        return Ok(arr.as_array().to_owned().insert_axis(Axis(1)));
    }
    let rows: Vec<Vec<f64>> = raw.extract().map_err(|_| {
        PyTypeError::new_err("expected a 1-D or 2-D numpy.ndarray or nested sequence of float64")
    })?;
    let cols = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|r| r.len() != cols) {
        return Err(PyTypeError::new_err("nested sequences must have equal lengths"));
    }
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    let n = flat.len().checked_div(cols).unwrap_or(0);
    Array2::from_shape_vec((n, cols), flat)
        .map_err(|e| PyTypeError::new_err(format!("invalid matrix shape: {e}")))
}

/// Build a ULA + eigen-separator estimator from Python keyword arguments.
#[cfg(feature = "python-bindings")]
pub fn build_music_estimator(
    sensors: usize, field_type: &str, estimation_target: &str, spacing: f64, wavelength: f64,
    angle_range: f64, angle_resolution: f64, range_resolution: f64, max_range_ratio: f64,
    peak_window: usize, cell_coefficient: f64, eigen_threshold: f64, seed: Option<u64>,
) -> PyResult<MusicEstimator<UniformLinearArray, EigenSeparator>> {
    let field: FieldType = field_type.parse()?;
    let target: EstimationTarget = estimation_target.parse()?;
    let array = UniformLinearArray::new(sensors, spacing, wavelength)?;
    let separator = EigenSeparator::new(ModelOrder::Threshold, eigen_threshold)?;
    let grid = GridOptions::new(angle_range, angle_resolution, range_resolution, max_range_ratio)?;
    let padding = seed.map_or(PaddingPolicy::Deterministic, PaddingPolicy::Seeded);
    let peaks = PeakOptions::new(peak_window, padding)?;
    let options = MusicOptions::new(
        grid,
        peaks,
        cell_coefficient,
        crate::estimation::core::options::DEFAULT_MAX_BATCHED_BYTES,
    )?;
    Ok(MusicEstimator::new(array, separator, field, target, options)?)
}
