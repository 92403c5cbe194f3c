//! Errors for MUSIC localization (configuration, grid construction, numerics,
//! input shapes, memory pressure, and collaborator failures).
//!
//! This module defines the estimator error type, [`MusicError`], used across the
//! Python-facing API and the internal Rust core. It implements `Display`/`Error`
//! and converts to `PyErr` when the `python-bindings` feature is enabled.
//!
//! ## Conventions
//! - **Indices are 0-based** (batch item, grid index, sensor index).
//! - Angles are carried in **radians**; ranges in the same length unit as the
//!   array wavelength.
//! - Failures raised by external collaborators (array model, subspace
//!   separator) arrive as `anyhow::Error` and are normalized to
//!   [`MusicError::Anyhow`] with the rendered message.
//! - [`MusicError::kind`] groups variants into the coarse [`ErrorKind`]
//!   taxonomy callers usually branch on.
#[cfg(feature = "python-bindings")]
use pyo3::{exceptions::PyValueError, prelude::*};
use statrs::distribution::NormalError;

/// Crate-wide result alias for MUSIC operations that may produce [`MusicError`].
pub type MusicResult<T> = Result<T, MusicError>;

/// Coarse error taxonomy.
///
/// - `Configuration`: invalid construction-time settings; fatal at setup.
/// - `Numerical`: non-finite steering or spectrum values; fatal for the call.
/// - `Resource`: memory pressure the iterative fallback could not absorb.
/// - `Input`: shape or content problems with per-call inputs.
/// - `Collaborator`: failures reported by the array model or separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Numerical,
    Resource,
    Input,
    Collaborator,
}

/// Unified error type for MUSIC estimation.
///
/// Covers configuration parsing and validation, search-grid construction,
/// numerical guards on steering vectors and spectra, per-call input checks,
/// memory exhaustion, and collaborator failures. Implements `Display`/`Error`
/// and converts to a Python `ValueError` at PyO3 boundaries.
#[derive(Debug, Clone, PartialEq)]
pub enum MusicError {
    // ---- Configuration ----
    /// Field type string is not one of "far", "near", "full".
    UnknownFieldType { name: String },

    /// Estimation target string is not one of "angle", "range", "angle, range".
    UnknownEstimationTarget { name: String },

    /// Far field only supports angle estimation.
    UnsupportedTarget { field: &'static str, target: &'static str },

    /// Angle half-range must be finite and in [0, 90] degrees.
    InvalidAngleRange { value: f64 },

    /// A grid resolution must be finite and > 0.
    InvalidResolution { name: &'static str, value: f64 },

    /// Maximum range ratio must be finite and in (0, 1].
    InvalidRangeRatio { value: f64 },

    /// Peak window for 2D extraction must be odd and >= 1.
    InvalidPeakWindow { size: usize },

    /// Cell coefficient must be finite and in (0, 1].
    InvalidCellCoefficient { value: f64 },

    /// Eigenvalue threshold must be finite and in (0, 1).
    InvalidEigenThreshold { value: f64 },

    /// Loss balance factor must be in [0, 1].
    InvalidBalanceFactor { value: f64 },

    /// Array geometry parameters must be finite and > 0.
    InvalidArrayGeometry { name: &'static str, value: f64 },

    /// Arrays need at least two sensors.
    TooFewSensors { sensors: usize },

    // ---- Search grid ----
    /// Range grid bounds collapse (lower >= upper).
    InvalidGrid { lower: f64, upper: f64 },

    // ---- Numerics ----
    /// Steering dictionary holds a NaN/±inf entry.
    NonFiniteSteering { index: usize },

    /// Inverse spectrum holds a NaN/±inf entry.
    NonFiniteSpectrum { batch: usize, index: usize, value: f64 },

    /// Covariance input holds a NaN/±inf entry.
    NonFiniteCovariance { batch: usize },

    // ---- Inputs ----
    /// Batch dimension is empty.
    EmptyBatch,

    /// Two arrays that must agree in one dimension do not.
    ShapeMismatch { what: &'static str, expected: usize, actual: usize },

    /// Number of sources must satisfy 1 <= M < sensors.
    InvalidSourceCount { sources: usize, sensors: usize },

    /// Range-only estimation needs per-sample known angles.
    MissingKnownAngles,

    /// Range or angle-range evaluation needs range labels.
    MissingRangeLabels,

    /// A batch mixes different source counts.
    MixedSourceCounts { first: usize, other: usize },

    // ---- Resources ----
    /// Neither the batched nor the per-item projection buffer could be allocated.
    ResourceExhausted { bytes: usize },

    // ---- Distributions ----
    /// Wrapper for statrs::distribution::NormalError.
    InvalidNoiseLevel,

    // ---- Collaborators ----
    /// Failure reported by an external collaborator.
    Anyhow(String),
}

impl MusicError {
    /// Map the variant to its [`ErrorKind`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            MusicError::UnknownFieldType { .. }
            | MusicError::UnknownEstimationTarget { .. }
            | MusicError::UnsupportedTarget { .. }
            | MusicError::InvalidAngleRange { .. }
            | MusicError::InvalidResolution { .. }
            | MusicError::InvalidRangeRatio { .. }
            | MusicError::InvalidPeakWindow { .. }
            | MusicError::InvalidCellCoefficient { .. }
            | MusicError::InvalidEigenThreshold { .. }
            | MusicError::InvalidBalanceFactor { .. }
            | MusicError::InvalidArrayGeometry { .. }
            | MusicError::TooFewSensors { .. }
            | MusicError::InvalidGrid { .. }
            | MusicError::InvalidNoiseLevel => ErrorKind::Configuration,
            MusicError::NonFiniteSteering { .. }
            | MusicError::NonFiniteSpectrum { .. }
            | MusicError::NonFiniteCovariance { .. } => ErrorKind::Numerical,
            MusicError::EmptyBatch
            | MusicError::ShapeMismatch { .. }
            | MusicError::InvalidSourceCount { .. }
            | MusicError::MissingKnownAngles
            | MusicError::MissingRangeLabels
            | MusicError::MixedSourceCounts { .. } => ErrorKind::Input,
            MusicError::ResourceExhausted { .. } => ErrorKind::Resource,
            MusicError::Anyhow(_) => ErrorKind::Collaborator,
        }
    }
}

impl std::error::Error for MusicError {}

impl std::fmt::Display for MusicError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Configuration ----
            MusicError::UnknownFieldType { name } => {
                write!(f, "Unknown field type '{name}'; expected one of: far, near, full.")
            }
            MusicError::UnknownEstimationTarget { name } => {
                write!(
                    f,
                    "Unknown estimation target '{name}'; expected one of: angle, range, angle, range."
                )
            }
            MusicError::UnsupportedTarget { field, target } => {
                write!(f, "Estimation target '{target}' is not supported in the {field} field.")
            }
            MusicError::InvalidAngleRange { value } => {
                write!(f, "Angle range must be finite and within [0, 90] degrees; got: {value}")
            }
            MusicError::InvalidResolution { name, value } => {
                write!(f, "{name} must be finite and > 0; got: {value}")
            }
            MusicError::InvalidRangeRatio { value } => {
                write!(f, "Maximum range ratio must be finite and in (0, 1]; got: {value}")
            }
            MusicError::InvalidPeakWindow { size } => {
                write!(f, "Peak window must be odd and >= 1; got: {size}")
            }
            MusicError::InvalidCellCoefficient { value } => {
                write!(f, "Cell coefficient must be finite and in (0, 1]; got: {value}")
            }
            MusicError::InvalidEigenThreshold { value } => {
                write!(f, "Eigenvalue threshold must be finite and in (0, 1); got: {value}")
            }
            MusicError::InvalidBalanceFactor { value } => {
                write!(f, "Loss balance factor must be within [0, 1]; got: {value}")
            }
            MusicError::InvalidArrayGeometry { name, value } => {
                write!(f, "Array {name} must be finite and > 0; got: {value}")
            }
            MusicError::TooFewSensors { sensors } => {
                write!(f, "Array needs at least two sensors; got: {sensors}")
            }
            // ---- Search grid ----
            MusicError::InvalidGrid { lower, upper } => {
                write!(f, "Range grid is empty: lower bound {lower} >= upper bound {upper}.")
            }
            // ---- Numerics ----
            MusicError::NonFiniteSteering { index } => {
                write!(f, "Steering dictionary holds a non-finite entry at flat index {index}.")
            }
            MusicError::NonFiniteSpectrum { batch, index, value } => {
                write!(
                    f,
                    "Inverse spectrum is non-finite at batch item {batch}, grid index {index}: {value}"
                )
            }
            MusicError::NonFiniteCovariance { batch } => {
                write!(f, "Covariance of batch item {batch} holds non-finite entries.")
            }
            // ---- Inputs ----
            MusicError::EmptyBatch => {
                write!(f, "Input batch is empty.")
            }
            MusicError::ShapeMismatch { what, expected, actual } => {
                write!(f, "Shape mismatch for {what}: expected {expected}, got {actual}")
            }
            MusicError::InvalidSourceCount { sources, sensors } => {
                write!(
                    f,
                    "Number of sources must satisfy 1 <= M < N; got M = {sources}, N = {sensors}"
                )
            }
            MusicError::MissingKnownAngles => {
                write!(f, "Range estimation requires known per-sample angles.")
            }
            MusicError::MissingRangeLabels => {
                write!(f, "Range labels are required to evaluate this estimation target.")
            }
            MusicError::MixedSourceCounts { first, other } => {
                write!(
                    f,
                    "All batch items must share one source count; found {first} and {other}."
                )
            }
            // ---- Resources ----
            MusicError::ResourceExhausted { bytes } => {
                write!(f, "Could not allocate {bytes} bytes for the subspace projection.")
            }
            // ---- Distributions ----
            MusicError::InvalidNoiseLevel => {
                write!(f, "Normal distribution requires a finite, positive standard deviation.")
            }
            // ---- Collaborators ----
            MusicError::Anyhow(msg) => {
                write!(f, "Collaborator failure: {msg}")
            }
        }
    }
}

/// Convert a [`MusicError`] into a Python `ValueError` with the error message.
#[cfg(feature = "python-bindings")]
impl std::convert::From<MusicError> for PyErr {
    fn from(err: MusicError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

impl From<anyhow::Error> for MusicError {
    fn from(err: anyhow::Error) -> MusicError {
        MusicError::Anyhow(format!("{err:#}"))
    }
}

impl From<NormalError> for MusicError {
    fn from(_: NormalError) -> MusicError {
        MusicError::InvalidNoiseLevel
    }
}
