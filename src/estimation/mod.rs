//! estimation — MUSIC direction-of-arrival and range estimation stack.
//!
//! Purpose
//! -------
//! Provide the MUSIC subspace estimator for far-field angle estimation and
//! near-field angle, range, and joint angle-range estimation, together with
//! its configuration types, numerical primitives, and error surface.
//!
//! Key behaviors
//! -------------
//! - [`core`] holds the grid builder, steering dictionaries, spectrum
//!   evaluator, hard and soft peak extractors, and cell sizes.
//! - [`models`] wires them into [`MusicEstimator`], which takes a covariance
//!   batch plus a source count and returns parameter estimates, the
//!   separator's source-count estimate and regularization term, the spectra,
//!   and (in soft mode) the softmax windows needed for gradients.
//! - [`errors`] centralizes [`MusicError`] / [`MusicResult`] and the coarse
//!   [`ErrorKind`] taxonomy.
//!
//! Invariants & assumptions
//! ------------------------
//! - Covariances are `batch × N × N`, finite, and paired with `1 <= M < N`.
//! - Far field only supports angle estimation.
//! - The estimator is single-owner; estimation mutates padding state and
//!   evaluation counters.
//!
//! Conventions
//! -----------
//! - Angles in radians; ranges in the array wavelength's unit.
//! - Array geometry and subspace separation are collaborators
//!   (`collaborators::array::ArrayModel`,
//!   `collaborators::subspace::SubspaceSeparator`) supplied by the caller.
//!
//! Downstream usage
//! ----------------
//! - Typical flow:
//!   1. Build an array model and a separator.
//!   2. Choose a [`FieldType`], an [`EstimationTarget`], and [`MusicOptions`].
//!   3. Construct `MusicEstimator::new(array, separator, field, target, options)`.
//!   4. Call `estimate(covariance, sources, known_angles, known_distances, mode)`
//!      or `evaluate(&batch)`.
//!   5. Between training epochs, call `shrink_cell_size()`; after geometry
//!      changes, `resize_array(n)` or `rebuild_grid()`.
//!
//! Testing notes
//! -------------
//! - Unit tests live beside each submodule; `tests/integration_music_pipeline.rs`
//!   runs simulated end-to-end scenarios.

pub mod core;
pub mod errors;
pub mod models;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::core::{
    CellSize, EstimationTarget, FieldType, GridOptions, MusicOptions, MusicSpectrum,
    PaddingPolicy, PeakMode, PeakOptions, SearchGrid, SteeringDictionary,
};

pub use self::errors::{ErrorKind, MusicError, MusicResult};

pub use self::models::{
    Estimation, EvaluationBatch, EvaluationLoss, EvaluationOutcome, MusicEstimator,
    ParameterEstimate, SoftTrace,
};

// ---- Optional convenience prelude for downstream crates -------------------
//
// Downstream crates can write
//
//     use rust_doa::estimation::prelude::*;
//
// to import the main estimation surface in a single line, without pulling in
// lower-level internals.

pub mod prelude {
    pub use super::{
        CellSize, ErrorKind, Estimation, EstimationTarget, EvaluationBatch, EvaluationLoss,
        EvaluationOutcome, FieldType, GridOptions, MusicError, MusicEstimator, MusicOptions,
        MusicResult, MusicSpectrum, PaddingPolicy, ParameterEstimate, PeakMode, PeakOptions,
        SearchGrid, SoftTrace,
    };
}
