//! core — MUSIC grid, steering, spectrum, and peak-extraction primitives.
//!
//! Purpose
//! -------
//! Collect the building blocks the estimator composes: configuration parsing
//! and options, the search grid and its steering dictionary, the spectrum
//! evaluator, hard and soft peak extraction, and soft-localizer cell sizes.
//!
//! Key behaviors
//! -------------
//! - Parse field types and estimation targets once into closed enums
//!   ([`FieldType`], [`EstimationTarget`]) and validate their pairing.
//! - Build the angle/range search grid ([`build_search_grid`]) and the
//!   matching steering dictionary ([`build_dictionary`], per-item variants).
//! - Evaluate inverse and MUSIC spectra for line and surface dictionaries,
//!   with a batched/iterative surface strategy ([`inverse_spectrum`]).
//! - Extract top-k peaks in 1D and 2D ([`find_top_k_1d`], [`find_top_k_2d`])
//!   and refine them with windowed softmax ([`soft_localize_1d`],
//!   [`soft_localize_2d`]).
//!
//! Invariants & assumptions
//! ------------------------
//! - Angles are radians, ranges share the wavelength's length unit.
//! - Grids are finite and non-empty once built; steering dictionaries are
//!   checked for finiteness at construction.
//! - Soft windows and cell sizes are always odd.
//!
//! Conventions
//! -----------
//! - Batch is the leading axis of every per-call tensor.
//! - Surface tensors are laid out `angles × ranges` (rows are angles).
//! - The only logging is `tracing::warn!` / `tracing::debug!` at fallback
//!   points (peak padding, iterative projection).
//!
//! Testing notes
//! -------------
//! - Each submodule carries unit tests for its own contracts; the estimator
//!   and the integration tests exercise the composition.

pub mod cells;
pub mod field;
pub mod grid;
pub mod options;
pub mod peaks;
pub mod soft;
pub mod spectrum;
pub mod steering;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::cells::{ANGLE_CELL_DECAY, CellSize, RANGE_CELL_DECAY};
pub use self::field::{EstimationTarget, FieldType, PeakMode, validate_pair};
pub use self::grid::{SearchGrid, build_search_grid};
pub use self::options::{GridOptions, MusicOptions, PaddingPolicy, PeakOptions};
pub use self::peaks::{PeakPadder, find_top_k_1d, find_top_k_2d};
pub use self::soft::{SoftWindow1d, SoftWindow2d, soft_localize_1d, soft_localize_2d};
pub use self::spectrum::{
    MusicSpectrum, ProjectionStrategy, SPECTRUM_EPS, aggregate_spectrum, inverse_spectrum,
    music_spectrum, surface_inverse_spectrum,
};
pub use self::steering::{
    SteeringDictionary, build_dictionary, per_item_angle_dictionary, per_item_range_dictionary,
};

// ---- Optional convenience prelude for downstream crates -------------------
//
// Downstream crates can write
//
//     use rust_doa::estimation::core::prelude::*;
//
// to import the main MUSIC core surface in a single line.

pub mod prelude {
    pub use super::cells::CellSize;
    pub use super::field::{EstimationTarget, FieldType, PeakMode};
    pub use super::grid::SearchGrid;
    pub use super::options::{GridOptions, MusicOptions, PaddingPolicy, PeakOptions};
    pub use super::spectrum::MusicSpectrum;
    pub use super::steering::SteeringDictionary;
}
