//! models — the stateful MUSIC estimator.
//!
//! [`MusicEstimator`] owns the grid, steering dictionary, cell sizes, and
//! padding generator, and exposes `estimate`, `evaluate`, and the grid and
//! cell mutators. Results are returned as [`Estimation`] and
//! [`EvaluationOutcome`].

pub mod music;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::music::{
    Estimation, EvaluationBatch, EvaluationLoss, EvaluationOutcome, MusicEstimator,
    ParameterEstimate, SoftTrace,
};

pub mod prelude {
    pub use super::music::{
        Estimation, EvaluationBatch, EvaluationOutcome, MusicEstimator, ParameterEstimate,
    };
}
