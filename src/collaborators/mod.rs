//! collaborators — array models, subspace separation, and evaluation losses.
//!
//! The estimator consumes these through traits ([`ArrayModel`],
//! [`SubspaceSeparator`]) and concrete loss types. Reference
//! implementations are provided for a uniform linear array
//! ([`UniformLinearArray`]) and an eigen-decomposition separator
//! ([`EigenSeparator`]), plus [`sample_covariance`] for raw snapshots.

pub mod array;
pub mod covariance;
pub mod loss;
pub mod subspace;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::array::{ArrayModel, UniformLinearArray};
pub use self::covariance::sample_covariance;
pub use self::loss::{CartesianLoss, Criterion, RmspeLoss, SeparatedRmspe};
pub use self::subspace::{
    DEFAULT_EIGEN_THRESHOLD, EigenSeparator, ModelOrder, Separation, SubspaceSeparator,
    aic_source_count, mdl_source_count,
};
