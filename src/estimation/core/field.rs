//! Field regimes, estimation targets, and peak-extraction modes.
//!
//! Purpose
//! -------
//! Parse the string-valued configuration knobs of the estimator into closed
//! enums once, at construction time, so every downstream branch is an
//! exhaustive `match` instead of repeated string comparisons.
//!
//! Key behaviors
//! -------------
//! - [`FieldType`] distinguishes the far-field (plane-wave) regime from the
//!   near/full-field (spherical-wave) regime. `Near` and `Full` behave the same
//!   inside the estimator.
//! - [`EstimationTarget`] selects which parameters are estimated.
//! - [`validate_pair`] rejects combinations the far field cannot support.
//! - [`PeakMode`] is passed explicitly on every estimation call.
//!
//! Conventions
//! -----------
//! - Parsing is case-insensitive and trims surrounding whitespace.
//! - Invalid strings produce configuration errors, never panics.
use crate::estimation::errors::{MusicError, MusicResult};
use std::{fmt, str::FromStr};

/// Propagation regime assumed by the steering model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Plane-wave model; angles only.
    Far,
    /// Spherical-wave model between the Fresnel and Fraunhofer distances.
    Near,
    /// Mixed scenes; handled with the near-field model.
    Full,
}

impl FieldType {
    /// `true` for the spherical-wave regimes (`Near`, `Full`).
    pub fn is_near(self) -> bool {
        matches!(self, FieldType::Near | FieldType::Full)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Far => "far",
            FieldType::Near => "near",
            FieldType::Full => "full",
        }
    }
}

impl FromStr for FieldType {
    type Err = MusicError;

    fn from_str(s: &str) -> MusicResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "far" => Ok(FieldType::Far),
            "near" => Ok(FieldType::Near),
            "full" => Ok(FieldType::Full),
            _ => Err(MusicError::UnknownFieldType { name: s.to_string() }),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which source parameters the estimator recovers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EstimationTarget {
    /// Directions of arrival.
    Angle,
    /// Ranges along known per-sample directions.
    Range,
    /// Joint direction and range.
    AngleRange,
}

impl EstimationTarget {
    /// `true` when the target includes an angle axis.
    pub fn has_angle(self) -> bool {
        matches!(self, EstimationTarget::Angle | EstimationTarget::AngleRange)
    }

    /// `true` when the target includes a range axis.
    pub fn has_range(self) -> bool {
        matches!(self, EstimationTarget::Range | EstimationTarget::AngleRange)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EstimationTarget::Angle => "angle",
            EstimationTarget::Range => "range",
            EstimationTarget::AngleRange => "angle, range",
        }
    }

    /// Short estimator name used in logs and file names.
    pub fn estimator_name(self) -> &'static str {
        match self {
            EstimationTarget::Angle => "music_angle",
            EstimationTarget::Range => "music_range",
            EstimationTarget::AngleRange => "2d_music",
        }
    }
}

impl FromStr for EstimationTarget {
    type Err = MusicError;

    fn from_str(s: &str) -> MusicResult<Self> {
        let normalized: String =
            s.trim().to_ascii_lowercase().chars().filter(|c| !c.is_whitespace()).collect();
        match normalized.as_str() {
            "angle" => Ok(EstimationTarget::Angle),
            "range" => Ok(EstimationTarget::Range),
            "angle,range" | "angle_range" | "angle-range" => Ok(EstimationTarget::AngleRange),
            _ => Err(MusicError::UnknownEstimationTarget { name: s.to_string() }),
        }
    }
}

impl fmt::Display for EstimationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Peak-extraction mode, chosen per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeakMode {
    /// Discrete local-maximum search; grid-quantized estimates.
    #[default]
    Hard,
    /// Windowed-softmax refinement; continuous, differentiable estimates.
    Soft,
}

/// Reject field/target combinations the steering model cannot express.
///
/// Errors
/// ------
/// - `MusicError::UnsupportedTarget` when the far field is paired with a
///   target that includes range.
pub fn validate_pair(field: FieldType, target: EstimationTarget) -> MusicResult<()> {
    if field == FieldType::Far && target.has_range() {
        return Err(MusicError::UnsupportedTarget {
            field: field.as_str(),
            target: target.as_str(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Case-insensitive parsing of field types and targets, including the
    //   accepted spellings of the joint target.
    // - Rejection of unknown strings and unsupported far-field pairs.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Verify the accepted spellings for field types and targets.
    //
    // Given
    // -----
    // - Mixed-case strings with surrounding whitespace.
    //
    // Expect
    // ------
    // - Each parses to the matching variant.
    fn parse_accepts_documented_spellings() {
        // Arrange / Act / Assert
        assert_eq!(" Far ".parse::<FieldType>().unwrap(), FieldType::Far);
        assert_eq!("NEAR".parse::<FieldType>().unwrap(), FieldType::Near);
        assert_eq!("full".parse::<FieldType>().unwrap(), FieldType::Full);
        assert_eq!("angle".parse::<EstimationTarget>().unwrap(), EstimationTarget::Angle);
        assert_eq!("Range".parse::<EstimationTarget>().unwrap(), EstimationTarget::Range);
        assert_eq!(
            "angle, range".parse::<EstimationTarget>().unwrap(),
            EstimationTarget::AngleRange
        );
        assert_eq!(
            "angle_range".parse::<EstimationTarget>().unwrap(),
            EstimationTarget::AngleRange
        );
    }

    #[test]
    // Purpose
    // -------
    // Ensure unknown strings surface as configuration errors.
    //
    // Given
    // -----
    // - "mid" as field type and "elevation" as target.
    //
    // Expect
    // ------
    // - `UnknownFieldType` / `UnknownEstimationTarget` carrying the input.
    fn parse_rejects_unknown_strings() {
        // Act
        let field_err = "mid".parse::<FieldType>().unwrap_err();
        let target_err = "elevation".parse::<EstimationTarget>().unwrap_err();

        // Assert
        match field_err {
            MusicError::UnknownFieldType { name } => assert_eq!(name, "mid"),
            other => panic!("expected UnknownFieldType, got {other:?}"),
        }
        match target_err {
            MusicError::UnknownEstimationTarget { name } => assert_eq!(name, "elevation"),
            other => panic!("expected UnknownEstimationTarget, got {other:?}"),
        }
    }

    #[test]
    // Purpose
    // -------
    // Check the far field only admits angle estimation.
    //
    // Given
    // -----
    // - Far field paired with each target.
    //
    // Expect
    // ------
    // - Angle passes; range and angle-range fail with `UnsupportedTarget`.
    fn validate_pair_limits_far_field_to_angles() {
        // Act / Assert
        assert!(validate_pair(FieldType::Far, EstimationTarget::Angle).is_ok());
        assert!(validate_pair(FieldType::Near, EstimationTarget::Range).is_ok());
        for target in [EstimationTarget::Range, EstimationTarget::AngleRange] {
            match validate_pair(FieldType::Far, target) {
                Err(MusicError::UnsupportedTarget { field, .. }) => assert_eq!(field, "far"),
                other => panic!("expected UnsupportedTarget, got {other:?}"),
            }
        }
    }
}
