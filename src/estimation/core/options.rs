//! MUSIC options — configuration for grid construction, peak extraction, and
//! memory behavior.
//!
//! Purpose
//! -------
//! Collect the estimator's configuration knobs in one place so construction is
//! explicit and reproducible. Each component is validated by its own builder;
//! [`MusicOptions`] only bundles them.
//!
//! Key behaviors
//! -------------
//! - [`GridOptions`] carries the angular half-range and resolution (degrees),
//!   the range resolution, and the fraction of the Fraunhofer distance the
//!   range grid may reach.
//! - [`PeakOptions`] carries the 2D maximum-filter window and the
//!   [`PaddingPolicy`] applied when fewer peaks than sources are found.
//! - [`MusicOptions`] adds the initial cell coefficient for the soft
//!   localizer and the byte budget for the batched projection.
//!
//! Invariants & assumptions
//! ------------------------
//! - Angular half-range in `[0, 90]` degrees; resolutions finite and > 0.
//! - Maximum range ratio in `(0, 1]`.
//! - Peak window odd and ≥ 1.
//! - Cell coefficient in `(0, 1]`.
//!
//! Conventions
//! -----------
//! - Angles are configured in degrees and converted to radians by the grid
//!   builder. Ranges use the array's length unit.
//! - Invalid settings are rejected with configuration errors; builders never
//!   panic.
//!
//! Testing notes
//! -------------
//! - Unit tests check each validation branch and the documented defaults.
use crate::estimation::errors::{MusicError, MusicResult};

/// Default angular half-range in degrees.
pub const DEFAULT_ANGLE_RANGE_DEG: f64 = 60.0;
/// Default angular resolution in degrees.
pub const DEFAULT_ANGLE_RESOLUTION_DEG: f64 = 1.0;
/// Default range resolution in array length units.
pub const DEFAULT_RANGE_RESOLUTION: f64 = 0.5;
/// Default fraction of the Fraunhofer distance covered by the range grid.
pub const DEFAULT_MAX_RANGE_RATIO: f64 = 0.5;
/// Default side length of the 2D maximum filter.
pub const DEFAULT_PEAK_WINDOW: usize = 21;
/// Default fraction of the grid length used for initial soft-localizer cells.
pub const DEFAULT_CELL_COEFFICIENT: f64 = 0.2;
/// Default byte budget for materializing the batched surface projection.
pub const DEFAULT_MAX_BATCHED_BYTES: usize = 1 << 30;

/// GridOptions — validated search-grid configuration.
///
/// Fields
/// ------
/// - `angle_range_deg`: half-range of the angle grid; the grid covers
///   `[-angle_range_deg, +angle_range_deg]`.
/// - `angle_resolution_deg`: angular resolution; the grid step is half of it.
/// - `range_resolution`: range resolution; the grid step is half of it.
/// - `max_range_ratio`: fraction of the Fraunhofer distance the range grid may
///   reach (plus half a resolution step).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridOptions {
    pub angle_range_deg: f64,
    pub angle_resolution_deg: f64,
    pub range_resolution: f64,
    pub max_range_ratio: f64,
}

impl GridOptions {
    /// Construct validated grid options.
    ///
    /// Errors
    /// ------
    /// - `MusicError::InvalidAngleRange` when the half-range is non-finite or
    ///   outside `[0, 90]`.
    /// - `MusicError::InvalidResolution` for a non-finite or non-positive
    ///   angle or range resolution.
    /// - `MusicError::InvalidRangeRatio` when the ratio is outside `(0, 1]`.
    pub fn new(
        angle_range_deg: f64, angle_resolution_deg: f64, range_resolution: f64,
        max_range_ratio: f64,
    ) -> MusicResult<Self> {
        if !angle_range_deg.is_finite() || !(0.0..=90.0).contains(&angle_range_deg) {
            return Err(MusicError::InvalidAngleRange { value: angle_range_deg });
        }
        if !angle_resolution_deg.is_finite() || angle_resolution_deg <= 0.0 {
            return Err(MusicError::InvalidResolution {
                name: "Angle resolution",
                value: angle_resolution_deg,
            });
        }
        if !range_resolution.is_finite() || range_resolution <= 0.0 {
            return Err(MusicError::InvalidResolution {
                name: "Range resolution",
                value: range_resolution,
            });
        }
        if !max_range_ratio.is_finite() || max_range_ratio <= 0.0 || max_range_ratio > 1.0 {
            return Err(MusicError::InvalidRangeRatio { value: max_range_ratio });
        }
        Ok(GridOptions { angle_range_deg, angle_resolution_deg, range_resolution, max_range_ratio })
    }

    /// Re-run the [`GridOptions::new`] checks on an existing value.
    pub fn validate(&self) -> MusicResult<()> {
        GridOptions::new(
            self.angle_range_deg,
            self.angle_resolution_deg,
            self.range_resolution,
            self.max_range_ratio,
        )
        .map(|_| ())
    }
}

impl Default for GridOptions {
    fn default() -> Self {
        GridOptions {
            angle_range_deg: DEFAULT_ANGLE_RANGE_DEG,
            angle_resolution_deg: DEFAULT_ANGLE_RESOLUTION_DEG,
            range_resolution: DEFAULT_RANGE_RESOLUTION,
            max_range_ratio: DEFAULT_MAX_RANGE_RATIO,
        }
    }
}

/// How to complete a peak list when the spectrum has fewer local maxima than
/// requested sources.
///
/// - `Deterministic`: fill with the largest remaining spectrum samples; if the
///   spectrum is shorter than the request, repeat the selected indices.
/// - `Seeded(seed)`: fill 2D results (and any 1D shortfall beyond the spectrum
///   length) with uniformly random grid cells drawn from a seeded generator.
/// - `Entropy`: as `Seeded`, but seeded from the operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaddingPolicy {
    #[default]
    Deterministic,
    Seeded(u64),
    Entropy,
}

/// PeakOptions — validated peak-extraction configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeakOptions {
    /// Side length of the square 2D maximum filter (odd).
    pub window: usize,
    /// Padding behavior for insufficient peaks.
    pub padding: PaddingPolicy,
}

impl PeakOptions {
    /// Errors
    /// ------
    /// - `MusicError::InvalidPeakWindow` when `window` is zero or even.
    pub fn new(window: usize, padding: PaddingPolicy) -> MusicResult<Self> {
        if window == 0 || window % 2 == 0 {
            return Err(MusicError::InvalidPeakWindow { size: window });
        }
        Ok(PeakOptions { window, padding })
    }

    pub fn validate(&self) -> MusicResult<()> {
        PeakOptions::new(self.window, self.padding).map(|_| ())
    }
}

impl Default for PeakOptions {
    fn default() -> Self {
        PeakOptions { window: DEFAULT_PEAK_WINDOW, padding: PaddingPolicy::Deterministic }
    }
}

/// MusicOptions — estimator-level configuration.
///
/// Purpose
/// -------
/// Bundle grid and peak options with the initial soft-localizer cell
/// coefficient and the batched-projection byte budget.
///
/// Fields
/// ------
/// - `grid`: [`GridOptions`]
/// - `peaks`: [`PeakOptions`]
/// - `cell_coefficient`: fraction of each grid length used to seed the
///   soft-localizer half-widths (rounded down, then made odd).
/// - `max_batched_bytes`: size above which the surface projection skips the
///   batched strategy and runs item by item.
///
/// Notes
/// -----
/// - Components are validated by their own builders; `new` only checks the
///   scalar field it owns. Fields are public, so [`MusicOptions::validate`]
///   re-checks everything when the estimator is constructed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MusicOptions {
    pub grid: GridOptions,
    pub peaks: PeakOptions,
    pub cell_coefficient: f64,
    pub max_batched_bytes: usize,
}

impl MusicOptions {
    /// Errors
    /// ------
    /// - `MusicError::InvalidCellCoefficient` when `cell_coefficient` is
    ///   non-finite or outside `(0, 1]`.
    pub fn new(
        grid: GridOptions, peaks: PeakOptions, cell_coefficient: f64, max_batched_bytes: usize,
    ) -> MusicResult<Self> {
        validate_cell_coefficient(cell_coefficient)?;
        Ok(MusicOptions { grid, peaks, cell_coefficient, max_batched_bytes })
    }

    /// Validate every component, for values assembled without the builders.
    pub fn validate(&self) -> MusicResult<()> {
        self.grid.validate()?;
        self.peaks.validate()?;
        validate_cell_coefficient(self.cell_coefficient)
    }
}

impl Default for MusicOptions {
    fn default() -> Self {
        MusicOptions {
            grid: GridOptions::default(),
            peaks: PeakOptions::default(),
            cell_coefficient: DEFAULT_CELL_COEFFICIENT,
            max_batched_bytes: DEFAULT_MAX_BATCHED_BYTES,
        }
    }
}

pub(crate) fn validate_cell_coefficient(value: f64) -> MusicResult<()> {
    if !value.is_finite() || value <= 0.0 || value > 1.0 {
        return Err(MusicError::InvalidCellCoefficient { value });
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
    // - Acceptance of the documented defaults through the validated builders.
    // - Rejection paths of `GridOptions::new`, `PeakOptions::new`, and
    //   `MusicOptions::new`.
    //
    // They intentionally DO NOT cover:
    // - How options shape the grid or peaks; see `grid` and `peaks` tests.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Verify that the defaults pass their own validation.
    //
    // Given
    // -----
    // - The `DEFAULT_*` constants.
    //
    // Expect
    // ------
    // - Builders return values equal to the `Default` impls.
    fn defaults_pass_validation() {
        // Act
        let grid = GridOptions::new(
            DEFAULT_ANGLE_RANGE_DEG,
            DEFAULT_ANGLE_RESOLUTION_DEG,
            DEFAULT_RANGE_RESOLUTION,
            DEFAULT_MAX_RANGE_RATIO,
        )
        .expect("defaults should validate");
        let peaks = PeakOptions::new(DEFAULT_PEAK_WINDOW, PaddingPolicy::default())
            .expect("default window should validate");
        let opts =
            MusicOptions::new(grid, peaks, DEFAULT_CELL_COEFFICIENT, DEFAULT_MAX_BATCHED_BYTES)
                .expect("default coefficient should validate");

        // Assert
        assert_eq!(opts, MusicOptions::default());
    }

    #[test]
    // Purpose
    // -------
    // Exercise each rejection branch of `GridOptions::new`.
    //
    // Given
    // -----
    // - One invalid field at a time.
    //
    // Expect
    // ------
    // - The matching configuration error variant.
    fn grid_options_reject_invalid_fields() {
        // Act / Assert
        match GridOptions::new(120.0, 1.0, 0.5, 0.5) {
            Err(MusicError::InvalidAngleRange { value }) => assert_eq!(value, 120.0),
            other => panic!("expected InvalidAngleRange, got {other:?}"),
        }
        match GridOptions::new(60.0, 0.0, 0.5, 0.5) {
            Err(MusicError::InvalidResolution { name, .. }) => assert_eq!(name, "Angle resolution"),
            other => panic!("expected InvalidResolution, got {other:?}"),
        }
        match GridOptions::new(60.0, 1.0, f64::NAN, 0.5) {
            Err(MusicError::InvalidResolution { name, .. }) => assert_eq!(name, "Range resolution"),
            other => panic!("expected InvalidResolution, got {other:?}"),
        }
        match GridOptions::new(60.0, 1.0, 0.5, 1.5) {
            Err(MusicError::InvalidRangeRatio { value }) => assert_eq!(value, 1.5),
            other => panic!("expected InvalidRangeRatio, got {other:?}"),
        }
    }

    #[test]
    // Purpose
    // -------
    // Ensure even or zero peak windows and out-of-range cell coefficients are
    // rejected.
    //
    // Given
    // -----
    // - Windows 0 and 20; coefficients 0.0 and 1.5.
    //
    // Expect
    // ------
    // - `InvalidPeakWindow` and `InvalidCellCoefficient` respectively.
    fn peak_and_cell_options_reject_invalid_values() {
        // Act / Assert
        for size in [0, 20] {
            match PeakOptions::new(size, PaddingPolicy::Deterministic) {
                Err(MusicError::InvalidPeakWindow { size: s }) => assert_eq!(s, size),
                other => panic!("expected InvalidPeakWindow, got {other:?}"),
            }
        }
        for coefficient in [0.0, 1.5] {
            let result = MusicOptions::new(
                GridOptions::default(),
                PeakOptions::default(),
                coefficient,
                DEFAULT_MAX_BATCHED_BYTES,
            );
            assert!(matches!(result, Err(MusicError::InvalidCellCoefficient { .. })));
        }
    }

    #[test]
    // Purpose
    // -------
    // Check `validate` catches invalid values assembled as struct literals.
    //
    // Given
    // -----
    // - Defaults with a zero angle resolution, an even peak window, or a
    //   zero cell coefficient.
    //
    // Expect
    // ------
    // - The same error variants the builders return; defaults validate.
    fn validate_rechecks_struct_literals() {
        // Arrange
        let grid = MusicOptions {
            grid: GridOptions { angle_resolution_deg: 0.0, ..GridOptions::default() },
            ..MusicOptions::default()
        };
        let peaks = MusicOptions {
            peaks: PeakOptions { window: 4, padding: PaddingPolicy::Deterministic },
            ..MusicOptions::default()
        };
        let cells = MusicOptions { cell_coefficient: 0.0, ..MusicOptions::default() };

        // Act / Assert
        assert!(MusicOptions::default().validate().is_ok());
        assert!(matches!(grid.validate(), Err(MusicError::InvalidResolution { .. })));
        assert!(matches!(peaks.validate(), Err(MusicError::InvalidPeakWindow { size: 4 })));
        assert!(matches!(cells.validate(), Err(MusicError::InvalidCellCoefficient { .. })));
    }
}
