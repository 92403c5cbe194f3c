//! Soft-localizer cell sizes.
//!
//! Cells are the half-widths of the soft windows. They start at a fraction of
//! the grid length (made odd) and shrink geometrically on request, staying odd
//! and never dropping below one.
use crate::estimation::{
    core::{field::EstimationTarget, grid::SearchGrid, options::validate_cell_coefficient},
    errors::{MusicError, MusicResult},
};

/// Decay applied to range-only cells per shrink.
pub const RANGE_CELL_DECAY: f64 = 0.8;
/// Decay applied to angle and angle-range cells per shrink.
pub const ANGLE_CELL_DECAY: f64 = 0.95;

/// Soft-window half-widths for the configured target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellSize {
    /// Half-width for a single grid axis, with its per-shrink decay.
    Line { half_width: usize, decay: f64 },
    /// Half-widths for the angle (rows) and range (columns) axes.
    Surface { angle: usize, range: usize },
}

/// `floor(len · coefficient)`, bumped to the next odd number when even.
pub fn initial_cell(len: usize, coefficient: f64) -> usize {
    let cell = (len as f64 * coefficient) as usize;
    if cell % 2 == 0 { cell + 1 } else { cell }
}

/// One decay step: `floor(decay · cell)`, minus one when even; cells of size
/// one stay put.
pub fn shrink_cell(cell: usize, decay: f64) -> usize {
    if cell <= 1 {
        return cell;
    }
    let next = (decay * cell as f64) as usize;
    let next = if next % 2 == 0 { next.saturating_sub(1) } else { next };
    next.max(1)
}

impl CellSize {
    /// Initial cells for `target` over `grid`.
    ///
    /// Errors
    /// ------
    /// - `MusicError::InvalidCellCoefficient` for a coefficient outside `(0, 1]`.
    /// - `MusicError::ShapeMismatch` when the grid lacks an axis the target
    ///   needs.
    pub fn init(target: EstimationTarget, grid: &SearchGrid, coefficient: f64) -> MusicResult<Self> {
        validate_cell_coefficient(coefficient)?;
        let axis_len = |axis: Option<&ndarray::Array1<f64>>, what: &'static str| {
            axis.map(|a| a.len()).ok_or(MusicError::ShapeMismatch { what, expected: 1, actual: 0 })
        };
        Ok(match target {
            EstimationTarget::Angle => CellSize::Line {
                half_width: initial_cell(axis_len(grid.angles(), "angle grid")?, coefficient),
                decay: ANGLE_CELL_DECAY,
            },
            EstimationTarget::Range => CellSize::Line {
                half_width: initial_cell(axis_len(grid.ranges(), "range grid")?, coefficient),
                decay: RANGE_CELL_DECAY,
            },
            EstimationTarget::AngleRange => CellSize::Surface {
                angle: initial_cell(axis_len(grid.angles(), "angle grid")?, coefficient),
                range: initial_cell(axis_len(grid.ranges(), "range grid")?, coefficient),
            },
        })
    }

    /// Apply one decay step to every half-width.
    pub fn shrink(&mut self) {
        match self {
            CellSize::Line { half_width, decay } => *half_width = shrink_cell(*half_width, *decay),
            CellSize::Surface { angle, range } => {
                *angle = shrink_cell(*angle, ANGLE_CELL_DECAY);
                *range = shrink_cell(*range, ANGLE_CELL_DECAY);
            }
        }
    }
}
