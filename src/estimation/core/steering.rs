//! Steering dictionaries — array responses sampled over the search grid.
//!
//! Purpose
//! -------
//! Turn a [`SearchGrid`] and an [`ArrayModel`] into the dictionary the
//! spectrum evaluator projects onto the noise subspace.
//!
//! Key behaviors
//! -------------
//! - Far field, or near field with angle target: shared `sensors × angles`
//!   plane-wave dictionary.
//! - Near field with angle-range target: shared `sensors × angles × ranges`
//!   surface dictionary.
//! - Near field with range target: no shared dictionary; per-call dictionaries
//!   are built from known per-sample angles ([`per_item_range_dictionary`]).
//! - Known per-sample distances turn the angle target into a per-call
//!   near-field dictionary ([`per_item_angle_dictionary`]).
//! - Every dictionary is checked for non-finite entries before use.
//!
//! Invariants & assumptions
//! ------------------------
//! - Shared dictionaries are immutable between explicit rebuilds.
//! - Per-item dictionaries live for one call only.
use crate::{
    collaborators::array::ArrayModel,
    estimation::{
        core::{
            field::{EstimationTarget, FieldType},
            grid::SearchGrid,
        },
        errors::{MusicError, MusicResult},
    },
};
use ndarray::{Array1, Array2, Array3, ArrayView1, Axis, s};
use num_complex::Complex64;

/// Steering responses over the search grid.
#[derive(Debug, Clone, PartialEq)]
pub enum SteeringDictionary {
    /// `sensors × grid`, shared by every batch item.
    Shared(Array2<Complex64>),
    /// `batch × sensors × grid`, one dictionary per batch item.
    PerItem(Array3<Complex64>),
    /// `sensors × angles × ranges`, shared by every batch item.
    Surface(Array3<Complex64>),
}

impl SteeringDictionary {
    /// Number of sensors the dictionary was built for.
    pub fn sensors(&self) -> usize {
        match self {
            SteeringDictionary::Shared(d) => d.nrows(),
            SteeringDictionary::PerItem(d) => d.len_of(Axis(1)),
            SteeringDictionary::Surface(d) => d.len_of(Axis(0)),
        }
    }

    /// Reject dictionaries holding NaN/±inf entries.
    ///
    /// Errors
    /// ------
    /// - `MusicError::NonFiniteSteering` with the first offending flat index.
    pub fn ensure_finite(self) -> MusicResult<Self> {
        let position = match &self {
            SteeringDictionary::Shared(d) => first_non_finite(d.iter()),
            SteeringDictionary::PerItem(d) | SteeringDictionary::Surface(d) => {
                first_non_finite(d.iter())
            }
        };
        match position {
            Some(index) => Err(MusicError::NonFiniteSteering { index }),
            None => Ok(self),
        }
    }
}

fn first_non_finite<'a>(values: impl Iterator<Item = &'a Complex64>) -> Option<usize> {
    values.enumerate().find(|(_, v)| !v.re.is_finite() || !v.im.is_finite()).map(|(i, _)| i)
}

/// Build the shared dictionary for the configured regime.
///
/// Returns
/// -------
/// - `Ok(Some(dictionary))` for far field and near-field angle / angle-range
///   targets.
/// - `Ok(None)` for the near-field range target, whose dictionaries depend on
///   per-call known angles.
///
/// Errors
/// ------
/// - `MusicError::Anyhow` when the array model fails.
/// - `MusicError::NonFiniteSteering` for non-finite responses.
pub fn build_dictionary<A: ArrayModel + ?Sized>(
    array: &A, field: FieldType, target: EstimationTarget, grid: &SearchGrid,
) -> MusicResult<Option<SteeringDictionary>> {
    let dictionary = match (field.is_near(), target, grid.angles(), grid.ranges()) {
        (true, EstimationTarget::AngleRange, Some(angles), Some(ranges)) => {
            SteeringDictionary::Surface(array.near_field_steering(angles.view(), ranges.view())?)
        }
        (true, EstimationTarget::Range, _, _) => return Ok(None),
        (_, _, Some(angles), _) => {
            SteeringDictionary::Shared(array.far_field_steering(angles.view())?)
        }
        _ => return Ok(None),
    };
    dictionary.ensure_finite().map(Some)
}

/// Per-item near-field dictionary over the range grid at known angles.
///
/// Parameters
/// ----------
/// - `known_angles`: one angle per batch item (radians).
/// - `ranges`: range grid.
///
/// Returns
/// -------
/// `SteeringDictionary::PerItem` of shape `batch × sensors × ranges`.
pub fn per_item_range_dictionary<A: ArrayModel + ?Sized>(
    array: &A, known_angles: ArrayView1<'_, f64>, ranges: &Array1<f64>,
) -> MusicResult<SteeringDictionary> {
    per_item(array.sensors(), known_angles.len(), ranges.len(), |b| {
        let response = array.near_field_steering(known_angles.slice(s![b..b + 1]), ranges.view())?;
        Ok(response.index_axis_move(Axis(1), 0))
    })
}

/// Per-item near-field dictionary over the angle grid at known distances.
///
/// Returns
/// -------
/// `SteeringDictionary::PerItem` of shape `batch × sensors × angles`.
pub fn per_item_angle_dictionary<A: ArrayModel + ?Sized>(
    array: &A, known_ranges: ArrayView1<'_, f64>, angles: &Array1<f64>,
) -> MusicResult<SteeringDictionary> {
    per_item(array.sensors(), known_ranges.len(), angles.len(), |b| {
        let response = array.near_field_steering(angles.view(), known_ranges.slice(s![b..b + 1]))?;
        Ok(response.index_axis_move(Axis(2), 0))
    })
}

fn per_item<F>(
    sensors: usize, batch: usize, grid_len: usize, build: F,
) -> MusicResult<SteeringDictionary>
where
    F: Fn(usize) -> anyhow::Result<Array2<Complex64>>,
{
    let mut out = Array3::<Complex64>::zeros((batch, sensors, grid_len));
    for b in 0..batch {
        let item = build(b)?;
        if item.dim() != (sensors, grid_len) {
            return Err(MusicError::ShapeMismatch {
                what: "per-item steering dictionary",
                expected: sensors * grid_len,
                actual: item.len(),
            });
        }
        out.index_axis_mut(Axis(0), b).assign(&item);
    }
    SteeringDictionary::PerItem(out).ensure_finite()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        collaborators::array::UniformLinearArray,
        estimation::core::{grid::build_search_grid, options::GridOptions},
    };
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Which dictionary variant is built per field/target pair and its shape.
    // - Per-item dictionaries at known angles and known distances.
    // - Rejection of non-finite steering responses.
    // -------------------------------------------------------------------------

    struct BrokenArray;

    impl ArrayModel for BrokenArray {
        fn sensors(&self) -> usize {
            2
        }
        fn far_field_steering(
            &self, angles: ArrayView1<'_, f64>,
        ) -> anyhow::Result<Array2<Complex64>> {
            let mut out = Array2::from_elem((2, angles.len()), Complex64::new(1.0, 0.0));
            out[[1, 0]] = Complex64::new(f64::NAN, 0.0);
            Ok(out)
        }
        fn near_field_steering(
            &self, _angles: ArrayView1<'_, f64>, _ranges: ArrayView1<'_, f64>,
        ) -> anyhow::Result<Array3<Complex64>> {
            anyhow::bail!("near field not modelled")
        }
        fn fresnel(&self) -> f64 {
            1.0
        }
        fn fraunhofer(&self) -> f64 {
            10.0
        }
        fn resize(&mut self, _sensors: usize) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    // Purpose
    // -------
    // Check dictionary variants and shapes for each supported pair.
    //
    // Given
    // -----
    // - A 15-element half-wavelength array and default grid options.
    //
    // Expect
    // ------
    // - Far/angle: `Shared` with `sensors × angles`.
    // - Near/angle-range: `Surface` with `sensors × angles × ranges`.
    // - Near/range: no shared dictionary.
    fn dictionary_variant_follows_configuration() {
        // Arrange
        let ula = UniformLinearArray::half_wavelength(15).unwrap();
        let opts = GridOptions::default();
        let (fr, fh) = (ula.fresnel(), ula.fraunhofer());

        // Act
        let far_grid =
            build_search_grid(FieldType::Far, EstimationTarget::Angle, &opts, fr, fh).unwrap();
        let far = build_dictionary(&ula, FieldType::Far, EstimationTarget::Angle, &far_grid);
        let near_grid =
            build_search_grid(FieldType::Near, EstimationTarget::AngleRange, &opts, fr, fh)
                .unwrap();
        let near =
            build_dictionary(&ula, FieldType::Near, EstimationTarget::AngleRange, &near_grid);
        let range_grid =
            build_search_grid(FieldType::Near, EstimationTarget::Range, &opts, fr, fh).unwrap();
        let range = build_dictionary(&ula, FieldType::Near, EstimationTarget::Range, &range_grid);

        // Assert
        match far.unwrap() {
            Some(SteeringDictionary::Shared(d)) => {
                assert_eq!(d.dim(), (15, far_grid.angles().unwrap().len()))
            }
            other => panic!("expected Shared dictionary, got {other:?}"),
        }
        match near.unwrap() {
            Some(SteeringDictionary::Surface(d)) => assert_eq!(
                d.dim(),
                (15, near_grid.angles().unwrap().len(), near_grid.ranges().unwrap().len())
            ),
            other => panic!("expected Surface dictionary, got {other:?}"),
        }
        assert!(range.unwrap().is_none());
    }

    #[test]
    // Purpose
    // -------
    // Verify per-item dictionaries match direct steering evaluations.
    //
    // Given
    // -----
    // - Two known angles and a three-sample range grid.
    //
    // Expect
    // ------
    // - Shape `2 × sensors × 3`; item b equals the steering vector at
    //   (angle_b, range_j).
    fn per_item_range_dictionary_matches_steering_vectors() {
        // Arrange
        let ula = UniformLinearArray::half_wavelength(6).unwrap();
        let angles = array![0.1, -0.4];
        let ranges = array![5.0, 6.0, 7.0];

        // Act
        let dict = per_item_range_dictionary(&ula, angles.view(), &ranges).unwrap();

        // Assert
        let SteeringDictionary::PerItem(d) = dict else {
            panic!("expected PerItem dictionary");
        };
        assert_eq!(d.dim(), (2, 6, 3));
        for b in 0..2 {
            for j in 0..3 {
                let a = ula.steering_vector(angles[b], Some(ranges[j]));
                for n in 0..6 {
                    assert!((d[[b, n, j]] - a[n]).norm() < 1e-12);
                }
            }
        }
    }

    #[test]
    // Purpose
    // -------
    // Verify the known-distance angle dictionary shape.
    //
    // Given
    // -----
    // - One known distance and a four-sample angle grid.
    //
    // Expect
    // ------
    // - Shape `1 × sensors × 4`.
    fn per_item_angle_dictionary_has_batch_layout() {
        // Arrange
        let ula = UniformLinearArray::half_wavelength(5).unwrap();
        let angles = array![-0.2, 0.0, 0.2, 0.4];

        // Act
        let dict = per_item_angle_dictionary(&ula, array![8.0].view(), &angles).unwrap();

        // Assert
        match dict {
            SteeringDictionary::PerItem(d) => assert_eq!(d.dim(), (1, 5, 4)),
            other => panic!("expected PerItem dictionary, got {other:?}"),
        }
    }

    #[test]
    // Purpose
    // -------
    // Ensure non-finite responses and collaborator failures surface as errors.
    //
    // Given
    // -----
    // - An array model returning NaN in far field and failing in near field.
    //
    // Expect
    // ------
    // - `NonFiniteSteering` at flat index of entry (1, 0).
    // - `Anyhow` carrying the collaborator message.
    fn invalid_responses_are_rejected() {
        // Arrange
        let grid = build_search_grid(
            FieldType::Far,
            EstimationTarget::Angle,
            &GridOptions::new(2.0, 1.0, 0.5, 0.5).unwrap(),
            1.0,
            10.0,
        )
        .unwrap();
        let n_angles = grid.angles().unwrap().len();

        // Act
        let far = build_dictionary(&BrokenArray, FieldType::Far, EstimationTarget::Angle, &grid);
        let near = per_item_range_dictionary(&BrokenArray, array![0.0].view(), &array![2.0]);

        // Assert
        match far {
            Err(MusicError::NonFiniteSteering { index }) => assert_eq!(index, n_angles),
            other => panic!("expected NonFiniteSteering, got {other:?}"),
        }
        match near {
            Err(MusicError::Anyhow(msg)) => assert!(msg.contains("near field not modelled")),
            other => panic!("expected Anyhow, got {other:?}"),
        }
    }
}
