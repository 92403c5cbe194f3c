//! Integration tests for the MUSIC estimation pipeline.
//!
//! Purpose
//! -------
//! - Validate the end-to-end path: array model → covariance → subspace
//!   separation → spectrum → peak extraction → parameter estimates and
//!   evaluation scores.
//! - Exercise realistic scenarios (simulated snapshots with noise, near-field
//!   surfaces, memory-constrained projection) rather than toy inputs only.
//!
//! Coverage
//! --------
//! - `collaborators`:
//!   - `UniformLinearArray` model covariances and seeded snapshot simulation.
//!   - `sample_covariance` and `EigenSeparator`.
//! - `estimation::models::music::MusicEstimator`:
//!   - Far-field angle estimation (analytic and simulated covariances).
//!   - Near-field joint angle-range estimation in hard and soft modes.
//!   - Evaluation of the joint target with range labels.
//!   - The iterative surface projection under a zero byte budget.
//!   - Cell shrinking down to the floor.
//!
//! Exclusions
//! ----------
//! - Fine-grained checks of grids, peaks, soft windows, and losses; those
//!   are covered by unit tests.
//! - Python bindings.
use approx::assert_relative_eq;
use ndarray::{Array3, Axis, array};
use num_complex::Complex64;
use rand::{SeedableRng, rngs::StdRng};
use rust_doa::{
    collaborators::{
        array::UniformLinearArray,
        covariance::sample_covariance,
        subspace::{EigenSeparator, ModelOrder},
    },
    estimation::{
        core::{
            cells::CellSize,
            field::{EstimationTarget, FieldType, PeakMode},
            options::{GridOptions, MusicOptions, PeakOptions},
        },
        models::music::{
            EvaluationBatch, EvaluationLoss, MusicEstimator, ParameterEstimate, SoftTrace,
        },
        MusicSpectrum,
    },
};

type UlaMusic = MusicEstimator<UniformLinearArray, EigenSeparator>;

/// Purpose
/// -------
/// Build an estimator over an 8-element half-wavelength ULA at λ = 1.
///
/// Notes
/// -----
/// - Near-field range grid for this array is `[5, 12.5)` in steps of 0.25.
fn build(field: FieldType, target: EstimationTarget, options: MusicOptions) -> UlaMusic {
    MusicEstimator::new(
        UniformLinearArray::half_wavelength(8).unwrap(),
        EigenSeparator::default(),
        field,
        target,
        options,
    )
    .unwrap()
}

/// Purpose
/// -------
/// Analytic covariance (power 100, unit noise) as a batch of one.
fn model_covariance(angles: &[f64], ranges: Option<&[f64]>) -> Array3<Complex64> {
    UniformLinearArray::half_wavelength(8)
        .unwrap()
        .model_covariance(angles, ranges, 100.0, 1.0)
        .unwrap()
        .insert_axis(Axis(0))
}

fn sorted(mut v: Vec<f64>) -> Vec<f64> {
    v.sort_by(f64::total_cmp);
    v
}

#[test]
// Purpose
// -------
// Recover two far-field sources from an analytic covariance.
//
// Given
// -----
// - Sources at -10° and 15°; default grid (±60°, 0.5° step, 3 decimals).
//
// Expect
// ------
// - Both angles within 0.05° (grid rounding) and a source estimate of 2.
fn far_field_recovers_two_sources() {
    // Arrange
    let mut music = build(FieldType::Far, EstimationTarget::Angle, MusicOptions::default());
    let truth = [-10f64.to_radians(), 15f64.to_radians()];
    let cov = model_covariance(&truth, None);

    // Act
    let out = music.estimate(cov.view(), 2, None, None, PeakMode::Hard).unwrap();

    // Assert
    let ParameterEstimate::Angles(angles) = out.parameters else {
        panic!("expected angle estimates");
    };
    let est = sorted(angles.row(0).to_vec());
    for (e, t) in est.iter().zip(truth) {
        assert!((e - t).abs() < 0.05f64.to_radians(), "estimate {e} vs truth {t}");
    }
    assert_eq!(out.source_estimation.unwrap()[0], 2);
    assert!(out.eigen_regularization.unwrap()[0] < 0.0);
    assert!(matches!(&out.spectra[0], MusicSpectrum::Line(s) if s.dim() == (1, 241)));
}

#[test]
// Purpose
// -------
// Recover far-field sources from simulated noisy snapshots.
//
// Given
// -----
// - Sources at -20° and 20°, SNR 10 dB, 400 snapshots, seed 7.
//
// Expect
// ------
// - Both angles within 2°; threshold source estimate of 2.
fn far_field_from_simulated_snapshots() {
    // Arrange
    let ula = UniformLinearArray::half_wavelength(8).unwrap();
    let truth = [-20f64.to_radians(), 20f64.to_radians()];
    let mut rng = StdRng::seed_from_u64(7);
    let x = ula.simulate_snapshots(&truth, None, 10.0, 400, &mut rng).unwrap();
    let cov = sample_covariance(x.insert_axis(Axis(0)).view());
    let mut music = build(FieldType::Far, EstimationTarget::Angle, MusicOptions::default());

    // Act
    let out = music.estimate(cov.view(), 2, None, None, PeakMode::Hard).unwrap();

    // Assert
    let ParameterEstimate::Angles(angles) = out.parameters else {
        panic!("expected angle estimates");
    };
    let est = sorted(angles.row(0).to_vec());
    for (e, t) in est.iter().zip(truth) {
        assert!((e - t).abs() < 2f64.to_radians(), "estimate {e} vs truth {t}");
    }
    assert_eq!(out.source_estimation.unwrap()[0], 2);
}

#[test]
// Purpose
// -------
// Locate a near-field source on the angle-range surface in hard and soft
// modes.
//
// Given
// -----
// - One source at 10°, range 8 (both on the grid).
//
// Expect
// ------
// - Hard estimates (10°, 8); soft estimates equal the hard ones because the
//   spectrum is sharply peaked; soft windows are odd in both axes.
fn near_field_surface_hard_and_soft() {
    // Arrange
    let mut music = build(FieldType::Near, EstimationTarget::AngleRange, MusicOptions::default());
    let angle = 10f64.to_radians();
    let cov = model_covariance(&[angle], Some(&[8.0]));

    // Act
    let hard = music.estimate(cov.view(), 1, None, None, PeakMode::Hard).unwrap();
    let soft = music.estimate(cov.view(), 1, None, None, PeakMode::Soft).unwrap();

    // Assert
    let ParameterEstimate::AnglesRanges { angles, ranges } = hard.parameters else {
        panic!("expected joint estimates");
    };
    assert!((angles[[0, 0]] - angle).abs() < 1e-9);
    assert!((ranges[[0, 0]] - 8.0).abs() < 1e-9);
    assert!(matches!(&hard.spectra[0], MusicSpectrum::Surface(s) if s.dim() == (1, 241, 30)));

    let ParameterEstimate::AnglesRanges { angles: sa, ranges: sr } = soft.parameters else {
        panic!("expected joint estimates");
    };
    assert!((sa[[0, 0]] - angles[[0, 0]]).abs() < 1e-9);
    assert!((sr[[0, 0]] - ranges[[0, 0]]).abs() < 1e-9);
    let Some(SoftTrace::Surface(windows)) = soft.soft else {
        panic!("expected surface windows");
    };
    assert_eq!(windows[0][0].rows.len() % 2, 1);
    assert_eq!(windows[0][0].cols.len() % 2, 1);
}

#[test]
// Purpose
// -------
// Score the joint target and confirm the memory-constrained projection path
// produces the same spectrum.
//
// Given
// -----
// - Two near-field sources at (-15°, 6) and (20°, 11).
// - One estimator with the default byte budget and one with zero.
//
// Expect
// ------
// - Joint, angle, and range losses all ~0 and accuracy 1 of 1.
// - Equal surface spectra from both estimators.
fn near_field_evaluation_and_iterative_projection() {
    // Arrange
    let angles = [-15f64.to_radians(), 20f64.to_radians()];
    let ranges = [6.0, 11.0];
    let cov = model_covariance(&angles, Some(&ranges));
    let mut batched = build(FieldType::Near, EstimationTarget::AngleRange, MusicOptions::default());
    let tight = MusicOptions::new(GridOptions::default(), PeakOptions::default(), 0.2, 0).unwrap();
    let mut iterative = build(FieldType::Near, EstimationTarget::AngleRange, tight);
    let batch = EvaluationBatch {
        covariance: cov.clone(),
        sources_num: array![2],
        angles: array![[angles[1], angles[0]]],
        ranges: Some(array![[ranges[1], ranges[0]]]),
    };

    // Act
    let outcome = batched.evaluate(&batch).unwrap();
    let a = batched.estimate(cov.view(), 2, None, None, PeakMode::Hard).unwrap();
    let b = iterative.estimate(cov.view(), 2, None, None, PeakMode::Hard).unwrap();

    // Assert
    let EvaluationLoss::AngleRange { joint, angle, range } = outcome.loss else {
        panic!("expected joint losses");
    };
    assert!(joint < 1e-6, "joint {joint}");
    assert!(angle < 1e-6, "angle {angle}");
    assert!(range < 1e-6, "range {range}");
    assert_eq!(outcome.source_accuracy, 1);
    assert_eq!(outcome.batch_size, 1);

    let (MusicSpectrum::Surface(sa), MusicSpectrum::Surface(sb)) = (&a.spectra[0], &b.spectra[0])
    else {
        panic!("expected surface spectra");
    };
    for (x, y) in sa.iter().zip(sb.iter()) {
        assert_relative_eq!(*x, *y, max_relative = 1e-9);
    }
}

#[test]
// Purpose
// -------
// Shrink cells repeatedly and check they settle at one.
//
// Given
// -----
// - Near-field range estimator (range cell 7 from 30 samples at 0.2).
//
// Expect
// ------
// - Cells strictly decrease while above one, stay odd, and end at one.
fn cells_shrink_to_floor() {
    // Arrange
    let mut music = build(FieldType::Near, EstimationTarget::Range, MusicOptions::default());
    let mut previous = match music.cells() {
        CellSize::Line { half_width, .. } => half_width,
        other => panic!("unexpected cells {other:?}"),
    };
    assert_eq!(previous, 7);

    // Act / Assert
    for _ in 0..10 {
        music.shrink_cell_size();
        let CellSize::Line { half_width, .. } = music.cells() else {
            panic!("unexpected surface cells");
        };
        assert_eq!(half_width % 2, 1);
        if previous > 1 {
            assert!(half_width < previous);
        } else {
            assert_eq!(half_width, 1);
        }
        previous = half_width;
    }
    assert_eq!(previous, 1);

    let given = EigenSeparator::new(ModelOrder::Given, 0.05).unwrap();
    assert_eq!(given.order(), ModelOrder::Given);
}
