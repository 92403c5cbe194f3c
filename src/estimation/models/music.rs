//! MUSIC estimator: subspace separation, spectrum evaluation, and peak search.
//!
//! This module wires the search grid, steering dictionary, spectrum evaluator,
//! and peak extractors into one stateful estimator. Grid, dictionary, cell
//! sizes, and the padding generator live on the estimator; spectra and peaks
//! are returned from every call and never stored.
//!
//! Key ideas:
//! - The estimation target is fixed at construction and selects the grid
//!   axes, the cell-size layout, and the evaluation criterion.
//! - Hard and soft peak extraction are selected per call through [`PeakMode`].
//! - Range-only estimation (and near-field angle-only estimation with known
//!   distances) builds per-item dictionaries from the known per-sample
//!   parameters. With several known columns the estimator runs one pass per
//!   column and stitches the single-peak results.
use crate::{
    collaborators::{
        array::ArrayModel,
        loss::Criterion,
        subspace::{Separation, SubspaceSeparator},
    },
    estimation::{
        core::{
            cells::CellSize,
            field::{EstimationTarget, FieldType, PeakMode, validate_pair},
            grid::{SearchGrid, build_search_grid},
            options::MusicOptions,
            peaks::{PeakPadder, find_top_k_1d, find_top_k_2d},
            soft::{SoftWindow1d, SoftWindow2d, soft_localize_1d, soft_localize_2d},
            spectrum::{MusicSpectrum, inverse_spectrum, music_spectrum},
            steering::{
                SteeringDictionary, build_dictionary, per_item_angle_dictionary,
                per_item_range_dictionary,
            },
        },
        errors::{MusicError, MusicResult},
    },
};
use ndarray::{Array1, Array2, Array3, ArrayView1, ArrayView2, ArrayView3, Axis, s};
use num_complex::Complex64;
use std::fmt;
use tracing::debug;

/// Estimated source parameters, `batch × sources` per axis.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterEstimate {
    Angles(Array2<f64>),
    Ranges(Array2<f64>),
    AnglesRanges { angles: Array2<f64>, ranges: Array2<f64> },
}

/// Soft windows per batch item and source, kept for gradient computation.
///
/// For per-column estimation, window `j` of an item refers to spectrum `j`
/// of [`Estimation::spectra`].
#[derive(Debug, Clone, PartialEq)]
pub enum SoftTrace {
    Line(Vec<Vec<SoftWindow1d>>),
    Surface(Vec<Vec<SoftWindow2d>>),
}

/// Result of [`MusicEstimator::estimate`].
///
/// Fields
/// ------
/// - `parameters`: estimates for the configured target.
/// - `source_estimation`: separator's per-item source-count estimate.
/// - `eigen_regularization`: separator's regularization term, untouched.
/// - `spectra`: MUSIC spectra, one per estimation pass.
/// - `soft`: soft windows when estimated with [`PeakMode::Soft`].
#[derive(Debug, Clone, PartialEq)]
pub struct Estimation {
    pub parameters: ParameterEstimate,
    pub source_estimation: Option<Array1<usize>>,
    pub eigen_regularization: Option<Array1<f64>>,
    pub spectra: Vec<MusicSpectrum>,
    pub soft: Option<SoftTrace>,
}

/// Labelled batch for [`MusicEstimator::evaluate`].
///
/// - `covariance`: `batch × N × N`.
/// - `sources_num`: true source count per item (must be constant).
/// - `angles`: true angles, `batch × sources` (radians). For the range target
///   these are the known angles the range search is conditioned on.
/// - `ranges`: true ranges, required for range and angle-range targets.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationBatch {
    pub covariance: Array3<Complex64>,
    pub sources_num: Array1<usize>,
    pub angles: Array2<f64>,
    pub ranges: Option<Array2<f64>>,
}

/// Batch-summed evaluation loss.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EvaluationLoss {
    Single(f64),
    AngleRange { joint: f64, angle: f64, range: f64 },
}

/// Result of [`MusicEstimator::evaluate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationOutcome {
    pub loss: EvaluationLoss,
    /// Items whose source-count estimate matched the truth.
    pub source_accuracy: usize,
    pub batch_size: usize,
}

type LineOutput = (Array2<f64>, Vec<MusicSpectrum>, Option<Vec<Vec<SoftWindow1d>>>);

/// MUSIC estimator over an array model and a subspace separator.
///
/// Encapsulates the propagation regime (`field`), the estimation target, the
/// validated options, the search grid with its steering dictionary, the soft
/// cell sizes, the evaluation criterion, and the peak-padding generator.
///
/// # Notes
/// - Estimation takes `&mut self`: padding may advance the generator and
///   evaluation updates the source-count counters.
#[derive(Debug, Clone)]
pub struct MusicEstimator<A: ArrayModel, S: SubspaceSeparator> {
    array: A,
    separator: S,
    field: FieldType,
    target: EstimationTarget,
    options: MusicOptions,
    grid: SearchGrid,
    steering: Option<SteeringDictionary>,
    cells: CellSize,
    criterion: Criterion,
    padder: PeakPadder,
    under_estimation_counter: usize,
    over_estimation_counter: usize,
}

impl<A: ArrayModel, S: SubspaceSeparator> MusicEstimator<A, S> {
    /// Construct an estimator with a ready search grid.
    ///
    /// # Errors
    /// - Configuration errors from [`MusicOptions::validate`].
    /// - `MusicError::UnsupportedTarget` for far field with a range target.
    /// - `MusicError::InvalidGrid` when the near-field range interval is empty.
    /// - `MusicError::NonFiniteSteering` / `MusicError::Anyhow` from the array
    ///   model.
    pub fn new(
        array: A, separator: S, field: FieldType, target: EstimationTarget, options: MusicOptions,
    ) -> MusicResult<Self> {
        options.validate()?;
        validate_pair(field, target)?;
        let grid =
            build_search_grid(field, target, &options.grid, array.fresnel(), array.fraunhofer())?;
        let steering = build_dictionary(&array, field, target, &grid)?;
        let cells = CellSize::init(target, &grid, options.cell_coefficient)?;
        Ok(MusicEstimator {
            array,
            separator,
            field,
            target,
            options,
            grid,
            steering,
            cells,
            criterion: Criterion::for_target(target),
            padder: PeakPadder::new(options.peaks.padding),
            under_estimation_counter: 0,
            over_estimation_counter: 0,
        })
    }

    /// Estimate source parameters for a batch of covariances.
    ///
    /// # Arguments
    /// - `covariance`: `batch × N × N` sample covariances.
    /// - `number_of_sources`: `M` with `1 <= M < N`.
    /// - `known_angles`: `batch × columns`, required for the range target.
    /// - `known_distances`: `batch × columns`, optional for near-field angle
    ///   estimation.
    /// - `mode`: hard or soft peak extraction.
    ///
    /// # Errors
    /// - Input errors for empty batches, non-square or non-finite covariances,
    ///   out-of-range source counts, and missing or misshapen known
    ///   parameters.
    /// - Numerical, resource, and collaborator errors from the spectrum
    ///   evaluator and the separator.
    pub fn estimate(
        &mut self, covariance: ArrayView3<'_, Complex64>, number_of_sources: usize,
        known_angles: Option<ArrayView2<'_, f64>>, known_distances: Option<ArrayView2<'_, f64>>,
        mode: PeakMode,
    ) -> MusicResult<Estimation> {
        let batch = validate_covariance(covariance, number_of_sources)?;
        debug!(estimation = %self.target, batch, sources = number_of_sources, ?mode, "MUSIC estimate");
        let Separation { noise_subspace, source_estimation, eigen_regularization, .. } =
            self.separator.separate(covariance, number_of_sources)?;
        let noise = noise_subspace.view();
        let sensors = covariance.len_of(Axis(1));
        let expected = (batch, sensors, sensors - number_of_sources);
        if noise.dim() != expected {
            return Err(MusicError::ShapeMismatch {
                what: "noise subspace",
                expected: expected.0 * expected.1 * expected.2,
                actual: noise.len(),
            });
        }

        let (parameters, spectra, soft) = match self.target {
            EstimationTarget::AngleRange => self.estimate_surface(noise, number_of_sources, mode)?,
            EstimationTarget::Range => {
                let known = known_angles.ok_or(MusicError::MissingKnownAngles)?;
                let (ranges, spectra, soft) =
                    self.estimate_known(noise, number_of_sources, known, mode)?;
                (ParameterEstimate::Ranges(ranges), spectra, soft.map(SoftTrace::Line))
            }
            EstimationTarget::Angle => {
                let (angles, spectra, soft) = match (self.field.is_near(), known_distances) {
                    (true, Some(known)) => {
                        self.estimate_known(noise, number_of_sources, known, mode)?
                    }
                    _ => self.estimate_shared(noise, number_of_sources, mode)?,
                };
                (ParameterEstimate::Angles(angles), spectra, soft.map(SoftTrace::Line))
            }
        };
        Ok(Estimation { parameters, source_estimation, eigen_regularization, spectra, soft })
    }

    fn estimate_shared(
        &mut self, noise: ArrayView3<'_, Complex64>, k: usize, mode: PeakMode,
    ) -> MusicResult<LineOutput> {
        let dictionary = self.steering.as_ref().ok_or(MusicError::ShapeMismatch {
            what: "shared steering dictionary",
            expected: 1,
            actual: 0,
        })?;
        let spectrum = line_spectrum(dictionary, noise, self.options.max_batched_bytes)?;
        let grid = grid_axis(self.grid.angles(), "angle grid")?;
        let half = self.line_half_width();
        let (values, windows) = extract_line(&spectrum, grid.view(), k, mode, half, &mut self.padder);
        Ok((values, vec![MusicSpectrum::Line(spectrum)], windows))
    }

    fn estimate_known(
        &mut self, noise: ArrayView3<'_, Complex64>, m: usize, known: ArrayView2<'_, f64>,
        mode: PeakMode,
    ) -> MusicResult<LineOutput> {
        let batch = noise.len_of(Axis(0));
        if known.nrows() != batch {
            return Err(MusicError::ShapeMismatch {
                what: "known parameter rows",
                expected: batch,
                actual: known.nrows(),
            });
        }
        let columns = known.ncols();
        let k = match columns {
            1 => m,
            c if c == m => 1,
            c => {
                return Err(MusicError::ShapeMismatch {
                    what: "known parameter columns",
                    expected: m,
                    actual: c,
                });
            }
        };
        let grid = match self.target {
            EstimationTarget::Range => grid_axis(self.grid.ranges(), "range grid")?,
            _ => grid_axis(self.grid.angles(), "angle grid")?,
        };
        let half = self.line_half_width();

        let mut values = Array2::<f64>::zeros((batch, m));
        let mut spectra = Vec::with_capacity(columns);
        let mut trace: Option<Vec<Vec<SoftWindow1d>>> =
            (mode == PeakMode::Soft).then(|| vec![Vec::with_capacity(m); batch]);
        for (j, column) in known.columns().into_iter().enumerate() {
            let dictionary = match self.target {
                EstimationTarget::Range => per_item_range_dictionary(&self.array, column, grid)?,
                _ => per_item_angle_dictionary(&self.array, column, grid)?,
            };
            let spectrum = line_spectrum(&dictionary, noise, self.options.max_batched_bytes)?;
            let (pass, windows) =
                extract_line(&spectrum, grid.view(), k, mode, half, &mut self.padder);
            values.slice_mut(s![.., j * k..(j + 1) * k]).assign(&pass);
            if let (Some(trace), Some(windows)) = (trace.as_mut(), windows) {
                for (item, w) in trace.iter_mut().zip(windows) {
                    item.extend(w);
                }
            }
            spectra.push(MusicSpectrum::Line(spectrum));
        }
        Ok((values, spectra, trace))
    }

    fn estimate_surface(
        &mut self, noise: ArrayView3<'_, Complex64>, k: usize, mode: PeakMode,
    ) -> MusicResult<(ParameterEstimate, Vec<MusicSpectrum>, Option<SoftTrace>)> {
        let dictionary = self.steering.as_ref().ok_or(MusicError::ShapeMismatch {
            what: "surface steering dictionary",
            expected: 1,
            actual: 0,
        })?;
        let spectrum = match music_spectrum(&inverse_spectrum(
            dictionary,
            noise,
            self.options.max_batched_bytes,
        )?) {
            MusicSpectrum::Surface(s) => s,
            MusicSpectrum::Line(s) => {
                return Err(MusicError::ShapeMismatch {
                    what: "surface spectrum rank",
                    expected: 3,
                    actual: s.ndim(),
                });
            }
        };
        let angles = grid_axis(self.grid.angles(), "angle grid")?;
        let ranges = grid_axis(self.grid.ranges(), "range grid")?;
        let (half_angle, half_range) = match self.cells {
            CellSize::Surface { angle, range } => (angle, range),
            CellSize::Line { .. } => {
                return Err(MusicError::ShapeMismatch {
                    what: "surface cell sizes",
                    expected: 2,
                    actual: 1,
                });
            }
        };

        let batch = spectrum.len_of(Axis(0));
        let mut angle_values = Array2::<f64>::zeros((batch, k));
        let mut range_values = Array2::<f64>::zeros((batch, k));
        let mut trace = Vec::new();
        for (b, surface) in spectrum.outer_iter().enumerate() {
            let peaks = find_top_k_2d(surface, k, self.options.peaks.window, &mut self.padder);
            match mode {
                PeakMode::Hard => {
                    for (j, &(row, col)) in peaks.iter().take(k).enumerate() {
                        angle_values[[b, j]] = angles[row];
                        range_values[[b, j]] = ranges[col];
                    }
                }
                PeakMode::Soft => {
                    let windows = soft_localize_2d(
                        surface,
                        &peaks,
                        angles.view(),
                        ranges.view(),
                        half_angle,
                        half_range,
                    );
                    for (j, w) in windows.iter().take(k).enumerate() {
                        angle_values[[b, j]] = w.angle;
                        range_values[[b, j]] = w.range;
                    }
                    trace.push(windows);
                }
            }
        }
        let soft = (mode == PeakMode::Soft).then_some(SoftTrace::Surface(trace));
        Ok((
            ParameterEstimate::AnglesRanges { angles: angle_values, ranges: range_values },
            vec![MusicSpectrum::Surface(spectrum)],
            soft,
        ))
    }

    /// Score hard estimates on a labelled batch.
    ///
    /// # Returns
    /// Batch-summed loss(es), the number of items whose source-count estimate
    /// matched, and the batch size. Over- and under-estimation counters are
    /// updated as a side effect.
    ///
    /// # Errors
    /// - `MusicError::EmptyBatch`, `MusicError::MixedSourceCounts`.
    /// - `MusicError::MissingRangeLabels` for range targets without ranges.
    /// - `MusicError::ShapeMismatch` when labels disagree with the batch.
    /// - Any error from [`MusicEstimator::estimate`].
    pub fn evaluate(&mut self, batch: &EvaluationBatch) -> MusicResult<EvaluationOutcome> {
        let batch_size = batch.covariance.len_of(Axis(0));
        if batch_size == 0 {
            return Err(MusicError::EmptyBatch);
        }
        if batch.sources_num.len() != batch_size {
            return Err(MusicError::ShapeMismatch {
                what: "source counts",
                expected: batch_size,
                actual: batch.sources_num.len(),
            });
        }
        let first = batch.sources_num[0];
        if let Some(&other) = batch.sources_num.iter().find(|&&n| n != first) {
            return Err(MusicError::MixedSourceCounts { first, other });
        }
        if batch.angles.dim() != (batch_size, first) {
            return Err(MusicError::ShapeMismatch {
                what: "angle labels",
                expected: batch_size * first,
                actual: batch.angles.len(),
            });
        }
        let ranges = match (self.target.has_range(), batch.ranges.as_ref()) {
            (true, None) => return Err(MusicError::MissingRangeLabels),
            (_, ranges) => ranges,
        };

        let known_angles = (self.target == EstimationTarget::Range).then(|| batch.angles.view());
        let estimation =
            self.estimate(batch.covariance.view(), first, known_angles, None, PeakMode::Hard)?;

        let loss = match (self.criterion, &estimation.parameters, ranges) {
            (Criterion::Angle(rmspe), ParameterEstimate::Angles(pred), _) => {
                EvaluationLoss::Single(rmspe.angles(pred.view(), batch.angles.view())?.sum())
            }
            (Criterion::Range(rmspe), ParameterEstimate::Ranges(pred), Some(truth)) => {
                EvaluationLoss::Single(rmspe.ranges(pred.view(), truth.view())?.sum())
            }
            (
                Criterion::AngleRange { joint, separated },
                ParameterEstimate::AnglesRanges { angles, ranges: pred_ranges },
                Some(truth),
            ) => {
                let cartesian =
                    joint.loss(angles.view(), batch.angles.view(), pred_ranges.view(), truth.view())?;
                let parts = separated.separated(
                    angles.view(),
                    batch.angles.view(),
                    pred_ranges.view(),
                    truth.view(),
                )?;
                EvaluationLoss::AngleRange {
                    joint: cartesian.sum(),
                    angle: parts.angle.sum(),
                    range: parts.range.sum(),
                }
            }
            _ => {
                return Err(MusicError::UnsupportedTarget {
                    field: self.field.as_str(),
                    target: self.target.as_str(),
                });
            }
        };

        let source_accuracy =
            self.source_estimation_accuracy(first, estimation.source_estimation.as_ref());
        Ok(EvaluationOutcome { loss, source_accuracy, batch_size })
    }

    fn source_estimation_accuracy(&mut self, truth: usize, estimate: Option<&Array1<usize>>) -> usize {
        let Some(estimate) = estimate else {
            return 0;
        };
        self.over_estimation_counter += estimate.iter().filter(|&&e| e > truth).count();
        self.under_estimation_counter += estimate.iter().filter(|&&e| e < truth).count();
        estimate.iter().filter(|&&e| e == truth).count()
    }

    /// Rebuild the search grid and shared dictionary from the current array.
    ///
    /// Cell sizes are kept; use [`MusicEstimator::init_cells`] to reseed them.
    pub fn rebuild_grid(&mut self) -> MusicResult<()> {
        let grid = build_search_grid(
            self.field,
            self.target,
            &self.options.grid,
            self.array.fresnel(),
            self.array.fraunhofer(),
        )?;
        self.steering = build_dictionary(&self.array, self.field, self.target, &grid)?;
        self.grid = grid;
        Ok(())
    }

    /// Resize the array, then rebuild the grid for the new geometry.
    ///
    /// When the rebuild fails the array is restored to its previous size.
    pub fn resize_array(&mut self, sensors: usize) -> MusicResult<()> {
        let previous = self.array.sensors();
        self.array.resize(sensors)?;
        if let Err(err) = self.rebuild_grid() {
            self.array.resize(previous)?;
            return Err(err);
        }
        Ok(())
    }

    /// One multiplicative decay step of the soft-localizer cells.
    pub fn shrink_cell_size(&mut self) {
        self.cells.shrink();
    }

    /// Reseed the cells as odd fractions of the current grid lengths.
    pub fn init_cells(&mut self, coefficient: f64) -> MusicResult<()> {
        self.cells = CellSize::init(self.target, &self.grid, coefficient)?;
        self.options.cell_coefficient = coefficient;
        Ok(())
    }

    fn line_half_width(&self) -> usize {
        match self.cells {
            CellSize::Line { half_width, .. } => half_width,
            CellSize::Surface { angle, .. } => angle,
        }
    }

    pub fn field(&self) -> FieldType {
        self.field
    }

    pub fn target(&self) -> EstimationTarget {
        self.target
    }

    pub fn options(&self) -> &MusicOptions {
        &self.options
    }

    pub fn grid(&self) -> &SearchGrid {
        &self.grid
    }

    pub fn steering(&self) -> Option<&SteeringDictionary> {
        self.steering.as_ref()
    }

    pub fn cells(&self) -> CellSize {
        self.cells
    }

    pub fn criterion(&self) -> Criterion {
        self.criterion
    }

    pub fn array(&self) -> &A {
        &self.array
    }

    pub fn separator(&self) -> &S {
        &self.separator
    }

    pub fn under_estimation_counter(&self) -> usize {
        self.under_estimation_counter
    }

    pub fn over_estimation_counter(&self) -> usize {
        self.over_estimation_counter
    }

    pub fn reset_counters(&mut self) {
        self.under_estimation_counter = 0;
        self.over_estimation_counter = 0;
    }
}

impl<A: ArrayModel, S: SubspaceSeparator> fmt::Display for MusicEstimator<A, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.target.estimator_name())
    }
}

/// Check the covariance batch and the requested source count.
///
/// Returns the batch size.
fn validate_covariance(
    covariance: ArrayView3<'_, Complex64>, number_of_sources: usize,
) -> MusicResult<usize> {
    let (batch, rows, cols) = covariance.dim();
    if batch == 0 {
        return Err(MusicError::EmptyBatch);
    }
    if rows != cols {
        return Err(MusicError::ShapeMismatch {
            what: "covariance columns",
            expected: rows,
            actual: cols,
        });
    }
    if number_of_sources == 0 || number_of_sources >= rows {
        return Err(MusicError::InvalidSourceCount { sources: number_of_sources, sensors: rows });
    }
    for (b, item) in covariance.outer_iter().enumerate() {
        if item.iter().any(|c| !c.re.is_finite() || !c.im.is_finite()) {
            return Err(MusicError::NonFiniteCovariance { batch: b });
        }
    }
    Ok(batch)
}

fn grid_axis<'a>(
    axis: Option<&'a Array1<f64>>, what: &'static str,
) -> MusicResult<&'a Array1<f64>> {
    axis.ok_or(MusicError::ShapeMismatch { what, expected: 1, actual: 0 })
}

fn line_spectrum(
    dictionary: &SteeringDictionary, noise: ArrayView3<'_, Complex64>, max_batched_bytes: usize,
) -> MusicResult<Array2<f64>> {
    match music_spectrum(&inverse_spectrum(dictionary, noise, max_batched_bytes)?) {
        MusicSpectrum::Line(s) => Ok(s),
        MusicSpectrum::Surface(s) => Err(MusicError::ShapeMismatch {
            what: "line spectrum rank",
            expected: 2,
            actual: s.ndim(),
        }),
    }
}

/// Hard or soft estimates for every row of a `batch × grid` spectrum.
fn extract_line(
    spectrum: &Array2<f64>, grid: ArrayView1<'_, f64>, k: usize, mode: PeakMode, half: usize,
    padder: &mut PeakPadder,
) -> (Array2<f64>, Option<Vec<Vec<SoftWindow1d>>>) {
    let mut values = Array2::<f64>::zeros((spectrum.nrows(), k));
    let mut trace = Vec::new();
    for (b, row) in spectrum.outer_iter().enumerate() {
        let peaks = find_top_k_1d(row, k, padder);
        match mode {
            PeakMode::Hard => {
                for (j, &p) in peaks.iter().take(k).enumerate() {
                    values[[b, j]] = grid[p];
                }
            }
            PeakMode::Soft => {
                let windows = soft_localize_1d(row, &peaks, grid, half);
                for (j, w) in windows.iter().take(k).enumerate() {
                    values[[b, j]] = w.value;
                }
                trace.push(windows);
            }
        }
    }
    (values, (mode == PeakMode::Soft).then_some(trace))
}
