//! Evaluation losses — permutation-invariant RMSPE and Cartesian errors.
//!
//! Purpose
//! -------
//! Score predicted source parameters against ground truth without knowing
//! which prediction belongs to which source: every loss is minimised over all
//! permutations of the predicted sources, per batch item.
//!
//! Key behaviors
//! -------------
//! - [`RmspeLoss`]: root-mean-square periodic error. Angle errors are wrapped
//!   into `[-π/2, π/2)`; range errors are plain differences. The joint form
//!   weights the two by a balance factor.
//! - [`CartesianLoss`]: root-mean-square distance between source positions
//!   `(r cos θ, r sin θ)` in the array plane.
//! - [`Criterion`]: the loss bundle selected once from the estimation target.
//!
//! Invariants & assumptions
//! ------------------------
//! - Predictions and targets share the shape `batch × sources`.
//! - Permutations are enumerated exhaustively; source counts are small.
//!
//! Conventions
//! -----------
//! - Every loss returns one value per batch item; callers sum as needed.
use crate::estimation::{
    core::field::EstimationTarget,
    errors::{MusicError, MusicResult},
};
use ndarray::{Array1, ArrayView1, ArrayView2};
use std::f64::consts::{FRAC_PI_2, PI};

/// Wrap an angle difference into `[-π/2, π/2)`.
pub fn wrap_angle_error(diff: f64) -> f64 {
    (diff + FRAC_PI_2).rem_euclid(PI) - FRAC_PI_2
}

/// All permutations of `0..n` in lexicographic order.
pub fn permutations(n: usize) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    let mut current: Vec<usize> = (0..n).collect();
    loop {
        out.push(current.clone());
        let Some(i) = (1..n).rev().find(|&i| current[i - 1] < current[i]) else {
            return out;
        };
        let pivot = i - 1;
        let Some(j) = (i..n).rev().find(|&j| current[j] > current[pivot]) else {
            return out;
        };
        current.swap(pivot, j);
        current[i..].reverse();
    }
}

fn check_shapes(
    prediction: ArrayView2<'_, f64>, target: ArrayView2<'_, f64>, what: &'static str,
) -> MusicResult<()> {
    if prediction.dim() != target.dim() {
        return Err(MusicError::ShapeMismatch {
            what,
            expected: target.len(),
            actual: prediction.len(),
        });
    }
    Ok(())
}

fn rms<F: Fn(usize, usize) -> f64>(perm: &[usize], sq_err: F) -> f64 {
    if perm.is_empty() {
        return 0.0;
    }
    let total: f64 = perm.iter().enumerate().map(|(t, &p)| sq_err(p, t)).sum();
    (total / perm.len() as f64).sqrt()
}

/// Root-mean-square periodic error with an angle/range balance factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RmspeLoss {
    balance_factor: f64,
}

/// Per-item joint RMSPE with its angle and range components, all evaluated at
/// the permutation minimising the joint value.
#[derive(Debug, Clone, PartialEq)]
pub struct SeparatedRmspe {
    pub joint: Array1<f64>,
    pub angle: Array1<f64>,
    pub range: Array1<f64>,
}

impl RmspeLoss {
    /// Errors
    /// ------
    /// - `MusicError::InvalidBalanceFactor` when `balance_factor` is outside
    ///   `[0, 1]`.
    pub fn new(balance_factor: f64) -> MusicResult<Self> {
        if !(0.0..=1.0).contains(&balance_factor) {
            return Err(MusicError::InvalidBalanceFactor { value: balance_factor });
        }
        Ok(RmspeLoss { balance_factor })
    }

    pub fn balance_factor(&self) -> f64 {
        self.balance_factor
    }

    /// Per-item minimum wrapped angle RMSPE.
    pub fn angles(
        &self, prediction: ArrayView2<'_, f64>, target: ArrayView2<'_, f64>,
    ) -> MusicResult<Array1<f64>> {
        check_shapes(prediction, target, "angle predictions")?;
        let perms = permutations(target.ncols());
        Ok(prediction
            .outer_iter()
            .zip(target.outer_iter())
            .map(|(p, t)| {
                min_over(&perms, |perm| rms(perm, |i, j| wrap_angle_error(p[i] - t[j]).powi(2)))
            })
            .collect())
    }

    /// Per-item minimum range RMSE.
    pub fn ranges(
        &self, prediction: ArrayView2<'_, f64>, target: ArrayView2<'_, f64>,
    ) -> MusicResult<Array1<f64>> {
        check_shapes(prediction, target, "range predictions")?;
        let perms = permutations(target.ncols());
        Ok(prediction
            .outer_iter()
            .zip(target.outer_iter())
            .map(|(p, t)| min_over(&perms, |perm| rms(perm, |i, j| (p[i] - t[j]).powi(2))))
            .collect())
    }

    /// Joint `β · angle + (1 − β) · range` RMSPE, with the components at the
    /// minimising permutation.
    pub fn separated(
        &self, angle_prediction: ArrayView2<'_, f64>, angle_target: ArrayView2<'_, f64>,
        range_prediction: ArrayView2<'_, f64>, range_target: ArrayView2<'_, f64>,
    ) -> MusicResult<SeparatedRmspe> {
        check_shapes(angle_prediction, angle_target, "angle predictions")?;
        check_shapes(range_prediction, range_target, "range predictions")?;
        check_shapes(range_target, angle_target, "range targets")?;
        let perms = permutations(angle_target.ncols());
        let batch = angle_target.nrows();
        let mut out = SeparatedRmspe {
            joint: Array1::zeros(batch),
            angle: Array1::zeros(batch),
            range: Array1::zeros(batch),
        };
        let beta = self.balance_factor;
        for b in 0..batch {
            let (pa, ta) = (angle_prediction.row(b), angle_target.row(b));
            let (pr, tr) = (range_prediction.row(b), range_target.row(b));
            let mut best = (f64::INFINITY, 0.0, 0.0);
            for perm in &perms {
                let angle = rms(perm, |i, j| wrap_angle_error(pa[i] - ta[j]).powi(2));
                let range = rms(perm, |i, j| (pr[i] - tr[j]).powi(2));
                let joint = beta * angle + (1.0 - beta) * range;
                if joint < best.0 {
                    best = (joint, angle, range);
                }
            }
            out.joint[b] = best.0;
            out.angle[b] = best.1;
            out.range[b] = best.2;
        }
        Ok(out)
    }
}

/// Root-mean-square planar distance between predicted and true positions.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CartesianLoss;

impl CartesianLoss {
    /// Per-item minimum RMS distance over source permutations.
    pub fn loss(
        &self, angle_prediction: ArrayView2<'_, f64>, angle_target: ArrayView2<'_, f64>,
        range_prediction: ArrayView2<'_, f64>, range_target: ArrayView2<'_, f64>,
    ) -> MusicResult<Array1<f64>> {
        check_shapes(angle_prediction, angle_target, "angle predictions")?;
        check_shapes(range_prediction, range_target, "range predictions")?;
        check_shapes(range_target, angle_target, "range targets")?;
        let perms = permutations(angle_target.ncols());
        let position = |a: ArrayView1<'_, f64>, r: ArrayView1<'_, f64>, i: usize| {
            (r[i] * a[i].cos(), r[i] * a[i].sin())
        };
        Ok((0..angle_target.nrows())
            .map(|b| {
                let (pa, ta) = (angle_prediction.row(b), angle_target.row(b));
                let (pr, tr) = (range_prediction.row(b), range_target.row(b));
                min_over(&perms, |perm| {
                    rms(perm, |i, j| {
                        let (px, py) = position(pa, pr, i);
                        let (tx, ty) = position(ta, tr, j);
                        (px - tx).powi(2) + (py - ty).powi(2)
                    })
                })
            })
            .collect())
    }
}

fn min_over<F: Fn(&[usize]) -> f64>(perms: &[Vec<usize>], f: F) -> f64 {
    perms.iter().map(|p| f(p)).fold(f64::INFINITY, f64::min)
}

/// Loss bundle for an estimation target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Criterion {
    Angle(RmspeLoss),
    Range(RmspeLoss),
    AngleRange { joint: CartesianLoss, separated: RmspeLoss },
}

impl Criterion {
    pub fn for_target(target: EstimationTarget) -> Self {
        match target {
            EstimationTarget::Angle => Criterion::Angle(RmspeLoss { balance_factor: 1.0 }),
            EstimationTarget::Range => Criterion::Range(RmspeLoss { balance_factor: 0.0 }),
            EstimationTarget::AngleRange => Criterion::AngleRange {
                joint: CartesianLoss,
                separated: RmspeLoss { balance_factor: 1.0 },
            },
        }
    }
}
