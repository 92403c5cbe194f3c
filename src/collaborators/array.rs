//! Array model — steering vectors and near-field distances of a sensor array.
//!
//! Purpose
//! -------
//! Define the [`ArrayModel`] seam the estimator consumes, plus a reference
//! [`UniformLinearArray`] implementation used by tests, simulations, and the
//! Python bindings.
//!
//! Key behaviors
//! -------------
//! - Far-field steering: plane-wave phase `exp(j 2π x_n sin θ / λ)`.
//! - Near-field steering: exact spherical phase
//!   `exp(-j 2π (‖p(θ, r) - x_n‖ - r) / λ)`, which reduces to the far-field
//!   vector as `r → ∞`.
//! - Fresnel distance `0.62 · sqrt(D³ / λ)` and Fraunhofer distance `2 D² / λ`
//!   for aperture `D`.
//! - Analytic model covariance and seeded snapshot simulation for scenarios.
//!
//! Invariants & assumptions
//! ------------------------
//! - Sensors lie on a line, centred on the origin, with uniform spacing given
//!   in wavelengths.
//! - Angles are in radians measured from broadside.
//!
//! Conventions
//! -----------
//! - Steering outputs are `sensors × grid` (far) and
//!   `sensors × angles × ranges` (near) in `Complex64`.
use crate::estimation::errors::{MusicError, MusicResult};
use ndarray::{Array1, Array2, Array3, ArrayView1};
use num_complex::Complex64;
use rand::Rng;
use statrs::distribution::Normal;
use std::f64::consts::PI;

/// Sensor-array collaborator consumed by the estimator.
///
/// Implementations may fail through `anyhow::Error`; the estimator maps such
/// failures to `MusicError::Anyhow`.
pub trait ArrayModel {
    /// Current number of sensors.
    fn sensors(&self) -> usize;

    /// Plane-wave steering matrix, `sensors × angles.len()`.
    fn far_field_steering(&self, angles: ArrayView1<'_, f64>) -> anyhow::Result<Array2<Complex64>>;

    /// Spherical-wave steering tensor, `sensors × angles.len() × ranges.len()`.
    fn near_field_steering(
        &self, angles: ArrayView1<'_, f64>, ranges: ArrayView1<'_, f64>,
    ) -> anyhow::Result<Array3<Complex64>>;

    /// Fresnel distance; inner bound of the near field.
    fn fresnel(&self) -> f64;

    /// Fraunhofer distance; outer bound of the near field.
    fn fraunhofer(&self) -> f64;

    /// Change the number of active sensors.
    fn resize(&mut self, sensors: usize) -> anyhow::Result<()>;
}

/// UniformLinearArray — centred ULA with spacing in wavelengths.
///
/// Fields
/// ------
/// - `sensors`: number of elements (≥ 2).
/// - `spacing`: inter-element spacing in wavelengths (e.g. `0.5`).
/// - `wavelength`: carrier wavelength in the range unit.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformLinearArray {
    sensors: usize,
    spacing: f64,
    wavelength: f64,
}

impl UniformLinearArray {
    /// Errors
    /// ------
    /// - `MusicError::TooFewSensors` when `sensors < 2`.
    /// - `MusicError::InvalidArrayGeometry` for non-finite or non-positive
    ///   spacing or wavelength.
    pub fn new(sensors: usize, spacing: f64, wavelength: f64) -> MusicResult<Self> {
        if sensors < 2 {
            return Err(MusicError::TooFewSensors { sensors });
        }
        if !spacing.is_finite() || spacing <= 0.0 {
            return Err(MusicError::InvalidArrayGeometry { name: "spacing", value: spacing });
        }
        if !wavelength.is_finite() || wavelength <= 0.0 {
            return Err(MusicError::InvalidArrayGeometry { name: "wavelength", value: wavelength });
        }
        Ok(UniformLinearArray { sensors, spacing, wavelength })
    }

    /// Half-wavelength array at unit wavelength.
    pub fn half_wavelength(sensors: usize) -> MusicResult<Self> {
        Self::new(sensors, 0.5, 1.0)
    }

    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    pub fn wavelength(&self) -> f64 {
        self.wavelength
    }

    /// Physical aperture `(N - 1) · d · λ`.
    pub fn aperture(&self) -> f64 {
        (self.sensors as f64 - 1.0) * self.spacing * self.wavelength
    }

    /// Sensor coordinates along the array axis, centred on the origin.
    pub fn positions(&self) -> Array1<f64> {
        let centre = (self.sensors as f64 - 1.0) / 2.0;
        Array1::from_iter(
            (0..self.sensors).map(|n| (n as f64 - centre) * self.spacing * self.wavelength),
        )
    }

    /// Steering vector for one source; `range = None` uses the far field.
    pub fn steering_vector(&self, angle: f64, range: Option<f64>) -> Array1<Complex64> {
        let k = 2.0 * PI / self.wavelength;
        let sin = angle.sin();
        self.positions().mapv(|x| match range {
            None => Complex64::from_polar(1.0, k * x * sin),
            Some(r) => {
                let distance = (r * r + x * x - 2.0 * r * x * sin).sqrt();
                Complex64::from_polar(1.0, -k * (distance - r))
            }
        })
    }

    /// Model covariance `Σ_m p_m a_m a_mᴴ + σ² I` for uncorrelated sources.
    ///
    /// Parameters
    /// ----------
    /// - `angles`: source directions in radians.
    /// - `ranges`: optional source ranges (same length as `angles`).
    /// - `power`: per-source signal power.
    /// - `noise_variance`: sensor noise power.
    ///
    /// Errors
    /// ------
    /// - `MusicError::ShapeMismatch` when `ranges` has a different length.
    pub fn model_covariance(
        &self, angles: &[f64], ranges: Option<&[f64]>, power: f64, noise_variance: f64,
    ) -> MusicResult<Array2<Complex64>> {
        if let Some(r) = ranges {
            if r.len() != angles.len() {
                return Err(MusicError::ShapeMismatch {
                    what: "source ranges",
                    expected: angles.len(),
                    actual: r.len(),
                });
            }
        }
        let n = self.sensors;
        let mut cov = Array2::<Complex64>::zeros((n, n));
        for (m, &angle) in angles.iter().enumerate() {
            let a = self.steering_vector(angle, ranges.map(|r| r[m]));
            for i in 0..n {
                for j in 0..n {
                    cov[[i, j]] += a[i] * a[j].conj() * power;
                }
            }
        }
        for i in 0..n {
            cov[[i, i]] += Complex64::new(noise_variance, 0.0);
        }
        Ok(cov)
    }

    /// Simulate `snapshots` array observations, `sensors × snapshots`.
    ///
    /// Source amplitudes are circular complex Gaussian with power
    /// `10^(snr_db / 10)`; sensor noise is circular complex Gaussian with unit
    /// power.
    ///
    /// Errors
    /// ------
    /// - `MusicError::ShapeMismatch` when `ranges` has a different length.
    /// - `MusicError::InvalidNoiseLevel` when `snr_db` is not finite.
    pub fn simulate_snapshots<R: Rng + ?Sized>(
        &self, angles: &[f64], ranges: Option<&[f64]>, snr_db: f64, snapshots: usize,
        rng: &mut R,
    ) -> MusicResult<Array2<Complex64>> {
        if let Some(r) = ranges {
            if r.len() != angles.len() {
                return Err(MusicError::ShapeMismatch {
                    what: "source ranges",
                    expected: angles.len(),
                    actual: r.len(),
                });
            }
        }
        let signal_power = 10f64.powf(snr_db / 10.0);
        let signal = Normal::new(0.0, (signal_power / 2.0).sqrt())?;
        let noise = Normal::new(0.0, 0.5f64.sqrt())?;
        let steering: Vec<Array1<Complex64>> = angles
            .iter()
            .enumerate()
            .map(|(m, &angle)| self.steering_vector(angle, ranges.map(|r| r[m])))
            .collect();

        let mut x = Array2::<Complex64>::zeros((self.sensors, snapshots));
        for t in 0..snapshots {
            for a in &steering {
                let s = Complex64::new(rng.sample(signal), rng.sample(signal));
                for n in 0..self.sensors {
                    x[[n, t]] += a[n] * s;
                }
            }
            for n in 0..self.sensors {
                x[[n, t]] += Complex64::new(rng.sample(noise), rng.sample(noise));
            }
        }
        Ok(x)
    }
}

impl ArrayModel for UniformLinearArray {
    fn sensors(&self) -> usize {
        self.sensors
    }

    fn far_field_steering(&self, angles: ArrayView1<'_, f64>) -> anyhow::Result<Array2<Complex64>> {
        let mut out = Array2::<Complex64>::zeros((self.sensors, angles.len()));
        for (g, &angle) in angles.iter().enumerate() {
            out.column_mut(g).assign(&self.steering_vector(angle, None));
        }
        Ok(out)
    }

    fn near_field_steering(
        &self, angles: ArrayView1<'_, f64>, ranges: ArrayView1<'_, f64>,
    ) -> anyhow::Result<Array3<Complex64>> {
        let mut out = Array3::<Complex64>::zeros((self.sensors, angles.len(), ranges.len()));
        for (i, &angle) in angles.iter().enumerate() {
            for (j, &range) in ranges.iter().enumerate() {
                let a = self.steering_vector(angle, Some(range));
                for n in 0..self.sensors {
                    out[[n, i, j]] = a[n];
                }
            }
        }
        Ok(out)
    }

    fn fresnel(&self) -> f64 {
        0.62 * (self.aperture().powi(3) / self.wavelength).sqrt()
    }

    fn fraunhofer(&self) -> f64 {
        2.0 * self.aperture().powi(2) / self.wavelength
    }

    fn resize(&mut self, sensors: usize) -> anyhow::Result<()> {
        anyhow::ensure!(sensors >= 2, "array needs at least two sensors, got {sensors}");
        self.sensors = sensors;
        Ok(())
    }
}
