//! Sample covariance of sensor snapshots.
use ndarray::{Array3, ArrayView3, Axis};
use num_complex::Complex64;

/// `X Xᴴ / T` for every batch item of `snapshots` (`batch × sensors × T`).
///
/// Returns a `batch × sensors × sensors` tensor; an empty snapshot axis
/// yields zeros.
pub fn sample_covariance(snapshots: ArrayView3<'_, Complex64>) -> Array3<Complex64> {
    let (batch, sensors, samples) = snapshots.dim();
    let mut out = Array3::<Complex64>::zeros((batch, sensors, sensors));
    if samples == 0 {
        return out;
    }
    let scale = 1.0 / samples as f64;
    for (b, x) in snapshots.outer_iter().enumerate() {
        let adjoint = x.t().mapv(|c| c.conj());
        out.index_axis_mut(Axis(0), b).assign(&(x.dot(&adjoint) * scale));
    }
    out
}
