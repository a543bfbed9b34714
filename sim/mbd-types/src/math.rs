//! Rotation and block-matrix helpers.
//!
//! Every orientation update in the solver goes through one of the two finite
//! rotation maps here, which keeps `A` on the rotation manifold:
//!
//! ```text
//! exp_map(θ)            = exp(θ̃)                      (scaled axis)
//! axis_angle(u, φ)      = I + sin φ · ũ + (1 − cos φ) · ũ²   (Rodrigues)
//! ```

use nalgebra::{DMatrix, Matrix3, Rotation3, Unit, Vector3};

/// Skew-symmetric cross-product matrix: `skew_symmetric(a) * b == a × b`.
#[must_use]
pub fn skew_symmetric(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

/// Matrix exponential of the skew-symmetric generator of `theta`.
///
/// A zero vector maps to the identity.
#[must_use]
pub fn exp_map(theta: &Vector3<f64>) -> Matrix3<f64> {
    Rotation3::new(*theta).into_inner()
}

/// Finite rotation of `angle` radians about `axis` (Rodrigues formula).
///
/// The axis is normalized here; a zero axis yields the identity.
#[must_use]
pub fn axis_angle(axis: &Vector3<f64>, angle: f64) -> Matrix3<f64> {
    Unit::try_new(*axis, f64::EPSILON).map_or_else(Matrix3::identity, |unit| {
        Rotation3::from_axis_angle(&unit, angle).into_inner()
    })
}

/// Frobenius norm of `AᵀA − I`.
#[must_use]
pub fn orthogonality_error(a: &Matrix3<f64>) -> f64 {
    (a.transpose() * a - Matrix3::identity()).norm()
}

/// Check that `a` is a proper rotation (orthonormal, determinant +1).
#[must_use]
pub fn is_rotation(a: &Matrix3<f64>, eps: f64) -> bool {
    orthogonality_error(a) < eps && (a.determinant() - 1.0).abs() < eps
}

/// Assemble 3×3 blocks along the diagonal of a `3n × 3n` matrix.
#[must_use]
pub fn block_diagonal(blocks: &[Matrix3<f64>]) -> DMatrix<f64> {
    let n = blocks.len();
    let mut out = DMatrix::zeros(3 * n, 3 * n);
    for (i, block) in blocks.iter().enumerate() {
        out.fixed_view_mut::<3, 3>(3 * i, 3 * i).copy_from(block);
    }
    out
}
