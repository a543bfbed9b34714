//! Dense factor-once / solve-many wrapper and stacking helpers.

use nalgebra::{DMatrix, DVector, Dyn, Vector3, LU};

use mbd_types::{Body, Result, SimError};

/// LU factorization of a square system matrix.
///
/// Built once, then solved against any number of right-hand sides. The
/// dynamics stepper keeps one per step and reuses it across all Newton
/// iterations of that step.
#[derive(Debug, Clone)]
pub struct Factorization {
    lu: LU<f64, Dyn, Dyn>,
    context: &'static str,
    time: f64,
}

impl Factorization {
    /// Factor `matrix`. `context` and `time` label the error if it is
    /// singular.
    pub fn new(matrix: DMatrix<f64>, context: &'static str, time: f64) -> Result<Self> {
        if !matrix.is_square() {
            return Err(SimError::invalid_config(format!(
                "{context} matrix is {}×{}, expected square",
                matrix.nrows(),
                matrix.ncols()
            )));
        }
        let lu = matrix.lu();
        if !lu.is_invertible() {
            return Err(SimError::SingularMatrix { context, time });
        }
        Ok(Self { lu, context, time })
    }

    /// Solve `A·x = rhs`.
    pub fn solve(&self, rhs: &DVector<f64>) -> Result<DVector<f64>> {
        self.lu.solve(rhs).ok_or(SimError::SingularMatrix {
            context: self.context,
            time: self.time,
        })
    }

    /// Dimension of the factored matrix.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.lu.l().nrows()
    }
}

/// Stack one 3-vector per body into a `3·nb` vector.
pub(crate) fn stack<F>(bodies: &[Body], f: F) -> DVector<f64>
where
    F: Fn(&Body) -> Vector3<f64>,
{
    let mut out = DVector::zeros(3 * bodies.len());
    for (j, body) in bodies.iter().enumerate() {
        out.fixed_rows_mut::<3>(3 * j).copy_from(&f(body));
    }
    out
}

/// 3-vector block `j` of a stacked vector.
pub(crate) fn block(v: &DVector<f64>, j: usize) -> Vector3<f64> {
    v.fixed_rows::<3>(3 * j).into_owned()
}

/// Concatenate vectors end to end.
pub(crate) fn concat(parts: &[&DVector<f64>]) -> DVector<f64> {
    let len = parts.iter().map(|p| p.len()).sum();
    DVector::from_iterator(len, parts.iter().flat_map(|p| p.iter().copied()))
}

/// Symmetric saddle-point matrix
///
/// ```text
/// ┌ M    0    Φ_rᵀ ┐
/// │ 0    J    Πᵀ   │
/// └ Φ_r  Π    0    ┘
/// ```
pub(crate) fn saddle_point(
    mass: &DMatrix<f64>,
    inertia: &DMatrix<f64>,
    phi_r: &DMatrix<f64>,
    pi: &DMatrix<f64>,
) -> DMatrix<f64> {
    let n = mass.nrows();
    let nc = phi_r.nrows();
    let mut g = DMatrix::zeros(2 * n + nc, 2 * n + nc);
    g.view_mut((0, 0), (n, n)).copy_from(mass);
    g.view_mut((n, n), (n, n)).copy_from(inertia);
    g.view_mut((0, 2 * n), (n, nc)).copy_from(&phi_r.transpose());
    g.view_mut((n, 2 * n), (n, nc)).copy_from(&pi.transpose());
    g.view_mut((2 * n, 0), (nc, n)).copy_from(phi_r);
    g.view_mut((2 * n, n), (nc, n)).copy_from(pi);
    g
}
