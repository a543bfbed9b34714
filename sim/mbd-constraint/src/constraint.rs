//! Scalar holonomic constraints between two bodies.
//!
//! # Constraint Formulations
//!
//! Every constraint is one scalar equation `Φ(q) − f(t) = 0` between body `i`
//! and body `j` (either may be ground). With `a = A·ā`, `P` points given by
//! body-fixed offsets `s̄`, and `d = r_j + A_j s̄_j − r_i − A_i s̄_i`:
//!
//! ```text
//! DP1   a_iᵀ a_j = f(t)      dot product of two body-fixed axes
//! DP2   a_iᵀ d   = f(t)      axis on i against the vector P_i → P_j
//! CD    cᵀ d     = f(t)      coordinate difference along global axis c
//! D     dᵀ d     = f(t)      squared distance between P_i and P_j
//! ```
//!
//! # Jacobians
//!
//! Rotational variations are body-frame angular increments `δπ̄`, so
//! `δA = A·δπ̄~` and `δa = −A ã δπ̄`. For each constraint this yields a
//! translational row `Φ_r` and a rotational row `Π`, each `3·nb` wide,
//! plus the velocity right-hand side `ν = ḟ` and the acceleration right-hand
//! side `γ = f̈ − (terms quadratic in ω and ṙ)`, such that
//!
//! ```text
//! Φ_r ṙ + Π ω̄ = ν          Φ_r r̈ + Π ω̄̇ = γ
//! ```

use nalgebra::{Matrix3, RowDVector, RowVector3, Vector3};

use mbd_types::math::skew_symmetric;
use mbd_types::{Body, BodyId, Result, SimError};

use crate::DrivingFunction;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One end of a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BodyRef {
    /// The fixed global frame.
    Ground,
    /// A body in the system's body list.
    Body(BodyId),
}

impl BodyRef {
    /// Reference to the body at `index`.
    #[must_use]
    pub const fn body(index: usize) -> Self {
        Self::Body(BodyId::new(index))
    }

    /// Index of the referenced body, if it is not ground.
    #[must_use]
    pub fn index(self) -> Option<usize> {
        match self {
            Self::Ground => None,
            Self::Body(id) => Some(id.index()),
        }
    }
}

impl From<BodyId> for BodyRef {
    fn from(id: BodyId) -> Self {
        Self::Body(id)
    }
}

/// Geometric relation encoded by a constraint.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConstraintKind {
    /// `ā_iᵀ A_iᵀ A_j ā_j = f(t)`.
    DotProduct1 {
        /// Axis on body `i` (body frame).
        a_i: Vector3<f64>,
        /// Axis on body `j` (body frame).
        a_j: Vector3<f64>,
    },
    /// `ā_iᵀ A_iᵀ d_ij = f(t)`.
    DotProduct2 {
        /// Axis on body `i` (body frame).
        a_i: Vector3<f64>,
        /// Point `P` on body `i` (body frame).
        s_i: Vector3<f64>,
        /// Point `Q` on body `j` (body frame).
        s_j: Vector3<f64>,
    },
    /// `cᵀ d_ij = f(t)`.
    CoordinateDifference {
        /// Global direction.
        c: Vector3<f64>,
        /// Point `P` on body `i` (body frame).
        s_i: Vector3<f64>,
        /// Point `Q` on body `j` (body frame).
        s_j: Vector3<f64>,
    },
    /// `d_ijᵀ d_ij = f(t)`.
    Distance {
        /// Point `P` on body `i` (body frame).
        s_i: Vector3<f64>,
        /// Point `Q` on body `j` (body frame).
        s_j: Vector3<f64>,
    },
}

impl ConstraintKind {
    /// Short tag used in logs and model files.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::DotProduct1 { .. } => "DP1",
            Self::DotProduct2 { .. } => "DP2",
            Self::CoordinateDifference { .. } => "CD",
            Self::Distance { .. } => "D",
        }
    }
}

/// Per-body blocks of one constraint's Jacobian row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JacobianBlocks {
    /// `∂Φ/∂r_i`.
    pub r_i: RowVector3<f64>,
    /// `∂Φ/∂r_j`.
    pub r_j: RowVector3<f64>,
    /// `∂Φ/∂π̄_i`.
    pub pi_i: RowVector3<f64>,
    /// `∂Φ/∂π̄_j`.
    pub pi_j: RowVector3<f64>,
}

/// Kinematic state of one constraint end.
#[derive(Debug, Clone, Copy)]
struct End {
    r: Vector3<f64>,
    a: Matrix3<f64>,
    dr: Vector3<f64>,
    omega: Vector3<f64>,
}

impl End {
    fn resolve(body: BodyRef, bodies: &[Body]) -> Self {
        match body {
            BodyRef::Ground => Self {
                r: Vector3::zeros(),
                a: Matrix3::identity(),
                dr: Vector3::zeros(),
                omega: Vector3::zeros(),
            },
            BodyRef::Body(id) => {
                let b = &bodies[id.index()];
                Self {
                    r: b.position,
                    a: b.orientation,
                    dr: b.velocity,
                    omega: b.angular_velocity,
                }
            }
        }
    }

    /// Global image `A·v̄`.
    fn global(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.a * v
    }

    /// `A·ṽ`, so that `δ(A v̄) = −A ṽ δπ̄`.
    fn a_skew(&self, v: &Vector3<f64>) -> Matrix3<f64> {
        self.a * skew_symmetric(v)
    }

    /// Time derivative of `A·v̄`: `A (ω × v̄)`.
    fn rate(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.a * self.omega.cross(v)
    }

    /// Centripetal part of the second derivative of `A·v̄`: `A (ω × (ω × v̄))`.
    fn quadratic(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.a * self.omega.cross(&self.omega.cross(v))
    }

    /// Global position of body point `s̄`.
    fn point(&self, s: &Vector3<f64>) -> Vector3<f64> {
        self.r + self.global(s)
    }

    /// Global velocity of body point `s̄`.
    fn point_velocity(&self, s: &Vector3<f64>) -> Vector3<f64> {
        self.dr + self.rate(s)
    }
}

/// A scalar holonomic constraint, optionally driven by a function of time.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Constraint {
    name: String,
    kind: ConstraintKind,
    body_i: BodyRef,
    body_j: BodyRef,
    target: DrivingFunction,
}

impl Constraint {
    /// Create a constraint with a zero target.
    #[must_use]
    pub fn new(kind: ConstraintKind, body_i: BodyRef, body_j: BodyRef) -> Self {
        Self {
            name: kind.tag().to_string(),
            kind,
            body_i,
            body_j,
            target: DrivingFunction::default(),
        }
    }

    /// DP1: axes `ā_i` on `i` and `ā_j` on `j`.
    #[must_use]
    pub fn dot_product_1(
        body_i: BodyRef,
        a_i: Vector3<f64>,
        body_j: BodyRef,
        a_j: Vector3<f64>,
    ) -> Self {
        Self::new(ConstraintKind::DotProduct1 { a_i, a_j }, body_i, body_j)
    }

    /// DP2: axis `ā_i` on `i` against the vector from `s̄_i` to `s̄_j`.
    #[must_use]
    pub fn dot_product_2(
        body_i: BodyRef,
        a_i: Vector3<f64>,
        s_i: Vector3<f64>,
        body_j: BodyRef,
        s_j: Vector3<f64>,
    ) -> Self {
        Self::new(ConstraintKind::DotProduct2 { a_i, s_i, s_j }, body_i, body_j)
    }

    /// CD: component of the vector from `s̄_i` to `s̄_j` along global `c`.
    #[must_use]
    pub fn coordinate_difference(
        c: Vector3<f64>,
        body_i: BodyRef,
        s_i: Vector3<f64>,
        body_j: BodyRef,
        s_j: Vector3<f64>,
    ) -> Self {
        Self::new(
            ConstraintKind::CoordinateDifference { c, s_i, s_j },
            body_i,
            body_j,
        )
    }

    /// D: distance between `s̄_i` and `s̄_j` held at `length`.
    ///
    /// Formulated on the squared distance, so the target is `length²`.
    #[must_use]
    pub fn distance(
        body_i: BodyRef,
        s_i: Vector3<f64>,
        body_j: BodyRef,
        s_j: Vector3<f64>,
        length: f64,
    ) -> Self {
        Self::new(ConstraintKind::Distance { s_i, s_j }, body_i, body_j)
            .with_target(DrivingFunction::Constant(length * length))
    }

    /// Three CD constraints pinning `s̄_i` on `i` to `s̄_j` on `j`.
    #[must_use]
    pub fn spherical(
        body_i: BodyRef,
        s_i: Vector3<f64>,
        body_j: BodyRef,
        s_j: Vector3<f64>,
    ) -> [Self; 3] {
        [Vector3::x(), Vector3::y(), Vector3::z()]
            .map(|c| Self::coordinate_difference(c, body_i, s_i, body_j, s_j))
    }

    /// Set a display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the prescribed value `f(t)`.
    #[must_use]
    pub fn with_target(mut self, target: DrivingFunction) -> Self {
        self.target = target;
        self
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Geometric relation.
    #[must_use]
    pub fn kind(&self) -> &ConstraintKind {
        &self.kind
    }

    /// First body.
    #[must_use]
    pub fn body_i(&self) -> BodyRef {
        self.body_i
    }

    /// Second body.
    #[must_use]
    pub fn body_j(&self) -> BodyRef {
        self.body_j
    }

    /// Prescribed value.
    #[must_use]
    pub fn target(&self) -> &DrivingFunction {
        &self.target
    }

    /// Whether the prescribed value varies with time.
    #[must_use]
    pub fn is_driving(&self) -> bool {
        !self.target.is_constant()
    }

    /// Check that both ends refer to bodies within `0..nb`.
    pub fn validate(&self, nb: usize) -> Result<()> {
        for end in [self.body_i, self.body_j] {
            if let Some(index) = end.index() {
                if index >= nb {
                    return Err(SimError::InvalidBodyRef {
                        index,
                        body_count: nb,
                    });
                }
            }
        }
        Ok(())
    }

    /// Position-level residual `Φ(q) − f(t)`.
    #[must_use]
    pub fn phi(&self, bodies: &[Body], t: f64) -> f64 {
        let (ei, ej) = self.ends(bodies);
        let value = match &self.kind {
            ConstraintKind::DotProduct1 { a_i, a_j } => ei.global(a_i).dot(&ej.global(a_j)),
            ConstraintKind::DotProduct2 { a_i, s_i, s_j } => {
                ei.global(a_i).dot(&(ej.point(s_j) - ei.point(s_i)))
            }
            ConstraintKind::CoordinateDifference { c, s_i, s_j } => {
                c.dot(&(ej.point(s_j) - ei.point(s_i)))
            }
            ConstraintKind::Distance { s_i, s_j } => {
                (ej.point(s_j) - ei.point(s_i)).norm_squared()
            }
        };
        value - self.target.value(t)
    }

    /// Jacobian blocks for both ends at the current configuration.
    ///
    /// The blocks do not depend on time explicitly.
    #[must_use]
    pub fn jacobian(&self, bodies: &[Body]) -> JacobianBlocks {
        let (ei, ej) = self.ends(bodies);
        let zero = RowVector3::zeros();
        match &self.kind {
            ConstraintKind::DotProduct1 { a_i, a_j } => {
                let (gi, gj) = (ei.global(a_i), ej.global(a_j));
                JacobianBlocks {
                    r_i: zero,
                    r_j: zero,
                    pi_i: -gj.transpose() * ei.a_skew(a_i),
                    pi_j: -gi.transpose() * ej.a_skew(a_j),
                }
            }
            ConstraintKind::DotProduct2 { a_i, s_i, s_j } => {
                let gi = ei.global(a_i);
                let d = ej.point(s_j) - ei.point(s_i);
                JacobianBlocks {
                    r_i: -gi.transpose(),
                    r_j: gi.transpose(),
                    pi_i: -d.transpose() * ei.a_skew(a_i) + gi.transpose() * ei.a_skew(s_i),
                    pi_j: -gi.transpose() * ej.a_skew(s_j),
                }
            }
            ConstraintKind::CoordinateDifference { c, s_i, s_j } => JacobianBlocks {
                r_i: -c.transpose(),
                r_j: c.transpose(),
                pi_i: c.transpose() * ei.a_skew(s_i),
                pi_j: -c.transpose() * ej.a_skew(s_j),
            },
            ConstraintKind::Distance { s_i, s_j } => {
                let d2 = 2.0 * (ej.point(s_j) - ei.point(s_i));
                JacobianBlocks {
                    r_i: -d2.transpose(),
                    r_j: d2.transpose(),
                    pi_i: d2.transpose() * ei.a_skew(s_i),
                    pi_j: -d2.transpose() * ej.a_skew(s_j),
                }
            }
        }
    }

    /// Translational Jacobian row `∂Φ/∂r`, `3·nb` wide.
    #[must_use]
    pub fn phi_r(&self, bodies: &[Body]) -> RowDVector<f64> {
        let blocks = self.jacobian(bodies);
        self.scatter(bodies.len(), &blocks.r_i, &blocks.r_j)
    }

    /// Rotational Jacobian row `∂Φ/∂π̄`, `3·nb` wide.
    #[must_use]
    pub fn pi(&self, bodies: &[Body]) -> RowDVector<f64> {
        let blocks = self.jacobian(bodies);
        self.scatter(bodies.len(), &blocks.pi_i, &blocks.pi_j)
    }

    /// Velocity right-hand side `ν = ḟ(t)`.
    #[must_use]
    pub fn nu(&self, t: f64) -> f64 {
        self.target.velocity(t)
    }

    /// Acceleration right-hand side `γ`.
    #[must_use]
    pub fn gamma(&self, bodies: &[Body], t: f64) -> f64 {
        let (ei, ej) = self.ends(bodies);
        let quadratic = match &self.kind {
            ConstraintKind::DotProduct1 { a_i, a_j } => {
                ej.global(a_j).dot(&ei.quadratic(a_i))
                    + ei.global(a_i).dot(&ej.quadratic(a_j))
                    + 2.0 * ei.rate(a_i).dot(&ej.rate(a_j))
            }
            ConstraintKind::DotProduct2 { a_i, s_i, s_j } => {
                let d = ej.point(s_j) - ei.point(s_i);
                let d_dot = ej.point_velocity(s_j) - ei.point_velocity(s_i);
                d.dot(&ei.quadratic(a_i))
                    + 2.0 * ei.rate(a_i).dot(&d_dot)
                    + ei.global(a_i).dot(&(ej.quadratic(s_j) - ei.quadratic(s_i)))
            }
            ConstraintKind::CoordinateDifference { c, s_i, s_j } => {
                c.dot(&(ej.quadratic(s_j) - ei.quadratic(s_i)))
            }
            ConstraintKind::Distance { s_i, s_j } => {
                let d = ej.point(s_j) - ei.point(s_i);
                let d_dot = ej.point_velocity(s_j) - ei.point_velocity(s_i);
                2.0 * d_dot.norm_squared() + 2.0 * d.dot(&(ej.quadratic(s_j) - ei.quadratic(s_i)))
            }
        };
        self.target.acceleration(t) - quadratic
    }

    fn ends(&self, bodies: &[Body]) -> (End, End) {
        (
            End::resolve(self.body_i, bodies),
            End::resolve(self.body_j, bodies),
        )
    }

    /// Place the two per-body blocks into a `3·nb` row; ground blocks drop out.
    fn scatter(
        &self,
        nb: usize,
        block_i: &RowVector3<f64>,
        block_j: &RowVector3<f64>,
    ) -> RowDVector<f64> {
        let mut row = RowDVector::zeros(3 * nb);
        for (end, block) in [(self.body_i, block_i), (self.body_j, block_j)] {
            if let Some(index) = end.index() {
                let mut view = row.fixed_view_mut::<1, 3>(0, 3 * index);
                view += block;
            }
        }
        row
    }
}
