//! Rigid body state and mass properties.
//!
//! A [`Body`] carries everything the solver mutates per step: position,
//! orientation, translational and angular velocity/acceleration, the applied
//! loads, and a snapshot of the previous converged configuration.

use nalgebra::{Matrix3, Vector3};

use crate::math::{is_rotation, orthogonality_error};
use crate::{Result, SimError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Index of a non-ground body in the system's body list.
///
/// Ground bodies have no index; constraints refer to them separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyId(pub usize);

impl BodyId {
    /// Create a new body ID.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Get the raw index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl From<usize> for BodyId {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

impl std::fmt::Display for BodyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Body({})", self.0)
    }
}

/// Kinematic state captured at the start of a dynamics step.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodySnapshot {
    /// Position `r_prev`.
    pub position: Vector3<f64>,
    /// Velocity `ṙ_prev`.
    pub velocity: Vector3<f64>,
    /// Orientation `A_prev`.
    pub orientation: Matrix3<f64>,
    /// Body-frame angular velocity `ω_prev`.
    pub angular_velocity: Vector3<f64>,
}

impl Default for BodySnapshot {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            velocity: Vector3::zeros(),
            orientation: Matrix3::identity(),
            angular_velocity: Vector3::zeros(),
        }
    }
}

/// One rigid body.
///
/// Mass properties are validated on construction and kept private so the
/// cached inverse inertia never goes stale; the kinematic state is public and
/// mutated in place by the solver.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Body {
    id: BodyId,
    is_ground: bool,
    mass: f64,
    inertia: Matrix3<f64>,
    inertia_inv: Matrix3<f64>,

    /// Position of the body reference point in the global frame.
    pub position: Vector3<f64>,
    /// Rotation matrix from body frame to global frame.
    pub orientation: Matrix3<f64>,
    /// Translational velocity (global frame).
    pub velocity: Vector3<f64>,
    /// Angular velocity (body frame).
    pub angular_velocity: Vector3<f64>,
    /// Translational acceleration (global frame).
    pub acceleration: Vector3<f64>,
    /// Angular acceleration (body frame).
    pub angular_acceleration: Vector3<f64>,
    /// Applied force (global frame). Gravity is added here at initialization.
    pub force: Vector3<f64>,
    /// Applied torque (body frame).
    pub torque: Vector3<f64>,

    previous: BodySnapshot,
}

impl Body {
    /// Create a body at rest at the origin.
    ///
    /// Fails if `mass` is not positive and finite or `inertia` is not
    /// symmetric positive definite.
    pub fn new(mass: f64, inertia: Matrix3<f64>) -> Result<Self> {
        let (mass, inertia, inertia_inv) = validate_mass_properties(mass, inertia)?;
        Ok(Self {
            id: BodyId::default(),
            is_ground: false,
            mass,
            inertia,
            inertia_inv,
            position: Vector3::zeros(),
            orientation: Matrix3::identity(),
            velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            acceleration: Vector3::zeros(),
            angular_acceleration: Vector3::zeros(),
            force: Vector3::zeros(),
            torque: Vector3::zeros(),
            previous: BodySnapshot::default(),
        })
    }

    /// Create a ground body.
    ///
    /// Ground is never part of the indexed body list; its mass properties are
    /// placeholders.
    #[must_use]
    pub fn ground() -> Self {
        Self {
            id: BodyId::default(),
            is_ground: true,
            mass: 1.0,
            inertia: Matrix3::identity(),
            inertia_inv: Matrix3::identity(),
            position: Vector3::zeros(),
            orientation: Matrix3::identity(),
            velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            acceleration: Vector3::zeros(),
            angular_acceleration: Vector3::zeros(),
            force: Vector3::zeros(),
            torque: Vector3::zeros(),
            previous: BodySnapshot::default(),
        }
    }

    /// Set the body index.
    #[must_use]
    pub fn with_id(mut self, id: BodyId) -> Self {
        self.id = id;
        self
    }

    /// Set the initial position.
    #[must_use]
    pub fn with_position(mut self, position: Vector3<f64>) -> Self {
        self.position = position;
        self
    }

    /// Set the initial orientation.
    ///
    /// Use [`Body::try_with_orientation`] for unchecked input.
    #[must_use]
    pub fn with_orientation(mut self, orientation: Matrix3<f64>) -> Self {
        self.orientation = orientation;
        self
    }

    /// Set the initial orientation, rejecting matrices that are not proper
    /// rotations.
    pub fn try_with_orientation(self, orientation: Matrix3<f64>) -> Result<Self> {
        if !is_rotation(&orientation, 1e-6) {
            return Err(SimError::invalid_config(format!(
                "orientation is not a proper rotation (|AᵀA − I| = {:.3e}, det = {:.6})",
                orthogonality_error(&orientation),
                orientation.determinant()
            )));
        }
        Ok(self.with_orientation(orientation))
    }

    /// Set the initial translational velocity.
    #[must_use]
    pub fn with_velocity(mut self, velocity: Vector3<f64>) -> Self {
        self.velocity = velocity;
        self
    }

    /// Set the initial body-frame angular velocity.
    #[must_use]
    pub fn with_angular_velocity(mut self, angular_velocity: Vector3<f64>) -> Self {
        self.angular_velocity = angular_velocity;
        self
    }

    /// Set the applied force.
    #[must_use]
    pub fn with_force(mut self, force: Vector3<f64>) -> Self {
        self.force = force;
        self
    }

    /// Set the applied body-frame torque.
    #[must_use]
    pub fn with_torque(mut self, torque: Vector3<f64>) -> Self {
        self.torque = torque;
        self
    }

    /// Body index.
    #[must_use]
    pub fn id(&self) -> BodyId {
        self.id
    }

    /// Assign the body index.
    pub fn set_id(&mut self, id: BodyId) {
        self.id = id;
    }

    /// Whether this body is ground.
    #[must_use]
    pub fn is_ground(&self) -> bool {
        self.is_ground
    }

    /// Mass in kg.
    #[must_use]
    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Body-frame inertia tensor.
    #[must_use]
    pub fn inertia(&self) -> &Matrix3<f64> {
        &self.inertia
    }

    /// Inverse of the body-frame inertia tensor.
    #[must_use]
    pub fn inertia_inv(&self) -> &Matrix3<f64> {
        &self.inertia_inv
    }

    /// Replace the mass, keeping the inertia tensor.
    pub fn set_mass(&mut self, mass: f64) -> Result<()> {
        let (mass, _, _) = validate_mass_properties(mass, self.inertia)?;
        self.mass = mass;
        Ok(())
    }

    /// Replace the inertia tensor and refresh its inverse.
    pub fn set_inertia(&mut self, inertia: Matrix3<f64>) -> Result<()> {
        let (_, inertia, inertia_inv) = validate_mass_properties(self.mass, inertia)?;
        self.inertia = inertia;
        self.inertia_inv = inertia_inv;
        Ok(())
    }

    /// Net applied generalized torque `n̄`.
    #[must_use]
    pub fn tau(&self) -> Vector3<f64> {
        self.torque
    }

    /// Gyroscopic term `ω × Jω` of the rotational equation of motion.
    #[must_use]
    pub fn gyroscopic_term(&self) -> Vector3<f64> {
        self.angular_velocity
            .cross(&(self.inertia * self.angular_velocity))
    }

    /// Copy `(r, ṙ, A, ω)` into the previous-step snapshot.
    pub fn cache_snapshot(&mut self) {
        self.previous = BodySnapshot {
            position: self.position,
            velocity: self.velocity,
            orientation: self.orientation,
            angular_velocity: self.angular_velocity,
        };
    }

    /// Reset `(r, ṙ, A, ω)` to the snapshot.
    pub fn restore_snapshot(&mut self) {
        self.position = self.previous.position;
        self.velocity = self.previous.velocity;
        self.orientation = self.previous.orientation;
        self.angular_velocity = self.previous.angular_velocity;
    }

    /// State captured by the last [`Body::cache_snapshot`].
    #[must_use]
    pub fn previous(&self) -> &BodySnapshot {
        &self.previous
    }

    /// Global position of a point given in body coordinates.
    #[must_use]
    pub fn point(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.position + self.orientation * local
    }

    /// Global direction of a body-frame vector.
    #[must_use]
    pub fn direction(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.orientation * local
    }

    /// Angular momentum `Jω` in the body frame.
    #[must_use]
    pub fn angular_momentum(&self) -> Vector3<f64> {
        self.inertia * self.angular_velocity
    }

    /// Translational plus rotational kinetic energy.
    #[must_use]
    pub fn kinetic_energy(&self) -> f64 {
        0.5 * self.mass * self.velocity.norm_squared()
            + 0.5 * self.angular_velocity.dot(&self.angular_momentum())
    }

    /// Check if any state component is `NaN` or `Inf`.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|x| x.is_finite())
            && self.orientation.iter().all(|x| x.is_finite())
            && self.velocity.iter().all(|x| x.is_finite())
            && self.angular_velocity.iter().all(|x| x.is_finite())
    }
}

fn validate_mass_properties(
    mass: f64,
    inertia: Matrix3<f64>,
) -> Result<(f64, Matrix3<f64>, Matrix3<f64>)> {
    if !mass.is_finite() || mass <= 0.0 {
        return Err(SimError::invalid_mass(format!(
            "mass must be positive and finite, got {mass}"
        )));
    }
    if (inertia - inertia.transpose()).norm() > 1e-9 * inertia.norm().max(1.0) {
        return Err(SimError::invalid_mass("inertia tensor is not symmetric"));
    }
    let inertia_inv = inertia
        .cholesky()
        .map(|chol| chol.inverse())
        .ok_or_else(|| SimError::invalid_mass("inertia tensor is not positive definite"))?;
    Ok((mass, inertia, inertia_inv))
}
