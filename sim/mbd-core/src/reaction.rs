//! Constraint reaction queries.
//!
//! Post-hoc linear combinations of the converged multipliers with the
//! constraint Jacobians at the current configuration. Reaction forces are
//! global-frame, reaction torques body-frame, both with the sign convention
//! of the equations of motion (`M r̈ = F_ext − Φ_rᵀλ`), so the force a joint
//! exerts on a body is the negative of what these return.

use nalgebra::{DVector, Vector3};

use mbd_types::{BodyId, Result, SimError};

use crate::linalg::block;
use crate::System;

impl System {
    /// Generalized reaction forces `Φ_rᵀ λ`, length `3·nb`.
    #[must_use]
    pub fn reaction_forces(&self) -> DVector<f64> {
        self.constraints.phi_r(&self.bodies).transpose() * &self.lambda
    }

    /// Generalized reaction torques `Πᵀ λ`, length `3·nb`.
    #[must_use]
    pub fn reaction_torques(&self) -> DVector<f64> {
        self.constraints.pi(&self.bodies).transpose() * &self.lambda
    }

    /// Total reaction force on one body.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidBodyRef`] for an unknown body.
    pub fn reaction_force_on(&self, body: BodyId) -> Result<Vector3<f64>> {
        let index = self.check_body(body)?;
        Ok(block(&self.reaction_forces(), index))
    }

    /// Total reaction torque on one body.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidBodyRef`] for an unknown body.
    pub fn reaction_torque_on(&self, body: BodyId) -> Result<Vector3<f64>> {
        let index = self.check_body(body)?;
        Ok(block(&self.reaction_torques(), index))
    }

    /// Force component along global `axis` (0, 1, 2) that constraint
    /// `constraint` applies to `body`: `Φ_r[c, 3·body + axis] · λ[c]`.
    ///
    /// # Errors
    ///
    /// Fails for an unknown body, constraint index or axis.
    pub fn joint_force_on_body(&self, body: BodyId, axis: usize, constraint: usize) -> Result<f64> {
        let (column, c) = self.reaction_entry(body, axis, constraint)?;
        let row = self.constraints.constraints()[c].phi_r(&self.bodies);
        Ok(row[column] * self.lambda[c])
    }

    /// Torque component about body `axis` (0, 1, 2) that constraint
    /// `constraint` applies to `body`: `Π[c, 3·body + axis] · λ[c]`.
    ///
    /// # Errors
    ///
    /// Fails for an unknown body, constraint index or axis.
    pub fn joint_torque_on_body(&self, body: BodyId, axis: usize, constraint: usize) -> Result<f64> {
        let (column, c) = self.reaction_entry(body, axis, constraint)?;
        let row = self.constraints.constraints()[c].pi(&self.bodies);
        Ok(row[column] * self.lambda[c])
    }

    fn reaction_entry(&self, body: BodyId, axis: usize, constraint: usize) -> Result<(usize, usize)> {
        let index = self.check_body(body)?;
        if axis > 2 {
            return Err(SimError::invalid_config(format!("axis must be 0, 1 or 2, got {axis}")));
        }
        if constraint >= self.nc() {
            return Err(SimError::invalid_config(format!(
                "constraint {constraint} out of range (nc = {})",
                self.nc()
            )));
        }
        Ok((3 * index + axis, constraint))
    }
}
