//! Position-level kinematics solver.
//!
//! For a fully constrained system (`nc == 6·nb`) the configuration at time
//! `t` follows from `Φ(q, t) = 0` alone. Newton-Raphson on `Φ_q Δq = −Φ`
//! with `Φ_q` refactored at every iterate, then velocities from
//! `Φ_q q̇ = ν` and accelerations from `Φ_q q̈ = γ` at the converged
//! configuration.

use tracing::{debug, error};

use mbd_types::{math::axis_angle, Result, SimError, SolverMode};

use crate::linalg::{block, Factorization};
use crate::System;

impl System {
    pub(crate) fn kinematics_step(&mut self, t: f64) -> Result<()> {
        self.constraints.maybe_swap(t);

        for body in &mut self.bodies {
            body.cache_snapshot();
        }

        let nb = self.nb();
        self.iterations = 0;
        loop {
            let correction = Factorization::new(
                self.constraints.phi_q(&self.bodies),
                "kinematics Jacobian",
                t,
            )
            .and_then(|phi_q| phi_q.solve(&-self.constraints.phi(&self.bodies, t)));
            let dq = match correction {
                Ok(dq) => dq,
                Err(e) => {
                    self.restore_bodies();
                    return Err(e);
                }
            };

            for (j, body) in self.bodies.iter_mut().enumerate() {
                body.position += block(&dq, j);
                let dtheta = block(&dq, nb + j);
                let angle = dtheta.norm();
                if angle > 0.0 {
                    body.orientation *= axis_angle(&(dtheta / angle), angle);
                }
            }
            self.iterations += 1;

            let norm = dq.norm();
            debug!(time = t, iteration = self.iterations, norm, "kinematics correction");
            if norm < self.tolerance {
                break;
            }
            if self.iterations >= self.config.max_iterations {
                self.restore_bodies();
                let max_iterations = self.config.max_iterations;
                error!(
                    time = t,
                    iterations = max_iterations,
                    "Kinematics Newton-Raphson not converging"
                );
                return Err(SimError::ConvergenceFailure {
                    mode: SolverMode::Kinematics,
                    time: t,
                    iterations: max_iterations,
                });
            }
        }

        let phi_q = match Factorization::new(
            self.constraints.phi_q(&self.bodies),
            "kinematics Jacobian",
            t,
        ) {
            Ok(phi_q) => phi_q,
            Err(e) => {
                self.restore_bodies();
                return Err(e);
            }
        };

        let dq = phi_q.solve(&self.constraints.nu(t))?;
        for (j, body) in self.bodies.iter_mut().enumerate() {
            body.velocity = block(&dq, j);
            body.angular_velocity = block(&dq, nb + j);
        }

        // γ depends on the velocities just solved for.
        let ddq = phi_q.solve(&self.constraints.gamma(&self.bodies, t))?;
        for (j, body) in self.bodies.iter_mut().enumerate() {
            body.acceleration = block(&ddq, j);
            body.angular_acceleration = block(&ddq, nb + j);
        }
        Ok(())
    }

    /// Put the bodies back at the start-of-step snapshot. Swaps are kept.
    fn restore_bodies(&mut self) {
        for body in &mut self.bodies {
            body.restore_snapshot();
        }
    }
}
