//! Half-implicit dynamics solver.
//!
//! Each step solves the discretized equations of motion for the new
//! positions `r`, orientation increments `θ̄ = h·ω` and scaled multipliers
//! `λ̂ = λ·h²`:
//!
//! ```text
//! e0 = M r  + Φ_rᵀ λ̂ + b = 0        b = −(M r_prev + h M ṙ_prev + h² F_ext)
//! e1 = J θ̄  + Πᵀ   λ̂ + c = 0        c = h²(ω_prev × Jω_prev − n) − h J ω_prev
//! e2 = Φ(q, t)            = 0        A = A_prev · exp(θ̃̄)
//! ```
//!
//! The Newton iteration matrix
//!
//! ```text
//! ┌ M    0    Φ_rᵀ ┐
//! │ 0    J    Πᵀ   │
//! └ Φ_r  Π    0    ┘
//! ```
//!
//! is assembled from the Jacobians at the previous configuration and
//! factored once per step; every Newton iteration of the step reuses that
//! factorization. It is discarded at the start of the next step.

use nalgebra::{DMatrix, DVector};
use tracing::{debug, error};

use mbd_types::{math::exp_map, Result, SimError, SolverMode};

use crate::linalg::{self, block, concat, saddle_point, Factorization};
use crate::System;

/// Iteration matrix of one dynamics step, frozen at the previous
/// configuration.
struct FrozenIteration {
    phi_r_t: DMatrix<f64>,
    pi_t: DMatrix<f64>,
    factorization: Factorization,
}

impl FrozenIteration {
    fn assemble(system: &System, t: f64) -> Result<Self> {
        let phi_r = system.constraints.phi_r(&system.bodies);
        let pi = system.constraints.pi(&system.bodies);
        let g = saddle_point(&system.mass, &system.inertia, &phi_r, &pi);
        Ok(Self {
            phi_r_t: phi_r.transpose(),
            pi_t: pi.transpose(),
            factorization: Factorization::new(g, "dynamics iteration", t)?,
        })
    }
}

/// State to return to if a step fails.
struct StepCheckpoint {
    f_ext: DVector<f64>,
    lambda_hat: DVector<f64>,
}

impl System {
    /// Consistent initial accelerations and multipliers at `t = 0`.
    pub(crate) fn initialize_dynamics(&mut self) -> Result<()> {
        let t0 = 0.0;
        let nb = self.nb();
        let nc = self.nc();
        let h = self.config.step_size;

        let phi_r = self.constraints.phi_r(&self.bodies);
        let pi = self.constraints.pi(&self.bodies);
        let torques = linalg::stack(&self.bodies, |b| b.tau() - b.gyroscopic_term());
        let gamma = self.constraints.gamma(&self.bodies, t0);

        let g = saddle_point(&self.mass, &self.inertia, &phi_r, &pi);
        let z = Factorization::new(g, "initial dynamics", t0)?
            .solve(&concat(&[&self.f_ext, &torques, &gamma]))?;

        for (j, body) in self.bodies.iter_mut().enumerate() {
            body.acceleration = block(&z, j);
            body.angular_acceleration = block(&z, nb + j);
            body.cache_snapshot();
        }

        self.lambda = z.rows(6 * nb, nc).into_owned();
        self.lambda_hat = &self.lambda * (h * h);
        Ok(())
    }

    pub(crate) fn dynamics_step(&mut self, step: usize, t: f64) -> Result<()> {
        if step == 0 {
            return Ok(());
        }

        self.constraints.maybe_swap(t);

        let checkpoint = StepCheckpoint {
            f_ext: self.f_ext.clone(),
            lambda_hat: self.lambda_hat.clone(),
        };
        self.accumulate_loads();

        let frozen = match FrozenIteration::assemble(self, t) {
            Ok(frozen) => frozen,
            Err(e) => {
                self.f_ext = checkpoint.f_ext;
                return Err(e);
            }
        };

        let h = self.config.step_size;
        let nb = self.nb();
        let n = 3 * nb;
        let nc = self.nc();

        for body in &mut self.bodies {
            body.cache_snapshot();
        }

        let r_prev = linalg::stack(&self.bodies, |b| b.previous().position);
        let dr_prev = linalg::stack(&self.bodies, |b| b.previous().velocity);
        let bn = -(&self.mass * &r_prev + (&self.mass * &dr_prev) * h + &self.f_ext * (h * h));
        let cn = linalg::stack(&self.bodies, |b| {
            let omega = b.previous().angular_velocity;
            let j_omega = b.inertia() * omega;
            (omega.cross(&j_omega) - b.tau()) * (h * h) - j_omega * h
        });

        // Explicit extrapolation as the initial guess.
        for body in &mut self.bodies {
            let prev = *body.previous();
            body.position = prev.position + prev.velocity * h + body.acceleration * (h * h);
            body.angular_velocity = prev.angular_velocity + body.angular_acceleration * h;
            body.orientation = prev.orientation * exp_map(&(body.angular_velocity * h));
        }
        let mut r = linalg::stack(&self.bodies, |b| b.position);
        let mut theta = linalg::stack(&self.bodies, |b| b.angular_velocity * h);

        self.iterations = 0;
        loop {
            let e0 = &self.mass * &r + &frozen.phi_r_t * &self.lambda_hat + &bn;
            let e1 = &self.inertia * &theta + &frozen.pi_t * &self.lambda_hat + &cn;
            let e2 = self.constraints.phi(&self.bodies, t);

            let delta = match frozen.factorization.solve(&-concat(&[&e0, &e1, &e2])) {
                Ok(delta) => delta,
                Err(e) => {
                    self.rollback(checkpoint);
                    return Err(e);
                }
            };
            r += delta.rows(0, n);
            theta += delta.rows(n, n);
            self.lambda_hat += delta.rows(2 * n, nc);
            self.iterations += 1;

            let norm = delta.norm();
            debug!(time = t, iteration = self.iterations, norm, "dynamics correction");
            if norm < self.tolerance {
                break;
            }

            self.write_back(&r, &theta, h);

            if self.iterations >= self.config.max_iterations {
                self.rollback(checkpoint);
                let max_iterations = self.config.max_iterations;
                error!(
                    time = t,
                    iterations = max_iterations,
                    "Dynamics Newton-Raphson not converging"
                );
                return Err(SimError::ConvergenceFailure {
                    mode: SolverMode::Dynamics,
                    time: t,
                    iterations: max_iterations,
                });
            }
        }
        self.write_back(&r, &theta, h);

        if step == 1 {
            self.lambda_hat = checkpoint.lambda_hat;
        }

        self.update_accelerations(&frozen, h);
        Ok(())
    }

    /// Copy the iterate into body state: `r`, `ω = θ̄/h` and
    /// `A = A_prev · exp(θ̃̄)`.
    fn write_back(&mut self, r: &DVector<f64>, theta: &DVector<f64>, h: f64) {
        for (j, body) in self.bodies.iter_mut().enumerate() {
            let theta_j = block(theta, j);
            body.position = block(r, j);
            body.angular_velocity = theta_j / h;
            body.orientation = body.previous().orientation * exp_map(&theta_j);
        }
    }

    /// Back out accelerations from the converged multipliers and advance the
    /// translational velocity one explicit Euler step.
    fn update_accelerations(&mut self, frozen: &FrozenIteration, h: f64) {
        self.lambda = &self.lambda_hat / (h * h);
        let forces = &self.f_ext - &frozen.phi_r_t * &self.lambda;
        let torques = -(&frozen.pi_t * &self.lambda);

        for (j, body) in self.bodies.iter_mut().enumerate() {
            body.acceleration = block(&forces, j) / body.mass();
            body.velocity += body.acceleration * h;

            // Full Euler equation: the applied torque n stays in, as in e1.
            let net = body.tau() - body.gyroscopic_term() + block(&torques, j);
            body.angular_acceleration = body.inertia_inv() * net;
        }
    }

    /// Undo a failed step: bodies, `F_ext` and `λ̂`. A driver swap made at the
    /// start of the step stays; repeating the swap test at the same `t` would
    /// select the same formulation.
    fn rollback(&mut self, checkpoint: StepCheckpoint) {
        for body in &mut self.bodies {
            body.restore_snapshot();
        }
        self.f_ext = checkpoint.f_ext;
        self.lambda_hat = checkpoint.lambda_hat;
    }
}
