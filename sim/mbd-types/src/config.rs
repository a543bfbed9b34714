//! Solver configuration.
//!
//! Controls the step size, Newton tolerance, iteration cap, gravity and how
//! applied loads are folded into the global force vector.

use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Tolerance used in kinematics mode when none is configured.
pub const DEFAULT_KINEMATICS_TOLERANCE: f64 = 1e-6;

/// Tolerance used in dynamics mode when none is configured.
pub const DEFAULT_DYNAMICS_TOLERANCE: f64 = 1e-3;

/// What the system solves for each step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SolverMode {
    /// Fully prescribed motion: positions from `Φ(q, t) = 0`, then velocity
    /// and acceleration by one linear solve each. Requires `nc == 6·nb`.
    #[default]
    Kinematics,
    /// Forces, torques and constraint reactions, half-implicit integration.
    Dynamics,
}

impl std::fmt::Display for SolverMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Kinematics => write!(f, "kinematics"),
            Self::Dynamics => write!(f, "dynamics"),
        }
    }
}

/// How body loads enter the global force vector `F_ext` each dynamics step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LoadPolicy {
    /// `F_ext += stack(body.force)` every step, so loads grow with the step
    /// count. Kept as the default because it is the long-standing behavior;
    /// whether it is intended is unresolved.
    #[default]
    Accumulate,
    /// `F_ext = stack(body.force)` every step.
    Constant,
}

/// Configuration for the multibody solver.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SolverConfig {
    /// Time step `h` (seconds).
    pub step_size: f64,
    /// Newton convergence tolerance on the correction norm. `None` picks the
    /// mode default at initialization.
    pub tolerance: Option<f64>,
    /// Newton iteration cap per step.
    pub max_iterations: usize,
    /// Gravitational acceleration, added as `m·g` to every body at
    /// initialization.
    pub gravity: Vector3<f64>,
    /// Load accumulation policy for dynamics.
    pub load_policy: LoadPolicy,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            step_size: 1e-5,
            tolerance: None,
            max_iterations: 100,
            gravity: Vector3::new(0.0, 0.0, -9.81),
            load_policy: LoadPolicy::default(),
        }
    }
}

impl SolverConfig {
    /// Set the step size.
    #[must_use]
    pub fn with_step_size(mut self, step_size: f64) -> Self {
        self.step_size = step_size;
        self
    }

    /// Set the Newton tolerance.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    /// Set the iteration cap.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set gravity.
    #[must_use]
    pub fn with_gravity(mut self, gravity: Vector3<f64>) -> Self {
        self.gravity = gravity;
        self
    }

    /// Disable gravity.
    #[must_use]
    pub fn zero_gravity(mut self) -> Self {
        self.gravity = Vector3::zeros();
        self
    }

    /// Set the load policy.
    #[must_use]
    pub fn with_load_policy(mut self, policy: LoadPolicy) -> Self {
        self.load_policy = policy;
        self
    }

    /// Tolerance in effect for `mode`.
    #[must_use]
    pub fn resolved_tolerance(&self, mode: SolverMode) -> f64 {
        self.tolerance.unwrap_or(match mode {
            SolverMode::Kinematics => DEFAULT_KINEMATICS_TOLERANCE,
            SolverMode::Dynamics => DEFAULT_DYNAMICS_TOLERANCE,
        })
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.step_size.is_finite() || self.step_size <= 0.0 {
            return Err(crate::SimError::InvalidTimestep(self.step_size));
        }

        if let Some(tol) = self.tolerance {
            if !tol.is_finite() || tol <= 0.0 {
                return Err(crate::SimError::invalid_config(format!(
                    "tolerance must be positive and finite, got {tol}"
                )));
            }
        }

        if !self.gravity.iter().all(|g| g.is_finite()) {
            return Err(crate::SimError::invalid_config("gravity must be finite"));
        }

        Ok(())
    }
}
