//! The multibody system: bodies, constraints and solver state.
//!
//! [`System`] owns the body list and the [`ConstraintGroup`] and drives one of
//! two per-step solvers:
//!
//! - **Kinematics** (`nc == 6·nb`): position-level Newton-Raphson on `Φ = 0`,
//!   then one linear solve each for velocities and accelerations.
//! - **Dynamics**: half-implicit Newton-Raphson on the equations of motion
//!   with a frozen iteration matrix per step.
//!
//! The lifecycle is `new → set_kinematics/set_dynamics → initialize →
//! do_step(0, t0), do_step(1, t1), ...`. The mode is fixed once
//! [`System::initialize`] has run.

use nalgebra::{DMatrix, DVector, Vector3};
use tracing::warn;

use mbd_constraint::{ConstraintGroup, SwapEvent};
use mbd_types::{
    math::block_diagonal, Body, BodyId, LoadPolicy, Result, SimError, SolverConfig, SolverMode,
};

use crate::linalg;

/// A constrained multibody system and its solver state.
#[derive(Debug, Clone)]
pub struct System {
    pub(crate) bodies: Vec<Body>,
    pub(crate) constraints: ConstraintGroup,
    pub(crate) config: SolverConfig,
    pub(crate) mode: SolverMode,
    pub(crate) tolerance: f64,
    pub(crate) initialized: bool,
    pub(crate) iterations: usize,

    pub(crate) mass: DMatrix<f64>,
    pub(crate) inertia: DMatrix<f64>,
    pub(crate) mass_inv: DMatrix<f64>,
    pub(crate) inertia_inv: DMatrix<f64>,
    pub(crate) f_ext: DVector<f64>,

    pub(crate) lambda: DVector<f64>,
    pub(crate) lambda_hat: DVector<f64>,
}

impl System {
    /// Create a system from its non-ground bodies and constraints.
    ///
    /// Body ids are reassigned to their position in `bodies`, which is the
    /// index constraints refer to.
    ///
    /// # Errors
    ///
    /// - [`SimError::BodyCountMismatch`] if the group was built for a
    ///   different number of bodies
    /// - [`SimError::InvalidModel`] if a ground body is in the list
    /// - [`SimError::InvalidBodyRef`] if a constraint references a missing body
    pub fn new(mut bodies: Vec<Body>, constraints: ConstraintGroup) -> Result<Self> {
        if constraints.nb() != bodies.len() {
            return Err(SimError::BodyCountMismatch {
                expected: constraints.nb(),
                actual: bodies.len(),
            });
        }
        if bodies.iter().any(Body::is_ground) {
            return Err(SimError::invalid_model(
                "ground is the global frame and must not be in the body list",
            ));
        }
        constraints.validate()?;

        for (index, body) in bodies.iter_mut().enumerate() {
            body.set_id(BodyId::new(index));
        }

        let n = 3 * bodies.len();
        let nc = constraints.nc();
        Ok(Self {
            bodies,
            constraints,
            config: SolverConfig::default(),
            mode: SolverMode::default(),
            tolerance: 0.0,
            initialized: false,
            iterations: 0,
            mass: DMatrix::zeros(n, n),
            inertia: DMatrix::zeros(n, n),
            mass_inv: DMatrix::zeros(n, n),
            inertia_inv: DMatrix::zeros(n, n),
            f_ext: DVector::zeros(n),
            lambda: DVector::zeros(nc),
            lambda_hat: DVector::zeros(nc),
        })
    }

    /// Replace the solver configuration.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or the system is already
    /// initialized (step size and gravity are baked in at that point).
    pub fn with_config(mut self, config: SolverConfig) -> Result<Self> {
        self.set_config(config)?;
        Ok(self)
    }

    /// Replace the solver configuration in place. See [`System::with_config`].
    ///
    /// # Errors
    ///
    /// Same as [`System::with_config`].
    pub fn set_config(&mut self, config: SolverConfig) -> Result<()> {
        if self.initialized {
            return Err(SimError::invalid_config(
                "solver configuration cannot change after initialize()",
            ));
        }
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Select the kinematics solver. Ignored with a warning after
    /// initialization.
    pub fn set_kinematics(&mut self) {
        self.set_mode(SolverMode::Kinematics);
    }

    /// Select the dynamics solver. Ignored with a warning after
    /// initialization.
    pub fn set_dynamics(&mut self) {
        self.set_mode(SolverMode::Dynamics);
    }

    fn set_mode(&mut self, mode: SolverMode) {
        if self.initialized {
            warn!(
                current = %self.mode,
                requested = %mode,
                "Cannot change solver mode after the system is initialized"
            );
            return;
        }
        self.mode = mode;
    }

    /// Prepare the system for stepping.
    ///
    /// Applies gravity to every body, builds the global mass and inertia
    /// matrices, settles the solver mode and tolerance and, for dynamics,
    /// solves for consistent initial accelerations and multipliers at
    /// `t = 0`. A second call is ignored with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::SingularMatrix`] if the dynamics pre-solve matrix
    /// cannot be factored.
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            warn!("System is already initialized");
            return Ok(());
        }
        self.config.validate()?;

        let gravity = self.config.gravity;
        for body in &mut self.bodies {
            body.force += body.mass() * gravity;
        }

        let masses: Vec<f64> = self.bodies.iter().flat_map(|b| [b.mass(); 3]).collect();
        self.mass = DMatrix::from_diagonal(&DVector::from_vec(masses));
        self.mass_inv = DMatrix::from_diagonal(&self.mass.diagonal().map(|m| 1.0 / m));

        let inertias: Vec<_> = self.bodies.iter().map(|b| *b.inertia()).collect();
        let inertias_inv: Vec<_> = self.bodies.iter().map(|b| *b.inertia_inv()).collect();
        self.inertia = block_diagonal(&inertias);
        self.inertia_inv = block_diagonal(&inertias_inv);

        self.f_ext = linalg::stack(&self.bodies, |b| b.force);

        let (nc, nb) = (self.nc(), self.nb());
        if self.mode == SolverMode::Kinematics && nc != 6 * nb {
            warn!(
                nc,
                dof = 6 * nb,
                "Kinematic system has nc ({}) != 6·nb ({}), running dynamics instead",
                nc,
                6 * nb
            );
            self.mode = SolverMode::Dynamics;
        }
        if self.mode == SolverMode::Dynamics && nc > 6 * nb {
            warn!(nc, dof = 6 * nb, "System is overconstrained");
        }

        self.tolerance = self.config.resolved_tolerance(self.mode);
        self.lambda = DVector::zeros(nc);
        self.lambda_hat = DVector::zeros(nc);

        if self.mode == SolverMode::Dynamics {
            self.initialize_dynamics()?;
        }

        self.initialized = true;
        Ok(())
    }

    /// Advance the system to time `t`. `step` is the index of `t` on the
    /// caller's time grid; step 0 establishes the initial state.
    ///
    /// # Errors
    ///
    /// - [`SimError::NotInitialized`] before [`System::initialize`]
    /// - [`SimError::ConvergenceFailure`] if the Newton loop hits the
    ///   iteration cap; the step is rolled back. A driver swap performed at
    ///   `t` is not undone, so a retry at the same `t` runs with the same
    ///   active formulations.
    /// - [`SimError::SingularMatrix`] if a Jacobian cannot be factored
    pub fn do_step(&mut self, step: usize, t: f64) -> Result<()> {
        if !self.initialized {
            return Err(SimError::NotInitialized);
        }
        match self.mode {
            SolverMode::Kinematics => self.kinematics_step(t),
            SolverMode::Dynamics => self.dynamics_step(step, t),
        }
    }

    /// Overwrite the external load vector with `force` on `body` and zero on
    /// every other body.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidBodyRef`] for an unknown body.
    pub fn apply_external_force(&mut self, body: BodyId, force: Vector3<f64>) -> Result<()> {
        let index = self.check_body(body)?;
        self.f_ext = DVector::zeros(3 * self.nb());
        self.f_ext.fixed_rows_mut::<3>(3 * index).copy_from(&force);
        Ok(())
    }

    /// Add the current body loads into `F_ext` according to the load policy.
    pub(crate) fn accumulate_loads(&mut self) {
        let loads = linalg::stack(&self.bodies, |b| b.force);
        match self.config.load_policy {
            LoadPolicy::Accumulate => self.f_ext += loads,
            LoadPolicy::Constant => self.f_ext = loads,
        }
    }

    pub(crate) fn check_body(&self, body: BodyId) -> Result<usize> {
        let index = body.index();
        if index < self.nb() {
            Ok(index)
        } else {
            Err(SimError::InvalidBodyRef {
                index,
                body_count: self.nb(),
            })
        }
    }

    /// Non-ground bodies, indexed by [`BodyId`].
    #[must_use]
    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    /// Mutable bodies, for setting loads or initial conditions.
    pub fn bodies_mut(&mut self) -> &mut [Body] {
        &mut self.bodies
    }

    /// Body by id.
    #[must_use]
    pub fn body(&self, id: BodyId) -> Option<&Body> {
        self.bodies.get(id.index())
    }

    /// Mutable body by id.
    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        self.bodies.get_mut(id.index())
    }

    /// Constraint group.
    #[must_use]
    pub fn constraints(&self) -> &ConstraintGroup {
        &self.constraints
    }

    /// Mutable constraint group.
    pub fn constraints_mut(&mut self) -> &mut ConstraintGroup {
        &mut self.constraints
    }

    /// Solver configuration.
    #[must_use]
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Active solver mode.
    #[must_use]
    pub fn mode(&self) -> SolverMode {
        self.mode
    }

    /// Whether [`System::initialize`] has run.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Convergence tolerance in effect. Zero before initialization.
    #[must_use]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Newton iterations taken by the last step.
    #[must_use]
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Number of non-ground bodies.
    #[must_use]
    pub fn nb(&self) -> usize {
        self.bodies.len()
    }

    /// Number of constraints.
    #[must_use]
    pub fn nc(&self) -> usize {
        self.constraints.nc()
    }

    /// Lagrange multipliers `λ` in physical units.
    #[must_use]
    pub fn lambda(&self) -> &DVector<f64> {
        &self.lambda
    }

    /// Step-scaled multipliers `λ·h²`.
    #[must_use]
    pub fn lambda_hat(&self) -> &DVector<f64> {
        &self.lambda_hat
    }

    /// Stacked external load vector `F_ext`.
    #[must_use]
    pub fn external_forces(&self) -> &DVector<f64> {
        &self.f_ext
    }

    /// Global block-diagonal mass matrix `M`.
    #[must_use]
    pub fn mass_matrix(&self) -> &DMatrix<f64> {
        &self.mass
    }

    /// Global block-diagonal inertia matrix `J`.
    #[must_use]
    pub fn inertia_matrix(&self) -> &DMatrix<f64> {
        &self.inertia
    }

    /// Inverse of [`System::mass_matrix`].
    #[must_use]
    pub fn mass_matrix_inv(&self) -> &DMatrix<f64> {
        &self.mass_inv
    }

    /// Inverse of [`System::inertia_matrix`].
    #[must_use]
    pub fn inertia_matrix_inv(&self) -> &DMatrix<f64> {
        &self.inertia_inv
    }

    /// Constraint swaps performed so far.
    #[must_use]
    pub fn swap_events(&self) -> &[SwapEvent] {
        self.constraints.swap_events()
    }

    /// Residual `Φ(q, t)` at the current configuration.
    #[must_use]
    pub fn constraint_residual(&self, t: f64) -> DVector<f64> {
        self.constraints.phi(&self.bodies, t)
    }
}
