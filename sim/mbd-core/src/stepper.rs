//! Time-stepping driver and trajectory recording.
//!
//! [`Stepper`] walks a [`System`] over the grid `0, h, 2h, … < t_end`,
//! calling [`System::do_step`] at each point and collecting a [`StepRecord`]
//! into a [`Trajectory`]. A failed step aborts the run; retrying with a
//! smaller step is left to the caller.
//!
//! # Example
//!
//! ```
//! use mbd_core::{Stepper, System};
//! use mbd_constraint::ConstraintGroup;
//! use mbd_types::{Body, SolverConfig};
//! use nalgebra::{Matrix3, Vector3};
//!
//! let body = Body::new(1.0, Matrix3::identity())
//!     .unwrap()
//!     .with_velocity(Vector3::new(1.0, 0.0, 0.0));
//! let mut system = System::new(vec![body], ConstraintGroup::new(vec![], 1))
//!     .unwrap()
//!     .with_config(SolverConfig::default().with_step_size(0.01).zero_gravity())
//!     .unwrap();
//! system.set_dynamics();
//!
//! let trajectory = Stepper::new(1.0).run(&mut system).unwrap();
//! assert_eq!(trajectory.len(), 100);
//! ```

use nalgebra::{DVector, Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::info;

use mbd_types::{BodyId, Result, SimError};

use crate::System;

/// State of every body after one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Step index on the time grid.
    pub step: usize,
    /// Simulation time.
    pub time: f64,
    /// Newton iterations the step took.
    pub iterations: usize,
    /// Body positions.
    pub positions: Vec<Vector3<f64>>,
    /// Body velocities.
    pub velocities: Vec<Vector3<f64>>,
    /// Body accelerations.
    pub accelerations: Vec<Vector3<f64>>,
    /// Body orientations.
    pub orientations: Vec<Matrix3<f64>>,
    /// Body-frame angular velocities.
    pub angular_velocities: Vec<Vector3<f64>>,
    /// Lagrange multipliers.
    pub lambda: DVector<f64>,
}

impl StepRecord {
    /// Snapshot `system` as of step `step` at `time`.
    #[must_use]
    pub fn capture(system: &System, step: usize, time: f64) -> Self {
        let bodies = system.bodies();
        Self {
            step,
            time,
            iterations: system.iterations(),
            positions: bodies.iter().map(|b| b.position).collect(),
            velocities: bodies.iter().map(|b| b.velocity).collect(),
            accelerations: bodies.iter().map(|b| b.acceleration).collect(),
            orientations: bodies.iter().map(|b| b.orientation).collect(),
            angular_velocities: bodies.iter().map(|b| b.angular_velocity).collect(),
            lambda: system.lambda().clone(),
        }
    }
}

/// Recorded steps of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    records: Vec<StepRecord>,
}

impl Trajectory {
    /// Number of recorded steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in time order.
    #[must_use]
    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    /// Last record.
    #[must_use]
    pub fn last(&self) -> Option<&StepRecord> {
        self.records.last()
    }

    /// Recorded times.
    #[must_use]
    pub fn times(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.time).collect()
    }

    /// Position history of one body.
    #[must_use]
    pub fn positions(&self, body: BodyId) -> Vec<Vector3<f64>> {
        self.records
            .iter()
            .filter_map(|r| r.positions.get(body.index()).copied())
            .collect()
    }

    /// Multiplier history of one constraint slot.
    #[must_use]
    pub fn multipliers(&self, slot: usize) -> Vec<f64> {
        self.records
            .iter()
            .filter_map(|r| r.lambda.get(slot).copied())
            .collect()
    }

    /// Serialize to JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Serialization`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| SimError::serialization(e.to_string()))
    }

    fn push(&mut self, record: StepRecord) {
        self.records.push(record);
    }
}

/// Drives a [`System`] over a uniform time grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stepper {
    t_end: f64,
    record_every: usize,
}

impl Stepper {
    /// Step from `t = 0` up to, not including, `t_end`, recording every step.
    #[must_use]
    pub fn new(t_end: f64) -> Self {
        Self {
            t_end,
            record_every: 1,
        }
    }

    /// Record only every `n`-th step (the last step is always recorded).
    #[must_use]
    pub fn with_record_interval(mut self, n: usize) -> Self {
        self.record_every = n.max(1);
        self
    }

    /// End time (exclusive).
    #[must_use]
    pub fn t_end(&self) -> f64 {
        self.t_end
    }

    /// Grid `0, h, 2h, … < t_end`.
    #[must_use]
    pub fn time_grid(&self, h: f64) -> Vec<f64> {
        // Relative slack so `t_end / h` landing a hair above an integer does
        // not add a point at `t_end`.
        let n = (self.t_end / h * (1.0 - 1e-12)).ceil().max(0.0) as usize;
        (0..n).map(|i| i as f64 * h).collect()
    }

    /// Run `system` over the grid, initializing it first if needed.
    ///
    /// # Errors
    ///
    /// Returns the first error from [`System::initialize`] or
    /// [`System::do_step`]; steps already taken are not undone.
    pub fn run(&self, system: &mut System) -> Result<Trajectory> {
        self.run_with(system, |_, _| {})
    }

    /// Like [`Stepper::run`], calling `observe` after every step.
    ///
    /// # Errors
    ///
    /// Same as [`Stepper::run`].
    pub fn run_with<F>(&self, system: &mut System, mut observe: F) -> Result<Trajectory>
    where
        F: FnMut(&System, &StepRecord),
    {
        if !self.t_end.is_finite() || self.t_end < 0.0 {
            return Err(SimError::invalid_config(format!(
                "end time must be finite and non-negative, got {}",
                self.t_end
            )));
        }
        if !system.is_initialized() {
            system.initialize()?;
        }

        let grid = self.time_grid(system.config().step_size);
        let last = grid.len().saturating_sub(1);
        let mut trajectory = Trajectory::default();

        for (step, &t) in grid.iter().enumerate() {
            system.do_step(step, t)?;
            let record = StepRecord::capture(system, step, t);
            observe(system, &record);
            if step % self.record_every == 0 || step == last {
                trajectory.push(record);
            }
        }

        info!(
            steps = grid.len(),
            recorded = trajectory.len(),
            swaps = system.swap_events().len(),
            mode = %system.mode(),
            "Simulation finished"
        );
        Ok(trajectory)
    }
}
