//! Constrained multibody time integration.
//!
//! This crate advances a set of rigid bodies connected by the joints of
//! [`mbd_constraint`] forward in time, either as a fully prescribed
//! mechanism (kinematics) or under applied loads (dynamics).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Stepper                              │
//! │  Time grid, do_step per point, trajectory recording         │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          System                              │
//! │  Bodies, ConstraintGroup, M, J, F_ext, λ                     │
//! │  initialize → kinematics_step | dynamics_step               │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Factorization                           │
//! │  Dense LU, factor once / solve many                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Solvers
//!
//! | Mode | Requires | Unknowns per Newton step | Iteration matrix |
//! |------|----------|--------------------------|------------------|
//! | Kinematics | `nc == 6·nb` | `Δr`, `Δθ` | `Φ_q`, refactored every iterate |
//! | Dynamics | any `nc ≤ 6·nb` | `r`, `θ̄`, `λ̂` | saddle point, factored once per step |
//!
//! A kinematics system with `nc ≠ 6·nb` runs dynamics instead.
//!
//! Orientations are only ever updated through finite rotations (exponential
//! map or axis-angle), so every `A` stays orthonormal.
//!
//! # Quick Start
//!
//! ```
//! use mbd_core::{Stepper, System};
//! use mbd_constraint::{BodyRef, Constraint, ConstraintGroup};
//! use mbd_types::{Body, LoadPolicy, SolverConfig};
//! use nalgebra::{Matrix3, Vector3};
//!
//! // A point mass on a 1 m rod from the origin.
//! let body = Body::new(1.0, Matrix3::identity())
//!     .unwrap()
//!     .with_position(Vector3::new(1.0, 0.0, 0.0));
//! let rod = Constraint::distance(
//!     BodyRef::Ground,
//!     Vector3::zeros(),
//!     BodyRef::body(0),
//!     Vector3::zeros(),
//!     1.0,
//! );
//!
//! let mut system = System::new(vec![body], ConstraintGroup::new(vec![rod], 1))
//!     .unwrap()
//!     .with_config(
//!         SolverConfig::default()
//!             .with_step_size(1e-3)
//!             .with_load_policy(LoadPolicy::Constant),
//!     )
//!     .unwrap();
//! system.set_dynamics();
//!
//! let trajectory = Stepper::new(0.1).run(&mut system).unwrap();
//! let end = trajectory.last().unwrap().positions[0];
//! assert!((end.norm() - 1.0).abs() < 1e-3);
//! ```
//!
//! # Layer 0 Crate
//!
//! Pure computation with no I/O beyond the optional model loader. Logging
//! goes through `tracing`; no subscriber is installed here.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn, clippy::cast_precision_loss)]

mod dynamics;
mod kinematics;
mod linalg;
pub mod model;
mod reaction;
mod stepper;
mod system;

pub use linalg::Factorization;
pub use model::{load_model, load_model_file, LoadedModel, ModelDescription};
pub use stepper::{StepRecord, Stepper, Trajectory};
pub use system::System;

pub use mbd_constraint::{ConstraintGroup, SwapEvent};
pub use mbd_types::{Result, SimError, SolverConfig, SolverMode};
