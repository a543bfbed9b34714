//! Core types for constrained multibody simulation.
//!
//! This crate provides the foundational types shared by the constraint and
//! solver crates:
//!
//! - [`Body`] - Mass properties and kinematic state of one rigid body
//! - [`SolverConfig`] - Step size, tolerance, iteration cap, gravity, load policy
//! - [`SolverMode`] - Kinematics (prescribed motion) or dynamics
//! - [`SimError`] - Every failure the solver stack can report
//!
//! # Orientation Convention
//!
//! Orientations are stored as 3×3 rotation matrices `A` mapping body-frame
//! vectors to the global frame. Angular velocities are expressed in the
//! **body** frame, so the kinematic relation is `Ȧ = A·ω̃`. Incremental
//! rotations are always applied through the exponential map (see
//! [`math::exp_map`]); `A` is never updated additively.
//!
//! # Layer 0
//!
//! Pure data and small math helpers. No solver logic, no global state.
//!
//! # Example
//!
//! ```
//! use mbd_types::{Body, BodyId};
//! use nalgebra::{Matrix3, Vector3};
//!
//! let mut body = Body::new(2.0, Matrix3::from_diagonal(&Vector3::new(1.0, 2.0, 3.0)))
//!     .unwrap()
//!     .with_id(BodyId::new(0))
//!     .with_position(Vector3::new(0.0, 0.0, 1.0));
//!
//! body.angular_velocity = Vector3::new(0.0, 0.0, 1.0);
//! body.cache_snapshot();
//! assert_eq!(body.previous().position.z, 1.0);
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
    clippy::cast_precision_loss,       // usize to f64 is fine for counts
    clippy::missing_errors_doc,        // Error docs added where non-obvious
)]

mod body;
mod config;
mod error;
pub mod math;

pub use body::{Body, BodyId, BodySnapshot};
pub use config::{
    LoadPolicy, SolverConfig, SolverMode, DEFAULT_DYNAMICS_TOLERANCE,
    DEFAULT_KINEMATICS_TOLERANCE,
};
pub use error::SimError;

// Re-export math types for convenience
pub use nalgebra::{DMatrix, DVector, Matrix3, Vector3};

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, SimError>;
