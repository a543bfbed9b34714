//! Holonomic joint constraints for rigid multibody systems.
//!
//! This crate provides the scalar constraint equations that connect bodies
//! into mechanisms, and the group that stacks them into system-level
//! residuals and Jacobians.
//!
//! # Constraint Variants
//!
//! - DP1 ([`Constraint::dot_product_1`]): two body-fixed axes hold a
//!   prescribed dot product (perpendicularity, driven rotation)
//! - DP2 ([`Constraint::dot_product_2`]): a body-fixed axis against the vector
//!   between two points
//! - CD ([`Constraint::coordinate_difference`]): a global coordinate of the
//!   vector between two points
//! - D ([`Constraint::distance`]): the distance between two points
//!
//! Joints are built from these primitives; for example a revolute joint is
//! three CD rows plus two DP1 rows.
//!
//! # Constraint Formulation
//!
//! ```text
//! Φ(q, t) = 0                      (position)
//! Φ_r ṙ + Π ω̄ = ν(t)               (velocity)
//! Φ_r r̈ + Π ω̄̇ = γ(q, q̇, t)         (acceleration)
//! ```
//!
//! `Φ_r` differentiates with respect to body positions, `Π` with respect to
//! body-frame rotation increments.
//!
//! # Example
//!
//! ```
//! use mbd_constraint::{BodyRef, Constraint, ConstraintGroup, DrivingFunction};
//! use mbd_types::Body;
//! use nalgebra::{Matrix3, Vector3};
//!
//! let bodies = vec![Body::new(1.0, Matrix3::identity())
//!     .unwrap()
//!     .with_position(Vector3::new(2.0, 0.0, 0.0))];
//!
//! // Keep the body 2 m from the origin.
//! let rod = Constraint::distance(
//!     BodyRef::Ground,
//!     Vector3::zeros(),
//!     BodyRef::body(0),
//!     Vector3::zeros(),
//!     2.0,
//! );
//! let group = ConstraintGroup::new(vec![rod], 1);
//!
//! assert!(group.phi(&bodies, 0.0).norm() < 1e-12);
//! assert_eq!(group.phi_q(&bodies).shape(), (1, 6));
//! # let _ = DrivingFunction::default();
//! ```
//!
//! # Layer 0 Crate
//!
//! No solver state lives here: constraints read body state, they never own or
//! mutate it. Bodies are referenced by index.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn)]

mod constraint;
mod driving;
mod group;

pub use constraint::{BodyRef, Constraint, ConstraintKind, JacobianBlocks};
pub use driving::{CustomFunction, DrivingFunction, TimeFn};
pub use group::{ConstraintGroup, SwapEvent, DEFAULT_SWAP_THRESHOLD};

// Re-export types needed for constraint computation
pub use mbd_types::{Body, BodyId, Vector3};
