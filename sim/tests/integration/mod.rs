//! End-to-end scenarios for the multibody solver crates.
//!
//! - Dynamics: pendulum periodicity, tethered bodies, torque-free flight,
//!   driven crank with singularity swapping
//! - Kinematics: driven crank, singularity swapping
//! - Failure handling and rollback
//! - JSON model loading and reaction queries

pub mod convergence;
pub mod distance;
pub mod free_body;
pub mod kinematics;
pub mod model_loading;
pub mod pendulum;
pub mod reactions;
