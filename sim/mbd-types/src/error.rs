//! Error types for simulation operations.

use thiserror::Error;

use crate::SolverMode;

/// Errors that can occur during simulation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    /// Newton-Raphson iteration exceeded the iteration cap.
    #[error("{mode} Newton-Raphson not converging at t: {time:.3}, k: {iterations:>2}")]
    ConvergenceFailure {
        /// Solver that failed.
        mode: SolverMode,
        /// Simulation time of the failing step.
        time: f64,
        /// Configured iteration cap that was reached.
        iterations: usize,
    },

    /// A dense factorization failed.
    #[error("singular {context} matrix at t = {time:.4}")]
    SingularMatrix {
        /// Which matrix could not be factored.
        context: &'static str,
        /// Simulation time.
        time: f64,
    },

    /// Stepping was attempted before initialization.
    #[error("cannot step before system initialization")]
    NotInitialized,

    /// Body list and constraint group disagree on the body count.
    #[error("mismatch on number of bodies: constraints expect {expected}, got {actual}")]
    BodyCountMismatch {
        /// Body count the constraint group was built for.
        expected: usize,
        /// Length of the body list.
        actual: usize,
    },

    /// A constraint references a body index outside the body list.
    #[error("invalid body reference {index} (system has {body_count} bodies)")]
    InvalidBodyRef {
        /// The offending index.
        index: usize,
        /// Number of non-ground bodies.
        body_count: usize,
    },

    /// Invalid timestep.
    #[error("invalid timestep: {0} (must be positive and finite)")]
    InvalidTimestep(f64),

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// Invalid mass properties.
    #[error("invalid mass properties: {reason}")]
    InvalidMassProperties {
        /// Description of what's wrong.
        reason: String,
    },

    /// Model description is structurally valid but semantically wrong.
    #[error("invalid model: {reason}")]
    InvalidModel {
        /// Description of the model error.
        reason: String,
    },

    /// Model description could not be parsed.
    #[error("failed to parse model: {reason}")]
    ModelParse {
        /// Parser message.
        reason: String,
    },

    /// Simulation output could not be serialized.
    #[error("failed to serialize output: {reason}")]
    Serialization {
        /// Serializer message.
        reason: String,
    },
}

impl SimError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an invalid mass properties error.
    #[must_use]
    pub fn invalid_mass(reason: impl Into<String>) -> Self {
        Self::InvalidMassProperties {
            reason: reason.into(),
        }
    }

    /// Create an invalid model error.
    #[must_use]
    pub fn invalid_model(reason: impl Into<String>) -> Self {
        Self::InvalidModel {
            reason: reason.into(),
        }
    }

    /// Create a serialization error.
    #[must_use]
    pub fn serialization(reason: impl Into<String>) -> Self {
        Self::Serialization {
            reason: reason.into(),
        }
    }

    /// Check if this is a Newton convergence failure.
    #[must_use]
    pub fn is_convergence_failure(&self) -> bool {
        matches!(self, Self::ConvergenceFailure { .. })
    }

    /// Check if this is a configuration error.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. } | Self::InvalidTimestep(_))
    }
}
