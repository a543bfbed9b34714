//! Prescribed time functions for driving constraints.
//!
//! A driving constraint imposes `Φ(q) = f(t)`. The solver needs the value at
//! position level, the first derivative for the velocity right-hand side `ν`
//! and the second derivative for the acceleration right-hand side `γ`. All
//! three are supplied in closed form here; nothing is differentiated at run
//! time.
//!
//! ```text
//! Constant(c)                   f = c
//! Polynomial([c0, c1, ...])     f = c0 + c1·t + c2·t² + ...
//! Harmonic { a, ω, φ, o }       f = o + a·cos(ω·t + φ)
//! Custom                        user closures (f, ḟ, f̈)
//! ```

use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Shared scalar function of time.
pub type TimeFn = Arc<dyn Fn(f64) -> f64 + Send + Sync>;

/// User-supplied closed-form triple `(f, ḟ, f̈)`.
#[derive(Clone)]
pub struct CustomFunction {
    value: TimeFn,
    velocity: TimeFn,
    acceleration: TimeFn,
}

impl CustomFunction {
    /// Create a custom function from its value and first two derivatives.
    pub fn new<F, V, A>(value: F, velocity: V, acceleration: A) -> Self
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
        V: Fn(f64) -> f64 + Send + Sync + 'static,
        A: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        Self {
            value: Arc::new(value),
            velocity: Arc::new(velocity),
            acceleration: Arc::new(acceleration),
        }
    }
}

impl std::fmt::Debug for CustomFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomFunction").finish_non_exhaustive()
    }
}

/// Prescribed value of a constraint as a function of time.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DrivingFunction {
    /// Time-independent target.
    Constant(f64),
    /// Polynomial in `t`, lowest order first.
    Polynomial(Vec<f64>),
    /// `offset + amplitude·cos(frequency·t + phase)`.
    Harmonic {
        /// Amplitude.
        amplitude: f64,
        /// Angular frequency (rad/s).
        frequency: f64,
        /// Phase (rad).
        phase: f64,
        /// Constant offset.
        #[cfg_attr(feature = "serde", serde(default))]
        offset: f64,
    },
    /// User closures.
    #[cfg_attr(feature = "serde", serde(skip))]
    Custom(CustomFunction),
}

impl Default for DrivingFunction {
    fn default() -> Self {
        Self::Constant(0.0)
    }
}

impl DrivingFunction {
    /// `cos(frequency·t + phase)`, the usual form for driving a dot product
    /// through a rotation at constant rate.
    #[must_use]
    pub fn cosine(frequency: f64, phase: f64) -> Self {
        Self::Harmonic {
            amplitude: 1.0,
            frequency,
            phase,
            offset: 0.0,
        }
    }

    /// Custom closed-form triple.
    pub fn custom<F, V, A>(value: F, velocity: V, acceleration: A) -> Self
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
        V: Fn(f64) -> f64 + Send + Sync + 'static,
        A: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        Self::Custom(CustomFunction::new(value, velocity, acceleration))
    }

    /// Whether the target is constant in time.
    #[must_use]
    pub fn is_constant(&self) -> bool {
        match self {
            Self::Constant(_) => true,
            Self::Polynomial(c) => c.iter().skip(1).all(|&x| x == 0.0),
            Self::Harmonic {
                amplitude,
                frequency,
                ..
            } => *amplitude == 0.0 || *frequency == 0.0,
            Self::Custom(_) => false,
        }
    }

    /// `f(t)`.
    #[must_use]
    pub fn value(&self, t: f64) -> f64 {
        match self {
            Self::Constant(c) => *c,
            Self::Polynomial(c) => horner(c.iter().copied(), t),
            Self::Harmonic {
                amplitude,
                frequency,
                phase,
                offset,
            } => offset + amplitude * (frequency * t + phase).cos(),
            Self::Custom(f) => (f.value)(t),
        }
    }

    /// `ḟ(t)`.
    #[must_use]
    pub fn velocity(&self, t: f64) -> f64 {
        match self {
            Self::Constant(_) => 0.0,
            Self::Polynomial(c) => horner(
                c.iter()
                    .enumerate()
                    .skip(1)
                    .map(|(k, &ck)| k as f64 * ck),
                t,
            ),
            Self::Harmonic {
                amplitude,
                frequency,
                phase,
                ..
            } => -amplitude * frequency * (frequency * t + phase).sin(),
            Self::Custom(f) => (f.velocity)(t),
        }
    }

    /// `f̈(t)`.
    #[must_use]
    pub fn acceleration(&self, t: f64) -> f64 {
        match self {
            Self::Constant(_) => 0.0,
            Self::Polynomial(c) => horner(
                c.iter()
                    .enumerate()
                    .skip(2)
                    .map(|(k, &ck)| (k * (k - 1)) as f64 * ck),
                t,
            ),
            Self::Harmonic {
                amplitude,
                frequency,
                phase,
                ..
            } => -amplitude * frequency * frequency * (frequency * t + phase).cos(),
            Self::Custom(f) => (f.acceleration)(t),
        }
    }
}

/// Evaluate `c0 + c1·t + c2·t² + ...` with coefficients lowest order first.
fn horner<I>(coefficients: I, t: f64) -> f64
where
    I: DoubleEndedIterator<Item = f64>,
{
    coefficients.rev().fold(0.0, |acc, c| acc * t + c)
}
