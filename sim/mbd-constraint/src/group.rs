//! Ordered constraint set with stacked assembly and singularity swapping.
//!
//! Row `k` of every stacked quantity belongs to constraint slot `k`, and the
//! same index addresses the Lagrange multiplier of that slot. Swapping a
//! driving constraint for its alternate keeps the slot, so multipliers stay
//! aligned.
//!
//! # Singularity Swapping
//!
//! A DP1 driver `a_iᵀ a_j = cos θ(t)` loses rank as `cos θ → ±1`. A slot may
//! carry a pre-registered alternate that prescribes the same motion through
//! a different axis pair. Before each step [`ConstraintGroup::maybe_swap`]
//! replaces the active formulation when its prescribed value satisfies
//! `|f(t)| > threshold` and the alternate's does not. Since the two
//! prescribed values of a well-posed pair cannot both exceed the threshold,
//! each approach to a singular configuration produces exactly one swap.

use nalgebra::{DMatrix, DVector, RowDVector};

use mbd_types::{Body, Result, SimError};

use crate::Constraint;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default value of `|f(t)|` above which a driver is swapped.
pub const DEFAULT_SWAP_THRESHOLD: f64 = 0.9;

/// Record of one constraint swap.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SwapEvent {
    /// Time of the step that triggered the swap.
    pub time: f64,
    /// Constraint slot (row and multiplier index).
    pub slot: usize,
    /// Name of the formulation that was active before the swap.
    pub from: String,
    /// Name of the formulation that is active after the swap.
    pub to: String,
}

/// All constraints of a system, in multiplier order.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConstraintGroup {
    constraints: Vec<Constraint>,
    alternates: Vec<Option<Constraint>>,
    nb: usize,
    swap_threshold: f64,
    #[cfg_attr(feature = "serde", serde(skip))]
    events: Vec<SwapEvent>,
}

impl ConstraintGroup {
    /// Create a group over `nb` non-ground bodies.
    #[must_use]
    pub fn new(constraints: Vec<Constraint>, nb: usize) -> Self {
        let alternates = vec![None; constraints.len()];
        Self {
            constraints,
            alternates,
            nb,
            swap_threshold: DEFAULT_SWAP_THRESHOLD,
            events: Vec::new(),
        }
    }

    /// Set the swap threshold on `|f(t)|`.
    #[must_use]
    pub fn with_swap_threshold(mut self, threshold: f64) -> Self {
        self.swap_threshold = threshold;
        self
    }

    /// Register an alternate formulation for `slot`.
    pub fn register_alternate(&mut self, slot: usize, alternate: Constraint) -> Result<()> {
        let nc = self.nc();
        let entry = self.alternates.get_mut(slot).ok_or_else(|| {
            SimError::invalid_config(format!("swap slot {slot} out of range (nc = {nc})"))
        })?;
        alternate.validate(self.nb)?;
        *entry = Some(alternate);
        Ok(())
    }

    /// Number of constraints `nc`.
    #[must_use]
    pub fn nc(&self) -> usize {
        self.constraints.len()
    }

    /// Number of bodies `nb`.
    #[must_use]
    pub fn nb(&self) -> usize {
        self.nb
    }

    /// Swap threshold on `|f(t)|`.
    #[must_use]
    pub fn swap_threshold(&self) -> f64 {
        self.swap_threshold
    }

    /// Active constraints in slot order.
    #[must_use]
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Active constraint in `slot`.
    #[must_use]
    pub fn constraint(&self, slot: usize) -> Option<&Constraint> {
        self.constraints.get(slot)
    }

    /// Inactive alternate registered for `slot`.
    #[must_use]
    pub fn alternate(&self, slot: usize) -> Option<&Constraint> {
        self.alternates.get(slot).and_then(Option::as_ref)
    }

    /// Swaps performed so far, oldest first.
    #[must_use]
    pub fn swap_events(&self) -> &[SwapEvent] {
        &self.events
    }

    /// Check every body reference against `nb`.
    pub fn validate(&self) -> Result<()> {
        self.constraints
            .iter()
            .chain(self.alternates.iter().flatten())
            .try_for_each(|c| c.validate(self.nb))
    }

    /// Stacked residual `Φ(q, t)`, length `nc`.
    #[must_use]
    pub fn phi(&self, bodies: &[Body], t: f64) -> DVector<f64> {
        DVector::from_iterator(self.nc(), self.constraints.iter().map(|c| c.phi(bodies, t)))
    }

    /// Translational Jacobian `Φ_r`, `nc × 3nb`.
    #[must_use]
    pub fn phi_r(&self, bodies: &[Body]) -> DMatrix<f64> {
        self.stack_rows(|c| c.phi_r(bodies))
    }

    /// Rotational Jacobian `Π`, `nc × 3nb`.
    #[must_use]
    pub fn pi(&self, bodies: &[Body]) -> DMatrix<f64> {
        self.stack_rows(|c| c.pi(bodies))
    }

    /// Full Jacobian `Φ_q = [Φ_r | Π]`, `nc × 6nb`.
    #[must_use]
    pub fn phi_q(&self, bodies: &[Body]) -> DMatrix<f64> {
        let n = 3 * self.nb;
        let mut phi_q = DMatrix::zeros(self.nc(), 2 * n);
        phi_q.columns_mut(0, n).copy_from(&self.phi_r(bodies));
        phi_q.columns_mut(n, n).copy_from(&self.pi(bodies));
        phi_q
    }

    /// Stacked velocity right-hand side `ν(t)`.
    #[must_use]
    pub fn nu(&self, t: f64) -> DVector<f64> {
        DVector::from_iterator(self.nc(), self.constraints.iter().map(|c| c.nu(t)))
    }

    /// Stacked acceleration right-hand side `γ(q, q̇, t)`.
    #[must_use]
    pub fn gamma(&self, bodies: &[Body], t: f64) -> DVector<f64> {
        DVector::from_iterator(
            self.nc(),
            self.constraints.iter().map(|c| c.gamma(bodies, t)),
        )
    }

    /// Swap near-singular drivers for their alternates.
    ///
    /// Returns the number of swaps performed at `t`.
    pub fn maybe_swap(&mut self, t: f64) -> usize {
        let threshold = self.swap_threshold;
        let mut swapped = 0;
        for (slot, (active, alternate)) in self
            .constraints
            .iter_mut()
            .zip(self.alternates.iter_mut())
            .enumerate()
        {
            let Some(alternate) = alternate.as_mut() else {
                continue;
            };
            if active.target().value(t).abs() <= threshold
                || alternate.target().value(t).abs() > threshold
            {
                continue;
            }

            std::mem::swap(active, alternate);
            tracing::info!(
                time = t,
                slot,
                from = alternate.name(),
                to = active.name(),
                "Swapped g-con at time {:.3}",
                t
            );
            self.events.push(SwapEvent {
                time: t,
                slot,
                from: alternate.name().to_string(),
                to: active.name().to_string(),
            });
            swapped += 1;
        }
        swapped
    }

    fn stack_rows<F>(&self, row: F) -> DMatrix<f64>
    where
        F: Fn(&Constraint) -> RowDVector<f64>,
    {
        let mut out = DMatrix::zeros(self.nc(), 3 * self.nb);
        for (k, c) in self.constraints.iter().enumerate() {
            out.row_mut(k).copy_from(&row(c));
        }
        out
    }
}
