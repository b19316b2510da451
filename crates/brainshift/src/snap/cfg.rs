//! Snapping configuration.
//!
//! Defaults: one aggregate equality constraint, at most 100 SQP iterations,
//! accuracy 1e-6.

use crate::error::SnapError;

/// How "land on the surface" enters the problem.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConstraintMode {
    /// Hard scalar equality `Σ‖e_i − s_i‖² = 0`. Taken to exactness this pins
    /// every electrode to its target; in practice the solver stops within
    /// `SolverCfg::ftol` of it.
    Aggregate,
    /// No hard constraint; `weight · Σ‖e_i − s_i‖²` is added to the objective,
    /// so each electrode settles part of the way toward its target.
    Penalty { weight: f64 },
}

impl Default for ConstraintMode {
    fn default() -> Self {
        Self::Aggregate
    }
}

/// SQP solver knobs.
#[derive(Clone, Copy, Debug)]
pub struct SolverCfg {
    pub max_iter: usize,
    /// Stop when both `|f_k − f_{k−1}|` and `|c(x_k)|` fall below this.
    pub ftol: f64,
    /// Backtracking halvings per iteration before giving up.
    pub max_line_search: usize,
    /// Sufficient-decrease fraction of the merit directional derivative.
    pub armijo: f64,
}

impl Default for SolverCfg {
    fn default() -> Self {
        Self {
            max_iter: 100,
            ftol: 1e-6,
            max_line_search: 20,
            armijo: 0.1,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SnapCfg {
    pub constraint: ConstraintMode,
    pub solver: SolverCfg,
}

impl SnapCfg {
    pub fn validate(&self) -> Result<(), SnapError> {
        if let ConstraintMode::Penalty { weight } = self.constraint {
            if !(weight.is_finite() && weight > 0.0) {
                return Err(SnapError::config("penalty weight must be finite and > 0"));
            }
        }
        let s = &self.solver;
        if s.max_iter == 0 {
            return Err(SnapError::config("max_iter must be >= 1"));
        }
        if !(s.ftol.is_finite() && s.ftol > 0.0) {
            return Err(SnapError::config("ftol must be finite and > 0"));
        }
        if !(s.armijo > 0.0 && s.armijo < 1.0) {
            return Err(SnapError::config("armijo must lie in (0, 1)"));
        }
        Ok(())
    }
}
