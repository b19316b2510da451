//! Constrained snapping of electrodes onto their surface targets.
//!
//! Purpose
//! - Move each electrode toward its nearest surface vertex while keeping the
//!   array close to its measured position and its adjacent spacings intact.
//!
//! Formulation
//! - Objective: `Σ‖e_i − e0_i‖² + Σ α_ij (d(e_i, e_j) − d0_ij)²` over the
//!   flattened 3N variable, starting from the measured coordinates.
//! - Surface term: one aggregate equality `Σ‖e_i − s_i‖² = 0` by default, or
//!   a weighted penalty (`ConstraintMode::Penalty`). The aggregate form only
//!   holds exactly when every electrode sits on its target; the solver's
//!   tolerance band is where the objective still shapes the result.
//! - Arrays with fewer than two electrodes drop the distance term.
//!
//! Outcome
//! - Whatever the solver returns is used, converged or not. The status is
//!   part of `Snapped::report` and a non-converged run logs a warning.

mod cfg;
mod problem;
mod sqp;

pub use cfg::{ConstraintMode, SnapCfg, SolverCfg};
pub use problem::SnapProblem;
pub use sqp::{minimize, Problem, Solution, SolveReport, SolveStatus};

use nalgebra::DMatrix;

use crate::error::SnapError;
use crate::geom::Point3;

/// Adjusted coordinates plus the solver's account of how it got there.
#[derive(Clone, Debug)]
pub struct Snapped {
    pub points: Vec<Point3>,
    pub report: SolveReport,
    /// `Σ‖e_i − s_i‖²` at the returned coordinates (both modes).
    pub surface_residual: f64,
    /// `Σ α_ij (d_ij − d0_ij)²` at the returned coordinates.
    pub distortion: f64,
}

/// Solve the snapping problem for one electrode array.
///
/// Errors only on malformed input (shape mismatch, non-finite values, empty
/// array, invalid configuration); solver trouble is reported, not raised.
pub fn snap_electrodes(
    electrodes: &[Point3],
    alpha: &DMatrix<f64>,
    targets: &[Point3],
    cfg: &SnapCfg,
) -> Result<Snapped, SnapError> {
    cfg.validate()?;
    let problem = SnapProblem::new(electrodes, alpha, targets, cfg.constraint)?;
    let solution = minimize(&problem, problem.initial_guess(), &cfg.solver);
    let report = solution.report;
    if !report.status.is_converged() {
        tracing::warn!(
            status = %report.status,
            iterations = report.iterations,
            constraint = report.constraint,
            "snapping solver did not converge; using last iterate"
        );
    }
    Ok(Snapped {
        points: problem.points(&solution.x),
        surface_residual: problem.surface_residual(&solution.x),
        distortion: problem.distortion(&solution.x),
        report,
    })
}
