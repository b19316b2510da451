//! Sequential quadratic programming for one scalar equality constraint.
//!
//! Each iteration solves the quadratic subproblem
//!   min_p  gᵀp + ½ pᵀWp   s.t.  c + aᵀp = 0
//! in closed form through the Schur complement of its KKT system
//! (`W` Cholesky-factored), then backtracks on the L1 merit
//! `φ(x) = f(x) + μ|c(x)|`. Without a constraint this reduces to BFGS with an
//! Armijo line search.
//!
//! Curvature model
//! - Default: `W = B`, a damped (Powell) BFGS approximation of the Lagrangian
//!   Hessian.
//! - When the problem supplies `∇²c` (`Problem::equality_hessian`), `B` models
//!   `∇²f` only and `W = B + λ⁺∇²c`, with `λ⁺ = max(λ, 0)` iterated to a fixed
//!   point of the subproblem. Constraints whose gradient vanishes on the
//!   feasible set (`Σ‖e − s‖² = 0`) need this: their multiplier grows like
//!   `1/‖e − s‖` and no secant update can follow the matching curvature.
//!
//! Termination
//! - `Converged`: `|f_k − f_{k−1}| < ftol` and `|c_k| < ftol`, or a vanishing
//!   step at a feasible point. A feasible iterate whose step is below
//!   `√ftol · (1 + ‖x‖)` also counts as converged when the line search stalls.
//! - `MaxIterations`, `LineSearchFailed`, `SingularSubproblem`: the last
//!   accepted iterate is returned unchanged; callers decide what to do.

use nalgebra::{DMatrix, DVector};

use super::cfg::SolverCfg;

/// Smooth objective with an optional scalar equality over `R^dim`.
pub trait Problem {
    fn dim(&self) -> usize;
    fn objective(&self, x: &DVector<f64>) -> f64;
    fn gradient(&self, x: &DVector<f64>) -> DVector<f64>;
    /// `(c(x), ∇c(x))` when the problem carries an equality `c(x) = 0`.
    fn equality(&self, x: &DVector<f64>) -> Option<(f64, DVector<f64>)>;
    /// Exact `∇²c(x)`, if known.
    fn equality_hessian(&self, _x: &DVector<f64>) -> Option<DMatrix<f64>> {
        None
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolveStatus {
    Converged,
    MaxIterations,
    /// No step along the search direction decreased the merit function.
    LineSearchFailed,
    /// The quasi-Newton matrix could not be factored even after a reset.
    SingularSubproblem,
}

impl SolveStatus {
    #[inline]
    pub fn is_converged(self) -> bool {
        matches!(self, SolveStatus::Converged)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SolveStatus::Converged => "converged",
            SolveStatus::MaxIterations => "max_iterations",
            SolveStatus::LineSearchFailed => "line_search_failed",
            SolveStatus::SingularSubproblem => "singular_subproblem",
        }
    }
}

impl std::fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable outcome of a solve.
#[derive(Clone, Copy, Debug)]
pub struct SolveReport {
    pub status: SolveStatus,
    pub iterations: usize,
    pub objective: f64,
    /// `c(x)` at the returned iterate (0 when unconstrained).
    pub constraint: f64,
    /// Last equality multiplier estimate (0 when unconstrained).
    pub multiplier: f64,
    pub objective_evals: usize,
    pub gradient_evals: usize,
}

#[derive(Clone, Debug)]
pub struct Solution {
    pub x: DVector<f64>,
    pub report: SolveReport,
}

/// Relative step size under which a feasible iterate counts as stationary.
const STEP_EPS: f64 = 1e-12;
/// Curvature guard for the BFGS update and the merit penalty bound.
const CURV_EPS: f64 = 1e-14;
/// Subproblem solves per iteration while settling `λ⁺` in `W = B + λ⁺∇²c`.
const MULTIPLIER_PASSES: usize = 8;

struct Iterate {
    x: DVector<f64>,
    f: f64,
    g: DVector<f64>,
    c: f64,
    a: Option<DVector<f64>>,
    hc: Option<DMatrix<f64>>,
}

struct Counters {
    f: usize,
    g: usize,
}

fn evaluate<P: Problem>(p: &P, x: DVector<f64>, k: &mut Counters) -> Iterate {
    let f = p.objective(&x);
    let g = p.gradient(&x);
    let (c, a, hc) = match p.equality(&x) {
        Some((c, a)) => (c, Some(a), p.equality_hessian(&x)),
        None => (0.0, None, None),
    };
    k.f += 1;
    k.g += 1;
    Iterate { x, f, g, c, a, hc }
}

/// Objective and constraint value only (line-search trial points).
fn trial<P: Problem>(p: &P, x: &DVector<f64>, k: &mut Counters) -> (f64, f64) {
    k.f += 1;
    let c = p.equality(x).map_or(0.0, |(c, _)| c);
    (p.objective(x), c)
}

/// QP step and multiplier for model matrix `w`. `None` when `w` cannot be factored.
fn qp_step(w: &DMatrix<f64>, it: &Iterate) -> Option<(DVector<f64>, f64)> {
    let chol = w.clone().cholesky()?;
    let hg = chol.solve(&it.g);
    match &it.a {
        Some(a) => {
            let ha = chol.solve(a);
            let denom = a.dot(&ha);
            if denom > 0.0 && denom.is_finite() {
                let lam = (it.c - a.dot(&hg)) / denom;
                Some((-(hg + ha * lam), lam))
            } else {
                // ∇c vanishes: the linearised constraint carries no direction.
                Some((-hg, 0.0))
            }
        }
        None => Some((-hg, 0.0)),
    }
}

/// Step, multiplier and the model matrix they were computed with.
type Subproblem = (DVector<f64>, f64, DMatrix<f64>);

/// Solve the subproblem, folding exact constraint curvature into `b` when known.
fn subproblem(b: &DMatrix<f64>, it: &Iterate, lam_prev: f64) -> Option<Subproblem> {
    let Some(hc) = &it.hc else {
        let (step, lam) = qp_step(b, it)?;
        return Some((step, lam, b.clone()));
    };
    let mut guess = lam_prev.max(0.0);
    let mut out = None;
    for _ in 0..MULTIPLIER_PASSES {
        let w = b + hc * guess;
        let (step, lam) = qp_step(&w, it)?;
        let next = lam.max(0.0);
        let settled = (next - guess).abs() <= 1e-6 * (1.0 + next);
        out = Some((step, lam, w));
        if settled {
            break;
        }
        guess = next;
    }
    out
}

/// Minimise `p` from `x0`. The returned iterate is always the last accepted one.
pub fn minimize<P: Problem>(p: &P, x0: DVector<f64>, cfg: &SolverCfg) -> Solution {
    let n = p.dim();
    debug_assert_eq!(x0.len(), n);
    let mut counters = Counters { f: 0, g: 0 };
    let mut it = evaluate(p, x0, &mut counters);
    let mut b = DMatrix::<f64>::identity(n, n);
    let mut b_fresh = true;
    let mut mu = 0.0_f64;
    let mut lam = 0.0_f64;
    let mut status = SolveStatus::MaxIterations;
    let mut iterations = 0;
    let loose = cfg.ftol.sqrt();

    while iterations < cfg.max_iter {
        let (step, lam_new, w) = match subproblem(&b, &it, lam) {
            Some(s) => s,
            None => {
                b = DMatrix::identity(n, n);
                b_fresh = true;
                match subproblem(&b, &it, lam) {
                    Some(s) => s,
                    None => {
                        status = SolveStatus::SingularSubproblem;
                        break;
                    }
                }
            }
        };
        lam = lam_new;

        let feasible = it.c.abs() < cfg.ftol;
        let scale = 1.0 + it.x.norm();
        if feasible && step.norm() <= STEP_EPS * scale {
            status = SolveStatus::Converged;
            break;
        }
        // Feasible and nearly stationary: a stalled line search here is
        // round-off, not failure.
        let settled = feasible && step.norm() <= loose * scale;

        // Penalty large enough for the QP step to be a merit descent direction,
        // and never decreasing.
        let gp = it.g.dot(&step);
        if it.c.abs() > CURV_EPS {
            let bound = (gp + 0.5 * step.dot(&(&w * &step))) / (0.5 * it.c.abs());
            mu = mu.max(bound);
        }
        mu = mu.max(2.0 * lam.abs());
        let merit = it.f + mu * it.c.abs();
        let slope = gp - mu * it.c.abs();
        if slope.is_nan() || slope >= 0.0 {
            if settled {
                status = SolveStatus::Converged;
                break;
            }
            if !b_fresh {
                tracing::trace!(iterations, slope, "non-descent step, resetting quasi-Newton matrix");
                b = DMatrix::identity(n, n);
                b_fresh = true;
                continue;
            }
            status = SolveStatus::LineSearchFailed;
            break;
        }

        let mut t = 1.0;
        let mut accepted = None;
        for _ in 0..=cfg.max_line_search {
            let xt = &it.x + &step * t;
            let (ft, ct) = trial(p, &xt, &mut counters);
            let merit_t = ft + mu * ct.abs();
            if merit_t.is_finite() && merit_t <= merit + cfg.armijo * t * slope {
                accepted = Some(xt);
                break;
            }
            t *= 0.5;
        }
        let Some(x_new) = accepted else {
            status = if settled {
                SolveStatus::Converged
            } else {
                SolveStatus::LineSearchFailed
            };
            break;
        };

        let next = evaluate(p, x_new, &mut counters);
        iterations += 1;

        // Damped BFGS. With exact constraint curvature `B` follows `∇f` alone;
        // otherwise `∇L = g + λ a`, both sides at the new multiplier.
        let s = &next.x - &it.x;
        let mut y = &next.g - &it.g;
        if it.hc.is_none() {
            if let (Some(a_new), Some(a_old)) = (&next.a, &it.a) {
                y += (a_new - a_old) * lam;
            }
        }
        let bs = &b * &s;
        let sbs = s.dot(&bs);
        if sbs > CURV_EPS {
            let sy = s.dot(&y);
            if sy < 0.2 * sbs {
                let theta = 0.8 * sbs / (sbs - sy);
                y = &y * theta + &bs * (1.0 - theta);
            }
            let sy = s.dot(&y);
            if sy > CURV_EPS {
                b += &y * y.transpose() / sy - &bs * bs.transpose() / sbs;
                b_fresh = false;
            }
        }

        let df = (next.f - it.f).abs();
        tracing::trace!(
            iterations,
            f = next.f,
            c = next.c,
            step = t,
            lambda = lam,
            "sqp iteration"
        );
        it = next;
        if df < cfg.ftol && it.c.abs() < cfg.ftol {
            status = SolveStatus::Converged;
            break;
        }
    }

    let report = SolveReport {
        status,
        iterations,
        objective: it.f,
        constraint: it.c,
        multiplier: lam,
        objective_evals: counters.f,
        gradient_evals: counters.g,
    };
    tracing::debug!(
        status = %report.status,
        iterations = report.iterations,
        objective = report.objective,
        constraint = report.constraint,
        "sqp finished"
    );
    Solution { x: it.x, report }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dvector;

    /// min (x−3)² + (y+1)², unconstrained.
    struct Bowl;
    impl Problem for Bowl {
        fn dim(&self) -> usize {
            2
        }
        fn objective(&self, x: &DVector<f64>) -> f64 {
            (x[0] - 3.0).powi(2) + (x[1] + 1.0).powi(2)
        }
        fn gradient(&self, x: &DVector<f64>) -> DVector<f64> {
            dvector![2.0 * (x[0] - 3.0), 2.0 * (x[1] + 1.0)]
        }
        fn equality(&self, _x: &DVector<f64>) -> Option<(f64, DVector<f64>)> {
            None
        }
    }

    /// min x² + y² s.t. x + y − 1 = 0  →  (½, ½), λ = −1.
    struct LinearEq;
    impl Problem for LinearEq {
        fn dim(&self) -> usize {
            2
        }
        fn objective(&self, x: &DVector<f64>) -> f64 {
            x[0] * x[0] + x[1] * x[1]
        }
        fn gradient(&self, x: &DVector<f64>) -> DVector<f64> {
            dvector![2.0 * x[0], 2.0 * x[1]]
        }
        fn equality(&self, x: &DVector<f64>) -> Option<(f64, DVector<f64>)> {
            Some((x[0] + x[1] - 1.0, dvector![1.0, 1.0]))
        }
    }

    /// min (x−2)² + y² s.t. x² + y² − 1 = 0  →  (1, 0).
    struct Circle;
    impl Problem for Circle {
        fn dim(&self) -> usize {
            2
        }
        fn objective(&self, x: &DVector<f64>) -> f64 {
            (x[0] - 2.0).powi(2) + x[1] * x[1]
        }
        fn gradient(&self, x: &DVector<f64>) -> DVector<f64> {
            dvector![2.0 * (x[0] - 2.0), 2.0 * x[1]]
        }
        fn equality(&self, x: &DVector<f64>) -> Option<(f64, DVector<f64>)> {
            Some((x[0] * x[0] + x[1] * x[1] - 1.0, dvector![2.0 * x[0], 2.0 * x[1]]))
        }
    }

    /// min ‖x − (1, 2, 7)‖² s.t. ‖x − (1, 2, 3)‖² = 0: the only feasible
    /// point is the target, where ∇c vanishes and λ is unbounded.
    struct Pinned;
    impl Pinned {
        const START: [f64; 3] = [1.0, 2.0, 7.0];
        const TARGET: [f64; 3] = [1.0, 2.0, 3.0];
    }
    impl Problem for Pinned {
        fn dim(&self) -> usize {
            3
        }
        fn objective(&self, x: &DVector<f64>) -> f64 {
            (0..3).map(|k| (x[k] - Self::START[k]).powi(2)).sum()
        }
        fn gradient(&self, x: &DVector<f64>) -> DVector<f64> {
            DVector::from_fn(3, |k, _| 2.0 * (x[k] - Self::START[k]))
        }
        fn equality(&self, x: &DVector<f64>) -> Option<(f64, DVector<f64>)> {
            let c = (0..3).map(|k| (x[k] - Self::TARGET[k]).powi(2)).sum();
            Some((c, DVector::from_fn(3, |k, _| 2.0 * (x[k] - Self::TARGET[k]))))
        }
        fn equality_hessian(&self, _x: &DVector<f64>) -> Option<DMatrix<f64>> {
            Some(DMatrix::identity(3, 3) * 2.0)
        }
    }

    /// f = x², but the reported gradient is off by 1e-5: near 0 every
    /// predicted decrease is an actual increase.
    struct Skewed;
    impl Problem for Skewed {
        fn dim(&self) -> usize {
            1
        }
        fn objective(&self, x: &DVector<f64>) -> f64 {
            x[0] * x[0]
        }
        fn gradient(&self, x: &DVector<f64>) -> DVector<f64> {
            dvector![2.0 * x[0] + 1e-5]
        }
        fn equality(&self, _x: &DVector<f64>) -> Option<(f64, DVector<f64>)> {
            None
        }
    }

    #[test]
    fn unconstrained_quadratic() {
        let sol = minimize(&Bowl, dvector![0.0, 0.0], &SolverCfg::default());
        assert!(sol.report.status.is_converged(), "{:?}", sol.report);
        assert!((sol.x[0] - 3.0).abs() < 1e-4 && (sol.x[1] + 1.0).abs() < 1e-4);
        assert_eq!(sol.report.constraint, 0.0);
    }

    #[test]
    fn linear_equality_hits_known_optimum() {
        let sol = minimize(&LinearEq, dvector![2.0, -3.0], &SolverCfg::default());
        assert!(sol.report.status.is_converged(), "{:?}", sol.report);
        assert!((sol.x[0] - 0.5).abs() < 1e-3, "{}", sol.x);
        assert!((sol.x[1] - 0.5).abs() < 1e-3, "{}", sol.x);
        assert!(sol.report.constraint.abs() < 1e-6);
        assert!((sol.report.multiplier + 1.0).abs() < 1e-2);
    }

    #[test]
    fn nonlinear_equality_on_circle() {
        let sol = minimize(&Circle, dvector![0.3, 0.8], &SolverCfg::default());
        assert!(sol.report.status.is_converged(), "{:?}", sol.report);
        assert!((sol.x[0] - 1.0).abs() < 5e-3 && sol.x[1].abs() < 5e-3, "{}", sol.x);
    }

    #[test]
    fn stationary_start_returns_immediately() {
        let sol = minimize(&Bowl, dvector![3.0, -1.0], &SolverCfg::default());
        assert_eq!(sol.report.status, SolveStatus::Converged);
        assert_eq!(sol.report.iterations, 0);
        assert_eq!(sol.x, dvector![3.0, -1.0]);
    }

    #[test]
    fn iteration_cap_is_reported() {
        let cfg = SolverCfg {
            max_iter: 1,
            ..SolverCfg::default()
        };
        let sol = minimize(&Circle, dvector![0.3, 0.8], &cfg);
        assert_eq!(sol.report.status, SolveStatus::MaxIterations);
        assert_eq!(sol.report.iterations, 1);
        assert_eq!(SolveStatus::MaxIterations.to_string(), "max_iterations");
    }

    #[test]
    fn vanishing_constraint_gradient_still_converges() {
        let sol = minimize(&Pinned, DVector::from_row_slice(&Pinned::START), &SolverCfg::default());
        assert_eq!(sol.report.status, SolveStatus::Converged, "{:?}", sol.report);
        assert!(sol.report.iterations < 60, "{:?}", sol.report);
        assert!(sol.report.constraint.abs() < 1e-6);
        assert!((sol.x - DVector::from_row_slice(&Pinned::TARGET)).norm() < 1e-3);
        // λ grows as the iterate closes in, but stays positive.
        assert!(sol.report.multiplier > 0.0);
    }

    #[test]
    fn stalled_search_at_feasible_stationary_point_is_converged() {
        let sol = minimize(&Skewed, dvector![0.0], &SolverCfg::default());
        assert_eq!(sol.report.status, SolveStatus::Converged, "{:?}", sol.report);
        assert_eq!(sol.report.iterations, 0);
        assert_eq!(sol.x, dvector![0.0]);

        // A tolerance tighter than the gradient error leaves the stall a failure.
        let tight = SolverCfg {
            ftol: 1e-14,
            ..SolverCfg::default()
        };
        let sol = minimize(&Skewed, dvector![0.0], &tight);
        assert_eq!(sol.report.status, SolveStatus::LineSearchFailed);
    }
}
