//! The snapping objective and constraint over the flattened 3N variable.
//!
//! f(e) = Σ_i ‖e_i − e0_i‖² + Σ_{i≠j} α_ij (‖e_i − e_j‖ − d0_ij)²
//! c(e) = Σ_i ‖e_i − s_i‖²                       (aggregate mode)
//! f(e) += w · Σ_i ‖e_i − s_i‖²                   (penalty mode, no c)

use nalgebra::{DMatrix, DVector, Vector3};

use super::cfg::ConstraintMode;
use super::sqp::Problem;
use crate::error::{ensure_finite, SnapError};
use crate::geom::{flatten, pairwise_distances, unflatten, Point3};

#[derive(Clone, Debug)]
pub struct SnapProblem {
    e0: Vec<Point3>,
    d0: DMatrix<f64>,
    alpha: DMatrix<f64>,
    targets: Vec<Point3>,
    mode: ConstraintMode,
    /// False when the array has fewer than two electrodes.
    distance_term: bool,
}

impl SnapProblem {
    /// Validate shapes and finiteness, then fix `d0` from `e0`.
    pub fn new(
        e0: &[Point3],
        alpha: &DMatrix<f64>,
        targets: &[Point3],
        mode: ConstraintMode,
    ) -> Result<Self, SnapError> {
        let n = e0.len();
        if n == 0 {
            return Err(SnapError::EmptyElectrodes);
        }
        if alpha.nrows() != n || alpha.ncols() != n {
            return Err(SnapError::shape(
                "adjacency matrix",
                format!("{n}x{n}"),
                format!("{}x{}", alpha.nrows(), alpha.ncols()),
            ));
        }
        if targets.len() != n {
            return Err(SnapError::shape("target surface points", n, targets.len()));
        }
        ensure_finite("electrodes", e0)?;
        ensure_finite("target surface points", targets)?;
        if let Some(k) = alpha.iter().position(|a| !a.is_finite()) {
            return Err(SnapError::NonFinite {
                what: "adjacency matrix",
                index: k,
            });
        }
        Ok(Self {
            e0: e0.to_vec(),
            d0: pairwise_distances(e0),
            alpha: alpha.clone(),
            targets: targets.to_vec(),
            mode,
            distance_term: n >= 2,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.e0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.e0.is_empty()
    }

    /// Initial guess: the measured coordinates.
    pub fn initial_guess(&self) -> DVector<f64> {
        DVector::from_vec(flatten(&self.e0))
    }

    /// Reshape a flat iterate into points.
    pub fn points(&self, x: &DVector<f64>) -> Vec<Point3> {
        unflatten(x.as_slice())
    }

    /// `Σ‖e_i − s_i‖²`.
    pub fn surface_residual(&self, x: &DVector<f64>) -> f64 {
        self.targets
            .iter()
            .enumerate()
            .map(|(i, s)| (point(x, i) - s).norm_squared())
            .sum()
    }

    /// `Σ_{i≠j} α_ij (d_ij − d0_ij)²`.
    pub fn distortion(&self, x: &DVector<f64>) -> f64 {
        if !self.distance_term {
            return 0.0;
        }
        let n = self.e0.len();
        let mut acc = 0.0;
        for i in 0..n {
            let ei = point(x, i);
            for j in 0..n {
                let a = self.alpha[(i, j)];
                if i == j || a == 0.0 {
                    continue;
                }
                let r = (ei - point(x, j)).norm() - self.d0[(i, j)];
                acc += a * r * r;
            }
        }
        acc
    }

    fn drift(&self, x: &DVector<f64>) -> f64 {
        self.e0
            .iter()
            .enumerate()
            .map(|(i, p)| (point(x, i) - p).norm_squared())
            .sum()
    }
}

#[inline]
fn point(x: &DVector<f64>, i: usize) -> Vector3<f64> {
    Vector3::new(x[3 * i], x[3 * i + 1], x[3 * i + 2])
}

#[inline]
fn add_at(g: &mut DVector<f64>, i: usize, v: Vector3<f64>) {
    g[3 * i] += v.x;
    g[3 * i + 1] += v.y;
    g[3 * i + 2] += v.z;
}

impl Problem for SnapProblem {
    fn dim(&self) -> usize {
        3 * self.e0.len()
    }

    fn objective(&self, x: &DVector<f64>) -> f64 {
        let mut f = self.drift(x) + self.distortion(x);
        if let ConstraintMode::Penalty { weight } = self.mode {
            f += weight * self.surface_residual(x);
        }
        f
    }

    fn gradient(&self, x: &DVector<f64>) -> DVector<f64> {
        let n = self.e0.len();
        let mut g = DVector::zeros(3 * n);
        for (i, p) in self.e0.iter().enumerate() {
            add_at(&mut g, i, 2.0 * (point(x, i) - p));
        }
        if self.distance_term {
            for i in 0..n {
                let ei = point(x, i);
                for j in 0..n {
                    let a = self.alpha[(i, j)];
                    if i == j || a == 0.0 {
                        continue;
                    }
                    let diff = ei - point(x, j);
                    let d = diff.norm();
                    // Coincident electrodes: zero subgradient.
                    if d == 0.0 {
                        continue;
                    }
                    let w = 2.0 * a * (d - self.d0[(i, j)]) / d;
                    add_at(&mut g, i, w * diff);
                    add_at(&mut g, j, -w * diff);
                }
            }
        }
        if let ConstraintMode::Penalty { weight } = self.mode {
            for (i, s) in self.targets.iter().enumerate() {
                add_at(&mut g, i, 2.0 * weight * (point(x, i) - s));
            }
        }
        g
    }

    fn equality(&self, x: &DVector<f64>) -> Option<(f64, DVector<f64>)> {
        match self.mode {
            ConstraintMode::Penalty { .. } => None,
            ConstraintMode::Aggregate => {
                let mut a = DVector::zeros(3 * self.e0.len());
                for (i, s) in self.targets.iter().enumerate() {
                    add_at(&mut a, i, 2.0 * (point(x, i) - s));
                }
                Some((self.surface_residual(x), a))
            }
        }
    }

    fn equality_hessian(&self, _x: &DVector<f64>) -> Option<DMatrix<f64>> {
        match self.mode {
            ConstraintMode::Penalty { .. } => None,
            ConstraintMode::Aggregate => {
                let n = 3 * self.e0.len();
                Some(DMatrix::identity(n, n) * 2.0)
            }
        }
    }
}
