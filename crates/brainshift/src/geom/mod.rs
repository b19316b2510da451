//! Point sets, meshes, and homogeneous affine maps in R³.
//!
//! Purpose
//! - Carry electrode coordinates and cortical surface meshes between the
//!   pipeline stages with explicit, immutable types.
//! - Map mesh vertices from surface space into electrode space via a 4×4
//!   homogeneous transform supplied by the caller.
//!
//! Conventions
//! - Points are `nalgebra::Vector3<f64>`; index i always names the same
//!   electrode across every structure built from a point set.
//! - Affine maps are applied to column vectors: `y = M [x; 1]`, trailing
//!   component dropped (no perspective divide).
//! - Meshes are validated once at construction; triangles are carried along
//!   but only vertex positions take part in proximity queries.

mod affine;
mod mesh;

pub use affine::Affine3;
pub use mesh::{Mesh, Triangle};

use nalgebra::Vector3;

/// Electrode or vertex coordinates.
pub type Point3 = Vector3<f64>;

/// Flatten points into `[x0, y0, z0, x1, ...]`.
pub fn flatten(points: &[Point3]) -> Vec<f64> {
    points.iter().flat_map(|p| [p.x, p.y, p.z]).collect()
}

/// Inverse of `flatten`; trailing scalars that do not fill a triple are dropped.
pub fn unflatten(xs: &[f64]) -> Vec<Point3> {
    xs.chunks_exact(3)
        .map(|c| Point3::new(c[0], c[1], c[2]))
        .collect()
}

/// Dense pairwise Euclidean distances, row-major `n×n`.
pub fn pairwise_distances(points: &[Point3]) -> nalgebra::DMatrix<f64> {
    let n = points.len();
    nalgebra::DMatrix::from_fn(n, n, |i, j| (points[i] - points[j]).norm())
}
