//! Nearest-vertex projection of electrodes onto a surface mesh.
//!
//! Purpose
//! - Assign each electrode a snapping target: the mesh vertex closest to its
//!   original position (a vertex, never a point interpolated on a triangle).
//!
//! Why this design
//! - Meshes carry hundreds of thousands of vertices while arrays hold tens to
//!   low hundreds of electrodes, so the vertex cloud is indexed once in a
//!   k-d tree and each electrode is an independent query.
//! - Ties resolve to the lowest vertex index, which matches a brute-force
//!   first-minimum scan (`nearest_vertex_brute`), so the index is a drop-in
//!   replacement.

mod kdtree;

pub use kdtree::{KdTree, Nearest};

use crate::error::{ensure_finite, SnapError};
use crate::geom::{Mesh, Point3};

/// Targets for a whole electrode set.
#[derive(Clone, Debug, Default)]
pub struct Projection {
    /// Target point per electrode (`s` in the snapping objective).
    pub targets: Vec<Point3>,
    /// Mesh vertex index per electrode.
    pub vertex_indices: Vec<usize>,
    /// Euclidean electrode→target distance per electrode.
    pub distances: Vec<f64>,
}

impl Projection {
    pub fn mean_distance(&self) -> f64 {
        if self.distances.is_empty() {
            return 0.0;
        }
        self.distances.iter().sum::<f64>() / self.distances.len() as f64
    }

    pub fn max_distance(&self) -> f64 {
        self.distances.iter().copied().fold(0.0, f64::max)
    }
}

/// Vertex index over one (already transformed) mesh.
#[derive(Clone, Debug)]
pub struct SurfaceProjector {
    vertices: Vec<Point3>,
    tree: KdTree,
}

impl SurfaceProjector {
    pub fn new(vertices: &[Point3]) -> Result<Self, SnapError> {
        if vertices.is_empty() {
            return Err(SnapError::EmptyMesh);
        }
        ensure_finite("mesh vertices", vertices)?;
        Ok(Self {
            vertices: vertices.to_vec(),
            tree: KdTree::build(vertices),
        })
    }

    /// Index only the vertex positions; triangles are ignored.
    pub fn from_mesh(mesh: &Mesh) -> Result<Self, SnapError> {
        Self::new(mesh.vertices())
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// `(vertex index, vertex)` closest to `q`.
    pub fn nearest_vertex(&self, q: Point3) -> (usize, Point3) {
        // Non-empty by construction.
        let hit = self
            .tree
            .nearest(q)
            .unwrap_or(Nearest { index: 0, dist2: 0.0 });
        (hit.index, self.vertices[hit.index])
    }

    pub fn project(&self, electrodes: &[Point3]) -> Result<Projection, SnapError> {
        ensure_finite("electrodes", electrodes)?;
        let mut out = Projection {
            targets: Vec::with_capacity(electrodes.len()),
            vertex_indices: Vec::with_capacity(electrodes.len()),
            distances: Vec::with_capacity(electrodes.len()),
        };
        for &e in electrodes {
            let (index, v) = self.nearest_vertex(e);
            out.targets.push(v);
            out.vertex_indices.push(index);
            out.distances.push((v - e).norm());
        }
        tracing::debug!(
            electrodes = electrodes.len(),
            vertices = self.vertices.len(),
            mean_distance = out.mean_distance(),
            max_distance = out.max_distance(),
            "projected electrodes onto surface"
        );
        Ok(out)
    }
}

/// Linear-scan reference: first vertex of minimum distance, `None` if empty.
pub fn nearest_vertex_brute(vertices: &[Point3], q: Point3) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in vertices.iter().enumerate() {
        let d2 = (v - q).norm_squared();
        if best.map_or(true, |(_, b)| d2 < b) {
            best = Some((i, d2));
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests;
