use crate::error::{ensure_finite, SnapError};

use super::{Affine3, Point3};

/// Vertex indices of one triangle.
pub type Triangle = [usize; 3];

/// Triangulated surface (one hemisphere or both merged).
///
/// Invariants:
/// - every triangle index is `< vertices.len()`;
/// - every vertex coordinate is finite.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    vertices: Vec<Point3>,
    triangles: Vec<Triangle>,
}

impl Mesh {
    pub fn new(vertices: Vec<Point3>, triangles: Vec<Triangle>) -> Result<Self, SnapError> {
        ensure_finite("mesh vertices", &vertices)?;
        let vertex_count = vertices.len();
        for (t, tri) in triangles.iter().enumerate() {
            if let Some(&vertex) = tri.iter().find(|&&v| v >= vertex_count) {
                return Err(SnapError::InvalidTriangle {
                    triangle: t,
                    vertex,
                    vertex_count,
                });
            }
        }
        Ok(Self {
            vertices,
            triangles,
        })
    }

    /// Generator-side constructor; callers build indices in range by construction.
    pub(crate) fn from_parts(vertices: Vec<Point3>, triangles: Vec<Triangle>) -> Self {
        debug_assert!(triangles.iter().flatten().all(|&v| v < vertices.len()));
        Self {
            vertices,
            triangles,
        }
    }

    /// Concatenate left then right hemisphere; right triangle indices are
    /// offset by the left vertex count.
    pub fn merge_hemispheres(left: &Mesh, right: &Mesh) -> Mesh {
        let offset = left.vertices.len();
        let mut vertices = Vec::with_capacity(offset + right.vertices.len());
        vertices.extend_from_slice(&left.vertices);
        vertices.extend_from_slice(&right.vertices);
        let mut triangles = Vec::with_capacity(left.triangles.len() + right.triangles.len());
        triangles.extend_from_slice(&left.triangles);
        triangles.extend(
            right
                .triangles
                .iter()
                .map(|t| [t[0] + offset, t[1] + offset, t[2] + offset]),
        );
        Mesh {
            vertices,
            triangles,
        }
    }

    /// Same connectivity, vertices pushed through `affine`.
    pub fn transformed(&self, affine: &Affine3) -> Mesh {
        Mesh {
            vertices: affine.apply_points(&self.vertices),
            triangles: self.triangles.clone(),
        }
    }

    #[inline]
    pub fn vertices(&self) -> &[Point3] {
        &self.vertices
    }

    #[inline]
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}
