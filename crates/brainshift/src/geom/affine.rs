use nalgebra::{Matrix3, Matrix4, Vector4};

use super::Point3;

/// Homogeneous 3D affine map `x ↦ M [x; 1]` (bottom row normally `[0 0 0 1]`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affine3 {
    pub m: Matrix4<f64>,
}

impl Default for Affine3 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Affine3 {
    #[inline]
    pub fn identity() -> Self {
        Self {
            m: Matrix4::identity(),
        }
    }

    #[inline]
    pub fn from_matrix(m: Matrix4<f64>) -> Self {
        Self { m }
    }

    /// Row-major construction, matching how header affines are usually written out.
    pub fn from_rows(rows: [[f64; 4]; 4]) -> Self {
        Self {
            m: Matrix4::from_fn(|r, c| rows[r][c]),
        }
    }

    /// `x ↦ L x + t`.
    pub fn from_linear(l: Matrix3<f64>, t: Point3) -> Self {
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(&l);
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&t);
        Self { m }
    }

    pub fn to_rows(&self) -> [[f64; 4]; 4] {
        let mut rows = [[0.0; 4]; 4];
        for (r, row) in rows.iter_mut().enumerate() {
            for (c, v) in row.iter_mut().enumerate() {
                *v = self.m[(r, c)];
            }
        }
        rows
    }

    #[inline]
    pub fn inverse(&self) -> Option<Self> {
        self.m.try_inverse().map(|m| Self { m })
    }

    /// `self` followed by `next`: `(self.then(next)).apply(x) == next.apply(self.apply(x))`.
    #[inline]
    pub fn then(&self, next: &Affine3) -> Self {
        Self { m: next.m * self.m }
    }

    #[inline]
    pub fn apply(&self, p: Point3) -> Point3 {
        let h = self.m * Vector4::new(p.x, p.y, p.z, 1.0);
        Point3::new(h.x, h.y, h.z)
    }

    /// Map every point; output order matches input order.
    pub fn apply_points(&self, points: &[Point3]) -> Vec<Point3> {
        points.iter().map(|&p| self.apply(p)).collect()
    }
}
