//! Sphere rasterisation of electrode positions into a label volume.
//!
//! One volume is owned by the rasteriser and mutated in place centre after
//! centre; overlapping spheres overwrite with the same value, nothing
//! accumulates. Centres are truncated toward zero before drawing.
//!
//! Boundaries are explicit: `BoundaryPolicy::Clip` skips (and counts) voxels
//! that fall outside the volume, `BoundaryPolicy::Reject` turns the first such
//! voxel into `SnapError::OutOfVolume`.

use crate::error::SnapError;
use crate::geom::Point3;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BoundaryPolicy {
    #[default]
    Clip,
    Reject,
}

#[derive(Clone, Copy, Debug)]
pub struct RasterCfg {
    /// Sphere radius in voxels.
    pub radius: i64,
    pub value: f64,
    pub boundary: BoundaryPolicy,
}

impl Default for RasterCfg {
    fn default() -> Self {
        Self {
            radius: 2,
            value: 1.0,
            boundary: BoundaryPolicy::Clip,
        }
    }
}

/// Dense 3D volume in C order (`x` slowest, `z` fastest).
#[derive(Clone, Debug, PartialEq)]
pub struct LabelVolume {
    shape: [usize; 3],
    data: Vec<f64>,
}

impl LabelVolume {
    pub fn zeros(shape: [usize; 3]) -> Self {
        Self {
            shape,
            data: vec![0.0; shape[0] * shape[1] * shape[2]],
        }
    }

    pub fn from_data(shape: [usize; 3], data: Vec<f64>) -> Result<Self, SnapError> {
        let expected = shape[0] * shape[1] * shape[2];
        if data.len() != expected {
            return Err(SnapError::shape("label volume data", expected, data.len()));
        }
        Ok(Self { shape, data })
    }

    #[inline]
    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    #[inline]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    #[inline]
    pub fn into_data(self) -> Vec<f64> {
        self.data
    }

    /// Flat index of an in-range voxel; `None` outside the volume.
    #[inline]
    pub fn index(&self, v: [i64; 3]) -> Option<usize> {
        let mut flat = 0usize;
        for axis in 0..3 {
            let c = usize::try_from(v[axis]).ok()?;
            if c >= self.shape[axis] {
                return None;
            }
            flat = flat * self.shape[axis] + c;
        }
        Some(flat)
    }

    pub fn get(&self, v: [i64; 3]) -> Option<f64> {
        self.index(v).map(|i| self.data[i])
    }

    /// Voxels holding a nonzero value, in C order.
    pub fn nonzero_voxels(&self) -> Vec<[usize; 3]> {
        let [_, ny, nz] = self.shape;
        self.data
            .iter()
            .enumerate()
            .filter(|(_, v)| **v != 0.0)
            .map(|(i, _)| [i / (ny * nz), (i / nz) % ny, i % nz])
            .collect()
    }

    pub fn count_nonzero(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0.0).count()
    }

    /// Draw one sphere; returns the number of voxels that fell outside.
    pub fn fill_sphere(
        &mut self,
        center: [i64; 3],
        radius: i64,
        value: f64,
        policy: BoundaryPolicy,
    ) -> Result<usize, SnapError> {
        let r = radius as f64;
        let mut clipped = 0;
        for dx in -radius..=radius {
            for dy in -radius..=radius {
                for dz in -radius..=radius {
                    let (fx, fy, fz) = (dx as f64, dy as f64, dz as f64);
                    if r - (fx * fx + fy * fy + fz * fz).sqrt() < 0.0 {
                        continue;
                    }
                    // Saturated coordinates are out of range for any volume.
                    let voxel = [
                        center[0].saturating_add(dx),
                        center[1].saturating_add(dy),
                        center[2].saturating_add(dz),
                    ];
                    match self.index(voxel) {
                        Some(i) => self.data[i] = value,
                        None if policy == BoundaryPolicy::Reject => {
                            return Err(SnapError::OutOfVolume { center, voxel })
                        }
                        None => clipped += 1,
                    }
                }
            }
        }
        Ok(clipped)
    }
}

/// Truncate toward zero, as integer voxel centres. Coordinates beyond the
/// `i64` range saturate.
pub fn truncate_center(p: &Point3) -> [i64; 3] {
    [p.x.trunc() as i64, p.y.trunc() as i64, p.z.trunc() as i64]
}

/// Rasterised volume plus how many sphere voxels were clipped at the edges.
#[derive(Clone, Debug)]
pub struct Rasterized {
    pub volume: LabelVolume,
    pub clipped: usize,
}

/// Draw a sphere around every centre into one fresh volume of `shape`.
pub fn rasterize_spheres(
    shape: [usize; 3],
    centers: &[Point3],
    cfg: &RasterCfg,
) -> Result<Rasterized, SnapError> {
    if cfg.radius < 0 {
        return Err(SnapError::config("sphere radius must be >= 0"));
    }
    crate::error::ensure_finite("sphere centres", centers)?;
    let mut volume = LabelVolume::zeros(shape);
    let mut clipped = 0;
    for p in centers {
        clipped += volume.fill_sphere(truncate_center(p), cfg.radius, cfg.value, cfg.boundary)?;
    }
    if clipped > 0 {
        tracing::warn!(clipped, "sphere voxels fell outside the label volume");
    }
    Ok(Rasterized { volume, clipped })
}
