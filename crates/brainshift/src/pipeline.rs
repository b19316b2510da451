//! End-to-end brain-shift correction for one electrode array.
//!
//! Stages, in order:
//! 1. push the surface mesh into electrode space (`Affine3`);
//! 2. estimate the array's adjacency from the raw electrode coordinates;
//! 3. project every electrode onto its nearest surface vertex;
//! 4. solve the snapping problem;
//! 5. optionally rasterise the result (`Corrected::rasterize`).
//!
//! Every intermediate product is returned; nothing is kept between runs.

use crate::adjacency::{self, Adjacency, AdjacencyCfg};
use crate::error::SnapError;
use crate::geom::{Affine3, Mesh, Point3};
use crate::raster::{rasterize_spheres, RasterCfg, Rasterized};
use crate::snap::{snap_electrodes, SnapCfg, Snapped};
use crate::surface::{Projection, SurfaceProjector};

/// Parsed inputs for one invocation.
#[derive(Clone, Debug)]
pub struct CorrectionInput {
    /// Measured electrode coordinates (electrode space).
    pub electrodes: Vec<Point3>,
    /// Cortical surface in surface space, usually both hemispheres merged.
    pub surface: Mesh,
    /// Surface space → electrode space.
    pub surface_to_electrode: Affine3,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PipelineCfg {
    pub adjacency: AdjacencyCfg,
    pub snap: SnapCfg,
    pub raster: RasterCfg,
}

/// Explicit computation context: configuration only, no cached state.
#[derive(Clone, Debug)]
pub struct BrainShift {
    cfg: PipelineCfg,
}

/// Results of one run.
#[derive(Clone, Debug)]
pub struct Corrected {
    /// Mesh vertices mapped into electrode space.
    pub surface: Mesh,
    pub adjacency: Adjacency,
    pub projection: Projection,
    pub snapped: Snapped,
    /// Measured coordinates, kept for displacement reporting.
    pub original: Vec<Point3>,
    raster: RasterCfg,
}

impl BrainShift {
    pub fn new(cfg: PipelineCfg) -> Result<Self, SnapError> {
        cfg.adjacency.validate()?;
        cfg.snap.validate()?;
        if cfg.raster.radius < 0 {
            return Err(SnapError::config("sphere radius must be >= 0"));
        }
        Ok(Self { cfg })
    }

    #[inline]
    pub fn cfg(&self) -> &PipelineCfg {
        &self.cfg
    }

    pub fn run(&self, input: &CorrectionInput) -> Result<Corrected, SnapError> {
        if input.electrodes.is_empty() {
            return Err(SnapError::EmptyElectrodes);
        }
        if input.surface.is_empty() {
            return Err(SnapError::EmptyMesh);
        }
        let surface = input.surface.transformed(&input.surface_to_electrode);
        let adjacency = adjacency::estimate(&input.electrodes, &self.cfg.adjacency)?;
        let projection = SurfaceProjector::from_mesh(&surface)?.project(&input.electrodes)?;
        let snapped = snap_electrodes(
            &input.electrodes,
            &adjacency.alpha,
            &projection.targets,
            &self.cfg.snap,
        )?;
        tracing::info!(
            electrodes = input.electrodes.len(),
            vertices = surface.vertex_count(),
            links = adjacency.link_count(),
            fundamental = adjacency.fundamental_distance,
            status = %snapped.report.status,
            iterations = snapped.report.iterations,
            "brain shift correction finished"
        );
        Ok(Corrected {
            surface,
            adjacency,
            projection,
            snapped,
            original: input.electrodes.clone(),
            raster: self.cfg.raster,
        })
    }
}

impl Corrected {
    #[inline]
    pub fn points(&self) -> &[Point3] {
        &self.snapped.points
    }

    /// Per-electrode distance between measured and adjusted positions.
    pub fn displacements(&self) -> Vec<f64> {
        self.original
            .iter()
            .zip(&self.snapped.points)
            .map(|(a, b)| (b - a).norm())
            .collect()
    }

    /// Label the adjusted positions in a volume of `shape`.
    pub fn rasterize(&self, shape: [usize; 3]) -> Result<Rasterized, SnapError> {
        rasterize_spheres(shape, &self.snapped.points, &self.raster)
    }
}
