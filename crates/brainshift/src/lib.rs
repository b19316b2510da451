//! Brain-shift correction for intracranial electrode arrays.
//!
//! Electrodes localised on a post-implant scan sit slightly off the cortical
//! surface reconstructed from the pre-implant scan. This crate moves them back
//! onto the surface while keeping the array's geometry intact, then labels the
//! adjusted positions in a voxel volume.
//!
//! Layout
//! - `geom`: points, meshes, affine maps.
//! - `adjacency`: which electrodes hold each other's spacing.
//! - `surface`: nearest-vertex projection (k-d tree).
//! - `snap`: the constrained least-squares problem and its SQP solver.
//! - `raster`: sphere labels in a dense volume.
//! - `pipeline`: the stages chained behind one `BrainShift` context.
//! - `synth`: seeded fixtures for tests, benches and demos.
//!
//! API Policy
//! - Internal to this repository; breaking changes are fine when they make
//!   the pipeline clearer.

pub mod adjacency;
pub mod error;
pub mod geom;
pub mod pipeline;
pub mod raster;
pub mod snap;
pub mod surface;
pub mod synth;

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use error::SnapError;
pub use geom::{Affine3, Mesh, Point3};
pub use pipeline::{BrainShift, CorrectionInput, Corrected, PipelineCfg};

/// Common exports for callers driving the whole pipeline.
pub mod prelude {
    pub use crate::adjacency::{estimate as estimate_adjacency, Adjacency, AdjacencyCfg};
    pub use crate::error::SnapError;
    pub use crate::geom::{Affine3, Mesh, Point3, Triangle};
    pub use crate::pipeline::{BrainShift, CorrectionInput, Corrected, PipelineCfg};
    pub use crate::raster::{rasterize_spheres, BoundaryPolicy, LabelVolume, RasterCfg};
    pub use crate::snap::{snap_electrodes, ConstraintMode, SnapCfg, SolveStatus, SolverCfg};
    pub use crate::surface::{Projection, SurfaceProjector};
    pub use crate::synth::{draw_case, ArrayLayout, ReplayToken, SynthCfg};
}
