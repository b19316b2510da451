//! Error type shared by the snapping pipeline.
//!
//! Solver non-convergence is not an error; it is reported through
//! `snap::SolveStatus`.

use std::fmt;

/// Errors surfaced by validation, mesh assembly, and rasterisation.
#[derive(Clone, Debug, PartialEq)]
pub enum SnapError {
    EmptyElectrodes,
    EmptyMesh,
    ShapeMismatch {
        what: &'static str,
        expected: String,
        found: String,
    },
    NonFinite {
        what: &'static str,
        index: usize,
    },
    InvalidTriangle {
        triangle: usize,
        vertex: usize,
        vertex_count: usize,
    },
    InvalidConfig {
        reason: String,
    },
    OutOfVolume {
        center: [i64; 3],
        voxel: [i64; 3],
    },
}

impl SnapError {
    pub(crate) fn shape(what: &'static str, expected: impl fmt::Display, found: impl fmt::Display) -> Self {
        Self::ShapeMismatch {
            what,
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for SnapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyElectrodes => write!(f, "electrode set is empty"),
            Self::EmptyMesh => write!(f, "surface mesh has no vertices"),
            Self::ShapeMismatch {
                what,
                expected,
                found,
            } => write!(f, "{what}: expected {expected}, found {found}"),
            Self::NonFinite { what, index } => {
                write!(f, "{what}: non-finite coordinate at index {index}")
            }
            Self::InvalidTriangle {
                triangle,
                vertex,
                vertex_count,
            } => write!(
                f,
                "triangle {triangle} references vertex {vertex} but mesh has {vertex_count} vertices"
            ),
            Self::InvalidConfig { reason } => write!(f, "invalid configuration: {reason}"),
            Self::OutOfVolume { center, voxel } => write!(
                f,
                "sphere around {center:?} reaches voxel {voxel:?} outside the volume"
            ),
        }
    }
}

impl std::error::Error for SnapError {}

/// Fail with `NonFinite` on the first NaN/inf coordinate.
pub(crate) fn ensure_finite(
    what: &'static str,
    points: &[nalgebra::Vector3<f64>],
) -> Result<(), SnapError> {
    match points.iter().position(|p| !p.iter().all(|c| c.is_finite())) {
        Some(index) => Err(SnapError::NonFinite { what, index }),
        None => Ok(()),
    }
}
