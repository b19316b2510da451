//! Adjacency estimation over an electrode array from mutual distances only.
//!
//! Model
//! - The array's characteristic spacing (the *fundamental distance*) is the
//!   left edge of the most populous bin of the pairwise-distance histogram,
//!   self-distances included.
//! - Electrode j constrains electrode i when j is among i's nearest
//!   neighbours and `d(i,j) < slack × fundamental`.
//! - Electrodes left without any link are tied to their nearest neighbour and
//!   to everything within `slack ×` that distance.
//!
//! Known sensitivity
//! - When bin 0 wins (N = 2, or a dense cluster dominated by self-distances)
//!   the fundamental distance is 0, every row starts empty, and the repair step
//!   alone decides the links. This is reported through `fundamental_distance`
//!   rather than special-cased.

use std::collections::BTreeMap;

use nalgebra::DMatrix;

use crate::error::SnapError;
use crate::geom::{pairwise_distances, Point3};

/// Adjacency heuristic parameters. Defaults match clinical grid/strip arrays.
#[derive(Clone, Copy, Debug)]
pub struct AdjacencyCfg {
    /// Candidate neighbours per electrode.
    pub neighbors: usize,
    /// Histogram bin width, in coordinate units.
    pub bin_width: f64,
    /// Multiplier applied to the fundamental distance (and, for repairs, to
    /// the nearest-neighbour distance).
    pub slack: f64,
}

impl Default for AdjacencyCfg {
    fn default() -> Self {
        Self {
            neighbors: 5,
            bin_width: 0.2,
            slack: 1.25,
        }
    }
}

impl AdjacencyCfg {
    pub fn validate(&self) -> Result<(), SnapError> {
        if !(self.bin_width.is_finite() && self.bin_width > 0.0) {
            return Err(SnapError::config("bin_width must be finite and > 0"));
        }
        if !(self.slack.is_finite() && self.slack > 0.0) {
            return Err(SnapError::config("slack must be finite and > 0"));
        }
        if self.neighbors == 0 {
            return Err(SnapError::config("neighbors must be >= 1"));
        }
        Ok(())
    }
}

/// Result of the estimator.
///
/// Invariants (for `n >= 2`):
/// - `alpha` is `n×n` with entries in {0, 1} and a zero diagonal;
/// - every row of `alpha` has at least one nonzero entry.
#[derive(Clone, Debug)]
pub struct Adjacency {
    pub alpha: DMatrix<f64>,
    /// Pairwise distances of the input points (the reference geometry `d0`).
    pub distances: DMatrix<f64>,
    pub fundamental_distance: f64,
    pub threshold: f64,
    /// Rows that needed the isolated-electrode repair.
    pub repaired: Vec<usize>,
    /// Fewer than two electrodes: no neighbour structure exists.
    pub degenerate: bool,
}

impl Adjacency {
    #[inline]
    pub fn len(&self) -> usize {
        self.alpha.nrows()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.alpha.nrows() == 0
    }

    /// Indices j with `alpha[i][j] != 0`.
    pub fn neighbors_of(&self, i: usize) -> Vec<usize> {
        (0..self.alpha.ncols())
            .filter(|&j| self.alpha[(i, j)] != 0.0)
            .collect()
    }

    /// Number of nonzero entries.
    pub fn link_count(&self) -> usize {
        self.alpha.iter().filter(|&&a| a != 0.0).count()
    }
}

/// Histogram bin of `d` under floor-division semantics built on the floating
/// remainder, so that a distance sitting on a bin edge up to representation
/// error (e.g. `5.0` with width `0.2`) lands in the lower bin.
pub fn bin_index(d: f64, width: f64) -> usize {
    let rem = d % width;
    let div = (d - rem) / width;
    let mut floor = div.floor();
    if div - floor > 0.5 {
        floor += 1.0;
    }
    floor.max(0.0) as usize
}

/// Left edge of the most populous bin over all `n²` distances (first bin on ties).
pub fn fundamental_distance(distances: &DMatrix<f64>, bin_width: f64) -> f64 {
    // Sparse: a far outlier over a fine width would otherwise size a dense histogram.
    let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
    for &d in distances.iter() {
        *counts.entry(bin_index(d, bin_width)).or_default() += 1;
    }
    let mut best = (0usize, 0usize);
    for (&b, &c) in &counts {
        if c > best.1 {
            best = (b, c);
        }
    }
    best.0 as f64 * bin_width
}

/// The `k` nearest other points of row `i`, closest first (stable on ties).
fn nearest_others(distances: &DMatrix<f64>, i: usize, k: usize) -> Vec<usize> {
    let mut others: Vec<usize> = (0..distances.ncols()).filter(|&j| j != i).collect();
    others.sort_by(|&a, &b| distances[(i, a)].total_cmp(&distances[(i, b)]));
    others.truncate(k);
    others
}

/// Estimate which electrodes are physically adjacent.
pub fn estimate(points: &[Point3], cfg: &AdjacencyCfg) -> Result<Adjacency, SnapError> {
    cfg.validate()?;
    crate::error::ensure_finite("electrodes", points)?;
    let n = points.len();
    let distances = pairwise_distances(points);
    let mut alpha = DMatrix::zeros(n, n);
    if n < 2 {
        tracing::debug!(n, "adjacency degenerate: fewer than two electrodes");
        return Ok(Adjacency {
            alpha,
            distances,
            fundamental_distance: 0.0,
            threshold: 0.0,
            repaired: Vec::new(),
            degenerate: true,
        });
    }

    let fundamental = fundamental_distance(&distances, cfg.bin_width);
    let threshold = cfg.slack * fundamental;
    for i in 0..n {
        for j in nearest_others(&distances, i, cfg.neighbors) {
            if distances[(i, j)] < threshold {
                alpha[(i, j)] = 1.0;
            }
        }
    }

    let mut repaired = Vec::new();
    for i in 0..n {
        if alpha.row(i).iter().any(|&a| a != 0.0) {
            continue;
        }
        let nearest = nearest_others(&distances, i, 1)[0];
        alpha[(i, nearest)] = 1.0;
        let reach = cfg.slack * distances[(i, nearest)];
        for k in (0..n).filter(|&k| k != i) {
            if distances[(i, k)] < reach {
                alpha[(i, k)] = 1.0;
            }
        }
        repaired.push(i);
    }

    tracing::debug!(
        n,
        fundamental,
        threshold,
        repaired = repaired.len(),
        "adjacency estimated"
    );
    Ok(Adjacency {
        alpha,
        distances,
        fundamental_distance: fundamental,
        threshold,
        repaired,
        degenerate: false,
    })
}
