//! Static 3D k-d tree over an unstructured point cloud (implicit layout).
//!
//! Build: O(V log V) via repeated `select_nth_unstable_by` on a flat array;
//! the median of each range is the split node, left/right halves are children.
//! Query: depth-first descent with plane-distance pruning.
//!
//! Ties on distance resolve to the smallest original index, so the result is
//! identical to a first-minimum linear scan.

use crate::geom::Point3;

/// Ranges at or below this size are scanned linearly.
const LEAF_SIZE: usize = 8;

#[derive(Clone, Debug)]
pub struct KdTree {
    /// `(point, original index)`, permuted into implicit tree order.
    nodes: Vec<(Point3, usize)>,
}

/// Nearest-point query result.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Nearest {
    pub index: usize,
    pub dist2: f64,
}

impl Nearest {
    #[inline]
    fn better_than(&self, other: &Nearest) -> bool {
        self.dist2 < other.dist2 || (self.dist2 == other.dist2 && self.index < other.index)
    }
}

impl KdTree {
    pub fn build(points: &[Point3]) -> Self {
        let mut nodes: Vec<(Point3, usize)> =
            points.iter().copied().enumerate().map(|(i, p)| (p, i)).collect();
        build_range(&mut nodes, 0);
        Self { nodes }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Closest stored point to `q`; `None` on an empty tree.
    pub fn nearest(&self, q: Point3) -> Option<Nearest> {
        let mut best = Nearest {
            index: usize::MAX,
            dist2: f64::INFINITY,
        };
        search_range(&self.nodes, 0, q, &mut best);
        (best.index != usize::MAX).then_some(best)
    }
}

fn build_range(nodes: &mut [(Point3, usize)], depth: usize) {
    if nodes.len() <= LEAF_SIZE {
        return;
    }
    let axis = depth % 3;
    let mid = nodes.len() / 2;
    nodes.select_nth_unstable_by(mid, |a, b| a.0[axis].total_cmp(&b.0[axis]));
    let (left, rest) = nodes.split_at_mut(mid);
    build_range(left, depth + 1);
    build_range(&mut rest[1..], depth + 1);
}

fn search_range(nodes: &[(Point3, usize)], depth: usize, q: Point3, best: &mut Nearest) {
    if nodes.len() <= LEAF_SIZE {
        for &(p, index) in nodes {
            let cand = Nearest {
                index,
                dist2: (p - q).norm_squared(),
            };
            if cand.better_than(best) {
                *best = cand;
            }
        }
        return;
    }
    let axis = depth % 3;
    let mid = nodes.len() / 2;
    let (p, index) = nodes[mid];
    let cand = Nearest {
        index,
        dist2: (p - q).norm_squared(),
    };
    if cand.better_than(best) {
        *best = cand;
    }
    let left = &nodes[..mid];
    let right = &nodes[mid + 1..];
    let diff = q[axis] - p[axis];
    let (near, far) = if diff < 0.0 { (left, right) } else { (right, left) };
    search_range(near, depth + 1, q, best);
    // `<=` keeps equal-distance candidates on the far side reachable for the
    // index tie-break.
    if diff * diff <= best.dist2 {
        search_range(far, depth + 1, q, best);
    }
}
