use super::*;
use nalgebra::vector;
use proptest::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};

fn unit_cube() -> Vec<Point3> {
    let mut v = Vec::new();
    for x in [0.0, 1.0] {
        for y in [0.0, 1.0] {
            for z in [0.0, 1.0] {
                v.push(vector![x, y, z]);
            }
        }
    }
    v
}

#[test]
fn cube_corner_queries_match_brute_force() {
    let cube = unit_cube();
    let proj = SurfaceProjector::new(&cube).unwrap();
    let queries = [
        vector![0.1, 0.2, 0.05],
        vector![0.9, 0.8, 1.3],
        vector![-2.0, 5.0, 0.4],
        vector![0.6, 0.4, 0.7],
    ];
    for q in queries {
        let (idx, v) = proj.nearest_vertex(q);
        assert_eq!(Some(idx), nearest_vertex_brute(&cube, q), "query {q:?}");
        assert_eq!(v, cube[idx]);
    }
    assert_eq!(proj.nearest_vertex(vector![0.1, 0.2, 0.05]).1, vector![0.0, 0.0, 0.0]);
    assert_eq!(proj.nearest_vertex(vector![0.9, 0.8, 1.3]).1, vector![1.0, 1.0, 1.0]);
}

#[test]
fn ties_resolve_to_lowest_index() {
    // Cube centre is equidistant to all eight corners.
    let cube = unit_cube();
    let proj = SurfaceProjector::new(&cube).unwrap();
    assert_eq!(proj.nearest_vertex(vector![0.5, 0.5, 0.5]).0, 0);
    // Duplicated vertex: the first copy wins.
    let mut dup = cube.clone();
    dup.insert(0, vector![3.0, 3.0, 3.0]);
    dup.push(vector![3.0, 3.0, 3.0]);
    let proj = SurfaceProjector::new(&dup).unwrap();
    assert_eq!(proj.nearest_vertex(vector![3.0, 3.0, 3.1]).0, 0);
}

#[test]
fn large_cloud_matches_brute_force() {
    let mut rng = StdRng::seed_from_u64(7);
    let cloud: Vec<Point3> = (0..5000)
        .map(|_| vector![rng.gen_range(-50.0..50.0), rng.gen_range(-50.0..50.0), rng.gen_range(-50.0..50.0)])
        .collect();
    let tree = KdTree::build(&cloud);
    assert_eq!(tree.len(), cloud.len());
    for _ in 0..200 {
        let q = vector![rng.gen_range(-60.0..60.0), rng.gen_range(-60.0..60.0), rng.gen_range(-60.0..60.0)];
        let hit = tree.nearest(q).unwrap();
        assert_eq!(Some(hit.index), nearest_vertex_brute(&cloud, q));
        assert!((hit.dist2 - (cloud[hit.index] - q).norm_squared()).abs() < 1e-12);
    }
}

#[test]
fn project_reports_targets_and_distances() {
    let verts: Vec<Point3> = (0..11)
        .flat_map(|i| (0..11).map(move |j| vector![i as f64, j as f64, 0.0]))
        .collect();
    let proj = SurfaceProjector::new(&verts).unwrap();
    let electrodes = vec![vector![2.0, 3.0, 3.0], vector![7.2, 4.9, -1.0]];
    let out = proj.project(&electrodes).unwrap();
    assert_eq!(out.targets, vec![vector![2.0, 3.0, 0.0], vector![7.0, 5.0, 0.0]]);
    assert_eq!(out.vertex_indices, vec![2 * 11 + 3, 7 * 11 + 5]);
    assert!((out.distances[0] - 3.0).abs() < 1e-12);
    assert!(out.max_distance() >= out.mean_distance());
}

#[test]
fn empty_mesh_is_an_error() {
    assert!(matches!(SurfaceProjector::new(&[]), Err(SnapError::EmptyMesh)));
    assert!(KdTree::build(&[]).nearest(vector![0.0, 0.0, 0.0]).is_none());
    assert_eq!(nearest_vertex_brute(&[], vector![0.0, 0.0, 0.0]), None);
}

#[test]
fn non_finite_electrode_is_rejected() {
    let proj = SurfaceProjector::new(&unit_cube()).unwrap();
    let err = proj
        .project(&[vector![0.0, 0.0, 0.0], vector![f64::INFINITY, 0.0, 0.0]])
        .unwrap_err();
    assert_eq!(
        err,
        SnapError::NonFinite {
            what: "electrodes",
            index: 1
        }
    );
}

proptest! {
    #[test]
    fn tree_agrees_with_linear_scan(
        cloud in prop::collection::vec(prop::array::uniform3(-10.0f64..10.0), 1..200),
        q in prop::array::uniform3(-12.0f64..12.0),
    ) {
        let pts: Vec<Point3> = cloud.iter().map(|c| vector![c[0], c[1], c[2]]).collect();
        let q = vector![q[0], q[1], q[2]];
        let hit = KdTree::build(&pts).nearest(q).unwrap();
        prop_assert_eq!(Some(hit.index), nearest_vertex_brute(&pts, q));
    }
}
