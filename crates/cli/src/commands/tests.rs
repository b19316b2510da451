use super::*;
use serde_json::Value;
use tempfile::tempdir;

fn demo_args(out: PathBuf) -> DemoArgs {
    DemoArgs {
        out,
        rows: 2,
        cols: 3,
        spacing: 10.0,
        lift: 3.0,
        jitter: 0.0,
        seed: 4,
    }
}

fn snap_args(case: PathBuf, out: PathBuf) -> SnapArgs {
    SnapArgs {
        case,
        out,
        electrodes: None,
        no_header: false,
        delimiter: ',',
        penalty: None,
        max_iter: 100,
        ftol: 1e-6,
        neighbors: 5,
        bin_width: 0.2,
        slack: 1.25,
        radius: 2,
        fill: 1.0,
        reject_out_of_range: false,
    }
}

#[test]
fn demo_then_snap_writes_all_artefacts() {
    let dir = tempdir().unwrap();
    let case = demo(&demo_args(dir.path().join("case.json"))).unwrap();
    assert!(dir.path().join("case.provenance.json").exists());

    let out = dir.path().join("run");
    let report = snap(&snap_args(case, out.clone())).unwrap();
    assert_eq!(report.electrodes, 6);
    assert!(report.converged, "{report:?}");
    assert!(!report.degenerate_adjacency);
    assert!((report.fundamental_distance - 10.0).abs() <= 0.2 + 1e-9);
    assert!(report.clipped_voxels.is_some());

    for name in [SNAPPED_CSV, REPORT_JSON, SPHERES_JSON] {
        assert!(out.join(name).exists(), "{name} missing");
    }
    for stem in ["electrodes_snapped", "snap_report", "electrode_spheres"] {
        assert!(out.join(format!("{stem}.provenance.json")).exists(), "{stem} sidecar missing");
    }

    let snapped = read_points_csv(&out.join(SNAPPED_CSV), true, b',').unwrap();
    assert_eq!(snapped.len(), 6);
    assert!(snapped.iter().all(|p| p.z < 3.0));

    let spheres: Value = serde_json::from_slice(&fs::read(out.join(SPHERES_JSON)).unwrap()).unwrap();
    assert_eq!(spheres["radius"], 2);
    assert!(!spheres["voxels"].as_array().unwrap().is_empty());
}

#[test]
fn electrode_table_overrides_case() {
    let dir = tempdir().unwrap();
    let case = demo(&demo_args(dir.path().join("case.json"))).unwrap();
    let table = dir.path().join("e.txt");
    fs::write(&table, "0 0 4\n10 0 4\n").unwrap();
    let mut args = snap_args(case, dir.path().join("run"));
    args.electrodes = Some(table);
    args.no_header = true;
    args.delimiter = ' ';
    let report = snap(&args).unwrap();
    assert_eq!(report.electrodes, 2);
    // Two electrodes: bin 0 wins and both rows come from the repair step.
    assert_eq!(report.fundamental_distance, 0.0);
    assert_eq!(report.repaired, vec![0, 1]);
}

#[test]
fn penalty_flag_selects_penalty_mode() {
    let mut args = snap_args(PathBuf::from("case.json"), PathBuf::from("out"));
    assert_eq!(args.pipeline_cfg().snap.constraint, ConstraintMode::Aggregate);
    args.penalty = Some(2.5);
    args.reject_out_of_range = true;
    let cfg = args.pipeline_cfg();
    assert_eq!(cfg.snap.constraint, ConstraintMode::Penalty { weight: 2.5 });
    assert_eq!(cfg.raster.boundary, BoundaryPolicy::Reject);
}

#[test]
fn invalid_penalty_is_an_error() {
    let dir = tempdir().unwrap();
    let case = demo(&demo_args(dir.path().join("case.json"))).unwrap();
    let mut args = snap_args(case, dir.path().join("run"));
    args.penalty = Some(0.0);
    let err = snap(&args).unwrap_err();
    assert!(err.to_string().contains("penalty weight"), "{err}");
}

#[test]
fn missing_case_reports_path() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nope.json");
    let err = snap(&snap_args(missing, dir.path().join("run"))).unwrap_err();
    assert!(format!("{err:#}").contains("nope.json"), "{err:#}");
}
