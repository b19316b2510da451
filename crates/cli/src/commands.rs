use anyhow::{bail, Context, Result};
use brainshift::prelude::*;
use clap::Args;
use serde::Serialize;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

use crate::case::{read_points_csv, write_points_csv, CaseFile};
use crate::provenance::{write_sidecar, Record};

pub const SNAPPED_CSV: &str = "electrodes_snapped.csv";
pub const REPORT_JSON: &str = "snap_report.json";
pub const SPHERES_JSON: &str = "electrode_spheres.json";

#[derive(Args, Debug, Clone)]
pub struct SnapArgs {
    /// Case file (electrodes, hemispheres, affine, optional volume shape)
    #[arg(long)]
    pub case: PathBuf,
    /// Output directory
    #[arg(long)]
    pub out: PathBuf,
    /// Electrode table overriding the case's electrodes (3 columns)
    #[arg(long)]
    pub electrodes: Option<PathBuf>,
    /// Electrode table has no header row
    #[arg(long)]
    pub no_header: bool,
    #[arg(long, default_value_t = ',')]
    pub delimiter: char,
    /// Use a penalty of this weight instead of the hard surface constraint
    #[arg(long)]
    pub penalty: Option<f64>,
    #[arg(long, default_value_t = 100)]
    pub max_iter: usize,
    #[arg(long, default_value_t = 1e-6)]
    pub ftol: f64,
    #[arg(long, default_value_t = 5)]
    pub neighbors: usize,
    #[arg(long, default_value_t = 0.2)]
    pub bin_width: f64,
    #[arg(long, default_value_t = 1.25)]
    pub slack: f64,
    /// Sphere radius in voxels
    #[arg(long, default_value_t = 2)]
    pub radius: i64,
    /// Label value written into sphere voxels
    #[arg(long, default_value_t = 1.0)]
    pub fill: f64,
    /// Fail instead of clipping spheres at the volume boundary
    #[arg(long)]
    pub reject_out_of_range: bool,
}

impl SnapArgs {
    pub fn pipeline_cfg(&self) -> PipelineCfg {
        PipelineCfg {
            adjacency: AdjacencyCfg {
                neighbors: self.neighbors,
                bin_width: self.bin_width,
                slack: self.slack,
            },
            snap: SnapCfg {
                constraint: match self.penalty {
                    Some(weight) => ConstraintMode::Penalty { weight },
                    None => ConstraintMode::Aggregate,
                },
                solver: SolverCfg {
                    max_iter: self.max_iter,
                    ftol: self.ftol,
                    ..SolverCfg::default()
                },
            },
            raster: RasterCfg {
                radius: self.radius,
                value: self.fill,
                boundary: if self.reject_out_of_range {
                    BoundaryPolicy::Reject
                } else {
                    BoundaryPolicy::Clip
                },
            },
        }
    }

    fn params(&self) -> serde_json::Value {
        json!({
            "penalty": self.penalty,
            "max_iter": self.max_iter,
            "ftol": self.ftol,
            "neighbors": self.neighbors,
            "bin_width": self.bin_width,
            "slack": self.slack,
            "radius": self.radius,
            "fill": self.fill,
            "reject_out_of_range": self.reject_out_of_range,
        })
    }
}

#[derive(Args, Debug, Clone)]
pub struct DemoArgs {
    /// Case file to write
    #[arg(long)]
    pub out: PathBuf,
    #[arg(long, default_value_t = 4)]
    pub rows: usize,
    #[arg(long, default_value_t = 8)]
    pub cols: usize,
    #[arg(long, default_value_t = 10.0)]
    pub spacing: f64,
    /// Height of the array above the surface
    #[arg(long, default_value_t = 3.0)]
    pub lift: f64,
    #[arg(long, default_value_t = 0.3)]
    pub jitter: f64,
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

/// Machine-readable account of one `snap` run.
#[derive(Debug, Serialize)]
pub struct SnapReport {
    pub electrodes: usize,
    pub vertices: usize,
    pub status: String,
    pub converged: bool,
    pub iterations: usize,
    pub objective: f64,
    pub constraint: f64,
    pub multiplier: f64,
    pub objective_evals: usize,
    pub gradient_evals: usize,
    pub surface_residual: f64,
    pub distortion: f64,
    pub fundamental_distance: f64,
    pub threshold: f64,
    pub links: usize,
    pub repaired: Vec<usize>,
    pub degenerate_adjacency: bool,
    pub target_vertices: Vec<usize>,
    pub mean_target_distance: f64,
    pub max_target_distance: f64,
    pub displacements: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clipped_voxels: Option<usize>,
}

#[derive(Debug, Serialize)]
struct SpheresFile {
    shape: [usize; 3],
    radius: i64,
    value: f64,
    clipped: usize,
    voxels: Vec<[usize; 3]>,
}

pub fn snap(args: &SnapArgs) -> Result<SnapReport> {
    let case = CaseFile::load(&args.case)?;
    let electrodes = match &args.electrodes {
        Some(path) => {
            if !args.delimiter.is_ascii() {
                bail!("delimiter must be a single ASCII character");
            }
            read_points_csv(path, !args.no_header, args.delimiter as u8)?
        }
        None => case
            .electrodes()
            .context("case has no electrodes and --electrodes was not given")?,
    };
    let input = CorrectionInput {
        electrodes,
        surface: case.surface()?,
        surface_to_electrode: case.surface_to_electrode(),
    };
    let ctx = BrainShift::new(args.pipeline_cfg())?;
    let out = ctx.run(&input)?;

    fs::create_dir_all(&args.out).with_context(|| format!("creating {}", args.out.display()))?;
    let mut record = Record::new("snap", args.params()).with_input(&args.case);
    if let Some(path) = &args.electrodes {
        record = record.with_input(path);
    }

    let csv_path = args.out.join(SNAPPED_CSV);
    write_points_csv(&csv_path, out.points())?;
    write_sidecar(&csv_path, &record)?;

    let clipped = match case.volume_shape {
        Some(shape) => {
            let r = out.rasterize(shape)?;
            let spheres = SpheresFile {
                shape,
                radius: args.radius,
                value: args.fill,
                clipped: r.clipped,
                voxels: r.volume.nonzero_voxels(),
            };
            let path = args.out.join(SPHERES_JSON);
            write_json(&path, &spheres)?;
            write_sidecar(&path, &record)?;
            Some(r.clipped)
        }
        None => None,
    };

    let report = build_report(&out, input.surface.vertex_count(), clipped);
    let path = args.out.join(REPORT_JSON);
    write_json(&path, &report)?;
    write_sidecar(&path, &record)?;
    tracing::info!(
        out = %args.out.display(),
        status = %report.status,
        iterations = report.iterations,
        "snap"
    );
    Ok(report)
}

fn build_report(out: &Corrected, vertices: usize, clipped_voxels: Option<usize>) -> SnapReport {
    let r = &out.snapped.report;
    SnapReport {
        electrodes: out.points().len(),
        vertices,
        status: r.status.to_string(),
        converged: r.status.is_converged(),
        iterations: r.iterations,
        objective: r.objective,
        constraint: r.constraint,
        multiplier: r.multiplier,
        objective_evals: r.objective_evals,
        gradient_evals: r.gradient_evals,
        surface_residual: out.snapped.surface_residual,
        distortion: out.snapped.distortion,
        fundamental_distance: out.adjacency.fundamental_distance,
        threshold: out.adjacency.threshold,
        links: out.adjacency.link_count(),
        repaired: out.adjacency.repaired.clone(),
        degenerate_adjacency: out.adjacency.degenerate,
        target_vertices: out.projection.vertex_indices.clone(),
        mean_target_distance: out.projection.mean_distance(),
        max_target_distance: out.projection.max_distance(),
        displacements: out.displacements(),
        clipped_voxels,
    }
}

pub fn demo(args: &DemoArgs) -> Result<PathBuf> {
    let cfg = SynthCfg {
        layout: ArrayLayout {
            rows: args.rows,
            cols: args.cols,
            spacing: args.spacing,
        },
        lift: args.lift,
        jitter: args.jitter,
        ..SynthCfg::default()
    };
    if cfg.layout.is_empty() {
        bail!("array must have at least one row and one column");
    }
    let synth = draw_case(&cfg, ReplayToken::new(args.seed));
    let (wx, wy) = cfg.layout.extent();
    // Volume spans the sheet; electrode coordinates double as voxel indices.
    let shape = [
        (wx + cfg.margin).ceil() as usize + 1,
        (wy + cfg.margin).ceil() as usize + 1,
        (args.lift + args.jitter).ceil().max(0.0) as usize + 4,
    ];
    let case = CaseFile::from_synthetic(&synth, Some(shape));
    case.save(&args.out)?;
    let record = Record::new(
        "demo",
        json!({
            "rows": args.rows,
            "cols": args.cols,
            "spacing": args.spacing,
            "lift": args.lift,
            "jitter": args.jitter,
            "seed": args.seed,
        }),
    );
    write_sidecar(&args.out, &record)?;
    tracing::info!(out = %args.out.display(), electrodes = synth.electrodes.len(), "demo");
    Ok(args.out.clone())
}

pub fn report() -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&crate::provenance::header())?);
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    fs::write(path, serde_json::to_vec_pretty(value)?)
        .with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests;
