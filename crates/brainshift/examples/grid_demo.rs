//! Snap a jittered synthetic grid onto a flat sheet and print what moved.
//!
//! Usage:
//!   cargo run -p brainshift --example grid_demo -- [seed]

use brainshift::prelude::*;

fn main() -> Result<(), SnapError> {
    let seed = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(2025);
    let cfg = SynthCfg::default();
    let case = draw_case(&cfg, ReplayToken::new(seed));
    let input = CorrectionInput {
        electrodes: case.electrodes.clone(),
        surface: case.merged_surface(),
        surface_to_electrode: case.surface_to_electrode,
    };
    let out = BrainShift::new(PipelineCfg::default())?.run(&input)?;

    println!(
        "{} electrodes, fundamental distance {:.1}, {} links",
        out.adjacency.len(),
        out.adjacency.fundamental_distance,
        out.adjacency.link_count()
    );
    println!(
        "solver: {} after {} iterations (residual {:.2e})",
        out.snapped.report.status, out.snapped.report.iterations, out.snapped.surface_residual
    );
    for (i, (p, d)) in out.points().iter().zip(out.displacements()).enumerate() {
        let truth = case.on_surface[i];
        println!(
            "{i:>3}: ({:7.2}, {:7.2}, {:6.2})  moved {d:5.2}  off-truth {:5.2}",
            p.x,
            p.y,
            p.z,
            (p - truth).norm()
        );
    }
    Ok(())
}
