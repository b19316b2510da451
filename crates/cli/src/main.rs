use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::fmt::SubscriberBuilder;

mod case;
mod commands;
mod provenance;

use commands::{DemoArgs, SnapArgs};

#[derive(Parser)]
#[command(name = "brainshift")]
#[command(about = "Snap intracranial electrodes back onto the cortical surface")]
struct Cmd {
    /// Log solver progress (debug level)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Correct one case and write snapped electrodes, report and sphere labels
    Snap(SnapArgs),
    /// Write a synthetic case file (grid above a flat sheet)
    Demo(DemoArgs),
    /// Print a small provenance JSON block
    Report,
}

fn main() -> Result<()> {
    let cmd = Cmd::parse();
    let level = if cmd.verbose { Level::DEBUG } else { Level::INFO };
    SubscriberBuilder::default()
        .with_target(false)
        .with_max_level(level)
        .init();
    match cmd.action {
        Action::Snap(args) => commands::snap(&args).map(|_| ()),
        Action::Demo(args) => commands::demo(&args).map(|_| ()),
        Action::Report => commands::report(),
    }
}
