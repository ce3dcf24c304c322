mod io;
mod stats;
mod track;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Tensorline fiber tracking in diffusion tensor fields"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Track fibers from every voxel of a seed mask
    Track(track::TrackArgs),

    /// Print the mean FA, ADC and length of a fiber bundle
    BundleStats(stats::BundleStatsArgs),
}

fn main() {
    env_logger::init();
    if let Err(err) = try_main() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    match &cli.command {
        Command::Track(args) => {
            let summary = track::run(args)?;
            println!(
                "Tracked {} fibers from {} seed voxels",
                summary.fibers, summary.seed_voxels
            );
        }
        Command::BundleStats(args) => {
            let stats = stats::run(args)?;
            println!("{}", stats::report(&stats));
        }
    }
    Ok(())
}
