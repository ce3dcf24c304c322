use crate::io::{read_json, write_json, BundleDocument};
use anyhow::{Context, Result};
use clap::{Args, ValueHint};
use std::path::PathBuf;
use tensorline_core::BundleStatistics;

#[derive(Args, Debug)]
pub struct BundleStatsArgs {
    /// Fiber bundle written by `track`
    #[arg(short = 'i', long = "input", value_hint = ValueHint::FilePath)]
    pub input: PathBuf,

    /// Optional destination for the statistics as JSON
    #[arg(short = 'o', long = "output", value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}

pub fn run(args: &BundleStatsArgs) -> Result<BundleStatistics> {
    let bundle: BundleDocument = read_json(&args.input, "fiber bundle")?;
    let stats = BundleStatistics::compute(&bundle.fibers)
        .with_context(|| format!("cannot summarize {}", args.input.display()))?;
    if let Some(path) = &args.output {
        write_json(&stats, path, "bundle statistics")?;
    }
    Ok(stats)
}

pub fn report(stats: &BundleStatistics) -> String {
    format!(
        "Mean FA: {}\nMean ADC: {}\nMean Length: {}",
        stats.mean_fa, stats.mean_adc, stats.mean_length
    )
}
