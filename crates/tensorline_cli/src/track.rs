use crate::io::{read_json, write_json, BundleDocument};
use anyhow::{Context, Result};
use clap::{Args, ValueHint};
use log::info;
use std::path::PathBuf;
use tensorline_core::reorientation::AffineTransform;
use tensorline_core::{FiberTracker, SeedMask, TensorField, TrackingSettings};

#[derive(Args, Debug)]
pub struct TrackArgs {
    /// Diffusion tensor field (JSON volume of 6-component tensors)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub tensors: PathBuf,

    /// Seed mask (JSON volume of bytes, non-zero voxels seed fibers)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub seeds: PathBuf,

    /// Destination for the fiber bundle
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub output: PathBuf,

    /// Tracking settings; missing keys take their defaults
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub settings: Option<PathBuf>,

    /// Also write the per-voxel count of emitted fibers
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub fibers_seeded: Option<PathBuf>,

    /// Affine transform applied to the output fibers
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub affine: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: SettingsOverrides,
}

/// Command-line values that take precedence over the settings file.
#[derive(Args, Debug, Default)]
pub struct SettingsOverrides {
    #[arg(long)]
    pub smoothness: Option<f64>,

    #[arg(long)]
    pub min_length: Option<f64>,

    #[arg(long)]
    pub max_length: Option<f64>,

    /// FA below which tracking stops
    #[arg(long)]
    pub fa_threshold: Option<f64>,

    /// FA below which a seed is not tracked
    #[arg(long)]
    pub fa_threshold2: Option<f64>,

    #[arg(long)]
    pub time_step: Option<f64>,

    /// Spacing between the points written to the output fibers
    #[arg(long)]
    pub output_sampling: Option<f64>,

    /// 0 = Euler, 1 = RK2, 2 = RK4
    #[arg(long)]
    pub integration_method: Option<i32>,

    /// Seeds per foreground voxel
    #[arg(long)]
    pub sampling: Option<usize>,

    #[arg(long)]
    pub jitter_seed: Option<u64>,

    /// Use nearest-neighbour instead of trilinear interpolation
    #[arg(long)]
    pub nearest: bool,

    /// Interpolate tensors in the log-Euclidean domain
    #[arg(long)]
    pub log_euclidean: bool,

    /// Reorient tensors from the physical frame into the grid frame
    #[arg(long)]
    pub image_direction: bool,

    /// Reorient with the finite-strain rotation instead of PDD
    #[arg(long)]
    pub finite_strain: bool,
}

impl SettingsOverrides {
    pub fn apply(&self, settings: &mut TrackingSettings) {
        if let Some(v) = self.smoothness {
            settings.smoothness = v;
        }
        if let Some(v) = self.min_length {
            settings.min_length = v;
        }
        if let Some(v) = self.max_length {
            settings.max_length = v;
        }
        if let Some(v) = self.fa_threshold {
            settings.fa_threshold = v;
        }
        if let Some(v) = self.fa_threshold2 {
            settings.fa_threshold2 = v;
        }
        if let Some(v) = self.time_step {
            settings.time_step = v;
        }
        if let Some(v) = self.output_sampling {
            settings.output_fiber_sampling = v;
        }
        if let Some(v) = self.integration_method {
            settings.integration_method = v;
        }
        if let Some(v) = self.sampling {
            settings.sampling = v;
        }
        if let Some(v) = self.jitter_seed {
            settings.jitter_seed = v;
        }
        if self.nearest {
            settings.use_trilinear_interpolation = false;
        }
        if self.log_euclidean {
            settings.use_log_euclidean_interpolation = true;
        }
        if self.image_direction {
            settings.transform_tensor_with_image_direction = true;
        }
        if self.finite_strain {
            settings.transform_tensor_with_pdd = 0;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackSummary {
    pub fibers: usize,
    pub seed_voxels: usize,
}

pub fn resolve_settings(args: &TrackArgs) -> Result<TrackingSettings> {
    let mut settings = match &args.settings {
        Some(path) => read_json::<TrackingSettings>(path, "tracking settings")?,
        None => TrackingSettings::default(),
    };
    args.overrides.apply(&mut settings);
    Ok(settings)
}

pub fn run(args: &TrackArgs) -> Result<TrackSummary> {
    let settings = resolve_settings(args)?;
    let field: TensorField = read_json(&args.tensors, "tensor field")?;
    let seeds: SeedMask = read_json(&args.seeds, "seed mask")?;

    let mut tracker =
        FiberTracker::new(&field, &seeds, settings).context("invalid tracking setup")?;
    if let Some(path) = &args.affine {
        let affine: AffineTransform = read_json(path, "affine transform")?;
        tracker = tracker
            .with_affine_transform(affine)
            .context("invalid affine transform")?;
    }

    let output = tracker.run();
    let summary = TrackSummary {
        fibers: output.fibers.len(),
        seed_voxels: tensorline_core::tracking::count_seed_voxels(&seeds),
    };

    let document = BundleDocument {
        settings: Some(settings),
        fibers: output.fibers,
    };
    write_json(&document, &args.output, "fiber bundle")?;
    info!("wrote {} fibers to {}", summary.fibers, args.output.display());

    if let Some(path) = &args.fibers_seeded {
        write_json(&output.fibers_seeded, path, "fibers-seeded image")?;
    }
    Ok(summary)
}
