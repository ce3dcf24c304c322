//! Tensorline fiber tracking.
//!
//! A [`FiberTracker`] borrows a tensor field and a seed mask, validates its
//! settings once, and then tracks every seed independently. Each seed is
//! tracked along both signs of its principal eigenvector; the two halves are
//! joined at the seed.

mod seeds;
mod settings;

pub use seeds::{count_seed_voxels, voxel_seeds};
pub use settings::TrackingSettings;

use crate::direction::{initial_direction, next_direction};
use crate::error::{Result, TrackingError};
use crate::fiber::{segment_length, Fiber, FiberPoint};
use crate::interpolation::{log_tensor_field, FieldSampler, InterpolationMode, LogTensorField};
use crate::reorientation::{AffineTransform, ReorientationMode, TensorReorienter};
use crate::solvers::IntegrationMethod;
use crate::tensor::Tensor;
use crate::traits::{DirectionField, TensorSampler};
use crate::volume::{CounterImage, SeedMask, TensorField, Volume};
use log::{debug, info, warn};
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Why tracking stopped in one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    OutOfBounds,
    DegenerateTensor,
    LowAnisotropy,
    MaxLength,
    IterationLimit,
}

impl From<TrackingError> for StopReason {
    fn from(value: TrackingError) -> Self {
        match value {
            TrackingError::OutOfBounds => StopReason::OutOfBounds,
            _ => StopReason::DegenerateTensor,
        }
    }
}

/// One half of a fiber, starting at the seed.
#[derive(Debug, Clone)]
pub struct DirectionTrace {
    pub fiber: Fiber,
    /// Accumulated geodesic length over every integration step.
    pub length: f64,
    pub steps: usize,
    pub stop: StopReason,
}

#[derive(Debug, Clone)]
pub struct TrackingOutput {
    pub fibers: Vec<Fiber>,
    /// Fibers emitted per seed voxel, on the seed mask's grid.
    pub fibers_seeded: CounterImage,
}

struct OutputTransform {
    affine: AffineTransform,
    reorienter: TensorReorienter,
}

pub struct FiberTracker<'a> {
    field: &'a TensorField,
    seeds: &'a SeedMask,
    settings: TrackingSettings,
    method: IntegrationMethod,
    interpolation: InterpolationMode,
    reorientation: ReorientationMode,
    log_field: Option<LogTensorField>,
    /// Physical frame to grid frame, when enabled.
    tensor_frame: Option<TensorReorienter>,
    output: Option<OutputTransform>,
    /// Index-space step per unit of direction along each axis.
    step: Vector3<f64>,
    max_steps: usize,
}

impl<'a> FiberTracker<'a> {
    /// Validates everything up front; no seed is tracked with an invalid
    /// configuration.
    pub fn new(field: &'a TensorField, seeds: &'a SeedMask, settings: TrackingSettings) -> Result<Self> {
        settings.validate()?;
        let method = IntegrationMethod::try_from(settings.integration_method)?;
        let reorientation = ReorientationMode::from_selector(settings.transform_tensor_with_pdd)?;
        let interpolation = InterpolationMode::from_trilinear_flag(settings.use_trilinear_interpolation);

        field.validate()?;
        seeds.validate()?;
        if !field.geometry().matches(seeds.geometry()) {
            return Err(TrackingError::GeometryMismatch(
                "seed mask and tensor field must share the same grid".to_string(),
            ));
        }

        let geometry = field.geometry();
        let tensor_frame = if settings.transform_tensor_with_image_direction {
            let to_grid = geometry.direction_matrix().try_inverse().ok_or_else(|| {
                TrackingError::GeometryMismatch("direction matrix is singular".to_string())
            })?;
            Some(TensorReorienter::new(to_grid, reorientation)?)
        } else {
            None
        };

        let log_field = if settings.use_log_euclidean_interpolation
            && interpolation == InterpolationMode::Linear
        {
            Some(log_tensor_field(field))
        } else {
            None
        };

        let step = geometry.spacing_vector().map(|s| settings.time_step / s);

        Ok(Self {
            field,
            seeds,
            settings,
            method,
            interpolation,
            reorientation,
            log_field,
            tensor_frame,
            output: None,
            step,
            max_steps: settings.max_steps(),
        })
    }

    /// Maps emitted fibers through `affine`; stored tensors are reoriented by
    /// its linear part with the configured reorientation mode.
    pub fn with_affine_transform(mut self, affine: AffineTransform) -> Result<Self> {
        if !affine.is_invertible() {
            return Err(TrackingError::InvalidConfiguration(
                "affine transform is not invertible".to_string(),
            ));
        }
        let reorienter = TensorReorienter::new(*affine.jacobian(), self.reorientation)?;
        self.output = Some(OutputTransform { affine, reorienter });
        Ok(self)
    }

    pub fn settings(&self) -> &TrackingSettings {
        &self.settings
    }

    pub fn integration_method(&self) -> IntegrationMethod {
        self.method
    }

    fn sampler(&self) -> FieldSampler<'_> {
        let sampler = FieldSampler::new(self.field, self.interpolation);
        match &self.log_field {
            Some(log_field) => sampler.with_log_field(log_field),
            None => sampler,
        }
    }

    /// Interpolated tensor in the field's own frame.
    pub fn sample_tensor(&self, index: &Point3<f64>) -> Tensor {
        self.sampler().sample(index)
    }

    /// Tensor in the tracking frame.
    pub fn tracking_tensor(&self, tensor: &Tensor) -> Tensor {
        match &self.tensor_frame {
            Some(reorienter) => reorienter.apply(tensor),
            None => *tensor,
        }
    }

    pub fn is_inside(&self, index: &Point3<f64>) -> bool {
        self.field.geometry().is_inside(index)
    }

    /// Tracks one seed given as a continuous index. Returns `None` when the
    /// seed is rejected or the joined fiber is shorter than `min_length`.
    pub fn track_seed(&self, seed: &Point3<f64>) -> Option<Fiber> {
        if !self.is_inside(seed) {
            return None;
        }
        let tensor = self.tracking_tensor(&self.sample_tensor(seed));
        if tensor.fa() < self.settings.fa_threshold2 {
            return None;
        }
        let e1 = initial_direction(&tensor).ok()?;

        let forward = self.trace_direction(seed, &e1);
        let backward = self.trace_direction(seed, &(-e1));
        let total = forward.length + backward.length;
        if total < self.settings.min_length {
            debug!(
                "discarding fiber from seed {:?}: length {:.3} below minimum {:.3} (stops: {:?}/{:?})",
                seed, total, self.settings.min_length, backward.stop, forward.stop
            );
            return None;
        }

        let mut fiber = backward.fiber;
        fiber.merge_with(&forward.fiber);
        Some(self.to_output_space(fiber))
    }

    /// Follows the field from `seed` starting along `initial`, until a stop
    /// rule fires. The sample that triggers a stop is never kept.
    pub fn trace_direction(&self, seed: &Point3<f64>, initial: &Vector3<f64>) -> DirectionTrace {
        let geometry = self.field.geometry();
        let seed_point = FiberPoint::new(geometry.index_to_physical(seed), self.sample_tensor(seed));

        let mut fiber = Fiber::new();
        fiber.add_point(seed_point);
        let mut previous = seed_point;
        let mut emitted = true;
        let mut position = *seed;
        let mut direction = *initial;
        let mut length = 0.0;
        let mut since_output = 0.0;
        let mut steps = 0usize;

        let stop = loop {
            if steps >= self.max_steps {
                break StopReason::IterationLimit;
            }
            steps += 1;

            let next = match self.method.step(self, &position, &direction, &self.step) {
                Ok(next) => next,
                Err(err) => break err.into(),
            };
            if !self.is_inside(&next) {
                break StopReason::OutOfBounds;
            }

            let raw = self.sample_tensor(&next);
            let tensor = self.tracking_tensor(&raw);
            if tensor.is_zero() || !tensor.is_finite() {
                break StopReason::DegenerateTensor;
            }
            if tensor.fa() < self.settings.fa_threshold {
                break StopReason::LowAnisotropy;
            }

            let candidate = FiberPoint::new(geometry.index_to_physical(&next), raw);
            let segment = segment_length(&previous, &candidate);
            if length + segment > self.settings.max_length {
                break StopReason::MaxLength;
            }

            let new_direction = match next_direction(&tensor, &direction, self.settings.smoothness) {
                Ok(d) => d,
                Err(err) => break err.into(),
            };

            length += segment;
            since_output += segment;
            previous = candidate;
            position = next;
            direction = new_direction;

            if since_output >= self.settings.output_fiber_sampling {
                fiber.add_point(candidate);
                since_output = 0.0;
                emitted = true;
            } else {
                emitted = false;
            }
        };

        if !emitted {
            fiber.add_point(previous);
        }

        DirectionTrace {
            fiber,
            length,
            steps,
            stop,
        }
    }

    fn to_output_space(&self, fiber: Fiber) -> Fiber {
        let Some(output) = &self.output else {
            return fiber;
        };
        Fiber::from_points(
            fiber
                .into_points()
                .into_iter()
                .map(|p| {
                    FiberPoint::new(
                        output.affine.transform_point(&p.point),
                        output.reorienter.apply(&p.tensor),
                    )
                })
                .collect(),
        )
    }

    /// Tracks every seed of the mask. Work is split by z-slice: each worker
    /// owns one contiguous slice of the counter image, so no locking is
    /// needed. Fibers come back ordered by seed voxel, then sub-seed.
    pub fn run(&self) -> TrackingOutput {
        let geometry = self.seeds.geometry().clone();
        let seed_voxels = count_seed_voxels(self.seeds);
        if seed_voxels == 0 {
            warn!("seed mask has no foreground voxels; nothing to track");
        }
        info!(
            "tracking {} seed voxels ({} seeds each) with {:?}",
            seed_voxels, self.settings.sampling, self.method
        );

        let slice_len = geometry.slice_len();
        let mut fibers_seeded: CounterImage = Volume::filled(geometry, 0u32);
        let per_slab: Vec<Vec<Fiber>> = fibers_seeded
            .data_mut()
            .par_chunks_mut(slice_len)
            .enumerate()
            .map(|(z, counts)| self.track_slab(z, counts))
            .collect();

        let fibers: Vec<Fiber> = per_slab.into_iter().flatten().collect();
        info!("emitted {} fibers", fibers.len());
        TrackingOutput {
            fibers,
            fibers_seeded,
        }
    }

    fn track_slab(&self, z: usize, counts: &mut [u32]) -> Vec<Fiber> {
        let geometry = self.seeds.geometry();
        let offset = z * geometry.slice_len();
        let mask = &self.seeds.data()[offset..offset + counts.len()];
        let mut fibers = Vec::new();

        for (i, (count, &value)) in counts.iter_mut().zip(mask).enumerate() {
            if value == 0 {
                continue;
            }
            let linear = offset + i;
            let voxel = geometry.voxel_index(linear);
            for seed in voxel_seeds(voxel, linear, self.settings.sampling, self.settings.jitter_seed) {
                if let Some(fiber) = self.track_seed(&seed) {
                    *count = count.saturating_add(1);
                    fibers.push(fiber);
                }
            }
        }

        debug!("slice {z}: {} fibers", fibers.len());
        fibers
    }
}

impl DirectionField for FiberTracker<'_> {
    fn direction_at(&self, index: &Point3<f64>, incoming: &Vector3<f64>) -> Result<Vector3<f64>> {
        if !self.is_inside(index) {
            return Err(TrackingError::OutOfBounds);
        }
        let tensor = self.tracking_tensor(&self.sample_tensor(index));
        next_direction(&tensor, incoming, self.settings.smoothness)
    }
}
