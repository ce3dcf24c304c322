//! Tracking configuration.

use crate::error::{Result, TrackingError};
use serde::{Deserialize, Serialize};

/// Options controlling a tracking run. Lengths are in physical units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingSettings {
    /// Tensorline blend weight: 0 follows the principal eigenvector, 1
    /// follows the tensor-deflected incoming direction.
    pub smoothness: f64,
    /// Fibers shorter than this are discarded.
    pub min_length: f64,
    /// Tracking in one direction stops before exceeding this length.
    pub max_length: f64,
    /// Hard stop: tracking ends at the first sample with a lower FA.
    pub fa_threshold: f64,
    /// Seed gate: seeds whose tensor has a lower FA are not tracked.
    pub fa_threshold2: f64,
    /// Integration step length.
    pub time_step: f64,
    /// Spacing between the points kept in output fibers.
    pub output_fiber_sampling: f64,
    pub use_trilinear_interpolation: bool,
    /// Interpolate matrix logarithms instead of tensors (trilinear only).
    pub use_log_euclidean_interpolation: bool,
    /// 0 = Euler, 1 = second order Runge-Kutta, 2 = fourth order Runge-Kutta.
    pub integration_method: i32,
    /// Seeds per foreground voxel.
    pub sampling: usize,
    /// Reorient sampled tensors from the physical frame into the grid frame.
    pub transform_tensor_with_image_direction: bool,
    /// 1 = preservation of principal direction, 0 = finite strain.
    pub transform_tensor_with_pdd: i32,
    /// Seed for the sub-voxel jitter of extra seeds.
    pub jitter_seed: u64,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            smoothness: 0.0,
            min_length: 10.0,
            max_length: 200.0,
            fa_threshold: 0.2,
            fa_threshold2: 0.2,
            time_step: 0.5,
            output_fiber_sampling: 0.5,
            use_trilinear_interpolation: true,
            use_log_euclidean_interpolation: false,
            integration_method: 0,
            sampling: 1,
            transform_tensor_with_image_direction: false,
            transform_tensor_with_pdd: 1,
            jitter_seed: 0,
        }
    }
}

fn invalid(message: impl Into<String>) -> TrackingError {
    TrackingError::InvalidConfiguration(message.into())
}

impl TrackingSettings {
    /// Checks ranges. Selector values are checked when they are resolved.
    pub fn validate(&self) -> Result<()> {
        if !self.time_step.is_finite() || self.time_step <= 0.0 {
            return Err(invalid(format!(
                "time_step must be finite and positive, got {}",
                self.time_step
            )));
        }
        if !self.max_length.is_finite() || self.max_length <= 0.0 {
            return Err(invalid(format!(
                "max_length must be finite and positive, got {}",
                self.max_length
            )));
        }
        if !self.min_length.is_finite() || self.min_length < 0.0 {
            return Err(invalid(format!(
                "min_length must be finite and non-negative, got {}",
                self.min_length
            )));
        }
        if self.min_length > self.max_length {
            return Err(invalid(format!(
                "min_length ({}) exceeds max_length ({})",
                self.min_length, self.max_length
            )));
        }
        for (name, value) in [
            ("smoothness", self.smoothness),
            ("fa_threshold", self.fa_threshold),
            ("fa_threshold2", self.fa_threshold2),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(format!("{name} must lie in [0, 1], got {value}")));
            }
        }
        if !self.output_fiber_sampling.is_finite() || self.output_fiber_sampling < 0.0 {
            return Err(invalid(format!(
                "output_fiber_sampling must be finite and non-negative, got {}",
                self.output_fiber_sampling
            )));
        }
        if self.sampling == 0 {
            return Err(invalid("sampling must be at least 1"));
        }
        Ok(())
    }

    /// Step budget per tracking direction.
    pub fn max_steps(&self) -> usize {
        ((self.max_length / self.time_step).ceil() as usize).saturating_mul(4).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_err_contains<T: std::fmt::Debug>(result: Result<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    #[test]
    fn defaults_are_valid() {
        TrackingSettings::default().validate().expect("defaults validate");
    }

    #[test]
    fn rejects_out_of_range_values() {
        let base = TrackingSettings::default();
        assert_err_contains(
            TrackingSettings { time_step: 0.0, ..base }.validate(),
            "time_step",
        );
        assert_err_contains(
            TrackingSettings { max_length: f64::INFINITY, ..base }.validate(),
            "max_length",
        );
        assert_err_contains(
            TrackingSettings { min_length: 300.0, ..base }.validate(),
            "exceeds max_length",
        );
        assert_err_contains(
            TrackingSettings { smoothness: 1.5, ..base }.validate(),
            "smoothness",
        );
        assert_err_contains(
            TrackingSettings { fa_threshold2: -0.1, ..base }.validate(),
            "fa_threshold2",
        );
        assert_err_contains(
            TrackingSettings { sampling: 0, ..base }.validate(),
            "sampling",
        );
    }

    #[test]
    fn partial_json_uses_defaults() {
        let settings: TrackingSettings =
            serde_json::from_str(r#"{"smoothness": 0.3, "integration_method": 2}"#).expect("parse");
        assert_eq!(settings.smoothness, 0.3);
        assert_eq!(settings.integration_method, 2);
        assert_eq!(settings.max_length, TrackingSettings::default().max_length);
    }

    #[test]
    fn step_budget_scales_with_length() {
        let settings = TrackingSettings {
            max_length: 10.0,
            time_step: 0.5,
            ..TrackingSettings::default()
        };
        assert_eq!(settings.max_steps(), 80);
    }
}
