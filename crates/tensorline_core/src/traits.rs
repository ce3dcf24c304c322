use crate::error::Result;
use crate::tensor::Tensor;
use nalgebra::{Point3, Vector3};

/// Point-wise access to a tensor field in continuous index space.
pub trait TensorSampler: Sync {
    /// Interpolated tensor at `index`, or the zero tensor outside the field.
    fn sample(&self, index: &Point3<f64>) -> Tensor;

    /// Whether `index` lies inside the field's continuous bounds.
    fn is_inside(&self, index: &Point3<f64>) -> bool;
}

/// A direction field that depends on the path history.
///
/// Eigenvectors are sign-ambiguous, so the direction at a point is only
/// defined relative to the direction the streamline arrived with.
pub trait DirectionField {
    /// Propagation direction at `index` for a streamline travelling along
    /// `incoming`.
    fn direction_at(&self, index: &Point3<f64>, incoming: &Vector3<f64>) -> Result<Vector3<f64>>;
}

/// A scheme that advances a streamline by one step.
pub trait Integrator {
    /// Advances `position`, whose propagation direction is already known to
    /// be `direction`, by the per-axis step `h` (index units per unit
    /// direction component).
    fn step(
        &self,
        field: &impl DirectionField,
        position: &Point3<f64>,
        direction: &Vector3<f64>,
        h: &Vector3<f64>,
    ) -> Result<Point3<f64>>;
}
