//! Fibers: ordered point lists with per-point tensors.

use crate::error::{Result, TrackingError};
use crate::tensor::Tensor;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A position along a fiber together with the tensor sampled there.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FiberPoint {
    pub point: Point3<f64>,
    pub tensor: Tensor,
}

/// The empty point: origin and zero tensor.
impl Default for FiberPoint {
    fn default() -> Self {
        Self {
            point: Point3::origin(),
            tensor: Tensor::zeros(),
        }
    }
}

impl FiberPoint {
    pub fn new(point: Point3<f64>, tensor: Tensor) -> Self {
        Self { point, tensor }
    }
}

/// Length of the segment `a → b` under the metric `G = λmax(T) · T⁻¹`, with
/// `T` the mean of the two endpoint tensors.
///
/// Every eigenvalue of `G` is at least one, so the result is never shorter
/// than the Euclidean distance. Falls back to the Euclidean distance when `T`
/// is not positive definite.
pub fn segment_length(a: &FiberPoint, b: &FiberPoint) -> f64 {
    let d: Vector3<f64> = b.point - a.point;
    let euclidean = d.norm();
    if euclidean == 0.0 {
        return 0.0;
    }
    let mean = (a.tensor + b.tensor) * 0.5;
    if !mean.is_finite() {
        return euclidean;
    }
    let eig = mean.eigen();
    let l_min = eig.values[0];
    let l_max = eig.principal_value();
    if l_min <= 0.0 || l_max <= 0.0 {
        return euclidean;
    }
    let local = eig.vectors.transpose() * d;
    let squared: f64 = (0..3).map(|i| l_max / eig.values[i] * local[i] * local[i]).sum();
    squared.sqrt().max(euclidean)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fiber {
    points: Vec<FiberPoint>,
}

impl Fiber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_points(points: Vec<FiberPoint>) -> Self {
        Self { points }
    }

    /// Appends a point to the tail of the fiber.
    pub fn add_point(&mut self, point: FiberPoint) {
        self.points.push(point);
    }

    pub fn set_point_list(&mut self, points: Vec<FiberPoint>) {
        self.points = points;
    }

    pub fn point_list(&self) -> &[FiberPoint] {
        &self.points
    }

    pub fn into_points(self) -> Vec<FiberPoint> {
        self.points
    }

    /// The `idx`-th point, if it exists.
    pub fn point(&self, idx: usize) -> Option<&FiberPoint> {
        self.points.get(idx)
    }

    pub fn number_of_points(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FiberPoint> {
        self.points.iter()
    }

    /// Joins two fibers grown from the same seed in opposite directions.
    ///
    /// `self` is reversed so that it ends at the seed and `other` is appended
    /// after it. When both fibers start at the same point that point is kept
    /// once, so the result holds `n + m - 1` points with the seed at index
    /// `n - 1`.
    pub fn merge_with(&mut self, other: &Fiber) {
        self.points.reverse();
        let skip = match (self.points.last(), other.points.first()) {
            (Some(a), Some(b)) if a.point == b.point => 1,
            _ => 0,
        };
        self.points.extend(other.points.iter().skip(skip).copied());
    }

    /// Geodesic length, see [`segment_length`].
    pub fn length(&self) -> f64 {
        self.points
            .windows(2)
            .map(|pair| segment_length(&pair[0], &pair[1]))
            .sum()
    }

    pub fn euclidean_length(&self) -> f64 {
        self.points
            .windows(2)
            .map(|pair| (pair[1].point - pair[0].point).norm())
            .sum()
    }

    /// Mean of the per-point fractional anisotropy.
    pub fn mean_fa(&self) -> Result<f64> {
        self.mean_of(Tensor::fa)
    }

    /// Mean of the per-point apparent diffusion coefficient.
    pub fn mean_adc(&self) -> Result<f64> {
        self.mean_of(Tensor::adc)
    }

    fn mean_of(&self, scalar: impl Fn(&Tensor) -> f64) -> Result<f64> {
        if self.points.is_empty() {
            return Err(TrackingError::EmptyFiberStatistics);
        }
        let total: f64 = self.points.iter().map(|p| scalar(&p.tensor)).sum();
        Ok(total / self.points.len() as f64)
    }
}

impl fmt::Display for Fiber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for p in &self.points {
            writeln!(f, "{} {} {} {}", p.point.x, p.point.y, p.point.z, p.tensor)?;
        }
        Ok(())
    }
}
