//! Regular 3D grids: geometry plus voxel storage.
//!
//! Voxels are stored x-fastest, so a z-slice is a contiguous run of
//! `nx * ny` values. The tracer relies on this to hand out disjoint slabs
//! of the counter image to worker threads.

use crate::error::{Result, TrackingError};
use crate::tensor::Tensor;
use nalgebra::{Matrix3, Point3, Vector3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Placement of a voxel grid in physical space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageGeometry {
    pub dimensions: [usize; 3],
    pub spacing: [f64; 3],
    pub origin: [f64; 3],
    /// Direction cosines, row-major.
    #[serde(default = "identity_rows")]
    pub direction: [[f64; 3]; 3],
}

fn identity_rows() -> [[f64; 3]; 3] {
    [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]
}

impl ImageGeometry {
    /// Unit spacing, origin at zero, identity direction.
    pub fn new(dimensions: [usize; 3]) -> Self {
        Self {
            dimensions,
            spacing: [1.0; 3],
            origin: [0.0; 3],
            direction: identity_rows(),
        }
    }

    pub fn with_spacing(mut self, spacing: [f64; 3]) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn with_origin(mut self, origin: [f64; 3]) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_direction(mut self, direction: Matrix3<f64>) -> Self {
        for (i, row) in self.direction.iter_mut().enumerate() {
            for (j, value) in row.iter_mut().enumerate() {
                *value = direction[(i, j)];
            }
        }
        self
    }

    pub fn len(&self) -> usize {
        self.dimensions.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn slice_len(&self) -> usize {
        self.dimensions[0] * self.dimensions[1]
    }

    pub fn linear_index(&self, voxel: [usize; 3]) -> usize {
        let [nx, ny, _] = self.dimensions;
        voxel[0] + nx * (voxel[1] + ny * voxel[2])
    }

    pub fn voxel_index(&self, linear: usize) -> [usize; 3] {
        let [nx, ny, _] = self.dimensions;
        [linear % nx, (linear / nx) % ny, linear / (nx * ny)]
    }

    pub fn contains_voxel(&self, voxel: [usize; 3]) -> bool {
        voxel
            .iter()
            .zip(self.dimensions.iter())
            .all(|(v, n)| v < n)
    }

    pub fn spacing_vector(&self) -> Vector3<f64> {
        Vector3::from(self.spacing)
    }

    pub fn origin_point(&self) -> Point3<f64> {
        Point3::from(self.origin)
    }

    pub fn direction_matrix(&self) -> Matrix3<f64> {
        let d = &self.direction;
        Matrix3::new(
            d[0][0], d[0][1], d[0][2], d[1][0], d[1][1], d[1][2], d[2][0], d[2][1], d[2][2],
        )
    }

    /// True when the continuous index lies in `[-0.5, n - 0.5)` on every axis.
    pub fn is_inside(&self, index: &Point3<f64>) -> bool {
        (0..3).all(|i| {
            let c = index[i];
            c.is_finite() && c >= -0.5 && c < self.dimensions[i] as f64 - 0.5
        })
    }

    /// `origin + D · (spacing ⊙ index)`
    pub fn index_to_physical(&self, index: &Point3<f64>) -> Point3<f64> {
        let scaled = index.coords.component_mul(&self.spacing_vector());
        self.origin_point() + self.direction_matrix() * scaled
    }

    pub fn physical_to_index(&self, point: &Point3<f64>) -> Option<Point3<f64>> {
        let inverse = self.direction_matrix().try_inverse()?;
        let local = inverse * (point - self.origin_point());
        Some(Point3::from(local.component_div(&self.spacing_vector())))
    }

    pub fn validate(&self) -> Result<()> {
        if self.dimensions.iter().any(|&n| n == 0) {
            return Err(TrackingError::GeometryMismatch(format!(
                "dimensions must be positive, got {:?}",
                self.dimensions
            )));
        }
        if self.spacing.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(TrackingError::GeometryMismatch(format!(
                "spacing must be finite and positive, got {:?}",
                self.spacing
            )));
        }
        if self.origin.iter().any(|o| !o.is_finite()) {
            return Err(TrackingError::GeometryMismatch(
                "origin must be finite".to_string(),
            ));
        }
        let det = self.direction_matrix().determinant();
        if !det.is_finite() || det.abs() < 1e-9 {
            return Err(TrackingError::GeometryMismatch(
                "direction matrix is singular".to_string(),
            ));
        }
        Ok(())
    }

    /// Same grid, up to a small tolerance on the real-valued fields.
    pub fn matches(&self, other: &ImageGeometry) -> bool {
        const TOL: f64 = 1e-6;
        let close = |a: &[f64], b: &[f64]| a.iter().zip(b).all(|(x, y)| (x - y).abs() <= TOL);
        self.dimensions == other.dimensions
            && close(&self.spacing, &other.spacing)
            && close(&self.origin, &other.origin)
            && self
                .direction
                .iter()
                .zip(other.direction.iter())
                .all(|(a, b)| close(a, b))
    }
}

/// Voxel values laid out on an [`ImageGeometry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume<T> {
    geometry: ImageGeometry,
    data: Vec<T>,
}

pub type TensorField = Volume<Tensor>;
pub type SeedMask = Volume<u8>;
pub type CounterImage = Volume<u32>;

impl<T> Volume<T> {
    pub fn from_vec(geometry: ImageGeometry, data: Vec<T>) -> Result<Self> {
        let volume = Self { geometry, data };
        volume.validate()?;
        Ok(volume)
    }

    pub fn filled(geometry: ImageGeometry, value: T) -> Self
    where
        T: Clone,
    {
        let data = vec![value; geometry.len()];
        Self { geometry, data }
    }

    /// Checks the geometry and that the voxel count matches it. Needed after
    /// deserialization, which does not go through [`Volume::from_vec`].
    pub fn validate(&self) -> Result<()> {
        self.geometry.validate()?;
        if self.data.len() != self.geometry.len() {
            return Err(TrackingError::GeometryMismatch(format!(
                "expected {} voxels for dimensions {:?}, got {}",
                self.geometry.len(),
                self.geometry.dimensions,
                self.data.len()
            )));
        }
        Ok(())
    }

    pub fn geometry(&self) -> &ImageGeometry {
        &self.geometry
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn get(&self, voxel: [usize; 3]) -> Option<&T> {
        if !self.geometry.contains_voxel(voxel) {
            return None;
        }
        self.data.get(self.geometry.linear_index(voxel))
    }

    pub fn set(&mut self, voxel: [usize; 3], value: T) -> Result<()> {
        if !self.geometry.contains_voxel(voxel) {
            return Err(TrackingError::OutOfBounds);
        }
        let idx = self.geometry.linear_index(voxel);
        self.data[idx] = value;
        Ok(())
    }

    /// Voxel value at an in-grid index. Callers clamp beforehand.
    pub(crate) fn at(&self, voxel: [usize; 3]) -> &T {
        &self.data[self.geometry.linear_index(voxel)]
    }

    /// Applies `f` to every voxel on the rayon pool.
    pub fn par_map<U, F>(&self, f: F) -> Volume<U>
    where
        T: Sync,
        U: Send,
        F: Fn(&T) -> U + Sync + Send,
    {
        Volume {
            geometry: self.geometry.clone(),
            data: self.data.par_iter().map(f).collect(),
        }
    }
}
