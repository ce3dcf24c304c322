//! Synthetic tensor fields for integration tests.

#![allow(dead_code)]

use nalgebra::Vector3;
use tensorline_core::{ImageGeometry, SeedMask, Tensor, TensorField, Volume};

/// Prolate tensor with principal eigenvector `axis` (FA ≈ 0.8).
pub fn stick(axis: Vector3<f64>) -> Tensor {
    let a = axis.normalize();
    Tensor::from_matrix(nalgebra::Matrix3::identity() * 0.3 + a * a.transpose() * 1.4)
}

pub fn isotropic() -> Tensor {
    Tensor::identity() * 0.7
}

pub fn uniform_field(geometry: ImageGeometry, tensor: Tensor) -> TensorField {
    Volume::filled(geometry, tensor)
}

/// Field along x that is anisotropic only for `x` in `lo..=hi` and isotropic
/// elsewhere.
pub fn x_band_field(dims: [usize; 3], lo: usize, hi: usize) -> TensorField {
    let geometry = ImageGeometry::new(dims);
    let data = (0..geometry.len())
        .map(|i| {
            let [x, _, _] = geometry.voxel_index(i);
            if (lo..=hi).contains(&x) {
                stick(Vector3::x())
            } else {
                isotropic()
            }
        })
        .collect();
    Volume::from_vec(geometry, data).expect("valid field")
}

/// Principal directions circulate about the z axis through `(cx, cy)`.
pub fn circular_field(dims: [usize; 3], cx: f64, cy: f64) -> TensorField {
    let geometry = ImageGeometry::new(dims);
    let data = (0..geometry.len())
        .map(|i| {
            let [x, y, _] = geometry.voxel_index(i);
            let tangent = Vector3::new(-(y as f64 - cy), x as f64 - cx, 0.0);
            if tangent.norm() < 1e-9 {
                isotropic()
            } else {
                stick(tangent)
            }
        })
        .collect();
    Volume::from_vec(geometry, data).expect("valid field")
}

pub fn seed_mask(geometry: ImageGeometry, voxels: &[[usize; 3]]) -> SeedMask {
    let mut mask = Volume::filled(geometry, 0u8);
    for &voxel in voxels {
        mask.set(voxel, 1).expect("seed inside mask");
    }
    mask
}
