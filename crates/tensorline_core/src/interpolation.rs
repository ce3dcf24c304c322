//! Tensor interpolation at continuous indices.

use crate::tensor::Tensor;
use crate::traits::TensorSampler;
use crate::volume::{TensorField, Volume};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterpolationMode {
    NearestNeighbor,
    Linear,
}

impl InterpolationMode {
    pub fn from_trilinear_flag(use_trilinear: bool) -> Self {
        if use_trilinear {
            InterpolationMode::Linear
        } else {
            InterpolationMode::NearestNeighbor
        }
    }
}

/// Samples a [`TensorField`] with a fixed interpolation mode.
///
/// When a log field (the matrix logarithm of every voxel) is attached, linear
/// interpolation blends logarithms and returns the exponential of the blend.
/// Cells touching a voxel without a logarithm (background, non positive
/// definite) fall back to plain linear blending.
#[derive(Debug, Clone, Copy)]
pub struct FieldSampler<'a> {
    field: &'a TensorField,
    log_field: Option<&'a LogTensorField>,
    mode: InterpolationMode,
}

impl<'a> FieldSampler<'a> {
    pub fn new(field: &'a TensorField, mode: InterpolationMode) -> Self {
        Self {
            field,
            log_field: None,
            mode,
        }
    }

    pub fn with_log_field(mut self, log_field: &'a LogTensorField) -> Self {
        self.log_field = Some(log_field);
        self
    }

    pub fn mode(&self) -> InterpolationMode {
        self.mode
    }

    fn nearest(&self, index: &Point3<f64>) -> Tensor {
        let dims = self.field.geometry().dimensions;
        let mut voxel = [0usize; 3];
        for i in 0..3 {
            let rounded = index[i].round().max(0.0) as usize;
            voxel[i] = rounded.min(dims[i] - 1);
        }
        *self.field.at(voxel)
    }

    fn linear(&self, index: &Point3<f64>) -> Tensor {
        let dims = self.field.geometry().dimensions;
        let mut lower = [0usize; 3];
        let mut upper = [0usize; 3];
        let mut frac = [0.0f64; 3];
        for i in 0..3 {
            let base = index[i].floor();
            frac[i] = index[i] - base;
            let max = (dims[i] - 1) as f64;
            lower[i] = base.clamp(0.0, max) as usize;
            upper[i] = (base + 1.0).clamp(0.0, max) as usize;
        }

        let mut corners = [([0usize; 3], 0.0f64); 8];
        for (corner, slot) in corners.iter_mut().enumerate() {
            let mut voxel = [0usize; 3];
            let mut weight = 1.0;
            for i in 0..3 {
                if corner & (1 << i) != 0 {
                    voxel[i] = upper[i];
                    weight *= frac[i];
                } else {
                    voxel[i] = lower[i];
                    weight *= 1.0 - frac[i];
                }
            }
            *slot = (voxel, weight);
        }

        if let Some(log_field) = self.log_field {
            let mut out = Tensor::zeros();
            let mut all_defined = true;
            for (voxel, weight) in corners.iter().filter(|(_, w)| *w > 0.0) {
                match log_field.at(*voxel) {
                    Some(log) => out += *log * *weight,
                    None => {
                        all_defined = false;
                        break;
                    }
                }
            }
            if all_defined {
                return out.exp();
            }
        }

        let mut out = Tensor::zeros();
        for (voxel, weight) in corners.iter().filter(|(_, w)| *w > 0.0) {
            out += *self.field.at(*voxel) * *weight;
        }
        out
    }
}

impl TensorSampler for FieldSampler<'_> {
    fn sample(&self, index: &Point3<f64>) -> Tensor {
        if !self.is_inside(index) {
            return Tensor::zeros();
        }
        match self.mode {
            InterpolationMode::NearestNeighbor => self.nearest(index),
            InterpolationMode::Linear => self.linear(index),
        }
    }

    fn is_inside(&self, index: &Point3<f64>) -> bool {
        self.field.geometry().is_inside(index)
    }
}

/// Matrix logarithm per voxel, `None` where the tensor has none.
pub type LogTensorField = Volume<Option<Tensor>>;

pub fn log_tensor_field(field: &TensorField) -> LogTensorField {
    field.par_map(Tensor::log)
}
