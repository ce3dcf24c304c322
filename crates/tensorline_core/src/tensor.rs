//! Symmetric 3×3 diffusion tensors and their scalar summaries.

use nalgebra::{Matrix3, SymmetricEigen, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul};

/// Eigenvalues below this are treated as non-positive.
const POSITIVE_EPSILON: f64 = 1e-20;

/// A symmetric second-order diffusion tensor.
///
/// Serialized as the six unique components `[xx, xy, xz, yy, yz, zz]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 6]", into = "[f64; 6]")]
pub struct Tensor {
    matrix: Matrix3<f64>,
}

/// Eigen system of a tensor, eigenvalues in ascending order.
/// `vectors` holds the matching unit eigenvectors as columns.
#[derive(Debug, Clone, Copy)]
pub struct TensorEigen {
    pub values: Vector3<f64>,
    pub vectors: Matrix3<f64>,
}

impl TensorEigen {
    pub fn principal_value(&self) -> f64 {
        self.values[2]
    }

    pub fn principal_vector(&self) -> Vector3<f64> {
        self.vectors.column(2).into_owned()
    }

    pub fn vector(&self, idx: usize) -> Vector3<f64> {
        self.vectors.column(idx).into_owned()
    }
}

impl Default for Tensor {
    fn default() -> Self {
        Self::zeros()
    }
}

impl Tensor {
    pub fn zeros() -> Self {
        Self {
            matrix: Matrix3::zeros(),
        }
    }

    pub fn identity() -> Self {
        Self {
            matrix: Matrix3::identity(),
        }
    }

    /// Builds a tensor from `[xx, xy, xz, yy, yz, zz]`.
    pub fn from_components(c: [f64; 6]) -> Self {
        Self {
            matrix: Matrix3::new(c[0], c[1], c[2], c[1], c[3], c[4], c[2], c[4], c[5]),
        }
    }

    /// Symmetrizes `matrix` as `(M + Mᵀ) / 2`.
    pub fn from_matrix(matrix: Matrix3<f64>) -> Self {
        Self {
            matrix: (matrix + matrix.transpose()) * 0.5,
        }
    }

    pub fn from_diagonal(values: Vector3<f64>) -> Self {
        Self {
            matrix: Matrix3::from_diagonal(&values),
        }
    }

    /// Reconstructs `V diag(λ) Vᵀ`; `vectors` must be orthonormal columns.
    pub fn from_eigen(values: Vector3<f64>, vectors: Matrix3<f64>) -> Self {
        Self::from_matrix(vectors * Matrix3::from_diagonal(&values) * vectors.transpose())
    }

    pub fn components(&self) -> [f64; 6] {
        let m = &self.matrix;
        [
            m[(0, 0)],
            m[(0, 1)],
            m[(0, 2)],
            m[(1, 1)],
            m[(1, 2)],
            m[(2, 2)],
        ]
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    pub fn trace(&self) -> f64 {
        self.matrix.trace()
    }

    pub fn is_zero(&self) -> bool {
        self.matrix.iter().all(|v| *v == 0.0)
    }

    pub fn is_finite(&self) -> bool {
        self.matrix.iter().all(|v| v.is_finite())
    }

    /// Fractional anisotropy, `sqrt(3/2) · |T - tr(T)/3 · I| / |T|` in the
    /// Frobenius norm. Zero for the zero tensor.
    pub fn fa(&self) -> f64 {
        let norm = self.matrix.norm();
        if norm <= POSITIVE_EPSILON || !norm.is_finite() {
            return 0.0;
        }
        let deviatoric = self.matrix - Matrix3::identity() * (self.trace() / 3.0);
        (1.5_f64.sqrt() * deviatoric.norm() / norm).min(1.0)
    }

    /// Apparent diffusion coefficient (mean diffusivity).
    pub fn adc(&self) -> f64 {
        self.trace() / 3.0
    }

    pub fn eigen(&self) -> TensorEigen {
        let eig = SymmetricEigen::new(self.matrix);
        let mut order = [0usize, 1, 2];
        order.sort_by(|&a, &b| {
            eig.eigenvalues[a]
                .partial_cmp(&eig.eigenvalues[b])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut values = Vector3::zeros();
        let mut vectors = Matrix3::zeros();
        for (dest, &src) in order.iter().enumerate() {
            values[dest] = eig.eigenvalues[src];
            vectors.set_column(dest, &eig.eigenvectors.column(src));
        }
        TensorEigen { values, vectors }
    }

    pub fn principal_eigenvector(&self) -> Vector3<f64> {
        self.eigen().principal_vector()
    }

    pub fn principal_eigenvalue(&self) -> f64 {
        self.eigen().principal_value()
    }

    pub fn is_positive_definite(&self) -> bool {
        self.is_finite() && self.eigen().values[0] > POSITIVE_EPSILON
    }

    /// Matrix logarithm; `None` unless the tensor is positive definite.
    pub fn log(&self) -> Option<Tensor> {
        if !self.is_finite() {
            return None;
        }
        let eig = self.eigen();
        if eig.values[0] <= POSITIVE_EPSILON {
            return None;
        }
        Some(Self::from_eigen(eig.values.map(f64::ln), eig.vectors))
    }

    pub fn exp(&self) -> Tensor {
        let eig = self.eigen();
        Self::from_eigen(eig.values.map(f64::exp), eig.vectors)
    }

    pub fn try_inverse(&self) -> Option<Tensor> {
        self.matrix.try_inverse().map(Self::from_matrix)
    }

    /// `T · v`
    pub fn apply(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.matrix * v
    }

    /// Congruence `R T Rᵀ`.
    pub fn rotated(&self, rotation: &Matrix3<f64>) -> Tensor {
        Self::from_matrix(rotation * self.matrix * rotation.transpose())
    }
}

impl From<[f64; 6]> for Tensor {
    fn from(value: [f64; 6]) -> Self {
        Self::from_components(value)
    }
}

impl From<Tensor> for [f64; 6] {
    fn from(value: Tensor) -> Self {
        value.components()
    }
}

impl Add for Tensor {
    type Output = Tensor;

    fn add(self, rhs: Tensor) -> Tensor {
        Tensor {
            matrix: self.matrix + rhs.matrix,
        }
    }
}

impl AddAssign for Tensor {
    fn add_assign(&mut self, rhs: Tensor) {
        self.matrix += rhs.matrix;
    }
}

impl Mul<f64> for Tensor {
    type Output = Tensor;

    fn mul(self, rhs: f64) -> Tensor {
        Tensor {
            matrix: self.matrix * rhs,
        }
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = self.components();
        write!(f, "{} {} {} {} {} {}", c[0], c[1], c[2], c[3], c[4], c[5])
    }
}
