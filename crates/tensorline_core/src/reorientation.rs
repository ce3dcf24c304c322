//! Tensor reorientation under affine transforms.
//!
//! An affine map changes the frame a tensor is expressed in, but diffusion
//! tensors must only be rotated, never sheared or scaled, so both strategies
//! extract a rotation `R` from the transform's Jacobian `F` and return
//! `R T Rᵀ`.

use crate::error::{Result, TrackingError};
use crate::tensor::Tensor;
use nalgebra::{Matrix3, Point3, Rotation3, Unit, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReorientationMode {
    /// Rotational part of the polar decomposition of `F`.
    FiniteStrain,
    /// Preservation of principal direction.
    PreferredDirection,
}

impl ReorientationMode {
    /// `0` selects finite strain, `1` selects PDD.
    pub fn from_selector(selector: i32) -> Result<Self> {
        match selector {
            0 => Ok(ReorientationMode::FiniteStrain),
            1 => Ok(ReorientationMode::PreferredDirection),
            other => Err(TrackingError::InvalidConfiguration(format!(
                "unknown tensor reorientation selector {other} (expected 0 for finite strain or 1 for PDD)"
            ))),
        }
    }
}

/// `x ↦ A x + t`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "AffineRepr", into = "AffineRepr")]
pub struct AffineTransform {
    linear: Matrix3<f64>,
    translation: Vector3<f64>,
}

/// Row-major on-disk layout.
#[derive(Serialize, Deserialize)]
struct AffineRepr {
    matrix: [[f64; 3]; 3],
    #[serde(default)]
    translation: [f64; 3],
}

impl From<AffineRepr> for AffineTransform {
    fn from(value: AffineRepr) -> Self {
        let m = value.matrix;
        Self {
            linear: Matrix3::new(
                m[0][0], m[0][1], m[0][2], m[1][0], m[1][1], m[1][2], m[2][0], m[2][1], m[2][2],
            ),
            translation: Vector3::from(value.translation),
        }
    }
}

impl From<AffineTransform> for AffineRepr {
    fn from(value: AffineTransform) -> Self {
        let mut matrix = [[0.0; 3]; 3];
        for (i, row) in matrix.iter_mut().enumerate() {
            for (j, entry) in row.iter_mut().enumerate() {
                *entry = value.linear[(i, j)];
            }
        }
        Self {
            matrix,
            translation: [value.translation.x, value.translation.y, value.translation.z],
        }
    }
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl AffineTransform {
    pub fn new(linear: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            linear,
            translation,
        }
    }

    pub fn identity() -> Self {
        Self::new(Matrix3::identity(), Vector3::zeros())
    }

    /// The Jacobian of an affine map is its linear part.
    pub fn jacobian(&self) -> &Matrix3<f64> {
        &self.linear
    }

    pub fn translation(&self) -> &Vector3<f64> {
        &self.translation
    }

    pub fn transform_point(&self, point: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.linear * point.coords + self.translation)
    }

    pub fn transform_vector(&self, vector: &Vector3<f64>) -> Vector3<f64> {
        self.linear * vector
    }

    pub fn inverse(&self) -> Option<AffineTransform> {
        let inv = self.linear.try_inverse()?;
        Some(Self::new(inv, -(inv * self.translation)))
    }

    pub fn is_invertible(&self) -> bool {
        let det = self.linear.determinant();
        det.is_finite() && det.abs() > 1e-12
    }
}

/// Rotational part `U Vᵀ` of the polar decomposition of `jacobian`.
pub fn finite_strain_rotation(jacobian: &Matrix3<f64>) -> Option<Matrix3<f64>> {
    let svd = jacobian.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let rotation = u * v_t;
    rotation.iter().all(|v| v.is_finite()).then_some(rotation)
}

/// PDD rotation: `R1` carries the principal eigenvector `e1` onto the
/// direction of `F e1`; `R2` then turns `R1 e2` about that axis onto the part
/// of `F e2` orthogonal to it.
pub fn preferred_direction_rotation(tensor: &Tensor, jacobian: &Matrix3<f64>) -> Option<Matrix3<f64>> {
    let eig = tensor.eigen();
    let e1 = eig.vector(2);
    let e2 = eig.vector(1);

    let n1 = (jacobian * e1).try_normalize(1e-12)?;
    let r1 = rotation_onto(&e1, &n1, None);

    let f_e2 = jacobian * e2;
    let n2 = (f_e2 - n1 * n1.dot(&f_e2)).try_normalize(1e-12)?;
    let r2 = rotation_onto(&(r1 * e2), &n2, Some(&n1));

    Some((r2 * r1).into_inner())
}

/// Minimal rotation taking direction `from` to direction `to`. For opposite
/// vectors the half turn is taken about `axis` when given, otherwise about
/// any axis orthogonal to `from`.
fn rotation_onto(from: &Vector3<f64>, to: &Vector3<f64>, axis: Option<&Vector3<f64>>) -> Rotation3<f64> {
    if let Some(rotation) = Rotation3::rotation_between(from, to) {
        return rotation;
    }
    let axis = match axis {
        Some(a) => Unit::new_normalize(*a),
        None => Unit::new_normalize(orthogonal_to(from)),
    };
    Rotation3::from_axis_angle(&axis, PI)
}

fn orthogonal_to(v: &Vector3<f64>) -> Vector3<f64> {
    let abs = v.abs();
    let basis = if abs.x <= abs.y && abs.x <= abs.z {
        Vector3::x()
    } else if abs.y <= abs.z {
        Vector3::y()
    } else {
        Vector3::z()
    };
    v.cross(&basis)
}

/// Reorients tensors by a fixed Jacobian.
#[derive(Debug, Clone, Copy)]
pub struct TensorReorienter {
    jacobian: Matrix3<f64>,
    mode: ReorientationMode,
    /// Finite-strain rotation does not depend on the tensor.
    strain_rotation: Option<Matrix3<f64>>,
}

impl TensorReorienter {
    pub fn new(jacobian: Matrix3<f64>, mode: ReorientationMode) -> Result<Self> {
        let det = jacobian.determinant();
        if !det.is_finite() || det.abs() < 1e-12 {
            return Err(TrackingError::InvalidConfiguration(
                "reorientation transform is not invertible".to_string(),
            ));
        }
        let strain_rotation = match mode {
            ReorientationMode::FiniteStrain => Some(finite_strain_rotation(&jacobian).ok_or_else(
                || {
                    TrackingError::InvalidConfiguration(
                        "failed to decompose reorientation transform".to_string(),
                    )
                },
            )?),
            ReorientationMode::PreferredDirection => None,
        };
        Ok(Self {
            jacobian,
            mode,
            strain_rotation,
        })
    }

    pub fn mode(&self) -> ReorientationMode {
        self.mode
    }

    pub fn jacobian(&self) -> &Matrix3<f64> {
        &self.jacobian
    }

    /// Zero and non-finite tensors are returned unchanged.
    pub fn apply(&self, tensor: &Tensor) -> Tensor {
        if tensor.is_zero() || !tensor.is_finite() {
            return *tensor;
        }
        let rotation = match self.strain_rotation {
            Some(r) => Some(r),
            None => preferred_direction_rotation(tensor, &self.jacobian),
        };
        match rotation {
            Some(r) => tensor.rotated(&r),
            None => *tensor,
        }
    }
}

/// One-off reorientation of `tensor` by `jacobian`.
pub fn reorient(tensor: &Tensor, jacobian: &Matrix3<f64>, mode: ReorientationMode) -> Result<Tensor> {
    Ok(TensorReorienter::new(*jacobian, mode)?.apply(tensor))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tensor() -> Tensor {
        Tensor::from_components([1.7, 0.2, 0.05, 0.5, 0.1, 0.3])
    }

    fn shear_transform() -> Matrix3<f64> {
        Matrix3::new(1.2, 0.3, 0.0, -0.1, 0.9, 0.4, 0.2, 0.0, 1.5)
    }

    fn assert_tensor_close(a: &Tensor, b: &Tensor, tol: f64) {
        let diff = (a.matrix() - b.matrix()).norm();
        assert!(diff < tol, "tensors differ by {diff}:\n{a}\n{b}");
    }

    #[test]
    fn selector_rejects_unknown_values() {
        assert_eq!(
            ReorientationMode::from_selector(0).expect("valid"),
            ReorientationMode::FiniteStrain
        );
        assert_eq!(
            ReorientationMode::from_selector(1).expect("valid"),
            ReorientationMode::PreferredDirection
        );
        let err = ReorientationMode::from_selector(2).expect_err("invalid");
        assert!(format!("{err}").contains("reorientation selector 2"));
    }

    #[test]
    fn finite_strain_rotation_of_rotation_is_itself() {
        let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), 0.7).into_inner();
        let extracted = finite_strain_rotation(&rotation).expect("decomposes");
        assert!((extracted - rotation).norm() < 1e-10);
    }

    #[test]
    fn reorientation_preserves_eigenvalues() {
        let t = sample_tensor();
        let f = shear_transform();
        for mode in [ReorientationMode::FiniteStrain, ReorientationMode::PreferredDirection] {
            let out = reorient(&t, &f, mode).expect("reorients");
            let a = t.eigen().values;
            let b = out.eigen().values;
            assert!((a - b).norm() < 1e-10, "{mode:?}");
        }
    }

    #[test]
    fn pdd_aligns_principal_direction_with_transformed_one() {
        let t = Tensor::from_diagonal(Vector3::new(2.0, 0.5, 0.2));
        let f = shear_transform();
        let out = reorient(&t, &f, ReorientationMode::PreferredDirection).expect("reorients");
        let expected = (f * Vector3::x()).normalize();
        let e1 = out.principal_eigenvector();
        assert!((e1.dot(&expected).abs() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn reorientation_inverts_with_inverse_transform() {
        let t = sample_tensor();
        let f = shear_transform();
        let f_inv = f.try_inverse().expect("invertible");
        for mode in [ReorientationMode::FiniteStrain, ReorientationMode::PreferredDirection] {
            let there = reorient(&t, &f, mode).expect("forward");
            let back = reorient(&there, &f_inv, mode).expect("backward");
            assert_tensor_close(&back, &t, 1e-9);
        }
    }

    #[test]
    fn pure_rotation_matches_congruence_in_both_modes() {
        let rotation = Rotation3::from_euler_angles(0.3, -0.2, 1.1).into_inner();
        let t = sample_tensor();
        let expected = t.rotated(&rotation);
        for mode in [ReorientationMode::FiniteStrain, ReorientationMode::PreferredDirection] {
            let out = reorient(&t, &rotation, mode).expect("reorients");
            assert_tensor_close(&out, &expected, 1e-9);
        }
    }

    #[test]
    fn singular_transform_is_rejected() {
        let err = TensorReorienter::new(Matrix3::zeros(), ReorientationMode::FiniteStrain)
            .expect_err("singular");
        assert!(matches!(err, TrackingError::InvalidConfiguration(_)));
    }

    #[test]
    fn affine_inverse_round_trips_points() {
        let affine = AffineTransform::new(shear_transform(), Vector3::new(1.0, -2.0, 0.5));
        let inverse = affine.inverse().expect("invertible");
        let p = Point3::new(0.3, 4.0, -1.0);
        let back = inverse.transform_point(&affine.transform_point(&p));
        assert!((back - p).norm() < 1e-12);
    }

    #[test]
    fn affine_deserializes_row_major() {
        let json = r#"{"matrix": [[1.0, 2.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]}"#;
        let affine: AffineTransform = serde_json::from_str(json).expect("parse");
        assert_eq!(affine.jacobian()[(0, 1)], 2.0);
        assert_eq!(affine.translation(), &Vector3::zeros());
    }
}
