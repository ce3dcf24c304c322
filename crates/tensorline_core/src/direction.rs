//! Tensorline propagation direction.

use crate::error::{Result, TrackingError};
use crate::tensor::Tensor;
use nalgebra::Vector3;

/// Relative gap between the two largest eigenvalues below which the
/// principal direction is considered undefined.
const EIGEN_GAP_TOLERANCE: f64 = 1e-9;

fn check_tensor(tensor: &Tensor) -> Result<()> {
    if !tensor.is_finite() || tensor.is_zero() {
        return Err(TrackingError::DegenerateTensor);
    }
    Ok(())
}

/// Principal eigenvector, unsigned. Used to pick the two initial directions
/// at a seed.
pub fn initial_direction(tensor: &Tensor) -> Result<Vector3<f64>> {
    check_tensor(tensor)?;
    let eig = tensor.eigen();
    if eig.principal_value() <= 0.0 {
        return Err(TrackingError::DegenerateTensor);
    }
    eig.principal_vector()
        .try_normalize(f64::EPSILON)
        .ok_or(TrackingError::DegenerateTensor)
}

/// Principal eigenvector signed to agree with `incoming`. When the two
/// largest eigenvalues coincide the eigenvector is arbitrary and `incoming`
/// itself is returned.
pub fn principal_direction(tensor: &Tensor, incoming: &Vector3<f64>) -> Result<Vector3<f64>> {
    check_tensor(tensor)?;
    let eig = tensor.eigen();
    let l1 = eig.principal_value();
    if l1 <= 0.0 {
        return Err(TrackingError::DegenerateTensor);
    }
    if (l1 - eig.values[1]) <= EIGEN_GAP_TOLERANCE * l1 {
        return incoming
            .try_normalize(f64::EPSILON)
            .ok_or(TrackingError::DegenerateTensor);
    }
    let e1 = eig.principal_vector();
    Ok(if e1.dot(incoming) < 0.0 { -e1 } else { e1 })
}

/// Weinstein tensorline direction: `(1 - s) e1 + s normalize(T v)`,
/// normalized, with `e1` signed along `v`. `s = 0` follows the principal
/// eigenvector, `s = 1` follows the tensor-deflected incoming direction.
pub fn next_direction(tensor: &Tensor, incoming: &Vector3<f64>, smoothness: f64) -> Result<Vector3<f64>> {
    let e1 = principal_direction(tensor, incoming)?;
    if smoothness <= 0.0 {
        return Ok(e1);
    }
    let deflected = tensor
        .apply(incoming)
        .try_normalize(f64::EPSILON)
        .ok_or(TrackingError::DegenerateTensor)?;
    (e1 * (1.0 - smoothness) + deflected * smoothness)
        .try_normalize(f64::EPSILON)
        .ok_or(TrackingError::DegenerateTensor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Rotation3;

    fn prolate_along(axis: &Vector3<f64>) -> Tensor {
        let a = axis.normalize();
        let m = a * a.transpose() * 1.5 + nalgebra::Matrix3::identity() * 0.2;
        Tensor::from_matrix(m)
    }

    #[test]
    fn principal_direction_follows_incoming_sign() {
        let t = prolate_along(&Vector3::x());
        let forward = principal_direction(&t, &Vector3::new(0.9, 0.1, 0.0)).expect("defined");
        assert!((forward - Vector3::x()).norm() < 1e-10);
        let backward = principal_direction(&t, &Vector3::new(-0.9, 0.1, 0.0)).expect("defined");
        assert!((backward + Vector3::x()).norm() < 1e-10);
    }

    #[test]
    fn isotropic_tensor_keeps_incoming_direction() {
        let incoming = Vector3::new(0.0, 3.0, 4.0);
        let d = next_direction(&Tensor::identity(), &incoming, 0.0).expect("defined");
        assert!((d - Vector3::new(0.0, 0.6, 0.8)).norm() < 1e-12);
    }

    #[test]
    fn zero_tensor_is_degenerate() {
        let err = next_direction(&Tensor::zeros(), &Vector3::x(), 0.5).expect_err("degenerate");
        assert_eq!(err, TrackingError::DegenerateTensor);
        assert!(initial_direction(&Tensor::zeros()).is_err());
    }

    #[test]
    fn smoothness_blends_eigenvector_and_deflection() {
        let t = prolate_along(&Vector3::x());
        let incoming = Vector3::new(1.0, 1.0, 0.0).normalize();

        let pure_e1 = next_direction(&t, &incoming, 0.0).expect("defined");
        assert!((pure_e1 - Vector3::x()).norm() < 1e-10);

        let pure_deflection = next_direction(&t, &incoming, 1.0).expect("defined");
        let expected = t.apply(&incoming).normalize();
        assert!((pure_deflection - expected).norm() < 1e-10);

        let half = next_direction(&t, &incoming, 0.5).expect("defined");
        let expected = (Vector3::x() * 0.5 + expected * 0.5).normalize();
        assert!((half - expected).norm() < 1e-10);
        assert!((half.norm() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn no_reversal_along_slowly_rotating_field() {
        let mut incoming = Vector3::x();
        for step in 0..200 {
            let angle = step as f64 * 0.05;
            let axis = Rotation3::from_axis_angle(&Vector3::z_axis(), angle) * Vector3::x();
            let t = prolate_along(&axis);
            let next = next_direction(&t, &incoming, 0.2).expect("defined");
            assert!(next.dot(&incoming) > 0.0, "reversal at step {step}");
            incoming = next;
        }
    }
}
