use crate::error::{Result, TrackingError};
use crate::fiber::Fiber;
use serde::{Deserialize, Serialize};

/// Bundle-wide averages of per-fiber statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BundleStatistics {
    /// Fibers that contributed (fibers without points are skipped).
    pub fiber_count: usize,
    pub mean_fa: f64,
    pub mean_adc: f64,
    /// Mean geodesic length.
    pub mean_length: f64,
}

impl BundleStatistics {
    /// Arithmetic means, across fibers, of each fiber's mean FA, mean ADC and
    /// length.
    pub fn compute(fibers: &[Fiber]) -> Result<Self> {
        let mut count = 0usize;
        let mut fa = 0.0;
        let mut adc = 0.0;
        let mut length = 0.0;

        for fiber in fibers.iter().filter(|f| !f.is_empty()) {
            fa += fiber.mean_fa()?;
            adc += fiber.mean_adc()?;
            length += fiber.length();
            count += 1;
        }

        if count == 0 {
            return Err(TrackingError::EmptyBundle);
        }

        let n = count as f64;
        Ok(Self {
            fiber_count: count,
            mean_fa: fa / n,
            mean_adc: adc / n,
            mean_length: length / n,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fiber::FiberPoint;
    use crate::tensor::Tensor;
    use nalgebra::{Point3, Vector3};

    fn fiber_with(tensors: &[Tensor]) -> Fiber {
        Fiber::from_points(
            tensors
                .iter()
                .enumerate()
                .map(|(i, t)| FiberPoint::new(Point3::new(i as f64, 0.0, 0.0), *t))
                .collect(),
        )
    }

    #[test]
    fn averages_per_fiber_means() {
        let linear = Tensor::from_diagonal(Vector3::new(3.0, 0.0, 0.0));
        let iso = Tensor::identity();
        // Fiber means: FA 1.0 and 0.5; ADC 1.0 and (1 + 1) / 2 = 1.0.
        let a = fiber_with(&[linear, linear]);
        let b = fiber_with(&[linear, iso, linear, iso]);
        let stats = BundleStatistics::compute(&[a.clone(), b.clone()]).expect("non-empty");
        assert_eq!(stats.fiber_count, 2);
        assert!((stats.mean_fa - 0.75).abs() < 1e-12);
        assert!((stats.mean_adc - 1.0).abs() < 1e-12);
        let expected_length = (a.length() + b.length()) / 2.0;
        assert!((stats.mean_length - expected_length).abs() < 1e-12);
    }

    #[test]
    fn empty_fibers_are_skipped() {
        let a = fiber_with(&[Tensor::identity(), Tensor::identity()]);
        let stats = BundleStatistics::compute(&[Fiber::new(), a]).expect("one fiber");
        assert_eq!(stats.fiber_count, 1);
        assert!((stats.mean_length - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_bundle_is_an_error() {
        assert_eq!(BundleStatistics::compute(&[]), Err(TrackingError::EmptyBundle));
        assert_eq!(
            BundleStatistics::compute(&[Fiber::new()]),
            Err(TrackingError::EmptyBundle)
        );
    }
}
