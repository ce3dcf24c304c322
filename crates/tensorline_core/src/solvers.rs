use crate::error::{Result, TrackingError};
use crate::traits::{DirectionField, Integrator};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// First order Euler: `x + h ⊙ v`.
pub struct Euler;

/// Second order Runge-Kutta (midpoint rule).
pub struct MidpointRK2;

/// Classic Runge-Kutta 4th order.
pub struct RK4;

fn advance(position: &Point3<f64>, direction: &Vector3<f64>, h: &Vector3<f64>, scale: f64) -> Point3<f64> {
    position + direction.component_mul(h) * scale
}

impl Integrator for Euler {
    fn step(
        &self,
        _field: &impl DirectionField,
        position: &Point3<f64>,
        direction: &Vector3<f64>,
        h: &Vector3<f64>,
    ) -> Result<Point3<f64>> {
        Ok(advance(position, direction, h, 1.0))
    }
}

impl Integrator for MidpointRK2 {
    fn step(
        &self,
        field: &impl DirectionField,
        position: &Point3<f64>,
        direction: &Vector3<f64>,
        h: &Vector3<f64>,
    ) -> Result<Point3<f64>> {
        // k2 = v(x + h*k1/2)
        let midpoint = advance(position, direction, h, 0.5);
        let k2 = field.direction_at(&midpoint, direction)?;
        Ok(advance(position, &k2, h, 1.0))
    }
}

impl Integrator for RK4 {
    fn step(
        &self,
        field: &impl DirectionField,
        position: &Point3<f64>,
        direction: &Vector3<f64>,
        h: &Vector3<f64>,
    ) -> Result<Point3<f64>> {
        let k1 = *direction;

        // k2 = v(x + h*k1/2)
        let k2 = field.direction_at(&advance(position, &k1, h, 0.5), &k1)?;

        // k3 = v(x + h*k2/2)
        let k3 = field.direction_at(&advance(position, &k2, h, 0.5), &k2)?;

        // k4 = v(x + h*k3)
        let k4 = field.direction_at(&advance(position, &k3, h, 1.0), &k3)?;

        // x_next = x + h/6 * (k1 + 2k2 + 2k3 + k4)
        let combined = (k1 + k2 * 2.0 + k3 * 2.0 + k4) / 6.0;
        Ok(advance(position, &combined, h, 1.0))
    }
}

/// Integration scheme selected by the integer `integration_method` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegrationMethod {
    Euler,
    RungeKutta2,
    RungeKutta4,
}

impl TryFrom<i32> for IntegrationMethod {
    type Error = TrackingError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(IntegrationMethod::Euler),
            1 => Ok(IntegrationMethod::RungeKutta2),
            2 => Ok(IntegrationMethod::RungeKutta4),
            other => Err(TrackingError::InvalidConfiguration(format!(
                "unknown integration method {other} (expected 0 = Euler, 1 = RK2, 2 = RK4)"
            ))),
        }
    }
}

impl IntegrationMethod {
    pub fn step(
        self,
        field: &impl DirectionField,
        position: &Point3<f64>,
        direction: &Vector3<f64>,
        h: &Vector3<f64>,
    ) -> Result<Point3<f64>> {
        match self {
            IntegrationMethod::Euler => Euler.step(field, position, direction, h),
            IntegrationMethod::RungeKutta2 => MidpointRK2.step(field, position, direction, h),
            IntegrationMethod::RungeKutta4 => RK4.step(field, position, direction, h),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Rotation about the z axis: v(x) = (-y, x, 0) normalized.
    struct Circular;

    impl DirectionField for Circular {
        fn direction_at(&self, index: &Point3<f64>, _incoming: &Vector3<f64>) -> Result<Vector3<f64>> {
            Vector3::new(-index.y, index.x, 0.0)
                .try_normalize(1e-12)
                .ok_or(TrackingError::DegenerateTensor)
        }
    }

    struct Uniform(Vector3<f64>);

    impl DirectionField for Uniform {
        fn direction_at(&self, _index: &Point3<f64>, _incoming: &Vector3<f64>) -> Result<Vector3<f64>> {
            Ok(self.0)
        }
    }

    struct Wall;

    impl DirectionField for Wall {
        fn direction_at(&self, index: &Point3<f64>, _incoming: &Vector3<f64>) -> Result<Vector3<f64>> {
            if index.x > 0.1 {
                Err(TrackingError::OutOfBounds)
            } else {
                Ok(Vector3::x())
            }
        }
    }

    const METHODS: [IntegrationMethod; 3] = [
        IntegrationMethod::Euler,
        IntegrationMethod::RungeKutta2,
        IntegrationMethod::RungeKutta4,
    ];

    #[test]
    fn selector_maps_integers() {
        assert_eq!(IntegrationMethod::try_from(0).expect("valid"), IntegrationMethod::Euler);
        assert_eq!(IntegrationMethod::try_from(2).expect("valid"), IntegrationMethod::RungeKutta4);
        let err = IntegrationMethod::try_from(3).expect_err("invalid");
        assert!(format!("{err}").contains("unknown integration method 3"));
    }

    #[test]
    fn all_schemes_agree_on_uniform_field() {
        let dir = Vector3::new(0.6, 0.8, 0.0);
        let h = Vector3::new(0.5, 0.25, 1.0);
        let start = Point3::new(1.0, 2.0, 3.0);
        for method in METHODS {
            let next = method.step(&Uniform(dir), &start, &dir, &h).expect("step");
            assert!((next - Point3::new(1.3, 2.2, 3.0)).norm() < 1e-12, "{method:?}");
        }
    }

    #[test]
    fn higher_order_schemes_stay_closer_to_circle() {
        let h = Vector3::new(0.1, 0.1, 0.1);
        let mut errors = Vec::new();
        for method in METHODS {
            let mut pos = Point3::new(1.0, 0.0, 0.0);
            let mut dir = Vector3::new(0.0, 1.0, 0.0);
            for _ in 0..50 {
                pos = method.step(&Circular, &pos, &dir, &h).expect("step");
                dir = Circular.direction_at(&pos, &dir).expect("direction");
            }
            let radius = (pos.x * pos.x + pos.y * pos.y).sqrt();
            errors.push((radius - 1.0).abs());
        }
        assert!(errors[1] < errors[0]);
        assert!(errors[2] < errors[1]);
        assert!(errors[2] < 1e-6);
    }

    #[test]
    fn failed_stage_aborts_step() {
        let h = Vector3::new(0.15, 0.15, 0.15);
        let start = Point3::new(0.0, 0.0, 0.0);
        assert!(Euler.step(&Wall, &start, &Vector3::x(), &h).is_ok());
        assert_eq!(
            RK4.step(&Wall, &start, &Vector3::x(), &h).expect_err("leaves field"),
            TrackingError::OutOfBounds
        );
    }
}
