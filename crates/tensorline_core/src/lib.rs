pub mod bundle;
pub mod direction;
pub mod error;
pub mod fiber;
pub mod interpolation;
pub mod reorientation;
pub mod solvers;
pub mod tensor;
/// The `tensorline_core` crate tracks white-matter fibers through a diffusion
/// tensor field and summarizes the resulting bundles.
///
/// Key components:
/// - **Volume**: `ImageGeometry` and `Volume<T>` hold tensor fields, seed masks and counter images.
/// - **Tensor**: symmetric 3x3 diffusion tensors with FA, ADC, eigen-decomposition and matrix log/exp.
/// - **Interpolation/Reorientation**: nearest, trilinear and log-Euclidean sampling; finite-strain and PDD reorientation.
/// - **Tracking**: `FiberTracker` integrates tensorlines (Euler, RK2, RK4) from every seed, in parallel over slices.
/// - **Fiber/Bundle**: fibers with geodesic length, and bundle-wide mean FA, ADC and length.
pub mod traits;
pub mod tracking;
pub mod volume;

pub use bundle::BundleStatistics;
pub use error::{Result, TrackingError};
pub use fiber::{Fiber, FiberPoint};
pub use tensor::Tensor;
pub use tracking::{FiberTracker, StopReason, TrackingOutput, TrackingSettings};
pub use volume::{CounterImage, ImageGeometry, SeedMask, TensorField, Volume};
