use thiserror::Error;

/// Failures reported by the tracking library.
///
/// `OutOfBounds` and `DegenerateTensor` only ever end a single tracking
/// direction; the tracer turns them into stop reasons. Configuration and
/// geometry errors are raised before any seed is tracked.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackingError {
    #[error("Position lies outside the tensor field.")]
    OutOfBounds,

    #[error("Tensor is degenerate (zero, non-finite or without a principal direction).")]
    DegenerateTensor,

    #[error("Cannot compute statistics over a fiber with no points.")]
    EmptyFiberStatistics,

    #[error("Bundle contains no fibers with points.")]
    EmptyBundle,

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Geometry mismatch: {0}")]
    GeometryMismatch(String),
}

pub type Result<T> = std::result::Result<T, TrackingError>;
