//! Errors reported at the call boundary. Per-ray problems (misses,
//! degenerate directions, empty CDF intervals) are never errors; only
//! invalid shared configuration, cancellation and I/O are.

// std
use std::io;
// others
use thiserror::Error;
// ngp
use crate::core::ngp::Float;

#[derive(Debug, Error)]
pub enum NgpError {
    #[error("only degrees 0, 1, 2, and 3 are supported (requested {0})")]
    InvalidShDegree(u32),
    #[error(
        "number of sh coefficients ({found}) does not match the expected count \
         ({expected}) for requested degree ({degree})"
    )]
    ShCoefficientMismatch {
        found: usize,
        expected: usize,
        degree: u32,
    },
    #[error("scene bound must be positive and finite, got {0}")]
    InvalidBound(Float),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("{origins} ray origins but {directions} ray directions")]
    RayBatchMismatch { origins: usize, directions: usize },
    #[error("rendering cancelled at step {step}")]
    Cancelled { step: u32 },
    #[error("invalid occupancy grid state: {0}")]
    InvalidState(String),
    #[error("scene description: {0}")]
    Parse(String),
    #[error("a render worker thread panicked")]
    WorkerPanic,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, NgpError>;
