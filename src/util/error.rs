//! Error types for the radiance pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for accumulation, tone mapping and export.
#[derive(Error, Debug)]
pub enum Error {
    /// Two accumulators cannot be combined because their aspect ratios differ
    #[error("Image aspect ratios mismatch; {}x{} vs {}x{}", a.0, a.1, b.0, b.1)]
    DimensionMismatch { a: (usize, usize), b: (usize, usize) },

    /// Export requested before any buffer was published
    #[error("No current image")]
    NoCurrentImage,

    /// A recompute was cancelled by a newer request
    #[error("Recalculation interrupted")]
    Interrupted,

    /// Zero-sized or overflowing image dimensions
    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    /// Rejected tone mapping parameter
    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    /// Source file type is not understood
    #[error("Unsupported radiance source: {0}")]
    UnsupportedSource(PathBuf),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Settings (de)serialization error
    #[error("Settings error: {0}")]
    Settings(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create a dimension mismatch error from two `(width, height)` pairs.
    pub fn mismatch(a: (usize, usize), b: (usize, usize)) -> Self {
        Self::DimensionMismatch { a, b }
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;
