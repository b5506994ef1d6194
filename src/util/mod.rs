//! Utility types and functions.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - [`CancelToken`] - Cooperative cancellation
//! - [`pixel_count`] - Checked image area

mod cancel;
mod error;

pub use cancel::CancelToken;
pub use error::*;

/// Number of pixels in a `width x height` image.
///
/// Fails for zero-sized or overflowing dimensions.
pub fn pixel_count(width: usize, height: usize) -> Result<usize> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidDimensions { width, height });
    }
    width
        .checked_mul(height)
        .ok_or(Error::InvalidDimensions { width, height })
}
