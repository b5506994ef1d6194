//! Radiance accumulation and exposure combination.
//!
//! - [`RadianceAccumulator`] - per-pixel sums and sample weights
//! - [`scale_to`] / [`aspect_ratio_preserved`] - resolution changes
//! - [`ExposureMerge`] - weighted multi-source merge

mod accumulator;
mod merge;
mod scaler;

pub use accumulator::RadianceAccumulator;
pub use merge::ExposureMerge;
pub use scaler::{aspect_ratio_preserved, scale_to};

use std::sync::Arc;
use parking_lot::RwLock;

/// Accumulator shared between a sample producer and the recalculation worker.
pub type SharedAccumulator = Arc<RwLock<RadianceAccumulator>>;

/// Wrap an accumulator for sharing.
pub fn share(acc: RadianceAccumulator) -> SharedAccumulator {
    Arc::new(RwLock::new(acc))
}
