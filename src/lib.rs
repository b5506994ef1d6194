//! # hdr-adjust
//!
//! Accumulates HDR radiance samples from an offline renderer, merges exposures
//! of differing resolution, and keeps a tone-mapped display buffer up to date
//! in the background while settings and data change.
//!
//! ## Modules
//!
//! - [`util`] - Errors, cancellation
//! - [`accum`] - Radiance accumulation, resampling, exposure merge
//! - [`tonemap`] - Normalize, exposure, gamma, bleed, dither/quantize
//! - [`adjuster`] - Background recalculation and the settings/output surface
//! - [`ingest`] - Trace dump streams and HDR image files
//!
//! ## Example
//!
//! ```ignore
//! use hdr_adjust::prelude::*;
//! use std::time::Duration;
//!
//! let acc = share(load_radiance_file("render.exr".as_ref())?);
//! let adjuster = Adjuster::new(ToneSettings::default())?;
//! adjuster.set_accumulator(acc);
//! adjuster.set_visible(true);
//! adjuster.set_exposure(2.0)?;
//!
//! if let Some(buffer) = adjuster.wait_until_current(Duration::from_secs(5)) {
//!     println!("{}x{}", buffer.width(), buffer.height());
//! }
//! ```

pub mod util;
pub mod accum;
pub mod tonemap;
pub mod adjuster;
pub mod ingest;

// Re-export commonly used types
pub use util::{Error, Result};
pub use accum::{RadianceAccumulator, SharedAccumulator};
pub use adjuster::Adjuster;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{CancelToken, Error, Result};
    pub use crate::accum::{
        aspect_ratio_preserved, scale_to, share, ExposureMerge, RadianceAccumulator,
        SharedAccumulator,
    };
    pub use crate::tonemap::{BleedParams, DisplayBuffer, Pipeline, ToneSettings};
    pub use crate::adjuster::{Adjuster, AdjusterEvent};
    pub use crate::ingest::{follow, load_radiance_file, SampleRecord};
}
