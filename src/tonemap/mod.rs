//! Tone mapping: accumulated radiance to display pixels.
//!
//! The fixed pipeline is normalize -> exposure -> gamma -> optional bleed ->
//! dither/quantize. [`Pipeline`] owns the working memory for it; the result of
//! a run is an immutable [`DisplayBuffer`].

mod bleed;
mod display;
mod dither;
mod linear;
mod pipeline;
mod settings;

pub use bleed::{bleed_xy, BleedParams};
pub use display::{export_file_name, export_prefix, new_output_file, DisplayBuffer};
pub use dither::{quantize, threshold as dither_threshold};
pub use linear::LinearImage;
pub use pipeline::Pipeline;
pub use settings::{ToneSettings, COARSE_STEP, FINE_STEP};
