//! Getting radiance into the pipeline.
//!
//! - [`trace_dump`] - live sample record streams
//! - [`radiance_file`] - whole HDR images

pub mod radiance_file;
pub mod trace_dump;

pub use radiance_file::{from_rgb32f, is_radiance_file, load_radiance_file};
pub use trace_dump::{follow, FollowStats, SampleRecord, TraceReader};

use std::path::Path;

/// Scene name for export prefixes: the file name without its extension.
pub fn scene_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string())
}
