//! Resampling accumulators between resolutions of equal aspect ratio.
//!
//! Resampling is area-weighted and separable: every source pixel spreads its
//! sums and weight over the target pixels it overlaps, in proportion to the
//! overlap. Column totals are therefore conserved exactly (up to float
//! rounding), and since weight is resampled with the same kernel as the color
//! channels, `sum / weight` stays unbiased.

use log::debug;
use rayon::prelude::*;

use crate::util::{pixel_count, Error, Result};

use super::RadianceAccumulator;

/// True iff `w1:h1 == w2:h2` exactly.
#[inline]
pub fn aspect_ratio_preserved(w1: usize, h1: usize, w2: usize, h2: usize) -> bool {
    (w1 as u128) * (h2 as u128) == (w2 as u128) * (h1 as u128)
}

/// Resample `src` onto a `target_width x target_height` grid.
///
/// Fails with [`Error::DimensionMismatch`] when the aspect ratio would change.
#[tracing::instrument(skip_all, fields(width = target_width, height = target_height))]
pub fn scale_to(
    src: &RadianceAccumulator,
    target_width: usize,
    target_height: usize,
) -> Result<RadianceAccumulator> {
    let (sw, sh) = src.dimensions();
    if !aspect_ratio_preserved(sw, sh, target_width, target_height) {
        return Err(Error::mismatch((sw, sh), (target_width, target_height)));
    }
    pixel_count(target_width, target_height)?;
    if (sw, sh) == (target_width, target_height) {
        return Ok(src.clone());
    }

    debug!("resampling {}x{} -> {}x{}", sw, sh, target_width, target_height);

    let kernel = Kernel {
        src_width: sw,
        dst_width: target_width,
        dst_height: target_height,
        x: axis_weights(sw, target_width),
        y: axis_weights(sh, target_height),
    };

    RadianceAccumulator::from_parts(
        target_width,
        target_height,
        kernel.resample(src.sum_r()),
        kernel.resample(src.sum_g()),
        kernel.resample(src.sum_b()),
        kernel.resample(src.weight()),
    )
}

/// Per-axis overlap tables for one resampling.
struct Kernel {
    src_width: usize,
    dst_width: usize,
    dst_height: usize,
    /// For each target column: `(source column, fraction of that column)`.
    x: Vec<Vec<(usize, f64)>>,
    /// For each target row: `(source row, fraction of that row)`.
    y: Vec<Vec<(usize, f64)>>,
}

impl Kernel {
    fn resample(&self, channel: &[f32]) -> Vec<f32> {
        let mut out = vec![0.0f32; self.dst_width * self.dst_height];
        out.par_chunks_mut(self.dst_width)
            .enumerate()
            .for_each(|(ty, row)| {
                for (tx, dst) in row.iter_mut().enumerate() {
                    let mut acc = 0.0f64;
                    for &(sy, fy) in &self.y[ty] {
                        let base = sy * self.src_width;
                        for &(sx, fx) in &self.x[tx] {
                            acc += channel[base + sx] as f64 * fx * fy;
                        }
                    }
                    *dst = acc as f32;
                }
            });
        out
    }
}

/// Overlap of source cells with each target cell along one axis.
///
/// The fractions of any one source cell over all target cells sum to 1.
fn axis_weights(src: usize, dst: usize) -> Vec<Vec<(usize, f64)>> {
    // Width of one source cell measured in target cells.
    let scale = dst as f64 / src as f64;
    (0..dst)
        .map(|t| {
            let t0 = t as f64;
            let t1 = t0 + 1.0;
            let first = (t0 / scale).floor() as usize;
            let last = ((t1 / scale).ceil() as usize).min(src);
            (first..last)
                .filter_map(|s| {
                    let lo = (s as f64 * scale).max(t0);
                    let hi = ((s + 1) as f64 * scale).min(t1);
                    let overlap = hi - lo;
                    (overlap > 1e-12).then_some((s, overlap / scale))
                })
                .collect()
        })
        .collect()
}
