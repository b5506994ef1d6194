//! Directional light bleed.
//!
//! Every pixel brighter than `threshold` emits `(v - threshold) * (1 - decay)`
//! into a running carry that sweeps the row (then the column) in both
//! directions, losing `decay` per pixel travelled. A neighbour at distance `d`
//! receives `weight * emit * decay^d`, so a single pixel's total glow along one
//! axis is `2 * weight * decay * (v - threshold)`.
//!
//! The Y pass diffuses the result of the X pass, so bright points grow a soft
//! cross-shaped halo that also fills diagonally.

use rayon::prelude::*;

use crate::util::{CancelToken, Result};

use super::LinearImage;

/// Parameters for [`bleed_xy`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BleedParams {
    /// Carry retained per pixel travelled, in `[0, 1)`
    pub decay: f32,
    /// Intensity below which pixels emit nothing
    pub threshold: f32,
    /// Strength of the horizontal pass
    pub weight_x: f32,
    /// Strength of the vertical pass
    pub weight_y: f32,
}

impl Default for BleedParams {
    fn default() -> Self {
        Self {
            decay: 0.8,
            threshold: 0.01,
            weight_x: 0.5,
            weight_y: 0.5,
        }
    }
}

/// Bleed `source` into `destination`, resizing the destination if needed.
#[tracing::instrument(skip_all)]
pub fn bleed_xy(
    source: &LinearImage,
    params: &BleedParams,
    destination: &mut LinearImage,
    cancel: &CancelToken,
) -> Result<()> {
    let (width, height) = source.dimensions();
    destination.ensure_size(width, height)?;
    let row_len = width * 3;

    destination
        .data_mut()
        .par_chunks_mut(row_len)
        .zip(source.data().par_chunks(row_len))
        .try_for_each(|(dst, src)| -> Result<()> {
            cancel.check()?;
            dst.copy_from_slice(src);
            sweep(src, dst, params.decay, params.threshold, params.weight_x);
            Ok(())
        })?;

    let data = destination.data_mut();
    let mut col_src = vec![0.0f32; height * 3];
    let mut col_dst = vec![0.0f32; height * 3];
    for x in 0..width {
        cancel.check()?;
        for y in 0..height {
            let i = (y * width + x) * 3;
            col_src[y * 3..y * 3 + 3].copy_from_slice(&data[i..i + 3]);
        }
        col_dst.copy_from_slice(&col_src);
        sweep(&col_src, &mut col_dst, params.decay, params.threshold, params.weight_y);
        for y in 0..height {
            let i = (y * width + x) * 3;
            data[i..i + 3].copy_from_slice(&col_dst[y * 3..y * 3 + 3]);
        }
    }
    Ok(())
}

/// Forward and backward carry sweep over interleaved RGB pixels.
///
/// Emission is read from `src`; glow is added onto `dst`.
fn sweep(src: &[f32], dst: &mut [f32], decay: f32, threshold: f32, weight: f32) {
    if weight == 0.0 {
        return;
    }
    let n = src.len() / 3;
    let emit = |v: f32| (v - threshold).max(0.0) * (1.0 - decay);
    for c in 0..3 {
        let mut carry = 0.0f32;
        for i in 0..n {
            let k = i * 3 + c;
            dst[k] += weight * carry;
            carry = decay * (carry + emit(src[k]));
        }
        carry = 0.0;
        for i in (0..n).rev() {
            let k = i * 3 + c;
            dst[k] += weight * carry;
            carry = decay * (carry + emit(src[k]));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(width: usize, height: usize, x: usize, y: usize, v: f32) -> LinearImage {
        let mut img = LinearImage::new(width, height).unwrap();
        let i = (y * width + x) * 3;
        img.data_mut()[i..i + 3].fill(v);
        img
    }

    #[test]
    fn test_point_spreads_symmetrically() {
        let cancel = CancelToken::new();
        let src = point(9, 9, 4, 4, 1.0);
        let mut dst = LinearImage::new(1, 1).unwrap();
        bleed_xy(&src, &BleedParams::default(), &mut dst, &cancel).unwrap();
        assert_eq!(dst.dimensions(), (9, 9));

        let center = dst.rgb(4, 4)[0];
        assert!(center >= 1.0);
        let left = dst.rgb(3, 4)[0];
        let right = dst.rgb(5, 4)[0];
        let up = dst.rgb(4, 3)[0];
        assert!(left > 0.0);
        assert!((left - right).abs() < 1e-6);
        assert!(up > 0.0);
        assert!(dst.rgb(2, 4)[0] < left);
        // Diagonals fill through the second pass.
        assert!(dst.rgb(3, 3)[0] > 0.0);
        // Source untouched.
        assert_eq!(src.rgb(3, 4), [0.0; 3]);
    }

    #[test]
    fn test_row_glow_total() {
        let cancel = CancelToken::new();
        let src = point(128, 1, 64, 0, 1.0);
        let params = BleedParams { weight_y: 0.0, ..Default::default() };
        let mut dst = LinearImage::new(128, 1).unwrap();
        bleed_xy(&src, &params, &mut dst, &cancel).unwrap();
        let total: f32 = dst.data().iter().step_by(3).sum();
        let expected = 1.0 + 2.0 * params.weight_x * params.decay * (1.0 - params.threshold);
        assert!((total - expected).abs() < 1e-3, "{} vs {}", total, expected);
    }

    #[test]
    fn test_threshold_suppresses_dim_pixels() {
        let cancel = CancelToken::new();
        let src = point(5, 5, 2, 2, 0.005);
        let mut dst = LinearImage::new(5, 5).unwrap();
        bleed_xy(&src, &BleedParams::default(), &mut dst, &cancel).unwrap();
        assert_eq!(dst, src);
    }

    #[test]
    fn test_deterministic() {
        let cancel = CancelToken::new();
        let src = point(7, 5, 1, 3, 3.0);
        let mut a = LinearImage::new(7, 5).unwrap();
        let mut b = LinearImage::new(7, 5).unwrap();
        bleed_xy(&src, &BleedParams::default(), &mut a, &cancel).unwrap();
        bleed_xy(&src, &BleedParams::default(), &mut b, &cancel).unwrap();
        assert_eq!(a, b);
    }
}
