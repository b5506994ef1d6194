//! Display-linear float image.
//!
//! Three interleaved `f32` channels per pixel. Each stage walks rows in
//! parallel and checks the cancel token once per row, so a stale pass can be
//! abandoned quickly even on large images.

use rayon::prelude::*;

use crate::accum::RadianceAccumulator;
use crate::util::{pixel_count, CancelToken, Result};

use super::dither;

/// Pixels at or below this weight were never sampled and render black.
const MIN_WEIGHT: f32 = 1e-12;

/// Opaque alpha in packed ARGB.
const ALPHA: u32 = 0xFF00_0000;

/// Radiance after normalization, exposure and gamma; before quantization.
#[derive(Clone, Debug, PartialEq)]
pub struct LinearImage {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl Default for LinearImage {
    /// A single black pixel.
    fn default() -> Self {
        Self { width: 1, height: 1, data: vec![0.0; 3] }
    }
}

impl LinearImage {
    pub fn new(width: usize, height: usize) -> Result<Self> {
        let len = pixel_count(width, height)?;
        Ok(Self { width, height, data: vec![0.0; len * 3] })
    }

    /// Build from interleaved RGB data; the length must be `width * height * 3`.
    pub fn from_rgb(width: usize, height: usize, data: Vec<f32>) -> Result<Self> {
        let len = pixel_count(width, height)?;
        if data.len() != len * 3 {
            return Err(crate::util::Error::other(format!(
                "expected {} values for {}x{} RGB, got {}",
                len * 3,
                width,
                height,
                data.len()
            )));
        }
        Ok(Self { width, height, data })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Interleaved RGB values.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// RGB at a pixel.
    pub fn rgb(&self, x: usize, y: usize) -> [f32; 3] {
        let i = (y * self.width + x) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    /// Resize in place, reusing the allocation where possible.
    pub fn ensure_size(&mut self, width: usize, height: usize) -> Result<()> {
        if self.dimensions() == (width, height) {
            return Ok(());
        }
        let len = pixel_count(width, height)?;
        self.width = width;
        self.height = height;
        self.data.clear();
        self.data.resize(len * 3, 0.0);
        Ok(())
    }

    #[inline]
    fn row_len(&self) -> usize {
        self.width * 3
    }

    /// Run `f(y, row)` over all rows in parallel, stopping early on cancel.
    fn for_each_row<F>(&mut self, cancel: &CancelToken, f: F) -> Result<()>
    where
        F: Fn(usize, &mut [f32]) + Sync + Send,
    {
        let row_len = self.row_len();
        self.data
            .par_chunks_mut(row_len)
            .enumerate()
            .try_for_each(|(y, row)| {
                cancel.check()?;
                f(y, row);
                Ok(())
            })
    }

    /// Normalize accumulated sums: `sum / weight`, black where unsampled.
    ///
    /// The accumulator must have the same dimensions as this image.
    #[tracing::instrument(skip_all)]
    pub fn load(&mut self, acc: &RadianceAccumulator, cancel: &CancelToken) -> Result<()> {
        if acc.dimensions() != self.dimensions() {
            return Err(crate::util::Error::mismatch(acc.dimensions(), self.dimensions()));
        }
        let width = self.width;
        let (r, g, b, w) = (acc.sum_r(), acc.sum_g(), acc.sum_b(), acc.weight());
        self.for_each_row(cancel, |y, row| {
            let base = y * width;
            for (x, px) in row.chunks_exact_mut(3).enumerate() {
                let i = base + x;
                let weight = w[i];
                if weight > MIN_WEIGHT {
                    px[0] = r[i] / weight;
                    px[1] = g[i] / weight;
                    px[2] = b[i] / weight;
                } else {
                    px.fill(0.0);
                }
            }
        })
    }

    /// Multiply every channel by `factor`.
    #[tracing::instrument(skip_all)]
    pub fn multiply(&mut self, factor: f32, cancel: &CancelToken) -> Result<()> {
        if factor == 1.0 {
            return Ok(());
        }
        self.for_each_row(cancel, |_, row| row.iter_mut().for_each(|v| *v *= factor))
    }

    /// Raise every channel to `power`; negative values become 0 first.
    #[tracing::instrument(skip_all)]
    pub fn exponentiate(&mut self, power: f32, cancel: &CancelToken) -> Result<()> {
        self.for_each_row(cancel, |_, row| {
            for v in row.iter_mut() {
                let clamped = v.max(0.0);
                *v = if power == 1.0 { clamped } else { clamped.powf(power) };
            }
        })
    }

    /// Quantize into packed `0xAARRGGBB` pixels.
    #[tracing::instrument(skip_all)]
    pub fn to_argb(&self, out: &mut Vec<u32>, dither: bool, cancel: &CancelToken) -> Result<()> {
        let width = self.width;
        out.clear();
        out.resize(self.width * self.height, 0);
        out.par_chunks_mut(width)
            .zip(self.data.par_chunks(self.row_len()))
            .enumerate()
            .try_for_each(|(y, (dst, src))| {
                cancel.check()?;
                for (x, (pixel, rgb)) in dst.iter_mut().zip(src.chunks_exact(3)).enumerate() {
                    let offset = dither.then(|| dither::threshold(x, y));
                    let r = dither::quantize(rgb[0], offset) as u32;
                    let g = dither::quantize(rgb[1], offset) as u32;
                    let b = dither::quantize(rgb[2], offset) as u32;
                    *pixel = ALPHA | (r << 16) | (g << 8) | b;
                }
                Ok(())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acc_2x2(sum: f32, weight: f32) -> RadianceAccumulator {
        let channel = || vec![sum; 4];
        RadianceAccumulator::from_parts(2, 2, channel(), channel(), channel(), vec![weight; 4])
            .unwrap()
    }

    #[test]
    fn test_load_normalizes() {
        let cancel = CancelToken::new();
        let mut acc = RadianceAccumulator::new(2, 1).unwrap();
        acc.deposit(0, 0, 3.0, 6.0, 9.0, 3.0);
        let mut img = LinearImage::new(2, 1).unwrap();
        img.load(&acc, &cancel).unwrap();
        assert_eq!(img.rgb(0, 0), [1.0, 2.0, 3.0]);
        assert_eq!(img.rgb(1, 0), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_load_zero_weight_is_black() {
        let cancel = CancelToken::new();
        let acc = RadianceAccumulator::from_parts(1, 1, vec![5.0], vec![5.0], vec![5.0], vec![0.0])
            .unwrap();
        let mut img = LinearImage::new(1, 1).unwrap();
        img.load(&acc, &cancel).unwrap();
        img.multiply(100.0, &cancel).unwrap();
        img.exponentiate(1.0 / 0.5, &cancel).unwrap();
        let mut out = Vec::new();
        img.to_argb(&mut out, true, &cancel).unwrap();
        assert_eq!(out, vec![0xFF00_0000]);
    }

    #[test]
    fn test_load_dimension_check() {
        let cancel = CancelToken::new();
        let mut img = LinearImage::new(3, 3).unwrap();
        assert!(img.load(&acc_2x2(1.0, 1.0), &cancel).is_err());
    }

    #[test]
    fn test_exponentiate_clamps_negative() {
        let cancel = CancelToken::new();
        let mut img = LinearImage::from_rgb(1, 1, vec![-0.5, 0.25, 4.0]).unwrap();
        img.exponentiate(0.5, &cancel).unwrap();
        assert_eq!(img.rgb(0, 0), [0.0, 0.5, 2.0]);
    }

    #[test]
    fn test_to_argb_white() {
        let cancel = CancelToken::new();
        let mut img = LinearImage::new(2, 2).unwrap();
        img.load(&acc_2x2(1.0, 1.0), &cancel).unwrap();
        img.exponentiate(1.0, &cancel).unwrap();
        let mut out = Vec::new();
        img.to_argb(&mut out, false, &cancel).unwrap();
        assert_eq!(out, vec![0xFFFF_FFFF; 4]);
    }

    #[test]
    fn test_ensure_size() {
        let mut img = LinearImage::new(2, 2).unwrap();
        img.data_mut()[0] = 1.0;
        img.ensure_size(2, 2).unwrap();
        assert_eq!(img.data()[0], 1.0);
        img.ensure_size(3, 1).unwrap();
        assert_eq!(img.dimensions(), (3, 1));
        assert_eq!(img.data(), &[0.0; 9]);
    }

    #[test]
    fn test_cancelled_stage_returns_interrupted() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut img = LinearImage::new(4, 4).unwrap();
        let err = img.multiply(2.0, &cancel).unwrap_err();
        assert!(matches!(err, crate::util::Error::Interrupted));
    }
}
