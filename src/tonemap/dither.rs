//! Ordered dithering thresholds.
//!
//! A 4x4 Bayer matrix tiles the image. Each entry is an offset in `[0, 1)`
//! added to the scaled channel value before truncation, which spreads
//! quantization error spatially without any state carried between pixels or
//! frames.

const BAYER_4X4: [[u8; 4]; 4] = [
    [0, 8, 2, 10],
    [12, 4, 14, 6],
    [3, 11, 1, 9],
    [15, 7, 13, 5],
];

/// Threshold offset for pixel `(x, y)`, in `[0, 1)`.
#[inline]
pub fn threshold(x: usize, y: usize) -> f32 {
    (BAYER_4X4[y & 3][x & 3] as f32 + 0.5) / 16.0
}

/// Quantize a display-linear value in `[0, 1]` to `0..=255`.
///
/// Without dithering the value is rounded to nearest; with dithering the
/// per-pixel threshold decides the rounding direction.
#[inline]
pub fn quantize(value: f32, dither: Option<f32>) -> u8 {
    let scaled = value * 255.0;
    let q = match dither {
        Some(offset) => (scaled + offset).floor(),
        None => scaled.round(),
    };
    // NaN saturates to 0 through the cast.
    q.clamp(0.0, 255.0) as u8
}
