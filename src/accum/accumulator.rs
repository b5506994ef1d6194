//! Per-pixel radiance sums and sample weights.

use crate::util::{pixel_count, Error, Result};

use super::scaler::{aspect_ratio_preserved, scale_to};

/// Dense per-pixel accumulation of sampled color and sample weight.
///
/// Values are not normalized: displayed radiance is `sum / weight`.
/// The four channel arrays always have `width * height` entries.
#[derive(Clone, Debug, PartialEq)]
pub struct RadianceAccumulator {
    width: usize,
    height: usize,
    r: Vec<f32>,
    g: Vec<f32>,
    b: Vec<f32>,
    weight: Vec<f32>,
}

impl RadianceAccumulator {
    /// Create a zeroed accumulator.
    pub fn new(width: usize, height: usize) -> Result<Self> {
        let len = pixel_count(width, height)?;
        Ok(Self {
            width,
            height,
            r: vec![0.0; len],
            g: vec![0.0; len],
            b: vec![0.0; len],
            weight: vec![0.0; len],
        })
    }

    /// Build an accumulator from existing channel arrays.
    ///
    /// Every array must hold exactly `width * height` values.
    pub fn from_parts(
        width: usize,
        height: usize,
        r: Vec<f32>,
        g: Vec<f32>,
        b: Vec<f32>,
        weight: Vec<f32>,
    ) -> Result<Self> {
        let len = pixel_count(width, height)?;
        if [r.len(), g.len(), b.len(), weight.len()].iter().any(|&l| l != len) {
            return Err(Error::other(format!(
                "channel arrays do not match {}x{} ({} pixels)",
                width, height, len
            )));
        }
        Ok(Self { width, height, r, g, b, weight })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// `(width, height)` pair.
    #[inline]
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.weight.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.weight.is_empty()
    }

    pub fn sum_r(&self) -> &[f32] {
        &self.r
    }

    pub fn sum_g(&self) -> &[f32] {
        &self.g
    }

    pub fn sum_b(&self) -> &[f32] {
        &self.b
    }

    pub fn weight(&self) -> &[f32] {
        &self.weight
    }

    /// Sums and weight at a pixel as `[r, g, b, weight]`.
    pub fn pixel(&self, x: usize, y: usize) -> Option<[f32; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = y * self.width + x;
        Some([self.r[i], self.g[i], self.b[i], self.weight[i]])
    }

    #[inline]
    fn index(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        Some(y as usize * self.width + x as usize)
    }

    /// Add one sample at pixel `(x, y)`.
    ///
    /// Coordinates outside the frame, negative or non-finite weights and
    /// non-finite radiance are dropped silently.
    /// Returns whether the sample landed.
    pub fn deposit(&mut self, x: i64, y: i64, r: f32, g: f32, b: f32, weight: f32) -> bool {
        let finite = r.is_finite() && g.is_finite() && b.is_finite() && weight.is_finite();
        if !finite || weight < 0.0 {
            return false;
        }
        let Some(i) = self.index(x, y) else {
            return false;
        };
        self.r[i] += r;
        self.g[i] += g;
        self.b[i] += b;
        self.weight[i] += weight;
        true
    }

    /// Add one sample at a normalized film position (`0..1` on both axes).
    pub fn deposit_sample(
        &mut self,
        nx: f32,
        ny: f32,
        weight: f32,
        r: f32,
        g: f32,
        b: f32,
    ) -> bool {
        if !nx.is_finite() || !ny.is_finite() {
            return false;
        }
        let x = (nx as f64 * self.width as f64).floor() as i64;
        let y = (ny as f64 * self.height as f64).floor() as i64;
        self.deposit(x, y, r, g, b, weight)
    }

    /// Multiply all sums and weights by `factor`.
    ///
    /// `factor` must be finite and non-negative; nothing changes otherwise.
    pub fn scale(&mut self, factor: f32) -> Result<()> {
        check_factor(factor)?;
        for channel in [&mut self.r, &mut self.g, &mut self.b, &mut self.weight] {
            channel.iter_mut().for_each(|v| *v *= factor);
        }
        Ok(())
    }

    /// Element-wise add another accumulator of identical dimensions.
    pub fn add(&mut self, other: &RadianceAccumulator) -> Result<()> {
        if self.dimensions() != other.dimensions() {
            return Err(Error::mismatch(self.dimensions(), other.dimensions()));
        }
        add_into(&mut self.r, &other.r);
        add_into(&mut self.g, &other.g);
        add_into(&mut self.b, &other.b);
        add_into(&mut self.weight, &other.weight);
        Ok(())
    }

    /// Scale `other` by `weight` and merge it into `self`.
    ///
    /// Accumulators of different resolution are combined at the resolution of
    /// the wider one, resampling the other; their aspect ratios must match.
    /// On error `self` is left untouched.
    pub fn combine(&mut self, other: &RadianceAccumulator, weight: f32) -> Result<()> {
        check_factor(weight)?;
        let (w, h) = self.dimensions();
        let (ow, oh) = other.dimensions();
        if !aspect_ratio_preserved(w, h, ow, oh) {
            return Err(Error::mismatch((w, h), (ow, oh)));
        }

        let mut incoming = other.clone();
        incoming.scale(weight)?;

        if (w, h) == (ow, oh) {
            return self.add(&incoming);
        }

        if ow > w {
            let mut merged = scale_to(self, ow, oh)?;
            merged.add(&incoming)?;
            *self = merged;
        } else {
            let resized = scale_to(&incoming, w, h)?;
            self.add(&resized)?;
        }
        Ok(())
    }

    /// Channel totals as `[r, g, b, weight]`.
    pub fn totals(&self) -> [f64; 4] {
        let sum = |v: &[f32]| v.iter().map(|&x| x as f64).sum::<f64>();
        [sum(&self.r), sum(&self.g), sum(&self.b), sum(&self.weight)]
    }
}

/// Weights must stay non-negative, so scale factors must be too.
fn check_factor(factor: f32) -> Result<()> {
    if factor.is_finite() && factor >= 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidSetting(format!(
            "weight must be finite and non-negative, got {}",
            factor
        )))
    }
}

#[inline]
fn add_into(dst: &mut [f32], src: &[f32]) {
    dst.iter_mut().zip(src).for_each(|(d, s)| *d += s);
}
