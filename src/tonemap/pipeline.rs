//! One full recompute: normalize, expose, gamma, bleed, quantize.

use log::debug;

use crate::accum::RadianceAccumulator;
use crate::util::{CancelToken, Result};

use super::bleed::{bleed_xy, BleedParams};
use super::{DisplayBuffer, LinearImage, ToneSettings};

/// Reusable working memory for tone mapping.
///
/// Holds two display-linear images: the current one and a scratch target for
/// the bleed pass. After a bleed they trade roles by index, so steady-state
/// recomputes do not allocate intermediate images.
pub struct Pipeline {
    images: [LinearImage; 2],
    current: usize,
    bleed: BleedParams,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(BleedParams::default())
    }
}

impl Pipeline {
    pub fn new(bleed: BleedParams) -> Self {
        Self {
            images: [LinearImage::default(), LinearImage::default()],
            current: 0,
            bleed,
        }
    }

    pub fn bleed_params(&self) -> &BleedParams {
        &self.bleed
    }

    /// The display-linear image produced by the last completed stage.
    pub fn image(&self) -> &LinearImage {
        &self.images[self.current]
    }

    /// Normalize `acc` into the current image, resizing it on dimension change.
    pub fn load(&mut self, acc: &RadianceAccumulator, cancel: &CancelToken) -> Result<()> {
        let (width, height) = acc.dimensions();
        let image = &mut self.images[self.current];
        if image.dimensions() != (width, height) {
            debug!("resizing working image to {}x{}", width, height);
            image.ensure_size(width, height)?;
        }
        image.load(acc, cancel)
    }

    /// Apply exposure, gamma, optional bleed and quantization to the loaded image.
    #[tracing::instrument(skip_all, fields(generation = generation))]
    pub fn develop(
        &mut self,
        settings: &ToneSettings,
        generation: u64,
        cancel: &CancelToken,
    ) -> Result<DisplayBuffer> {
        {
            let image = &mut self.images[self.current];
            image.multiply(settings.exposure, cancel)?;
            cancel.check()?;
            image.exponentiate(1.0 / settings.gamma, cancel)?;
        }
        cancel.check()?;

        if settings.bleed {
            let [a, b] = &mut self.images;
            let (src, dst) = if self.current == 0 { (&*a, b) } else { (&*b, a) };
            bleed_xy(src, &self.bleed, dst, cancel)?;
            self.current ^= 1;
            cancel.check()?;
        }

        let image = &self.images[self.current];
        let mut pixels = Vec::with_capacity(image.width() * image.height());
        image.to_argb(&mut pixels, settings.dither, cancel)?;
        DisplayBuffer::new(image.width(), image.height(), pixels, *settings, generation)
    }

    /// [`load`](Self::load) followed by [`develop`](Self::develop).
    pub fn run(
        &mut self,
        acc: &RadianceAccumulator,
        settings: &ToneSettings,
        generation: u64,
        cancel: &CancelToken,
    ) -> Result<DisplayBuffer> {
        self.load(acc, cancel)?;
        cancel.check()?;
        self.develop(settings, generation, cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::Error;

    fn uniform(w: usize, h: usize, value: f32) -> RadianceAccumulator {
        let n = w * h;
        let channel = || vec![value; n];
        RadianceAccumulator::from_parts(w, h, channel(), channel(), channel(), vec![1.0; n])
            .unwrap()
    }

    fn plain(exposure: f32, gamma: f32) -> ToneSettings {
        ToneSettings { exposure, gamma, dither: false, bleed: false }
    }

    #[test]
    fn test_end_to_end_white() {
        let mut p = Pipeline::default();
        let out = p.run(&uniform(2, 2, 1.0), &plain(1.0, 1.0), 1, &CancelToken::new()).unwrap();
        assert_eq!((out.width(), out.height()), (2, 2));
        assert!(out.pixels().iter().all(|&px| px == 0xFFFF_FFFF));
    }

    #[test]
    fn test_exposure_and_gamma() {
        let mut p = Pipeline::default();
        let cancel = CancelToken::new();
        // 0.0625 * 4 = 0.25; 0.25^(1/2) = 0.5 -> 128
        let out = p.run(&uniform(1, 1, 0.0625), &plain(4.0, 2.0), 1, &cancel).unwrap();
        assert_eq!(out.rgb(0, 0), (128, 128, 128));
    }

    #[test]
    fn test_repeat_is_byte_identical() {
        let mut acc = RadianceAccumulator::new(8, 8).unwrap();
        for i in 0..64i64 {
            acc.deposit(i % 8, i / 8, i as f32 * 0.01, 0.3, 0.001 * i as f32, 1.0);
        }
        let settings = plain(1.0, 2.2);
        let cancel = CancelToken::new();
        let mut p = Pipeline::default();
        let a = p.run(&acc, &settings, 1, &cancel).unwrap();
        let b = p.run(&acc, &settings, 1, &cancel).unwrap();
        assert_eq!(a.pixels(), b.pixels());

        let dithered = ToneSettings { dither: true, ..settings };
        let c = p.run(&acc, &dithered, 2, &cancel).unwrap();
        let d = p.run(&acc, &dithered, 2, &cancel).unwrap();
        assert_eq!(c.pixels(), d.pixels());
    }

    #[test]
    fn test_bleed_swaps_buffers() {
        let mut acc = RadianceAccumulator::new(5, 5).unwrap();
        acc.deposit(2, 2, 1.0, 1.0, 1.0, 1.0);
        let settings = ToneSettings { bleed: true, ..plain(1.0, 1.0) };
        let cancel = CancelToken::new();
        let mut p = Pipeline::default();

        let first = p.run(&acc, &settings, 1, &cancel).unwrap();
        assert_eq!(p.current, 1);
        assert!(first.rgb(1, 2).0 > 0);

        let second = p.run(&acc, &settings, 2, &cancel).unwrap();
        assert_eq!(p.current, 0);
        assert_eq!(first.pixels(), second.pixels());

        let off = p.run(&acc, &plain(1.0, 1.0), 3, &cancel).unwrap();
        assert_eq!(off.rgb(1, 2), (0, 0, 0));
    }

    #[test]
    fn test_resizes_with_accumulator() {
        let mut p = Pipeline::default();
        let cancel = CancelToken::new();
        p.run(&uniform(4, 3, 0.5), &plain(1.0, 1.0), 1, &cancel).unwrap();
        let out = p.run(&uniform(8, 6, 0.5), &plain(1.0, 1.0), 2, &cancel).unwrap();
        assert_eq!((out.width(), out.height()), (8, 6));
        assert_eq!(out.generation(), 2);
    }

    #[test]
    fn test_cancelled_run() {
        let mut p = Pipeline::default();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = p.run(&uniform(2, 2, 1.0), &plain(1.0, 1.0), 1, &cancel).unwrap_err();
        assert!(matches!(err, Error::Interrupted));
    }
}
