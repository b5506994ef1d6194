//! Combining several independently rendered exposures into one.

use log::info;

use crate::util::Result;

use super::RadianceAccumulator;

/// Running merge of weighted radiance sources.
///
/// The first source is taken as-is (scaled by its weight); later sources are
/// combined with [`RadianceAccumulator::combine`]. A failed merge leaves the
/// running sum untouched.
#[derive(Debug, Default)]
pub struct ExposureMerge {
    sum: Option<RadianceAccumulator>,
    sources: usize,
    spp: u64,
}

impl ExposureMerge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one source with the given exposure weight.
    pub fn push(&mut self, mut exposure: RadianceAccumulator, weight: f32) -> Result<()> {
        // Sources have uniform sample counts, so the first pixel is representative.
        let spp = exposure.weight().first().copied().unwrap_or(0.0);

        match self.sum.as_mut() {
            None => {
                exposure.scale(weight)?;
                self.sum = Some(exposure);
            }
            Some(sum) => sum.combine(&exposure, weight)?,
        }

        self.sources += 1;
        self.spp += spp.max(0.0) as u64;
        if let Some(sum) = &self.sum {
            info!("merged source {} -> {}x{}", self.sources, sum.width(), sum.height());
        }
        Ok(())
    }

    /// Number of sources merged so far.
    pub fn sources(&self) -> usize {
        self.sources
    }

    /// Total samples-per-pixel over all sources, before weighting.
    pub fn samples_per_pixel(&self) -> u64 {
        self.spp
    }

    pub fn current(&self) -> Option<&RadianceAccumulator> {
        self.sum.as_ref()
    }

    /// Take the merged accumulator, if any source was pushed.
    pub fn finish(self) -> Option<RadianceAccumulator> {
        self.sum
    }
}
