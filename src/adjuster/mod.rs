//! Interactive adjuster: settings surface, recalculation and output.
//!
//! [`Adjuster`] is what a display front end talks to. It owns the
//! [`Recalculator`] thread, replaces settings atomically, and hands out the
//! latest published [`DisplayBuffer`].

mod worker;

pub use worker::{AdjusterEvent, Recalculator};

use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;
use std::time::Duration;

use log::info;
use parking_lot::Mutex;

use crate::accum::SharedAccumulator;
use crate::tonemap::{export_file_name, BleedParams, DisplayBuffer, ToneSettings};
use crate::util::{Error, Result};

/// Front end to the tone mapping pipeline.
pub struct Adjuster {
    worker: Recalculator,
    events: Mutex<Receiver<AdjusterEvent>>,
}

impl Adjuster {
    /// Start an adjuster with default bleed parameters.
    pub fn new(settings: ToneSettings) -> Result<Self> {
        Self::with_bleed(settings, BleedParams::default())
    }

    pub fn with_bleed(settings: ToneSettings, bleed: BleedParams) -> Result<Self> {
        let settings = validate(settings)?;
        let (tx, rx) = channel();
        let worker = Recalculator::spawn(settings, bleed, tx)?;
        Ok(Self { worker, events: Mutex::new(rx) })
    }

    // ---- inputs ----

    /// Install a new accumulator to display.
    pub fn set_accumulator(&self, acc: SharedAccumulator) {
        {
            let a = acc.read();
            info!("displaying {}x{} accumulator", a.width(), a.height());
        }
        self.worker.hard_kick(|state| state.accumulator = Some(acc));
    }

    /// The accumulator currently displayed.
    pub fn accumulator(&self) -> Option<SharedAccumulator> {
        self.worker.with_state(|state| state.accumulator.clone())
    }

    /// Signal that the installed accumulator was mutated in place.
    pub fn accumulator_updated(&self) {
        self.worker.hard_kick(|_| ());
    }

    pub fn settings(&self) -> ToneSettings {
        self.worker.with_state(|state| state.settings)
    }

    /// Replace all settings at once.
    pub fn set_settings(&self, settings: ToneSettings) -> Result<()> {
        let settings = validate(settings)?;
        self.worker.hard_kick(|state| state.settings = settings);
        Ok(())
    }

    /// Derive new settings from the current ones and install them.
    ///
    /// The read and the replace happen under one lock.
    pub fn update_settings(
        &self,
        f: impl FnOnce(ToneSettings) -> ToneSettings,
    ) -> Result<ToneSettings> {
        self.worker.try_hard_kick(|state| {
            let next = validate(f(state.settings))?;
            state.settings = next;
            Ok(next)
        })
    }

    pub fn set_exposure(&self, exposure: f32) -> Result<()> {
        self.update_settings(|s| ToneSettings { exposure, ..s }).map(|_| ())
    }

    pub fn set_gamma(&self, gamma: f32) -> Result<()> {
        self.update_settings(|s| ToneSettings { gamma, ..s }).map(|_| ())
    }

    pub fn set_dither(&self, dither: bool) -> Result<()> {
        self.update_settings(|s| ToneSettings { dither, ..s }).map(|_| ())
    }

    pub fn set_bleed(&self, bleed: bool) -> Result<()> {
        self.update_settings(|s| ToneSettings { bleed, ..s }).map(|_| ())
    }

    /// Multiply exposure by `step`, or divide when `invert`.
    pub fn scale_exposure(&self, step: f32, invert: bool) -> Result<ToneSettings> {
        self.update_settings(|s| s.with_exposure_step(step, invert))
    }

    /// Multiply gamma by `step`, or divide when `invert`.
    pub fn scale_gamma(&self, step: f32, invert: bool) -> Result<ToneSettings> {
        self.update_settings(|s| s.with_gamma_step(step, invert))
    }

    pub fn toggle_dither(&self) -> Result<ToneSettings> {
        self.update_settings(|s| ToneSettings { dither: !s.dither, ..s })
    }

    pub fn toggle_bleed(&self) -> Result<ToneSettings> {
        self.update_settings(|s| ToneSettings { bleed: !s.bleed, ..s })
    }

    // ---- visibility ----

    /// Tell the adjuster whether its output is being shown.
    ///
    /// Nothing is recomputed while hidden; becoming visible wakes the worker
    /// without cancelling anything.
    pub fn set_visible(&self, visible: bool) {
        self.worker.set_visible(visible);
    }

    pub fn is_visible(&self) -> bool {
        self.worker.is_visible()
    }

    /// Nudge the worker after a display hierarchy change (soft kick).
    pub fn wake(&self) {
        self.worker.soft_kick();
    }

    /// True while a change has not been picked up by the worker yet.
    pub fn is_dirty(&self) -> bool {
        self.worker.is_dirty()
    }

    // ---- output ----

    /// Generation of the most recent input change.
    pub fn generation(&self) -> u64 {
        self.worker.with_state(|state| state.generation)
    }

    /// Latest complete display buffer.
    pub fn latest(&self) -> Option<Arc<DisplayBuffer>> {
        self.worker.latest()
    }

    /// Next pending redraw notification, if any.
    pub fn try_event(&self) -> Option<AdjusterEvent> {
        self.events.lock().try_recv().ok()
    }

    /// Wait until a buffer reflecting at least `generation` is published.
    ///
    /// Redraw events are left for the display side.
    pub fn wait_for_generation(
        &self,
        generation: u64,
        timeout: Duration,
    ) -> Option<Arc<DisplayBuffer>> {
        self.worker.wait_for_generation(generation, timeout)
    }

    /// Wait until the latest input change is reflected in a published buffer.
    pub fn wait_until_current(&self, timeout: Duration) -> Option<Arc<DisplayBuffer>> {
        self.wait_for_generation(self.generation(), timeout)
    }

    pub fn completed_runs(&self) -> u64 {
        self.worker.completed_runs()
    }

    pub fn interrupted_runs(&self) -> u64 {
        self.worker.interrupted_runs()
    }

    // ---- export ----

    /// Hand the current buffer to an encoder.
    pub fn export_with<T>(&self, encode: impl FnOnce(&DisplayBuffer) -> Result<T>) -> Result<T> {
        let buffer = self.latest().ok_or(Error::NoCurrentImage)?;
        encode(&buffer)
    }

    /// Write the current buffer as PNG to a fresh `<prefix>-E..-G..-<n>.png`.
    pub fn export_png(&self, prefix: &str) -> Result<PathBuf> {
        self.export_with(|buffer| {
            let path = export_file_name(prefix, buffer.settings());
            buffer.save_png(&path)?;
            Ok(path)
        })
    }

    /// Write the current buffer as PNG to exactly `path`.
    pub fn export_png_to(&self, path: &Path) -> Result<()> {
        self.export_with(|buffer| buffer.save_png(path))
    }
}

fn validate(settings: ToneSettings) -> Result<ToneSettings> {
    if !(settings.exposure.is_finite() && settings.exposure > 0.0) {
        return Err(Error::InvalidSetting(format!(
            "exposure must be positive, got {}",
            settings.exposure
        )));
    }
    if !(settings.gamma.is_finite() && settings.gamma > 0.0) {
        return Err(Error::InvalidSetting(format!(
            "gamma must be positive, got {}",
            settings.gamma
        )));
    }
    Ok(settings)
}
