//! Tone mapping settings that persist between sessions

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::util::Result;

/// Coarse multiplicative step for exposure/gamma adjustments.
pub const COARSE_STEP: f32 = 1.5;
/// Fine multiplicative step for exposure/gamma adjustments.
pub const FINE_STEP: f32 = 1.125;

/// One complete set of tone mapping parameters.
///
/// Replaced as a whole; the worker never sees a half-updated set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneSettings {
    /// Linear brightness multiplier, > 0
    pub exposure: f32,
    /// Display gamma, > 0; `1/gamma` is applied
    pub gamma: f32,
    pub dither: bool,
    pub bleed: bool,
}

impl Default for ToneSettings {
    fn default() -> Self {
        Self {
            exposure: 1.0,
            gamma: 2.2,
            dither: true,
            bleed: false,
        }
    }
}

impl ToneSettings {
    /// Get settings file path
    fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("hdr-adjust");
            p.push("settings.json");
            p
        })
    }

    /// Load settings from the user config dir, falling back to defaults.
    pub fn load() -> Self {
        Self::path()
            .and_then(|p| Self::load_from(&p).ok())
            .unwrap_or_default()
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&json)?;
        Ok(settings.sanitized())
    }

    /// Save settings to the user config dir.
    pub fn save(&self) -> Result<()> {
        match Self::path() {
            Some(path) => self.save_to(&path),
            None => Ok(()),
        }
    }

    /// Save settings to a specific file, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Reset non-positive or non-finite exposure/gamma to defaults.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !(self.exposure.is_finite() && self.exposure > 0.0) {
            self.exposure = defaults.exposure;
        }
        if !(self.gamma.is_finite() && self.gamma > 0.0) {
            self.gamma = defaults.gamma;
        }
        self
    }

    /// Exposure multiplied by `step`, or divided by it when `invert`.
    pub fn with_exposure_step(self, step: f32, invert: bool) -> Self {
        Self { exposure: self.exposure * step_factor(step, invert), ..self }
    }

    /// Gamma multiplied by `step`, or divided by it when `invert`.
    pub fn with_gamma_step(self, step: f32, invert: bool) -> Self {
        Self { gamma: self.gamma * step_factor(step, invert), ..self }
    }

    /// Overlay text describing the current settings.
    pub fn status_lines(&self) -> Vec<String> {
        vec![
            format!("Exposure: {:12.4}", self.exposure),
            format!("Gamma:    {:12.4}", self.gamma),
            format!("Dithering: {}", enabled(self.dither)),
            format!("Bleed: {}", enabled(self.bleed)),
        ]
    }
}

fn step_factor(step: f32, invert: bool) -> f32 {
    if invert { 1.0 / step } else { step }
}

fn enabled(flag: bool) -> &'static str {
    if flag { "enabled" } else { "disabled" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = ToneSettings::default();
        assert_eq!(s.exposure, 1.0);
        assert_eq!(s.gamma, 2.2);
        assert!(s.dither);
        assert!(!s.bleed);
    }

    #[test]
    fn test_steps() {
        let s = ToneSettings::default().with_exposure_step(COARSE_STEP, false);
        assert_eq!(s.exposure, 1.5);
        let s = s.with_exposure_step(COARSE_STEP, true);
        assert!((s.exposure - 1.0).abs() < 1e-6);
        let s = s.with_gamma_step(FINE_STEP, false);
        assert!((s.gamma - 2.2 * 1.125).abs() < 1e-5);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let s: ToneSettings = serde_json::from_str(r#"{"exposure": 4.0}"#).unwrap();
        assert_eq!(s.exposure, 4.0);
        assert_eq!(s.gamma, 2.2);
        assert!(s.dither);
    }

    #[test]
    fn test_sanitized() {
        let s = ToneSettings { exposure: -1.0, gamma: f32::NAN, ..Default::default() }.sanitized();
        assert_eq!(s, ToneSettings::default());
    }

    #[test]
    fn test_save_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let s = ToneSettings { exposure: 0.25, gamma: 1.8, dither: false, bleed: true };
        s.save_to(&path).unwrap();
        assert_eq!(ToneSettings::load_from(&path).unwrap(), s);
    }

    #[test]
    fn test_status_lines() {
        let lines = ToneSettings::default().status_lines();
        assert!(lines[0].starts_with("Exposure:"));
        assert!(lines[0].ends_with("1.0000"));
        assert_eq!(lines[2], "Dithering: enabled");
        assert_eq!(lines[3], "Bleed: disabled");
    }
}
