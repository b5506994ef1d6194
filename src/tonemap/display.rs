//! Quantized display buffer and PNG export.

use std::path::{Path, PathBuf};

use log::info;

use crate::util::{Error, Result};

use super::ToneSettings;

/// Packed `0xAARRGGBB` pixels ready for a display surface.
///
/// Immutable once published; consumers hold it through an `Arc`.
#[derive(Clone, Debug, PartialEq)]
pub struct DisplayBuffer {
    width: usize,
    height: usize,
    pixels: Vec<u32>,
    settings: ToneSettings,
    generation: u64,
}

impl DisplayBuffer {
    /// Wrap quantized pixels; `pixels.len()` must equal `width * height`.
    pub fn new(
        width: usize,
        height: usize,
        pixels: Vec<u32>,
        settings: ToneSettings,
        generation: u64,
    ) -> Result<Self> {
        if pixels.len() != width * height {
            return Err(Error::InvalidDimensions { width, height });
        }
        Ok(Self { width, height, pixels, settings, generation })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// Raw native-endian bytes of the packed pixels, for texture uploads.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    /// Settings this buffer was computed with.
    pub fn settings(&self) -> &ToneSettings {
        &self.settings
    }

    /// Change generation this buffer reflects.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// `(r, g, b)` at a pixel.
    pub fn rgb(&self, x: usize, y: usize) -> (u8, u8, u8) {
        let p = self.pixels[y * self.width + x];
        ((p >> 16) as u8, (p >> 8) as u8, p as u8)
    }

    /// Convert to an `image` RGBA buffer.
    pub fn to_rgba_image(&self) -> Result<image::RgbaImage> {
        let bytes: Vec<u8> = self
            .pixels
            .iter()
            .flat_map(|&p| [(p >> 16) as u8, (p >> 8) as u8, p as u8, (p >> 24) as u8])
            .collect();
        image::RgbaImage::from_raw(self.width as u32, self.height as u32, bytes).ok_or(
            Error::InvalidDimensions { width: self.width, height: self.height },
        )
    }

    /// Encode as PNG at `path`, creating parent directories.
    pub fn save_png(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        info!("Exporting to {}...", path.display());
        self.to_rgba_image()?
            .save_with_format(path, image::ImageFormat::Png)?;
        info!("Wrote {}", path.display());
        Ok(())
    }
}

/// First `<prefix><n><suffix>` that does not exist yet, counting from 0.
pub fn new_output_file(prefix: &str, suffix: &str) -> PathBuf {
    (0u64..)
        .map(|i| PathBuf::from(format!("{}{}{}", prefix, i, suffix)))
        .find(|p| !p.exists())
        .unwrap_or_else(|| PathBuf::from(format!("{}{}", prefix, suffix)))
}

/// Export file name for `prefix` under `settings`.
///
/// `<prefix>-E<exposure>-G<gamma>-<n>.png`, whole numbers written as `1.0`.
pub fn export_file_name(prefix: &str, settings: &ToneSettings) -> PathBuf {
    new_output_file(
        &format!("{}-E{:?}-G{:?}-", prefix, settings.exposure, settings.gamma),
        ".png",
    )
}

/// Export prefix for a scene: `<scene>` or `<scene>-<spp>`.
pub fn export_prefix(scene: &str, samples_per_pixel: u64) -> String {
    if samples_per_pixel == 0 {
        scene.to_string()
    } else {
        format!("{}-{}", scene, samples_per_pixel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer() -> DisplayBuffer {
        DisplayBuffer::new(
            2,
            1,
            vec![0xFF10_2030, 0xFFFF_FFFF],
            ToneSettings::default(),
            1,
        )
        .unwrap()
    }

    #[test]
    fn test_rgb_unpack() {
        let buf = buffer();
        assert_eq!(buf.rgb(0, 0), (0x10, 0x20, 0x30));
        assert_eq!(buf.as_bytes().len(), 8);
        assert!(DisplayBuffer::new(3, 1, vec![0; 2], ToneSettings::default(), 0).is_err());
    }

    #[test]
    fn test_to_rgba_image() {
        let img = buffer().to_rgba_image().unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [0x10, 0x20, 0x30, 0xFF]);
    }

    #[test]
    fn test_export_names() {
        assert_eq!(export_prefix("scene", 0), "scene");
        assert_eq!(export_prefix("scene", 64), "scene-64");

        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("scene").to_string_lossy().into_owned();
        let settings = ToneSettings { exposure: 1.5, gamma: 2.2, ..Default::default() };
        let first = export_file_name(&prefix, &settings);
        assert!(first.to_string_lossy().ends_with("scene-E1.5-G2.2-0.png"));

        buffer().save_png(&first).unwrap();
        let second = export_file_name(&prefix, &settings);
        assert!(second.to_string_lossy().ends_with("scene-E1.5-G2.2-1.png"));

        let decoded = image::open(&first).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (2, 1));
        assert_eq!(decoded.get_pixel(1, 0).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_export_name_keeps_decimal_point() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("scene").to_string_lossy().into_owned();
        let settings = ToneSettings { exposure: 1.0, gamma: 2.0, ..Default::default() };
        let name = export_file_name(&prefix, &settings);
        assert!(name.to_string_lossy().ends_with("scene-E1.0-G2.0-0.png"));
    }
}
