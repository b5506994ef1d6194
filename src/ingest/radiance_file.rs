//! Radiance (`.hdr`) and OpenEXR (`.exr`) images as accumulators.

use std::path::Path;

use image::ImageReader;
use log::info;

use crate::accum::RadianceAccumulator;
use crate::util::{Error, Result};

/// File types [`load_radiance_file`] understands.
pub fn is_radiance_file(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref(),
        Some("hdr") | Some("exr")
    )
}

/// Decode an HDR image into an accumulator with one sample per pixel.
pub fn load_radiance_file(path: &Path) -> Result<RadianceAccumulator> {
    if !is_radiance_file(path) {
        return Err(Error::UnsupportedSource(path.to_path_buf()));
    }
    info!("Loading {}...", path.display());
    let img = ImageReader::open(path)?.decode()?;
    let acc = from_rgb32f(&img.to_rgb32f())?;
    info!("  -> {}x{}", acc.width(), acc.height());
    Ok(acc)
}

/// Accumulator holding `img` as radiance with weight 1 everywhere.
pub fn from_rgb32f(img: &image::Rgb32FImage) -> Result<RadianceAccumulator> {
    let (width, height) = (img.width() as usize, img.height() as usize);
    let len = width * height;
    let mut r = Vec::with_capacity(len);
    let mut g = Vec::with_capacity(len);
    let mut b = Vec::with_capacity(len);
    for px in img.pixels() {
        r.push(px.0[0]);
        g.push(px.0[1]);
        b.push(px.0[2]);
    }
    RadianceAccumulator::from_parts(width, height, r, g, b, vec![1.0; len])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_check() {
        assert!(is_radiance_file(Path::new("scene.hdr")));
        assert!(is_radiance_file(Path::new("scene.EXR")));
        assert!(!is_radiance_file(Path::new("scene.png")));
        assert!(!is_radiance_file(Path::new("scene")));
        let err = load_radiance_file(Path::new("scene.dump")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedSource(_)));
    }

    #[test]
    fn test_from_rgb32f() {
        let img = image::Rgb32FImage::from_fn(3, 2, |x, y| image::Rgb([x as f32, y as f32, 0.5]));
        let acc = from_rgb32f(&img).unwrap();
        assert_eq!(acc.dimensions(), (3, 2));
        assert_eq!(acc.pixel(2, 1), Some([2.0, 1.0, 0.5, 1.0]));
    }
}
