//! Image probing, post-processing and decoding.
//!
//! Diagram tiers hand back image files on disk or bytes from the network.
//! This module measures them, shrinks oversized rasters, and decodes either
//! kind into raw RGB plus an optional alpha channel when the PDF is
//! assembled. SVGs are rasterised with resvg.

use crate::canvas::{ImageKind, ImageRef};
use log::debug;
use once_cell::sync::Lazy;
use resvg::usvg;
use std::path::Path;
use std::sync::Arc;
use tiny_skia::{Pixmap, Transform};

#[derive(Debug, Clone, PartialEq)]
pub enum ImageError {
    /// The file could not be read
    LoadError(String),
    /// The bytes could not be decoded
    DecodeError(String),
}

impl std::fmt::Display for ImageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageError::LoadError(e) => write!(f, "Failed to load image: {}", e),
            ImageError::DecodeError(e) => write!(f, "Failed to decode image: {}", e),
        }
    }
}

impl std::error::Error for ImageError {}

/// Decoded pixels ready to become a PDF image XObject.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    /// Packed 8-bit RGB, row major.
    pub rgb: Vec<u8>,
    /// 8-bit alpha, present only when some pixel is not fully opaque.
    pub alpha: Option<Vec<u8>>,
}

impl RasterImage {
    fn from_rgba(width: u32, height: u32, pixels: impl Iterator<Item = [u8; 4]>) -> Self {
        let capacity = (width as usize) * (height as usize);
        let mut rgb = Vec::with_capacity(capacity * 3);
        let mut alpha = Vec::with_capacity(capacity);
        for [r, g, b, a] in pixels {
            rgb.extend_from_slice(&[r, g, b]);
            alpha.push(a);
        }
        let opaque = alpha.iter().all(|a| *a == u8::MAX);
        Self {
            width,
            height,
            rgb,
            alpha: if opaque { None } else { Some(alpha) },
        }
    }
}

// Loading system fonts is slow; share one database between all SVG renders.
static FONT_DB: Lazy<Arc<usvg::fontdb::Database>> = Lazy::new(|| {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    Arc::new(db)
});

fn parse_svg(svg: &str) -> Result<usvg::Tree, ImageError> {
    let mut opts = usvg::Options::default();
    opts.fontdb = FONT_DB.clone();
    usvg::Tree::from_str(svg, &opts)
        .map_err(|e| ImageError::DecodeError(format!("Failed to parse SVG: {}", e)))
}

fn read_svg(path: &Path) -> Result<String, ImageError> {
    std::fs::read_to_string(path)
        .map_err(|e| ImageError::LoadError(format!("{}: {}", path.display(), e)))
}

/// Rasterises an SVG document at `scale` times its natural size.
pub fn rasterize_svg(svg: &str, scale: f32) -> Result<RasterImage, ImageError> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(ImageError::DecodeError(format!("Invalid SVG scale {}", scale)));
    }
    let tree = parse_svg(svg)?;
    let width = (tree.size().width() * scale).ceil() as u32;
    let height = (tree.size().height() * scale).ceil() as u32;

    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| ImageError::DecodeError(format!("Cannot allocate {}x{} pixmap", width, height)))?;
    resvg::render(&tree, Transform::from_scale(scale, scale), &mut pixmap.as_mut());

    let pixels = pixmap.pixels().iter().map(|p| {
        let c = p.demultiply();
        [c.red(), c.green(), c.blue(), c.alpha()]
    });
    Ok(RasterImage::from_rgba(width, height, pixels))
}

/// Pixel size of an encoded image held in memory.
pub fn dimensions_from_bytes(bytes: &[u8]) -> Result<(u32, u32), ImageError> {
    let img = image::load_from_memory(bytes).map_err(|e| ImageError::DecodeError(e.to_string()))?;
    Ok((img.width(), img.height()))
}

/// Re-encodes a raster image as PNG in place. Images wider than `max_width`
/// are shrunk to fit within `max_width` x `max_height`, keeping their aspect
/// ratio. Returns the final pixel size.
pub fn fit_raster(path: &Path, max_width: u32, max_height: u32) -> Result<(u32, u32), ImageError> {
    let img = image::open(path)
        .map_err(|e| ImageError::DecodeError(format!("{}: {}", path.display(), e)))?;
    let img = if img.width() > max_width {
        debug!(
            "Shrinking {} from {}x{} to fit {}x{}",
            path.display(),
            img.width(),
            img.height(),
            max_width,
            max_height
        );
        img.resize(max_width, max_height, image::imageops::FilterType::Lanczos3)
    } else {
        img
    };
    img.save_with_format(path, image::ImageFormat::Png)
        .map_err(|e| ImageError::LoadError(format!("{}: {}", path.display(), e)))?;
    Ok((img.width(), img.height()))
}

/// Decodes the image behind `image` for embedding. SVGs are rasterised at
/// twice their natural size so they stay sharp when printed.
pub fn load_for_embedding(image: &ImageRef) -> Result<RasterImage, ImageError> {
    match image.kind {
        ImageKind::Svg => rasterize_svg(&read_svg(&image.path)?, 2.0),
        ImageKind::Raster => {
            let img = image::open(&image.path)
                .map_err(|e| ImageError::DecodeError(format!("{}: {}", image.path.display(), e)))?;
            let rgba = img.to_rgba8();
            let (width, height) = rgba.dimensions();
            Ok(RasterImage::from_rgba(width, height, rgba.pixels().map(|p| p.0)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    const SQUARE_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="40" height="20">
<rect x="0" y="0" width="40" height="20" fill="#ff0000"/>
</svg>"##;

    #[test]
    fn test_dimensions_from_png_bytes() {
        let mut buf = std::io::Cursor::new(Vec::new());
        RgbaImage::from_pixel(30, 12, Rgba([1, 2, 3, 255]))
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        assert_eq!(dimensions_from_bytes(buf.get_ref()).unwrap(), (30, 12));
        assert!(matches!(dimensions_from_bytes(b"hello"), Err(ImageError::DecodeError(_))));
    }

    #[test]
    fn test_rasterize_svg_scales() {
        let img = rasterize_svg(SQUARE_SVG, 2.0).unwrap();
        assert_eq!((img.width, img.height), (80, 40));
        assert_eq!(img.rgb.len(), 80 * 40 * 3);
        assert_eq!(&img.rgb[0..3], &[255, 0, 0]);
        assert!(img.alpha.is_none());
    }

    #[test]
    fn test_rasterize_svg_rejects_bad_input() {
        assert!(rasterize_svg("not svg", 1.0).is_err());
        assert!(rasterize_svg(SQUARE_SVG, 0.0).is_err());
    }

    #[test]
    fn test_fit_raster_shrinks_wide_images() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.png");
        RgbaImage::from_pixel(1600, 400, Rgba([0, 0, 255, 255]))
            .save(&path)
            .unwrap();

        let (w, h) = fit_raster(&path, 800, 600).unwrap();
        assert_eq!((w, h), (800, 200));
        assert_eq!(image::image_dimensions(&path).unwrap(), (800, 200));
    }

    #[test]
    fn test_fit_raster_keeps_small_images() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.png");
        RgbaImage::from_pixel(100, 50, Rgba([0, 0, 0, 255])).save(&path).unwrap();
        assert_eq!(fit_raster(&path, 800, 600).unwrap(), (100, 50));
    }

    #[test]
    fn test_load_for_embedding_keeps_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alpha.png");
        RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 128])).save(&path).unwrap();
        let img = load_for_embedding(&ImageRef {
            path,
            kind: ImageKind::Raster,
        })
        .unwrap();
        assert_eq!(img.rgb, [10u8, 20, 30].repeat(4));
        assert_eq!(img.alpha, Some(vec![128; 4]));
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let result = load_for_embedding(&ImageRef {
            path: "does/not/exist.svg".into(),
            kind: ImageKind::Svg,
        });
        assert!(matches!(result, Err(ImageError::LoadError(_))));
    }
}
