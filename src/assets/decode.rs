use std::sync::Arc;

use crate::{
    assets::color::Color,
    foundation::error::{TokenizerError, TokenizerResult},
    foundation::math::premultiply_rgba8_in_place,
};

const MEMORY_LOCATION: &str = "<memory>";

/// Avoid pathological allocations when rasterizing vector art.
const MAX_SVG_DIM: u32 = 8192;

#[derive(Clone, Debug, PartialEq, Eq)]
/// Decoded raster image in premultiplied RGBA8 form.
///
/// Pixel storage is shared: cloning a `PreparedImage` never copies pixel data, so the same decoded
/// image can back several layers.
pub struct PreparedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel bytes in row-major premultiplied RGBA8.
    pub rgba8_premul: Arc<Vec<u8>>,
}

impl PreparedImage {
    /// Wrap already-premultiplied RGBA8 pixels.
    pub fn from_premul(width: u32, height: u32, rgba8_premul: Vec<u8>) -> TokenizerResult<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(4))
            .ok_or_else(|| TokenizerError::validation("image buffer size overflow"))?;
        if rgba8_premul.len() != expected {
            return Err(TokenizerError::validation(format!(
                "image buffer has {} bytes, expected {expected} for {width}x{height}",
                rgba8_premul.len()
            )));
        }
        Ok(Self {
            width,
            height,
            rgba8_premul: Arc::new(rgba8_premul),
        })
    }

    /// Convert a straight-alpha `image` buffer.
    pub fn from_rgba_image(img: image::RgbaImage) -> TokenizerResult<Self> {
        let (width, height) = img.dimensions();
        let mut raw = img.into_raw();
        premultiply_rgba8_in_place(&mut raw);
        Self::from_premul(width, height, raw)
    }

    /// A uniformly colored image.
    pub fn solid(width: u32, height: u32, color: Color) -> TokenizerResult<Self> {
        let px = color.to_premul().to_array();
        Self::from_premul(width, height, px.repeat((width as usize) * (height as usize)))
    }

    /// Return `true` when either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Premultiplied pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        let p = &self.rgba8_premul[idx..idx + 4];
        Some([p[0], p[1], p[2], p[3]])
    }
}

/// Decode encoded image bytes (PNG, JPEG, WebP, GIF, BMP or SVG) to premultiplied RGBA8.
pub fn decode_image(bytes: &[u8]) -> TokenizerResult<PreparedImage> {
    decode_image_at(MEMORY_LOCATION, bytes)
}

/// Like [`decode_image`], reporting failures against `location`.
pub fn decode_image_at(location: &str, bytes: &[u8]) -> TokenizerResult<PreparedImage> {
    let prepared = if looks_like_svg(bytes) {
        rasterize_svg(location, bytes)?
    } else {
        let dyn_img = image::load_from_memory(bytes)
            .map_err(|e| TokenizerError::decode(location, e))?;
        PreparedImage::from_rgba_image(dyn_img.to_rgba8())?
    };

    if prepared.is_empty() {
        return Err(TokenizerError::decode(location, "image has zero width or height"));
    }
    Ok(prepared)
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(1024)];
    let Ok(text) = std::str::from_utf8(head) else {
        // Truncation can split a UTF-8 sequence; fall back to a lossy view.
        return String::from_utf8_lossy(head).contains("<svg");
    };
    let text = text.trim_start_matches('\u{feff}').trim_start();
    text.starts_with("<svg") || (text.starts_with("<?xml") && text.contains("<svg"))
}

fn rasterize_svg(location: &str, bytes: &[u8]) -> TokenizerResult<PreparedImage> {
    let opts = usvg::Options::default();
    let tree =
        usvg::Tree::from_data(bytes, &opts).map_err(|e| TokenizerError::decode(location, e))?;

    let size = tree.size();
    let (w, h) = (size.width(), size.height());
    if !w.is_finite() || !h.is_finite() || w <= 0.0 || h <= 0.0 {
        return Err(TokenizerError::decode(location, "svg has invalid width/height"));
    }
    let width = (w.ceil() as u32).max(1);
    let height = (h.ceil() as u32).max(1);
    if width > MAX_SVG_DIM || height > MAX_SVG_DIM {
        return Err(TokenizerError::decode(
            location,
            format!("svg raster size too large: {width}x{height} (max {MAX_SVG_DIM}x{MAX_SVG_DIM})"),
        ));
    }

    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| TokenizerError::decode(location, "failed to allocate svg pixmap"))?;
    let xform = resvg::tiny_skia::Transform::from_scale(width as f32 / w, height as f32 / h);
    resvg::render(&tree, xform, &mut pixmap.as_mut());

    tracing::debug!(location, width, height, "rasterized svg");
    PreparedImage::from_premul(width, height, pixmap.data().to_vec())
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
