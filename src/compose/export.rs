use std::io::Cursor;

use anyhow::Context;

use crate::{
    compose::{blend, surface::Surface},
    foundation::error::{TokenizerError, TokenizerResult},
};

/// Raster codec used for uploaded files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageCodec {
    /// Lossless PNG.
    Png,
    /// Lossless WebP.
    #[default]
    Webp,
    /// JPEG; transparent areas are flattened onto white.
    #[serde(alias = "jpeg")]
    Jpg,
}

impl ImageCodec {
    /// File extension without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Jpg => "jpg",
        }
    }

    /// MIME type of encoded payloads.
    pub fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Jpg => "image/jpeg",
        }
    }

    fn format(self) -> image::ImageFormat {
        match self {
            Self::Png => image::ImageFormat::Png,
            Self::Webp => image::ImageFormat::WebP,
            Self::Jpg => image::ImageFormat::Jpeg,
        }
    }
}

impl std::str::FromStr for ImageCodec {
    type Err = TokenizerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "webp" => Ok(Self::Webp),
            "jpg" | "jpeg" => Ok(Self::Jpg),
            other => Err(TokenizerError::validation(format!(
                "unknown image format \"{other}\" (expected png, webp or jpg)"
            ))),
        }
    }
}

/// MIME-typed encoded image bytes, ready for upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedImage {
    /// Codec that produced `bytes`.
    pub codec: ImageCodec,
    /// MIME type of `bytes`.
    pub mime: &'static str,
    /// Encoded file contents.
    pub bytes: Vec<u8>,
}

/// Encode a premultiplied surface with `codec`.
pub fn encode_surface(surface: &Surface, codec: ImageCodec) -> TokenizerResult<EncodedImage> {
    let dyn_img = match codec {
        ImageCodec::Png | ImageCodec::Webp => {
            image::DynamicImage::ImageRgba8(surface.to_rgba_image()?)
        }
        ImageCodec::Jpg => image::DynamicImage::ImageRgb8(flatten_onto_white(surface)?),
    };

    let mut bytes = Vec::new();
    dyn_img
        .write_to(&mut Cursor::new(&mut bytes), codec.format())
        .with_context(|| format!("encode {}x{} surface as {}", surface.width, surface.height, codec.extension()))?;

    tracing::debug!(codec = codec.extension(), len = bytes.len(), "encoded surface");
    Ok(EncodedImage {
        codec,
        mime: codec.mime(),
        bytes,
    })
}

fn flatten_onto_white(surface: &Surface) -> TokenizerResult<image::RgbImage> {
    let mut rgb = Vec::with_capacity((surface.width as usize) * (surface.height as usize) * 3);
    for px in surface.data.chunks_exact(4) {
        let out = blend::over([255, 255, 255, 255], [px[0], px[1], px[2], px[3]]);
        rgb.extend_from_slice(&out[..3]);
    }
    image::RgbImage::from_raw(surface.width, surface.height, rgb)
        .ok_or_else(|| TokenizerError::validation("surface buffer does not match its size"))
}

#[cfg(test)]
#[path = "../../tests/unit/compose/export.rs"]
mod tests;
