use crate::foundation::{
    core::CanvasSize,
    error::{TokenizerError, TokenizerResult},
    math::unpremultiply_rgba8_in_place,
};

/// A square drawing surface holding premultiplied RGBA8 pixels.
///
/// This is the raw backing store of a [`crate::View`]; `Canvas` exports hand out a clone of it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Surface {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Premultiplied RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
}

impl Surface {
    /// Allocate a fully transparent surface of `size × size` pixels.
    pub fn new(size: CanvasSize) -> Self {
        let px = size.px();
        Self {
            width: px,
            height: px,
            data: vec![0; (px as usize) * (px as usize) * 4],
        }
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        (self.width as usize) * 4
    }

    /// Reset every pixel to transparent.
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    /// Premultiplied pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize) * self.stride() + (x as usize) * 4;
        let p = &self.data[idx..idx + 4];
        Some([p[0], p[1], p[2], p[3]])
    }

    /// Straight-alpha copy suitable for display or encoding.
    pub fn to_rgba_image(&self) -> TokenizerResult<image::RgbaImage> {
        let mut raw = self.data.clone();
        unpremultiply_rgba8_in_place(&mut raw);
        image::RgbaImage::from_raw(self.width, self.height, raw)
            .ok_or_else(|| TokenizerError::validation("surface buffer does not match its size"))
    }
}
