use crate::foundation::error::{TokenizerError, TokenizerResult};

pub use kurbo::{Affine, Point, Vec2};

/// Side length, in pixels, of a square output canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct CanvasSize(u32);

impl CanvasSize {
    /// Largest accepted canvas side.
    pub const MAX: u32 = 8192;

    /// Create a validated canvas size in `1..=MAX`.
    pub fn new(px: u32) -> TokenizerResult<Self> {
        if px == 0 {
            return Err(TokenizerError::validation("canvas size must be > 0"));
        }
        if px > Self::MAX {
            return Err(TokenizerError::validation(format!(
                "canvas size {px} exceeds maximum {}",
                Self::MAX
            )));
        }
        Ok(Self(px))
    }

    /// Side length in pixels.
    pub fn px(self) -> u32 {
        self.0
    }

    /// Side length as `f64`, for geometry.
    pub fn as_f64(self) -> f64 {
        f64::from(self.0)
    }

    /// Canvas center in pixel coordinates.
    pub fn center(self) -> Point {
        let half = self.as_f64() / 2.0;
        Point::new(half, half)
    }
}

/// Premultiplied RGBA8 (r,g,b already multiplied by a).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8Premul {
    /// Red channel premultiplied by alpha.
    pub r: u8,
    /// Green channel premultiplied by alpha.
    pub g: u8,
    /// Blue channel premultiplied by alpha.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Rgba8Premul {
    /// Fully transparent black.
    pub fn transparent() -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        }
    }

    /// Convert straight-alpha RGBA8 into premultiplied RGBA8.
    pub fn from_straight_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        fn premul(c: u8, a: u8) -> u8 {
            let c = u16::from(c);
            let a = u16::from(a);
            (((c * a) + 127) / 255) as u8
        }

        Self {
            r: premul(r, a),
            g: premul(g, a),
            b: premul(b, a),
            a,
        }
    }

    /// Pixel as a `[r, g, b, a]` array.
    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
