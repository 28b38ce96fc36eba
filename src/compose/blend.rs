//! Per-pixel compositing on premultiplied RGBA8.

use crate::{assets::color::Color, foundation::math::mul_div255_u8};

/// One premultiplied RGBA8 pixel.
pub type PremulRgba8 = [u8; 4];

/// How a layer's pixels combine with what is already on the surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlendMode {
    /// Standard "source over destination" (premultiplied alpha).
    #[default]
    Normal,
    /// Channel-wise product; darkens.
    Multiply,
    /// Inverted product of inverses; lightens.
    Screen,
    /// Multiply in shadows, screen in highlights of the backdrop.
    Overlay,
    /// Channel-wise minimum.
    Darken,
    /// Channel-wise maximum.
    Lighten,
}

/// Premultiplied source-over.
pub fn over(dst: PremulRgba8, src: PremulRgba8) -> PremulRgba8 {
    if src[3] == 0 {
        return dst;
    }
    if src[3] == 255 {
        return src;
    }

    let inv = 255u16 - u16::from(src[3]);
    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = src[i].saturating_add(mul_div255_u8(u16::from(dst[i]), inv));
    }
    out
}

/// Composite `src` onto `dst` with a separable blend mode. Falls back to [`over`] for
/// [`BlendMode::Normal`] and for a transparent backdrop.
pub fn blend(dst: PremulRgba8, src: PremulRgba8, mode: BlendMode) -> PremulRgba8 {
    if mode == BlendMode::Normal || dst[3] == 0 {
        return over(dst, src);
    }
    if src[3] == 0 {
        return dst;
    }

    let sa = f32::from(src[3]) / 255.0;
    let da = f32::from(dst[3]) / 255.0;
    let mut out = [0u8; 4];
    for i in 0..3 {
        let sc = f32::from(src[i]) / 255.0;
        let dc = f32::from(dst[i]) / 255.0;
        let s = sc / sa;
        let d = dc / da;
        let b = blend_channel(mode, d.clamp(0.0, 1.0), s.clamp(0.0, 1.0));
        let c = sc * (1.0 - da) + dc * (1.0 - sa) + sa * da * b;
        out[i] = to_u8(c);
    }
    out[3] = to_u8(sa + da - sa * da);
    out
}

fn blend_channel(mode: BlendMode, d: f32, s: f32) -> f32 {
    match mode {
        BlendMode::Normal => s,
        BlendMode::Multiply => s * d,
        BlendMode::Screen => s + d - s * d,
        BlendMode::Overlay => {
            if d <= 0.5 {
                2.0 * s * d
            } else {
                1.0 - 2.0 * (1.0 - s) * (1.0 - d)
            }
        }
        BlendMode::Darken => s.min(d),
        BlendMode::Lighten => s.max(d),
    }
}

/// Multiply a pixel's color by `tint`, keeping its alpha. A transparent tint is a no-op.
pub fn tint_multiply(px: PremulRgba8, tint: Color) -> PremulRgba8 {
    let ta = u16::from(tint.a);
    let factor = |t: u8| 255u16 - u16::from(mul_div255_u8(ta, 255 - u16::from(t)));
    [
        mul_div255_u8(u16::from(px[0]), factor(tint.r)),
        mul_div255_u8(u16::from(px[1]), factor(tint.g)),
        mul_div255_u8(u16::from(px[2]), factor(tint.b)),
        px[3],
    ]
}

/// Replace a pixel's color with `tint`, shaped by the pixel's own alpha.
pub fn flat_fill(alpha: u8, tint: Color) -> PremulRgba8 {
    let t = tint.to_premul().to_array();
    let a = u16::from(alpha);
    [
        mul_div255_u8(u16::from(t[0]), a),
        mul_div255_u8(u16::from(t[1]), a),
        mul_div255_u8(u16::from(t[2]), a),
        mul_div255_u8(u16::from(t[3]), a),
    ]
}

/// Scale all channels of a premultiplied pixel by `coverage / 255`.
pub fn scale(px: PremulRgba8, coverage: u8) -> PremulRgba8 {
    match coverage {
        255 => px,
        0 => [0, 0, 0, 0],
        c => {
            let c = u16::from(c);
            [
                mul_div255_u8(u16::from(px[0]), c),
                mul_div255_u8(u16::from(px[1]), c),
                mul_div255_u8(u16::from(px[2]), c),
                mul_div255_u8(u16::from(px[3]), c),
            ]
        }
    }
}

fn to_u8(x: f32) -> u8 {
    (x.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
#[path = "../../tests/unit/compose/blend.rs"]
mod tests;
