//! A single element of a composite: a decoded image or a solid color, plus the transform and
//! render flags that decide where and how it lands on the canvas.

use std::f64::consts::TAU;

use rayon::prelude::*;

use crate::{
    assets::{color::Color, decode::PreparedImage},
    compose::{
        blend::{self, BlendMode, PremulRgba8},
        mask::MaskShape,
        surface::Surface,
    },
    foundation::{
        core::{Affine, CanvasSize, Point, Vec2},
        math::mul_div255_u8,
    },
};

/// Multiplicative zoom applied per mouse-wheel notch.
pub const WHEEL_ZOOM_STEP: f64 = 1.1;

/// Identifier of a layer within one [`crate::View`]. Never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayerId(pub(crate) u64);

impl LayerId {
    /// Raw identifier value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Logical role of a layer. A view holds at most one layer per slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Slot {
    /// The base picture.
    Background,
    /// The decorative frame drawn above everything else.
    Frame,
    /// The flat color fill.
    Tint,
}

/// Visual content of a layer. Immutable once the layer exists.
#[derive(Clone, Debug, PartialEq)]
pub enum LayerSource {
    /// Decoded raster pixels.
    Image(PreparedImage),
    /// Solid color covering the whole canvas.
    Color(Color),
}

/// Interactive placement of a layer's image on the canvas.
///
/// The image is centered on the canvas center shifted by `offset`, scaled uniformly by `scale`,
/// rotated by `rotation` radians and optionally mirrored horizontally.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerTransform {
    /// Displacement of the image center from the canvas center, in canvas pixels.
    pub offset: Vec2,
    /// Uniform scale factor from image pixels to canvas pixels.
    pub scale: f64,
    /// Rotation in radians, normalized to `[0, 2π)`.
    pub rotation: f64,
    /// Horizontal mirror.
    pub mirror: bool,
}

impl LayerTransform {
    /// Centered, unrotated placement at `scale`.
    pub fn at_scale(scale: f64) -> Self {
        Self {
            offset: Vec2::ZERO,
            scale,
            rotation: 0.0,
            mirror: false,
        }
    }
}

/// Rendering attributes of a layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderFlags {
    /// Clip the layer to the view's mask shape.
    pub masked: bool,
    /// Draw after all layers without this flag.
    pub on_top: bool,
    /// Optional tint applied to the layer's pixels.
    pub tint_color: Option<Color>,
    /// With a tint color: replace the layer's color by the tint (shaped by its alpha) and blend it
    /// with the view's overlay blend mode. Without: multiply the layer's own pixels by the tint.
    pub tint_as_overlay: bool,
    /// Hidden layers are skipped entirely.
    pub visible: bool,
    /// Layer opacity in `0..=1`.
    pub opacity: f32,
}

impl Default for RenderFlags {
    fn default() -> Self {
        Self {
            masked: false,
            on_top: false,
            tint_color: None,
            tint_as_overlay: false,
            visible: true,
            opacity: 1.0,
        }
    }
}

/// Incremental edit produced by a pointer drag, wheel, pinch or keyboard nudge.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerDelta {
    /// Translation in canvas pixels.
    pub pan: Vec2,
    /// Multiplicative zoom factor; `1.0` leaves the scale unchanged.
    pub zoom: f64,
    /// Rotation increment in radians.
    pub rotate: f64,
    /// Canvas point that stays fixed while zooming; the layer center when `None`.
    pub anchor: Option<Point>,
}

impl Default for PointerDelta {
    fn default() -> Self {
        Self {
            pan: Vec2::ZERO,
            zoom: 1.0,
            rotate: 0.0,
            anchor: None,
        }
    }
}

impl PointerDelta {
    /// A drag by `(dx, dy)` canvas pixels.
    pub fn drag(dx: f64, dy: f64) -> Self {
        Self {
            pan: Vec2::new(dx, dy),
            ..Self::default()
        }
    }

    /// Zoom by `factor` around the layer center.
    pub fn zoom(factor: f64) -> Self {
        Self {
            zoom: factor,
            ..Self::default()
        }
    }

    /// Zoom by `factor` keeping canvas point `anchor` fixed.
    pub fn zoom_at(factor: f64, anchor: Point) -> Self {
        Self {
            zoom: factor,
            anchor: Some(anchor),
            ..Self::default()
        }
    }

    /// Mouse wheel: positive notches zoom out, negative zoom in.
    pub fn wheel(notches: f64) -> Self {
        Self::zoom(WHEEL_ZOOM_STEP.powf(-notches))
    }

    /// Rotate by `degrees`.
    pub fn rotate_degrees(degrees: f64) -> Self {
        Self {
            rotate: degrees.to_radians(),
            ..Self::default()
        }
    }
}

/// Minimum uniform scale at which an `image_w × image_h` image covers the canvas.
pub fn covering_scale(image_w: u32, image_h: u32, canvas: CanvasSize) -> f64 {
    let c = canvas.as_f64();
    (c / f64::from(image_w.max(1))).max(c / f64::from(image_h.max(1)))
}

/// One positioned element of a composite.
#[derive(Clone, Debug)]
pub struct Layer {
    id: LayerId,
    slot: Slot,
    source: LayerSource,
    transform: LayerTransform,
    flags: RenderFlags,
    min_scale: f64,
}

impl Layer {
    /// An image layer placed at its covering scale, shifted by `offset`.
    pub(crate) fn image(
        id: LayerId,
        slot: Slot,
        image: PreparedImage,
        canvas: CanvasSize,
        offset: Vec2,
        flags: RenderFlags,
    ) -> Self {
        let min_scale = covering_scale(image.width, image.height, canvas);
        let mut transform = LayerTransform::at_scale(min_scale);
        if offset.is_finite() {
            transform.offset = offset;
        }
        Self {
            id,
            slot,
            source: LayerSource::Image(image),
            transform,
            flags,
            min_scale,
        }
    }

    /// A solid fill occupying the tint slot.
    pub(crate) fn color(id: LayerId, color: Color, masked: bool) -> Self {
        Self {
            id,
            slot: Slot::Tint,
            source: LayerSource::Color(color),
            transform: LayerTransform::at_scale(1.0),
            flags: RenderFlags {
                masked,
                tint_as_overlay: false,
                ..RenderFlags::default()
            },
            min_scale: 0.0,
        }
    }

    /// Layer identifier.
    pub fn id(&self) -> LayerId {
        self.id
    }

    /// Slot this layer occupies.
    pub fn slot(&self) -> Slot {
        self.slot
    }

    /// Visual content.
    pub fn source(&self) -> &LayerSource {
        &self.source
    }

    /// Current placement.
    pub fn transform(&self) -> LayerTransform {
        self.transform
    }

    /// Render attributes.
    pub fn flags(&self) -> RenderFlags {
        self.flags
    }

    /// Smallest scale pointer edits may reach.
    pub fn min_scale(&self) -> f64 {
        self.min_scale
    }

    pub(crate) fn flags_mut(&mut self) -> &mut RenderFlags {
        &mut self.flags
    }

    /// Apply a pointer delta. Returns `true` when the transform changed.
    ///
    /// Non-finite or non-positive components are ignored and the scale is clamped to
    /// [`Layer::min_scale`], so no sequence of deltas can uncover the canvas by zooming out.
    pub fn apply_delta(&mut self, delta: &PointerDelta, canvas: CanvasSize) -> bool {
        let before = self.transform;
        let t = &mut self.transform;

        if delta.pan.is_finite() {
            t.offset += delta.pan;
        }

        if delta.zoom.is_finite() && delta.zoom > 0.0 && delta.zoom != 1.0 {
            let old = t.scale;
            let new = (old * delta.zoom).max(self.min_scale);
            if let Some(anchor) = delta.anchor.filter(|a| a.is_finite())
                && old > 0.0
            {
                let a = anchor - canvas.center();
                t.offset = a + (t.offset - a) * (new / old);
            }
            t.scale = new;
        }

        if delta.rotate.is_finite() && delta.rotate != 0.0 {
            t.rotation = (t.rotation + delta.rotate).rem_euclid(TAU);
        }

        t.scale = t.scale.max(self.min_scale);
        self.transform != before
    }

    /// Mirror horizontally.
    pub fn flip(&mut self) {
        self.transform.mirror = !self.transform.mirror;
    }

    /// Move the image center back onto the canvas center.
    pub fn center(&mut self) {
        self.transform.offset = Vec2::ZERO;
    }

    /// Restore the covering placement: centered, minimum scale, unrotated, unmirrored.
    pub fn reset(&mut self) {
        let scale = if self.min_scale > 0.0 { self.min_scale } else { 1.0 };
        self.transform = LayerTransform::at_scale(scale);
    }

    /// Affine map from image pixel space to canvas pixel space. Identity for color layers.
    pub fn to_canvas(&self, canvas: CanvasSize) -> Affine {
        let LayerSource::Image(img) = &self.source else {
            return Affine::IDENTITY;
        };
        let t = self.transform;
        let sx = if t.mirror { -t.scale } else { t.scale };
        Affine::translate(canvas.center().to_vec2() + t.offset)
            * Affine::rotate(t.rotation)
            * Affine::scale_non_uniform(sx, t.scale)
            * Affine::translate(Vec2::new(
                -f64::from(img.width) / 2.0,
                -f64::from(img.height) / 2.0,
            ))
    }

    /// Axis-aligned bounds of the drawn image in canvas space; the whole canvas for colors.
    pub fn drawn_bounds(&self, canvas: CanvasSize) -> kurbo::Rect {
        match &self.source {
            LayerSource::Image(img) => self.to_canvas(canvas).transform_rect_bbox(kurbo::Rect::new(
                0.0,
                0.0,
                f64::from(img.width),
                f64::from(img.height),
            )),
            LayerSource::Color(_) => kurbo::Rect::new(0.0, 0.0, canvas.as_f64(), canvas.as_f64()),
        }
    }

    /// Draw this layer onto `surface`.
    ///
    /// Masked layers are multiplied by `mask` coverage. Tint-as-overlay layers composite with
    /// `overlay_blend`; everything else uses source-over.
    pub fn render_into(&self, surface: &mut Surface, mask: MaskShape, overlay_blend: BlendMode) {
        if !self.flags.visible || self.flags.opacity <= 0.0 {
            return;
        }
        let Ok(canvas) = CanvasSize::new(surface.width) else {
            return;
        };

        let sampler = match &self.source {
            LayerSource::Image(img) => {
                let inverse = self.to_canvas(canvas).inverse();
                if !inverse.is_finite() {
                    tracing::warn!(layer = self.id.0, "degenerate layer transform, skipping");
                    return;
                }
                Sampler::Image { img, inverse }
            }
            LayerSource::Color(c) => Sampler::Solid(c.to_premul().to_array()),
        };

        let flags = self.flags;
        let opacity = (flags.opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
        let mode = match flags.tint_color {
            Some(_) if flags.tint_as_overlay => overlay_blend,
            _ => BlendMode::Normal,
        };
        let stride = surface.stride();

        surface
            .data
            .par_chunks_mut(stride)
            .enumerate()
            .for_each(|(y, row)| {
                let y = y as u32;
                for (x, dst) in row.chunks_exact_mut(4).enumerate() {
                    let x = x as u32;
                    let mut coverage = opacity;
                    if flags.masked {
                        coverage =
                            mul_div255_u8(u16::from(coverage), u16::from(mask.coverage(x, y, canvas)));
                    }
                    if coverage == 0 {
                        continue;
                    }

                    let src = sampler.sample(x, y);
                    if src[3] == 0 {
                        continue;
                    }
                    let src = match flags.tint_color {
                        Some(tint) if flags.tint_as_overlay => blend::flat_fill(src[3], tint),
                        Some(tint) => blend::tint_multiply(src, tint),
                        None => src,
                    };
                    let src = blend::scale(src, coverage);

                    let out = blend::blend([dst[0], dst[1], dst[2], dst[3]], src, mode);
                    dst.copy_from_slice(&out);
                }
            });
    }
}

enum Sampler<'a> {
    Image {
        img: &'a PreparedImage,
        inverse: Affine,
    },
    Solid(PremulRgba8),
}

impl Sampler<'_> {
    fn sample(&self, x: u32, y: u32) -> PremulRgba8 {
        match self {
            Self::Solid(px) => *px,
            Self::Image { img, inverse } => {
                let p = *inverse * Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
                sample_bilinear(img, p)
            }
        }
    }
}

/// Bilinear sample at image-space point `p`. Transparent outside the image rectangle; neighbors
/// are clamped to the edge inside it so opaque images stay opaque up to their border.
fn sample_bilinear(img: &PreparedImage, p: Point) -> PremulRgba8 {
    let (w, h) = (f64::from(img.width), f64::from(img.height));
    if !(p.x >= 0.0 && p.y >= 0.0 && p.x < w && p.y < h) {
        return [0, 0, 0, 0];
    }

    let fx = (p.x - 0.5).clamp(0.0, w - 1.0);
    let fy = (p.y - 0.5).clamp(0.0, h - 1.0);
    let x0 = fx.floor() as u32;
    let y0 = fy.floor() as u32;
    let x1 = (x0 + 1).min(img.width - 1);
    let y1 = (y0 + 1).min(img.height - 1);
    let tx = fx - f64::from(x0);
    let ty = fy - f64::from(y0);

    let px = |x: u32, y: u32| {
        let idx = ((y as usize) * (img.width as usize) + (x as usize)) * 4;
        &img.rgba8_premul[idx..idx + 4]
    };
    let (p00, p10, p01, p11) = (px(x0, y0), px(x1, y0), px(x0, y1), px(x1, y1));

    let mut out = [0u8; 4];
    for i in 0..4 {
        let top = f64::from(p00[i]) * (1.0 - tx) + f64::from(p10[i]) * tx;
        let bottom = f64::from(p01[i]) * (1.0 - tx) + f64::from(p11[i]) * tx;
        out[i] = (top * (1.0 - ty) + bottom * ty).round().clamp(0.0, 255.0) as u8;
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/compose/layer.rs"]
mod tests;
