//! The compositor: one square canvas, an ordered set of slot layers, and exports.
//!
//! Every mutation recomposites synchronously into a cached surface, so exports are cheap and
//! always reflect the latest applied state. Image loading is split into
//! [`View::begin_image_layer`] and [`View::complete_image_layer`] so a caller can decode off the
//! event path; completions are sequenced per slot and only the most recently issued load for a
//! slot is ever applied.

use std::collections::HashMap;

use crate::{
    assets::{color::Color, decode::PreparedImage},
    compose::{
        blend::BlendMode,
        export::{EncodedImage, ImageCodec, encode_surface},
        layer::{Layer, LayerId, PointerDelta, RenderFlags, Slot},
        mask::MaskShape,
        surface::Surface,
    },
    foundation::{
        core::{CanvasSize, Vec2},
        error::{TokenizerError, TokenizerResult},
    },
};

/// Output target of a view. Decides the mask shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewKind {
    /// Rectangular character portrait.
    Avatar,
    /// Circular map token.
    Token,
}

impl ViewKind {
    /// Clip region used for masked layers.
    pub fn mask_shape(self) -> MaskShape {
        match self {
            Self::Avatar => MaskShape::Rectangle,
            Self::Token => MaskShape::Circle,
        }
    }
}

/// Lifecycle state of a [`View`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewState {
    /// No layers and nothing loading.
    Empty,
    /// At least one image load has been issued and not yet completed.
    Loading,
    /// The composite is valid and has at least one layer.
    Ready,
    /// Released; every further operation fails with [`TokenizerError::Disposed`].
    Disposed,
}

/// Options for [`View::add_image_layer`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ImageLayerOptions {
    /// Target slot. Defaults to [`Slot::Frame`] when `on_top`, else [`Slot::Background`].
    pub slot: Option<Slot>,
    /// Clip to the view's mask. Defaults to `true` on token views and `false` on avatar views.
    pub masked: Option<bool>,
    /// Draw above all other layers.
    pub on_top: bool,
    /// Tint applied to the layer's pixels.
    pub tint_color: Option<Color>,
    /// Substitute the tint for the layer's own color (see [`RenderFlags::tint_as_overlay`]).
    pub tint_as_overlay: bool,
    /// Initial displacement from the centered position.
    pub offset: Vec2,
    /// Make the new layer the target of pointer edits.
    pub activate: bool,
}

impl ImageLayerOptions {
    /// Options for a plain background image.
    pub fn background() -> Self {
        Self::default()
    }

    /// Options for a frame overlay: masked and drawn on top.
    pub fn frame() -> Self {
        Self {
            slot: Some(Slot::Frame),
            masked: Some(true),
            on_top: true,
            ..Self::default()
        }
    }

    /// Set the tint color and whether it replaces the layer's own color.
    pub fn with_tint(mut self, color: Color, as_overlay: bool) -> Self {
        self.tint_color = Some(color);
        self.tint_as_overlay = as_overlay;
        self
    }

    /// Set the initial offset.
    pub fn with_offset(mut self, offset: Vec2) -> Self {
        self.offset = offset;
        self
    }

    /// Activate the layer once added.
    pub fn activated(mut self) -> Self {
        self.activate = true;
        self
    }

    fn resolve_slot(&self) -> Slot {
        self.slot.unwrap_or(if self.on_top {
            Slot::Frame
        } else {
            Slot::Background
        })
    }
}

/// Handle for an image load issued with [`View::begin_image_layer`]. Completing it consumes it.
///
/// Tickets cannot be duplicated:
///
/// ```compile_fail
/// fn needs_clone<T: Clone>() {}
/// needs_clone::<tokensmith::LoadTicket>();
/// ```
#[derive(Debug, PartialEq)]
#[must_use = "a load ticket must be completed for the view to leave the loading state"]
pub struct LoadTicket {
    slot: Slot,
    seq: u64,
    options: ImageLayerOptions,
}

impl LoadTicket {
    /// Slot the load targets.
    pub fn slot(&self) -> Slot {
        self.slot
    }

    /// Per-slot sequence number; larger is newer.
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// Result of [`View::complete_image_layer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The image was placed as this layer.
    Applied(LayerId),
    /// A newer load for the same slot was issued; this result was discarded.
    Superseded,
}

/// Export format for [`View::get`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportRequest {
    /// Straight-alpha image for display.
    Image,
    /// Encoded bytes for upload.
    Blob(ImageCodec),
    /// The raw premultiplied backing surface.
    Canvas,
}

/// Output of [`View::get`].
#[derive(Clone, Debug)]
pub enum Export {
    /// Straight-alpha image at canvas resolution.
    Image(image::RgbaImage),
    /// Encoded payload.
    Blob(EncodedImage),
    /// Premultiplied surface.
    Canvas(Surface),
}

/// Host-side receiver of composites, e.g. the on-screen preview element.
pub trait Presenter: Send {
    /// Called after every recomposite with the new surface.
    fn present(&mut self, surface: &Surface);
}

/// The compositing surface for one output target.
pub struct View {
    kind: ViewKind,
    size: CanvasSize,
    layers: Vec<Layer>,
    active: Option<LayerId>,
    next_id: u64,
    issued: HashMap<Slot, u64>,
    pending: HashMap<Slot, u64>,
    overlay_blend: BlendMode,
    composite: Surface,
    presenter: Option<Box<dyn Presenter>>,
    disposed: bool,
}

impl std::fmt::Debug for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("View")
            .field("kind", &self.kind)
            .field("size", &self.size)
            .field("layers", &self.layers.len())
            .field("active", &self.active)
            .field("state", &self.state())
            .finish()
    }
}

impl View {
    /// Create an empty view of `size × size` pixels.
    pub fn new(kind: ViewKind, size: CanvasSize) -> Self {
        Self {
            kind,
            size,
            layers: Vec::new(),
            active: None,
            next_id: 1,
            issued: HashMap::new(),
            pending: HashMap::new(),
            overlay_blend: BlendMode::Multiply,
            composite: Surface::new(size),
            presenter: None,
            disposed: false,
        }
    }

    /// Attach the host's presenter; it immediately receives the current composite.
    pub fn with_presenter(mut self, presenter: Box<dyn Presenter>) -> Self {
        self.presenter = Some(presenter);
        self.present();
        self
    }

    /// Blend mode used by tint-as-overlay layers. Defaults to [`BlendMode::Multiply`].
    pub fn with_overlay_blend(mut self, mode: BlendMode) -> Self {
        self.overlay_blend = mode;
        self.recomposite();
        self
    }

    /// Output target.
    pub fn kind(&self) -> ViewKind {
        self.kind
    }

    /// Canvas side length.
    pub fn size(&self) -> CanvasSize {
        self.size
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ViewState {
        if self.disposed {
            ViewState::Disposed
        } else if !self.pending.is_empty() {
            ViewState::Loading
        } else if self.layers.is_empty() {
            ViewState::Empty
        } else {
            ViewState::Ready
        }
    }

    /// Layers in array order (on-top layers are drawn last regardless of position).
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// The layer occupying `slot`, if any.
    pub fn layer(&self, slot: Slot) -> Option<&Layer> {
        self.layers.iter().find(|l| l.slot() == slot)
    }

    /// The layer receiving pointer edits.
    pub fn active_layer(&self) -> Option<LayerId> {
        self.active
    }

    /// Place a decoded image into its slot, replacing any previous occupant.
    pub fn add_image_layer(
        &mut self,
        image: PreparedImage,
        options: ImageLayerOptions,
    ) -> TokenizerResult<LayerId> {
        self.ensure_live()?;
        // Rejected before a ticket exists so in-flight loads for the slot stay current.
        if image.is_empty() {
            return Err(empty_image_error());
        }
        let ticket = self.begin_image_layer(options)?;
        match self.complete_image_layer(ticket, Ok(image))? {
            LoadOutcome::Applied(id) => Ok(id),
            // A fresh ticket is always the newest for its slot.
            LoadOutcome::Superseded => Err(TokenizerError::validation(
                "image layer superseded before it could be applied",
            )),
        }
    }

    /// Issue a load for the slot selected by `options`. The view stays in
    /// [`ViewState::Loading`] until the newest ticket of every slot is completed.
    pub fn begin_image_layer(&mut self, options: ImageLayerOptions) -> TokenizerResult<LoadTicket> {
        self.ensure_live()?;
        let slot = options.resolve_slot();
        let seq = self.issued.entry(slot).or_insert(0);
        *seq += 1;
        let seq = *seq;
        self.pending.insert(slot, seq);
        tracing::debug!(kind = ?self.kind, ?slot, seq, "image layer load issued");
        Ok(LoadTicket { slot, seq, options })
    }

    /// Resolve a load issued by [`View::begin_image_layer`].
    ///
    /// Results for tickets that are no longer the newest of their slot are discarded, so the
    /// last issued load wins no matter in which order decodes finish. A failed current load
    /// leaves the layers untouched and is returned to the caller.
    pub fn complete_image_layer(
        &mut self,
        ticket: LoadTicket,
        result: TokenizerResult<PreparedImage>,
    ) -> TokenizerResult<LoadOutcome> {
        self.ensure_live()?;
        let latest = self.issued.get(&ticket.slot).copied().unwrap_or(0);
        if ticket.seq != latest {
            tracing::debug!(
                kind = ?self.kind,
                slot = ?ticket.slot,
                seq = ticket.seq,
                latest,
                "discarding stale image load"
            );
            return Ok(LoadOutcome::Superseded);
        }
        self.pending.remove(&ticket.slot);

        let image = result?;
        if image.is_empty() {
            return Err(empty_image_error());
        }

        let opts = ticket.options;
        let flags = RenderFlags {
            masked: opts.masked.unwrap_or(self.kind == ViewKind::Token),
            on_top: opts.on_top,
            tint_color: opts.tint_color,
            tint_as_overlay: opts.tint_as_overlay,
            ..RenderFlags::default()
        };
        let id = self.alloc_id();
        let (w, h) = (image.width, image.height);
        let layer = Layer::image(id, ticket.slot, image, self.size, opts.offset, flags);
        tracing::debug!(
            kind = ?self.kind,
            slot = ?ticket.slot,
            width = w,
            height = h,
            scale = layer.transform().scale,
            "image layer applied"
        );

        let replaced = self.place(layer, false);
        if opts.activate || self.active.is_none() || (replaced.is_some() && replaced == self.active)
        {
            self.active = Some(id);
        }
        self.recomposite();
        Ok(LoadOutcome::Applied(id))
    }

    /// Fill the tint slot with a solid color, replacing any previous fill.
    ///
    /// A new fill goes beneath every other layer.
    pub fn add_color_layer(&mut self, color: Color) -> TokenizerResult<LayerId> {
        self.ensure_live()?;
        let id = self.alloc_id();
        let masked = self.kind == ViewKind::Token;
        let replaced = self.place(Layer::color(id, color, masked), true);
        if replaced.is_some() && replaced == self.active {
            self.active = Some(id);
        }
        tracing::debug!(kind = ?self.kind, %color, "color layer applied");
        self.recomposite();
        Ok(id)
    }

    /// Route subsequent pointer edits to `id`. Returns `false` (and changes nothing) when no
    /// such layer exists.
    pub fn set_active_layer(&mut self, id: LayerId) -> bool {
        if self.disposed || !self.layers.iter().any(|l| l.id() == id) {
            return false;
        }
        self.active = Some(id);
        true
    }

    /// Apply a pointer delta to the active layer. Returns `true` when something changed.
    pub fn apply_pointer_delta(&mut self, delta: PointerDelta) -> bool {
        let size = self.size;
        let changed = self
            .active_mut()
            .is_some_and(|layer| layer.apply_delta(&delta, size));
        if changed {
            self.recomposite();
        }
        changed
    }

    /// Mirror the active layer horizontally.
    pub fn flip_active(&mut self) -> bool {
        self.edit_active(Layer::flip)
    }

    /// Re-center the active layer.
    pub fn center_active(&mut self) -> bool {
        self.edit_active(Layer::center)
    }

    /// Restore the active layer's covering placement.
    pub fn reset_active(&mut self) -> bool {
        self.edit_active(Layer::reset)
    }

    /// Show or hide a layer.
    pub fn set_layer_visible(&mut self, id: LayerId, visible: bool) -> bool {
        self.edit_layer(id, |l| l.flags_mut().visible = visible)
    }

    /// Set a layer's opacity, clamped to `0..=1`.
    pub fn set_layer_opacity(&mut self, id: LayerId, opacity: f32) -> bool {
        let opacity = if opacity.is_finite() {
            opacity.clamp(0.0, 1.0)
        } else {
            1.0
        };
        self.edit_layer(id, |l| l.flags_mut().opacity = opacity)
    }

    /// Move a layer one step towards the top of the draw order.
    pub fn raise_layer(&mut self, id: LayerId) -> bool {
        match self.index_of(id) {
            Some(i) if i + 1 < self.layers.len() => {
                self.layers.swap(i, i + 1);
                self.recomposite();
                true
            }
            _ => false,
        }
    }

    /// Move a layer one step towards the bottom of the draw order.
    pub fn lower_layer(&mut self, id: LayerId) -> bool {
        match self.index_of(id) {
            Some(i) if i > 0 => {
                self.layers.swap(i, i - 1);
                self.recomposite();
                true
            }
            _ => false,
        }
    }

    /// Export the current composite. Never mutates the view.
    #[tracing::instrument(skip(self), fields(kind = ?self.kind, size = self.size.px()))]
    pub fn get(&self, request: ExportRequest) -> TokenizerResult<Export> {
        self.ensure_live()?;
        Ok(match request {
            ExportRequest::Image => Export::Image(self.composite.to_rgba_image()?),
            ExportRequest::Blob(codec) => Export::Blob(encode_surface(&self.composite, codec)?),
            ExportRequest::Canvas => Export::Canvas(self.composite.clone()),
        })
    }

    /// Shorthand for `get(ExportRequest::Image)`.
    pub fn image(&self) -> TokenizerResult<image::RgbaImage> {
        self.ensure_live()?;
        self.composite.to_rgba_image()
    }

    /// Shorthand for `get(ExportRequest::Blob(codec))`.
    pub fn blob(&self, codec: ImageCodec) -> TokenizerResult<EncodedImage> {
        self.ensure_live()?;
        encode_surface(&self.composite, codec)
    }

    /// Borrow the backing surface.
    pub fn canvas(&self) -> TokenizerResult<&Surface> {
        self.ensure_live()?;
        Ok(&self.composite)
    }

    /// Release layers, surface and presenter. Terminal.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        tracing::debug!(kind = ?self.kind, "view disposed");
        self.layers.clear();
        self.active = None;
        self.pending.clear();
        self.presenter = None;
        self.composite = Surface {
            width: 0,
            height: 0,
            data: Vec::new(),
        };
        self.disposed = true;
    }

    fn ensure_live(&self) -> TokenizerResult<()> {
        if self.disposed {
            return Err(TokenizerError::Disposed);
        }
        Ok(())
    }

    fn alloc_id(&mut self) -> LayerId {
        let id = LayerId(self.next_id);
        self.next_id += 1;
        id
    }

    fn index_of(&self, id: LayerId) -> Option<usize> {
        self.layers.iter().position(|l| l.id() == id)
    }

    /// Put `layer` into its slot. Returns the id of the layer it replaced.
    fn place(&mut self, layer: Layer, new_at_bottom: bool) -> Option<LayerId> {
        match self.layers.iter().position(|l| l.slot() == layer.slot()) {
            Some(i) => {
                let old = std::mem::replace(&mut self.layers[i], layer);
                Some(old.id())
            }
            None => {
                if new_at_bottom {
                    self.layers.insert(0, layer);
                } else {
                    self.layers.push(layer);
                }
                None
            }
        }
    }

    fn active_mut(&mut self) -> Option<&mut Layer> {
        let id = self.active?;
        self.layers.iter_mut().find(|l| l.id() == id)
    }

    fn edit_active(&mut self, f: impl FnOnce(&mut Layer)) -> bool {
        match self.active {
            Some(id) => self.edit_layer(id, f),
            None => false,
        }
    }

    fn edit_layer(&mut self, id: LayerId, f: impl FnOnce(&mut Layer)) -> bool {
        let Some(layer) = self.layers.iter_mut().find(|l| l.id() == id) else {
            return false;
        };
        f(layer);
        self.recomposite();
        true
    }

    #[tracing::instrument(level = "trace", skip(self), fields(kind = ?self.kind, layers = self.layers.len()))]
    fn recomposite(&mut self) {
        if self.disposed {
            return;
        }
        let mask = self.kind.mask_shape();
        self.composite.clear();
        let (top, base): (Vec<&Layer>, Vec<&Layer>) =
            self.layers.iter().partition(|l| l.flags().on_top);
        for layer in base.into_iter().chain(top) {
            layer.render_into(&mut self.composite, mask, self.overlay_blend);
        }
        self.present();
    }

    fn present(&mut self) {
        if let Some(p) = self.presenter.as_mut() {
            p.present(&self.composite);
        }
    }
}

fn empty_image_error() -> TokenizerError {
    TokenizerError::decode("<image layer>", "image has zero width or height")
}

#[cfg(test)]
#[path = "../../tests/unit/compose/view.rs"]
mod tests;
