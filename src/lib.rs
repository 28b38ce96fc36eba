//! Tokensmith composes character avatars and circular tokens from layered artwork.
//!
//! The building blocks are:
//!
//! - [`View`]: a square canvas holding an ordered stack of [`Layer`]s (pictures, frames and
//!   solid color fills) that is recomposited after every edit and exported as pixels, encoded
//!   blobs or the raw [`Surface`].
//! - [`Tokenizer`]: a session pairing an avatar view with a token view. It resolves upload
//!   directories and file names, seeds both views from a [`TokenRequest`], routes user
//!   [`Command`]s, and finally uploads the results through a [`Storage`] backend.
//! - [`auto_token`]: the non-interactive pipeline that produces a framed token and writes the
//!   new path back to a host record.
//!
//! All rendering is done on the CPU in premultiplied RGBA8 and is deterministic for identical
//! inputs.
#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

mod assets;
mod compose;
mod config;
mod foundation;
mod session;

pub use crate::foundation::core::{Affine, CanvasSize, Point, Rgba8Premul, Vec2};
pub use crate::foundation::error::{TokenizerError, TokenizerResult};

pub use crate::assets::color::Color;
pub use crate::assets::decode::{PreparedImage, decode_image, decode_image_at};
pub use crate::assets::fetch::{
    FsFetcher, ImageFetcher, LoadedImage, MemoryFetcher, fetch_image, load_with_fallback,
};

pub use crate::compose::blend::BlendMode;
pub use crate::compose::export::{EncodedImage, ImageCodec, encode_surface};
pub use crate::compose::layer::{
    Layer, LayerId, LayerSource, LayerTransform, PointerDelta, RenderFlags, Slot,
    WHEEL_ZOOM_STEP, covering_scale,
};
pub use crate::compose::mask::MaskShape;
pub use crate::compose::surface::Surface;
pub use crate::compose::view::{
    Export, ExportRequest, ImageLayerOptions, LoadOutcome, LoadTicket, Presenter, View, ViewKind,
    ViewState,
};

pub use crate::config::settings::{
    BUILTIN_FRAME_NPC, BUILTIN_FRAME_PC, BUILTIN_FRAME_TINT, DEFAULT_FALLBACK_IMAGE,
    TokenizerConfig,
};

pub use crate::session::frames::{
    FRAME_EXTENSIONS, FrameCatalog, FrameDescriptor, default_frames, frame_label, is_frame_file,
};
pub use crate::session::naming::{file_name, slug};
pub use crate::session::records::{HostRecords, RecordUpdate, RingUpdate, cache_tag_now};
pub use crate::session::request::{ActorKind, Disposition, TokenRequest};
pub use crate::session::storage::{
    DEFAULT_SOURCE, FsStorage, Grants, MemoryStorage, Permissions, Storage, StoragePath,
};
pub use crate::session::tokenizer::{
    Command, CommandOutcome, LoadReport, TokenizeOutcome, Tokenizer, auto_token,
};
