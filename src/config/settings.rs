//! Session configuration.
//!
//! Keys are kebab-case and every field has a default, so a JSON file only needs the settings it
//! changes. A config is validated once when a session opens and then passed around explicitly.

use std::path::Path;

use anyhow::Context as _;

use crate::{
    assets::color::Color,
    compose::{blend::BlendMode, export::ImageCodec, view::ViewKind},
    foundation::{
        core::CanvasSize,
        error::{TokenizerError, TokenizerResult},
    },
    session::{frames::FrameDescriptor, storage::StoragePath},
};

/// Built-in frame for player characters.
pub const BUILTIN_FRAME_PC: &str = "assets/frames/default-frame-pc.png";
/// Built-in frame for non-player characters.
pub const BUILTIN_FRAME_NPC: &str = "assets/frames/default-frame-npc.png";
/// Built-in grey frame intended to be tinted.
pub const BUILTIN_FRAME_TINT: &str = "assets/frames/default-frame-tint.png";
/// Placeholder used when an image cannot be loaded.
pub const DEFAULT_FALLBACK_IMAGE: &str = "icons/svg/mystery-man.svg";

/// Every setting a tokenizer session reads.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct TokenizerConfig {
    /// Minimum avatar canvas side; larger source images keep their size.
    pub portrait_size: u32,
    /// Token canvas side.
    pub token_size: u32,
    /// Codec for uploaded files.
    pub image_save_type: ImageCodec,

    /// Fill used by color layers when none is given.
    pub default_color: Color,
    /// Seed new tokens with a color layer beneath the picture.
    pub default_color_layer: bool,
    /// Add the default frame to new tokens.
    pub add_frame_default: bool,
    /// Use the tint frame and substitute the disposition color into it.
    pub frame_tint: bool,

    /// Default frame for player characters.
    pub default_frame_pc: String,
    /// Default frame for hostile non-player characters.
    pub default_frame_npc: String,
    /// Default frame for neutral and friendly non-player characters.
    pub default_frame_neutral: String,
    /// Frame used when `frame-tint` is on.
    pub default_frame_tint: String,

    /// Frame tint for player characters.
    pub default_frame_tint_pc: Color,
    /// Frame tint for hostile non-player characters.
    pub default_frame_tint_hostile: Color,
    /// Frame tint for neutral non-player characters.
    pub default_frame_tint_neutral: Color,
    /// Frame tint for friendly non-player characters.
    pub default_frame_tint_friendly: Color,

    /// Offset (both axes, canvas pixels) applied to the token picture when a frame is added.
    pub default_token_offset: f64,
    /// Start sessions with avatar output switched off.
    pub token_only_toggle: bool,
    /// View receiving pasted images.
    pub paste_target: ViewKind,
    /// Refuse to open sessions for users without upload rights.
    pub disable_player: bool,
    /// Blend mode used by tinted overlay frames.
    pub overlay_blend: BlendMode,
    /// Enable the host's dynamic token ring on written-back records.
    pub auto_apply_dynamic_token_ring: bool,
    /// Record field holding the avatar path.
    pub avatar_key: String,

    /// Upload directory for player characters, `[source] path` syntax.
    pub image_upload_directory: String,
    /// Upload directory for non-player characters.
    pub npc_image_upload_directory: String,
    /// Directory scanned for additional frames.
    pub frame_directory: String,
    /// Placeholder image location.
    pub fallback_image: String,
    /// Frames the user picked from outside the catalog.
    pub custom_frames: Vec<FrameDescriptor>,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            portrait_size: 400,
            token_size: 400,
            image_save_type: ImageCodec::Webp,
            default_color: Color::WHITE,
            default_color_layer: false,
            add_frame_default: true,
            frame_tint: false,
            default_frame_pc: BUILTIN_FRAME_PC.to_string(),
            default_frame_npc: BUILTIN_FRAME_NPC.to_string(),
            default_frame_neutral: BUILTIN_FRAME_NPC.to_string(),
            default_frame_tint: BUILTIN_FRAME_TINT.to_string(),
            default_frame_tint_pc: Color::rgb(0x3b, 0x7d, 0xd8),
            default_frame_tint_hostile: Color::rgb(0xc0, 0x39, 0x2b),
            default_frame_tint_neutral: Color::rgb(0xf1, 0xc4, 0x0f),
            default_frame_tint_friendly: Color::rgb(0x27, 0xae, 0x60),
            default_token_offset: -35.0,
            token_only_toggle: false,
            paste_target: ViewKind::Token,
            disable_player: false,
            overlay_blend: BlendMode::Multiply,
            auto_apply_dynamic_token_ring: false,
            avatar_key: "img".to_string(),
            image_upload_directory: "[data] tokenizer/pc_images".to_string(),
            npc_image_upload_directory: "[data] tokenizer/npc_images".to_string(),
            frame_directory: String::new(),
            fallback_image: DEFAULT_FALLBACK_IMAGE.to_string(),
            custom_frames: Vec::new(),
        }
    }
}

impl TokenizerConfig {
    /// Parse a JSON document. Missing keys take their defaults.
    pub fn from_json_str(json: &str) -> TokenizerResult<Self> {
        serde_json::from_str(json).map_err(|e| TokenizerError::config(format!("parse config: {e}")))
    }

    /// Read and parse a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> TokenizerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config '{}'", path.display()))
            .map_err(|e| TokenizerError::config(format!("{e:#}")))?;
        let cfg = Self::from_json_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(cfg)
    }

    /// Check every setting the session relies on.
    pub fn validate(&self) -> TokenizerResult<()> {
        CanvasSize::new(self.portrait_size)
            .map_err(|e| TokenizerError::config(format!("portrait-size: {e}")))?;
        CanvasSize::new(self.token_size)
            .map_err(|e| TokenizerError::config(format!("token-size: {e}")))?;

        if !self.default_token_offset.is_finite() {
            return Err(TokenizerError::config("default-token-offset must be finite"));
        }
        if self.avatar_key.trim().is_empty() {
            return Err(TokenizerError::config("avatar-key must be non-empty"));
        }
        if self.fallback_image.trim().is_empty() {
            return Err(TokenizerError::config("fallback-image must be non-empty"));
        }
        for (name, dir) in [
            ("image-upload-directory", &self.image_upload_directory),
            ("npc-image-upload-directory", &self.npc_image_upload_directory),
        ] {
            StoragePath::parse(dir).map_err(|e| TokenizerError::config(format!("{name}: {e}")))?;
        }
        if !self.frame_directory.trim().is_empty() {
            StoragePath::parse(&self.frame_directory)
                .map_err(|e| TokenizerError::config(format!("frame-directory: {e}")))?;
        }
        for frame in &self.custom_frames {
            if frame.key.trim().is_empty() {
                return Err(TokenizerError::config("custom-frames entries need a key"));
            }
        }
        Ok(())
    }

    /// Upload directory for an NPC when one is configured, else the character directory.
    pub(crate) fn npc_upload_directory(&self) -> &str {
        if self.npc_image_upload_directory.trim().is_empty() {
            &self.image_upload_directory
        } else {
            &self.npc_image_upload_directory
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/config/settings.rs"]
mod tests;
