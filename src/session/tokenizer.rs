//! A tokenizer session: one avatar view, one token view, the commands that edit them and the
//! final export and upload.

use crate::{
    assets::{
        color::Color,
        decode::{PreparedImage, decode_image},
        fetch::{ImageFetcher, fetch_image, load_with_fallback},
    },
    compose::{
        export::EncodedImage,
        layer::{LayerId, PointerDelta},
        view::{ImageLayerOptions, View, ViewKind},
    },
    config::settings::TokenizerConfig,
    foundation::{
        core::{CanvasSize, Vec2},
        error::{TokenizerError, TokenizerResult},
    },
    session::{
        frames::{FrameCatalog, FrameDescriptor},
        naming::{file_name, numbered_wildcard_name, parent_dir, slug, wildcard_pattern},
        records::{HostRecords, RecordUpdate, cache_tag_now},
        request::{ActorKind, Disposition, TokenRequest},
        storage::{Permissions, Storage, StoragePath},
    },
};

/// A user action routed to one of the session's views.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Add an image from local file bytes.
    Upload {
        /// Receiving view.
        target: ViewKind,
        /// Encoded image.
        bytes: Vec<u8>,
    },
    /// Fetch an image and add it.
    Download {
        /// Receiving view.
        target: ViewKind,
        /// Location handed to the fetcher.
        url: String,
    },
    /// Add pasted or dropped image bytes to the paste target.
    Paste {
        /// Encoded image.
        bytes: Vec<u8>,
    },
    /// Choose which view receives pastes.
    SetPasteTarget(ViewKind),
    /// Put a frame on the token, listing it as a custom frame when it is new.
    SelectFrame {
        /// Frame location.
        path: String,
    },
    /// Add a solid color layer.
    AddColor {
        /// Receiving view.
        target: ViewKind,
        /// Fill color; the configured default when absent.
        color: Option<Color>,
    },
    /// Add the current composite of one view as an image in the other.
    CopyView {
        /// Source view.
        from: ViewKind,
        /// Receiving view.
        to: ViewKind,
    },
    /// Switch saving of a view on or off.
    ToggleModify(ViewKind),
    /// Route pointer edits to a layer.
    Activate {
        /// View holding the layer.
        target: ViewKind,
        /// Layer to activate.
        layer: LayerId,
    },
    /// Pan, zoom or rotate the active layer.
    Pointer {
        /// Edited view.
        target: ViewKind,
        /// Edit.
        delta: PointerDelta,
    },
    /// Mirror the active layer.
    Flip(ViewKind),
    /// Re-center the active layer.
    Center(ViewKind),
    /// Restore the active layer's covering placement.
    Reset(ViewKind),
    /// Show or hide a layer.
    SetVisible {
        /// View holding the layer.
        target: ViewKind,
        /// Layer to change.
        layer: LayerId,
        /// New visibility.
        visible: bool,
    },
    /// Encode the token for a local download.
    ExportToken,
}

/// Result of [`Tokenizer::dispatch`].
#[derive(Clone, Debug, PartialEq)]
pub enum CommandOutcome {
    /// A layer was added or replaced.
    Layer(LayerId),
    /// A setting or transform edit; `false` when nothing changed.
    Changed(bool),
    /// The encoded token and the file name it would be saved under.
    Exported {
        /// Suggested file name.
        file_name: String,
        /// Encoded token.
        blob: EncodedImage,
    },
}

/// What [`Tokenizer::load_images`] had to fall back on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// The token picture could not be loaded and the placeholder was used.
    pub token_fallback: bool,
    /// The avatar picture could not be loaded and the placeholder was used.
    pub avatar_fallback: bool,
    /// Why the default frame could not be added.
    pub frame_error: Option<String>,
}

/// Paths produced by [`Tokenizer::finalize`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenizeOutcome {
    /// Avatar path: the uploaded file, or the request's unchanged path.
    pub avatar_path: Option<String>,
    /// Token path: the uploaded file, or the request's unchanged path.
    pub token_path: Option<String>,
    /// An avatar was uploaded.
    pub avatar_uploaded: bool,
    /// A token was uploaded.
    pub token_uploaded: bool,
    /// Directory avatars are uploaded to.
    pub avatar_upload_directory: StoragePath,
    /// Directory tokens are uploaded to.
    pub token_upload_directory: StoragePath,
}

/// An interactive tokenizer session.
pub struct Tokenizer<F, S> {
    config: TokenizerConfig,
    request: TokenRequest,
    fetcher: F,
    storage: S,
    avatar: Option<View>,
    token: View,
    modify_avatar: bool,
    modify_token: bool,
    paste_target: ViewKind,
    avatar_dir: StoragePath,
    token_dir: StoragePath,
    avatar_file: String,
    token_file: String,
    frames: FrameCatalog,
    add_frame: bool,
    token_offset: Vec2,
}

impl<F, S> std::fmt::Debug for Tokenizer<F, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizer")
            .field("name", &self.request.name)
            .field("avatar_file", &self.avatar_file)
            .field("token_file", &self.token_file)
            .field("modify_avatar", &self.modify_avatar)
            .field("modify_token", &self.modify_token)
            .finish_non_exhaustive()
    }
}

impl<F: ImageFetcher, S: Storage> Tokenizer<F, S> {
    /// Open a session: check rights, resolve upload directories and file names, and create an
    /// empty token view. Call [`Tokenizer::load_images`] next.
    ///
    /// `discovered_frames` is the flat list of frames found by the host's frame scan.
    #[tracing::instrument(skip_all, fields(name = %request.name, kind = ?request.kind))]
    pub fn open(
        config: TokenizerConfig,
        request: TokenRequest,
        fetcher: F,
        storage: S,
        permissions: &dyn Permissions,
        discovered_frames: Vec<FrameDescriptor>,
    ) -> TokenizerResult<Self> {
        config.validate()?;
        request.validate()?;

        if !permissions.can_upload() {
            if config.disable_player {
                return Err(TokenizerError::missing_permission(
                    "file upload rights are required to tokenize",
                ));
            }
            tracing::warn!("user cannot upload files, results will not be saved");
        }

        let base = StoragePath::parse(match request.kind {
            ActorKind::Pc => config.image_upload_directory.as_str(),
            ActorKind::Npc => config.npc_upload_directory(),
        })?;
        let target = request
            .target_folder
            .as_deref()
            .map(StoragePath::parse)
            .transpose()?;
        let avatar_dir = target.clone().unwrap_or_else(|| base.clone());
        let token_dir = if request.wildcard
            && let Some(dir) = request.token_path.as_deref().and_then(parent_dir)
        {
            StoragePath::parse(dir)?
        } else {
            target.unwrap_or(base)
        };

        let name = slug(&request.name);
        if name.is_empty() {
            return Err(TokenizerError::validation(format!(
                "name '{}' leaves nothing to build a file name from",
                request.name
            )));
        }
        let codec = config.image_save_type;
        let avatar_file = file_name(&name, ViewKind::Avatar, &request.name_suffix, codec);
        let token_file = if request.wildcard {
            let pattern = match request.token_path.as_deref().filter(|p| p.contains('*')) {
                Some(p) => StoragePath::parse(p)?,
                None => token_dir.with_current(wildcard_pattern(&token_dir.current, &name, codec)),
            };
            let existing = storage.browse(&pattern)?.len();
            numbered_wildcard_name(&pattern.current, existing)
        } else {
            file_name(&name, ViewKind::Token, &request.name_suffix, codec)
        };

        let token = View::new(ViewKind::Token, CanvasSize::new(config.token_size)?)
            .with_overlay_blend(config.overlay_blend);
        let frames = FrameCatalog::new(&config, discovered_frames);
        let offset = config.default_token_offset;

        tracing::info!(
            avatar = %avatar_dir.join(&avatar_file),
            token = %token_dir.join(&token_file),
            frames = frames.frames().len(),
            "tokenizer session opened"
        );

        Ok(Self {
            token_offset: request.token_offset.unwrap_or(Vec2::new(offset, offset)),
            add_frame: config.add_frame_default || request.auto,
            modify_avatar: !config.token_only_toggle,
            modify_token: true,
            paste_target: config.paste_target,
            avatar: None,
            token,
            avatar_dir,
            token_dir,
            avatar_file,
            token_file,
            frames,
            fetcher,
            storage,
            config,
            request,
        })
    }

    /// Seed both views from the request.
    ///
    /// Wildcard tokens only receive the default frame. Other tokens get the optional color
    /// layer, their picture (or the placeholder) and, when frames are on, the default frame.
    /// The avatar view is sized to the larger of the picture and the configured portrait size.
    #[tracing::instrument(skip_all, fields(name = %self.request.name))]
    pub fn load_images(&mut self) -> TokenizerResult<LoadReport> {
        let mut report = LoadReport::default();
        if self.request.wildcard {
            report.frame_error = self.add_default_frame();
        } else {
            let (fallback, frame_error) = self.init_token()?;
            report.token_fallback = fallback;
            report.frame_error = frame_error;
        }
        report.avatar_fallback = self.init_avatar()?;
        Ok(report)
    }

    fn init_token(&mut self) -> TokenizerResult<(bool, Option<String>)> {
        let loaded = load_with_fallback(
            &self.fetcher,
            self.request.token_path.as_deref(),
            &self.config.fallback_image,
        )?;

        if self.config.default_color_layer {
            self.token.add_color_layer(self.config.default_color)?;
        }
        let mut options = ImageLayerOptions::background();
        if self.add_frame {
            options = options.with_offset(self.token_offset);
        }
        self.token.add_image_layer(loaded.image, options)?;

        let frame_error = if self.add_frame {
            self.add_default_frame()
        } else {
            None
        };
        Ok((loaded.used_fallback, frame_error))
    }

    fn init_avatar(&mut self) -> TokenizerResult<bool> {
        let loaded = load_with_fallback(
            &self.fetcher,
            self.request.avatar_path.as_deref(),
            &self.config.fallback_image,
        )?;
        let side = loaded
            .image
            .width
            .max(loaded.image.height)
            .max(self.config.portrait_size)
            .min(CanvasSize::MAX);
        tracing::debug!(side, "avatar canvas size");

        let mut view = View::new(ViewKind::Avatar, CanvasSize::new(side)?)
            .with_overlay_blend(self.config.overlay_blend);
        view.add_image_layer(loaded.image, ImageLayerOptions::background())?;
        if let Some(mut old) = self.avatar.replace(view) {
            old.dispose();
        }
        Ok(loaded.used_fallback)
    }

    fn add_default_frame(&mut self) -> Option<String> {
        match self.set_token_frame(None) {
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "default frame could not be added");
                Some(e.to_string())
            }
        }
    }

    /// Frame used when the user has not picked one.
    pub fn default_frame_path(&self) -> &str {
        let c = &self.config;
        if c.frame_tint {
            return &c.default_frame_tint;
        }
        match (self.request.kind, self.request.disposition) {
            (ActorKind::Pc, _) => &c.default_frame_pc,
            (ActorKind::Npc, Disposition::Neutral | Disposition::Friendly) => {
                &c.default_frame_neutral
            }
            (ActorKind::Npc, Disposition::Hostile) => &c.default_frame_npc,
        }
    }

    /// Tint applied to frames, by actor kind and disposition.
    pub fn frame_tint_color(&self) -> Color {
        let c = &self.config;
        match (self.request.kind, self.request.disposition) {
            (ActorKind::Pc, _) => c.default_frame_tint_pc,
            (ActorKind::Npc, Disposition::Neutral) => c.default_frame_tint_neutral,
            (ActorKind::Npc, Disposition::Friendly) => c.default_frame_tint_friendly,
            (ActorKind::Npc, Disposition::Hostile) => c.default_frame_tint_hostile,
        }
    }

    /// Only the default frame has the tint substituted for its own color.
    fn set_token_frame(&mut self, selected: Option<&str>) -> TokenizerResult<LayerId> {
        let path = selected.unwrap_or_else(|| self.default_frame_path());
        let location = StoragePath::parse(path)?.current;
        if location.is_empty() {
            return Err(TokenizerError::validation("no frame configured"));
        }
        let image = fetch_image(&self.fetcher, &location)?;
        let options = ImageLayerOptions::frame()
            .with_tint(self.frame_tint_color(), self.config.frame_tint && selected.is_none());
        let id = self.token.add_image_layer(image, options)?;
        tracing::debug!(frame = %location, "token frame set");
        Ok(id)
    }

    /// Apply a user command.
    pub fn dispatch(&mut self, command: Command) -> TokenizerResult<CommandOutcome> {
        tracing::debug!(command = command_name(&command), "dispatch");
        match command {
            Command::Upload { target, bytes } => {
                let image = decode_image(&bytes)?;
                self.add_image(target, image, ImageLayerOptions::background())
            }
            Command::Download { target, url } => {
                let image = fetch_image(&self.fetcher, &url)?;
                self.add_image(target, image, ImageLayerOptions::background())
            }
            Command::Paste { bytes } => {
                let image = decode_image(&bytes)?;
                self.add_image(self.paste_target, image, ImageLayerOptions::background())
            }
            Command::SetPasteTarget(target) => {
                let changed = self.paste_target != target;
                self.paste_target = target;
                Ok(CommandOutcome::Changed(changed))
            }
            Command::SelectFrame { path } => {
                self.ensure_modifiable(ViewKind::Token)?;
                self.frames.add_custom(&path);
                Ok(CommandOutcome::Layer(self.set_token_frame(Some(&path))?))
            }
            Command::AddColor { target, color } => {
                self.ensure_modifiable(target)?;
                let color = color.unwrap_or(self.config.default_color);
                Ok(CommandOutcome::Layer(self.view_mut(target)?.add_color_layer(color)?))
            }
            Command::CopyView { from, to } => {
                if from == to {
                    return Err(TokenizerError::validation("cannot copy a view onto itself"));
                }
                let image = PreparedImage::from_rgba_image(self.view(from)?.image()?)?;
                let mut options = ImageLayerOptions::background();
                if from == ViewKind::Avatar {
                    options = options.activated();
                }
                self.add_image(to, image, options)
            }
            Command::ToggleModify(target) => {
                let flag = match target {
                    ViewKind::Avatar => &mut self.modify_avatar,
                    ViewKind::Token => &mut self.modify_token,
                };
                *flag = !*flag;
                tracing::debug!(?target, enabled = *flag, "modify toggled");
                Ok(CommandOutcome::Changed(true))
            }
            Command::Activate { target, layer } => {
                Ok(CommandOutcome::Changed(self.view_mut(target)?.set_active_layer(layer)))
            }
            Command::Pointer { target, delta } => self.edit(target, |v| v.apply_pointer_delta(delta)),
            Command::Flip(target) => self.edit(target, View::flip_active),
            Command::Center(target) => self.edit(target, View::center_active),
            Command::Reset(target) => self.edit(target, View::reset_active),
            Command::SetVisible {
                target,
                layer,
                visible,
            } => self.edit(target, |v| v.set_layer_visible(layer, visible)),
            Command::ExportToken => Ok(CommandOutcome::Exported {
                file_name: self.token_file.clone(),
                blob: self.token.blob(self.config.image_save_type)?,
            }),
        }
    }

    fn add_image(
        &mut self,
        target: ViewKind,
        image: PreparedImage,
        options: ImageLayerOptions,
    ) -> TokenizerResult<CommandOutcome> {
        self.ensure_modifiable(target)?;
        Ok(CommandOutcome::Layer(
            self.view_mut(target)?.add_image_layer(image, options)?,
        ))
    }

    fn edit(
        &mut self,
        target: ViewKind,
        f: impl FnOnce(&mut View) -> bool,
    ) -> TokenizerResult<CommandOutcome> {
        self.ensure_modifiable(target)?;
        Ok(CommandOutcome::Changed(f(self.view_mut(target)?)))
    }

    fn ensure_modifiable(&self, target: ViewKind) -> TokenizerResult<()> {
        if self.modifies(target) {
            Ok(())
        } else {
            Err(TokenizerError::validation(format!(
                "{} output is switched off",
                kind_name(target)
            )))
        }
    }

    fn view_mut(&mut self, kind: ViewKind) -> TokenizerResult<&mut View> {
        match kind {
            ViewKind::Token => Ok(&mut self.token),
            ViewKind::Avatar => self
                .avatar
                .as_mut()
                .ok_or_else(|| TokenizerError::validation("avatar view is not loaded")),
        }
    }

    /// View for `kind`.
    pub fn view(&self, kind: ViewKind) -> TokenizerResult<&View> {
        match kind {
            ViewKind::Token => Ok(&self.token),
            ViewKind::Avatar => self
                .avatar
                .as_ref()
                .ok_or_else(|| TokenizerError::validation("avatar view is not loaded")),
        }
    }

    /// Export the switched-on views and upload them.
    ///
    /// Both exports are produced before anything is uploaded. On upload failure the views stay
    /// open so the user can retry.
    #[tracing::instrument(skip_all, fields(name = %self.request.name))]
    pub fn finalize(&mut self) -> TokenizerResult<TokenizeOutcome> {
        let codec = self.config.image_save_type;
        let avatar_blob = match (&self.avatar, self.modify_avatar) {
            (Some(view), true) => Some(view.blob(codec)?),
            _ => None,
        };
        let token_blob = if self.modify_token {
            Some(self.token.blob(codec)?)
        } else {
            None
        };

        let mut outcome = TokenizeOutcome {
            avatar_path: self.request.avatar_path.clone(),
            token_path: self.request.token_path.clone(),
            avatar_uploaded: false,
            token_uploaded: false,
            avatar_upload_directory: self.avatar_dir.clone(),
            token_upload_directory: self.token_dir.clone(),
        };
        if let Some(blob) = avatar_blob {
            let path = self
                .storage
                .upload(&blob, &self.avatar_dir, &self.avatar_file)?;
            tracing::info!(%path, "avatar saved");
            outcome.avatar_path = Some(path);
            outcome.avatar_uploaded = true;
        }
        if let Some(blob) = token_blob {
            let path = self.storage.upload(&blob, &self.token_dir, &self.token_file)?;
            tracing::info!(%path, "token saved");
            outcome.token_path = Some(path);
            outcome.token_uploaded = true;
        }
        Ok(outcome)
    }

    /// The host write-back for `outcome`.
    pub fn record_update(&self, outcome: &TokenizeOutcome, cache_tag: &str) -> RecordUpdate {
        RecordUpdate::build(outcome, &self.request, &self.config, cache_tag)
    }

    /// Dispose both views and hand back the storage.
    pub fn close(mut self) -> S {
        if let Some(avatar) = self.avatar.as_mut() {
            avatar.dispose();
        }
        self.token.dispose();
        self.storage
    }

    /// The request this session was opened with.
    pub fn request(&self) -> &TokenRequest {
        &self.request
    }

    /// Effective configuration.
    pub fn config(&self) -> &TokenizerConfig {
        &self.config
    }

    /// Frame catalog, including frames selected during the session.
    pub fn frames(&self) -> &FrameCatalog {
        &self.frames
    }

    /// Target file names `(avatar, token)`.
    pub fn file_names(&self) -> (&str, &str) {
        (&self.avatar_file, &self.token_file)
    }

    /// Upload directories `(avatar, token)`.
    pub fn upload_directories(&self) -> (&StoragePath, &StoragePath) {
        (&self.avatar_dir, &self.token_dir)
    }

    /// Return `true` when `kind` will be saved by [`Tokenizer::finalize`].
    pub fn modifies(&self, kind: ViewKind) -> bool {
        match kind {
            ViewKind::Avatar => self.modify_avatar,
            ViewKind::Token => self.modify_token,
        }
    }

    /// View receiving pastes.
    pub fn paste_target(&self) -> ViewKind {
        self.paste_target
    }

    /// Storage collaborator.
    pub fn storage(&self) -> &S {
        &self.storage
    }
}

fn kind_name(kind: ViewKind) -> &'static str {
    match kind {
        ViewKind::Avatar => "avatar",
        ViewKind::Token => "token",
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Upload { .. } => "upload",
        Command::Download { .. } => "download",
        Command::Paste { .. } => "paste",
        Command::SetPasteTarget(_) => "set-paste-target",
        Command::SelectFrame { .. } => "select-frame",
        Command::AddColor { .. } => "add-color",
        Command::CopyView { .. } => "copy-view",
        Command::ToggleModify(_) => "toggle-modify",
        Command::Activate { .. } => "activate",
        Command::Pointer { .. } => "pointer",
        Command::Flip(_) => "flip",
        Command::Center(_) => "center",
        Command::Reset(_) => "reset",
        Command::SetVisible { .. } => "set-visible",
        Command::ExportToken => "export-token",
    }
}

/// Non-interactive token pipeline: load the token with its default frame, upload it and
/// optionally write the new path back to the host record. The avatar is left untouched.
#[tracing::instrument(skip_all, fields(name = %request.name))]
pub fn auto_token<F: ImageFetcher, S: Storage>(
    config: TokenizerConfig,
    mut request: TokenRequest,
    fetcher: F,
    storage: S,
    permissions: &dyn Permissions,
    records: Option<&mut dyn HostRecords>,
) -> TokenizerResult<TokenizeOutcome> {
    request.auto = true;
    let mut session = Tokenizer::open(config, request, fetcher, storage, permissions, Vec::new())?;
    session.modify_avatar = false;
    let (_, frame_error) = session.init_token()?;
    if let Some(err) = frame_error {
        tracing::warn!(error = %err, "token saved without a frame");
    }
    let outcome = session.finalize()?;
    if let Some(records) = records {
        let update = session.record_update(&outcome, &cache_tag_now());
        records.apply(&update)?;
    }
    Ok(outcome)
}

#[cfg(test)]
#[path = "../../tests/unit/session/tokenizer.rs"]
mod tests;
