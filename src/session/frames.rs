//! The list of frames a user can pick from.

use crate::{
    config::settings::{BUILTIN_FRAME_NPC, BUILTIN_FRAME_PC, TokenizerConfig},
    session::naming::trim_slashes,
};

/// File extensions accepted as frame images.
pub const FRAME_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "gif", "webp", "webm", "bmp"];

/// One selectable frame.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameDescriptor {
    /// Frame image location.
    pub key: String,
    /// Display label.
    pub label: String,
    /// Preselected in pickers.
    #[serde(default)]
    pub selected: bool,
}

impl FrameDescriptor {
    /// Describe the frame at `path`, deriving its label from the file name.
    pub fn from_path(path: &str, selected: bool) -> Self {
        Self {
            key: path.to_string(),
            label: frame_label(path),
            selected,
        }
    }

    fn labelled(key: &str, label: &str, selected: bool) -> Self {
        Self {
            key: trim_slashes(key).to_string(),
            label: label.to_string(),
            selected,
        }
    }
}

/// `frames/frame-gold_ring.png` becomes `Gold Ring`.
pub fn frame_label(path: &str) -> String {
    let file = path.rsplit('/').next().unwrap_or(path).trim();
    let file = file.strip_prefix("frame-").unwrap_or(file);
    let spaced = file.replace(['-', '_'], " ");
    let titled = title_case(&spaced);
    match titled.split_once('.') {
        Some((stem, _)) => stem.to_string(),
        None => titled,
    }
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut word_start = true;
    for c in s.chars() {
        if c.is_whitespace() {
            word_start = true;
            out.push(c);
        } else if word_start {
            out.extend(c.to_uppercase());
            word_start = false;
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}

/// Return `true` when `path` has an accepted frame image extension.
pub fn is_frame_file(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    FRAME_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Default, discovered and custom frames, deduplicated by key.
#[derive(Clone, Debug, Default)]
pub struct FrameCatalog {
    frames: Vec<FrameDescriptor>,
    custom: Vec<FrameDescriptor>,
}

impl FrameCatalog {
    /// Build the catalog: configured defaults first, then `discovered` (non-image files are
    /// skipped), then the configured custom frames.
    pub fn new(config: &TokenizerConfig, discovered: Vec<FrameDescriptor>) -> Self {
        let mut catalog = Self::default();
        for frame in default_frames(config) {
            catalog.push(frame);
        }
        for frame in discovered.into_iter().filter(|f| is_frame_file(&f.key)) {
            catalog.push(frame);
        }
        for frame in &config.custom_frames {
            catalog.custom.push(frame.clone());
            catalog.push(frame.clone());
        }
        catalog
    }

    /// Every frame in display order.
    pub fn frames(&self) -> &[FrameDescriptor] {
        &self.frames
    }

    /// Frames added by the user.
    pub fn custom(&self) -> &[FrameDescriptor] {
        &self.custom
    }

    /// Return `true` when a frame with `key` is listed.
    pub fn contains(&self, key: &str) -> bool {
        self.frames.iter().any(|f| f.key == key)
    }

    /// Add `path` as a custom frame unless it is already listed. Returns `true` when added.
    pub fn add_custom(&mut self, path: &str) -> bool {
        if self.contains(path) {
            return false;
        }
        let frame = FrameDescriptor::from_path(path, false);
        tracing::debug!(key = %frame.key, label = %frame.label, "custom frame added");
        self.custom.push(frame.clone());
        self.frames.push(frame);
        true
    }

    fn push(&mut self, frame: FrameDescriptor) {
        if !self.contains(&frame.key) {
            self.frames.push(frame);
        }
    }
}

/// Frames derived from the configuration: tint, PC and NPC defaults, the built-in frames when
/// the configured ones differ, and the neutral NPC frame when it differs from the hostile one.
pub fn default_frames(config: &TokenizerConfig) -> Vec<FrameDescriptor> {
    let npc = trim_slashes(&config.default_frame_npc);
    let neutral = trim_slashes(&config.default_frame_neutral);
    let pc = trim_slashes(&config.default_frame_pc);
    let npc_differs = npc != neutral;

    let mut frames = vec![
        FrameDescriptor::labelled(&config.default_frame_tint, "Tint frame", false),
        FrameDescriptor::labelled(pc, "Default PC frame", false),
        FrameDescriptor::labelled(
            npc,
            if npc_differs {
                "Default hostile NPC frame"
            } else {
                "Default NPC frame"
            },
            true,
        ),
    ];

    if pc != BUILTIN_FRAME_PC {
        frames.push(FrameDescriptor::labelled(
            BUILTIN_FRAME_PC,
            "Built-in PC frame",
            false,
        ));
    }
    if npc != BUILTIN_FRAME_NPC {
        frames.push(FrameDescriptor::labelled(
            BUILTIN_FRAME_NPC,
            if npc_differs {
                "Built-in hostile NPC frame"
            } else {
                "Built-in NPC frame"
            },
            false,
        ));
    }
    if npc_differs {
        frames.push(FrameDescriptor::labelled(
            neutral,
            "Default neutral NPC frame",
            false,
        ));
    }
    frames
}

#[cfg(test)]
#[path = "../../tests/unit/session/frames.rs"]
mod tests;
