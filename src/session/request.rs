use crate::foundation::{
    core::Vec2,
    error::{TokenizerError, TokenizerResult},
};

/// Whether the record belongs to a player character.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorKind {
    /// Player character.
    #[default]
    Pc,
    /// Non-player character.
    Npc,
}

/// Token attitude towards the players.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    /// `-1`.
    #[default]
    Hostile,
    /// `0`.
    Neutral,
    /// `1`.
    Friendly,
}

impl Disposition {
    /// Map the host's numeric disposition; anything unrecognized is hostile.
    pub fn from_i64(v: i64) -> Self {
        match v {
            0 => Self::Neutral,
            1 => Self::Friendly,
            _ => Self::Hostile,
        }
    }
}

/// What to tokenize and where the current images live.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TokenRequest {
    /// Display name, used to derive file names.
    pub name: String,
    /// Player or non-player character.
    pub kind: ActorKind,
    /// Token disposition.
    pub disposition: Disposition,
    /// Current avatar image.
    pub avatar_path: Option<String>,
    /// Current token image (may contain `*` for wildcard tokens).
    pub token_path: Option<String>,
    /// The host picks a random image from a wildcard pattern for this token.
    pub wildcard: bool,
    /// Appended to the role in file names, e.g. a scene token id.
    pub name_suffix: String,
    /// Upload directory overriding the configured ones.
    pub target_folder: Option<String>,
    /// Token picture offset when a frame is added; the configured default when absent.
    pub token_offset: Option<Vec2>,
    /// Non-interactive run; always adds the default frame.
    pub auto: bool,
    /// The host record already has its dynamic token ring enabled.
    pub ring_enabled: bool,
}

impl TokenRequest {
    /// A request for `name` with everything else defaulted.
    pub fn new(name: impl Into<String>, kind: ActorKind) -> Self {
        Self {
            name: name.into(),
            kind,
            ..Self::default()
        }
    }

    /// Reject requests that cannot produce file names.
    pub fn validate(&self) -> TokenizerResult<()> {
        if self.name.trim().is_empty() {
            return Err(TokenizerError::validation("request name must be non-empty"));
        }
        if let Some(offset) = self.token_offset
            && !offset.is_finite()
        {
            return Err(TokenizerError::validation("token offset must be finite"));
        }
        Ok(())
    }
}
