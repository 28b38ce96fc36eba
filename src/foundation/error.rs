/// Convenience result type used across tokensmith.
pub type TokenizerResult<T> = Result<T, TokenizerError>;

/// Top-level error taxonomy used by compositor and session APIs.
#[derive(thiserror::Error, Debug)]
pub enum TokenizerError {
    /// An image could not be fetched or decoded.
    #[error("decode error for '{location}': {reason}")]
    Decode {
        /// Path or URL that was attempted.
        location: String,
        /// Human-readable failure reason.
        reason: String,
    },

    /// An exported image could not be persisted.
    #[error("upload error for '{path}': {reason}")]
    Upload {
        /// Target path that was attempted.
        path: String,
        /// Human-readable failure reason.
        reason: String,
    },

    /// The caller lacks the rights required for an operation.
    #[error("missing permission: {0}")]
    MissingPermission(String),

    /// Invalid caller-provided data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Invalid or unreadable configuration.
    #[error("config error: {0}")]
    Config(String),

    /// The view was disposed and no longer accepts operations.
    #[error("view has been disposed")]
    Disposed,

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TokenizerError {
    /// Build a [`TokenizerError::Decode`] value.
    pub fn decode(location: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Decode {
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    /// Build a [`TokenizerError::Upload`] value.
    pub fn upload(path: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Upload {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Build a [`TokenizerError::MissingPermission`] value.
    pub fn missing_permission(msg: impl Into<String>) -> Self {
        Self::MissingPermission(msg.into())
    }

    /// Build a [`TokenizerError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`TokenizerError::Config`] value.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Return `true` for decode failures, the only kind that triggers placeholder fallback.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
