//! Writing new image paths back into the host's records.

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{Map, Value, json};

use crate::{
    config::settings::TokenizerConfig,
    foundation::error::{TokenizerError, TokenizerResult},
    session::{
        naming::{slug, wildcard_pattern, with_cache_buster},
        request::TokenRequest,
        tokenizer::TokenizeOutcome,
    },
};

/// Cache-busting tag: current Unix time in milliseconds.
pub fn cache_tag_now() -> String {
    let ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    ms.to_string()
}

/// Dynamic ring settings written alongside a token texture.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct RingUpdate {
    /// Texture shown inside the ring.
    pub subject_texture: String,
}

/// Changes to apply to the host record after a session.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct RecordUpdate {
    /// Record field receiving the avatar path, and that path.
    pub avatar: Option<(String, String)>,
    /// New prototype token texture for non-wildcard tokens.
    pub prototype_texture: Option<String>,
    /// Wildcard pattern for tokens that had no pattern yet.
    pub token_pattern: Option<String>,
    /// Dynamic ring update.
    pub ring: Option<RingUpdate>,
}

impl RecordUpdate {
    /// Derive the write-back for a finished session.
    ///
    /// Paths receive `?{cache_tag}` so hosts reload the images. Wildcard tokens are left alone
    /// unless their current path is not yet a pattern, in which case one is written.
    pub fn build(
        outcome: &TokenizeOutcome,
        request: &TokenRequest,
        config: &TokenizerConfig,
        cache_tag: &str,
    ) -> Self {
        let mut update = Self {
            avatar: outcome
                .avatar_path
                .as_deref()
                .map(|p| (config.avatar_key.clone(), with_cache_buster(p, cache_tag))),
            ..Self::default()
        };
        let ring = config.auto_apply_dynamic_token_ring || request.ring_enabled;

        if !request.wildcard {
            if let Some(token) = outcome.token_path.as_deref() {
                let path = with_cache_buster(token, cache_tag);
                if ring {
                    update.ring = Some(RingUpdate {
                        subject_texture: path.clone(),
                    });
                }
                update.prototype_texture = Some(path);
            }
        } else if !request
            .token_path
            .as_deref()
            .is_some_and(|p| p.contains('*'))
        {
            let pattern = wildcard_pattern(
                &outcome.token_upload_directory.current,
                &slug(&request.name),
                config.image_save_type,
            );
            tracing::info!(%pattern, "switching wildcard token to a numbered pattern");
            if ring {
                update.ring = Some(RingUpdate {
                    subject_texture: pattern.clone(),
                });
            }
            update.token_pattern = Some(pattern);
        }
        update
    }

    /// Return `true` when nothing would change.
    pub fn is_empty(&self) -> bool {
        self.avatar.is_none()
            && self.prototype_texture.is_none()
            && self.token_pattern.is_none()
            && self.ring.is_none()
    }

    /// The update as a nested JSON patch in the host's field layout.
    pub fn to_patch(&self) -> Value {
        let mut patch = Map::new();
        if let Some((key, path)) = &self.avatar {
            set_dotted(&mut patch, key, Value::String(path.clone()));
        }
        let ring = self.ring.as_ref().map(|r| {
            json!({ "enabled": true, "subject": { "texture": r.subject_texture } })
        });
        if let Some(texture) = &self.prototype_texture {
            set_dotted(&mut patch, "prototypeToken.texture.src", json!(texture));
            if let Some(ring) = &ring {
                set_dotted(&mut patch, "prototypeToken.ring", ring.clone());
            }
        }
        if let Some(pattern) = &self.token_pattern {
            set_dotted(&mut patch, "token.img", json!(pattern));
            if let Some(ring) = &ring {
                set_dotted(&mut patch, "token.ring", ring.clone());
            }
        }
        Value::Object(patch)
    }
}

fn set_dotted(root: &mut Map<String, Value>, key: &str, value: Value) {
    let mut parts = key.split('.').peekable();
    let mut node = root;
    while let Some(part) = parts.next() {
        if parts.peek().is_none() {
            node.insert(part.to_string(), value);
            return;
        }
        let child = node
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !child.is_object() {
            *child = Value::Object(Map::new());
        }
        let Value::Object(next) = child else {
            return;
        };
        node = next;
    }
}

/// The host's record store.
pub trait HostRecords {
    /// Persist `update`.
    fn apply(&mut self, update: &RecordUpdate) -> TokenizerResult<()>;
}

/// A JSON document acting as the record: the patch is deep-merged into it.
impl HostRecords for Value {
    fn apply(&mut self, update: &RecordUpdate) -> TokenizerResult<()> {
        if !self.is_object() {
            return Err(TokenizerError::validation("host record must be a JSON object"));
        }
        merge(self, update.to_patch());
        Ok(())
    }
}

fn merge(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(t), Value::Object(p)) => {
            for (k, v) in p {
                if let Some(existing) = t.get_mut(&k)
                    && existing.is_object()
                    && v.is_object()
                {
                    merge(existing, v);
                } else {
                    t.insert(k, v);
                }
            }
        }
        (t, p) => *t = p,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/records.rs"]
mod tests;
