use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use anyhow::Context;

use crate::{
    assets::decode::{PreparedImage, decode_image_at},
    foundation::error::{TokenizerError, TokenizerResult},
};

/// Source of encoded image bytes (local files, remote URLs, in-memory assets).
pub trait ImageFetcher {
    /// Fetch the raw encoded bytes stored at `location`.
    fn fetch(&self, location: &str) -> TokenizerResult<Vec<u8>>;
}

impl<F: ImageFetcher + ?Sized> ImageFetcher for &F {
    fn fetch(&self, location: &str) -> TokenizerResult<Vec<u8>> {
        (**self).fetch(location)
    }
}

/// Fetches images from the local filesystem relative to a root directory.
#[derive(Clone, Debug)]
pub struct FsFetcher {
    root: PathBuf,
}

impl FsFetcher {
    /// Create a fetcher resolving relative locations against `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a location (path, optionally with a `?cache-buster`) onto the filesystem.
    pub fn resolve(&self, location: &str) -> PathBuf {
        let path = strip_query(location);
        let p = Path::new(path);
        if p.is_absolute() {
            return p.to_path_buf();
        }
        self.root.join(path.trim_start_matches('/'))
    }
}

impl ImageFetcher for FsFetcher {
    fn fetch(&self, location: &str) -> TokenizerResult<Vec<u8>> {
        if location.starts_with("http://") || location.starts_with("https://") {
            return Err(TokenizerError::decode(
                location,
                "remote locations are not supported by the filesystem fetcher",
            ));
        }
        let path = self.resolve(location);
        std::fs::read(&path)
            .with_context(|| format!("read image '{}'", path.display()))
            .map_err(|e| TokenizerError::decode(location, format!("{e:#}")))
    }
}

/// In-memory image store keyed by location.
#[derive(Clone, Debug, Default)]
pub struct MemoryFetcher {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryFetcher {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `bytes` under `location`, replacing any previous entry.
    pub fn insert(&mut self, location: impl Into<String>, bytes: Vec<u8>) {
        self.entries.insert(location.into(), bytes);
    }

    /// Builder-style [`MemoryFetcher::insert`].
    pub fn with(mut self, location: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert(location, bytes);
        self
    }
}

impl ImageFetcher for MemoryFetcher {
    fn fetch(&self, location: &str) -> TokenizerResult<Vec<u8>> {
        self.entries
            .get(strip_query(location))
            .cloned()
            .ok_or_else(|| TokenizerError::decode(location, "no such image"))
    }
}

/// Fetch and decode the image at `location`; every failure is reported as a decode failure.
pub fn fetch_image<F: ImageFetcher + ?Sized>(
    fetcher: &F,
    location: &str,
) -> TokenizerResult<PreparedImage> {
    let bytes = fetcher.fetch(location).map_err(|e| match e {
        TokenizerError::Decode { .. } => e,
        other => TokenizerError::decode(location, other),
    })?;
    decode_image_at(location, &bytes)
}

/// Image produced by [`load_with_fallback`].
#[derive(Clone, Debug)]
pub struct LoadedImage {
    /// Decoded pixels.
    pub image: PreparedImage,
    /// Location the pixels actually came from.
    pub location: String,
    /// `true` when the requested location failed and the placeholder was used.
    pub used_fallback: bool,
}

/// Load `location`, falling back to `fallback` once when it cannot be fetched or decoded.
///
/// With no `location` the fallback is loaded directly. When the fallback also fails the
/// returned decode error names both locations.
pub fn load_with_fallback<F: ImageFetcher + ?Sized>(
    fetcher: &F,
    location: Option<&str>,
    fallback: &str,
) -> TokenizerResult<LoadedImage> {
    let primary = location.filter(|l| !l.trim().is_empty() && *l != fallback);

    let Some(primary) = primary else {
        let image = fetch_image(fetcher, fallback).inspect_err(|e| {
            tracing::error!(location = fallback, error = %e, "failed to load fallback image");
        })?;
        return Ok(LoadedImage {
            image,
            location: fallback.to_string(),
            used_fallback: location.is_none(),
        });
    };

    match fetch_image(fetcher, primary) {
        Ok(image) => Ok(LoadedImage {
            image,
            location: primary.to_string(),
            used_fallback: false,
        }),
        Err(primary_err) => {
            tracing::warn!(location = primary, error = %primary_err, fallback, "image failed to load, using fallback");
            match fetch_image(fetcher, fallback) {
                Ok(image) => Ok(LoadedImage {
                    image,
                    location: fallback.to_string(),
                    used_fallback: true,
                }),
                Err(fallback_err) => Err(TokenizerError::decode(
                    primary,
                    format!("{primary_err}; fallback '{fallback}' also failed: {fallback_err}"),
                )),
            }
        }
    }
}

fn strip_query(location: &str) -> &str {
    location.split('?').next().unwrap_or(location)
}

#[cfg(test)]
#[path = "../../tests/unit/assets/fetch.rs"]
mod tests;
