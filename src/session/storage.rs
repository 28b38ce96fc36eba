//! Where exported files go: storage locations, the upload/browse collaborator and user rights.

use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
};

use anyhow::Context as _;

use crate::{
    compose::export::EncodedImage,
    foundation::error::{TokenizerError, TokenizerResult},
    session::naming::{trim_slashes, wildcard_match},
};

/// Storage source used when a path carries no `[source]` prefix.
pub const DEFAULT_SOURCE: &str = "data";

/// A location in host storage, written `[source] path` or `[source:bucket] path`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StoragePath {
    /// Storage backend name, e.g. `data` or `s3`.
    pub source: String,
    /// Bucket for object stores.
    pub bucket: Option<String>,
    /// Path inside the source, without leading or trailing slashes.
    pub current: String,
}

impl StoragePath {
    /// Parse the bracketed location syntax. A bare path uses [`DEFAULT_SOURCE`].
    pub fn parse(s: &str) -> TokenizerResult<Self> {
        let s = s.trim();
        let Some(rest) = s.strip_prefix('[') else {
            return Ok(Self::in_default_source(s));
        };
        let Some((head, path)) = rest.split_once(']') else {
            return Err(TokenizerError::validation(format!(
                "storage path '{s}' has an unterminated '[source]' prefix"
            )));
        };
        let (source, bucket) = match head.split_once(':') {
            Some((source, bucket)) => (source.trim(), Some(bucket.trim())),
            None => (head.trim(), None),
        };
        if source.is_empty() {
            return Err(TokenizerError::validation(format!(
                "storage path '{s}' has an empty source"
            )));
        }
        Ok(Self {
            source: source.to_string(),
            bucket: bucket.filter(|b| !b.is_empty()).map(str::to_string),
            current: trim_slashes(path.trim()).to_string(),
        })
    }

    /// A path in the default source.
    pub fn in_default_source(path: &str) -> Self {
        Self {
            source: DEFAULT_SOURCE.to_string(),
            bucket: None,
            current: trim_slashes(path.trim()).to_string(),
        }
    }

    /// Join `name` onto this location's path.
    pub fn join(&self, name: &str) -> String {
        if self.current.is_empty() {
            name.to_string()
        } else {
            format!("{}/{name}", self.current)
        }
    }

    /// A sibling location in the same source and bucket.
    pub fn with_current(&self, current: impl Into<String>) -> Self {
        Self {
            current: current.into(),
            ..self.clone()
        }
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.bucket {
            Some(bucket) => write!(f, "[{}:{bucket}] {}", self.source, self.current),
            None => write!(f, "[{}] {}", self.source, self.current),
        }
    }
}

/// Host file storage: persists exports and lists existing files.
pub trait Storage {
    /// Store `blob` as `file_name` inside `directory` and return the stored path.
    fn upload(
        &mut self,
        blob: &EncodedImage,
        directory: &StoragePath,
        file_name: &str,
    ) -> TokenizerResult<String>;

    /// List stored paths matching `pattern`, whose last segment may contain `*` wildcards.
    fn browse(&self, pattern: &StoragePath) -> TokenizerResult<Vec<String>>;
}

impl<S: Storage + ?Sized> Storage for &mut S {
    fn upload(
        &mut self,
        blob: &EncodedImage,
        directory: &StoragePath,
        file_name: &str,
    ) -> TokenizerResult<String> {
        (**self).upload(blob, directory, file_name)
    }

    fn browse(&self, pattern: &StoragePath) -> TokenizerResult<Vec<String>> {
        (**self).browse(pattern)
    }
}

/// Storage rooted at a local directory. Sources and buckets are ignored.
#[derive(Clone, Debug)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    /// Store files below `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Storage for FsStorage {
    fn upload(
        &mut self,
        blob: &EncodedImage,
        directory: &StoragePath,
        file_name: &str,
    ) -> TokenizerResult<String> {
        let rel = directory.join(file_name);
        let dir = self.root.join(&directory.current);
        let write = || -> anyhow::Result<()> {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("create directory '{}'", dir.display()))?;
            let target = dir.join(file_name);
            std::fs::write(&target, &blob.bytes)
                .with_context(|| format!("write '{}'", target.display()))?;
            Ok(())
        };
        write().map_err(|e| TokenizerError::upload(&rel, format!("{e:#}")))?;
        tracing::info!(path = %rel, bytes = blob.bytes.len(), mime = blob.mime, "uploaded");
        Ok(rel)
    }

    fn browse(&self, pattern: &StoragePath) -> TokenizerResult<Vec<String>> {
        let (dir, name_pattern) = split_pattern(&pattern.current);
        let abs = self.root.join(dir);
        let entries = match std::fs::read_dir(&abs) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("browse '{}'", abs.display()))
                    .into());
            }
        };

        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.with_context(|| format!("browse '{}'", abs.display()))?;
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if wildcard_match(name_pattern, &name) {
                out.push(pattern.with_current(dir).join(&name));
            }
        }
        out.sort();
        Ok(out)
    }
}

/// Storage kept in memory, keyed by stored path.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    files: BTreeMap<String, EncodedImage>,
}

impl MemoryStorage {
    /// Empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file at `path`.
    pub fn with_file(mut self, path: impl Into<String>, blob: EncodedImage) -> Self {
        self.files.insert(path.into(), blob);
        self
    }

    /// File stored at `path`.
    pub fn get(&self, path: &str) -> Option<&EncodedImage> {
        self.files.get(path)
    }

    /// Every stored path, sorted.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }
}

impl Storage for MemoryStorage {
    fn upload(
        &mut self,
        blob: &EncodedImage,
        directory: &StoragePath,
        file_name: &str,
    ) -> TokenizerResult<String> {
        if file_name.is_empty() || file_name.contains('/') {
            return Err(TokenizerError::upload(
                directory.join(file_name),
                "file name must be a single non-empty path segment",
            ));
        }
        let path = directory.join(file_name);
        self.files.insert(path.clone(), blob.clone());
        Ok(path)
    }

    fn browse(&self, pattern: &StoragePath) -> TokenizerResult<Vec<String>> {
        let (dir, name_pattern) = split_pattern(&pattern.current);
        Ok(self
            .files
            .keys()
            .filter(|path| {
                let (parent, name) = split_pattern(path);
                parent == dir && wildcard_match(name_pattern, name)
            })
            .cloned()
            .collect())
    }
}

fn split_pattern(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((dir, name)) => (dir, name),
        None => ("", path),
    }
}

/// Rights of the user running a session.
pub trait Permissions {
    /// May store files.
    fn can_upload(&self) -> bool;
    /// May list stored files.
    fn can_browse(&self) -> bool;
}

/// Fixed set of rights.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Grants {
    /// Upload right.
    pub upload: bool,
    /// Browse right.
    pub browse: bool,
}

impl Grants {
    /// Every right.
    pub const ALL: Self = Self {
        upload: true,
        browse: true,
    };
    /// No rights.
    pub const NONE: Self = Self {
        upload: false,
        browse: false,
    };
}

impl Permissions for Grants {
    fn can_upload(&self) -> bool {
        self.upload
    }

    fn can_browse(&self) -> bool {
        self.browse
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/storage.rs"]
mod tests;
