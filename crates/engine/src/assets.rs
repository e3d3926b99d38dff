use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetKeyError {
    #[error("asset key must not be empty")]
    Empty,
    #[error("asset key must not start with '/'")]
    LeadingSlash,
    #[error("asset key must not contain '\\\\'")]
    Backslash,
    #[error("asset key must not contain a '..' segment")]
    ParentTraversal,
    #[error("asset key contains invalid character {character:?}")]
    InvalidCharacter { character: char },
}

/// Forward-slash path relative to the asset root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageKey(Arc<str>);

impl ImageKey {
    pub fn new(key: &str) -> Result<Self, AssetKeyError> {
        validate_asset_key(key)?;
        Ok(Self(Arc::from(key)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn validate_asset_key(key: &str) -> Result<(), AssetKeyError> {
    if key.is_empty() {
        return Err(AssetKeyError::Empty);
    }
    if key.starts_with('/') {
        return Err(AssetKeyError::LeadingSlash);
    }
    if key.contains('\\') {
        return Err(AssetKeyError::Backslash);
    }
    if key.split('/').any(|segment| segment == "..") {
        return Err(AssetKeyError::ParentTraversal);
    }
    if let Some(character) = key.chars().find(|ch| ch.is_control()) {
        return Err(AssetKeyError::InvalidCharacter { character });
    }
    Ok(())
}

/// Resolves asset keys against one root directory. Passed by value to whatever needs
/// to touch the filesystem; there is no process-wide lookup.
#[derive(Debug, Clone)]
pub struct AssetResolver {
    root: PathBuf,
}

impl AssetResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    pub fn read_to_string(&self, key: &str) -> io::Result<String> {
        fs::read_to_string(self.resolve(key))
    }

    /// Joins `source` (as written inside the file `base_key`) onto that file's directory.
    /// Parent segments that would climb above the root are dropped, so editor exports
    /// referencing `../../graphics/x.png` from `data/map.tmx` land on `graphics/x.png`.
    pub fn join_relative(&self, base_key: &str, source: &str) -> Result<String, AssetKeyError> {
        let source = source.replace('\\', "/");
        let mut segments: Vec<&str> = if source.starts_with('/') {
            Vec::new()
        } else {
            base_key.split('/').collect()
        };
        // base_key names a file; its directory is everything before the last segment.
        segments.pop();

        for segment in source.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other),
            }
        }

        let joined = segments
            .into_iter()
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join("/");
        validate_asset_key(&joined)?;
        Ok(joined)
    }
}
