//! Where a sound comes from.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Scheme prefix of transient references to local files.
pub const OBJECT_URL_PREFIX: &str = "blob:cueboard/";

/// Source of a stored sound.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceDescriptor {
    /// Fully qualified external URL.
    Remote(String),
    /// Filename of an uploaded file, served beneath the uploads route.
    Upload(String),
}

impl SourceDescriptor {
    /// Build a descriptor from host attributes.
    ///
    /// A `source_type` of `"url"` selects the remote URL; anything else is
    /// treated as an upload.
    pub fn from_attributes(
        source_type: Option<&str>,
        url: Option<&str>,
        filename: Option<&str>,
    ) -> Self {
        if source_type == Some("url") {
            Self::Remote(url.unwrap_or_default().to_string())
        } else {
            Self::Upload(filename.unwrap_or_default().to_string())
        }
    }

    /// Check that a remote URL parses.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Remote(raw) if !raw.trim().is_empty() && !raw.starts_with('/') => {
                url::Url::parse(raw.trim())
                    .map(|_| ())
                    .map_err(|e| Error::InvalidConfig(format!("invalid url {raw:?}: {e}")))
            }
            _ => Ok(()),
        }
    }
}

/// A file picked by the user on the local machine.
///
/// Two selections are the same file only when path, size and modification
/// time all match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalFile {
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

impl LocalFile {
    pub fn new(path: impl Into<PathBuf>, size: u64, modified: Option<SystemTime>) -> Self {
        Self {
            path: path.into(),
            size,
            modified,
        }
    }

    /// Read size and modification time from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            size: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }

    /// File name for display.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Transient playable reference to a [`LocalFile`].
///
/// Must be revoked through the backend that created it once superseded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectUrl(String);

impl ObjectUrl {
    /// Mint a fresh, unique reference.
    pub fn generate() -> Self {
        Self(format!("{OBJECT_URL_PREFIX}{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether a location string is an object URL.
    pub fn is_object_url(location: &str) -> bool {
        location.starts_with(OBJECT_URL_PREFIX)
    }
}

impl std::fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_attributes() {
        assert_eq!(
            SourceDescriptor::from_attributes(Some("url"), Some("https://x/a.mp3"), Some("b.mp3")),
            SourceDescriptor::Remote("https://x/a.mp3".into())
        );
        assert_eq!(
            SourceDescriptor::from_attributes(Some("upload"), None, Some("b.mp3")),
            SourceDescriptor::Upload("b.mp3".into())
        );
        assert_eq!(
            SourceDescriptor::from_attributes(None, Some("https://x/a.mp3"), None),
            SourceDescriptor::Upload(String::new())
        );
    }

    #[test]
    fn test_validate_remote() {
        assert!(SourceDescriptor::Remote("https://example.com/a.ogg".into())
            .validate()
            .is_ok());
        assert!(SourceDescriptor::Remote("not a url".into()).validate().is_err());
        assert!(SourceDescriptor::Upload("whatever".into()).validate().is_ok());
    }

    #[test]
    fn test_object_urls_are_unique() {
        let a = ObjectUrl::generate();
        let b = ObjectUrl::generate();
        assert_ne!(a, b);
        assert!(ObjectUrl::is_object_url(a.as_str()));
    }

    #[test]
    fn test_local_file_identity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        std::fs::write(&path, b"RIFF").unwrap();

        let first = LocalFile::from_path(&path).unwrap();
        let again = LocalFile::from_path(&path).unwrap();
        assert_eq!(first, again);
        assert_eq!(first.size, 4);
        assert_eq!(first.name(), "clip.wav");
    }
}
