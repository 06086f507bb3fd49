//! Fetching clip bytes for a playable location.
//!
//! Locations are remote `http(s)` URLs, paths under the uploads route, or
//! object URLs registered for a local file.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use cueboard_core::{Error, ObjectUrl, Result};
use parking_lot::Mutex;
use tracing::debug;

/// Object URL to local path registry shared with the backend.
pub type ObjectUrlRegistry = Arc<Mutex<HashMap<String, PathBuf>>>;

/// Raw clip bytes plus whatever format hint came with them.
#[derive(Debug, Clone)]
pub struct LoadedClip {
    pub data: Bytes,
    pub hint: Option<String>,
}

/// Maps locations to bytes.
#[derive(Clone)]
pub struct SourceLoader {
    uploads_route: String,
    uploads_dir: PathBuf,
    object_urls: ObjectUrlRegistry,
}

impl SourceLoader {
    pub fn new(uploads_route: &str, uploads_dir: PathBuf, object_urls: ObjectUrlRegistry) -> Self {
        Self {
            uploads_route: uploads_route.trim_end_matches('/').to_string(),
            uploads_dir,
            object_urls,
        }
    }

    /// Fetch the bytes behind `location`. Blocks on disk or network IO.
    pub fn load(&self, location: &str) -> Result<LoadedClip> {
        if location.starts_with("http://") || location.starts_with("https://") {
            return fetch(location);
        }
        if ObjectUrl::is_object_url(location) {
            let path = self
                .object_urls
                .lock()
                .get(location)
                .cloned()
                .ok_or_else(|| Error::Playback(format!("Object URL {location} was revoked")))?;
            return read_file(&path);
        }
        read_file(&self.upload_path(location)?)
    }

    /// Local path of an upload served at `location`.
    pub fn upload_path(&self, location: &str) -> Result<PathBuf> {
        let prefix = format!("{}/", self.uploads_route);
        let name = location
            .strip_prefix(&prefix)
            .ok_or_else(|| Error::Playback(format!("Unsupported location: {location}")))?;

        let relative = Path::new(name);
        if name.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(Error::Playback(format!("Invalid upload path: {location}")));
        }
        Ok(self.uploads_dir.join(relative))
    }
}

fn fetch(url: &str) -> Result<LoadedClip> {
    debug!("Fetching {url}");
    let mut body = ureq::get(url)
        .call()
        .map_err(|e| Error::Network(format!("HTTP request failed: {e}")))?
        .into_body();

    let hint = body.mime_type().map(String::from).or_else(|| Some(url.to_string()));
    let data = body
        .read_to_vec()
        .map_err(|e| Error::Network(format!("Failed to read response: {e}")))?;

    debug!("Fetched {} bytes, hint: {hint:?}", data.len());
    Ok(LoadedClip {
        data: Bytes::from(data),
        hint,
    })
}

fn read_file(path: &Path) -> Result<LoadedClip> {
    debug!("Reading {}", path.display());
    let data = std::fs::read(path)?;
    Ok(LoadedClip {
        data: Bytes::from(data),
        hint: path.extension().and_then(|e| e.to_str()).map(String::from),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader(dir: &Path, registry: ObjectUrlRegistry) -> SourceLoader {
        SourceLoader::new("/uploads/", dir.to_path_buf(), registry)
    }

    #[test]
    fn test_upload_route_maps_to_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("horn.wav"), b"RIFF").unwrap();
        let loader = loader(dir.path(), ObjectUrlRegistry::default());

        let clip = loader.load("/uploads/horn.wav").unwrap();
        assert_eq!(clip.data.as_ref(), b"RIFF");
        assert_eq!(clip.hint.as_deref(), Some("wav"));
    }

    #[test]
    fn test_upload_path_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader(dir.path(), ObjectUrlRegistry::default());

        assert!(loader.upload_path("/uploads/../secret.wav").is_err());
        assert!(loader.upload_path("/uploads/").is_err());
        assert!(loader.upload_path("/elsewhere/horn.wav").is_err());
        assert!(loader.upload_path("/uploads/sfx/horn.wav").is_ok());
    }

    #[test]
    fn test_object_url_resolves_through_registry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("take.ogg");
        std::fs::write(&path, b"OggS").unwrap();
        let registry = ObjectUrlRegistry::default();
        let url = ObjectUrl::generate();
        registry.lock().insert(url.as_str().to_string(), path);
        let loader = loader(dir.path(), registry.clone());

        assert_eq!(loader.load(url.as_str()).unwrap().data.as_ref(), b"OggS");

        registry.lock().clear();
        assert!(matches!(loader.load(url.as_str()), Err(Error::Playback(_))));
    }

    #[test]
    fn test_missing_upload_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader(dir.path(), ObjectUrlRegistry::default());
        assert!(matches!(loader.load("/uploads/none.mp3"), Err(Error::Io(_))));
    }
}
