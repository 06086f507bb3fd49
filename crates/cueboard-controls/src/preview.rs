//! Preview resource and local file selection owned by one control.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use cueboard_audio::{AudioBackend, GainPathBuilder, SharedResource};
use cueboard_core::{LocalFile, ObjectUrl, Result};
use tracing::debug;

/// Visual state of a preview button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreviewState {
    #[default]
    Stopped,
    Playing,
}

/// The file picked for a local preview and its object URL.
///
/// The URL is only recreated when the selected file changes identity, and
/// the previous one is revoked first.
#[derive(Debug, Default)]
pub struct FileSelection {
    current: Option<(LocalFile, ObjectUrl)>,
}

impl FileSelection {
    pub const fn new() -> Self {
        Self { current: None }
    }

    /// Replace the selection. Returns whether anything changed.
    pub fn select(&mut self, backend: &dyn AudioBackend, file: Option<LocalFile>) -> Result<bool> {
        if self.current.as_ref().map(|(f, _)| f) == file.as_ref() {
            return Ok(false);
        }

        self.release(backend);
        if let Some(file) = file {
            let url = backend.create_object_url(&file)?;
            debug!("Selected {} as {url}", file.name());
            self.current = Some((file, url));
        }
        Ok(true)
    }

    pub fn file(&self) -> Option<&LocalFile> {
        self.current.as_ref().map(|(file, _)| file)
    }

    pub fn object_url(&self) -> Option<&ObjectUrl> {
        self.current.as_ref().map(|(_, url)| url)
    }

    /// Revoke the object URL and forget the file.
    pub fn release(&mut self, backend: &dyn AudioBackend) {
        if let Some((_, url)) = self.current.take() {
            backend.revoke_object_url(&url);
        }
    }
}

/// Lazily created resource a control auditions sounds on.
///
/// Independent of the coordinator's exclusive session.
#[derive(Default)]
pub struct PreviewSlot {
    resource: Option<SharedResource>,
}

impl PreviewSlot {
    pub const fn new() -> Self {
        Self { resource: None }
    }

    pub const fn resource(&self) -> Option<&SharedResource> {
        self.resource.as_ref()
    }

    /// The existing resource, or a new one from `backend`.
    pub fn get_or_create(&mut self, backend: &dyn AudioBackend) -> SharedResource {
        self.resource
            .get_or_insert_with(|| backend.create_resource())
            .clone()
    }

    pub fn is_playing(&self) -> bool {
        self.resource.as_ref().is_some_and(|r| !r.is_paused())
    }

    /// Pause and rewind, keeping the resource for reuse.
    pub fn stop(&self) {
        if let Some(resource) = &self.resource {
            resource.pause();
            resource.rewind();
        }
    }

    /// Stop, drop the resource and tear down its gain path.
    pub fn release(&mut self, gain_path: &GainPathBuilder) {
        if let Some(resource) = self.resource.take() {
            resource.pause();
            resource.rewind();
            gain_path.release(resource.id());
            debug!("Released preview resource {}", resource.id());
        }
    }
}

impl std::fmt::Debug for PreviewSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewSlot")
            .field("resource", &self.resource.as_ref().map(|r| r.id()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cueboard_audio::mock::{JournalEntry, MockBackend};
    use cueboard_audio::GainStrategy;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn file(name: &str, size: u64) -> LocalFile {
        LocalFile::new(PathBuf::from(format!("/tmp/{name}")), size, None)
    }

    #[test]
    fn test_same_file_keeps_object_url() {
        let backend = MockBackend::new();
        let mut selection = FileSelection::new();

        assert!(selection.select(&backend, Some(file("a.wav", 10))).unwrap());
        let url = selection.object_url().cloned().unwrap();
        assert!(!selection.select(&backend, Some(file("a.wav", 10))).unwrap());
        assert_eq!(selection.object_url(), Some(&url));
        assert_eq!(backend.journal().len(), 1);
    }

    #[test]
    fn test_new_file_revokes_before_creating() {
        let backend = MockBackend::new();
        let mut selection = FileSelection::new();

        selection.select(&backend, Some(file("a.wav", 10))).unwrap();
        // Same path but rewritten on disk counts as a different file.
        selection.select(&backend, Some(file("a.wav", 12))).unwrap();

        let journal = backend.journal();
        assert_eq!(journal.len(), 3);
        let JournalEntry::Created(first, _) = &journal[0] else {
            panic!("expected creation first");
        };
        assert_eq!(journal[1], JournalEntry::Revoked(first.clone()));
        assert!(matches!(journal[2], JournalEntry::Created(..)));
        assert_eq!(backend.live_object_urls().len(), 1);
    }

    #[test]
    fn test_clearing_selection_revokes() {
        let backend = MockBackend::new();
        let mut selection = FileSelection::new();
        selection.select(&backend, Some(file("a.wav", 1))).unwrap();

        assert!(selection.select(&backend, None).unwrap());
        assert!(selection.file().is_none());
        assert!(backend.live_object_urls().is_empty());
    }

    #[tokio::test]
    async fn test_slot_reuses_resource_until_released() {
        let backend = MockBackend::new();
        let shared: Arc<dyn AudioBackend> = Arc::new(backend.clone());
        let gain_path = GainPathBuilder::new(shared, GainStrategy::Graph);
        let mut slot = PreviewSlot::new();

        let first = slot.get_or_create(&backend);
        let again = slot.get_or_create(&backend);
        assert_eq!(first.id(), again.id());

        gain_path.apply(first.as_ref(), 1.5).await;
        slot.release(&gain_path);
        assert!(slot.resource().is_none());
        assert!(!gain_path.is_routed(first.id()));

        slot.release(&gain_path);
        let fresh = slot.get_or_create(&backend);
        assert_ne!(fresh.id(), first.id());
    }
}
