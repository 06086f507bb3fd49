//! Play buttons bound to the shared coordinator.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use cueboard_audio::{Indicator, PlaybackCoordinator, TriggerId};
use cueboard_core::{SourceDescriptor, DEFAULT_MAX_PERCENT};
use tokio::sync::watch;
use tracing::{debug, error};

/// A button that toggles playback of one sound.
///
/// Clicking while this trigger owns the session stops it; clicking
/// otherwise takes the session over from whoever holds it.
pub struct TriggerControl {
    id: TriggerId,
    coordinator: PlaybackCoordinator,
    source: SourceDescriptor,
    percent: u32,
    indicator: watch::Receiver<Indicator>,
}

impl TriggerControl {
    pub fn new(coordinator: &PlaybackCoordinator, source: SourceDescriptor, percent: u32) -> Self {
        let id = TriggerId::new();
        let indicator = coordinator.attach(id);
        Self {
            id,
            coordinator: coordinator.clone(),
            source,
            percent: percent.min(DEFAULT_MAX_PERCENT),
            indicator,
        }
    }

    /// Build a trigger from host attributes.
    pub fn from_attributes(
        coordinator: &PlaybackCoordinator,
        source_type: Option<&str>,
        url: Option<&str>,
        filename: Option<&str>,
        percent: u32,
    ) -> Self {
        let source = SourceDescriptor::from_attributes(source_type, url, filename);
        Self::new(coordinator, source, percent)
    }

    pub const fn id(&self) -> TriggerId {
        self.id
    }

    pub const fn source(&self) -> &SourceDescriptor {
        &self.source
    }

    pub const fn percent(&self) -> u32 {
        self.percent
    }

    /// Current state of the play icon.
    pub fn indicator(&self) -> Indicator {
        *self.indicator.borrow()
    }

    /// Receiver that changes whenever the play icon should change.
    pub fn watch_indicator(&self) -> watch::Receiver<Indicator> {
        self.indicator.clone()
    }

    /// Gain used the next time this trigger starts.
    pub fn set_percent(&mut self, percent: u32) {
        self.percent = percent.min(DEFAULT_MAX_PERCENT);
    }

    /// Point the trigger at a different sound. Takes effect on the next start.
    pub fn set_source(&mut self, source: SourceDescriptor) {
        self.source = source;
    }

    /// Toggle playback. Failures leave the trigger stopped and are only logged.
    pub async fn click(&self) -> Indicator {
        if self.coordinator.holds_session(self.id) {
            self.coordinator.request_stop(self.id);
            return Indicator::Stopped;
        }

        match self
            .coordinator
            .request_start(self.id, &self.source, self.percent)
            .await
        {
            Ok(_) => Indicator::Playing,
            Err(e) if e.is_resolution() || e.is_cancelled() => {
                debug!("{} did not start: {e}", self.id);
                self.indicator()
            }
            Err(e) => {
                error!("{} failed to start: {e}", self.id);
                Indicator::Stopped
            }
        }
    }
}

impl Drop for TriggerControl {
    fn drop(&mut self) {
        self.coordinator.detach(self.id);
    }
}
