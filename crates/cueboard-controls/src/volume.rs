//! Per-control volume state with live preview.
//!
//! The percent is the only state a control keeps about loudness; gain and
//! the rendered slider are derived from it on every change. Committed
//! changes reach the host through a [`HostNotifier`] after a quiet window.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::sync::Arc;
use std::time::Duration;

use cueboard_audio::{AudioBackend, GainPathBuilder, PlaybackCoordinator, SourceResolver};
use cueboard_core::gain::{gain_for_percent, normalize_percent, snap_percent};
use cueboard_core::{
    ControlConfig, Error, HostNotifier, LocalFile, PercentInput, PreviewKind, PreviewSpec, Result,
    VolumeChanged, UNITY_PERCENT,
};
use tracing::{debug, info, warn};

use crate::debounce::Debouncer;
use crate::preview::{FileSelection, PreviewSlot, PreviewState};

/// How a slider should be drawn for a given percent.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeDisplay {
    /// Text shown next to the slider, e.g. `"85%"`.
    pub label: String,
    /// Share of the track that is filled, `0.0..=1.0`.
    pub fraction: f64,
    /// Pixel correction keeping the thumb inside the track.
    pub thumb_offset_px: f64,
}

impl VolumeDisplay {
    pub fn new(percent: u32, max_percent: u32, thumb_size: u32) -> Self {
        let fraction = if max_percent == 0 {
            0.0
        } else {
            (f64::from(percent) / f64::from(max_percent)).clamp(0.0, 1.0)
        };
        Self {
            label: format!("{percent}%"),
            fraction,
            thumb_offset_px: (0.5 - fraction) * f64::from(thumb_size),
        }
    }

    /// CSS `left` value for the thumb.
    pub fn thumb_left(&self) -> String {
        format!(
            "calc({:.2}% + {:.2}px)",
            self.fraction * 100.0,
            self.thumb_offset_px
        )
    }
}

/// One volume slider with an optional preview button.
pub struct VolumeControl {
    config: ControlConfig,
    percent: u32,
    gain: f64,
    display: VolumeDisplay,
    backend: Arc<dyn AudioBackend>,
    gain_path: Arc<GainPathBuilder>,
    resolver: SourceResolver,
    notifier: Arc<dyn HostNotifier>,
    debouncer: Debouncer,
    preview: PreviewSlot,
    selection: FileSelection,
    torn_down: bool,
}

impl VolumeControl {
    /// Attach a control. Preview playback shares the coordinator's gain path
    /// but never its exclusive session.
    pub fn new(
        config: ControlConfig,
        coordinator: &PlaybackCoordinator,
        notifier: Arc<dyn HostNotifier>,
        debounce: Duration,
    ) -> Result<Self> {
        config.validate()?;
        let percent = derive_percent(&config.percent, config.max_percent, UNITY_PERCENT);
        let display = VolumeDisplay::new(percent, config.max_percent, config.thumb_size);
        debug!("Attached volume control at {percent}%");

        Ok(Self {
            gain: gain_for_percent(percent),
            percent,
            display,
            backend: coordinator.backend().clone(),
            gain_path: coordinator.gain_path().clone(),
            resolver: coordinator.resolver().clone(),
            notifier,
            debouncer: Debouncer::new(debounce),
            preview: PreviewSlot::new(),
            selection: FileSelection::new(),
            config,
            torn_down: false,
        })
    }

    pub const fn percent(&self) -> u32 {
        self.percent
    }

    pub const fn gain(&self) -> f64 {
        self.gain
    }

    pub const fn display(&self) -> &VolumeDisplay {
        &self.display
    }

    pub const fn config(&self) -> &ControlConfig {
        &self.config
    }

    pub fn is_previewing(&self) -> bool {
        self.preview.is_playing()
    }

    pub fn preview_state(&self) -> PreviewState {
        if self.is_previewing() {
            PreviewState::Playing
        } else {
            PreviewState::Stopped
        }
    }

    /// Whether a committed change is still waiting for the quiet window.
    pub fn has_pending_commit(&self) -> bool {
        self.debouncer.is_pending()
    }

    pub fn selected_file(&self) -> Option<&LocalFile> {
        self.selection.file()
    }

    /// Update the percent from slider or host input.
    ///
    /// Unparseable input keeps the current percent. With `emit`, the host is
    /// notified once input has been quiet for the debounce window.
    pub async fn set_percent(&mut self, value: impl Into<PercentInput>, emit: bool) -> u32 {
        let max = self.config.max_percent;
        let percent = derive_percent(&value.into(), max, self.percent);

        self.percent = percent;
        self.gain = gain_for_percent(percent);
        self.display = VolumeDisplay::new(percent, max, self.config.thumb_size);

        if self.is_previewing() {
            if let Some(resource) = self.preview.resource() {
                self.gain_path.apply(resource.as_ref(), self.gain).await;
            }
        }

        if emit {
            let notifier = self.notifier.clone();
            let event = self.config.event.clone();
            let payload = VolumeChanged {
                volume: percent,
                target: self.config.target.clone(),
            };
            self.debouncer.schedule(move || {
                debug!("Committing volume {}", payload.volume);
                notifier.push_event(&event, payload);
            });
        }

        percent
    }

    /// Start or stop the preview.
    ///
    /// Missing sources are ignored and start failures are logged; neither
    /// reaches the caller.
    pub async fn toggle_preview(&mut self) -> PreviewState {
        if self.is_previewing() {
            self.stop_preview();
            return PreviewState::Stopped;
        }

        let location = match self.preview_location() {
            Ok(location) => location,
            Err(e) => {
                debug!("Nothing to preview: {e}");
                return PreviewState::Stopped;
            }
        };

        let resource = self.preview.get_or_create(self.backend.as_ref());
        if resource.source().as_deref() != Some(location.as_str()) {
            resource.set_source(&location);
        }
        self.gain_path.apply(resource.as_ref(), self.gain).await;

        match resource.play().await {
            Ok(()) => {
                info!("Previewing {location} at {}%", self.percent);
                PreviewState::Playing
            }
            Err(e) => {
                warn!("Preview of {location} failed: {e}");
                self.preview.stop();
                PreviewState::Stopped
            }
        }
    }

    /// Pause and rewind the preview, keeping its resource.
    pub fn stop_preview(&self) {
        self.preview.stop();
    }

    /// Record the locally chosen file for [`PreviewSpec::LocalFile`].
    pub fn select_file(&mut self, file: Option<LocalFile>) -> Result<()> {
        if self.selection.select(self.backend.as_ref(), file)? {
            // A playing preview still points at the old file.
            self.stop_preview();
        }
        Ok(())
    }

    /// Bring the control in line with a re-rendered configuration.
    ///
    /// A different preview kind releases the preview resource and its gain
    /// path. A different source of the same kind only stops playback, except
    /// for local files whose selection is tracked separately.
    pub async fn reconcile(&mut self, config: ControlConfig) -> Result<()> {
        config.validate()?;

        let old_kind = self.config.preview_kind();
        let new_kind = config.preview_kind();
        if old_kind != new_kind {
            debug!("Preview kind changed from {old_kind:?} to {new_kind:?}");
            self.preview.release(&self.gain_path);
            if old_kind == Some(PreviewKind::LocalFile) {
                self.selection.release(self.backend.as_ref());
            }
        } else if self.config.preview != config.preview && new_kind != Some(PreviewKind::LocalFile)
        {
            debug!("Preview source changed");
            self.stop_preview();
        }

        let percent = config.percent.clone();
        self.config = config;
        self.set_percent(percent, false).await;
        Ok(())
    }

    /// Release everything the control holds. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.debouncer.cancel();
        self.preview.release(&self.gain_path);
        self.selection.release(self.backend.as_ref());
        debug!("Volume control torn down");
    }

    fn preview_location(&self) -> Result<String> {
        match &self.config.preview {
            None => Err(Error::Resolution("control has no preview".to_string())),
            Some(PreviewSpec::LocalFile) => self
                .selection
                .object_url()
                .map(|url| url.as_str().to_string())
                .ok_or_else(|| Error::Resolution("no file selected".to_string())),
            Some(PreviewSpec::EnteredUrl { url }) => {
                let url = url.trim();
                if url.is_empty() {
                    Err(Error::Resolution("url field is empty".to_string()))
                } else {
                    Ok(url.to_string())
                }
            }
            Some(PreviewSpec::Existing { source }) => self.resolver.resolve(source),
        }
    }
}

impl Drop for VolumeControl {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Normalize, clamp and snap raw input.
fn derive_percent(input: &PercentInput, max_percent: u32, default: u32) -> u32 {
    snap_percent(normalize_percent(input, max_percent, default), max_percent)
}
