//! Board service connecting the UI to the playback coordinator.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;
use cueboard_audio::native::NativeBackend;
use cueboard_audio::{CoordinatorEvent, PlaybackCoordinator, StopReason, TriggerId};
use cueboard_core::{ChannelNotifier, ControlConfig, HostNotifier, Result, Settings, VolumeChanged};
use dioxus::prelude::*;
use parking_lot::Mutex;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Shared handles every component needs.
#[derive(Clone)]
pub struct BoardService {
    coordinator: PlaybackCoordinator,
    notifier: Arc<ChannelNotifier>,
    commits: Receiver<(String, VolumeChanged)>,
    settings: Arc<Settings>,
    owners: Arc<Mutex<HashMap<TriggerId, String>>>,
}

impl BoardService {
    /// Open the audio output and build the coordinator.
    pub fn start(settings: Settings) -> Result<Self> {
        let backend = NativeBackend::start(&settings)?;
        info!("Audio backend on {}", backend.device_name());

        let coordinator = PlaybackCoordinator::new(Arc::new(backend), &settings);
        let (notifier, commits) = ChannelNotifier::new();

        Ok(Self {
            coordinator,
            notifier: Arc::new(notifier),
            commits,
            settings: Arc::new(settings),
            owners: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub const fn coordinator(&self) -> &PlaybackCoordinator {
        &self.coordinator
    }

    pub fn notifier(&self) -> Arc<dyn HostNotifier> {
        self.notifier.clone()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn debounce(&self) -> Duration {
        self.settings.debounce()
    }

    /// Volume control configuration for the sound `id`.
    pub fn control_config(&self, id: &str, volume: u32) -> ControlConfig {
        ControlConfig::new(self.settings.default_max_percent)
            .with_percent(volume)
            .with_target(id)
    }

    /// Remember which sound a trigger plays, for status messages.
    pub fn register(&self, owner: TriggerId, sound_id: &str) {
        self.owners.lock().insert(owner, sound_id.to_string());
    }

    pub fn unregister(&self, owner: TriggerId) {
        self.owners.lock().remove(&owner);
    }

    fn sound_of(&self, owner: TriggerId) -> Option<String> {
        self.owners.lock().get(&owner).cloned()
    }

    pub fn stop_all(&self) {
        self.coordinator.stop_all();
    }
}

/// Keep app state in step with committed volumes and playback events.
pub fn use_board_sync(service: BoardService, app_state: AppState) {
    let mut state = app_state;

    use_future(move || {
        let service = service.clone();
        async move {
            let mut events = service.coordinator().subscribe();
            loop {
                // Committed volume changes from the editors
                while let Ok((event, payload)) = service.commits.try_recv() {
                    debug!("{event}: {payload:?}");
                    if let Some(target) = payload.target.as_deref() {
                        if !state.set_volume(target, payload.volume) {
                            warn!("Volume committed for unknown sound {target}");
                        }
                    }
                }

                // Playback events from the coordinator
                loop {
                    match events.try_recv() {
                        Ok(event) => apply_event(&service, &mut state, &event),
                        Err(TryRecvError::Lagged(skipped)) => {
                            debug!("Skipped {skipped} playback events");
                        }
                        Err(TryRecvError::Empty | TryRecvError::Closed) => break,
                    }
                }

                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }
    });
}

fn apply_event(service: &BoardService, state: &mut AppState, event: &CoordinatorEvent) {
    let label = |owner: TriggerId| {
        service
            .sound_of(owner)
            .map_or_else(|| owner.to_string(), |id| state.name_of(&id))
    };

    let status = match event {
        CoordinatorEvent::Started { owner } => format!("Playing {}", label(*owner)),
        CoordinatorEvent::Stopped { owner, reason } => match reason {
            StopReason::Ended => format!("{} finished", label(*owner)),
            StopReason::Errored => format!("{} failed", label(*owner)),
            StopReason::StopAll => "All sounds stopped".to_string(),
            StopReason::Toggled | StopReason::Superseded => {
                format!("Stopped {}", label(*owner))
            }
        },
    };
    *state.status.write() = status;
}
