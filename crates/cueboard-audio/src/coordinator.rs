//! Trigger-driven playback with at most one active session.
//!
//! Every trigger on the board asks the coordinator to play its clip. Starting
//! a clip stops whatever was playing first; a clip that ends or fails on its
//! own releases the output again. Each trigger observes its own [`Indicator`]
//! through a watch channel handed out by [`PlaybackCoordinator::attach`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use cueboard_core::gain::percent_to_gain;
use cueboard_core::{Error, Result, Settings, SourceDescriptor, DEFAULT_MAX_PERCENT};
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backend::{AudioBackend, ResourceEvent, SharedResource};
use crate::gain_path::{GainOutcome, GainPathBuilder, GainStrategy};

/// Opaque identity of a trigger control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TriggerId(Uuid);

impl TriggerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TriggerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TriggerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trigger-{}", &self.0.simple().to_string()[..8])
    }
}

/// Turns a [`SourceDescriptor`] into a playable location.
///
/// This is the only place the uploads path template lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceResolver {
    uploads_route: String,
}

impl SourceResolver {
    pub fn new(uploads_route: &str) -> Self {
        Self {
            uploads_route: uploads_route.trim_end_matches('/').to_string(),
        }
    }

    pub fn resolve(&self, source: &SourceDescriptor) -> Result<String> {
        match source {
            SourceDescriptor::Remote(url) => {
                let url = url.trim();
                if url.is_empty() {
                    return Err(Error::Resolution("empty url".to_string()));
                }
                Ok(url.to_string())
            }
            SourceDescriptor::Upload(filename) => {
                let filename = filename.trim();
                if filename.is_empty() {
                    return Err(Error::Resolution("no uploaded file".to_string()));
                }
                Ok(format!("{}/{filename}", self.uploads_route))
            }
        }
    }
}

impl Default for SourceResolver {
    fn default() -> Self {
        Self::new("/uploads")
    }
}

/// Lifecycle phase of the coordinator's session slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Idle,
    Starting,
    Playing,
    Stopping,
    Ending,
    Erroring,
}

/// Play/stop affordance shown on a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Indicator {
    #[default]
    Stopped,
    Playing,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The owning trigger was clicked again.
    Toggled,
    /// Another trigger started playing.
    Superseded,
    /// The clip played to the end.
    Ended,
    /// The clip failed while playing.
    Errored,
    /// The host asked to silence everything.
    StopAll,
}

/// Events broadcast to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorEvent {
    Started { owner: TriggerId },
    Stopped { owner: TriggerId, reason: StopReason },
}

/// One clip currently rendering on behalf of a trigger.
#[derive(Clone)]
pub struct PlaybackSession {
    owner: TriggerId,
    resource: SharedResource,
    gain: GainOutcome,
    generation: u64,
}

impl PlaybackSession {
    pub const fn owner(&self) -> TriggerId {
        self.owner
    }

    pub fn resource(&self) -> &SharedResource {
        &self.resource
    }

    pub const fn gain(&self) -> GainOutcome {
        self.gain
    }

    /// Whether the clip is routed through a gain node.
    pub fn has_gain_path(&self) -> bool {
        self.gain.has_gain_path()
    }
}

impl fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("owner", &self.owner)
            .field("resource", &self.resource.id())
            .field("gain", &self.gain)
            .field("generation", &self.generation)
            .finish()
    }
}

#[derive(Default)]
struct State {
    phase: SessionPhase,
    active: Option<PlaybackSession>,
    generation: u64,
    indicators: HashMap<TriggerId, watch::Sender<Indicator>>,
}

struct Inner {
    backend: Arc<dyn AudioBackend>,
    gain_path: Arc<GainPathBuilder>,
    resolver: SourceResolver,
    state: Mutex<State>,
    events: broadcast::Sender<CoordinatorEvent>,
}

/// Process-wide playback coordinator.
///
/// Construct once and hand clones to every trigger; clones share state.
#[derive(Clone)]
pub struct PlaybackCoordinator {
    inner: Arc<Inner>,
}

impl PlaybackCoordinator {
    /// Create a coordinator, choosing the gain strategy from `settings`.
    pub fn new(backend: Arc<dyn AudioBackend>, settings: &Settings) -> Self {
        let strategy = GainStrategy::select(settings.gain_strategy, backend.as_ref());
        let gain_path = Arc::new(GainPathBuilder::new(backend.clone(), strategy));
        Self::with_gain_path(backend, gain_path, SourceResolver::new(&settings.uploads_route))
    }

    pub fn with_gain_path(
        backend: Arc<dyn AudioBackend>,
        gain_path: Arc<GainPathBuilder>,
        resolver: SourceResolver,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                backend,
                gain_path,
                resolver,
                state: Mutex::new(State::default()),
                events,
            }),
        }
    }

    pub fn backend(&self) -> &Arc<dyn AudioBackend> {
        &self.inner.backend
    }

    /// Gain path builder shared with preview controls.
    pub fn gain_path(&self) -> &Arc<GainPathBuilder> {
        &self.inner.gain_path
    }

    pub fn resolver(&self) -> &SourceResolver {
        &self.inner.resolver
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.inner.events.subscribe()
    }

    /// Register `owner` and return the receiver of its indicator.
    pub fn attach(&self, owner: TriggerId) -> watch::Receiver<Indicator> {
        let mut state = self.inner.state.lock();
        state
            .indicators
            .entry(owner)
            .or_insert_with(|| watch::channel(Indicator::Stopped).0)
            .subscribe()
    }

    /// Forget `owner`, stopping its session if it has one.
    pub fn detach(&self, owner: TriggerId) {
        self.request_stop(owner);
        self.inner.state.lock().indicators.remove(&owner);
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.state.lock().phase
    }

    /// Owner of the session that is actually playing.
    pub fn active_owner(&self) -> Option<TriggerId> {
        let state = self.inner.state.lock();
        match (&state.active, state.phase) {
            (Some(session), SessionPhase::Playing) => Some(session.owner),
            _ => None,
        }
    }

    pub fn is_owner(&self, owner: TriggerId) -> bool {
        self.active_owner() == Some(owner)
    }

    /// Whether `owner` has a session that is starting or playing.
    pub fn holds_session(&self, owner: TriggerId) -> bool {
        self.inner
            .state
            .lock()
            .active
            .as_ref()
            .is_some_and(|session| session.owner == owner)
    }

    /// Stop whatever is playing, then play `source` for `owner`.
    ///
    /// Returns [`Error::Cancelled`] if another request superseded this one
    /// while it was starting.
    pub async fn request_start(
        &self,
        owner: TriggerId,
        source: &SourceDescriptor,
        gain_percent: u32,
    ) -> Result<PlaybackSession> {
        // An unplayable source leaves the current session alone.
        let location = self.inner.resolver.resolve(source)?;
        self.stop_active(StopReason::Superseded, |_| true);

        let resource = self.inner.backend.create_resource();
        resource.set_source(&location);

        let generation = {
            let mut state = self.inner.state.lock();
            state.generation += 1;
            state.phase = SessionPhase::Starting;
            state.active = Some(PlaybackSession {
                owner,
                resource: resource.clone(),
                gain: GainOutcome::default(),
                generation: state.generation,
            });
            state.generation
        };
        debug!("{owner} starting {location} at {gain_percent}%");

        let gain = percent_to_gain(gain_percent, DEFAULT_MAX_PERCENT);
        let outcome = self.inner.gain_path.apply(resource.as_ref(), gain).await;
        if !self.is_current(generation) {
            self.discard(&resource);
            return Err(Error::Cancelled);
        }

        let events = resource.subscribe();
        if let Err(e) = resource.play().await {
            let was_current = {
                let mut state = self.inner.state.lock();
                let current = state.generation == generation && state.active.is_some();
                if current {
                    state.active = None;
                    state.phase = SessionPhase::Idle;
                }
                current
            };
            self.discard(&resource);
            if !was_current {
                return Err(Error::Cancelled);
            }
            error!("{owner} failed to play {location}: {e}");
            return Err(e);
        }

        let session = {
            let mut state = self.inner.state.lock();
            let current = state.generation == generation;
            match state.active.as_mut() {
                Some(session) if current => {
                    session.gain = outcome;
                    let session = session.clone();
                    state.phase = SessionPhase::Playing;
                    Some(session)
                }
                _ => None,
            }
        };
        let Some(session) = session else {
            debug!("{owner} was superseded while starting");
            self.discard(&resource);
            return Err(Error::Cancelled);
        };

        self.set_indicator(owner, Indicator::Playing);
        self.publish(CoordinatorEvent::Started { owner });
        self.watch_resource(generation, events);
        info!("{owner} playing {location} ({:?})", outcome.mode);
        Ok(session)
    }

    /// Stop the session if `owner` holds it. Returns whether anything stopped.
    pub fn request_stop(&self, owner: TriggerId) -> bool {
        self.stop_active(StopReason::Toggled, |session| session.owner == owner)
            .is_some()
    }

    /// Stop the session regardless of owner.
    pub fn stop_all(&self) {
        if let Some(owner) = self.stop_active(StopReason::StopAll, |_| true) {
            info!("Stopped {owner} on stop-all");
        }
    }

    fn stop_active(
        &self,
        reason: StopReason,
        matches: impl FnOnce(&PlaybackSession) -> bool,
    ) -> Option<TriggerId> {
        let (session, was_playing) = {
            let mut state = self.inner.state.lock();
            if !state.active.as_ref().is_some_and(matches) {
                return None;
            }
            let was_playing = state.phase == SessionPhase::Playing;
            state.phase = match reason {
                StopReason::Ended => SessionPhase::Ending,
                StopReason::Errored => SessionPhase::Erroring,
                _ => SessionPhase::Stopping,
            };
            (state.active.take()?, was_playing)
        };

        self.discard(&session.resource);

        {
            let mut state = self.inner.state.lock();
            if state.active.is_none() {
                state.phase = SessionPhase::Idle;
            }
        }

        debug!("{} stopped: {reason:?}", session.owner);
        self.set_indicator(session.owner, Indicator::Stopped);
        // Owners that never reached Playing never saw Started either.
        if was_playing {
            self.publish(CoordinatorEvent::Stopped {
                owner: session.owner,
                reason,
            });
        }
        Some(session.owner)
    }

    /// Pause, rewind and unroute a resource. Safe to repeat.
    fn discard(&self, resource: &SharedResource) {
        resource.pause();
        resource.rewind();
        self.inner.gain_path.release(resource.id());
    }

    fn is_current(&self, generation: u64) -> bool {
        let state = self.inner.state.lock();
        state.generation == generation && state.active.is_some()
    }

    fn finish(&self, generation: u64, reason: StopReason) {
        self.stop_active(reason, |session| session.generation == generation);
    }

    fn watch_resource(&self, generation: u64, mut events: broadcast::Receiver<ResourceEvent>) {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            loop {
                let reason = match events.recv().await {
                    Ok(ResourceEvent::Ended) => StopReason::Ended,
                    Ok(ResourceEvent::Error(message)) => {
                        error!("Playback error: {message}");
                        StopReason::Errored
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Missed {skipped} resource events");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                };
                if let Some(inner) = weak.upgrade() {
                    Self { inner }.finish(generation, reason);
                }
                return;
            }
        });
    }

    fn set_indicator(&self, owner: TriggerId, indicator: Indicator) {
        if let Some(tx) = self.inner.state.lock().indicators.get(&owner) {
            tx.send_replace(indicator);
        }
    }

    fn publish(&self, event: CoordinatorEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::backend::AudioResource;
    use crate::gain_path::GainMode;
    use crate::mock::MockBackend;

    fn coordinator(backend: &MockBackend) -> PlaybackCoordinator {
        PlaybackCoordinator::new(Arc::new(backend.clone()), &Settings::default())
    }

    fn upload(name: &str) -> SourceDescriptor {
        SourceDescriptor::Upload(name.to_string())
    }

    #[test]
    fn test_resolver_template() {
        let resolver = SourceResolver::new("/uploads/");
        assert_eq!(resolver.resolve(&upload("horn.mp3")).unwrap(), "/uploads/horn.mp3");
        assert_eq!(
            resolver
                .resolve(&SourceDescriptor::Remote(" https://cdn/x.ogg ".into()))
                .unwrap(),
            "https://cdn/x.ogg"
        );
        assert!(resolver.resolve(&upload("  ")).unwrap_err().is_resolution());
        assert!(resolver
            .resolve(&SourceDescriptor::Remote(String::new()))
            .unwrap_err()
            .is_resolution());
    }

    #[tokio::test]
    async fn test_start_acquires_ownership() {
        let backend = MockBackend::new();
        let coordinator = coordinator(&backend);
        let a = TriggerId::new();
        let indicator = coordinator.attach(a);

        let session = coordinator.request_start(a, &upload("a.mp3"), 80).await.unwrap();
        assert_eq!(session.owner(), a);
        assert_eq!(coordinator.active_owner(), Some(a));
        assert_eq!(coordinator.phase(), SessionPhase::Playing);
        assert_eq!(*indicator.borrow(), Indicator::Playing);
        assert_eq!(session.resource().source().as_deref(), Some("/uploads/a.mp3"));
        assert!((session.resource().volume() - 0.64).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_exclusivity() {
        let backend = MockBackend::new();
        let coordinator = coordinator(&backend);
        let (a, b) = (TriggerId::new(), TriggerId::new());
        let a_indicator = coordinator.attach(a);
        let b_indicator = coordinator.attach(b);
        let mut events = coordinator.subscribe();

        let first = coordinator.request_start(a, &upload("a.mp3"), 100).await.unwrap();
        coordinator.request_start(b, &upload("b.mp3"), 100).await.unwrap();

        assert_eq!(coordinator.active_owner(), Some(b));
        assert_eq!(*a_indicator.borrow(), Indicator::Stopped);
        assert_eq!(*b_indicator.borrow(), Indicator::Playing);
        assert!(first.resource().is_paused());

        assert_eq!(events.recv().await.unwrap(), CoordinatorEvent::Started { owner: a });
        assert_eq!(
            events.recv().await.unwrap(),
            CoordinatorEvent::Stopped {
                owner: a,
                reason: StopReason::Superseded
            }
        );
        assert_eq!(events.recv().await.unwrap(), CoordinatorEvent::Started { owner: b });
    }

    #[tokio::test]
    async fn test_stop_by_non_owner_is_noop() {
        let backend = MockBackend::new();
        let coordinator = coordinator(&backend);
        let (a, b) = (TriggerId::new(), TriggerId::new());

        assert!(!coordinator.request_stop(a));
        assert_eq!(coordinator.phase(), SessionPhase::Idle);

        coordinator.request_start(a, &upload("a.mp3"), 100).await.unwrap();
        assert!(!coordinator.request_stop(b));
        assert_eq!(coordinator.active_owner(), Some(a));

        assert!(coordinator.request_stop(a));
        assert!(!coordinator.request_stop(a));
        assert_eq!(coordinator.phase(), SessionPhase::Idle);
    }

    #[tokio::test]
    async fn test_stop_resets_and_releases_gain_path() {
        let backend = MockBackend::new();
        let coordinator = coordinator(&backend);
        let a = TriggerId::new();

        let session = coordinator.request_start(a, &upload("a.mp3"), 150).await.unwrap();
        assert!(session.has_gain_path());
        assert_eq!(session.gain().mode, GainMode::Boosted);
        let id = session.resource().id();
        assert!(coordinator.gain_path().is_routed(id));

        coordinator.stop_all();
        let resource = backend.resource(id).unwrap();
        assert!(resource.is_paused());
        assert!(resource.rewinds() >= 1);
        assert!(!coordinator.gain_path().is_routed(id));
        assert_eq!(coordinator.active_owner(), None);
    }

    #[tokio::test]
    async fn test_play_failure_never_acquires() {
        let backend = MockBackend::new();
        backend.fail_play("/uploads/broken.mp3");
        let coordinator = coordinator(&backend);
        let a = TriggerId::new();
        let indicator = coordinator.attach(a);

        let err = coordinator
            .request_start(a, &upload("broken.mp3"), 100)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Playback(_)));
        assert_eq!(coordinator.phase(), SessionPhase::Idle);
        assert_eq!(coordinator.active_owner(), None);
        assert_eq!(*indicator.borrow(), Indicator::Stopped);
    }

    #[tokio::test]
    async fn test_unresolvable_source_changes_nothing() {
        let backend = MockBackend::new();
        let coordinator = coordinator(&backend);

        let err = coordinator
            .request_start(TriggerId::new(), &upload(""), 100)
            .await
            .unwrap_err();
        assert!(err.is_resolution());
        assert!(backend.resources().is_empty());
        assert_eq!(coordinator.phase(), SessionPhase::Idle);
    }

    #[tokio::test]
    async fn test_unresolvable_source_keeps_playing_session() {
        let backend = MockBackend::new();
        let coordinator = coordinator(&backend);
        let (a, b) = (TriggerId::new(), TriggerId::new());
        let a_indicator = coordinator.attach(a);

        let session = coordinator.request_start(a, &upload("a.mp3"), 100).await.unwrap();
        let mut events = coordinator.subscribe();

        let err = coordinator.request_start(b, &upload(""), 100).await.unwrap_err();
        assert!(err.is_resolution());
        assert_eq!(coordinator.active_owner(), Some(a));
        assert_eq!(coordinator.phase(), SessionPhase::Playing);
        assert_eq!(*a_indicator.borrow(), Indicator::Playing);
        assert!(!session.resource().is_paused());
        assert_eq!(backend.resources().len(), 1);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_natural_end_releases_ownership() {
        let backend = MockBackend::new();
        let coordinator = coordinator(&backend);
        let a = TriggerId::new();
        let mut indicator = coordinator.attach(a);

        let session = coordinator.request_start(a, &upload("a.mp3"), 100).await.unwrap();
        let _ = indicator.borrow_and_update();
        backend.resource(session.resource().id()).unwrap().finish();

        indicator.changed().await.unwrap();
        assert_eq!(*indicator.borrow(), Indicator::Stopped);
        assert_eq!(coordinator.active_owner(), None);
    }

    #[tokio::test]
    async fn test_runtime_error_releases_ownership() {
        let backend = MockBackend::new();
        let coordinator = coordinator(&backend);
        let a = TriggerId::new();
        let mut events = coordinator.subscribe();

        let session = coordinator.request_start(a, &upload("a.mp3"), 100).await.unwrap();
        backend
            .resource(session.resource().id())
            .unwrap()
            .fail("device unplugged");

        events.recv().await.unwrap(); // started
        assert_eq!(
            events.recv().await.unwrap(),
            CoordinatorEvent::Stopped {
                owner: a,
                reason: StopReason::Errored
            }
        );
        assert_eq!(coordinator.phase(), SessionPhase::Idle);
    }

    #[tokio::test]
    async fn test_stale_end_event_is_ignored() {
        let backend = MockBackend::new();
        let coordinator = coordinator(&backend);
        let (a, b) = (TriggerId::new(), TriggerId::new());

        let first = coordinator.request_start(a, &upload("a.mp3"), 100).await.unwrap();
        coordinator.request_start(b, &upload("b.mp3"), 100).await.unwrap();

        backend.resource(first.resource().id()).unwrap().finish();
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        assert_eq!(coordinator.active_owner(), Some(b));
    }

    #[tokio::test]
    async fn test_superseded_while_starting() {
        let backend = MockBackend::new();
        backend.hold_play("/uploads/slow.mp3");
        let coordinator = coordinator(&backend);
        let (a, b) = (TriggerId::new(), TriggerId::new());
        let a_indicator = coordinator.attach(a);
        let mut events = coordinator.subscribe();

        let pending = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .request_start(a, &SourceDescriptor::Upload("slow.mp3".into()), 100)
                    .await
            })
        };
        while backend.waiting_plays() == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(coordinator.phase(), SessionPhase::Starting);
        assert_eq!(coordinator.active_owner(), None);

        coordinator.request_start(b, &upload("b.mp3"), 100).await.unwrap();
        backend.release_held();

        let err = pending.await.unwrap().unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(coordinator.active_owner(), Some(b));
        assert_eq!(*a_indicator.borrow(), Indicator::Stopped);

        let slow = backend
            .resources()
            .into_iter()
            .find(|r| r.source().as_deref() == Some("/uploads/slow.mp3"))
            .unwrap();
        assert!(slow.is_paused());

        // a never started, so it gets no Stopped either
        assert_eq!(events.try_recv().unwrap(), CoordinatorEvent::Started { owner: b });
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_detach_stops_owned_session() {
        let backend = MockBackend::new();
        let coordinator = coordinator(&backend);
        let a = TriggerId::new();
        coordinator.attach(a);

        coordinator.request_start(a, &upload("a.mp3"), 100).await.unwrap();
        coordinator.detach(a);
        assert_eq!(coordinator.active_owner(), None);
    }
}
