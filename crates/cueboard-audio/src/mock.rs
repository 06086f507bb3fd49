//! In-memory backend for tests.
//!
//! Resources never render anything. Tests script failures, hold `play`
//! calls open to simulate slow starts, and inject [`ResourceEvent`]s.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use cueboard_core::{Error, LocalFile, ObjectUrl, Result};
use parking_lot::Mutex;
use tokio::sync::{broadcast, Notify};

use crate::backend::{
    AudioBackend, AudioResource, GainNode, ProcessingContext, ResourceEvent, ResourceId,
    SharedResource,
};

/// Object URL operations in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEntry {
    Created(ObjectUrl, PathBuf),
    Revoked(ObjectUrl),
}

#[derive(Default)]
struct Script {
    failing: Mutex<HashSet<String>>,
    held: Mutex<HashSet<String>>,
    release: Notify,
    waiting: AtomicUsize,
    route_fails: AtomicBool,
    resume_fails: AtomicBool,
}

struct Shared {
    processing: bool,
    script: Arc<Script>,
    resources: Mutex<Vec<Arc<MockResource>>>,
    contexts: Mutex<Vec<Arc<MockContext>>>,
    object_urls: Mutex<HashMap<ObjectUrl, PathBuf>>,
    journal: Mutex<Vec<JournalEntry>>,
}

/// Backend whose behaviour is fully scripted by the test.
#[derive(Clone)]
pub struct MockBackend {
    shared: Arc<Shared>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::with_processing(true)
    }

    /// A backend whose processing API is missing altogether.
    pub fn without_processing() -> Self {
        Self::with_processing(false)
    }

    fn with_processing(processing: bool) -> Self {
        Self {
            shared: Arc::new(Shared {
                processing,
                script: Arc::new(Script::default()),
                resources: Mutex::new(Vec::new()),
                contexts: Mutex::new(Vec::new()),
                object_urls: Mutex::new(HashMap::new()),
                journal: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Make `play` reject for resources pointed at `location`.
    pub fn fail_play(&self, location: &str) {
        self.shared.script.failing.lock().insert(location.to_string());
    }

    /// Make `play` wait for [`MockBackend::release_held`] at `location`.
    pub fn hold_play(&self, location: &str) {
        self.shared.script.held.lock().insert(location.to_string());
    }

    /// Let every held `play` call finish.
    pub fn release_held(&self) {
        self.shared.script.held.lock().clear();
        self.shared.script.release.notify_waiters();
    }

    /// Number of `play` calls currently held open.
    pub fn waiting_plays(&self) -> usize {
        self.shared.script.waiting.load(Ordering::SeqCst)
    }

    pub fn fail_routing(&self, fail: bool) {
        self.shared.script.route_fails.store(fail, Ordering::SeqCst);
    }

    pub fn fail_resume(&self, fail: bool) {
        self.shared.script.resume_fails.store(fail, Ordering::SeqCst);
    }

    pub fn resources(&self) -> Vec<Arc<MockResource>> {
        self.shared.resources.lock().clone()
    }

    pub fn resource(&self, id: ResourceId) -> Option<Arc<MockResource>> {
        self.shared
            .resources
            .lock()
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    pub fn contexts_created(&self) -> usize {
        self.shared.contexts.lock().len()
    }

    /// The first processing context handed out.
    pub fn context(&self) -> Option<Arc<MockContext>> {
        self.shared.contexts.lock().first().cloned()
    }

    pub fn journal(&self) -> Vec<JournalEntry> {
        self.shared.journal.lock().clone()
    }

    /// Object URLs created and not yet revoked.
    pub fn live_object_urls(&self) -> Vec<ObjectUrl> {
        self.shared.object_urls.lock().keys().cloned().collect()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for MockBackend {
    fn create_resource(&self) -> SharedResource {
        let resource = Arc::new(MockResource::new(self.shared.script.clone()));
        self.shared.resources.lock().push(resource.clone());
        resource
    }

    fn supports_processing(&self) -> bool {
        self.shared.processing
    }

    fn create_context(&self) -> Result<Arc<dyn ProcessingContext>> {
        if !self.shared.processing {
            return Err(Error::Graph("processing API unavailable".to_string()));
        }
        let context = Arc::new(MockContext::new(self.shared.script.clone()));
        self.shared.contexts.lock().push(context.clone());
        Ok(context)
    }

    fn create_object_url(&self, file: &LocalFile) -> Result<ObjectUrl> {
        let url = ObjectUrl::generate();
        self.shared
            .object_urls
            .lock()
            .insert(url.clone(), file.path.clone());
        self.shared
            .journal
            .lock()
            .push(JournalEntry::Created(url.clone(), file.path.clone()));
        Ok(url)
    }

    fn revoke_object_url(&self, url: &ObjectUrl) {
        if self.shared.object_urls.lock().remove(url).is_some() {
            self.shared
                .journal
                .lock()
                .push(JournalEntry::Revoked(url.clone()));
        }
    }
}

/// Scripted resource.
pub struct MockResource {
    id: ResourceId,
    script: Arc<Script>,
    source: Mutex<Option<String>>,
    volume: Mutex<f32>,
    paused: AtomicBool,
    plays: AtomicUsize,
    rewinds: AtomicUsize,
    events: broadcast::Sender<ResourceEvent>,
}

impl MockResource {
    fn new(script: Arc<Script>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            id: ResourceId::next(),
            script,
            source: Mutex::new(None),
            volume: Mutex::new(1.0),
            paused: AtomicBool::new(true),
            plays: AtomicUsize::new(0),
            rewinds: AtomicUsize::new(0),
            events,
        }
    }

    /// Simulate the clip running out.
    pub fn finish(&self) {
        self.paused.store(true, Ordering::SeqCst);
        let _ = self.events.send(ResourceEvent::Ended);
    }

    /// Simulate a runtime failure mid-playback.
    pub fn fail(&self, message: &str) {
        self.paused.store(true, Ordering::SeqCst);
        let _ = self.events.send(ResourceEvent::Error(message.to_string()));
    }

    /// Successful `play` calls so far.
    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }

    pub fn rewinds(&self) -> usize {
        self.rewinds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioResource for MockResource {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn source(&self) -> Option<String> {
        self.source.lock().clone()
    }

    fn set_source(&self, location: &str) {
        self.paused.store(true, Ordering::SeqCst);
        *self.source.lock() = Some(location.to_string());
    }

    fn volume(&self) -> f32 {
        *self.volume.lock()
    }

    fn set_volume(&self, volume: f32) {
        *self.volume.lock() = volume.clamp(0.0, 1.0);
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    async fn play(&self) -> Result<()> {
        let location = self
            .source()
            .ok_or_else(|| Error::Playback("no source loaded".to_string()))?;

        let held = self.script.held.lock().contains(&location);
        if held {
            let released = self.script.release.notified();
            self.script.waiting.fetch_add(1, Ordering::SeqCst);
            released.await;
            self.script.waiting.fetch_sub(1, Ordering::SeqCst);
        }

        if self.script.failing.lock().contains(&location) {
            return Err(Error::Playback(format!("mock rejected {location}")));
        }

        self.paused.store(false, Ordering::SeqCst);
        self.plays.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    fn rewind(&self) {
        self.rewinds.fetch_add(1, Ordering::SeqCst);
    }

    fn subscribe(&self) -> broadcast::Receiver<ResourceEvent> {
        self.events.subscribe()
    }
}

/// Scripted processing context.
pub struct MockContext {
    script: Arc<Script>,
    suspended: AtomicBool,
    gains: Arc<Mutex<HashMap<ResourceId, f32>>>,
}

impl MockContext {
    fn new(script: Arc<Script>) -> Self {
        Self {
            script,
            suspended: AtomicBool::new(true),
            gains: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn is_routed(&self, id: ResourceId) -> bool {
        self.gains.lock().contains_key(&id)
    }

    /// Multiplier of the node routing `id`.
    pub fn gain_of(&self, id: ResourceId) -> Option<f32> {
        self.gains.lock().get(&id).copied()
    }
}

#[async_trait]
impl ProcessingContext for MockContext {
    fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    async fn resume(&self) -> Result<()> {
        if self.script.resume_fails.load(Ordering::SeqCst) {
            return Err(Error::Graph("resume rejected".to_string()));
        }
        self.suspended.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn route(&self, resource: &dyn AudioResource) -> Result<Box<dyn GainNode>> {
        if self.script.route_fails.load(Ordering::SeqCst) {
            return Err(Error::Graph("node creation failed".to_string()));
        }
        let id = resource.id();
        let mut gains = self.gains.lock();
        if gains.contains_key(&id) {
            return Err(Error::AlreadyRouted(id.0));
        }
        gains.insert(id, 1.0);
        Ok(Box::new(MockGainNode {
            id,
            gains: self.gains.clone(),
        }))
    }
}

struct MockGainNode {
    id: ResourceId,
    gains: Arc<Mutex<HashMap<ResourceId, f32>>>,
}

impl GainNode for MockGainNode {
    fn gain(&self) -> f32 {
        self.gains.lock().get(&self.id).copied().unwrap_or(1.0)
    }

    fn set_gain(&self, gain: f32) {
        if let Some(slot) = self.gains.lock().get_mut(&self.id) {
            *slot = gain;
        }
    }

    fn disconnect(&self) -> Result<()> {
        self.gains.lock().remove(&self.id);
        Ok(())
    }
}
