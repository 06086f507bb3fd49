//! Seams between the coordinator and whatever actually renders audio.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use cueboard_core::{LocalFile, ObjectUrl, Result};
use tokio::sync::broadcast;

/// Shared handle to a playable resource.
pub type SharedResource = Arc<dyn AudioResource>;

/// Identity of a playable resource, unique for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u64);

impl ResourceId {
    /// Allocate the next unused id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Events a resource raises while rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceEvent {
    /// Playback reached the end of the clip.
    Ended,
    /// Playback stopped because of a runtime failure.
    Error(String),
}

/// A single playable sound with a native volume control.
///
/// Native volume is limited to `[0.0, 1.0]`; anything louder needs a
/// [`ProcessingContext`].
#[async_trait]
pub trait AudioResource: Send + Sync {
    fn id(&self) -> ResourceId;

    /// Location currently loaded, if any.
    fn source(&self) -> Option<String>;

    /// Point the resource at a new location. Stops any current playback.
    fn set_source(&self, location: &str);

    fn volume(&self) -> f32;

    /// Set native volume; values outside `[0.0, 1.0]` are clamped.
    fn set_volume(&self, volume: f32);

    fn is_paused(&self) -> bool;

    /// Start or resume playback from the current position.
    async fn play(&self) -> Result<()>;

    fn pause(&self);

    /// Move the playback position back to the start.
    fn rewind(&self);

    /// Subscribe to [`ResourceEvent`]s.
    fn subscribe(&self) -> broadcast::Receiver<ResourceEvent>;
}

/// Audio processing graph able to amplify a resource beyond unity.
#[async_trait]
pub trait ProcessingContext: Send + Sync {
    /// Suspended contexts render routed resources silently.
    fn is_suspended(&self) -> bool;

    async fn resume(&self) -> Result<()>;

    /// Route `resource` through a gain node into the context output.
    ///
    /// Fails if the resource is already routed.
    fn route(&self, resource: &dyn AudioResource) -> Result<Box<dyn GainNode>>;
}

/// Gain stage between a routed resource and the context output.
pub trait GainNode: Send + Sync {
    fn gain(&self) -> f32;

    fn set_gain(&self, gain: f32);

    /// Unroute the resource. The node is unusable afterwards.
    fn disconnect(&self) -> Result<()>;
}

/// Factory for resources, processing contexts and object URLs.
pub trait AudioBackend: Send + Sync {
    fn create_resource(&self) -> SharedResource;

    /// Whether [`AudioBackend::create_context`] can ever succeed.
    fn supports_processing(&self) -> bool;

    fn create_context(&self) -> Result<Arc<dyn ProcessingContext>>;

    /// Create a transient playable reference to a local file.
    fn create_object_url(&self, file: &LocalFile) -> Result<ObjectUrl>;

    /// Release a reference created by [`AudioBackend::create_object_url`].
    fn revoke_object_url(&self, url: &ObjectUrl);
}
