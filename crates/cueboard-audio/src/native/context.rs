//! Processing graph on top of the mixer.
//!
//! Routing a resource marks its voice as boosted; the mixer then applies the
//! gain node multiplier, and renders routed voices silent while the context
//! is suspended.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use cueboard_core::{Error, Result};
use tracing::debug;

use super::mixer::{Mixer, Voice};
use crate::backend::{AudioResource, GainNode, ProcessingContext};

pub struct NativeContext {
    mixer: Arc<Mixer>,
    suspended: AtomicBool,
}

impl NativeContext {
    pub(super) fn new(mixer: Arc<Mixer>) -> Self {
        mixer.set_graph_running(false);
        Self {
            mixer,
            suspended: AtomicBool::new(true),
        }
    }
}

impl Drop for NativeContext {
    fn drop(&mut self) {
        self.mixer.set_graph_running(false);
    }
}

#[async_trait]
impl ProcessingContext for NativeContext {
    fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    async fn resume(&self) -> Result<()> {
        if self.mixer.format().is_none() {
            return Err(Error::Graph("output device is not running".to_string()));
        }
        self.suspended.store(false, Ordering::SeqCst);
        self.mixer.set_graph_running(true);
        debug!("Processing context resumed");
        Ok(())
    }

    fn route(&self, resource: &dyn AudioResource) -> Result<Box<dyn GainNode>> {
        let id = resource.id();
        let voice = self
            .mixer
            .find(id)
            .ok_or_else(|| Error::Graph(format!("{id} does not belong to this output")))?;
        if !voice.route() {
            return Err(Error::AlreadyRouted(id.0));
        }
        Ok(Box::new(NativeGainNode { voice }))
    }
}

struct NativeGainNode {
    voice: Arc<Voice>,
}

impl GainNode for NativeGainNode {
    fn gain(&self) -> f32 {
        self.voice.boost()
    }

    fn set_gain(&self, gain: f32) {
        self.voice.set_boost(gain);
    }

    fn disconnect(&self) -> Result<()> {
        self.voice.unroute();
        Ok(())
    }
}
