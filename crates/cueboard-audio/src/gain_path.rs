//! Applying a linear gain to a playable resource.
//!
//! Gains up to unity go straight to the resource's native volume. Louder
//! gains route the resource through a gain node of a processing context that
//! is created lazily and shared by every caller for the life of the process.
//! If the graph cannot be built the resource is played at native volume
//! capped at unity instead; applying a gain never fails.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::collections::HashMap;
use std::sync::Arc;

use cueboard_core::gain::{MAX_GAIN, NATIVE_MAX_GAIN};
use cueboard_core::{Error, GainStrategyPreference, Result};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::backend::{AudioBackend, AudioResource, GainNode, ProcessingContext, ResourceId};

/// How gains above unity are realised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GainStrategy {
    /// Native volume only; boosts are capped at unity.
    Native,
    /// Boosts go through a processing graph.
    Graph,
}

impl GainStrategy {
    /// Pick a strategy from the user's preference and the backend's abilities.
    pub fn select(preference: GainStrategyPreference, backend: &dyn AudioBackend) -> Self {
        match preference {
            GainStrategyPreference::Auto if backend.supports_processing() => Self::Graph,
            _ => Self::Native,
        }
    }
}

/// How a gain ended up being applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GainMode {
    /// Native volume alone was enough.
    #[default]
    Native,
    /// Routed through a gain node.
    Boosted,
    /// A boost was requested but only native volume was available.
    Degraded,
}

/// Result of applying a gain.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GainOutcome {
    pub mode: GainMode,
    /// Native volume set on the resource.
    pub volume: f32,
    /// Gain node multiplier, `1.0` when no node is attached.
    pub multiplier: f32,
}

impl GainOutcome {
    const fn native(volume: f32) -> Self {
        Self {
            mode: GainMode::Native,
            volume,
            multiplier: 1.0,
        }
    }

    /// Whether a gain node is attached.
    pub fn has_gain_path(&self) -> bool {
        self.mode == GainMode::Boosted
    }

    /// Overall gain reaching the output.
    pub fn effective(&self) -> f32 {
        self.volume * self.multiplier
    }
}

/// Builds and tears down gain paths for resources.
pub struct GainPathBuilder {
    backend: Arc<dyn AudioBackend>,
    strategy: GainStrategy,
    context: OnceCell<Arc<dyn ProcessingContext>>,
    nodes: Mutex<HashMap<ResourceId, Box<dyn GainNode>>>,
}

impl GainPathBuilder {
    pub fn new(backend: Arc<dyn AudioBackend>, strategy: GainStrategy) -> Self {
        debug!("Gain strategy: {strategy:?}");
        Self {
            backend,
            strategy,
            context: OnceCell::new(),
            nodes: Mutex::new(HashMap::new()),
        }
    }

    pub const fn strategy(&self) -> GainStrategy {
        self.strategy
    }

    /// Apply `gain` (clamped to `[0, MAX_GAIN]`) to `resource`.
    pub async fn apply(&self, resource: &dyn AudioResource, gain: f64) -> GainOutcome {
        let target = gain.clamp(0.0, MAX_GAIN) as f32;

        if f64::from(target) <= NATIVE_MAX_GAIN {
            self.release(resource.id());
            resource.set_volume(target);
            return GainOutcome::native(target);
        }

        match self.boost(resource, target).await {
            Ok(outcome) => outcome,
            Err(e) => {
                if self.strategy == GainStrategy::Graph {
                    warn!(
                        "Cannot boost {} to {target:.2}, capping at native volume: {e}",
                        resource.id()
                    );
                } else {
                    debug!("Boost to {target:.2} unavailable: {e}");
                }
                self.release(resource.id());
                let volume = target.min(NATIVE_MAX_GAIN as f32);
                resource.set_volume(volume);
                GainOutcome {
                    mode: GainMode::Degraded,
                    volume,
                    multiplier: 1.0,
                }
            }
        }
    }

    async fn boost(&self, resource: &dyn AudioResource, target: f32) -> Result<GainOutcome> {
        if self.strategy == GainStrategy::Native {
            return Err(Error::Graph("native-only gain strategy".to_string()));
        }

        let context = self.context()?;
        if context.is_suspended() {
            if let Err(e) = context.resume().await {
                debug!("Processing context stayed suspended: {e}");
            }
        }

        let id = resource.id();
        let mut nodes = self.nodes.lock();
        if !nodes.contains_key(&id) {
            let node = context.route(resource)?;
            debug!("Routed {id} through a gain node");
            nodes.insert(id, node);
        }
        let multiplier = target.min(MAX_GAIN as f32);
        if let Some(node) = nodes.get(&id) {
            node.set_gain(multiplier);
        }
        drop(nodes);

        resource.set_volume(NATIVE_MAX_GAIN as f32);
        Ok(GainOutcome {
            mode: GainMode::Boosted,
            volume: NATIVE_MAX_GAIN as f32,
            multiplier,
        })
    }

    fn context(&self) -> Result<Arc<dyn ProcessingContext>> {
        self.context
            .get_or_try_init(|| {
                debug!("Creating processing context");
                self.backend.create_context()
            })
            .cloned()
    }

    /// Disconnect any gain node attached to `id`.
    ///
    /// Safe to call repeatedly and when nothing is attached.
    pub fn release(&self, id: ResourceId) {
        let node = self.nodes.lock().remove(&id);
        if let Some(node) = node {
            if let Err(e) = node.disconnect() {
                warn!("Failed to disconnect gain node of {id}: {e}");
            }
            debug!("Released gain path of {id}");
        }
    }

    /// Whether `id` currently has a gain node.
    pub fn is_routed(&self, id: ResourceId) -> bool {
        self.nodes.lock().contains_key(&id)
    }

    /// Multiplier of the gain node attached to `id`, if any.
    pub fn multiplier(&self, id: ResourceId) -> Option<f32> {
        self.nodes.lock().get(&id).map(|node| node.gain())
    }
}
