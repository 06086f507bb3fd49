//! Voice mixing for the output callback.
//!
//! Every resource owns a [`Voice`]. The cpal callback sums all playing voices,
//! each scaled by its native volume and, when routed through the processing
//! graph, by its gain node multiplier.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::backend::{ResourceEvent, ResourceId};

/// Atomic `f32` stored as its bit pattern.
#[derive(Debug)]
struct AtomicGain(AtomicU32);

impl AtomicGain {
    fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Device format the mixer renders at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Mixer-side state of one resource.
pub struct Voice {
    id: ResourceId,
    samples: RwLock<Arc<Vec<f32>>>,
    position: AtomicUsize,
    playing: AtomicBool,
    volume: AtomicGain,
    boost: AtomicGain,
    routed: AtomicBool,
    events: broadcast::Sender<ResourceEvent>,
}

impl Voice {
    pub fn new(id: ResourceId) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            id,
            samples: RwLock::new(Arc::new(Vec::new())),
            position: AtomicUsize::new(0),
            playing: AtomicBool::new(false),
            volume: AtomicGain::new(1.0),
            boost: AtomicGain::new(1.0),
            routed: AtomicBool::new(false),
            events,
        }
    }

    pub const fn id(&self) -> ResourceId {
        self.id
    }

    /// Replace the clip and rewind.
    pub fn load(&self, samples: Vec<f32>) {
        self.playing.store(false, Ordering::SeqCst);
        // Rewind first so the callback never pairs an old position with new samples.
        self.position.store(0, Ordering::SeqCst);
        *self.samples.write() = Arc::new(samples);
    }

    pub fn clear(&self) {
        self.load(Vec::new());
    }

    pub fn start(&self) {
        self.playing.store(true, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.playing.store(false, Ordering::SeqCst);
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    pub fn rewind(&self) {
        self.position.store(0, Ordering::SeqCst);
    }

    pub fn position(&self) -> usize {
        self.position.load(Ordering::SeqCst)
    }

    /// Whether the position sits at the end of the clip.
    pub fn at_end(&self) -> bool {
        self.position() >= self.samples.read().len()
    }

    pub fn volume(&self) -> f32 {
        self.volume.load()
    }

    pub fn set_volume(&self, volume: f32) {
        self.volume.store(volume.clamp(0.0, 1.0));
    }

    pub fn boost(&self) -> f32 {
        self.boost.load()
    }

    pub fn set_boost(&self, boost: f32) {
        self.boost.store(boost.max(0.0));
    }

    pub fn is_routed(&self) -> bool {
        self.routed.load(Ordering::SeqCst)
    }

    /// Mark the voice as routed. Returns `false` if it already was.
    pub fn route(&self) -> bool {
        !self.routed.swap(true, Ordering::SeqCst)
    }

    pub fn unroute(&self) {
        self.routed.store(false, Ordering::SeqCst);
        self.boost.store(1.0);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ResourceEvent> {
        self.events.subscribe()
    }

    /// Add this voice into `out`. Returns `true` once the clip is exhausted.
    fn render(&self, out: &mut [f32], graph_running: bool) -> bool {
        let gain = if self.is_routed() {
            if graph_running {
                self.volume() * self.boost()
            } else {
                0.0
            }
        } else {
            self.volume()
        };

        let samples = self.samples.read().clone();
        let position = self.position.load(Ordering::SeqCst);
        // The clip may have been swapped under us since the position was written.
        let start = position.min(samples.len());
        let count = (samples.len() - start).min(out.len());
        for (dst, src) in out.iter_mut().zip(&samples[start..start + count]) {
            *dst += src * gain;
        }
        // A concurrent rewind or load wins over this advance.
        let _ = self.position.compare_exchange(
            position,
            start + count,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        start + count >= samples.len()
    }
}

/// Shared mixer read by the output callback.
pub struct Mixer {
    voices: RwLock<Vec<Weak<Voice>>>,
    graph_running: AtomicBool,
    format: OnceCell<OutputFormat>,
}

impl Mixer {
    pub fn new() -> Self {
        Self {
            voices: RwLock::new(Vec::new()),
            graph_running: AtomicBool::new(false),
            format: OnceCell::new(),
        }
    }

    /// Record the device format. Later calls are ignored.
    pub fn set_format(&self, format: OutputFormat) {
        let _ = self.format.set(format);
    }

    pub fn format(&self) -> Option<OutputFormat> {
        self.format.get().copied()
    }

    pub fn add(&self, voice: &Arc<Voice>) {
        self.voices.write().push(Arc::downgrade(voice));
    }

    /// Live voice with the given id.
    pub fn find(&self, id: ResourceId) -> Option<Arc<Voice>> {
        self.voices
            .read()
            .iter()
            .filter_map(Weak::upgrade)
            .find(|voice| voice.id() == id)
    }

    pub fn set_graph_running(&self, running: bool) {
        self.graph_running.store(running, Ordering::SeqCst);
    }

    pub fn graph_running(&self) -> bool {
        self.graph_running.load(Ordering::SeqCst)
    }

    /// Fill `out` with the mix of every playing voice.
    pub fn mix(&self, out: &mut [f32]) {
        out.fill(0.0);
        let graph_running = self.graph_running();

        let mut pruned = false;
        for weak in self.voices.read().iter() {
            let Some(voice) = weak.upgrade() else {
                pruned = true;
                continue;
            };
            if !voice.is_playing() {
                continue;
            }
            if voice.render(out, graph_running) {
                voice.stop();
                let _ = voice.events.send(ResourceEvent::Ended);
            }
        }
        if pruned {
            self.voices.write().retain(|weak| weak.strong_count() > 0);
        }

        for sample in out.iter_mut() {
            if sample.abs() > 0.9 {
                *sample = sample.tanh();
            }
        }
    }
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new()
    }
}
