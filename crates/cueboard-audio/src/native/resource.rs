//! Playable resource backed by a mixer voice.

use std::sync::Arc;

use async_trait::async_trait;
use cueboard_core::{Error, Result};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

use super::decode::ClipDecoder;
use super::loader::SourceLoader;
use super::mixer::{Mixer, OutputFormat, Voice};
use super::resample;
use crate::backend::{AudioResource, ResourceEvent, ResourceId};

pub struct NativeResource {
    voice: Arc<Voice>,
    mixer: Arc<Mixer>,
    loader: SourceLoader,
    source: Mutex<Option<String>>,
    /// Location whose samples the voice currently holds.
    loaded: Mutex<Option<String>>,
}

impl NativeResource {
    pub(super) fn new(mixer: Arc<Mixer>, loader: SourceLoader) -> Self {
        let voice = Arc::new(Voice::new(ResourceId::next()));
        mixer.add(&voice);
        Self {
            voice,
            mixer,
            loader,
            source: Mutex::new(None),
            loaded: Mutex::new(None),
        }
    }

    async fn load(&self, location: String, format: OutputFormat) -> Result<()> {
        let loader = self.loader.clone();
        let target = location.clone();
        let samples = tokio::task::spawn_blocking(move || {
            let clip = loader.load(&target)?;
            let decoded = ClipDecoder::from_bytes(clip.data, clip.hint.as_deref())?.decode_all()?;
            resample::conform(decoded, format.sample_rate, format.channels)
        })
        .await
        .map_err(|e| Error::Internal(format!("Clip loader panicked: {e}")))??;

        // The source may have moved on while decoding.
        if self.source.lock().as_deref() != Some(location.as_str()) {
            return Err(Error::Cancelled);
        }

        debug!("Loaded {} samples for {}", samples.len(), self.voice.id());
        self.voice.load(samples);
        *self.loaded.lock() = Some(location);
        Ok(())
    }
}

#[async_trait]
impl AudioResource for NativeResource {
    fn id(&self) -> ResourceId {
        self.voice.id()
    }

    fn source(&self) -> Option<String> {
        self.source.lock().clone()
    }

    fn set_source(&self, location: &str) {
        self.voice.stop();
        *self.source.lock() = Some(location.to_string());
        let mut loaded = self.loaded.lock();
        if loaded.as_deref() != Some(location) {
            *loaded = None;
            self.voice.clear();
        }
    }

    fn volume(&self) -> f32 {
        self.voice.volume()
    }

    fn set_volume(&self, volume: f32) {
        self.voice.set_volume(volume);
    }

    fn is_paused(&self) -> bool {
        !self.voice.is_playing()
    }

    async fn play(&self) -> Result<()> {
        let location = self
            .source()
            .ok_or_else(|| Error::Playback("no source loaded".to_string()))?;

        let stale = self.loaded.lock().as_deref() != Some(location.as_str());
        if stale {
            let format = self
                .mixer
                .format()
                .ok_or_else(|| Error::AudioOutput("Output not running".to_string()))?;
            self.load(location, format).await?;
        } else if self.voice.at_end() {
            self.voice.rewind();
        }

        self.voice.start();
        Ok(())
    }

    fn pause(&self) {
        self.voice.stop();
    }

    fn rewind(&self) {
        self.voice.rewind();
    }

    fn subscribe(&self) -> broadcast::Receiver<ResourceEvent> {
        self.voice.subscribe()
    }
}
