//! Backend rendering through the default cpal output device.
//!
//! Clips are fetched and decoded in full with symphonia, converted to the
//! device format with rubato, and mixed in the output callback.

mod context;
mod decode;
mod loader;
mod mixer;
mod output;
mod resample;
mod resource;

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Sender};
use cueboard_core::{Error, LocalFile, ObjectUrl, Result, Settings};
use tracing::{debug, error, info};

pub use self::decode::{ClipDecoder, DecodedClip};
pub use self::loader::{LoadedClip, SourceLoader};
pub use self::mixer::OutputFormat;
pub use self::output::default_device_name;

use self::context::NativeContext;
use self::loader::ObjectUrlRegistry;
use self::mixer::Mixer;
use self::output::AudioOutput;
use self::resource::NativeResource;
use crate::backend::{AudioBackend, ProcessingContext, SharedResource};

/// Audio backend playing on the default output device.
pub struct NativeBackend {
    mixer: Arc<Mixer>,
    loader: SourceLoader,
    object_urls: ObjectUrlRegistry,
    device_name: String,
    shutdown: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl NativeBackend {
    /// Open the output device and start mixing.
    pub fn start(settings: &Settings) -> Result<Self> {
        let mixer = Arc::new(Mixer::new());
        let object_urls = ObjectUrlRegistry::default();
        let loader = SourceLoader::new(
            &settings.uploads_route,
            settings.uploads_dir.clone(),
            object_urls.clone(),
        );

        let (ready_tx, ready_rx) = bounded(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let output_mixer = mixer.clone();

        // cpal::Stream is not Send, so it lives and dies on its own thread.
        let thread = std::thread::Builder::new()
            .name("cueboard-output".to_string())
            .spawn(move || match AudioOutput::open(output_mixer) {
                Ok(output) => {
                    let _ = ready_tx.send(Ok((output.format(), output.device_name().to_string())));
                    let _ = shutdown_rx.recv();
                    debug!("Output thread shutting down");
                }
                Err(e) => {
                    error!("Failed to open audio output: {e}");
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| Error::AudioOutput(format!("Failed to spawn output thread: {e}")))?;

        let (format, device_name) = ready_rx
            .recv()
            .map_err(|_| Error::AudioOutput("Output thread exited early".to_string()))??;
        mixer.set_format(format);

        info!(
            "Audio output ready: {}Hz, {} channels, device: {device_name}",
            format.sample_rate, format.channels
        );

        Ok(Self {
            mixer,
            loader,
            object_urls,
            device_name,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn format(&self) -> Option<OutputFormat> {
        self.mixer.format()
    }
}

impl AudioBackend for NativeBackend {
    fn create_resource(&self) -> SharedResource {
        Arc::new(NativeResource::new(self.mixer.clone(), self.loader.clone()))
    }

    fn supports_processing(&self) -> bool {
        true
    }

    fn create_context(&self) -> Result<Arc<dyn ProcessingContext>> {
        Ok(Arc::new(NativeContext::new(self.mixer.clone())))
    }

    fn create_object_url(&self, file: &LocalFile) -> Result<ObjectUrl> {
        if !file.path.is_file() {
            return Err(Error::Resolution(format!(
                "{} is not a readable file",
                file.path.display()
            )));
        }
        let url = ObjectUrl::generate();
        self.object_urls
            .lock()
            .insert(url.as_str().to_string(), file.path.clone());
        debug!("Created {url} for {}", file.path.display());
        Ok(url)
    }

    fn revoke_object_url(&self, url: &ObjectUrl) {
        if self.object_urls.lock().remove(url.as_str()).is_some() {
            debug!("Revoked {url}");
        }
    }
}

impl Drop for NativeBackend {
    fn drop(&mut self) {
        drop(self.shutdown.take());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
