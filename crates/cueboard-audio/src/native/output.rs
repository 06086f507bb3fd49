//! Audio output using cpal.

use std::sync::Arc;

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    Device, SampleFormat, Stream, StreamConfig,
};
use cueboard_core::{Error, Result};
use tracing::{debug, error, info};

use super::mixer::{Mixer, OutputFormat};

/// Running output stream fed by a [`Mixer`].
pub struct AudioOutput {
    _stream: Stream,
    format: OutputFormat,
    device_name: String,
}

impl AudioOutput {
    /// Open the default output device.
    pub fn open(mixer: Arc<Mixer>) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::AudioOutput("No output device found".to_string()))?;

        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("Using audio output device: {device_name}");

        let supported = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get output config: {e}")))?;
        debug!("Supported output config: {supported:?}");

        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();
        let format = OutputFormat {
            sample_rate: config.sample_rate.0,
            channels: config.channels,
        };

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, mixer)?,
            SampleFormat::I16 => build_stream::<i16>(&device, &config, mixer)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, mixer)?,
            _ => {
                return Err(Error::AudioOutput(format!(
                    "Unsupported sample format: {sample_format:?}"
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {e}")))?;

        debug!(
            "Output running at {}Hz, {} channels",
            format.sample_rate, format.channels
        );

        Ok(Self {
            _stream: stream,
            format,
            device_name,
        })
    }

    pub const fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
    device: &Device,
    config: &StreamConfig,
    mixer: Arc<Mixer>,
) -> Result<Stream> {
    let err_fn = |err| {
        error!("Audio stream error: {err}");
    };

    let mut scratch: Vec<f32> = Vec::new();
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                scratch.resize(data.len(), 0.0);
                mixer.mix(&mut scratch);
                for (sample, mixed) in data.iter_mut().zip(&scratch) {
                    *sample = T::from_sample(*mixed);
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {e}")))
}

/// Name of the default output device, if any.
pub fn default_device_name() -> Option<String> {
    cpal::default_host()
        .default_output_device()
        .and_then(|d| d.name().ok())
}
