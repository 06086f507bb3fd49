//! Sample rate and channel conversion of decoded clips.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use cueboard_core::{Error, Result};
use rubato::{FftFixedIn, Resampler as RubatoResampler};
use tracing::debug;

use super::decode::DecodedClip;

const CHUNK_SIZE: usize = 1024;

/// Convert a whole clip to the device format, interleaved.
pub fn conform(clip: DecodedClip, rate: u32, channels: u16) -> Result<Vec<f32>> {
    let samples = if clip.sample_rate == rate {
        clip.samples
    } else {
        let mut resampler = ClipResampler::new(clip.sample_rate, rate, usize::from(clip.channels))?;
        resampler.run(&clip.samples)?
    };
    Ok(remix(&samples, clip.channels, channels))
}

/// Offline resampler for complete clips.
struct ClipResampler {
    inner: FftFixedIn<f32>,
    input_rate: u32,
    output_rate: u32,
    channels: usize,
}

impl ClipResampler {
    fn new(input_rate: u32, output_rate: u32, channels: usize) -> Result<Self> {
        let channels = channels.max(1);
        let inner = FftFixedIn::new(
            input_rate as usize,
            output_rate as usize,
            CHUNK_SIZE,
            2,
            channels,
        )
        .map_err(|e| Error::AudioDecode(format!("Failed to create resampler: {e}")))?;

        debug!("Resampling clip {input_rate}Hz -> {output_rate}Hz, {channels} channels");

        Ok(Self {
            inner,
            input_rate,
            output_rate,
            channels,
        })
    }

    fn run(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        let mut planes = deinterleave(input, self.channels);
        let frames = planes[0].len();
        let padded = frames.div_ceil(CHUNK_SIZE) * CHUNK_SIZE;
        for plane in &mut planes {
            plane.resize(padded, 0.0);
        }

        let mut output: Vec<Vec<f32>> = vec![Vec::new(); self.channels];
        for start in (0..padded).step_by(CHUNK_SIZE) {
            let chunk: Vec<&[f32]> = planes
                .iter()
                .map(|plane| &plane[start..start + CHUNK_SIZE])
                .collect();
            let resampled = self
                .inner
                .process(&chunk, None)
                .map_err(|e| Error::AudioDecode(format!("Resample failed: {e}")))?;
            for (out, part) in output.iter_mut().zip(resampled) {
                out.extend(part);
            }
        }

        // Skip the filter delay and drop whatever the padding produced.
        let delay = self.inner.output_delay();
        let wanted = (frames as f64 * f64::from(self.output_rate) / f64::from(self.input_rate))
            as usize;
        let mut interleaved = Vec::with_capacity(wanted * self.channels);
        for frame in delay..(delay + wanted).min(output[0].len()) {
            for plane in &output {
                interleaved.push(plane[frame]);
            }
        }
        Ok(interleaved)
    }
}

fn deinterleave(input: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let mut planes = vec![Vec::with_capacity(input.len() / channels); channels];
    for frame in input.chunks_exact(channels) {
        for (plane, sample) in planes.iter_mut().zip(frame) {
            plane.push(*sample);
        }
    }
    planes
}

/// Map interleaved samples from one channel count to another.
///
/// Mono fans out to every channel; surplus source channels are dropped.
pub fn remix(samples: &[f32], from: u16, to: u16) -> Vec<f32> {
    let (from, to) = (usize::from(from.max(1)), usize::from(to.max(1)));
    if from == to {
        return samples.to_vec();
    }
    let mut output = Vec::with_capacity(samples.len() / from * to);
    for frame in samples.chunks_exact(from) {
        for ch in 0..to {
            output.push(frame[ch.min(from - 1)]);
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_rate_passes_through() {
        let clip = DecodedClip {
            samples: vec![0.25; 64],
            sample_rate: 48000,
            channels: 2,
        };
        let out = conform(clip, 48000, 2).unwrap();
        assert_eq!(out, vec![0.25; 64]);
    }

    #[test]
    fn test_resample_length_tracks_ratio() {
        let clip = DecodedClip {
            samples: vec![0.0; 44100],
            sample_rate: 44100,
            channels: 1,
        };
        let out = conform(clip, 48000, 1).unwrap();
        assert!(out.len() <= 48000);
        assert!(out.len() > 46000);
    }

    #[test]
    fn test_remix_mono_to_stereo() {
        assert_eq!(remix(&[0.1, 0.2], 1, 2), vec![0.1, 0.1, 0.2, 0.2]);
    }

    #[test]
    fn test_remix_drops_surplus_channels() {
        let three = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert_eq!(remix(&three, 3, 2), vec![1.0, 2.0, 4.0, 5.0]);
    }

    #[test]
    fn test_remix_stereo_to_mono_keeps_left() {
        assert_eq!(remix(&[0.3, 0.9, 0.4, 0.8], 2, 1), vec![0.3, 0.4]);
    }
}
