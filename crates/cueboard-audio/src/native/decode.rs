//! Clip decoding using symphonia.

use std::io::Cursor;

use bytes::Bytes;
use cueboard_core::{Error, Result};
use symphonia::core::{
    audio::{AudioBufferRef, Signal},
    codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL},
    conv::FromSample,
    formats::{FormatOptions, FormatReader},
    io::{MediaSourceStream, MediaSourceStreamOptions},
    meta::MetadataOptions,
    probe::Hint,
    sample::Sample,
};
use tracing::{debug, warn};

/// A fully decoded clip, interleaved f32.
#[derive(Debug, Clone)]
pub struct DecodedClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Decoder for a single in-memory clip.
pub struct ClipDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: u16,
}

impl ClipDecoder {
    /// Probe `data`, guided by a MIME type or file extension when known.
    #[allow(clippy::needless_pass_by_value)] // Bytes is cheaply cloneable
    pub fn from_bytes(data: Bytes, hint_text: Option<&str>) -> Result<Self> {
        let cursor = Cursor::new(data.to_vec());
        let mss = MediaSourceStream::new(Box::new(cursor), MediaSourceStreamOptions::default());

        let mut hint = Hint::new();
        if let Some(extension) = hint_text.and_then(extension_for) {
            hint.with_extension(extension);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| Error::AudioDecode(format!("Unrecognised clip format: {e}")))?;

        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::AudioDecode("Clip has no audio track".to_string()))?;

        let track_id = track.id;
        let sample_rate = track.codec_params.sample_rate.unwrap_or(48000);
        let channels = track.codec_params.channels.map_or(2, |c| c.count() as u16);

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| Error::AudioDecode(format!("No decoder for clip codec: {e}")))?;

        debug!("Clip track {track_id}: {sample_rate} Hz, {channels} channels");

        Ok(Self {
            format,
            decoder,
            track_id,
            sample_rate,
            channels,
        })
    }

    /// Decode the next packet into interleaved samples, `None` at the end.
    pub fn decode_next(&mut self) -> Result<Option<Vec<f32>>> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(symphonia::core::errors::Error::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(e) => {
                    return Err(Error::AudioDecode(format!("Clip read failed: {e}")));
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => return Ok(Some(interleave(&decoded))),
                Err(symphonia::core::errors::Error::DecodeError(e)) => {
                    warn!("Skipping corrupt frame: {e}");
                }
                Err(e) => {
                    return Err(Error::AudioDecode(format!("Clip decode failed: {e}")));
                }
            }
        }
    }

    /// Decode the whole clip.
    pub fn decode_all(mut self) -> Result<DecodedClip> {
        let mut samples = Vec::new();
        while let Some(chunk) = self.decode_next()? {
            samples.extend_from_slice(&chunk);
        }
        Ok(DecodedClip {
            samples,
            sample_rate: self.sample_rate,
            channels: self.channels,
        })
    }
}

fn extension_for(hint: &str) -> Option<&'static str> {
    let hint = hint.to_ascii_lowercase();
    [
        ("webm", "webm"),
        ("opus", "webm"),
        ("m4a", "m4a"),
        ("mp4", "m4a"),
        ("aac", "m4a"),
        ("mp3", "mp3"),
        ("mpeg", "mp3"),
        ("ogg", "ogg"),
        ("vorbis", "ogg"),
        ("flac", "flac"),
        ("wav", "wav"),
    ]
    .into_iter()
    .find(|(needle, _)| hint.contains(needle))
    .map(|(_, extension)| extension)
}

/// Convert any decoded buffer to interleaved f32.
fn interleave(buffer: &AudioBufferRef<'_>) -> Vec<f32> {
    match buffer {
        AudioBufferRef::U8(buf) => interleave_planes(buf.planes().planes()),
        AudioBufferRef::U16(buf) => interleave_planes(buf.planes().planes()),
        AudioBufferRef::U24(buf) => interleave_planes(buf.planes().planes()),
        AudioBufferRef::U32(buf) => interleave_planes(buf.planes().planes()),
        AudioBufferRef::S8(buf) => interleave_planes(buf.planes().planes()),
        AudioBufferRef::S16(buf) => interleave_planes(buf.planes().planes()),
        AudioBufferRef::S24(buf) => interleave_planes(buf.planes().planes()),
        AudioBufferRef::S32(buf) => interleave_planes(buf.planes().planes()),
        AudioBufferRef::F32(buf) => interleave_planes(buf.planes().planes()),
        AudioBufferRef::F64(buf) => interleave_planes(buf.planes().planes()),
    }
}

fn interleave_planes<T: Sample>(planes: &[&[T]]) -> Vec<f32>
where
    f32: FromSample<T>,
{
    let Some(first) = planes.first() else {
        return Vec::new();
    };
    let frames = first.len();
    let mut output = Vec::with_capacity(frames * planes.len());
    for frame in 0..frames {
        for plane in planes {
            output.push(f32::from_sample(plane[frame]));
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use symphonia::core::audio::{AsAudioBufferRef, AudioBuffer, Channels, SignalSpec};

    #[test]
    fn test_unsigned_16_bit_buffers_convert() {
        let spec = SignalSpec::new(44_100, Channels::FRONT_LEFT | Channels::FRONT_RIGHT);
        let mut buf = AudioBuffer::<u16>::new(4, spec);
        buf.render_reserved(Some(2));
        buf.chan_mut(0).copy_from_slice(&[32_768, 0]);
        buf.chan_mut(1).copy_from_slice(&[u16::MAX, 32_768]);

        let samples = interleave(&buf.as_audio_buffer_ref());
        assert_eq!(samples.len(), 4);
        let expected = [0.0, 1.0, -1.0, 0.0];
        for (got, want) in samples.iter().zip(expected) {
            assert!((got - want).abs() < 1e-3, "{got} vs {want}");
        }
    }

    #[test]
    fn test_signed_8_bit_planes_interleave() {
        let left: &[i8] = &[i8::MIN, 0];
        let right: &[i8] = &[0, 64];
        let samples = interleave_planes(&[left, right]);
        assert_eq!(samples.len(), 4);
        assert!((samples[0] + 1.0).abs() < 1e-3);
        assert!((samples[3] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_extension_hints() {
        assert_eq!(extension_for("audio/mpeg"), Some("mp3"));
        assert_eq!(extension_for("horn.OGG"), Some("ogg"));
        assert_eq!(extension_for("audio/webm; codecs=opus"), Some("webm"));
        assert_eq!(extension_for("text/plain"), None);
    }

    #[test]
    fn test_garbage_fails_to_probe() {
        let result = ClipDecoder::from_bytes(Bytes::from_static(b"definitely not audio"), None);
        assert!(matches!(result, Err(Error::AudioDecode(_))));
    }
}
