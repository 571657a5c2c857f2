//! Preview decoding via Symphonia
//!
//! Previews are short (typically 30 s), so the whole stream is decoded into
//! memory up front. That makes seeking a pure offset computation and keeps
//! decode failures out of the playback path entirely.

use std::io::Cursor;
use std::num::NonZero;
use std::path::Path;
use std::sync::Arc;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::audio::types::{nonzero_u16, nonzero_u32, TrackInfo};
use crate::error::{PlayerError, Result};

/// Convert a symphonia codec type to a human-readable name
pub fn codec_type_to_name(codec: symphonia::core::codecs::CodecType) -> String {
    use symphonia::core::codecs::*;
    match codec {
        CODEC_TYPE_AAC => "AAC".to_string(),
        CODEC_TYPE_FLAC => "FLAC".to_string(),
        CODEC_TYPE_MP3 => "MP3".to_string(),
        CODEC_TYPE_VORBIS => "Vorbis".to_string(),
        CODEC_TYPE_ALAC => "ALAC".to_string(),
        CODEC_TYPE_PCM_U8 => "PCM 8-bit".to_string(),
        CODEC_TYPE_PCM_S16LE | CODEC_TYPE_PCM_S16BE => "PCM 16-bit".to_string(),
        CODEC_TYPE_PCM_S24LE | CODEC_TYPE_PCM_S24BE => "PCM 24-bit".to_string(),
        CODEC_TYPE_PCM_S32LE | CODEC_TYPE_PCM_S32BE => "PCM 32-bit".to_string(),
        CODEC_TYPE_PCM_F32LE | CODEC_TYPE_PCM_F32BE => "PCM 32-bit Float".to_string(),
        _ => "Audio".to_string(),
    }
}

/// A fully decoded preview held in memory
#[derive(Debug, Clone)]
pub struct DecodedTrack {
    /// Interleaved f32 PCM
    pub samples: Arc<[f32]>,
    pub channels: NonZero<u16>,
    pub sample_rate: NonZero<u32>,
    pub codec_name: String,
}

impl DecodedTrack {
    /// Number of frames (interleaved samples / channels)
    pub fn frames(&self) -> u64 {
        (self.samples.len() / self.channels.get() as usize) as u64
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate.get() as f64
    }

    /// Convert a seconds offset into a clamped frame index
    pub fn frame_at(&self, seconds: f64) -> u64 {
        if !seconds.is_finite() || seconds <= 0.0 {
            return 0;
        }
        let frame = (seconds * self.sample_rate.get() as f64) as u64;
        frame.min(self.frames())
    }

    /// Track metadata for observers
    pub fn info(&self) -> TrackInfo {
        TrackInfo {
            codec_name: self.codec_name.clone(),
            channels: self.channels.get(),
            sample_rate: self.sample_rate.get(),
            duration_secs: self.duration_secs(),
        }
    }
}

/// Decode an in-memory audio stream (e.g. a downloaded preview) completely.
///
/// `extension_hint` helps the probe with container-less formats such as raw
/// ADTS AAC; pass the file extension when known.
pub fn decode_bytes(data: Vec<u8>, extension_hint: Option<&str>) -> Result<DecodedTrack> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension_hint {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| PlayerError::FileLoad(format!("unrecognized format: {}", e)))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| PlayerError::FileLoad("no audio track found".to_string()))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let codec_name = codec_type_to_name(codec_params.codec);

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| PlayerError::Decode(format!("decoder creation error: {}", e)))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut channels: u16 = 0;
    let mut sample_rate: u32 = 0;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                // Clean end of stream
                break;
            }
            Err(e) => return Err(PlayerError::Decode(format!("{}", e))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                // Take dimensions from the decoder output, not the container
                // header; SBR-style codecs can change them
                channels = spec.channels.count() as u16;
                sample_rate = spec.rate;

                let capacity = decoded.capacity() as u64;
                let needs_realloc = sample_buf
                    .as_ref()
                    .map(|b| b.capacity() < capacity as usize)
                    .unwrap_or(true);
                if needs_realloc {
                    sample_buf = Some(SampleBuffer::new(capacity, spec));
                }
                if let Some(ref mut buf) = sample_buf {
                    buf.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buf.samples());
                }
            }
            // Skip corrupt packets, keep decoding
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => return Err(PlayerError::Decode(format!("{}", e))),
        }
    }

    if samples.is_empty() || channels == 0 || sample_rate == 0 {
        return Err(PlayerError::Decode(
            "stream contained no decodable audio".to_string(),
        ));
    }

    // Truncate a trailing partial frame so frames() stays exact
    let rem = samples.len() % channels as usize;
    if rem != 0 {
        samples.truncate(samples.len() - rem);
    }

    Ok(DecodedTrack {
        samples: samples.into(),
        channels: nonzero_u16(channels),
        sample_rate: nonzero_u32(sample_rate),
        codec_name,
    })
}

/// Decode an audio file from disk
pub fn decode_file(path: &Path) -> Result<DecodedTrack> {
    let data = std::fs::read(path)
        .map_err(|e| PlayerError::FileLoad(format!("{}: {}", path.display(), e)))?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_string());
    decode_bytes(data, ext.as_deref())
}
