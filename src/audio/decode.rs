//! Speech payload decoding.
//!
//! The speech stage returns raw signed 16-bit little-endian PCM encoded as
//! base64.  [`Pcm16Decoder`] turns it into an [`AudioBuffer`] of `f32`
//! samples in `[-1.0, 1.0)` at the rate/channel layout described by the
//! [`PlaybackFormat`].

use base64::{engine::general_purpose, Engine};
use thiserror::Error;

use crate::config::AudioConfig;

// ---------------------------------------------------------------------------
// PlaybackFormat / AudioBuffer
// ---------------------------------------------------------------------------

/// Layout of the synthesized payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl PlaybackFormat {
    pub fn from_config(config: &AudioConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            channels: config.channels,
        }
    }
}

impl Default for PlaybackFormat {
    fn default() -> Self {
        Self::from_config(&AudioConfig::default())
    }
}

/// Decoded, playable audio.  `samples` are interleaved.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioBuffer {
    pub fn frames(&self) -> usize {
        match self.channels {
            0 => 0,
            n => self.samples.len() / n as usize,
        }
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f32 / self.sample_rate as f32
    }
}

// ---------------------------------------------------------------------------
// DecodeError
// ---------------------------------------------------------------------------

/// Reasons a speech payload cannot be turned into audio.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DecodeError {
    #[error("payload is not valid base64: {0}")]
    Base64(String),

    #[error("payload is empty")]
    Empty,

    #[error("payload length {len} is not a whole number of {frame_bytes}-byte frames")]
    Misaligned { len: usize, frame_bytes: usize },

    #[error("unsupported format: {0}")]
    Format(String),
}

// ---------------------------------------------------------------------------
// AudioDecoder trait
// ---------------------------------------------------------------------------

/// Turns an encoded speech payload into a playable buffer.
///
/// Called on the blocking thread pool.
pub trait AudioDecoder: Send + Sync {
    fn decode(&self, payload: &str, format: PlaybackFormat) -> Result<AudioBuffer, DecodeError>;
}

// ---------------------------------------------------------------------------
// Pcm16Decoder
// ---------------------------------------------------------------------------

/// Base64 → little-endian `i16` PCM → `f32`.
///
/// ```rust
/// use tcm_kitchen::audio::{AudioDecoder, Pcm16Decoder, PlaybackFormat};
///
/// // two samples: 0 and i16::MIN
/// let buf = Pcm16Decoder
///     .decode("AAAAgA==", PlaybackFormat { sample_rate: 24_000, channels: 1 })
///     .unwrap();
/// assert_eq!(buf.samples, vec![0.0, -1.0]);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Pcm16Decoder;

impl AudioDecoder for Pcm16Decoder {
    fn decode(&self, payload: &str, format: PlaybackFormat) -> Result<AudioBuffer, DecodeError> {
        if format.sample_rate == 0 || format.channels == 0 {
            return Err(DecodeError::Format(format!(
                "{} Hz / {} channel(s)",
                format.sample_rate, format.channels
            )));
        }

        let bytes = general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| DecodeError::Base64(e.to_string()))?;

        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }

        let frame_bytes = 2 * format.channels as usize;
        if bytes.len() % frame_bytes != 0 {
            return Err(DecodeError::Misaligned {
                len: bytes.len(),
                frame_bytes,
            });
        }

        let samples = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32_768.0)
            .collect();

        Ok(AudioBuffer {
            samples,
            sample_rate: format.sample_rate,
            channels: format.channels,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
