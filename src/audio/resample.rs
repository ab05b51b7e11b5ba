//! Sample-rate conversion and channel mixing for narration playback.
//!
//! Synthesized speech arrives as 24 kHz mono; output devices usually run at
//! 44.1/48 kHz with two or more channels.  Three conversion steps bridge the
//! gap:
//!
//! 1. [`downmix_to_mono`]: average interleaved channels to mono.
//! 2. [`resample`]: band-limited rate conversion with `rubato`'s
//!    synchronous FFT resampler.
//! 3. [`upmix`]: duplicate mono into every output channel.

use rubato::{FftFixedIn, Resampler};
use thiserror::Error;

/// Input frames handed to the resampler per call.
const CHUNK_FRAMES: usize = 1024;
const SUB_CHUNKS: usize = 2;

// ---------------------------------------------------------------------------
// downmix_to_mono
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging all channels.
///
/// The output length is `samples.len() / channels`.
///
/// ```rust
/// use tcm_kitchen::audio::downmix_to_mono;
///
/// let stereo = vec![0.5_f32, -0.5, 0.2, -0.2]; // L R L R
/// let mono = downmix_to_mono(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[0] - 0.0).abs() < 1e-6);
/// ```
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// upmix
// ---------------------------------------------------------------------------

/// Repeat every mono sample `channels` times (interleaved output).
pub fn upmix(mono: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => mono.to_vec(),
        n => mono
            .iter()
            .flat_map(|&s| std::iter::repeat(s).take(n as usize))
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// resample
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ResampleError {
    #[error("sample rate must be non-zero ({source_rate} Hz -> {target_rate} Hz)")]
    ZeroRate { source_rate: u32, target_rate: u32 },

    #[error("failed to build resampler: {0}")]
    Construction(#[from] rubato::ResamplerConstructionError),

    #[error("resampling failed: {0}")]
    Process(#[from] rubato::ResampleError),
}

/// Resample mono `samples` from `source_rate` to `target_rate`.
///
/// * Equal rates clone the input unchanged.
/// * Empty input returns an empty vector.
///
/// The resampler's delay is trimmed, so the output is time-aligned with the
/// input and holds `round(samples.len() * target_rate / source_rate)` samples.
///
/// ```rust
/// use tcm_kitchen::audio::resample;
///
/// let speech = vec![0.5_f32; 240]; // 10 ms @ 24 kHz
/// assert_eq!(resample(&speech, 24_000, 48_000).unwrap().len(), 480);
/// assert_eq!(resample(&speech, 24_000, 24_000).unwrap().len(), 240);
/// ```
pub fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>, ResampleError> {
    if source_rate == 0 || target_rate == 0 {
        return Err(ResampleError::ZeroRate {
            source_rate,
            target_rate,
        });
    }
    if source_rate == target_rate {
        return Ok(samples.to_vec());
    }
    if samples.is_empty() {
        return Ok(Vec::new());
    }

    let mut resampler =
        FftFixedIn::<f32>::new(source_rate as usize, target_rate as usize, CHUNK_FRAMES, SUB_CHUNKS, 1)?;

    let expected = ((samples.len() as u64 * target_rate as u64 + source_rate as u64 / 2)
        / source_rate as u64) as usize;
    let delay = resampler.output_delay();
    let mut out = Vec::with_capacity(expected + delay + CHUNK_FRAMES * 2);

    let mut pos = 0;
    while samples.len() - pos >= resampler.input_frames_next() {
        let next = resampler.input_frames_next();
        let chunk = resampler.process(&[&samples[pos..pos + next]], None)?;
        out.extend_from_slice(&chunk[0]);
        pos += next;
    }
    if pos < samples.len() {
        let chunk = resampler.process_partial(Some(&[&samples[pos..]]), None)?;
        out.extend_from_slice(&chunk[0]);
    }

    // Push the tail out of the delay line.
    while out.len() < expected + delay {
        let chunk = resampler.process_partial::<&[f32]>(None, None)?;
        if chunk[0].is_empty() {
            break;
        }
        out.extend_from_slice(&chunk[0]);
    }

    out.drain(..delay.min(out.len()));
    out.truncate(expected);
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
