//! Narration output via `cpal`.
//!
//! [`AudioOutput::play`] starts a decoded [`AudioBuffer`] on an output device
//! and returns a [`Playback`] handle.  The handle is a RAII guard: dropping it
//! (or calling [`Playback::stop`]) stops the stream.  The `on_end` callback
//! fires once, from the audio thread, when the last sample has been written.
//!
//! `cpal::Stream` is not `Send` on every platform, so [`CpalOutput`] builds
//! and owns the stream on a dedicated thread that lives until the handle is
//! stopped or dropped.

use std::sync::mpsc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::Sample;
use thiserror::Error;

use crate::audio::decode::AudioBuffer;
use crate::audio::resample::{downmix_to_mono, resample, upmix, ResampleError};

/// Invoked once when playback reaches the end of the buffer.
pub type EndCallback = Box<dyn FnOnce() + Send + 'static>;

// ---------------------------------------------------------------------------
// PlaybackError
// ---------------------------------------------------------------------------

/// Errors that can occur while starting playback.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("no output device found on the default audio host")]
    NoDevice,

    #[error("failed to query default output config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("unsupported output sample format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to convert speech to the device rate: {0}")]
    Resample(#[from] ResampleError),

    #[error("playback thread failed: {0}")]
    Thread(String),
}

// ---------------------------------------------------------------------------
// Playback / AudioOutput traits
// ---------------------------------------------------------------------------

/// A running playback.  Dropping the handle stops it.
pub trait Playback: Send {
    /// Stop immediately.  Calling it twice is harmless.
    fn stop(&mut self);
}

/// Something that can play a decoded buffer.
pub trait AudioOutput: Send + Sync {
    fn play(&self, buffer: AudioBuffer, on_end: EndCallback) -> Result<Box<dyn Playback>, PlaybackError>;
}

// ---------------------------------------------------------------------------
// CpalOutput
// ---------------------------------------------------------------------------

/// Plays through the system default output device.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpalOutput;

impl CpalOutput {
    pub fn new() -> Self {
        Self
    }
}

impl AudioOutput for CpalOutput {
    fn play(&self, buffer: AudioBuffer, on_end: EndCallback) -> Result<Box<dyn Playback>, PlaybackError> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), PlaybackError>>();

        std::thread::Builder::new()
            .name("narration-playback".into())
            .spawn(move || {
                let stream = match open_stream(buffer, on_end) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                // Returns on an explicit stop or when the handle is dropped.
                let _ = stop_rx.recv();
                drop(stream);
                log::debug!("audio: playback stream released");
            })
            .map_err(|e| PlaybackError::Thread(e.to_string()))?;

        ready_rx
            .recv()
            .map_err(|_| PlaybackError::Thread("playback thread exited early".into()))??;

        Ok(Box::new(CpalPlayback {
            stop_tx: Some(stop_tx),
        }))
    }
}

/// Handle for a stream owned by the playback thread.
struct CpalPlayback {
    stop_tx: Option<mpsc::Sender<()>>,
}

impl Playback for CpalPlayback {
    fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for CpalPlayback {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Stream construction
// ---------------------------------------------------------------------------

/// Convert `buffer` to the device layout: mono → device rate → device channels.
fn prepare_samples(
    buffer: &AudioBuffer,
    device_rate: u32,
    device_channels: u16,
) -> Result<Vec<f32>, ResampleError> {
    let mono = downmix_to_mono(&buffer.samples, buffer.channels);
    let resampled = resample(&mono, buffer.sample_rate, device_rate)?;
    Ok(upmix(&resampled, device_channels))
}

fn open_stream(buffer: AudioBuffer, on_end: EndCallback) -> Result<cpal::Stream, PlaybackError> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(PlaybackError::NoDevice)?;

    let supported = device.default_output_config()?;
    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();

    let samples = prepare_samples(&buffer, config.sample_rate.0, config.channels)?;
    log::debug!(
        "audio: playing {:.1}s at {} Hz / {} ch ({sample_format:?})",
        buffer.duration_secs(),
        config.sample_rate.0,
        config.channels
    );

    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, samples, on_end)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, samples, on_end)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, samples, on_end)?,
        other => return Err(PlaybackError::UnsupportedFormat(format!("{other:?}"))),
    };

    stream.play()?;
    Ok(stream)
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    samples: Vec<f32>,
    on_end: EndCallback,
) -> Result<cpal::Stream, PlaybackError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut pos = 0usize;
    let mut on_end = Some(on_end);

    let stream = device.build_output_stream(
        config,
        move |out: &mut [T], _: &cpal::OutputCallbackInfo| {
            for slot in out.iter_mut() {
                let sample = samples.get(pos).copied().unwrap_or(0.0);
                pos = pos.saturating_add(1);
                *slot = T::from_sample(sample);
            }
            if pos >= samples.len() {
                if let Some(callback) = on_end.take() {
                    callback();
                }
            }
        },
        |err: cpal::StreamError| {
            log::error!("cpal output stream error: {err}");
        },
        None,
    )?;

    Ok(stream)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
