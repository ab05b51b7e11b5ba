//! Recipe narration: speech payload → decode → resample → output device.
//!
//! # Pipeline
//!
//! ```text
//! SpeechGenerator (base64 PCM16) → Pcm16Decoder → AudioBuffer
//!           → downmix / resample / upmix → CpalOutput → Playback (RAII)
//! ```
//!
//! [`AudioSession`] drives the pipeline for one recipe view and owns the
//! single active [`Playback`].
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tcm_kitchen::audio::{AudioSession, CpalOutput, Pcm16Decoder, PlaybackFormat};
//! use tcm_kitchen::config::AppConfig;
//! use tcm_kitchen::genai::GeminiClient;
//! # async fn example(recipe: tcm_kitchen::recipe::Recipe) {
//! let config = AppConfig::default();
//! let session = AudioSession::new(
//!     Arc::new(GeminiClient::from_config(&config.gemini)),
//!     Arc::new(Pcm16Decoder),
//!     Arc::new(CpalOutput::new()),
//!     PlaybackFormat::from_config(&config.audio),
//!     config.gemini.language,
//! );
//! session.toggle(&recipe).await.unwrap(); // start
//! session.toggle(&recipe).await.unwrap(); // stop
//! # }
//! ```

pub mod decode;
pub mod output;
pub mod resample;
pub mod session;

pub use decode::{AudioBuffer, AudioDecoder, DecodeError, Pcm16Decoder, PlaybackFormat};
pub use output::{AudioOutput, CpalOutput, EndCallback, Playback, PlaybackError};
pub use resample::{downmix_to_mono, resample, upmix, ResampleError};
pub use session::{AudioError, AudioSession, AudioState};
