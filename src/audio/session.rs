//! Narration playback session.
//!
//! [`AudioSession`] owns at most one [`Playback`] and moves through
//!
//! ```text
//! Idle ──toggle──▶ Loading ──speech + decode + play ok──▶ Playing
//!                    │                                    │  │
//!                    └──any failure──▶ Idle ◀──toggle─────┘  │
//!                                       ▲                    │
//!                                       └────end of audio────┘
//! teardown / drop ──▶ Idle (playback released, pending load discarded)
//! ```
//!
//! Each load is tagged with an epoch.  `teardown` bumps the epoch, so a load
//! or an end-of-audio notification that belongs to an older epoch changes
//! nothing.  Audio failures stay inside the session; they never reach the
//! generation orchestrator.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::watch;

use crate::audio::decode::{AudioDecoder, DecodeError, PlaybackFormat};
use crate::audio::output::{AudioOutput, EndCallback, Playback, PlaybackError};
use crate::config::Language;
use crate::genai::SpeechGenerator;
use crate::recipe::{Recipe, RecipeId};

// ---------------------------------------------------------------------------
// AudioState / AudioError
// ---------------------------------------------------------------------------

/// Observable state of the narration session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioState {
    #[default]
    Idle,
    Loading,
    Playing,
}

impl AudioState {
    pub fn label(&self) -> &'static str {
        match self {
            AudioState::Idle => "Idle",
            AudioState::Loading => "Loading narration",
            AudioState::Playing => "Playing",
        }
    }
}

/// Why a narration could not be started.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("speech generation returned no audio")]
    NoAudio,

    #[error("could not decode narration: {0}")]
    Decode(#[from] DecodeError),

    #[error("could not start playback: {0}")]
    Output(#[from] PlaybackError),

    #[error("internal audio error: {0}")]
    Internal(String),
}

// ---------------------------------------------------------------------------
// Shared session state
// ---------------------------------------------------------------------------

struct SessionInner {
    state: AudioState,
    epoch: u64,
    playback: Option<Box<dyn Playback>>,
    recipe: Option<RecipeId>,
    /// End of audio reported before the handle was stored.
    ended_early: bool,
}

impl SessionInner {
    fn release(&mut self) {
        if let Some(mut playback) = self.playback.take() {
            playback.stop();
        }
        self.recipe = None;
    }
}

struct Shared {
    inner: Mutex<SessionInner>,
    state_tx: watch::Sender<AudioState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: AudioState) {
        self.state_tx.send_replace(state);
    }

    /// End-of-audio notification from the output thread.
    fn finished(&self, epoch: u64) {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            return;
        }
        let state = inner.state;
        match state {
            AudioState::Playing => {
                inner.release();
                inner.state = AudioState::Idle;
                drop(inner);
                log::debug!("audio: narration finished");
                self.publish(AudioState::Idle);
            }
            AudioState::Loading => inner.ended_early = true,
            AudioState::Idle => {}
        }
    }

    /// Revert a failed load to `Idle` unless it was already superseded.
    fn fail(&self, epoch: u64, err: AudioError) -> AudioError {
        let mut inner = self.lock();
        if inner.epoch == epoch && inner.state == AudioState::Loading {
            inner.release();
            inner.state = AudioState::Idle;
            drop(inner);
            self.publish(AudioState::Idle);
        }
        log::warn!("audio: narration failed: {err}");
        err
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.lock().epoch == epoch
    }
}

// ---------------------------------------------------------------------------
// AudioSession
// ---------------------------------------------------------------------------

/// Speech → decode → play lifecycle for one recipe view.
///
/// Dropping the session stops any playback it owns.
pub struct AudioSession {
    shared: Arc<Shared>,
    speech: Arc<dyn SpeechGenerator>,
    decoder: Arc<dyn AudioDecoder>,
    output: Arc<dyn AudioOutput>,
    format: PlaybackFormat,
    language: Language,
}

impl AudioSession {
    pub fn new(
        speech: Arc<dyn SpeechGenerator>,
        decoder: Arc<dyn AudioDecoder>,
        output: Arc<dyn AudioOutput>,
        format: PlaybackFormat,
        language: Language,
    ) -> Self {
        let (state_tx, _) = watch::channel(AudioState::Idle);
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(SessionInner {
                    state: AudioState::Idle,
                    epoch: 0,
                    playback: None,
                    recipe: None,
                    ended_early: false,
                }),
                state_tx,
            }),
            speech,
            decoder,
            output,
            format,
            language,
        }
    }

    pub fn state(&self) -> AudioState {
        self.shared.lock().state
    }

    /// Recipe whose narration is loading or playing.
    pub fn recipe_id(&self) -> Option<RecipeId> {
        self.shared.lock().recipe.clone()
    }

    /// Watch state transitions, including the autonomous end-of-audio one.
    pub fn subscribe(&self) -> watch::Receiver<AudioState> {
        self.shared.state_tx.subscribe()
    }

    /// Play/stop narration for `recipe`.
    ///
    /// * `Playing` → stops and returns `Ok(Idle)`.
    /// * `Loading` → ignored, returns `Ok(Loading)`.
    /// * `Idle` → synthesizes, decodes and starts playback; returns
    ///   `Ok(Playing)`, or the error after reverting to `Idle`.
    pub async fn toggle(&self, recipe: &Recipe) -> Result<AudioState, AudioError> {
        let epoch = {
            let mut inner = self.shared.lock();
            let state = inner.state;
            match state {
                AudioState::Playing => {
                    inner.release();
                    inner.state = AudioState::Idle;
                    drop(inner);
                    log::debug!("audio: narration stopped by user");
                    self.shared.publish(AudioState::Idle);
                    return Ok(AudioState::Idle);
                }
                AudioState::Loading => return Ok(AudioState::Loading),
                AudioState::Idle => {
                    inner.epoch += 1;
                    inner.state = AudioState::Loading;
                    inner.recipe = Some(recipe.id.clone());
                    inner.ended_early = false;
                    inner.epoch
                }
            }
        };
        self.shared.publish(AudioState::Loading);

        self.load_and_play(recipe, epoch).await
    }

    async fn load_and_play(&self, recipe: &Recipe, epoch: u64) -> Result<AudioState, AudioError> {
        // ── 1. Speech ────────────────────────────────────────────────────
        let script = recipe.narration_script(self.language);
        let payload = match self.speech.synthesize(&script).await {
            Some(payload) => payload,
            None if !self.shared.is_current(epoch) => return Ok(self.state()),
            None => return Err(self.shared.fail(epoch, AudioError::NoAudio)),
        };
        if !self.shared.is_current(epoch) {
            return Ok(self.state());
        }

        // ── 2. Decode (blocking → thread pool) ──────────────────────────
        let decoder = Arc::clone(&self.decoder);
        let format = self.format;
        let decoded = tokio::task::spawn_blocking(move || decoder.decode(&payload, format)).await;
        let buffer = match decoded {
            Ok(Ok(buffer)) => buffer,
            Ok(Err(e)) => return Err(self.shared.fail(epoch, e.into())),
            Err(e) => return Err(self.shared.fail(epoch, AudioError::Internal(e.to_string()))),
        };
        if !self.shared.is_current(epoch) {
            return Ok(self.state());
        }

        // ── 3. Start output (waits for the device → thread pool) ────────
        let notify = Arc::clone(&self.shared);
        let on_end: EndCallback = Box::new(move || notify.finished(epoch));
        let output = Arc::clone(&self.output);
        let started = tokio::task::spawn_blocking(move || output.play(buffer, on_end)).await;
        let playback = match started {
            Ok(Ok(playback)) => playback,
            Ok(Err(e)) => return Err(self.shared.fail(epoch, e.into())),
            Err(e) => return Err(self.shared.fail(epoch, AudioError::Internal(e.to_string()))),
        };

        // ── 4. Commit ───────────────────────────────────────────────────
        let mut inner = self.shared.lock();
        if inner.epoch != epoch {
            // Torn down while starting; `playback` drops here and stops.
            return Ok(inner.state);
        }
        if inner.ended_early {
            inner.release();
            inner.state = AudioState::Idle;
            drop(inner);
            self.shared.publish(AudioState::Idle);
            return Ok(AudioState::Idle);
        }
        inner.playback = Some(playback);
        inner.state = AudioState::Playing;
        drop(inner);

        log::info!("audio: narrating \"{}\"", recipe.title);
        self.shared.publish(AudioState::Playing);
        Ok(AudioState::Playing)
    }

    /// Stop and release everything; any load still in flight is discarded.
    ///
    /// Call when the view switches to another recipe or closes.
    pub fn teardown(&self) {
        let mut inner = self.shared.lock();
        inner.epoch += 1;
        let was = inner.state;
        inner.release();
        inner.state = AudioState::Idle;
        drop(inner);
        if was != AudioState::Idle {
            log::debug!("audio: session torn down while {}", was.label());
            self.shared.publish(AudioState::Idle);
        }
    }
}

impl Drop for AudioSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decode::{AudioBuffer, Pcm16Decoder};
    use crate::audio::output::EndCallback;
    use crate::recipe::RecipeDraft;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::oneshot;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// 4 samples of silence, base64 PCM16.
    const PAYLOAD: &str = "AAAAAAAAAAA=";

    struct FixedSpeech {
        payload: Option<String>,
        calls: AtomicUsize,
        last_text: Mutex<Option<String>>,
    }

    impl FixedSpeech {
        fn new(payload: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                payload: payload.map(str::to_string),
                calls: AtomicUsize::new(0),
                last_text: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl SpeechGenerator for FixedSpeech {
        async fn synthesize(&self, text: &str) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_text.lock().unwrap() = Some(text.to_string());
            self.payload.clone()
        }
    }

    /// Speech that waits for the test to release it.
    struct GatedSpeech {
        gate: Mutex<Option<oneshot::Receiver<Option<String>>>>,
    }

    #[async_trait]
    impl SpeechGenerator for GatedSpeech {
        async fn synthesize(&self, _text: &str) -> Option<String> {
            let rx = self.gate.lock().unwrap().take()?;
            rx.await.ok().flatten()
        }
    }

    struct FakePlayback {
        stopped: Arc<AtomicBool>,
    }

    impl Playback for FakePlayback {
        fn stop(&mut self) {
            self.stopped.store(true, Ordering::SeqCst);
        }
    }

    impl Drop for FakePlayback {
        fn drop(&mut self) {
            self.stop();
        }
    }

    #[derive(Default)]
    struct FakeOutput {
        plays: Mutex<Vec<(Arc<AtomicBool>, Option<EndCallback>)>>,
        threads: Mutex<Vec<std::thread::ThreadId>>,
        fail: bool,
        end_immediately: bool,
    }

    impl FakeOutput {
        fn failing() -> Arc<Self> {
            Arc::new(Self {
                fail: true,
                ..Self::default()
            })
        }

        fn play_count(&self) -> usize {
            self.plays.lock().unwrap().len()
        }

        fn stopped(&self, n: usize) -> bool {
            self.plays.lock().unwrap()[n].0.load(Ordering::SeqCst)
        }

        /// Simulate the device reaching the end of playback `n`.
        fn finish(&self, n: usize) {
            let callback = self.plays.lock().unwrap()[n].1.take();
            if let Some(callback) = callback {
                callback();
            }
        }
    }

    impl AudioOutput for FakeOutput {
        fn play(&self, buffer: AudioBuffer, on_end: EndCallback) -> Result<Box<dyn Playback>, PlaybackError> {
            assert!(!buffer.samples.is_empty());
            self.threads.lock().unwrap().push(std::thread::current().id());
            if self.fail {
                return Err(PlaybackError::NoDevice);
            }
            let stopped = Arc::new(AtomicBool::new(false));
            if self.end_immediately {
                on_end();
                self.plays.lock().unwrap().push((Arc::clone(&stopped), None));
            } else {
                self.plays
                    .lock()
                    .unwrap()
                    .push((Arc::clone(&stopped), Some(on_end)));
            }
            Ok(Box::new(FakePlayback { stopped }))
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn recipe() -> Recipe {
        Recipe::from_draft(RecipeDraft {
            title: "Warming Ginger Congee".into(),
            ingredients: vec!["ginger".into(), "rice".into()],
            steps: vec!["Rinse rice".into(), "Simmer with ginger".into()],
            benefits: "Warms Yang".into(),
        })
    }

    fn session(speech: Arc<dyn SpeechGenerator>, output: Arc<FakeOutput>) -> AudioSession {
        AudioSession::new(
            speech,
            Arc::new(Pcm16Decoder),
            output,
            PlaybackFormat::default(),
            Language::En,
        )
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn idle_toggle_starts_playing_with_narration_script() {
        let speech = FixedSpeech::new(Some(PAYLOAD));
        let output = Arc::new(FakeOutput::default());
        let s = session(speech.clone(), output.clone());
        let r = recipe();

        assert_eq!(s.toggle(&r).await.unwrap(), AudioState::Playing);
        assert_eq!(s.state(), AudioState::Playing);
        assert_eq!(s.recipe_id(), Some(r.id.clone()));
        assert_eq!(output.play_count(), 1);
        assert_eq!(
            speech.last_text.lock().unwrap().as_deref(),
            Some("Recipe: Warming Ginger Congee. Warms Yang. Instructions: Rinse rice. Simmer with ginger.")
        );
    }

    #[tokio::test]
    async fn toggle_while_playing_stops_and_releases() {
        let output = Arc::new(FakeOutput::default());
        let s = session(FixedSpeech::new(Some(PAYLOAD)), output.clone());
        let r = recipe();

        s.toggle(&r).await.unwrap();
        assert_eq!(s.toggle(&r).await.unwrap(), AudioState::Idle);
        assert_eq!(s.state(), AudioState::Idle);
        assert!(output.stopped(0));
        assert!(s.recipe_id().is_none());
    }

    #[tokio::test]
    async fn natural_end_returns_to_idle() {
        let output = Arc::new(FakeOutput::default());
        let s = session(FixedSpeech::new(Some(PAYLOAD)), output.clone());
        let mut rx = s.subscribe();

        s.toggle(&recipe()).await.unwrap();
        output.finish(0);

        assert_eq!(s.state(), AudioState::Idle);
        assert!(output.stopped(0));
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), AudioState::Idle);
    }

    #[tokio::test]
    async fn end_reported_during_start_does_not_stick_in_playing() {
        let output = Arc::new(FakeOutput {
            end_immediately: true,
            ..FakeOutput::default()
        });
        let s = session(FixedSpeech::new(Some(PAYLOAD)), output.clone());

        assert_eq!(s.toggle(&recipe()).await.unwrap(), AudioState::Idle);
        assert_eq!(s.state(), AudioState::Idle);
        assert!(output.stopped(0));
    }

    #[tokio::test]
    async fn missing_speech_reverts_to_idle_with_error() {
        let output = Arc::new(FakeOutput::default());
        let s = session(FixedSpeech::new(None), output.clone());

        let err = s.toggle(&recipe()).await.unwrap_err();
        assert!(matches!(err, AudioError::NoAudio));
        assert_eq!(s.state(), AudioState::Idle);
        assert_eq!(output.play_count(), 0);
    }

    #[tokio::test]
    async fn malformed_payload_reverts_to_idle_with_decode_error() {
        let output = Arc::new(FakeOutput::default());
        let s = session(FixedSpeech::new(Some("%%% not audio %%%")), output.clone());

        let err = s.toggle(&recipe()).await.unwrap_err();
        assert!(matches!(err, AudioError::Decode(DecodeError::Base64(_))));
        assert_eq!(s.state(), AudioState::Idle);
        assert_eq!(output.play_count(), 0);
    }

    #[tokio::test]
    async fn output_failure_reverts_to_idle() {
        let s = session(FixedSpeech::new(Some(PAYLOAD)), FakeOutput::failing());

        let err = s.toggle(&recipe()).await.unwrap_err();
        assert!(matches!(err, AudioError::Output(PlaybackError::NoDevice)));
        assert_eq!(s.state(), AudioState::Idle);
    }

    #[tokio::test]
    async fn can_play_again_after_failure() {
        let speech = FixedSpeech::new(Some(PAYLOAD));
        let output = Arc::new(FakeOutput::default());
        let s = session(speech.clone(), output.clone());

        s.toggle(&recipe()).await.unwrap();
        s.toggle(&recipe()).await.unwrap();
        assert_eq!(s.toggle(&recipe()).await.unwrap(), AudioState::Playing);
        assert_eq!(speech.calls.load(Ordering::SeqCst), 2);
        assert_eq!(output.play_count(), 2);
    }

    #[tokio::test]
    async fn teardown_stops_active_playback() {
        let output = Arc::new(FakeOutput::default());
        let s = session(FixedSpeech::new(Some(PAYLOAD)), output.clone());

        s.toggle(&recipe()).await.unwrap();
        s.teardown();

        assert_eq!(s.state(), AudioState::Idle);
        assert!(output.stopped(0));

        // A late end-of-audio from the old playback changes nothing.
        output.finish(0);
        assert_eq!(s.state(), AudioState::Idle);
    }

    #[tokio::test]
    async fn dropping_session_stops_playback() {
        let output = Arc::new(FakeOutput::default());
        let s = session(FixedSpeech::new(Some(PAYLOAD)), output.clone());

        s.toggle(&recipe()).await.unwrap();
        drop(s);

        assert!(output.stopped(0));
    }

    #[tokio::test]
    async fn teardown_during_loading_discards_the_load() {
        let (tx, rx) = oneshot::channel();
        let speech = Arc::new(GatedSpeech {
            gate: Mutex::new(Some(rx)),
        });
        let output = Arc::new(FakeOutput::default());
        let s = Arc::new(session(speech, output.clone()));
        let r = recipe();

        let task = {
            let s = Arc::clone(&s);
            let r = r.clone();
            tokio::spawn(async move { s.toggle(&r).await })
        };
        tokio::task::yield_now().await;
        assert_eq!(s.state(), AudioState::Loading);

        // A second toggle while loading is ignored.
        assert_eq!(s.toggle(&r).await.unwrap(), AudioState::Loading);

        s.teardown();
        tx.send(Some(PAYLOAD.to_string())).unwrap();

        assert_eq!(task.await.unwrap().unwrap(), AudioState::Idle);
        assert_eq!(s.state(), AudioState::Idle);
        assert_eq!(output.play_count(), 0);
    }

    #[tokio::test]
    async fn device_open_runs_off_the_runtime_thread() {
        let output = Arc::new(FakeOutput::default());
        let s = session(FixedSpeech::new(Some(PAYLOAD)), output.clone());

        assert_eq!(s.toggle(&recipe()).await.unwrap(), AudioState::Playing);

        let threads = output.threads.lock().unwrap();
        assert_eq!(threads.len(), 1);
        assert_ne!(threads[0], std::thread::current().id());
    }

    #[tokio::test]
    async fn abandoned_load_without_speech_is_not_an_error() {
        let (tx, rx) = oneshot::channel();
        let speech = Arc::new(GatedSpeech {
            gate: Mutex::new(Some(rx)),
        });
        let output = Arc::new(FakeOutput::default());
        let s = Arc::new(session(speech, output.clone()));

        let task = {
            let s = Arc::clone(&s);
            tokio::spawn(async move { s.toggle(&recipe()).await })
        };
        tokio::task::yield_now().await;
        assert_eq!(s.state(), AudioState::Loading);

        s.teardown();
        tx.send(None).unwrap();

        assert_eq!(task.await.unwrap().unwrap(), AudioState::Idle);
        assert_eq!(s.state(), AudioState::Idle);
        assert_eq!(output.play_count(), 0);
    }
}
