//! Application entry point: TCM kitchen.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (default on first run) and overlay the
//!    API key from the environment.
//! 3. Create the [`tokio`] runtime (multi-thread, 2 workers).
//! 4. Build the Gemini client shared by every generative collaborator.
//! 5. Load the favorites collection.
//! 6. Build the orchestrator and, when enabled, the narration session.
//! 7. Run the terminal front end until `quit` or end of input.

use std::sync::Arc;

use anyhow::Context;
use tokio::io::BufReader;

use tcm_kitchen::{
    app::KitchenApp,
    audio::{AudioSession, CpalOutput, Pcm16Decoder, PlaybackFormat},
    config::AppConfig,
    genai::GeminiClient,
    pipeline::{new_shared_state, RecipeOrchestrator},
    recipe::FavoritesStore,
};

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("TCM kitchen starting up");

    // 2. Configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    config.apply_env();
    if config.gemini.api_key.is_none() {
        log::warn!("No API key configured; set GEMINI_API_KEY to enable generation");
    }

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    // 4. Generative collaborators
    let client = Arc::new(GeminiClient::from_config(&config.gemini));

    // 5. Favorites
    let favorites = FavoritesStore::load_from(config.storage.resolved_favorites_file());
    log::info!("Favorites file: {}", favorites.path().display());

    // 6. Orchestrator + narration
    let orchestrator = RecipeOrchestrator::new(
        new_shared_state(favorites),
        client.clone(),
        client.clone(),
        client.clone(),
    )
    .with_language(config.gemini.language);

    let audio = config.audio.enabled.then(|| {
        Arc::new(AudioSession::new(
            client,
            Arc::new(Pcm16Decoder),
            Arc::new(CpalOutput::new()),
            PlaybackFormat::from_config(&config.audio),
            config.gemini.language,
        ))
    });
    if audio.is_none() {
        log::info!("Narration disabled in config");
    }

    // 7. Front end
    let app = KitchenApp::new(orchestrator, audio, config.ui.default_sort);
    rt.block_on(app.run(BufReader::new(tokio::io::stdin())))
}
