//! Generation pipeline for the TCM kitchen.
//!
//! This module owns the recipe generation state machine and exposes the
//! shared state the view renders.
//!
//! # Architecture
//!
//! ```text
//! View intent
//!        │
//!        ▼
//! RecipeOrchestrator::generate()
//!        │
//!        ├─ RecipeWriter::write_recipe          → GeneratingRecipe
//!        ├─ publish active recipe               → GeneratingMedia
//!        └─ tokio::spawn(ImageGenerator)        → Completed (token-checked)
//!
//! SharedState (Arc<Mutex<AppState>>) ──▶ StudioEvent (broadcast) ──▶ view
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tcm_kitchen::config::AppConfig;
//! use tcm_kitchen::genai::GeminiClient;
//! use tcm_kitchen::pipeline::{new_shared_state, RecipeOrchestrator, StudioEvent};
//! use tcm_kitchen::recipe::FavoritesStore;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let client = Arc::new(GeminiClient::from_config(&config.gemini));
//!     let state = new_shared_state(FavoritesStore::load_or_default());
//!
//!     let orchestrator =
//!         RecipeOrchestrator::new(state, client.clone(), client.clone(), client);
//!     let mut events = orchestrator.subscribe();
//!
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             if let StudioEvent::StatusChanged(status) = event {
//!                 println!("{}", status.label());
//!             }
//!         }
//!     });
//!
//!     if let Ok(pending) = orchestrator.generate(&["ginger".into()]).await {
//!         pending.finished().await;
//!     }
//! }
//! ```

pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use runner::{MediaOutcome, PendingMedia, RecipeOrchestrator, StudioError};
pub use state::{new_shared_state, AppState, GenerationStatus, SharedState, StudioEvent};
