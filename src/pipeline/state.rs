//! Generation state machine and shared application state.
//!
//! [`GenerationStatus`] drives the orchestrator's state machine.  The view
//! reads it (directly or through [`StudioEvent`]s) to decide what to render.
//!
//! [`AppState`] is the single source of truth: current status, the active
//! recipe, the last error message, the generation token and the saved
//! favorites.
//!
//! [`SharedState`] is a type alias for `Arc<Mutex<AppState>>`.

use std::sync::{Arc, Mutex};

use crate::recipe::{FavoritesStore, Recipe, RecipeId};

// ---------------------------------------------------------------------------
// GenerationStatus
// ---------------------------------------------------------------------------

/// States of the recipe generation pipeline.
///
/// ```text
/// Idle ──generate──▶ GeneratingRecipe ──text ok──▶ GeneratingMedia ──image done──▶ Completed
///                          │                         (image may be absent)
///                          └──text failed──▶ Error
/// Error ──dismiss──▶ Idle          any ──generate──▶ GeneratingRecipe
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerationStatus {
    /// Waiting for ingredients.
    #[default]
    Idle,

    /// The text collaborator is writing the recipe.
    GeneratingRecipe,

    /// The recipe is visible; its image is still being generated.
    GeneratingMedia,

    /// The recipe is final, with or without an image.
    Completed,

    /// The text stage failed.  Retrying returns to `Idle`.
    Error,
}

impl GenerationStatus {
    /// Returns `true` while a generation stage is outstanding.
    ///
    /// ```
    /// use tcm_kitchen::pipeline::GenerationStatus;
    ///
    /// assert!(!GenerationStatus::Idle.is_busy());
    /// assert!(GenerationStatus::GeneratingRecipe.is_busy());
    /// assert!(GenerationStatus::GeneratingMedia.is_busy());
    /// assert!(!GenerationStatus::Completed.is_busy());
    /// assert!(!GenerationStatus::Error.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            GenerationStatus::GeneratingRecipe | GenerationStatus::GeneratingMedia
        )
    }

    /// Short label for the status line.
    pub fn label(&self) -> &'static str {
        match self {
            GenerationStatus::Idle => "Idle",
            GenerationStatus::GeneratingRecipe => "Writing recipe",
            GenerationStatus::GeneratingMedia => "Plating (image pending)",
            GenerationStatus::Completed => "Ready",
            GenerationStatus::Error => "Error",
        }
    }
}

// ---------------------------------------------------------------------------
// StudioEvent
// ---------------------------------------------------------------------------

/// State-change notifications broadcast by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum StudioEvent {
    StatusChanged(GenerationStatus),
    /// The active recipe was replaced, patched or cleared.
    ActiveRecipeChanged(Option<Recipe>),
    FavoritesChanged { count: usize },
    /// The text stage failed with this user-facing message.
    GenerationFailed(String),
    ImageEdited { id: RecipeId },
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Shared application state.
///
/// Held behind [`SharedState`].  Only the orchestrator mutates it.
#[derive(Debug)]
pub struct AppState {
    /// Current phase of the generation pipeline.
    pub status: GenerationStatus,

    /// Recipe shown in the creation view.  Not necessarily saved.
    pub active_recipe: Option<Recipe>,

    /// User-facing message while `status == Error`.
    pub error_message: Option<String>,

    /// Bumped whenever the active recipe is replaced or cleared.  Background
    /// results carry the token they were started with and are dropped when
    /// it no longer matches.
    pub generation: u64,

    /// Saved recipes and their backing file.
    pub favorites: FavoritesStore,
}

impl AppState {
    pub fn new(favorites: FavoritesStore) -> Self {
        Self {
            status: GenerationStatus::Idle,
            active_recipe: None,
            error_message: None,
            generation: 0,
            favorites,
        }
    }

    /// `true` when `id` is still the active recipe of generation `token`.
    pub fn is_current(&self, token: u64, id: &RecipeId) -> bool {
        self.generation == token && self.active_recipe.as_ref().is_some_and(|r| &r.id == id)
    }
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`AppState`].
///
/// Cheap to clone.  Lock for a short critical section; do **not** hold the
/// lock across `.await` points.
pub type SharedState = Arc<Mutex<AppState>>;

/// Construct a new [`SharedState`] around the loaded favorites.
pub fn new_shared_state(favorites: FavoritesStore) -> SharedState {
    Arc::new(Mutex::new(AppState::new(favorites)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
