//! Recipe orchestrator: drives the ingredients → text → image flow.
//!
//! [`RecipeOrchestrator`] owns the [`SharedState`] and performs every state
//! transition.  The view calls its async operations and listens to
//! [`StudioEvent`]s on a `tokio::sync::broadcast` channel.
//!
//! # Pipeline flow
//!
//! ```text
//! generate(ingredients)
//!   └─▶ bump token, clear active recipe               [GeneratingRecipe]
//!         ├─ Err → user-facing message                 [Error]
//!         └─ Ok  → new id + createdAt, publish         [GeneratingMedia]
//!               └─▶ tokio::spawn(image request)        (not awaited)
//!                     ├─ same id still shown → apply image
//!                     ├─ same token          →         [Completed]
//!                     └─ otherwise           → stale, dropped
//! ```
//!
//! In-flight requests are never cancelled.  An image lands on the active
//! recipe whenever that recipe still has the same id.  The generation token
//! it was started with only decides whether it may complete the status: a
//! newer generation, a selection or a start-over owns the status instead.

use std::sync::{Arc, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::Language;
use crate::genai::{GenError, ImageEditor, ImageGenerator, RecipeWriter};
use crate::recipe::{Recipe, RecipeId, SortOption, StoreError};

use super::state::{AppState, GenerationStatus, SharedState, StudioEvent};

const EVENT_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// StudioError
// ---------------------------------------------------------------------------

/// Errors returned by orchestrator operations.
#[derive(Debug, Error)]
pub enum StudioError {
    /// No usable ingredient after trimming.
    #[error("add at least one ingredient")]
    EmptyIngredients,

    /// The text collaborator failed.  The status is now `Error`.
    #[error("recipe generation failed: {0}")]
    Generation(#[source] GenError),

    /// A newer generation replaced this one before its text arrived.
    #[error("generation was superseded by a newer request")]
    Superseded,

    #[error("recipe has no image to edit")]
    NoImage,

    #[error("edit instruction is empty")]
    EmptyInstruction,

    /// The edit collaborator failed or returned no image.
    #[error("image edit failed: {0}")]
    ImageEdit(#[source] GenError),

    #[error("no saved recipe with id {0}")]
    NotFound(RecipeId),

    /// The in-memory change was kept but could not be written to disk.
    #[error("could not save favorites: {0}")]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// PendingMedia
// ---------------------------------------------------------------------------

/// What happened to a background image request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaOutcome {
    /// The image was applied to the active recipe.
    Applied,
    /// The recipe completed without an image.
    Missing,
    /// Another recipe is shown (or none); nothing was applied to it.
    Stale,
}

/// A freshly generated recipe plus its background image request.
///
/// Dropping the handle detaches the request; it still runs to completion.
#[derive(Debug)]
pub struct PendingMedia {
    pub recipe: Recipe,
    task: JoinHandle<MediaOutcome>,
}

impl PendingMedia {
    /// Wait for the image request to settle.
    pub async fn finished(self) -> MediaOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("orchestrator: image task failed: {e}");
                MediaOutcome::Missing
            }
        }
    }
}

// ---------------------------------------------------------------------------
// RecipeOrchestrator
// ---------------------------------------------------------------------------

/// Drives recipe generation, image edits and favorites.
///
/// Cheap to clone; clones share state, collaborators and the event channel.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use tcm_kitchen::config::AppConfig;
/// use tcm_kitchen::genai::GeminiClient;
/// use tcm_kitchen::pipeline::{new_shared_state, RecipeOrchestrator};
/// use tcm_kitchen::recipe::FavoritesStore;
///
/// # async fn example() {
/// let config = AppConfig::default();
/// let client = Arc::new(GeminiClient::from_config(&config.gemini));
/// let state = new_shared_state(FavoritesStore::load_or_default());
///
/// let orchestrator = RecipeOrchestrator::new(state, client.clone(), client.clone(), client);
/// let pending = orchestrator
///     .generate(&["ginger".into(), "rice".into()])
///     .await
///     .unwrap();
/// println!("{}", pending.recipe.title);
/// pending.finished().await;
/// # }
/// ```
#[derive(Clone)]
pub struct RecipeOrchestrator {
    state: SharedState,
    writer: Arc<dyn RecipeWriter>,
    images: Arc<dyn ImageGenerator>,
    editor: Arc<dyn ImageEditor>,
    events: broadcast::Sender<StudioEvent>,
    language: Language,
}

impl RecipeOrchestrator {
    /// Create a new orchestrator.
    ///
    /// # Arguments
    ///
    /// * `state`: shared application state (also read by the view).
    /// * `writer`: recipe text collaborator.
    /// * `images`: dish image collaborator.
    /// * `editor`: image edit collaborator.
    pub fn new(
        state: SharedState,
        writer: Arc<dyn RecipeWriter>,
        images: Arc<dyn ImageGenerator>,
        editor: Arc<dyn ImageEditor>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state,
            writer,
            images,
            editor,
            events,
            language: Language::default(),
        }
    }

    /// Language of user-facing error messages.
    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StudioEvent> {
        self.events.subscribe()
    }

    // -----------------------------------------------------------------------
    // Generation
    // -----------------------------------------------------------------------

    /// Generate a recipe from `ingredients`.
    ///
    /// Returns once the text is in; the image keeps generating in the
    /// background behind the returned [`PendingMedia`].
    pub async fn generate(&self, ingredients: &[String]) -> Result<PendingMedia, StudioError> {
        let ingredients = normalize_ingredients(ingredients);
        if ingredients.is_empty() {
            log::warn!("orchestrator: generate rejected, no ingredients");
            return Err(StudioError::EmptyIngredients);
        }

        let token = {
            let mut st = self.lock();
            st.generation += 1;
            st.status = GenerationStatus::GeneratingRecipe;
            st.error_message = None;
            st.active_recipe = None;
            st.generation
        };
        self.emit(StudioEvent::StatusChanged(GenerationStatus::GeneratingRecipe));
        self.emit(StudioEvent::ActiveRecipeChanged(None));
        log::info!(
            "orchestrator: generation {token} started with {} ingredient(s)",
            ingredients.len()
        );

        let draft = match self.writer.write_recipe(&ingredients).await {
            Ok(draft) => draft,
            Err(e) => return Err(self.fail_generation(token, e)),
        };

        let recipe = Recipe::from_draft(draft);
        {
            let mut st = self.lock();
            if st.generation != token {
                log::debug!("orchestrator: recipe text for generation {token} is stale, dropped");
                return Err(StudioError::Superseded);
            }
            st.active_recipe = Some(recipe.clone());
            st.status = GenerationStatus::GeneratingMedia;
        }
        self.emit(StudioEvent::ActiveRecipeChanged(Some(recipe.clone())));
        self.emit(StudioEvent::StatusChanged(GenerationStatus::GeneratingMedia));
        log::info!("orchestrator: recipe {} ready: {:?}", recipe.id, recipe.title);

        let task = tokio::spawn(self.clone().finish_media(token, recipe.clone()));
        Ok(PendingMedia { recipe, task })
    }

    /// Background half of [`generate`](Self::generate).
    async fn finish_media(self, token: u64, recipe: Recipe) -> MediaOutcome {
        let image = self
            .images
            .generate_image(&recipe.title, &recipe.ingredient_summary())
            .await;

        let (outcome, active, current, favorites) = {
            let mut guard = self.lock();
            let st = &mut *guard;

            let mut favorites = None;
            if let Some(url) = &image {
                match st.favorites.patch_image(&recipe.id, url) {
                    Ok(false) => {}
                    Ok(true) => favorites = Some(st.favorites.len()),
                    Err(e) => {
                        log::error!("orchestrator: failed to persist image for {}: {e}", recipe.id);
                        favorites = Some(st.favorites.len());
                    }
                }
            }

            // The id decides where the image goes; the token only decides
            // whether this generation still owns the status.
            let shown = st.active_recipe.as_ref().is_some_and(|r| r.id == recipe.id);
            let current = st.is_current(token, &recipe.id);

            let mut applied = None;
            if shown {
                if let (Some(url), Some(active)) = (image, st.active_recipe.as_mut()) {
                    active.image_url = Some(url);
                    applied = Some(active.clone());
                }
            }
            if current {
                st.status = GenerationStatus::Completed;
            }

            let outcome = match (&applied, current) {
                (Some(_), _) => MediaOutcome::Applied,
                (None, true) => MediaOutcome::Missing,
                (None, false) => MediaOutcome::Stale,
            };
            (outcome, applied, current, favorites)
        };

        if let Some(count) = favorites {
            self.emit(StudioEvent::FavoritesChanged { count });
        }

        match outcome {
            MediaOutcome::Applied => log::info!("orchestrator: image applied to {}", recipe.id),
            MediaOutcome::Missing => {
                log::warn!("orchestrator: {} completed without an image", recipe.id)
            }
            MediaOutcome::Stale => {
                log::debug!("orchestrator: image for {} is stale, dropped", recipe.id)
            }
        }
        if let Some(active) = active {
            self.emit(StudioEvent::ActiveRecipeChanged(Some(active)));
        }
        if current {
            self.emit(StudioEvent::StatusChanged(GenerationStatus::Completed));
        }

        outcome
    }

    /// Record a text-stage failure unless a newer generation took over.
    fn fail_generation(&self, token: u64, err: GenError) -> StudioError {
        let message = generation_failed_message(self.language).to_string();
        {
            let mut st = self.lock();
            if st.generation != token {
                log::debug!("orchestrator: failure of generation {token} is stale, dropped ({err})");
                return StudioError::Superseded;
            }
            st.status = GenerationStatus::Error;
            st.error_message = Some(message.clone());
        }
        log::error!("orchestrator: generation {token} failed: {err}");
        self.emit(StudioEvent::StatusChanged(GenerationStatus::Error));
        self.emit(StudioEvent::GenerationFailed(message));
        StudioError::Generation(err)
    }

    // -----------------------------------------------------------------------
    // Image edit
    // -----------------------------------------------------------------------

    /// Apply a natural-language edit to `recipe`'s image.
    ///
    /// Returns the new image.  On failure nothing changes.  The generation
    /// status is never touched.
    pub async fn edit_recipe_image(
        &self,
        recipe: &Recipe,
        instruction: &str,
    ) -> Result<String, StudioError> {
        let image = recipe.image_url.as_deref().ok_or(StudioError::NoImage)?;
        let instruction = instruction.trim();
        if instruction.is_empty() {
            return Err(StudioError::EmptyInstruction);
        }

        log::info!("orchestrator: editing image of {}", recipe.id);
        let edited = match self.editor.edit_image(image, instruction).await {
            Ok(Some(url)) => url,
            Ok(None) => {
                log::warn!("orchestrator: edit of {} returned no image", recipe.id);
                return Err(StudioError::ImageEdit(GenError::EmptyResponse));
            }
            Err(e) => {
                log::warn!("orchestrator: edit of {} failed: {e}", recipe.id);
                return Err(StudioError::ImageEdit(e));
            }
        };

        let (active, saved) = {
            let mut guard = self.lock();
            let st = &mut *guard;

            let active = match st.active_recipe.as_mut() {
                Some(active) if active.id == recipe.id => {
                    active.image_url = Some(edited.clone());
                    Some(active.clone())
                }
                _ => None,
            };
            let saved = st
                .favorites
                .patch_image(&recipe.id, &edited)
                .map(|patched| patched.then(|| st.favorites.len()));
            (active, saved)
        };

        if let Some(active) = active {
            self.emit(StudioEvent::ActiveRecipeChanged(Some(active)));
        }
        self.emit(StudioEvent::ImageEdited {
            id: recipe.id.clone(),
        });

        match saved {
            Ok(Some(count)) => self.emit(StudioEvent::FavoritesChanged { count }),
            Ok(None) => {}
            Err(e) => {
                log::error!("orchestrator: failed to persist edited image: {e}");
                self.emit(StudioEvent::FavoritesChanged {
                    count: self.favorites_count(),
                });
                return Err(e.into());
            }
        }

        Ok(edited)
    }

    // -----------------------------------------------------------------------
    // Favorites
    // -----------------------------------------------------------------------

    /// Add or remove `recipe`.  Returns whether it is now a favorite.
    pub fn toggle_favorite(&self, recipe: &Recipe) -> Result<bool, StudioError> {
        let (result, count) = {
            let mut st = self.lock();
            let result = st.favorites.toggle(recipe);
            (result, st.favorites.len())
        };
        self.emit(StudioEvent::FavoritesChanged { count });

        let saved = result?;
        log::info!(
            "orchestrator: {} {} favorites",
            recipe.id,
            if saved { "added to" } else { "removed from" }
        );
        Ok(saved)
    }

    /// Remove `id`.  Unknown ids are a no-op returning `false`.
    pub fn remove_favorite(&self, id: &RecipeId) -> Result<bool, StudioError> {
        let (result, count) = {
            let mut st = self.lock();
            let result = st.favorites.remove(id);
            (result, st.favorites.len())
        };

        match result {
            Ok(false) => {
                log::debug!("orchestrator: remove of unknown favorite {id} ignored");
                Ok(false)
            }
            Ok(true) => {
                self.emit(StudioEvent::FavoritesChanged { count });
                Ok(true)
            }
            Err(e) => {
                self.emit(StudioEvent::FavoritesChanged { count });
                Err(e.into())
            }
        }
    }

    /// Make a saved recipe the active one.
    pub fn select_recipe(&self, id: &RecipeId) -> Result<Recipe, StudioError> {
        let recipe = {
            let mut st = self.lock();
            let recipe = st
                .favorites
                .get(id)
                .cloned()
                .ok_or_else(|| StudioError::NotFound(id.clone()))?;
            st.generation += 1;
            st.active_recipe = Some(recipe.clone());
            st.error_message = None;
            st.status = GenerationStatus::Completed;
            recipe
        };
        log::info!("orchestrator: selected {}", recipe.id);
        self.emit(StudioEvent::ActiveRecipeChanged(Some(recipe.clone())));
        self.emit(StudioEvent::StatusChanged(GenerationStatus::Completed));
        Ok(recipe)
    }

    /// Discard the active recipe and return to `Idle`.
    pub fn start_over(&self) {
        {
            let mut st = self.lock();
            st.generation += 1;
            st.active_recipe = None;
            st.error_message = None;
            st.status = GenerationStatus::Idle;
        }
        log::debug!("orchestrator: start over");
        self.emit(StudioEvent::ActiveRecipeChanged(None));
        self.emit(StudioEvent::StatusChanged(GenerationStatus::Idle));
    }

    /// Leave `Error` for `Idle`.  Does nothing in any other state.
    pub fn dismiss_error(&self) {
        {
            let mut st = self.lock();
            if st.status != GenerationStatus::Error {
                return;
            }
            st.status = GenerationStatus::Idle;
            st.error_message = None;
        }
        self.emit(StudioEvent::StatusChanged(GenerationStatus::Idle));
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn status(&self) -> GenerationStatus {
        self.lock().status
    }

    pub fn active_recipe(&self) -> Option<Recipe> {
        self.lock().active_recipe.clone()
    }

    pub fn error_message(&self) -> Option<String> {
        self.lock().error_message.clone()
    }

    pub fn favorites(&self, sort: SortOption) -> Vec<Recipe> {
        self.lock().favorites.sorted(sort)
    }

    pub fn is_favorite(&self, id: &RecipeId) -> bool {
        self.lock().favorites.contains(id)
    }

    pub fn favorites_count(&self) -> usize {
        self.lock().favorites.len()
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn lock(&self) -> MutexGuard<'_, AppState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: StudioEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

/// Trim every ingredient and drop blank ones.
fn normalize_ingredients(ingredients: &[String]) -> Vec<String> {
    ingredients
        .iter()
        .map(|i| i.trim())
        .filter(|i| !i.is_empty())
        .map(str::to_string)
        .collect()
}

fn generation_failed_message(language: Language) -> &'static str {
    match language {
        Language::Es => {
            "Hubo un problema conectando con los espíritus de la cocina. Por favor intenta de nuevo."
        }
        Language::En => "There was a problem reaching the kitchen spirits. Please try again.",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::state::new_shared_state;
    use crate::recipe::{FavoritesStore, RecipeDraft};
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;
    use tokio::sync::oneshot;

    const IMAGE: &str = "data:image/png;base64,aW1n";
    const EDITED: &str = "data:image/png;base64,ZWRpdGVk";

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    fn draft(title: &str) -> RecipeDraft {
        RecipeDraft {
            title: title.into(),
            ingredients: vec!["ginger".into(), "rice".into()],
            steps: vec!["Simmer rice".into(), "Add ginger".into()],
            benefits: "Warms the stomach".into(),
        }
    }

    /// Returns queued results in order, then `draft("Recipe")`.
    #[derive(Default)]
    struct ScriptedWriter {
        script: Mutex<VecDeque<Result<RecipeDraft, GenError>>>,
        calls: AtomicUsize,
        last: Mutex<Vec<String>>,
    }

    impl ScriptedWriter {
        fn with(results: Vec<Result<RecipeDraft, GenError>>) -> Self {
            Self {
                script: Mutex::new(results.into()),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl RecipeWriter for ScriptedWriter {
        async fn write_recipe(&self, ingredients: &[String]) -> Result<RecipeDraft, GenError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = ingredients.to_vec();
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(draft("Recipe")))
        }
    }

    /// Always answers with the same image (or none).
    struct FixedImages(Option<String>);

    #[async_trait]
    impl ImageGenerator for FixedImages {
        async fn generate_image(&self, _title: &str, _description: &str) -> Option<String> {
            self.0.clone()
        }
    }

    /// Holds each image request, keyed by recipe title, until released.
    #[derive(Default)]
    struct GatedImages {
        gates: Mutex<HashMap<String, oneshot::Receiver<Option<String>>>>,
        calls: AtomicUsize,
    }

    impl GatedImages {
        fn gate(&self, title: &str) -> oneshot::Sender<Option<String>> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().unwrap().insert(title.to_string(), rx);
            tx
        }
    }

    #[async_trait]
    impl ImageGenerator for GatedImages {
        async fn generate_image(&self, title: &str, _description: &str) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let rx = self.gates.lock().unwrap().remove(title);
            match rx {
                Some(rx) => rx.await.ok().flatten(),
                None => None,
            }
        }
    }

    struct FixedEditor(Result<Option<String>, GenError>);

    #[async_trait]
    impl ImageEditor for FixedEditor {
        async fn edit_image(&self, _image: &str, _instruction: &str) -> Result<Option<String>, GenError> {
            self.0.clone()
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    struct Harness {
        orc: RecipeOrchestrator,
        dir: TempDir,
    }

    impl Harness {
        fn favorites_path(&self) -> std::path::PathBuf {
            self.dir.path().join("tcm_favorites.json")
        }

        fn reload(&self) -> FavoritesStore {
            FavoritesStore::load_from(self.favorites_path())
        }
    }

    fn harness(
        writer: Arc<dyn RecipeWriter>,
        images: Arc<dyn ImageGenerator>,
        editor: Arc<dyn ImageEditor>,
    ) -> Harness {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = FavoritesStore::load_from(dir.path().join("tcm_favorites.json"));
        let orc = RecipeOrchestrator::new(new_shared_state(store), writer, images, editor);
        Harness { orc, dir }
    }

    fn simple(images: Option<&str>) -> Harness {
        harness(
            Arc::new(ScriptedWriter::default()),
            Arc::new(FixedImages(images.map(str::to_string))),
            Arc::new(FixedEditor(Ok(Some(EDITED.into())))),
        )
    }

    fn ingredients(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    // -----------------------------------------------------------------------
    // Generation
    // -----------------------------------------------------------------------

    /// Text first, then the image arrives in the background.
    #[tokio::test]
    async fn warming_ginger_congee_scenario() {
        let writer = Arc::new(ScriptedWriter::with(vec![Ok(draft("Warming Ginger Congee"))]));
        let images = Arc::new(GatedImages::default());
        let release = images.gate("Warming Ginger Congee");
        let h = harness(writer, images, Arc::new(FixedEditor(Ok(None))));

        let pending = h.orc.generate(&ingredients(&["ginger", "rice"])).await.unwrap();

        assert_eq!(h.orc.status(), GenerationStatus::GeneratingMedia);
        let active = h.orc.active_recipe().expect("active recipe");
        assert_eq!(active.id, pending.recipe.id);
        assert_eq!(active.title, "Warming Ginger Congee");
        assert_eq!(active.steps.len(), 2);
        assert!(active.image_url.is_none());

        release.send(Some(IMAGE.into())).unwrap();
        assert_eq!(pending.finished().await, MediaOutcome::Applied);

        assert_eq!(h.orc.status(), GenerationStatus::Completed);
        let active = h.orc.active_recipe().unwrap();
        assert_eq!(active.image_url.as_deref(), Some(IMAGE));
        assert!(h.orc.error_message().is_none());
    }

    #[tokio::test]
    async fn ids_are_unique_across_generations() {
        let h = simple(None);
        let mut ids = HashSet::new();
        for _ in 0..20 {
            let pending = h.orc.generate(&ingredients(&["ginger"])).await.unwrap();
            ids.insert(pending.recipe.id.clone());
            pending.finished().await;
        }
        assert_eq!(ids.len(), 20);
    }

    /// A late image for a superseded recipe must not touch the new one.
    #[tokio::test]
    async fn stale_image_is_dropped() {
        let writer = Arc::new(ScriptedWriter::with(vec![Ok(draft("First")), Ok(draft("Second"))]));
        let images = Arc::new(GatedImages::default());
        let first_gate = images.gate("First");
        let second_gate = images.gate("Second");
        let h = harness(writer, images, Arc::new(FixedEditor(Ok(None))));

        let first = h.orc.generate(&ingredients(&["ginger"])).await.unwrap();
        let second = h.orc.generate(&ingredients(&["dates"])).await.unwrap();
        let second_id = second.recipe.id.clone();

        first_gate.send(Some(IMAGE.into())).unwrap();
        assert_eq!(first.finished().await, MediaOutcome::Stale);

        let active = h.orc.active_recipe().unwrap();
        assert_eq!(active.id, second_id);
        assert!(active.image_url.is_none());
        assert_eq!(h.orc.status(), GenerationStatus::GeneratingMedia);

        second_gate.send(None).unwrap();
        assert_eq!(second.finished().await, MediaOutcome::Missing);
        assert_eq!(h.orc.status(), GenerationStatus::Completed);
    }

    /// Image failure degrades to a completed recipe without an image.
    #[tokio::test]
    async fn image_failure_still_completes() {
        let h = simple(None);
        let pending = h.orc.generate(&ingredients(&["goji"])).await.unwrap();
        assert_eq!(pending.finished().await, MediaOutcome::Missing);

        assert_eq!(h.orc.status(), GenerationStatus::Completed);
        assert!(h.orc.active_recipe().unwrap().image_url.is_none());
        assert!(h.orc.error_message().is_none());
    }

    #[tokio::test]
    async fn text_failure_sets_error_and_skips_image() {
        let writer = Arc::new(ScriptedWriter::with(vec![Err(GenError::Timeout)]));
        let images = Arc::new(GatedImages::default());
        let h = harness(writer, images.clone(), Arc::new(FixedEditor(Ok(None))));

        let err = h.orc.generate(&ingredients(&["ginger"])).await.unwrap_err();
        assert!(matches!(err, StudioError::Generation(GenError::Timeout)));

        assert_eq!(h.orc.status(), GenerationStatus::Error);
        assert!(h.orc.active_recipe().is_none());
        assert!(h.orc.error_message().unwrap().contains("espíritus"));
        assert_eq!(images.calls.load(Ordering::SeqCst), 0);

        h.orc.dismiss_error();
        assert_eq!(h.orc.status(), GenerationStatus::Idle);
        assert!(h.orc.error_message().is_none());
    }

    #[tokio::test]
    async fn english_failure_message() {
        let writer = Arc::new(ScriptedWriter::with(vec![Err(GenError::EmptyResponse)]));
        let h = harness(writer, Arc::new(FixedImages(None)), Arc::new(FixedEditor(Ok(None))));
        let orc = h.orc.clone().with_language(Language::En);

        let _ = orc.generate(&ingredients(&["ginger"])).await;
        assert!(orc.error_message().unwrap().contains("kitchen spirits"));
    }

    #[tokio::test]
    async fn generate_recovers_from_error() {
        let writer = Arc::new(ScriptedWriter::with(vec![Err(GenError::Timeout)]));
        let h = harness(writer, Arc::new(FixedImages(None)), Arc::new(FixedEditor(Ok(None))));

        assert!(h.orc.generate(&ingredients(&["ginger"])).await.is_err());
        let pending = h.orc.generate(&ingredients(&["ginger"])).await.unwrap();
        pending.finished().await;

        assert_eq!(h.orc.status(), GenerationStatus::Completed);
        assert!(h.orc.error_message().is_none());
    }

    #[tokio::test]
    async fn empty_ingredients_never_reach_writer() {
        let writer = Arc::new(ScriptedWriter::default());
        let h = harness(writer.clone(), Arc::new(FixedImages(None)), Arc::new(FixedEditor(Ok(None))));

        let err = h.orc.generate(&[]).await.unwrap_err();
        assert!(matches!(err, StudioError::EmptyIngredients));
        let err = h.orc.generate(&ingredients(&["  ", ""])).await.unwrap_err();
        assert!(matches!(err, StudioError::EmptyIngredients));

        assert_eq!(writer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.orc.status(), GenerationStatus::Idle);
    }

    #[tokio::test]
    async fn ingredients_are_trimmed() {
        let writer = Arc::new(ScriptedWriter::default());
        let h = harness(writer.clone(), Arc::new(FixedImages(None)), Arc::new(FixedEditor(Ok(None))));

        let pending = h
            .orc
            .generate(&ingredients(&[" ginger ", "", "rice"]))
            .await
            .unwrap();
        pending.finished().await;

        assert_eq!(*writer.last.lock().unwrap(), vec!["ginger", "rice"]);
    }

    #[tokio::test]
    async fn events_follow_transitions() {
        let h = simple(Some(IMAGE));
        let mut rx = h.orc.subscribe();

        let pending = h.orc.generate(&ingredients(&["ginger"])).await.unwrap();
        pending.finished().await;

        let mut statuses = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let StudioEvent::StatusChanged(status) = event {
                statuses.push(status);
            }
        }
        assert_eq!(
            statuses,
            vec![
                GenerationStatus::GeneratingRecipe,
                GenerationStatus::GeneratingMedia,
                GenerationStatus::Completed,
            ]
        );
    }

    // -----------------------------------------------------------------------
    // Favorites
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn toggle_twice_restores_membership() {
        let h = simple(None);
        let pending = h.orc.generate(&ingredients(&["ginger"])).await.unwrap();
        pending.finished().await;
        let recipe = h.orc.active_recipe().unwrap();

        assert!(h.orc.toggle_favorite(&recipe).unwrap());
        assert!(h.orc.is_favorite(&recipe.id));
        assert_eq!(h.reload().get(&recipe.id), Some(&recipe));

        assert!(!h.orc.toggle_favorite(&recipe).unwrap());
        assert!(!h.orc.is_favorite(&recipe.id));
        assert!(h.reload().is_empty());
    }

    #[tokio::test]
    async fn remove_unknown_is_noop() {
        let h = simple(None);
        let pending = h.orc.generate(&ingredients(&["ginger"])).await.unwrap();
        pending.finished().await;
        let recipe = h.orc.active_recipe().unwrap();
        h.orc.toggle_favorite(&recipe).unwrap();

        assert!(!h.orc.remove_favorite(&RecipeId::from("unknown-id")).unwrap());
        assert_eq!(h.orc.favorites_count(), 1);

        assert!(h.orc.remove_favorite(&recipe.id).unwrap());
        assert_eq!(h.orc.favorites_count(), 0);
    }

    /// Favorited before the image arrived: the saved copy gets it too.
    #[tokio::test]
    async fn background_image_patches_favorite() {
        let writer = Arc::new(ScriptedWriter::with(vec![Ok(draft("Goji Tea"))]));
        let images = Arc::new(GatedImages::default());
        let gate = images.gate("Goji Tea");
        let h = harness(writer, images, Arc::new(FixedEditor(Ok(None))));

        let pending = h.orc.generate(&ingredients(&["goji"])).await.unwrap();
        let id = pending.recipe.id.clone();
        assert!(h.orc.toggle_favorite(&pending.recipe).unwrap());

        gate.send(Some(IMAGE.into())).unwrap();
        assert_eq!(pending.finished().await, MediaOutcome::Applied);

        let saved = &h.orc.favorites(SortOption::Date)[0];
        assert_eq!(saved.image_url.as_deref(), Some(IMAGE));
        assert_eq!(h.reload().get(&id).unwrap().image_url.as_deref(), Some(IMAGE));
    }

    #[tokio::test]
    async fn stale_image_still_patches_favorite() {
        let writer = Arc::new(ScriptedWriter::with(vec![Ok(draft("First")), Ok(draft("Second"))]));
        let images = Arc::new(GatedImages::default());
        let first_gate = images.gate("First");
        let h = harness(writer, images, Arc::new(FixedEditor(Ok(None))));

        let first = h.orc.generate(&ingredients(&["ginger"])).await.unwrap();
        h.orc.toggle_favorite(&first.recipe).unwrap();
        let first_id = first.recipe.id.clone();
        let second = h.orc.generate(&ingredients(&["dates"])).await.unwrap();

        first_gate.send(Some(IMAGE.into())).unwrap();
        assert_eq!(first.finished().await, MediaOutcome::Stale);
        second.finished().await;

        assert!(h.orc.active_recipe().unwrap().image_url.is_none());
        assert_eq!(h.reload().get(&first_id).unwrap().image_url.as_deref(), Some(IMAGE));
    }

    /// Re-opening the recipe whose image is still pending keeps both copies
    /// in step once the image lands.
    #[tokio::test]
    async fn reselected_recipe_still_receives_image() {
        let writer = Arc::new(ScriptedWriter::with(vec![Ok(draft("Goji Tea"))]));
        let images = Arc::new(GatedImages::default());
        let gate = images.gate("Goji Tea");
        let h = harness(writer, images, Arc::new(FixedEditor(Ok(None))));

        let pending = h.orc.generate(&ingredients(&["goji"])).await.unwrap();
        let id = pending.recipe.id.clone();
        h.orc.toggle_favorite(&pending.recipe).unwrap();
        h.orc.select_recipe(&id).unwrap();

        gate.send(Some(IMAGE.into())).unwrap();
        assert_eq!(pending.finished().await, MediaOutcome::Applied);

        let active = h.orc.active_recipe().unwrap();
        let saved = h.orc.favorites(SortOption::Date).remove(0);
        assert_eq!(active.id, id);
        assert_eq!(active.image_url.as_deref(), Some(IMAGE));
        assert_eq!(active.image_url, saved.image_url);
        assert_eq!(h.orc.status(), GenerationStatus::Completed);
    }

    #[tokio::test]
    async fn select_recipe_makes_favorite_active() {
        let h = simple(Some(IMAGE));
        let pending = h.orc.generate(&ingredients(&["ginger"])).await.unwrap();
        pending.finished().await;
        let saved = h.orc.active_recipe().unwrap();
        h.orc.toggle_favorite(&saved).unwrap();
        h.orc.start_over();

        assert!(matches!(
            h.orc.select_recipe(&RecipeId::from("nope")),
            Err(StudioError::NotFound(_))
        ));
        assert_eq!(h.orc.status(), GenerationStatus::Idle);

        let selected = h.orc.select_recipe(&saved.id).unwrap();
        assert_eq!(selected, saved);
        assert_eq!(h.orc.active_recipe(), Some(saved));
        assert_eq!(h.orc.status(), GenerationStatus::Completed);
    }

    #[tokio::test]
    async fn start_over_makes_pending_image_stale() {
        let writer = Arc::new(ScriptedWriter::with(vec![Ok(draft("Congee"))]));
        let images = Arc::new(GatedImages::default());
        let gate = images.gate("Congee");
        let h = harness(writer, images, Arc::new(FixedEditor(Ok(None))));

        let pending = h.orc.generate(&ingredients(&["rice"])).await.unwrap();
        h.orc.start_over();
        assert_eq!(h.orc.status(), GenerationStatus::Idle);

        gate.send(Some(IMAGE.into())).unwrap();
        assert_eq!(pending.finished().await, MediaOutcome::Stale);
        assert!(h.orc.active_recipe().is_none());
        assert_eq!(h.orc.status(), GenerationStatus::Idle);
    }

    // -----------------------------------------------------------------------
    // Image edit
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn edit_updates_active_and_favorite() {
        let h = simple(Some(IMAGE));
        let pending = h.orc.generate(&ingredients(&["ginger"])).await.unwrap();
        pending.finished().await;
        let recipe = h.orc.active_recipe().unwrap();
        h.orc.toggle_favorite(&recipe).unwrap();

        let edited = h
            .orc
            .edit_recipe_image(&recipe, "add a retro filter")
            .await
            .unwrap();
        assert_eq!(edited, EDITED);

        assert_eq!(h.orc.active_recipe().unwrap().image_url.as_deref(), Some(EDITED));
        assert_eq!(
            h.orc.favorites(SortOption::Date)[0].image_url.as_deref(),
            Some(EDITED)
        );
        assert_eq!(h.reload().get(&recipe.id).unwrap().image_url.as_deref(), Some(EDITED));
        assert_eq!(h.orc.status(), GenerationStatus::Completed);
    }

    #[tokio::test]
    async fn edit_failure_leaves_state_untouched() {
        let h = harness(
            Arc::new(ScriptedWriter::default()),
            Arc::new(FixedImages(Some(IMAGE.into()))),
            Arc::new(FixedEditor(Err(GenError::Timeout))),
        );
        let pending = h.orc.generate(&ingredients(&["ginger"])).await.unwrap();
        pending.finished().await;
        let recipe = h.orc.active_recipe().unwrap();

        let err = h.orc.edit_recipe_image(&recipe, "brighter").await.unwrap_err();
        assert!(matches!(err, StudioError::ImageEdit(GenError::Timeout)));
        assert_eq!(h.orc.active_recipe(), Some(recipe));
        assert_eq!(h.orc.status(), GenerationStatus::Completed);
    }

    #[tokio::test]
    async fn edit_returning_nothing_is_a_failure() {
        let h = harness(
            Arc::new(ScriptedWriter::default()),
            Arc::new(FixedImages(Some(IMAGE.into()))),
            Arc::new(FixedEditor(Ok(None))),
        );
        let pending = h.orc.generate(&ingredients(&["ginger"])).await.unwrap();
        pending.finished().await;
        let recipe = h.orc.active_recipe().unwrap();

        let err = h.orc.edit_recipe_image(&recipe, "brighter").await.unwrap_err();
        assert!(matches!(err, StudioError::ImageEdit(GenError::EmptyResponse)));
        assert_eq!(h.orc.active_recipe().unwrap().image_url.as_deref(), Some(IMAGE));
    }

    #[tokio::test]
    async fn edit_requires_image_and_instruction() {
        let h = simple(None);
        let pending = h.orc.generate(&ingredients(&["ginger"])).await.unwrap();
        pending.finished().await;
        let mut recipe = h.orc.active_recipe().unwrap();

        assert!(matches!(
            h.orc.edit_recipe_image(&recipe, "brighter").await,
            Err(StudioError::NoImage)
        ));

        recipe.image_url = Some(IMAGE.into());
        assert!(matches!(
            h.orc.edit_recipe_image(&recipe, "   ").await,
            Err(StudioError::EmptyInstruction)
        ));
    }
}
