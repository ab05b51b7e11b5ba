//! Durable favorites store.
//!
//! [`FavoritesStore`] owns the saved [`Collection`] and the JSON file it is
//! persisted to.  The file is read once at startup and rewritten in full
//! after every mutation:
//!
//! | Platform | Default path |
//! |----------|--------------|
//! | Windows  | `%LOCALAPPDATA%\tcm-kitchen\tcm_favorites.json` |
//! | macOS    | `~/Library/Application Support/tcm-kitchen/tcm_favorites.json` |
//! | Linux    | `~/.local/share/tcm-kitchen/tcm_favorites.json` |
//!
//! A missing or unreadable file yields an empty collection; startup never
//! fails because of stored data.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::recipe::collection::Collection;
use crate::recipe::model::{Recipe, RecipeId, SortOption};

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

/// Errors raised while writing the collection file.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write favorites file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize favorites: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// load / save
// ---------------------------------------------------------------------------

/// Read a collection from `path`.  Absent or corrupt data yields an empty
/// collection.
pub fn load(path: &Path) -> Collection {
    if !path.exists() {
        return Collection::new();
    }
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) => {
            log::warn!("store: cannot read {} ({e}); starting empty", path.display());
            return Collection::new();
        }
    };
    match serde_json::from_str::<Vec<Recipe>>(&data) {
        Ok(entries) => Collection::from_entries(entries),
        Err(e) => {
            log::warn!("store: {} is not a valid collection ({e}); starting empty", path.display());
            Collection::new()
        }
    }
}

/// Write the whole collection to `path`, replacing any previous file in a
/// single rename.
pub fn save(path: &Path, collection: &Collection) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(collection.entries())?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// FavoritesStore
// ---------------------------------------------------------------------------

/// The saved collection plus its backing file.
///
/// Every mutating method updates memory first and then persists.  When the
/// write fails the in-memory change is kept and the error is returned so the
/// caller can surface it.
#[derive(Debug)]
pub struct FavoritesStore {
    collection: Collection,
    path: PathBuf,
}

impl FavoritesStore {
    /// Load from the default data directory.
    pub fn load_or_default() -> Self {
        Self::load_from(Self::default_path())
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: PathBuf) -> Self {
        let collection = load(&path);
        log::info!(
            "store: loaded {} favorite(s) from {}",
            collection.len(),
            path.display()
        );
        Self { collection, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub fn contains(&self, id: &RecipeId) -> bool {
        self.collection.contains(id)
    }

    pub fn get(&self, id: &RecipeId) -> Option<&Recipe> {
        self.collection.get(id)
    }

    pub fn len(&self) -> usize {
        self.collection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collection.is_empty()
    }

    pub fn sorted(&self, sort: SortOption) -> Vec<Recipe> {
        self.collection.sorted(sort)
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Insert or replace by id, then persist.
    pub fn insert(&mut self, recipe: Recipe) -> Result<(), StoreError> {
        self.collection.insert(recipe);
        self.save()
    }

    /// Presence toggle keyed by id, then persist.  Returns whether the
    /// recipe is saved after the call.
    pub fn toggle(&mut self, recipe: &Recipe) -> Result<bool, StoreError> {
        let saved = self.collection.toggle(recipe);
        self.save()?;
        Ok(saved)
    }

    /// Remove by id.  Returns `Ok(false)` without touching the file when the
    /// id is unknown.
    pub fn remove(&mut self, id: &RecipeId) -> Result<bool, StoreError> {
        if self.collection.remove(id).is_none() {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    /// Replace the image of a saved recipe.  Returns `Ok(false)` when the
    /// recipe is not saved (it may only live in the active view).
    pub fn patch_image(&mut self, id: &RecipeId, image_url: &str) -> Result<bool, StoreError> {
        if !self.collection.patch_image(id, image_url) {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Flush the current collection to disk.
    pub fn save(&self) -> Result<(), StoreError> {
        save(&self.path, &self.collection).map_err(|e| {
            log::error!("store: failed to persist {}: {e}", self.path.display());
            e
        })
    }

    /// Platform-appropriate path for the favorites file.
    pub fn default_path() -> PathBuf {
        crate::config::AppPaths::new().favorites_file
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
