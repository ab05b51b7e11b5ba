//! In-memory saved-recipe set.
//!
//! [`Collection`] keeps insertion order for serialization but behaves as a
//! set keyed by [`RecipeId`]: inserting an id that is already present
//! replaces the entry in place instead of adding a duplicate.

use crate::recipe::model::{Recipe, RecipeId, SortOption};

/// Saved recipes, unique by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection {
    entries: Vec<Recipe>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a stored sequence, keeping the last record for any
    /// repeated id.
    pub fn from_entries(entries: Vec<Recipe>) -> Self {
        let mut collection = Self::new();
        for recipe in entries {
            collection.insert(recipe);
        }
        collection
    }

    pub fn entries(&self) -> &[Recipe] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &RecipeId) -> bool {
        self.entries.iter().any(|r| &r.id == id)
    }

    pub fn get(&self, id: &RecipeId) -> Option<&Recipe> {
        self.entries.iter().find(|r| &r.id == id)
    }

    /// Insert or replace by id.
    pub fn insert(&mut self, recipe: Recipe) {
        match self.entries.iter_mut().find(|r| r.id == recipe.id) {
            Some(existing) => *existing = recipe,
            None => self.entries.push(recipe),
        }
    }

    /// Remove by id, returning the removed entry.  Unknown ids are a no-op.
    pub fn remove(&mut self, id: &RecipeId) -> Option<Recipe> {
        let pos = self.entries.iter().position(|r| &r.id == id)?;
        Some(self.entries.remove(pos))
    }

    /// Presence toggle keyed by id.  Returns `true` when the recipe is a
    /// member after the call.
    pub fn toggle(&mut self, recipe: &Recipe) -> bool {
        if self.remove(&recipe.id).is_some() {
            false
        } else {
            self.entries.push(recipe.clone());
            true
        }
    }

    /// Replace the image of the entry with `id`.  Returns `false` when the
    /// id is not present.
    pub fn patch_image(&mut self, id: &RecipeId, image_url: &str) -> bool {
        match self.entries.iter_mut().find(|r| &r.id == id) {
            Some(recipe) => {
                recipe.image_url = Some(image_url.to_string());
                true
            }
            None => false,
        }
    }

    /// A sorted copy for display; the stored order is left untouched.
    pub fn sorted(&self, sort: SortOption) -> Vec<Recipe> {
        let mut out = self.entries.clone();
        match sort {
            SortOption::Date => out.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            SortOption::Alphabetical => {
                out.sort_by_cached_key(|r| r.title.to_lowercase());
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
