//! Recipe record shape and identity rules.
//!
//! A [`Recipe`] is created once the text stage succeeds and is identified
//! solely by its [`RecipeId`].  The only field that changes afterwards is
//! [`Recipe::image_url`].

use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Language;

// ---------------------------------------------------------------------------
// RecipeId
// ---------------------------------------------------------------------------

/// Opaque unique recipe identifier (a UUID v4 rendered as a string).
///
/// Serialized transparently so stored collections stay plain JSON strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipeId(String);

impl RecipeId {
    /// Generate a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RecipeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecipeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RecipeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ---------------------------------------------------------------------------
// RecipeDraft
// ---------------------------------------------------------------------------

/// Structured output of the text-generation stage.
///
/// Carries no identity yet; [`Recipe::from_draft`] assigns `id` and
/// `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeDraft {
    pub title: String,
    pub ingredients: Vec<String>,
    pub steps: Vec<String>,
    pub benefits: String,
}

// ---------------------------------------------------------------------------
// Recipe
// ---------------------------------------------------------------------------

/// A generated recipe.
///
/// `image_url` is `None` while the image stage is pending or after it failed.
/// It is skipped on serialization when absent so a stored recipe never gains
/// an empty-string image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: RecipeId,
    pub title: String,
    pub ingredients: Vec<String>,
    pub steps: Vec<String>,
    pub benefits: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Recipe {
    /// Materialize a draft, assigning a fresh id and the current timestamp.
    pub fn from_draft(draft: RecipeDraft) -> Self {
        Self {
            id: RecipeId::new(),
            title: draft.title,
            ingredients: draft.ingredients,
            steps: draft.steps,
            benefits: draft.benefits,
            // Persisted with millisecond precision.
            created_at: Utc::now().trunc_subsecs(3),
            image_url: None,
        }
    }

    /// Whether the image stage has produced (or an edit has replaced) an image.
    pub fn has_image(&self) -> bool {
        self.image_url.is_some()
    }

    /// Ingredient list joined for the image-generation description.
    pub fn ingredient_summary(&self) -> String {
        self.ingredients.join(", ")
    }

    /// Narration text read aloud by the audio session.
    ///
    /// ```
    /// use tcm_kitchen::config::Language;
    /// use tcm_kitchen::recipe::{Recipe, RecipeDraft};
    ///
    /// let recipe = Recipe::from_draft(RecipeDraft {
    ///     title: "Congee".into(),
    ///     ingredients: vec!["rice".into()],
    ///     steps: vec!["Boil".into(), "Serve".into()],
    ///     benefits: "Warms Yang".into(),
    /// });
    /// assert_eq!(
    ///     recipe.narration_script(Language::En),
    ///     "Recipe: Congee. Warms Yang. Instructions: Boil. Serve."
    /// );
    /// ```
    pub fn narration_script(&self, language: Language) -> String {
        let (recipe, instructions) = match language {
            Language::Es => ("Receta", "Instrucciones"),
            Language::En => ("Recipe", "Instructions"),
        };
        format!(
            "{recipe}: {}. {}. {instructions}: {}.",
            self.title,
            self.benefits,
            self.steps.join(". ")
        )
    }
}

// ---------------------------------------------------------------------------
// SortOption
// ---------------------------------------------------------------------------

/// Display order for the saved collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOption {
    /// Newest first.
    Date,
    /// Case-insensitive by title.
    Alphabetical,
}

impl Default for SortOption {
    fn default() -> Self {
        Self::Date
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
