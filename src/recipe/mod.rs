//! Recipe entity model and the local favorites store.
//!
//! * [`Recipe`] / [`RecipeId`] / [`RecipeDraft`]: the record shape.
//! * [`Collection`]: id-keyed saved set with stable insertion order.
//! * [`FavoritesStore`]: the collection plus its JSON file, persisted on
//!   every mutation.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use tcm_kitchen::recipe::{FavoritesStore, Recipe, RecipeDraft, SortOption};
//!
//! let mut store = FavoritesStore::load_or_default();
//! let recipe = Recipe::from_draft(RecipeDraft {
//!     title: "Warming Ginger Congee".into(),
//!     ingredients: vec!["ginger".into(), "rice".into()],
//!     steps: vec!["Simmer".into()],
//!     benefits: "Warms Yang".into(),
//! });
//!
//! store.toggle(&recipe).unwrap();
//! for saved in store.sorted(SortOption::Date) {
//!     println!("{} {}", saved.id, saved.title);
//! }
//! ```

pub mod collection;
pub mod model;
pub mod store;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use collection::Collection;
pub use model::{Recipe, RecipeDraft, RecipeId, SortOption};
pub use store::{FavoritesStore, StoreError};
