//! Configuration for TCM Kitchen.
//!
//! [`AppConfig`] is the top-level `settings.toml` document with one section
//! per subsystem (`gemini`, `audio`, `storage`, `ui`).  [`AppPaths`]
//! resolves where the settings and the saved recipes live.

pub mod paths;
pub mod settings;

pub use paths::{AppPaths, HOME_ENV};
pub use settings::{AppConfig, AudioConfig, GeminiConfig, Language, StorageConfig, UiConfig};
