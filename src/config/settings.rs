//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::recipe::SortOption;

// ---------------------------------------------------------------------------
// Language
// ---------------------------------------------------------------------------

/// Language used for prompts and the narration script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Es,
    En,
}

impl Default for Language {
    fn default() -> Self {
        Self::Es
    }
}

// ---------------------------------------------------------------------------
// GeminiConfig
// ---------------------------------------------------------------------------

/// Settings for the generative backend (text, image, image edit, speech).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Base URL of the API endpoint.
    pub base_url: String,
    /// API key.  `GEMINI_API_KEY` / `API_KEY` in the environment take
    /// precedence over the file value.
    pub api_key: Option<String>,
    /// Model for structured recipe text.
    pub text_model: String,
    /// Model for image generation and image edits.
    pub image_model: String,
    /// Model for speech synthesis.
    pub tts_model: String,
    /// Prebuilt voice name for narration.
    pub voice_name: String,
    /// Prompt and narration language.
    pub language: Language,
    /// Maximum seconds to wait for a single HTTP response.
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".into(),
            api_key: None,
            text_model: "gemini-2.5-flash-lite".into(),
            image_model: "gemini-2.5-flash-image".into(),
            tts_model: "gemini-2.5-flash-preview-tts".into(),
            voice_name: "Kore".into(),
            language: Language::default(),
            timeout_secs: 60,
        }
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Narration playback settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Whether narration is offered at all.
    pub enabled: bool,
    /// Sample rate of the synthesized PCM payload in Hz.
    pub sample_rate: u32,
    /// Channel count of the synthesized PCM payload.
    pub channels: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_rate: 24_000,
            channels: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// StorageConfig
// ---------------------------------------------------------------------------

/// Location of the saved-recipes file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Explicit favorites file.  `None` uses [`AppPaths::favorites_file`].
    pub favorites_file: Option<PathBuf>,
}

impl StorageConfig {
    pub fn resolved_favorites_file(&self) -> PathBuf {
        self.favorites_file
            .clone()
            .unwrap_or_else(|| AppPaths::new().favorites_file)
    }
}

// ---------------------------------------------------------------------------
// UiConfig
// ---------------------------------------------------------------------------

/// Terminal view settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// Order used by `favorites` when no sort is given.
    pub default_sort: SortOption,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            default_sort: SortOption::Date,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use tcm_kitchen::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Generative backend settings.
    pub gemini: GeminiConfig,
    /// Narration playback settings.
    pub audio: AudioConfig,
    /// Saved-recipes location.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Terminal view settings.
    pub ui: UiConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// so callers never need to special-case a missing file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Overlay the API key from `GEMINI_API_KEY` or `API_KEY`.
    pub fn apply_env(&mut self) {
        self.apply_api_key(
            std::env::var("GEMINI_API_KEY")
                .ok()
                .or_else(|| std::env::var("API_KEY").ok()),
        );
    }

    fn apply_api_key(&mut self, key: Option<String>) {
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            self.gemini.api_key = Some(key);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
