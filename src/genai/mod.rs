//! Generative collaborators: recipe text, dish image, image edit, speech.
//!
//! This module provides:
//! * [`RecipeWriter`], [`ImageGenerator`], [`ImageEditor`],
//!   [`SpeechGenerator`]: async traits the orchestrator and the audio
//!   session consume.
//! * [`GeminiClient`]: a single `generateContent` HTTP client implementing
//!   all four traits.
//! * [`PromptBuilder`]: Spanish/English prompt templates.
//! * [`GenError`]: error variants for fallible generation calls.
//!
//! Image generation and speech never fail from the caller's point of view:
//! a failed call is logged and yields `None`.  Text generation and image
//! edits return their error.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use tcm_kitchen::config::AppConfig;
//! use tcm_kitchen::genai::{GeminiClient, ImageGenerator, RecipeWriter};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let client = GeminiClient::from_config(&config.gemini);
//!
//!     let draft = client
//!         .write_recipe(&["ginger".into(), "rice".into()])
//!         .await
//!         .unwrap();
//!     let image = client.generate_image(&draft.title, "ginger, rice").await;
//!     println!("{} (image: {})", draft.title, image.is_some());
//! }
//! ```

pub mod gemini;
pub mod prompt;

use async_trait::async_trait;
use thiserror::Error;

use crate::recipe::RecipeDraft;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use gemini::{parse_data_uri, GeminiClient, InlineImage};
pub use prompt::PromptBuilder;

// ---------------------------------------------------------------------------
// GenError
// ---------------------------------------------------------------------------

/// Errors that can occur during a generation call.
#[derive(Debug, Clone, Error)]
pub enum GenError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("generation request timed out")]
    Timeout,

    /// The API answered with a non-success status.
    #[error("API returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response could not be parsed as expected JSON.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// The response carried no usable content.
    #[error("model returned an empty response")]
    EmptyResponse,

    /// The image reference is not a `data:image/...;base64,` URI.
    #[error("invalid image reference: {0}")]
    InvalidImage(String),

    /// No API key configured.
    #[error("no API key configured (set GEMINI_API_KEY)")]
    MissingApiKey,
}

impl From<reqwest::Error> for GenError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GenError::Timeout
        } else {
            GenError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// Text stage: ingredients in, structured recipe fields out.
#[async_trait]
pub trait RecipeWriter: Send + Sync {
    async fn write_recipe(&self, ingredients: &[String]) -> Result<RecipeDraft, GenError>;
}

/// Image stage.  Returns `None` on any failure.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(&self, title: &str, description: &str) -> Option<String>;
}

/// Image edit.  `Ok(None)` means the model answered without an image.
#[async_trait]
pub trait ImageEditor: Send + Sync {
    async fn edit_image(&self, image: &str, instruction: &str) -> Result<Option<String>, GenError>;
}

/// Speech stage: narration text in, base64 audio payload out.  Returns
/// `None` on any failure.
#[async_trait]
pub trait SpeechGenerator: Send + Sync {
    async fn synthesize(&self, text: &str) -> Option<String>;
}
