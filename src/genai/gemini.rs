//! Gemini `generateContent` client implementing every generative trait.
//!
//! All connection details (`base_url`, `api_key`, model names, voice) come
//! from [`GeminiConfig`]; nothing is hardcoded here.
//!
//! Wire shape per stage:
//!
//! | Stage  | Request                                         | Response read            |
//! |--------|-------------------------------------------------|--------------------------|
//! | text   | prompt + `responseSchema` (JSON mime type)      | concatenated text parts  |
//! | image  | photo prompt                                    | first `inlineData` part  |
//! | edit   | `inlineData` image + edit instruction           | first `inlineData` part  |
//! | speech | narration + `responseModalities: ["AUDIO"]`     | first part `inlineData`  |

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use serde_json::{json, Value};

use crate::config::GeminiConfig;
use crate::genai::prompt::PromptBuilder;
use crate::genai::{GenError, ImageEditor, ImageGenerator, RecipeWriter, SpeechGenerator};
use crate::recipe::RecipeDraft;

// ---------------------------------------------------------------------------
// InlineImage
// ---------------------------------------------------------------------------

/// An image carried inline as base64, convertible to and from a data URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

impl InlineImage {
    /// `data:{mime};base64,{data}`
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Split a `data:image/<subtype>;base64,<payload>` URI.
///
/// ```
/// use tcm_kitchen::genai::parse_data_uri;
///
/// let img = parse_data_uri("data:image/png;base64,iVBORw0KGgo=").unwrap();
/// assert_eq!(img.mime_type, "image/png");
/// assert_eq!(img.data, "iVBORw0KGgo=");
/// assert!(parse_data_uri("https://example.com/dish.png").is_err());
/// ```
pub fn parse_data_uri(uri: &str) -> Result<InlineImage, GenError> {
    let invalid = || GenError::InvalidImage(truncate(uri, 48));

    let rest = uri.strip_prefix("data:").ok_or_else(invalid)?;
    let (mime_type, data) = rest.split_once(";base64,").ok_or_else(invalid)?;
    let subtype = mime_type.strip_prefix("image/").ok_or_else(invalid)?;
    if subtype.is_empty() || !subtype.chars().all(|c| c.is_ascii_lowercase()) {
        return Err(invalid());
    }
    if data.is_empty() || general_purpose::STANDARD.decode(data).is_err() {
        return Err(invalid());
    }

    Ok(InlineImage {
        mime_type: mime_type.to_string(),
        data: data.to_string(),
    })
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

fn candidate_parts(response: &Value) -> &[Value] {
    response["candidates"][0]["content"]["parts"]
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Concatenated text of the first candidate.
fn response_text(response: &Value) -> Option<String> {
    let text: String = candidate_parts(response)
        .iter()
        .filter_map(|p| p["text"].as_str())
        .collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// First inline-data part of the first candidate.
fn response_inline_data(response: &Value) -> Option<InlineImage> {
    candidate_parts(response).iter().find_map(|p| {
        let inline = p.get("inlineData")?;
        let data = inline["data"].as_str().filter(|d| !d.is_empty())?;
        let mime_type = inline["mimeType"].as_str().unwrap_or("image/png");
        Some(InlineImage {
            mime_type: mime_type.to_string(),
            data: data.to_string(),
        })
    })
}

fn recipe_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": { "type": "STRING", "description": "Creative TCM recipe name" },
            "ingredients": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "Ingredients used"
            },
            "steps": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "Detailed preparation steps"
            },
            "benefits": {
                "type": "STRING",
                "description": "Benefits according to Traditional Chinese Medicine (Qi, Yin/Yang, thermal properties)"
            }
        },
        "required": ["title", "ingredients", "steps", "benefits"]
    })
}

// ---------------------------------------------------------------------------
// GeminiClient
// ---------------------------------------------------------------------------

/// Calls `POST {base_url}/v1beta/models/{model}:generateContent`.
pub struct GeminiClient {
    client: reqwest::Client,
    config: GeminiConfig,
    prompts: PromptBuilder,
}

impl GeminiClient {
    /// Build a client from application config.
    ///
    /// The HTTP client carries the per-request timeout from
    /// `config.timeout_secs`.
    pub fn from_config(config: &GeminiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
            prompts: PromptBuilder::new(config.language),
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        )
    }

    async fn generate_content(&self, model: &str, body: Value) -> Result<Value, GenError> {
        let key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(GenError::MissingApiKey)?;

        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenError::Status {
                status: status.as_u16(),
                body: truncate(&body, 200),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| GenError::Parse(e.to_string()))
    }

    // -----------------------------------------------------------------------
    // Fallible stage calls
    // -----------------------------------------------------------------------

    async fn request_recipe(&self, ingredients: &[String]) -> Result<RecipeDraft, GenError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": self.prompts.recipe_prompt(ingredients) }] }],
            "systemInstruction": { "parts": [{ "text": self.prompts.system_instruction() }] },
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": recipe_schema()
            }
        });

        let response = self.generate_content(&self.config.text_model, body).await?;
        let text = response_text(&response).ok_or(GenError::EmptyResponse)?;
        serde_json::from_str(&text).map_err(|e| GenError::Parse(e.to_string()))
    }

    async fn request_image(&self, title: &str, description: &str) -> Result<Option<String>, GenError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": self.prompts.image_prompt(title, description) }] }]
        });

        let response = self.generate_content(&self.config.image_model, body).await?;
        Ok(response_inline_data(&response).map(|img| img.to_data_uri()))
    }

    async fn request_edit(&self, image: &str, instruction: &str) -> Result<Option<String>, GenError> {
        let source = parse_data_uri(image)?;
        let body = json!({
            "contents": [{
                "parts": [
                    { "inlineData": { "mimeType": source.mime_type, "data": source.data } },
                    { "text": self.prompts.edit_prompt(instruction) }
                ]
            }]
        });

        let response = self.generate_content(&self.config.image_model, body).await?;
        Ok(response_inline_data(&response).map(|img| img.to_data_uri()))
    }

    async fn request_speech(&self, text: &str) -> Result<Option<String>, GenError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": text }] }],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": {
                        "prebuiltVoiceConfig": { "voiceName": self.config.voice_name }
                    }
                }
            }
        });

        let response = self.generate_content(&self.config.tts_model, body).await?;
        Ok(response_inline_data(&response).map(|audio| audio.data))
    }
}

// ---------------------------------------------------------------------------
// Trait implementations
// ---------------------------------------------------------------------------

#[async_trait]
impl RecipeWriter for GeminiClient {
    async fn write_recipe(&self, ingredients: &[String]) -> Result<RecipeDraft, GenError> {
        self.request_recipe(ingredients).await.map_err(|e| {
            log::error!("gemini: recipe generation failed: {e}");
            e
        })
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    async fn generate_image(&self, title: &str, description: &str) -> Option<String> {
        match self.request_image(title, description).await {
            Ok(image) => image,
            Err(e) => {
                log::warn!("gemini: image generation failed: {e}");
                None
            }
        }
    }
}

#[async_trait]
impl ImageEditor for GeminiClient {
    async fn edit_image(&self, image: &str, instruction: &str) -> Result<Option<String>, GenError> {
        self.request_edit(image, instruction).await.map_err(|e| {
            log::error!("gemini: image edit failed: {e}");
            e
        })
    }
}

#[async_trait]
impl SpeechGenerator for GeminiClient {
    async fn synthesize(&self, text: &str) -> Option<String> {
        match self.request_speech(text).await {
            Ok(audio) => audio,
            Err(e) => {
                log::warn!("gemini: speech generation failed: {e}");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
