//! Prompt templates for the generative stages.
//!
//! [`PromptBuilder`] produces the recipe prompt (plus its system
//! instruction), the dish-photo prompt and the image-edit instruction.
//! Spanish (`Language::Es`) and English (`Language::En`) have dedicated
//! wording.

use crate::config::Language;

// ---------------------------------------------------------------------------
// System instructions
// ---------------------------------------------------------------------------

const SYSTEM_INSTRUCTION_ES: &str =
    "Eres un experto en nutrición TCM. Tu objetivo es sanar a través de la comida.";

const SYSTEM_INSTRUCTION_EN: &str =
    "You are an expert in TCM nutrition. Your goal is to heal through food.";

// ---------------------------------------------------------------------------
// PromptBuilder
// ---------------------------------------------------------------------------

/// Builds prompts for every generative stage.
///
/// # Example
/// ```rust
/// use tcm_kitchen::config::Language;
/// use tcm_kitchen::genai::PromptBuilder;
///
/// let builder = PromptBuilder::new(Language::En);
/// let prompt = builder.recipe_prompt(&["ginger".into(), "rice".into()]);
/// assert!(prompt.contains("ginger, rice"));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PromptBuilder {
    language: Language,
}

impl PromptBuilder {
    pub fn new(language: Language) -> Self {
        Self { language }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn system_instruction(&self) -> &'static str {
        match self.language {
            Language::Es => SYSTEM_INSTRUCTION_ES,
            Language::En => SYSTEM_INSTRUCTION_EN,
        }
    }

    /// Recipe request for the given ingredients.  The model is asked for
    /// JSON only; the response schema is attached by the client.
    pub fn recipe_prompt(&self, ingredients: &[String]) -> String {
        let list = ingredients.join(", ");
        match self.language {
            Language::Es => format!(
                "Eres un experto maestro de cocina y practicante de Medicina Tradicional China.\n\
                 Crea una receta saludable y equilibrada utilizando principalmente estos ingredientes: {list}.\n\
                 Puedes añadir condimentos básicos o complementos comunes si es necesario.\n\
                 Explica los beneficios energéticos (Qi, Yin/Yang, propiedades térmicas de los alimentos).\n\
                 Responde SOLO en JSON válido."
            ),
            Language::En => format!(
                "You are a master chef and practitioner of Traditional Chinese Medicine.\n\
                 Create a healthy, balanced recipe using mainly these ingredients: {list}.\n\
                 You may add basic seasonings or common extras if needed.\n\
                 Explain the energetic benefits (Qi, Yin/Yang, thermal properties of the food).\n\
                 Reply ONLY with valid JSON."
            ),
        }
    }

    /// Editorial food-photo prompt for the dish.
    pub fn image_prompt(&self, title: &str, description: &str) -> String {
        match self.language {
            Language::Es => format!(
                "Fotografía gastronómica profesional, alta resolución, estilo editorial de: {title}. \
                 {description}. Iluminación natural, estética minimalista y elegante."
            ),
            Language::En => format!(
                "Professional food photography, high resolution, editorial style of: {title}. \
                 {description}. Natural lighting, minimalist and elegant aesthetic."
            ),
        }
    }

    /// Text part sent next to the image being edited.
    pub fn edit_prompt(&self, instruction: &str) -> String {
        match self.language {
            Language::Es => format!("Edita esta imagen: {instruction}"),
            Language::En => format!("Edit this image: {instruction}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
