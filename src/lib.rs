//! TCM kitchen: traditional Chinese medicine recipes from a list of
//! ingredients, with a generated dish image, natural-language image edits,
//! spoken narration and a local favorites collection.
//!
//! # Modules
//!
//! * [`recipe`]: recipe model, collection and JSON favorites store.
//! * [`genai`]: generative collaborators and the Gemini client.
//! * [`pipeline`]: generation state machine and orchestrator.
//! * [`audio`]: narration decode, playback and session.
//! * [`config`]: TOML settings and platform paths.
//! * [`app`]: terminal front end.

pub mod app;
pub mod audio;
pub mod config;
pub mod genai;
pub mod pipeline;
pub mod recipe;
