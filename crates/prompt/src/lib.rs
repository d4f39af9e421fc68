//! Grounded prompt system for docqa.
//!
//! This crate provides:
//! - YAML-based prompt definitions, with a built-in grounded answer prompt
//! - Handlebars rendering of the question plus labelled source passages

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use loader::{default_prompt, load_prompt, DEFAULT_PROMPT_ID};
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition, PromptInput, PromptSource};
