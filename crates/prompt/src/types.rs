//! Prompt types for docqa.
//!
//! This module defines the domain entities for the prompt system.

use serde::{Deserialize, Serialize};

/// A prompt definition loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Creator identifier
    #[serde(rename = "createdBy", default)]
    pub created_by: String,

    /// System message sent ahead of the rendered template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Template string with Handlebars syntax.
    ///
    /// Rendered against a [`PromptInput`]: `{{question}}` and a `sources`
    /// list whose items expose `filename`, `chunk_index` and `text`.
    pub template: String,
}

/// One retrieved passage handed to the template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptSource {
    pub filename: String,
    pub chunk_index: usize,
    pub text: String,
}

/// Template variables for a grounded prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptInput {
    pub question: String,
    pub sources: Vec<PromptSource>,
}

/// A fully built prompt ready for LLM execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPrompt {
    /// System message (optional)
    pub system: Option<String>,

    /// User message (required)
    pub user: String,

    /// Metadata about the built prompt
    pub metadata: BuiltPromptMetadata,
}

/// Metadata about a built prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPromptMetadata {
    /// Source prompt ID
    #[serde(rename = "sourcePromptId")]
    pub source_prompt_id: String,

    /// Number of passages rendered into the prompt
    #[serde(rename = "sourceCount")]
    pub source_count: usize,
}

impl BuiltPrompt {
    /// Create a new built prompt.
    pub fn new(
        system: Option<String>,
        user: String,
        source_prompt_id: String,
        source_count: usize,
    ) -> Self {
        Self {
            system,
            user,
            metadata: BuiltPromptMetadata {
                source_prompt_id,
                source_count,
            },
        }
    }
}
