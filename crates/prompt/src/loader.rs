//! Prompt loader for YAML prompt definitions.

use crate::types::PromptDefinition;
use docqa_core::{AppError, AppResult};
use std::path::Path;

/// Identifier of the built-in grounded answer prompt.
pub const DEFAULT_PROMPT_ID: &str = "answer.grounded";

const DEFAULT_SYSTEM: &str = "You are a helpful assistant that answers questions based on the \
provided context. If the context doesn't contain enough information to answer the question, \
say so.";

const DEFAULT_TEMPLATE: &str = "Context:\n\
{{#each sources}}[From {{filename}}, section {{chunk_index}}]:\n{{text}}\n\n{{/each}}\
Question: {{question}}\n\nAnswer based on the context above:";

/// The built-in grounded answer prompt.
pub fn default_prompt() -> PromptDefinition {
    PromptDefinition {
        id: DEFAULT_PROMPT_ID.to_string(),
        title: "Grounded answer".to_string(),
        api_version: "1.0".to_string(),
        created_by: "docqa".to_string(),
        system: Some(DEFAULT_SYSTEM.to_string()),
        template: DEFAULT_TEMPLATE.to_string(),
    }
}

/// Load a prompt definition by ID from the data directory.
///
/// Looks for `<data_dir>/prompts/<id>.yml`. When that file does not exist and
/// `prompt_id` is [`DEFAULT_PROMPT_ID`], the built-in prompt is returned, so a
/// fresh workspace needs no prompt files.
///
/// # Example
/// ```no_run
/// use docqa_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new(".docqa"), "answer.grounded")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(data_dir: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = data_dir.join("prompts").join(format!("{}.yml", prompt_id));

    tracing::debug!("Loading prompt from: {:?}", prompt_file);

    if !prompt_file.exists() {
        if prompt_id == DEFAULT_PROMPT_ID {
            tracing::debug!("Using built-in prompt {}", DEFAULT_PROMPT_ID);
            return Ok(default_prompt());
        }
        return Err(AppError::Prompt(format!(
            "Prompt file not found: {:?}",
            prompt_file
        )));
    }

    let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to read prompt file {:?}: {}",
            prompt_file, e
        ))
    })?;

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to parse prompt YAML {:?}: {}",
            prompt_file, e
        ))
    })?;

    validate_prompt(&definition)?;

    tracing::info!("Loaded prompt: {} ({})", definition.id, definition.title);

    Ok(definition)
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if def.template.is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    if !def.template.contains("{{question}}") {
        return Err(AppError::Prompt(format!(
            "Prompt {} never renders {{{{question}}}}",
            def.id
        )));
    }

    Ok(())
}
