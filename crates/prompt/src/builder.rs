//! Prompt builder for rendering templates with grounding context.

use crate::types::{BuiltPrompt, PromptDefinition, PromptInput};
use docqa_core::{AppError, AppResult};
use handlebars::Handlebars;

/// Build a prompt from a definition and the question plus retrieved passages.
///
/// Passage text is rendered verbatim; HTML escaping is disabled.
///
/// # Example
/// ```no_run
/// use docqa_prompt::{build_prompt, default_prompt, PromptInput, PromptSource};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let input = PromptInput {
///     question: "What color is the sky?".to_string(),
///     sources: vec![PromptSource {
///         filename: "sky.txt".to_string(),
///         chunk_index: 0,
///         text: "The sky is blue.".to_string(),
///     }],
/// };
///
/// let built = build_prompt(&default_prompt(), &input)?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(definition: &PromptDefinition, input: &PromptInput) -> AppResult<BuiltPrompt> {
    tracing::debug!(
        prompt_id = %definition.id,
        sources = input.sources.len(),
        "Building prompt"
    );

    let user = render_template(&definition.template, input)?;

    Ok(BuiltPrompt::new(
        definition.system.clone(),
        user,
        definition.id.clone(),
        input.sources.len(),
    ))
}

/// Render a Handlebars template with the prompt input.
fn render_template(template: &str, input: &PromptInput) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Disable HTML escaping for plain text
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", input)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::default_prompt;
    use crate::types::PromptSource;

    fn sky_input() -> PromptInput {
        PromptInput {
            question: "What color is the sky?".to_string(),
            sources: vec![PromptSource {
                filename: "sky.txt".to_string(),
                chunk_index: 0,
                text: "The sky is blue. Grass is green.".to_string(),
            }],
        }
    }

    #[test]
    fn test_default_prompt_layout() {
        let built = build_prompt(&default_prompt(), &sky_input()).unwrap();

        assert_eq!(
            built.user,
            "Context:\n[From sky.txt, section 0]:\nThe sky is blue. Grass is green.\n\n\
             Question: What color is the sky?\n\nAnswer based on the context above:"
        );
        assert!(built
            .system
            .as_deref()
            .unwrap()
            .contains("based on the provided context"));
        assert_eq!(built.metadata.source_count, 1);
    }

    #[test]
    fn test_sources_rendered_in_order() {
        let mut input = sky_input();
        input.sources.push(PromptSource {
            filename: "grass.txt".to_string(),
            chunk_index: 4,
            text: "Grass grows.".to_string(),
        });

        let built = build_prompt(&default_prompt(), &input).unwrap();
        let sky = built.user.find("[From sky.txt, section 0]").unwrap();
        let grass = built.user.find("[From grass.txt, section 4]").unwrap();
        assert!(sky < grass);
    }

    #[test]
    fn test_text_not_escaped() {
        let mut input = sky_input();
        input.sources[0].text = "a < b && \"c\"".to_string();
        let built = build_prompt(&default_prompt(), &input).unwrap();
        assert!(built.user.contains("a < b && \"c\""));
    }

    #[test]
    fn test_invalid_template_is_prompt_error() {
        let mut def = default_prompt();
        def.template = "{{#each sources}}unclosed".to_string();
        let err = build_prompt(&def, &sky_input()).unwrap_err();
        assert!(matches!(err, AppError::Prompt(_)));
    }
}
