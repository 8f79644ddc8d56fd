//! Prompt builder for rendering templates.

use crate::types::{BuiltPrompt, PromptDefinition};
use droit_core::{AppError, AppResult};
use handlebars::Handlebars;
use serde_json::Value;

/// Build a prompt from a definition and a JSON context.
///
/// Both the system and the user templates are rendered against the same
/// context object, so a template may reference any top-level key.
///
/// # Example
/// ```no_run
/// use droit_prompt::{build_prompt, builtin_prompt};
/// use serde_json::json;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let def = builtin_prompt("synthesis.system")?;
/// let built = build_prompt(&def, &json!({"query": "Préavis ?", "context": "", "source_count": 0}))?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(definition: &PromptDefinition, context: &Value) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let system = definition
        .system
        .as_deref()
        .map(|template| render_template(template, context))
        .transpose()?
        .map(|s| s.trim_end().to_string());

    let user = render_template(&definition.template, context)?
        .trim_end()
        .to_string();

    let resolved_variables = context
        .as_object()
        .map(|obj| obj.keys().cloned().collect())
        .unwrap_or_default();

    Ok(BuiltPrompt::new(
        system,
        user,
        definition.id.clone(),
        resolved_variables,
    ))
}

/// Render a Handlebars template against a JSON context.
fn render_template(template: &str, context: &Value) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Plain text output, not HTML
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", context)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}
