//! Prompt loader.
//!
//! Built-in definitions are compiled into the binary. A workspace can override
//! any of them by dropping `<id>.yml` into `.droit/prompts/`.

use crate::types::{PromptDefinition, PromptSource};
use droit_core::{AppError, AppResult};
use std::path::Path;

const PROMPTS_DIR: &str = ".droit/prompts";

const BUILTIN_PROMPTS: &[(&str, &str)] = &[
    (
        "routing.system",
        include_str!("../prompts/routing.system.yml"),
    ),
    (
        "synthesis.system",
        include_str!("../prompts/synthesis.system.yml"),
    ),
];

/// Parse one of the compiled-in prompt definitions.
pub fn builtin_prompt(prompt_id: &str) -> AppResult<PromptDefinition> {
    let (_, contents) = BUILTIN_PROMPTS
        .iter()
        .find(|(id, _)| *id == prompt_id)
        .ok_or_else(|| AppError::Prompt(format!("Unknown built-in prompt: {}", prompt_id)))?;

    let definition: PromptDefinition = serde_yaml::from_str(contents).map_err(|e| {
        AppError::Prompt(format!("Failed to parse built-in prompt {}: {}", prompt_id, e))
    })?;
    validate_prompt(&definition)?;
    Ok(definition)
}

/// Load a prompt definition by ID.
///
/// Looks for `.droit/prompts/<id>.yml` under `workspace_path` first and falls
/// back to the built-in definition with the same ID.
///
/// # Example
/// ```no_run
/// use droit_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (prompt, source) = load_prompt(Path::new("."), "routing.system")?;
/// println!("Loaded prompt: {} ({:?})", prompt.title, source);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(
    workspace_path: &Path,
    prompt_id: &str,
) -> AppResult<(PromptDefinition, PromptSource)> {
    let prompt_file = workspace_path
        .join(PROMPTS_DIR)
        .join(format!("{}.yml", prompt_id));

    if !prompt_file.exists() {
        tracing::debug!("No override for prompt {}, using built-in", prompt_id);
        return builtin_prompt(prompt_id).map(|def| (def, PromptSource::Builtin));
    }

    tracing::debug!("Loading prompt from: {:?}", prompt_file);

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

    if definition.id != prompt_id {
        return Err(AppError::Prompt(format!(
            "Prompt file {:?} declares id '{}', expected '{}'",
            prompt_file, definition.id, prompt_id
        )));
    }

    tracing::info!("Loaded prompt override: {} ({})", definition.id, definition.title);

    Ok((definition, PromptSource::Workspace))
}

/// List every available prompt ID with its effective source.
pub fn list_prompts(workspace_path: &Path) -> AppResult<Vec<(String, PromptSource)>> {
    let mut prompts: Vec<(String, PromptSource)> = BUILTIN_PROMPTS
        .iter()
        .map(|(id, _)| (id.to_string(), PromptSource::Builtin))
        .collect();

    let prompts_dir = workspace_path.join(PROMPTS_DIR);
    if prompts_dir.exists() {
        for entry in walkdir::WalkDir::new(&prompts_dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("yml") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match prompts.iter_mut().find(|(id, _)| id == stem) {
                Some(existing) => existing.1 = PromptSource::Workspace,
                None => prompts.push((stem.to_string(), PromptSource::Workspace)),
            }
        }
    }

    prompts.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(prompts)
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

    Ok(())
}
