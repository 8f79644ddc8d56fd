//! Prompt system for the labor-law assistant.
//!
//! This crate provides structured prompt management with:
//! - YAML prompt definitions compiled into the binary
//! - Workspace overrides under `.droit/prompts/`
//! - Handlebars template rendering

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use loader::{builtin_prompt, list_prompts, load_prompt};
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition, PromptOutputSpec, PromptSource};

/// ID of the routing prompt.
pub const ROUTING_PROMPT_ID: &str = "routing.system";

/// ID of the answer synthesis prompt.
pub const SYNTHESIS_PROMPT_ID: &str = "synthesis.system";
