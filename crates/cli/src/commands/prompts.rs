//! Prompts command handler.

use clap::Args;
use droit_core::{config::AppConfig, AppResult};
use droit_prompt::{list_prompts, PromptSource};

/// List the prompts in use
#[derive(Args, Debug)]
pub struct PromptsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl PromptsCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let prompts = list_prompts(&config.workspace)?;

        if self.json {
            let entries: Vec<_> = prompts
                .iter()
                .map(|(id, source)| serde_json::json!({ "id": id, "source": source }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
            return Ok(());
        }

        for (id, source) in &prompts {
            let origin = match source {
                PromptSource::Builtin => "built-in",
                PromptSource::Workspace => "workspace override",
            };
            println!("{:<20} {}", id, origin);
        }

        Ok(())
    }
}
