//! Conventions command handler.

use clap::Args;
use droit_core::{config::AppConfig, AppResult};
use droit_knowledge::build_catalog;

/// List the collective agreements known to the router
#[derive(Args, Debug)]
pub struct ConventionsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ConventionsCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let catalog = build_catalog(config)?;

        if self.json {
            let entries: Vec<_> = catalog.iter().collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
            return Ok(());
        }

        for convention in catalog.iter() {
            println!("IDCC {:>5}  {}", convention.idcc, convention.name);
            println!("            {}", convention.keywords.join(", "));
        }

        Ok(())
    }
}
