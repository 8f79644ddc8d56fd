//! Route command handler.

use clap::Args;
use droit_core::{config::AppConfig, AppResult};
use droit_knowledge::{build_catalog, build_llm_client, build_router};

/// Show how a question would be routed
#[derive(Args, Debug)]
pub struct RouteCommand {
    /// The question (French)
    pub query: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl RouteCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing route command");
        config.validate()?;

        let catalog = build_catalog(config)?;
        let client = build_llm_client(config)?;
        let router = build_router(config, client, catalog.clone())?;

        let decision = router.route(&self.query).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&decision)?);
            return Ok(());
        }

        println!("Stratégie: {}", decision.strategy);
        match decision.sector_id.as_deref() {
            Some(idcc) => {
                let name = catalog.get(idcc).map(|c| c.name.as_str()).unwrap_or("?");
                println!("Convention: {} (IDCC {})", name, idcc);
            }
            None => println!("Convention: aucune"),
        }
        println!("Justification: {}", decision.confidence_rationale);

        Ok(())
    }
}
