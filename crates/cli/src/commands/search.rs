//! Search command handler.
//!
//! Queries one collection without routing or synthesis.

use clap::Args;
use droit_core::{config::AppConfig, AppError, AppResult};
use droit_knowledge::rag::format_citation;
use droit_knowledge::{build_catalog, build_retriever, CollectionKind};

/// Search one collection directly
#[derive(Args, Debug)]
pub struct SearchCommand {
    /// Search text
    pub query: String,

    /// Collection to search (general, sector)
    #[arg(long, default_value = "general")]
    pub collection: String,

    /// Restrict the sector collection to one convention
    #[arg(long)]
    pub idcc: Option<String>,

    /// Number of passages to return
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing search command on '{}'", self.collection);

        let kind = CollectionKind::parse(&self.collection).ok_or_else(|| {
            AppError::InvalidInput(format!(
                "Unknown collection '{}'. Use general or sector",
                self.collection
            ))
        })?;

        let catalog = build_catalog(config)?;
        if let Some(ref idcc) = self.idcc {
            if kind == CollectionKind::General {
                tracing::warn!("--idcc only applies to the sector collection, ignoring");
            } else if !catalog.contains(idcc) {
                tracing::warn!("IDCC {} is not in the convention catalog", idcc);
            }
        }

        let retriever = build_retriever(config, catalog).await?;
        let top_k = self.top_k.unwrap_or(retriever.settings().top_k);
        let passages = retriever
            .search_collection(kind, &self.query, self.idcc.as_deref(), top_k)
            .await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&passages)?);
            return Ok(());
        }

        if passages.is_empty() {
            println!("Aucun passage trouvé.");
            return Ok(());
        }

        for (i, passage) in passages.iter().enumerate() {
            println!(
                "{}. [{:.3}] {}",
                i + 1,
                passage.similarity_score,
                format_citation(passage)
            );
            if let Some(path) = passage.metadata.hierarchy_path() {
                println!("   {}", path);
            }
            println!("   {}", droit_knowledge::rag::types::truncate_snippet(&passage.text, 200));
        }

        Ok(())
    }
}
