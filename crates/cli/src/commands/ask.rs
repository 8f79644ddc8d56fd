//! Ask command handler.
//!
//! Runs the full pipeline: routing, retrieval and cited synthesis.

use clap::Args;
use droit_core::{config::AppConfig, AppResult};
use droit_knowledge::{build_pipeline, AnswerReport};

/// Answer a question with cited sources
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question (French)
    pub query: String,

    /// Passages kept after merging (K)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Passages handed to the answer model (N)
    #[arg(long)]
    pub passages: Option<usize>,

    /// Also print every retrieved passage
    #[arg(long)]
    pub show_passages: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let mut config = config.clone();
        if let Some(top_k) = self.top_k {
            config.retrieval.top_k = top_k;
        }
        if let Some(passages) = self.passages {
            config.synthesis.max_passages = passages;
        }
        config.validate()?;

        let pipeline = build_pipeline(&config).await?;
        let report = pipeline.answer_query(&self.query).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&report, self.show_passages);
        }

        Ok(())
    }
}

fn print_report(report: &AnswerReport, show_passages: bool) {
    println!("{}", report.answer);
    println!();
    println!("Confiance: {:.2}", report.confidence);

    match report.sector_id {
        Some(ref idcc) => println!("Routage: {} (IDCC {})", report.routing_strategy, idcc),
        None => println!("Routage: {}", report.routing_strategy),
    }

    if !report.cited_passages.is_empty() {
        println!();
        println!("Sources:");
        for cited in &report.cited_passages {
            println!("  [{}] {}", cited.index, cited.citation);
            if let Some(ref url) = cited.url {
                println!("      {}", url);
            }
        }
    }

    for degradation in &report.degradations {
        eprintln!("Avertissement: {} ({})", degradation.reason, degradation.detail);
    }

    if show_passages {
        println!();
        println!("Passages retrouvés ({}):", report.all_retrieved_passages.len());
        for (i, passage) in report.all_retrieved_passages.iter().enumerate() {
            println!(
                "  {}. [{:.3}] {}",
                i + 1,
                passage.similarity_score,
                droit_knowledge::rag::format_citation(passage)
            );
        }
    }
}
