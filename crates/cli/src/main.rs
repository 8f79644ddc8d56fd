//! droit CLI
//!
//! Main entry point for the droit command-line tool.
//! Answers French labor-law questions from the Code du travail and the
//! collective agreements, with cited sources.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, ConventionsCommand, PromptsCommand, RouteCommand, SearchCommand};
use droit_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// droit - French labor-law questions answered with citations
#[derive(Parser, Debug)]
#[command(name = "droit")]
#[command(about = "French labor-law questions answered with citations", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "DROIT_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "DROIT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// LLM provider (openai, ollama)
    #[arg(short, long, global = true, env = "DROIT_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "DROIT_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer a question with cited sources
    Ask(AskCommand),

    /// Show how a question would be routed
    Route(RouteCommand),

    /// Search one collection directly
    Search(SearchCommand),

    /// List the collective agreements known to the router
    Conventions(ConventionsCommand),

    /// List the prompts in use
    Prompts(PromptsCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Load configuration from the chosen workspace and config file
    let config = AppConfig::load_with(cli.workspace.clone(), cli.config.clone())?;

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("droit CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Route(_) => "route",
        Commands::Search(_) => "search",
        Commands::Conventions(_) => "conventions",
        Commands::Prompts(_) => "prompts",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    // Route to command handlers
    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Route(cmd) => cmd.execute(&config).await,
        Commands::Search(cmd) => cmd.execute(&config).await,
        Commands::Conventions(cmd) => cmd.execute(&config),
        Commands::Prompts(cmd) => cmd.execute(&config),
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!(code = e.code(), "Command failed: {}", e),
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ask_with_flags() {
        let cli = Cli::try_parse_from([
            "droit",
            "ask",
            "Période d'essai pour un ingénieur informatique",
            "-k",
            "5",
            "--passages",
            "2",
            "--json",
        ])
        .unwrap();

        match cli.command {
            Commands::Ask(cmd) => {
                assert_eq!(cmd.top_k, Some(5));
                assert_eq!(cmd.passages, Some(2));
                assert!(cmd.json);
                assert!(!cmd.show_passages);
            }
            other => panic!("expected ask, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_search_defaults_to_general() {
        let cli = Cli::try_parse_from(["droit", "search", "préavis", "--idcc", "1486"]).unwrap();
        match cli.command {
            Commands::Search(cmd) => {
                assert_eq!(cmd.collection, "general");
                assert_eq!(cmd.idcc.as_deref(), Some("1486"));
            }
            other => panic!("expected search, got {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["droit", "conventions", "--verbose", "-p", "openai"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.provider.as_deref(), Some("openai"));
    }
}
