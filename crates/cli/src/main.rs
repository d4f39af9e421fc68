//! docqa CLI
//!
//! Main entry point for the docqa command-line tool.
//! Upload plain-text documents and ask questions answered with cited passages.

mod commands;

use clap::{Parser, Subcommand};
use commands::{
    AskCommand, DeleteCommand, HealthCommand, ListCommand, StatsCommand, UploadCommand,
};
use docqa_core::{config::AppConfig, logging};
use std::path::PathBuf;

/// docqa - question answering over your own documents
#[derive(Parser, Debug)]
#[command(name = "docqa")]
#[command(about = "Question answering over your documents, with cited sources", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "DOCQA_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "DOCQA_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Language-model provider (groq, openai, ollama, extractive)
    #[arg(short, long, global = true, env = "DOCQA_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "DOCQA_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload .txt documents into the corpus
    Upload(UploadCommand),

    /// List uploaded documents
    List(ListCommand),

    /// Delete a document
    Delete(DeleteCommand),

    /// Ask a question about the corpus
    Ask(AskCommand),

    /// Report component health
    Health(HealthCommand),

    /// Show corpus statistics
    Stats(StatsCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    let config = AppConfig::load_from(cli.workspace.clone(), cli.config.clone())?.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.log_json,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color, config.log_json)?;

    tracing::info!("docqa starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    config.validate()?;

    let command_name = match &cli.command {
        Commands::Upload(_) => "upload",
        Commands::List(_) => "list",
        Commands::Delete(_) => "delete",
        Commands::Ask(_) => "ask",
        Commands::Health(_) => "health",
        Commands::Stats(_) => "stats",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Upload(cmd) => cmd.execute(&config).await,
        Commands::List(cmd) => cmd.execute(&config).await,
        Commands::Delete(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Health(cmd) => cmd.execute(&config).await,
        Commands::Stats(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {:#}", e),
    }

    result
}
