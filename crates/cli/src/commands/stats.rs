//! Stats command handler.

use super::{open_service, print_json};
use clap::Args;
use docqa_core::AppConfig;

/// Show corpus statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::info!("Executing stats command");

        let service = open_service(config).await?;
        let stats = service.stats()?;

        if self.json {
            return print_json(&stats);
        }

        println!("Documents:   {}", stats.documents_count);
        println!("Chunks:      {}", stats.chunks_count);
        println!("Indexed:     {}", stats.indexed_chunks);
        println!("Store size:  {} bytes", stats.db_size_bytes);
        println!(
            "Embeddings:  {}",
            stats.embedding_fingerprint.as_deref().unwrap_or("none")
        );
        if let Some(at) = stats.last_upload_at {
            println!("Last upload: {}", at.format("%Y-%m-%d %H:%M:%S"));
        }
        Ok(())
    }
}
