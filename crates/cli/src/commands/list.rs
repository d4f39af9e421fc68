//! List command handler.

use super::{open_service, print_json};
use clap::Args;
use docqa_core::AppConfig;

/// List uploaded documents
#[derive(Args, Debug)]
pub struct ListCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ListCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::info!("Executing list command");

        let service = open_service(config).await?;
        let documents = service.list()?;

        if self.json {
            return print_json(&documents);
        }

        if documents.is_empty() {
            println!("No documents uploaded");
            return Ok(());
        }

        for doc in &documents {
            println!(
                "{}  {}  {} chunks  {}",
                doc.id,
                doc.uploaded_at.format("%Y-%m-%d %H:%M:%S"),
                doc.chunk_count,
                doc.filename
            );
        }
        Ok(())
    }
}
