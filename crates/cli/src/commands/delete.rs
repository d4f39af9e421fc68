//! Delete command handler.

use super::{open_service, print_json};
use clap::Args;
use docqa_core::AppConfig;

/// Delete a document and its passages
#[derive(Args, Debug)]
pub struct DeleteCommand {
    /// Document id as shown by `docqa list`
    pub id: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl DeleteCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::info!("Executing delete command");

        let service = open_service(config).await?;
        service.delete(&self.id)?;

        if self.json {
            print_json(&serde_json::json!({ "deleted": self.id }))
        } else {
            println!("Deleted {}", self.id);
            Ok(())
        }
    }
}
