//! Ask command handler.

use super::{open_service, print_json};
use clap::Args;
use docqa_core::AppConfig;
use docqa_knowledge::Answer;

/// Ask a question about the uploaded documents
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Question: {}", self.question);

        let service = open_service(config).await?;
        let answer = service.ask(&self.question).await?;

        if self.json {
            print_json(&answer)?;
        } else {
            print!("{}", render(&answer));
        }
        Ok(())
    }
}

fn render(answer: &Answer) -> String {
    let mut out = format!("{}\n", answer.answer);
    if !answer.sources.is_empty() {
        out.push_str("\nSources:\n");
        for (i, source) in answer.sources.iter().enumerate() {
            out.push_str(&format!(
                "  [{}] {}, section {} (relevance {:.2})\n",
                i + 1,
                source.filename,
                source.chunk_index,
                source.relevance
            ));
        }
    }
    out
}
