//! Command handlers for the docqa CLI.

pub mod ask;
pub mod delete;
pub mod health;
pub mod list;
pub mod stats;
pub mod upload;

pub use ask::AskCommand;
pub use delete::DeleteCommand;
pub use health::HealthCommand;
pub use list::ListCommand;
pub use stats::StatsCommand;
pub use upload::UploadCommand;

use docqa_core::config::ProviderConfig;
use docqa_core::{AppConfig, AppResult};
use docqa_knowledge::{load_config, KnowledgeService};
use docqa_llm::{create_client, ClientOptions};
use serde::Serialize;

/// Open the corpus under the workspace's data directory with the configured backend.
pub(crate) async fn open_service(config: &AppConfig) -> AppResult<KnowledgeService> {
    config.ensure_data_dir()?;
    let data_dir = config.data_dir();
    let knowledge = load_config(&data_dir)?;

    let options = ClientOptions {
        endpoint: config.resolve_endpoint(&config.provider),
        api_key: config.resolve_api_key(&config.provider),
        timeout_secs: config
            .resolve_timeout(&config.provider)
            .or(Some(knowledge.synthesis.timeout_secs)),
        max_sentences: match config.get_provider_config(&config.provider) {
            Some(ProviderConfig::Extractive { max_sentences }) => *max_sentences,
            _ => None,
        },
    };
    let llm = create_client(&config.provider, &options)?;

    KnowledgeService::open(&data_dir, knowledge, llm, config.model.clone()).await
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
