//! Health command handler.

use super::{open_service, print_json};
use clap::Args;
use docqa_core::AppConfig;
use docqa_knowledge::{ComponentStatus, HealthReport, OverallStatus};
use std::time::Duration;

/// Check the store and language-model backend
#[derive(Args, Debug)]
pub struct HealthCommand {
    /// Keep checking until interrupted, every SECS seconds (default from
    /// the knowledge config)
    #[arg(long, value_name = "SECS", num_args = 0..=1)]
    pub watch: Option<Option<u64>>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl HealthCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::info!("Executing health command");

        let service = open_service(config).await?;

        let Some(secs) = self.watch else {
            let report = service.health().await;
            return self.print(&report);
        };
        let secs = secs.unwrap_or(service.config().health.interval_secs);
        if secs == 0 {
            anyhow::bail!("--watch interval must be at least one second");
        }

        let scheduler = service.health_scheduler(Duration::from_secs(secs));
        let mut reports = scheduler.subscribe();

        loop {
            tokio::select! {
                changed = reports.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let report = reports.borrow_and_update().clone();
                    if let Some(report) = report {
                        self.print(&report)?;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::debug!("Interrupted, stopping health watch");
                    break;
                }
            }
        }

        scheduler.shutdown().await;
        Ok(())
    }

    fn print(&self, report: &HealthReport) -> anyhow::Result<()> {
        if self.json {
            return print_json(report);
        }
        print!("{}", render(report));
        Ok(())
    }
}

fn render(report: &HealthReport) -> String {
    let status = match report.status {
        OverallStatus::Healthy => "healthy",
        OverallStatus::Degraded => "degraded",
    };
    format!(
        "{} {}\n  database: {}\n  llm:      {}\n",
        report.timestamp.format("%Y-%m-%d %H:%M:%S"),
        status,
        component(&report.components.database),
        component(&report.components.llm),
    )
}

fn component(status: &ComponentStatus) -> String {
    match status {
        ComponentStatus::Healthy => "healthy".to_string(),
        ComponentStatus::Unhealthy { reason } => format!("unhealthy ({})", reason),
    }
}
