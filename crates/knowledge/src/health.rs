//! Component health probing and scheduled reporting.

use crate::store::DocumentStore;
use chrono::{DateTime, Utc};
use docqa_core::AppError;
use docqa_llm::LlmClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

/// Health of one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ComponentStatus {
    Healthy,
    Unhealthy { reason: String },
}

impl ComponentStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    fn unhealthy(reason: impl Into<String>) -> Self {
        Self::Unhealthy {
            reason: reason.into(),
        }
    }
}

/// Aggregate status: healthy only when every component is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Components {
    pub database: ComponentStatus,
    pub llm: ComponentStatus,
}

/// Point-in-time health of the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: OverallStatus,
    pub components: Components,
    pub timestamp: DateTime<Utc>,
}

/// Probes the document store and the language-model backend.
pub struct HealthMonitor {
    store: Arc<DocumentStore>,
    llm: Arc<dyn LlmClient>,
    probe_timeout: Duration,
}

impl HealthMonitor {
    pub fn new(store: Arc<DocumentStore>, llm: Arc<dyn LlmClient>, probe_timeout: Duration) -> Self {
        Self {
            store,
            llm,
            probe_timeout,
        }
    }

    /// Run both probes concurrently; never fails.
    pub async fn check(&self) -> HealthReport {
        let (database, llm) = tokio::join!(self.probe_database(), self.probe_llm());

        let status = if database.is_healthy() && llm.is_healthy() {
            OverallStatus::Healthy
        } else {
            OverallStatus::Degraded
        };

        if status == OverallStatus::Degraded {
            tracing::warn!(?database, ?llm, "Health check degraded");
        } else {
            tracing::debug!("Health check passed");
        }

        HealthReport {
            status,
            components: Components { database, llm },
            timestamp: Utc::now(),
        }
    }

    async fn probe_database(&self) -> ComponentStatus {
        let store = Arc::clone(&self.store);
        let probe = tokio::task::spawn_blocking(move || store.ping());

        match tokio::time::timeout(self.probe_timeout, probe).await {
            Ok(Ok(Ok(()))) => ComponentStatus::Healthy,
            Ok(Ok(Err(e))) => ComponentStatus::unhealthy(e.to_string()),
            Ok(Err(e)) => ComponentStatus::unhealthy(format!("Database probe failed: {}", e)),
            Err(_) => ComponentStatus::unhealthy(format!(
                "Database probe timed out after {}ms",
                self.probe_timeout.as_millis()
            )),
        }
    }

    async fn probe_llm(&self) -> ComponentStatus {
        match tokio::time::timeout(self.probe_timeout, self.llm.health_check()).await {
            Ok(Ok(())) => ComponentStatus::Healthy,
            Ok(Err(AppError::BackendUnavailable { message, .. })) => {
                ComponentStatus::unhealthy(message)
            }
            Ok(Err(e)) => ComponentStatus::unhealthy(e.to_string()),
            Err(_) => ComponentStatus::unhealthy(format!(
                "{} probe timed out after {}ms",
                self.llm.provider_name(),
                self.probe_timeout.as_millis()
            )),
        }
    }
}

/// Background task running [`HealthMonitor::check`] on a fixed interval.
///
/// The latest report is published on a watch channel; observers read it
/// without triggering probes.
pub struct HealthScheduler {
    reports: watch::Receiver<Option<HealthReport>>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl HealthScheduler {
    /// Start checking immediately, then every `interval`.
    pub fn spawn(monitor: Arc<HealthMonitor>, interval: Duration) -> Self {
        let (report_tx, reports) = watch::channel(None);
        let (shutdown, mut shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        let report = monitor.check().await;
                        if report_tx.send(Some(report)).is_err() {
                            break;
                        }
                    }
                }
            }

            tracing::debug!("Health scheduler stopped");
        });

        Self {
            reports,
            shutdown: Some(shutdown),
            handle,
        }
    }

    /// A receiver that observes every published report.
    pub fn subscribe(&self) -> watch::Receiver<Option<HealthReport>> {
        self.reports.clone()
    }

    /// Most recent report, if a check has completed.
    pub fn latest(&self) -> Option<HealthReport> {
        self.reports.borrow().clone()
    }

    /// Stop the task and wait for it to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.handle).await {
            tracing::warn!("Health scheduler task ended abnormally: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::ScriptedClient;
    use docqa_core::BackendErrorKind;
    use docqa_llm::{ExtractiveClient, OllamaClient, OpenAiClient};

    fn store() -> Arc<DocumentStore> {
        Arc::new(DocumentStore::open_in_memory().unwrap())
    }

    #[tokio::test]
    async fn test_all_healthy() {
        let monitor = HealthMonitor::new(
            store(),
            Arc::new(ExtractiveClient::new()),
            Duration::from_secs(10),
        );

        let report = monitor.check().await;
        assert_eq!(report.status, OverallStatus::Healthy);
        assert!(report.components.database.is_healthy());
        assert!(report.components.llm.is_healthy());
    }

    #[tokio::test]
    async fn test_unreachable_backend_degrades() {
        let llm = OllamaClient::with_timeout("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let monitor = HealthMonitor::new(store(), Arc::new(llm), Duration::from_secs(10));

        let report = monitor.check().await;
        assert_eq!(report.status, OverallStatus::Degraded);
        assert!(report.components.database.is_healthy());
        match &report.components.llm {
            ComponentStatus::Unhealthy { reason } => assert!(!reason.is_empty()),
            other => panic!("expected unhealthy llm, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_api_key_reason() {
        let llm = OpenAiClient::new("groq", "https://api.groq.com/openai/v1", None).unwrap();
        let monitor = HealthMonitor::new(store(), Arc::new(llm), Duration::from_secs(10));

        let report = monitor.check().await;
        assert_eq!(
            report.components.llm,
            ComponentStatus::Unhealthy {
                reason: "API key not configured".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_slow_probe_times_out() {
        let llm = ScriptedClient::new(vec![]).with_delay(Duration::from_secs(5));
        let monitor = HealthMonitor::new(store(), Arc::new(llm), Duration::from_millis(100));

        let report = monitor.check().await;
        assert_eq!(report.status, OverallStatus::Degraded);
        assert!(report.components.database.is_healthy());
        assert!(matches!(
            report.components.llm,
            ComponentStatus::Unhealthy { ref reason } if reason.contains("timed out")
        ));
    }

    #[tokio::test]
    async fn test_backend_error_reason() {
        let llm = ScriptedClient::new(vec![])
            .with_health_error(BackendErrorKind::RateLimited, "slow down");
        let monitor = HealthMonitor::new(store(), Arc::new(llm), Duration::from_secs(1));

        let report = monitor.check().await;
        assert_eq!(
            report.components.llm,
            ComponentStatus::Unhealthy {
                reason: "slow down".to_string()
            }
        );
    }

    #[test]
    fn test_report_json_shape() {
        let report = HealthReport {
            status: OverallStatus::Degraded,
            components: Components {
                database: ComponentStatus::Healthy,
                llm: ComponentStatus::unhealthy("API key not configured"),
            },
            timestamp: Utc::now(),
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["components"]["database"]["status"], "healthy");
        assert_eq!(json["components"]["llm"]["status"], "unhealthy");
        assert_eq!(json["components"]["llm"]["reason"], "API key not configured");
    }

    #[tokio::test]
    async fn test_scheduler_publishes_and_stops() {
        let monitor = Arc::new(HealthMonitor::new(
            store(),
            Arc::new(ExtractiveClient::new()),
            Duration::from_secs(1),
        ));
        let scheduler = HealthScheduler::spawn(monitor, Duration::from_millis(20));
        let mut reports = scheduler.subscribe();

        tokio::time::timeout(Duration::from_secs(5), reports.changed())
            .await
            .unwrap()
            .unwrap();
        let first = reports.borrow_and_update().clone().unwrap();
        assert_eq!(first.status, OverallStatus::Healthy);

        tokio::time::timeout(Duration::from_secs(5), reports.changed())
            .await
            .unwrap()
            .unwrap();
        assert!(scheduler.latest().is_some());

        scheduler.shutdown().await;

        // Sender dropped with the task: no further reports.
        assert!(reports.changed().await.is_err());
    }
}
