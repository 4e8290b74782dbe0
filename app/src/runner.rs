use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::cache::dataset::DatasetDescriptor;
use crate::cache::normalize;
use crate::cache::quota::QuotaLedger;
use crate::cache::refresh::RefreshOrchestrator;
use crate::core::snapshot::SnapshotSource;
use crate::core::time::DateTime;

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshSettings {
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,
}

fn default_poll_interval_seconds() -> u64 {
    300
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            poll_interval_seconds: default_poll_interval_seconds(),
        }
    }
}

/// Drives one poll loop per dataset. Each tick asks the orchestrator for a
/// fresh snapshot; the validity rules decide whether that actually hits the
/// network, so a short poll interval stays cheap.
pub struct DatasetRunner {
    orchestrator: RefreshOrchestrator,
    ledger: QuotaLedger,
    datasets: Vec<DatasetDescriptor>,
    poll_interval: std::time::Duration,
}

impl DatasetRunner {
    pub fn new(
        orchestrator: RefreshOrchestrator,
        ledger: QuotaLedger,
        datasets: Vec<DatasetDescriptor>,
        settings: &RefreshSettings,
    ) -> Self {
        Self {
            orchestrator,
            ledger,
            datasets,
            poll_interval: std::time::Duration::from_secs(settings.poll_interval_seconds),
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        let mut tasks = Vec::new();

        for dataset in self.datasets {
            let orchestrator = self.orchestrator.clone();
            let ledger = self.ledger.clone();
            let cancel = cancel.clone();
            let poll_interval = self.poll_interval;

            tasks.push(tokio::spawn(async move {
                let mut timer = tokio::time::interval(poll_interval);
                let mut last_synced_fetch: Option<DateTime> = None;

                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = timer.tick() => {
                            match orchestrator.ensure_fresh(&dataset).await {
                                Ok(snapshot) => {
                                    if dataset.key == "quotas"
                                        && snapshot.source == SnapshotSource::Api
                                        && last_synced_fetch != Some(snapshot.fetched_at)
                                    {
                                        sync_ledger(&ledger, &snapshot.payload).await;
                                        last_synced_fetch = Some(snapshot.fetched_at);
                                    }
                                }
                                Err(e) => {
                                    tracing::error!(key = %dataset.key, error = %e, "Dataset unavailable");
                                }
                            }
                        }
                    }
                }

                tracing::debug!(key = %dataset.key, "Poll loop stopped");
            }));
        }

        for task in tasks {
            let _ = task.await;
        }
    }
}

/// Mirrors a freshly fetched quota document into the ledger. Only called for
/// new fetches, so consume bookings since the last sync are not resurrected.
async fn sync_ledger(ledger: &QuotaLedger, payload: &serde_json::Value) {
    let plans = normalize::quota_plans(payload);
    if plans.is_empty() {
        tracing::warn!("Quota document carried no readable plans, ledger left as is");
        return;
    }

    if let Err(e) = ledger.sync_plans(plans).await {
        tracing::error!(error = %e, "Quota ledger sync failed");
    }
}
