use serde_json::Value;

use crate::core::error::{FetchError, RefreshError};
use crate::core::snapshot::Snapshot;
use crate::core::time::DateTime;

use super::dataset::DatasetDescriptor;
use super::quota::QuotaLedger;
use super::store::SnapshotStore;
use super::validity::{Freshness, advance_events};

/// Serves dataset snapshots, refreshing them only when their validity rule
/// says the stored copy is no longer good enough. A failed refresh degrades
/// to the stale snapshot instead of failing the caller, as long as one
/// exists.
#[derive(Clone)]
pub struct RefreshOrchestrator {
    store: SnapshotStore,
    ledger: QuotaLedger,
}

impl RefreshOrchestrator {
    pub fn new(store: SnapshotStore, ledger: QuotaLedger) -> Self {
        Self { store, ledger }
    }

    pub async fn ensure_fresh(&self, dataset: &DatasetDescriptor) -> Result<Snapshot, RefreshError> {
        let now = DateTime::now();
        let stored = self.store.get(&dataset.key).await;

        if let Some(snapshot) = &stored
            && dataset.rule.evaluate(snapshot, now) == Freshness::Fresh
        {
            tracing::debug!(key = %dataset.key, "Snapshot still valid, skipping fetch");
            return Ok(snapshot.clone());
        }

        match self.fetch(dataset).await {
            Ok(payload) => match self.persist(dataset, payload, now).await {
                Ok(snapshot) => {
                    self.record_quota_use(dataset).await;
                    Ok(snapshot)
                }
                Err(e) => {
                    tracing::warn!(key = %dataset.key, error = %e, "Refresh could not be persisted");
                    self.fall_back(dataset, stored, e.to_string())
                }
            },
            Err(e) => {
                tracing::warn!(key = %dataset.key, error = %e, "Refresh failed");
                self.fall_back(dataset, stored, e.to_string())
            }
        }
    }

    async fn fetch(&self, dataset: &DatasetDescriptor) -> Result<Value, FetchError> {
        match tokio::time::timeout(dataset.fetch_timeout.to_std(), dataset.source.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout),
        }
    }

    async fn persist(
        &self,
        dataset: &DatasetDescriptor,
        payload: Value,
        now: DateTime,
    ) -> anyhow::Result<Snapshot> {
        let payload = match dataset.normalize {
            Some(normalize) => normalize(payload)?,
            None => payload,
        };

        let mut snapshot = Snapshot::from_api(payload, now);
        if let Some(extract) = dataset.reference_date {
            snapshot.reference_date = extract(&snapshot.payload);
        }
        if let Some(extract) = dataset.events {
            snapshot.events = advance_events(&extract(&snapshot.payload), now);
        }

        self.store.put(&dataset.key, &snapshot).await?;
        Ok(snapshot)
    }

    async fn record_quota_use(&self, dataset: &DatasetDescriptor) {
        let Some(plan) = &dataset.quota_plan else {
            return;
        };
        if let Err(e) = self.ledger.consume(plan).await {
            tracing::error!(key = %dataset.key, plan = %plan, error = %e, "Quota ledger update failed");
        }
    }

    /// Degraded mode: hand out the last good snapshot re-tagged as served
    /// from cache. The stored file keeps its original source tag.
    fn fall_back(
        &self,
        dataset: &DatasetDescriptor,
        stored: Option<Snapshot>,
        reason: String,
    ) -> Result<Snapshot, RefreshError> {
        match stored {
            Some(snapshot) => {
                tracing::warn!(key = %dataset.key, "Serving stale snapshot from cache");
                Ok(snapshot.into_cached())
            }
            None => Err(RefreshError::Unavailable {
                key: dataset.key.clone(),
                reason,
            }),
        }
    }
}
