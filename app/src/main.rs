use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::cache::quota::QuotaLedger;
use crate::cache::refresh::RefreshOrchestrator;
use crate::cache::store::SnapshotStore;
use crate::runner::DatasetRunner;
use crate::settings::Settings;

mod adapter;
mod cache;
mod core;
mod runner;
mod settings;

#[tokio::main(flavor = "multi_thread")]
pub async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::new().expect("Error reading configuration");

    let store = SnapshotStore::new(&settings.storage.snapshot_dir);
    let ledger = QuotaLedger::new(&settings.storage.quota_ledger_file, Arc::new(Mutex::new(())));
    let orchestrator = RefreshOrchestrator::new(store, ledger.clone());

    let mut datasets = adapter::meteocat::datasets(&settings.meteocat).expect("Error building dataset catalogue");
    datasets.push(adapter::ephemeris::dataset(settings.observer));

    let seed_plans = settings
        .quota_plans
        .iter()
        .map(|seed| cache::quota::QuotaPlan {
            name: seed.name.clone(),
            period: seed.period.clone(),
            max_calls: seed.max_calls,
            calls_made: 0,
            calls_remaining: seed.max_calls,
        })
        .collect();
    ledger.bootstrap(seed_plans).await.expect("Error seeding quota ledger");

    match ledger.read().await {
        Ok(Some(book)) => {
            let forecast_calls_left = book.plan("Prediccio").map(|p| p.calls_remaining);
            tracing::info!(plans = book.plans.len(), forecast_calls_left, "Quota ledger loaded");
        }
        Ok(None) => tracing::info!("No quota ledger yet, waiting for the first quota refresh"),
        Err(e) => tracing::warn!(error = %e, "Quota ledger unreadable"),
    }

    let cancel = CancellationToken::new();
    let runner = DatasetRunner::new(orchestrator, ledger, datasets, &settings.refresh);

    tracing::info!("Starting dataset poll loops");
    let mut poll_loops = tokio::spawn(runner.run(cancel.clone()));

    tokio::select!(
        _ = &mut poll_loops => {},
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown requested");
            cancel.cancel();
            let _ = poll_loops.await;
        },
    );
}
