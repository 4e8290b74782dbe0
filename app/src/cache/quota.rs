use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaPlan {
    pub name: String,
    #[serde(default)]
    pub period: String,
    pub max_calls: u32,
    pub calls_made: u32,
    pub calls_remaining: u32,
}

impl QuotaPlan {
    fn recompute_remaining(&mut self) {
        self.calls_remaining = self.max_calls.saturating_sub(self.calls_made);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuotaBook {
    pub plans: Vec<QuotaPlan>,
}

impl QuotaBook {
    pub fn plan(&self, name: &str) -> Option<&QuotaPlan> {
        self.plans.iter().find(|p| p.name == name)
    }
}

/// Tracks per-plan API call budgets in a single JSON file. All mutation goes
/// through one shared async lock so concurrent refresh tasks never interleave
/// read-modify-write cycles. The lock is passed in so tests can share or
/// isolate it as needed.
#[derive(Clone)]
pub struct QuotaLedger {
    path: PathBuf,
    guard: Arc<Mutex<()>>,
}

impl QuotaLedger {
    pub fn new(path: impl Into<PathBuf>, guard: Arc<Mutex<()>>) -> Self {
        Self { path: path.into(), guard }
    }

    /// Records one API call against the named plan. An unknown plan or a
    /// missing ledger file is logged and ignored, never an error: quota
    /// accounting must not break data refreshes.
    pub async fn consume(&self, plan_name: &str) -> anyhow::Result<()> {
        let _guard = self.guard.lock().await;

        let mut book = match self.load().await? {
            Some(book) => book,
            None => {
                tracing::warn!(plan = plan_name, "No quota ledger yet, call not recorded");
                return Ok(());
            }
        };

        let Some(plan) = book.plans.iter_mut().find(|p| p.name == plan_name) else {
            tracing::warn!(plan = plan_name, "Unknown quota plan, call not recorded");
            return Ok(());
        };

        plan.calls_made += 1;
        plan.recompute_remaining();
        tracing::debug!(
            plan = plan_name,
            made = plan.calls_made,
            remaining = plan.calls_remaining,
            "Quota consumed"
        );

        self.save(&book).await
    }

    /// Replaces the ledger with the plans of a freshly fetched quota
    /// document, keeping the derived remaining counts consistent.
    pub async fn sync_plans(&self, mut plans: Vec<QuotaPlan>) -> anyhow::Result<()> {
        let _guard = self.guard.lock().await;

        for plan in plans.iter_mut() {
            plan.recompute_remaining();
        }

        self.save(&QuotaBook { plans }).await
    }

    /// Seeds the ledger from configured plans when none exists yet. An
    /// existing ledger always wins, it carries real consumption history.
    pub async fn bootstrap(&self, mut plans: Vec<QuotaPlan>) -> anyhow::Result<()> {
        let _guard = self.guard.lock().await;

        if self.load().await?.is_some() {
            return Ok(());
        }

        for plan in plans.iter_mut() {
            plan.recompute_remaining();
        }

        self.save(&QuotaBook { plans }).await
    }

    pub async fn read(&self) -> anyhow::Result<Option<QuotaBook>> {
        let _guard = self.guard.lock().await;
        self.load().await
    }

    async fn load(&self) -> anyhow::Result<Option<QuotaBook>> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Error reading quota ledger {}", self.path.display()));
            }
        };

        match serde_json::from_slice(&raw) {
            Ok(book) => Ok(Some(book)),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Quota ledger corrupt, ignoring");
                Ok(None)
            }
        }
    }

    async fn save(&self, book: &QuotaBook) -> anyhow::Result<()> {
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Error creating ledger directory {}", dir.display()))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(book).context("Error serializing quota ledger")?;
        tokio::fs::write(&tmp, &body)
            .await
            .with_context(|| format!("Error writing quota ledger to {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Error moving quota ledger into place at {}", self.path.display()))?;

        Ok(())
    }
}
