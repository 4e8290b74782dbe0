use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::core::error::FetchError;
use crate::core::snapshot::NamedEvent;
use crate::core::time::{Date, Duration};

use super::validity::ValidityRule;

/// Anything that can produce the raw document of one dataset. Implementors
/// are remote API endpoints in production and counting stubs in tests.
pub trait DataSource: Send + Sync {
    fn fetch(&self) -> BoxFuture<'_, Result<Value, FetchError>>;
}

pub type Normalizer = fn(Value) -> Result<Value, FetchError>;
pub type ReferenceDateExtractor = fn(&Value) -> Option<Date>;
pub type EventExtractor = fn(&Value) -> Vec<NamedEvent>;

fn default_fetch_timeout() -> Duration {
    Duration::seconds(30)
}

/// Everything the refresh orchestrator needs to know about one dataset:
/// where its data comes from, when a stored copy stops being good enough,
/// which call budget a fetch draws on, and how the raw payload is shaped
/// before persisting.
#[derive(Clone)]
pub struct DatasetDescriptor {
    pub key: String,
    pub rule: ValidityRule,
    pub source: Arc<dyn DataSource>,
    pub quota_plan: Option<String>,
    pub fetch_timeout: Duration,
    pub normalize: Option<Normalizer>,
    pub reference_date: Option<ReferenceDateExtractor>,
    pub events: Option<EventExtractor>,
}

impl DatasetDescriptor {
    pub fn new(key: impl Into<String>, rule: ValidityRule, source: Arc<dyn DataSource>) -> Self {
        Self {
            key: key.into(),
            rule,
            source,
            quota_plan: None,
            fetch_timeout: default_fetch_timeout(),
            normalize: None,
            reference_date: None,
            events: None,
        }
    }

    pub fn with_quota_plan(mut self, plan: impl Into<String>) -> Self {
        self.quota_plan = Some(plan.into());
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_normalizer(mut self, normalize: Normalizer) -> Self {
        self.normalize = Some(normalize);
        self
    }

    pub fn with_reference_date(mut self, extract: ReferenceDateExtractor) -> Self {
        self.reference_date = Some(extract);
        self
    }

    pub fn with_events(mut self, extract: EventExtractor) -> Self {
        self.events = Some(extract);
        self
    }
}

impl std::fmt::Debug for DatasetDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetDescriptor")
            .field("key", &self.key)
            .field("rule", &self.rule)
            .field("quota_plan", &self.quota_plan)
            .field("fetch_timeout", &self.fetch_timeout)
            .finish_non_exhaustive()
    }
}
