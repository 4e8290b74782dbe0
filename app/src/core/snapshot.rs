use serde::{Deserialize, Serialize};

use super::time::{Date, DateTime};

/// Where the data handed to a consumer came from. `Cache` marks degraded
/// mode: the refresh failed and the last persisted document was returned
/// instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotSource {
    Api,
    Cache,
}

/// A named point in time embedded in a snapshot, e.g. today's sunrise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedEvent {
    pub name: String,
    pub at: DateTime,
}

impl NamedEvent {
    pub fn new(name: impl Into<String>, at: DateTime) -> Self {
        Self { name: name.into(), at }
    }
}

/// The last successfully fetched document of one dataset, replaced wholesale
/// on every refresh. `reference_date` and `events` are extracted from the
/// payload when the snapshot is built so that validity rules never have to
/// parse the payload themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub payload: serde_json::Value,
    pub fetched_at: DateTime,
    pub source: SnapshotSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_date: Option<Date>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<NamedEvent>,
}

impl Snapshot {
    pub fn from_api(payload: serde_json::Value, fetched_at: DateTime) -> Self {
        Self {
            payload,
            fetched_at,
            source: SnapshotSource::Api,
            reference_date: None,
            events: Vec::new(),
        }
    }

    /// The same document re-tagged as served from cache.
    pub fn into_cached(mut self) -> Self {
        self.source = SnapshotSource::Cache;
        self
    }
}

#[cfg(test)]
mod serialization {
    use assert_json_diff::assert_json_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn optional_metadata_is_omitted() {
        let snapshot = Snapshot::from_api(json!({"value": 3}), DateTime::from_iso("2025-02-01T09:00:00Z").unwrap());

        let doc = serde_json::to_value(&snapshot).unwrap();
        assert!(doc.get("reference_date").is_none());
        assert!(doc.get("events").is_none());
        assert_json_eq!(doc.get("payload").unwrap(), &json!({"value": 3}));
    }

    #[test]
    fn roundtrip_keeps_metadata() {
        let fetched_at = DateTime::from_iso("2025-02-01T09:00:00Z").unwrap();
        let mut snapshot = Snapshot::from_api(json!({}), fetched_at);
        snapshot.reference_date = Some(fetched_at.date());
        snapshot.events = vec![NamedEvent::new("sunrise", fetched_at)];

        let doc = serde_json::to_string(&snapshot).unwrap();
        let parsed: Snapshot = serde_json::from_str(&doc).unwrap();

        assert_eq!(parsed.reference_date, snapshot.reference_date);
        assert_eq!(parsed.events, snapshot.events);
        assert_eq!(parsed.source, SnapshotSource::Api);
    }
}
