use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Date {
    delegate: chrono::NaiveDate,
}

impl Date {
    pub(super) fn new(delegate: chrono::NaiveDate) -> Self {
        Self { delegate }
    }

    pub fn from_iso(iso8601: &str) -> anyhow::Result<Self> {
        Ok(Self {
            delegate: chrono::NaiveDate::parse_from_str(iso8601, "%Y-%m-%d")?,
        })
    }

    /// Whole days from `self` up to `other`; negative when `other` is earlier.
    pub fn days_until(&self, other: Date) -> i64 {
        (other.delegate - self.delegate).num_days()
    }
}

impl Display for Date {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.delegate)
    }
}
