use std::{
    fmt::Display,
    ops::{Add, Sub},
};

use tokio::task_local;

use super::{Date, Duration, Time};

task_local! {
    pub static FIXED_NOW: DateTime;
}

/// A point in time that remembers the UTC offset it was created with, so
/// wall-clock accessors like `time()` and `date()` are stable no matter
/// which host zone the process runs in. `now()` carries the local offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct DateTime {
    delegate: chrono::DateTime<chrono::FixedOffset>,
}

impl DateTime {
    fn new<T: chrono::TimeZone>(delegate: chrono::DateTime<T>) -> Self {
        Self {
            delegate: delegate.fixed_offset(),
        }
    }

    pub fn now() -> Self {
        FIXED_NOW
            .try_with(|t| *t)
            .unwrap_or_else(|_| chrono::Local::now().into())
    }

    pub fn from_iso(iso8601: &str) -> anyhow::Result<Self> {
        Ok(chrono::DateTime::parse_from_rfc3339(iso8601)?.into())
    }

    pub fn to_iso_string(&self) -> String {
        self.delegate.to_rfc3339()
    }

    pub fn date(&self) -> Date {
        Date::new(self.delegate.date_naive())
    }

    pub fn time(&self) -> Time {
        Time::new(self.delegate.time())
    }

    pub fn on_next_day(&self) -> Self {
        //failing only at the edges of what can be stored in a date-time
        self.delegate
            .checked_add_signed(chrono::Duration::days(1))
            .unwrap()
            .into()
    }

    pub fn elapsed_since(&self, since: Self) -> Duration {
        Duration::new(self.delegate - since.delegate)
    }

    pub fn from_unix_seconds(seconds: i64) -> Self {
        //failing only at the edges of what can be stored in a date-time
        chrono::DateTime::from_timestamp(seconds, 0).unwrap().into()
    }

    pub fn to_unix_seconds(&self) -> i64 {
        self.delegate.timestamp()
    }
}

impl Display for DateTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.delegate)
    }
}

impl Add<Duration> for DateTime {
    type Output = DateTime;

    fn add(self, rhs: Duration) -> Self::Output {
        Self::new(self.delegate + rhs.into_chrono())
    }
}

impl Sub<Duration> for DateTime {
    type Output = DateTime;

    fn sub(self, rhs: Duration) -> Self::Output {
        Self::new(self.delegate - rhs.into_chrono())
    }
}

impl<T: chrono::TimeZone> From<chrono::DateTime<T>> for DateTime {
    fn from(val: chrono::DateTime<T>) -> Self {
        DateTime::new(val)
    }
}

#[cfg(test)]
mod arithmetic {
    use super::*;

    #[test]
    fn add_and_subtract_duration() {
        let start = DateTime::from_iso("2025-03-08T10:00:00Z").unwrap();

        assert_eq!(start + Duration::minutes(90), DateTime::from_iso("2025-03-08T11:30:00Z").unwrap());
        assert_eq!(start - Duration::hours(10), DateTime::from_iso("2025-03-08T00:00:00Z").unwrap());
    }

    #[test]
    fn elapsed_between_two_instants() {
        let earlier = DateTime::from_iso("2025-03-08T10:00:00Z").unwrap();
        let later = DateTime::from_iso("2025-03-08T12:30:00Z").unwrap();

        assert_eq!(later.elapsed_since(earlier), Duration::minutes(150));
    }

    #[test]
    fn next_day_keeps_the_time() {
        let dt = DateTime::from_iso("2025-01-15T08:15:00+01:00").unwrap();
        let next = dt.on_next_day();

        assert_eq!(next.elapsed_since(dt), Duration::hours(24));
        assert_eq!(next.time(), dt.time());
    }
}
