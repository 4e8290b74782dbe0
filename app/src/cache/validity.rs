use crate::core::snapshot::{NamedEvent, Snapshot};
use crate::core::time::{DateTime, Duration, Time};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
}

/// Refresh no earlier than `cutoff` local time, and only once the
/// snapshot's reference date is at least `min_days_old` days behind today.
#[derive(Debug, Clone, Copy)]
pub struct CutoffWindow {
    pub cutoff: Time,
    pub min_days_old: i64,
}

/// One entry of a tiered validity table: plans up to `upper_bound` calls
/// refresh on `window`.
#[derive(Debug, Clone, Copy)]
pub struct QuotaTier {
    pub upper_bound: u32,
    pub window: CutoffWindow,
}

/// Decides whether a stored snapshot still answers queries or a refresh is
/// due. Evaluation is a pure function of the snapshot and the given clock
/// reading, so every decision can be replayed in tests.
#[derive(Debug, Clone)]
pub enum ValidityRule {
    /// Stale once the snapshot is `ttl` old. An optional `not_before` gate
    /// additionally holds refreshes until that local time of day.
    FixedTtl {
        ttl: Duration,
        not_before: Option<Time>,
    },

    /// Stale once the reference date is `min_days_old` behind today and the
    /// local clock passed `cutoff`. Used for daily forecast documents that
    /// the upstream publishes each morning.
    DailyCutoff { cutoff: Time, min_days_old: i64 },

    /// DailyCutoff with the window chosen by plan size: the first tier whose
    /// upper bound covers `plan_limit` wins, ordered ascending; a plan above
    /// every bound falls through to the last, most permissive tier. Larger
    /// plans are allowed to refresh sooner. `min_age` optionally enforces a
    /// minimum gap between refreshes on top of the window.
    QuotaTiered {
        tiers: Vec<QuotaTier>,
        plan_limit: u32,
        min_age: Option<Duration>,
    },

    /// Stale once the earliest embedded event has passed, or when the
    /// snapshot carries no events at all.
    EventWindow,
}

impl ValidityRule {
    pub fn evaluate(&self, snapshot: &Snapshot, now: DateTime) -> Freshness {
        let stale = match self {
            ValidityRule::FixedTtl { ttl, not_before } => {
                let expired = now.elapsed_since(snapshot.fetched_at) >= *ttl;
                let gate_open = not_before.map(|t| now.time() >= t).unwrap_or(true);
                expired && gate_open
            }

            ValidityRule::DailyCutoff { cutoff, min_days_old } => {
                window_passed(snapshot, now, &CutoffWindow {
                    cutoff: *cutoff,
                    min_days_old: *min_days_old,
                })
            }

            ValidityRule::QuotaTiered {
                tiers,
                plan_limit,
                min_age,
            } => {
                let aged = min_age
                    .map(|min| now.elapsed_since(snapshot.fetched_at) >= min)
                    .unwrap_or(true);
                match tier_window(tiers, *plan_limit) {
                    Some(window) => window_passed(snapshot, now, window) && aged,
                    None => aged,
                }
            }

            ValidityRule::EventWindow => match earliest_event(&snapshot.events) {
                Some(event) => event.at <= now,
                None => true,
            },
        };

        if stale { Freshness::Stale } else { Freshness::Fresh }
    }
}

fn tier_window(tiers: &[QuotaTier], plan_limit: u32) -> Option<&CutoffWindow> {
    tiers
        .iter()
        .find(|tier| plan_limit <= tier.upper_bound)
        .or_else(|| tiers.last())
        .map(|tier| &tier.window)
}

fn window_passed(snapshot: &Snapshot, now: DateTime, window: &CutoffWindow) -> bool {
    let reference = snapshot.reference_date.unwrap_or_else(|| snapshot.fetched_at.date());
    reference.days_until(now.date()) >= window.min_days_old && now.time() >= window.cutoff
}

fn earliest_event(events: &[NamedEvent]) -> Option<&NamedEvent> {
    events.iter().min_by_key(|e| e.at)
}

/// Moves every event that already passed to the same wall-clock time on the
/// following day, so an event list stays ahead of the clock between
/// refreshes.
pub fn advance_events(events: &[NamedEvent], now: DateTime) -> Vec<NamedEvent> {
    events
        .iter()
        .map(|event| {
            if event.at <= now {
                NamedEvent::new(event.name.clone(), event.at.on_next_day())
            } else {
                event.clone()
            }
        })
        .collect()
}

#[cfg(test)]
mod evaluation {
    use serde_json::json;

    use super::*;

    fn snapshot_fetched_at(iso: &str) -> Snapshot {
        Snapshot::from_api(json!({}), DateTime::from_iso(iso).unwrap())
    }

    fn at(iso: &str) -> DateTime {
        DateTime::from_iso(iso).unwrap()
    }

    #[test]
    fn fixed_ttl_is_fresh_within_the_window() {
        let rule = ValidityRule::FixedTtl {
            ttl: Duration::minutes(90),
            not_before: None,
        };
        let snapshot = snapshot_fetched_at("2025-01-15T08:00:00+01:00");

        assert_eq!(rule.evaluate(&snapshot, at("2025-01-15T09:29:00+01:00")), Freshness::Fresh);
        assert_eq!(rule.evaluate(&snapshot, at("2025-01-15T09:30:00+01:00")), Freshness::Stale);
    }

    #[test]
    fn fixed_ttl_gate_holds_expired_snapshot_until_the_hour() {
        let rule = ValidityRule::FixedTtl {
            ttl: Duration::minutes(240),
            not_before: Some(Time::at(1, 0).unwrap()),
        };
        let snapshot = snapshot_fetched_at("2025-01-14T20:00:00+01:00");

        assert_eq!(rule.evaluate(&snapshot, at("2025-01-15T00:30:00+01:00")), Freshness::Fresh);
        assert_eq!(rule.evaluate(&snapshot, at("2025-01-15T01:00:00+01:00")), Freshness::Stale);
    }

    #[test]
    fn daily_cutoff_needs_both_age_and_time_of_day() {
        let rule = ValidityRule::DailyCutoff {
            cutoff: Time::at(6, 0).unwrap(),
            min_days_old: 1,
        };
        let mut snapshot = snapshot_fetched_at("2025-01-14T07:00:00+01:00");
        snapshot.reference_date = Some(at("2025-01-14T00:00:00+01:00").date());

        // day-old but before the cutoff
        assert_eq!(rule.evaluate(&snapshot, at("2025-01-15T05:59:00+01:00")), Freshness::Fresh);
        // past the cutoff but same day
        assert_eq!(rule.evaluate(&snapshot, at("2025-01-14T09:00:00+01:00")), Freshness::Fresh);
        // both
        assert_eq!(rule.evaluate(&snapshot, at("2025-01-15T06:00:00+01:00")), Freshness::Stale);
    }

    #[test]
    fn larger_plans_refresh_sooner() {
        let tiers = |plan_limit| ValidityRule::QuotaTiered {
            tiers: vec![
                QuotaTier {
                    upper_bound: 549,
                    window: CutoffWindow {
                        cutoff: Time::at(6, 0).unwrap(),
                        min_days_old: 2,
                    },
                },
                QuotaTier {
                    upper_bound: u32::MAX,
                    window: CutoffWindow {
                        cutoff: Time::at(6, 0).unwrap(),
                        min_days_old: 1,
                    },
                },
            ],
            plan_limit,
            min_age: None,
        };

        let mut snapshot = snapshot_fetched_at("2025-01-14T07:00:00+01:00");
        snapshot.reference_date = Some(at("2025-01-14T00:00:00+01:00").date());
        let day_later = at("2025-01-15T08:00:00+01:00");

        assert_eq!(tiers(750).evaluate(&snapshot, day_later), Freshness::Stale);
        assert_eq!(tiers(250).evaluate(&snapshot, day_later), Freshness::Fresh);
        assert_eq!(
            tiers(250).evaluate(&snapshot, at("2025-01-16T08:00:00+01:00")),
            Freshness::Stale
        );
    }

    #[test]
    fn min_age_holds_back_an_otherwise_due_refresh() {
        let rule = ValidityRule::QuotaTiered {
            tiers: vec![
                QuotaTier {
                    upper_bound: 549,
                    window: CutoffWindow {
                        cutoff: Time::at(5, 0).unwrap(),
                        min_days_old: 2,
                    },
                },
                QuotaTier {
                    upper_bound: u32::MAX,
                    window: CutoffWindow {
                        cutoff: Time::at(9, 0).unwrap(),
                        min_days_old: 1,
                    },
                },
            ],
            plan_limit: 750,
            min_age: Some(Duration::hours(15)),
        };

        let mut snapshot = snapshot_fetched_at("2025-01-14T22:00:00+01:00");
        snapshot.reference_date = Some(at("2025-01-14T00:00:00+01:00").date());

        // window passed but the last fetch was only 12h ago
        assert_eq!(rule.evaluate(&snapshot, at("2025-01-15T10:00:00+01:00")), Freshness::Fresh);
        assert_eq!(rule.evaluate(&snapshot, at("2025-01-15T13:00:00+01:00")), Freshness::Stale);
    }

    #[test]
    fn event_window_expires_with_the_earliest_event() {
        let rule = ValidityRule::EventWindow;
        let mut snapshot = snapshot_fetched_at("2025-01-15T00:10:00+01:00");
        snapshot.events = vec![
            NamedEvent::new("sunset", at("2025-01-15T17:30:00+01:00")),
            NamedEvent::new("sunrise", at("2025-01-15T08:15:00+01:00")),
        ];

        assert_eq!(rule.evaluate(&snapshot, at("2025-01-15T08:14:00+01:00")), Freshness::Fresh);
        assert_eq!(rule.evaluate(&snapshot, at("2025-01-15T08:15:00+01:00")), Freshness::Stale);
    }

    #[test]
    fn event_window_without_events_is_stale() {
        let rule = ValidityRule::EventWindow;
        let snapshot = snapshot_fetched_at("2025-01-15T00:10:00+01:00");

        assert_eq!(rule.evaluate(&snapshot, at("2025-01-15T00:11:00+01:00")), Freshness::Stale);
    }

    #[test]
    fn evaluation_has_no_side_effects() {
        let rule = ValidityRule::FixedTtl {
            ttl: Duration::minutes(240),
            not_before: None,
        };
        let snapshot = snapshot_fetched_at("2025-01-15T08:00:00+01:00");
        let now = at("2025-01-15T09:00:00+01:00");

        assert_eq!(rule.evaluate(&snapshot, now), rule.evaluate(&snapshot, now));
        assert_eq!(rule.evaluate(&snapshot, now), Freshness::Fresh);
    }

    #[test]
    fn passed_events_roll_to_the_next_day() {
        let events = vec![
            NamedEvent::new("sunrise", at("2025-01-15T08:15:00+01:00")),
            NamedEvent::new("sunset", at("2025-01-15T17:30:00+01:00")),
        ];

        let advanced = advance_events(&events, at("2025-01-15T12:00:00+01:00"));

        assert_eq!(advanced[0].at, at("2025-01-16T08:15:00+01:00"));
        assert_eq!(advanced[1].at, at("2025-01-15T17:30:00+01:00"));
    }
}
