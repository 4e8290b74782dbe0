mod client;

use std::sync::Arc;

use serde::Deserialize;

use crate::cache::dataset::DatasetDescriptor;
use crate::cache::normalize;
use crate::cache::validity::{CutoffWindow, QuotaTier, ValidityRule};
use crate::core::time::{Duration, Time};

pub use client::{MeteocatClient, MeteocatEndpoint, MeteocatSource};

#[derive(Debug, Clone, Deserialize)]
pub struct Meteocat {
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub town_id: String,
    pub station_id: String,
    pub lightning_region: u32,
    /// Monthly call limit of the forecast plan, drives the tiered validity
    /// windows. The quota refresh keeps the ledger copy current; this value
    /// seeds tier selection before the first quota document arrives.
    pub forecast_plan_limit: u32,
}

fn default_base_url() -> String {
    "https://api.meteo.cat".to_owned()
}

/// Plans below 550 calls get the stricter window, everything above the
/// permissive one.
fn tier_table(strict: CutoffWindow, permissive: CutoffWindow) -> Vec<QuotaTier> {
    vec![
        QuotaTier {
            upper_bound: 549,
            window: strict,
        },
        QuotaTier {
            upper_bound: u32::MAX,
            window: permissive,
        },
    ]
}

/// Alert documents live longer on small plans: 120 minutes scaled by plan
/// size.
fn alert_validity(forecast_plan_limit: u32) -> Duration {
    let multiplier = match forecast_plan_limit {
        0..=100 => 12,
        101..=200 => 6,
        201..=500 => 3,
        _ => 1,
    };
    Duration::minutes(120) * multiplier
}

/// All remote Meteocat datasets with their validity rules, quota plans and
/// payload shaping.
pub fn datasets(config: &Meteocat) -> anyhow::Result<Vec<DatasetDescriptor>> {
    let client = Arc::new(MeteocatClient::new(&config.base_url, &config.api_key)?);
    let source = |endpoint: MeteocatEndpoint| Arc::new(MeteocatSource::new(client.clone(), endpoint));

    let forecast_tiers = tier_table(
        CutoffWindow {
            cutoff: Time::at(6, 0)?,
            min_days_old: 2,
        },
        CutoffWindow {
            cutoff: Time::at(6, 0)?,
            min_days_old: 1,
        },
    );
    let uvi_tiers = tier_table(
        CutoffWindow {
            cutoff: Time::at(5, 0)?,
            min_days_old: 2,
        },
        CutoffWindow {
            cutoff: Time::at(9, 0)?,
            min_days_old: 1,
        },
    );

    Ok(vec![
        DatasetDescriptor::new(
            "station",
            ValidityRule::FixedTtl {
                ttl: Duration::minutes(90),
                not_before: None,
            },
            source(MeteocatEndpoint::StationMeasurements {
                station: config.station_id.clone(),
            }),
        )
        .with_quota_plan("XEMA"),
        DatasetDescriptor::new(
            "forecast-hourly",
            ValidityRule::QuotaTiered {
                tiers: forecast_tiers.clone(),
                plan_limit: config.forecast_plan_limit,
                min_age: None,
            },
            source(MeteocatEndpoint::HourlyForecast {
                town: config.town_id.clone(),
            }),
        )
        .with_quota_plan("Prediccio")
        .with_normalizer(normalize::forecast)
        .with_reference_date(normalize::forecast_reference_date),
        DatasetDescriptor::new(
            "forecast-daily",
            ValidityRule::QuotaTiered {
                tiers: forecast_tiers,
                plan_limit: config.forecast_plan_limit,
                min_age: None,
            },
            source(MeteocatEndpoint::DailyForecast {
                town: config.town_id.clone(),
            }),
        )
        .with_quota_plan("Prediccio")
        .with_normalizer(normalize::forecast)
        .with_reference_date(normalize::forecast_reference_date),
        DatasetDescriptor::new(
            "uvi",
            ValidityRule::QuotaTiered {
                tiers: uvi_tiers,
                plan_limit: config.forecast_plan_limit,
                min_age: Some(Duration::hours(15)),
            },
            source(MeteocatEndpoint::Uvi {
                town: config.town_id.clone(),
            }),
        )
        .with_quota_plan("Prediccio")
        .with_normalizer(normalize::uvi),
        DatasetDescriptor::new(
            "alerts",
            ValidityRule::FixedTtl {
                ttl: alert_validity(config.forecast_plan_limit),
                not_before: None,
            },
            source(MeteocatEndpoint::Alerts),
        )
        .with_quota_plan("Prediccio"),
        DatasetDescriptor::new(
            "lightning",
            ValidityRule::FixedTtl {
                ttl: Duration::minutes(240),
                not_before: Some(Time::at(1, 0)?),
            },
            source(MeteocatEndpoint::Lightning {
                region: config.lightning_region,
            }),
        )
        .with_quota_plan("XDDE"),
        // The quota document books its own call inside the payload, so no
        // separate plan is attached here.
        DatasetDescriptor::new(
            "quotas",
            ValidityRule::FixedTtl {
                ttl: Duration::minutes(240),
                not_before: None,
            },
            source(MeteocatEndpoint::Quotas),
        )
        .with_normalizer(normalize::quotas),
    ])
}
