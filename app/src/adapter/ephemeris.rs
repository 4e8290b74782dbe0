use std::f64::consts::PI;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::cache::dataset::{DataSource, DatasetDescriptor};
use crate::cache::validity::ValidityRule;
use crate::core::error::FetchError;
use crate::core::snapshot::NamedEvent;
use crate::core::time::DateTime;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Observer {
    pub latitude: f64,
    pub longitude: f64,
}

/// Computes the day's solar events locally instead of calling out. Modeled
/// as a data source so sun data flows through the same snapshot pipeline as
/// the remote datasets.
pub struct SolarEphemeris {
    observer: Observer,
}

impl SolarEphemeris {
    pub fn new(observer: Observer) -> Self {
        Self { observer }
    }
}

impl DataSource for SolarEphemeris {
    fn fetch(&self) -> BoxFuture<'_, Result<Value, FetchError>> {
        async move {
            let now = DateTime::now();
            let day = SolarDay::compute(now, self.observer);

            Ok(json!({
                "sunrise": day.sunrise.map(|t| t.to_iso_string()),
                "solar_noon": day.noon.to_iso_string(),
                "sunset": day.sunset.map(|t| t.to_iso_string()),
            }))
        }
        .boxed()
    }
}

/// Pulls the event timestamps back out of a computed payload. Events that
/// already passed are rolled forward by the snapshot pipeline.
pub fn sun_events(payload: &Value) -> Vec<NamedEvent> {
    ["sunrise", "solar_noon", "sunset"]
        .iter()
        .filter_map(|name| {
            let raw = payload.get(*name)?.as_str()?;
            let at = DateTime::from_iso(raw).ok()?;
            Some(NamedEvent::new(*name, at))
        })
        .collect()
}

pub fn dataset(observer: Observer) -> DatasetDescriptor {
    DatasetDescriptor::new(
        "sun",
        ValidityRule::EventWindow,
        std::sync::Arc::new(SolarEphemeris::new(observer)),
    )
    .with_events(sun_events)
}

struct SolarDay {
    sunrise: Option<DateTime>,
    noon: DateTime,
    sunset: Option<DateTime>,
}

impl SolarDay {
    /// Sunrise, solar noon and sunset for the observer's position on the
    /// given day, via the NOAA sunrise equation. Rise and set are absent
    /// during polar day and night.
    fn compute(now: DateTime, observer: Observer) -> Self {
        let days_since_epoch = now.to_unix_seconds() as f64 / 86_400.0;
        // days since the J2000 epoch
        let n = (days_since_epoch - 10_957.5).ceil();

        let mean_solar_time = n - observer.longitude / 360.0;
        let mean_anomaly = (357.5291 + 0.985_600_28 * mean_solar_time).rem_euclid(360.0);
        let m = mean_anomaly.to_radians();

        let center = 1.9148 * m.sin() + 0.02 * (2.0 * m).sin() + 0.0003 * (3.0 * m).sin();
        let ecliptic_longitude = (mean_anomaly + center + 180.0 + 102.9372).rem_euclid(360.0);
        let l = ecliptic_longitude.to_radians();

        // in days since J2000, terms correct for the equation of time
        let transit = mean_solar_time + 0.0053 * m.sin() - 0.0069 * (2.0 * l).sin();

        let declination = (l.sin() * 23.44_f64.to_radians().sin()).asin();
        let latitude = observer.latitude.to_radians();

        // -0.83 deg accounts for refraction and the solar disc radius
        let hour_angle_cos = ((-0.83_f64).to_radians().sin() - latitude.sin() * declination.sin())
            / (latitude.cos() * declination.cos());

        let noon = from_j2000_days(transit);
        if !(-1.0..=1.0).contains(&hour_angle_cos) {
            return Self {
                sunrise: None,
                noon,
                sunset: None,
            };
        }

        let hour_angle = hour_angle_cos.acos() / (2.0 * PI);
        Self {
            sunrise: Some(from_j2000_days(transit - hour_angle)),
            noon,
            sunset: Some(from_j2000_days(transit + hour_angle)),
        }
    }
}

fn from_j2000_days(days: f64) -> DateTime {
    let unix_seconds = (days + 10_957.5) * 86_400.0;
    DateTime::from_unix_seconds(unix_seconds as i64)
}
