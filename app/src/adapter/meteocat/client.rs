use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use reqwest::header::{self, HeaderMap};
use reqwest_middleware::ClientWithMiddleware;
use reqwest_tracing::TracingMiddleware;
use serde_json::Value;

use crate::cache::dataset::DataSource;
use crate::core::error::FetchError;

/// Thin HTTP client for the Meteocat open data API. Authentication is a
/// static API key header; responses are passed on as raw JSON for the
/// dataset normalizers to shape.
#[derive(Debug, Clone)]
pub struct MeteocatClient {
    client: ClientWithMiddleware,
    base_url: String,
}

impl MeteocatClient {
    pub fn new(base_url: &str, api_key: &str) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        let mut key_value = header::HeaderValue::from_str(api_key)?;
        key_value.set_sensitive(true);
        headers.insert("X-Api-Key", key_value);

        let client = reqwest::Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client: reqwest_middleware::ClientBuilder::new(client)
                .with(TracingMiddleware::default())
                .build(),
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    async fn get_json(&self, path: &str) -> Result<Value, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                400 => FetchError::BadRequest(body),
                403 => FetchError::Forbidden(body),
                429 => FetchError::TooManyRequests(body),
                500..=599 => FetchError::Server(format!("{status}: {body}")),
                _ => FetchError::Transport(format!("unexpected status {status}")),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| FetchError::MalformedPayload(e.to_string()))
    }
}

/// The API endpoints backing the dataset catalogue.
#[derive(Debug, Clone)]
pub enum MeteocatEndpoint {
    StationMeasurements { station: String },
    HourlyForecast { town: String },
    DailyForecast { town: String },
    Uvi { town: String },
    Alerts,
    Lightning { region: u32 },
    Quotas,
}

impl MeteocatEndpoint {
    fn path(&self) -> String {
        match self {
            MeteocatEndpoint::StationMeasurements { station } => {
                format!("/xema/v1/estacions/mesurades/{station}/ultimes")
            }
            MeteocatEndpoint::HourlyForecast { town } => {
                format!("/pronostic/v1/municipalHoraria/{town}")
            }
            MeteocatEndpoint::DailyForecast { town } => format!("/pronostic/v1/municipal/{town}"),
            MeteocatEndpoint::Uvi { town } => format!("/pronostic/v1/uvi/{town}"),
            MeteocatEndpoint::Alerts => "/prediccio/v1/smp/episodis-oberts".to_owned(),
            MeteocatEndpoint::Lightning { region } => {
                format!("/xdde/v2/catalunya/comarca/{region}/descarregues")
            }
            MeteocatEndpoint::Quotas => "/quotes/v1/consum-actual".to_owned(),
        }
    }
}

/// One dataset's remote endpoint, bound to a shared client.
pub struct MeteocatSource {
    client: Arc<MeteocatClient>,
    endpoint: MeteocatEndpoint,
}

impl MeteocatSource {
    pub fn new(client: Arc<MeteocatClient>, endpoint: MeteocatEndpoint) -> Self {
        Self { client, endpoint }
    }
}

impl DataSource for MeteocatSource {
    fn fetch(&self) -> BoxFuture<'_, Result<Value, FetchError>> {
        async move { self.client.get_json(&self.endpoint.path()).await }.boxed()
    }
}
