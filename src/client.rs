// Outbound client for the weather provider

use crate::forecast::{ForecastRecord, YandexForecastResponse};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub const API_KEY_HEADER: &str = "X-Yandex-API-Key";
const FORECAST_PATH: &str = "/v2/forecast/";

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Transport(String),

    #[error("Upstream returned status {status_code}")]
    UpstreamStatus { status_code: u16 },

    #[error("Decode error: {0}")]
    Decode(String),
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Initialization error: {0}")]
    InitError(String),
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.weather.yandex.ru".to_string(),
            api_key: "change_me".to_string(),
            timeout_ms: 10_000,
        }
    }
}

/// Coordinates and language for one forecast lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastQuery {
    pub latitude: String,
    pub longitude: String,
    pub language: String,
    // The provider answers with the same payload either way
    pub extended: bool,
}

#[async_trait]
pub trait ForecastClient: Send + Sync + 'static {
    async fn fetch(&self, query: &ForecastQuery) -> Result<ForecastRecord, FetchError>;
}

pub struct YandexWeatherClient {
    http: reqwest::Client,
    forecast_url: String,
    api_key: String,
}

impl YandexWeatherClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ClientError::InitError(e.to_string()))?;

        Ok(Self {
            http,
            forecast_url: format!("{}{}", config.base_url.trim_end_matches('/'), FORECAST_PATH),
            api_key: config.api_key,
        })
    }

    pub fn forecast_url(&self) -> &str {
        &self.forecast_url
    }
}

#[async_trait]
impl ForecastClient for YandexWeatherClient {
    #[tracing::instrument(
        name = "forecast.fetch",
        skip_all,
        fields(lat = %query.latitude, lon = %query.longitude, lang = %query.language, extended = query.extended)
    )]
    async fn fetch(&self, query: &ForecastQuery) -> Result<ForecastRecord, FetchError> {
        let response = self
            .http
            .get(&self.forecast_url)
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[
                ("lat", query.latitude.as_str()),
                ("lon", query.longitude.as_str()),
                ("lang", query.language.as_str()),
            ])
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "provider rejected forecast request");
            return Err(FetchError::UpstreamStatus {
                status_code: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let payload: YandexForecastResponse =
            serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))?;

        tracing::debug!(
            locality = %payload.geo_object.locality.name,
            temp = payload.fact.temp,
            "forecast received"
        );

        Ok(payload.into())
    }
}
