use crate::{
    Config,
    error::{Result, UpstreamError, truncate_body},
    model::{AirQuality, Coordinate, CurrentWeather, ForecastWeather},
    provider::{
        google::{GoogleAirQuality, GoogleGeocoder},
        openweather::OpenWeatherClient,
    },
};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, Response};
use serde_json::Value;
use std::{convert::TryFrom, fmt::Debug, sync::Arc, time::Duration};

pub mod google;
pub mod openweather;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    /// Google Maps Platform: geocoding and air quality.
    Google,
    OpenWeather,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Google => "google",
            ProviderId::OpenWeather => "openweather",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::Google, ProviderId::OpenWeather]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "google" => Ok(ProviderId::Google),
            "openweather" => Ok(ProviderId::OpenWeather),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: google, openweather."
            )),
        }
    }
}

/// Resolves free text ("Hanoi", "1600 Amphitheatre Pkwy") to a coordinate.
#[async_trait]
pub trait Geocoder: Send + Sync + Debug {
    async fn resolve(&self, location: &str) -> Result<Coordinate>;
}

#[async_trait]
pub trait WeatherSource: Send + Sync + Debug {
    async fn current(&self, at: Coordinate) -> Result<CurrentWeather>;

    /// Aggregated conditions for one calendar day.
    async fn day_summary(&self, at: Coordinate, date: NaiveDate) -> Result<ForecastWeather>;
}

#[async_trait]
pub trait AirQualitySource: Send + Sync + Debug {
    async fn air_quality(&self, at: Coordinate) -> Result<AirQuality>;
}

/// The three upstream clients a request needs.
#[derive(Debug, Clone)]
pub struct Providers {
    pub geocoder: Arc<dyn Geocoder>,
    pub weather: Arc<dyn WeatherSource>,
    pub air_quality: Arc<dyn AirQualitySource>,
}

impl Providers {
    /// Construct all upstream clients from config.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        config.validate()?;
        let timeout = Duration::from_secs(config.server.request_timeout_secs);
        let http = http_client(timeout)?;

        let google = configured(config, ProviderId::Google)?;
        let openweather = configured(config, ProviderId::OpenWeather)?;

        let geocoder = GoogleGeocoder::new(google.api_key.clone(), http.clone())
            .with_base_url(google.base_url.as_deref());
        let air_quality = GoogleAirQuality::new(google.api_key.clone(), http.clone())
            .with_base_url(google.base_url.as_deref());
        let weather = OpenWeatherClient::new(openweather.api_key.clone(), http)
            .with_base_url(openweather.base_url.as_deref());

        Ok(Self {
            geocoder: Arc::new(geocoder),
            weather: Arc::new(weather),
            air_quality: Arc::new(air_quality),
        })
    }
}

fn configured(config: &Config, id: ProviderId) -> anyhow::Result<&crate::ProviderConfig> {
    config
        .provider_config(id)
        .filter(|_| config.is_provider_configured(id))
        .ok_or_else(|| {
            anyhow::anyhow!(
                "No API key configured for provider '{id}'.\n\
                 Hint: run `weather configure {id}` and enter your API key."
            )
        })
}

/// HTTP client shared by all upstream clients.
pub fn http_client(timeout: Duration) -> anyhow::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {e}"))
}

/// Read a response body, reject non-2xx statuses and parse it as JSON.
pub(crate) async fn read_json(res: Response) -> std::result::Result<Value, UpstreamError> {
    let status = res.status();
    let body = res.text().await?;

    if !status.is_success() {
        return Err(UpstreamError::Status {
            status: status.as_u16(),
            body: truncate_body(&body),
        });
    }

    Ok(serde_json::from_str(&body)?)
}

/// Look up a required value by JSON pointer (`/humidity/afternoon`).
pub(crate) fn require<'a>(
    body: &'a Value,
    pointer: &str,
) -> std::result::Result<&'a Value, UpstreamError> {
    body.pointer(pointer)
        .filter(|v| !v.is_null())
        .ok_or_else(|| UpstreamError::MissingField(pointer_to_path(pointer)))
}

pub(crate) fn require_f64(body: &Value, pointer: &str) -> std::result::Result<f64, UpstreamError> {
    require(body, pointer)?
        .as_f64()
        .ok_or_else(|| UpstreamError::MissingField(pointer_to_path(pointer)))
}

pub(crate) fn require_object(
    body: &Value,
    pointer: &str,
) -> std::result::Result<serde_json::Map<String, Value>, UpstreamError> {
    require(body, pointer)?
        .as_object()
        .cloned()
        .ok_or_else(|| UpstreamError::MissingField(pointer_to_path(pointer)))
}

/// `/indexes/0/aqi` -> `indexes[0].aqi`
fn pointer_to_path(pointer: &str) -> String {
    let mut out = String::new();
    for seg in pointer.split('/').filter(|s| !s.is_empty()) {
        if seg.chars().all(|c| c.is_ascii_digit()) {
            out.push_str(&format!("[{seg}]"));
        } else {
            if !out.is_empty() {
                out.push('.');
            }
            out.push_str(seg);
        }
    }
    out
}

/// Strip a trailing slash so paths can be appended.
pub(crate) fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
