use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde_json::Value;

use crate::{
    error::{Error, Result, UpstreamError},
    model::{Coordinate, CurrentWeather, ForecastWeather},
    provider::{read_json, require, require_f64, require_object, trim_base},
};

use super::WeatherSource;

const BASE_URL: &str = "https://api.openweathermap.org";
const ONE_CALL_PATH: &str = "/data/3.0/onecall";
const DAY_SUMMARY_PATH: &str = "/data/3.0/onecall/day_summary";

/// Only the `current` block is used.
const CURRENT_EXCLUDE: &str = "minutely,hourly,daily,alerts";

#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherClient {
    pub fn new(api_key: String, http: Client) -> Self {
        Self { api_key, base_url: BASE_URL.to_string(), http }
    }

    pub fn with_base_url(mut self, base_url: Option<&str>) -> Self {
        if let Some(url) = base_url {
            self.base_url = trim_base(url);
        }
        self
    }

    async fn fetch(&self, path: &str, params: &[(&str, String)]) -> Result<Value, UpstreamError> {
        let res = self
            .http
            .get(format!("{}{path}", self.base_url))
            .query(params)
            .query(&[("units", "metric"), ("appid", self.api_key.as_str())])
            .send()
            .await?;

        read_json(res).await
    }
}

#[async_trait]
impl WeatherSource for OpenWeatherClient {
    async fn current(&self, at: Coordinate) -> Result<CurrentWeather> {
        let params = [
            ("lat", at.lat.to_string()),
            ("lon", at.lng.to_string()),
            ("exclude", CURRENT_EXCLUDE.to_string()),
        ];

        let body = self.fetch(ONE_CALL_PATH, &params).await.map_err(|e| {
            tracing::warn!(%at, error = %e, "current weather request failed");
            Error::WeatherFetch(e)
        })?;

        extract_current(&body).map_err(Error::WeatherFetch)
    }

    async fn day_summary(&self, at: Coordinate, date: NaiveDate) -> Result<ForecastWeather> {
        let params = [
            ("lat", at.lat.to_string()),
            ("lon", at.lng.to_string()),
            ("date", date.format("%Y-%m-%d").to_string()),
        ];

        let body = self.fetch(DAY_SUMMARY_PATH, &params).await.map_err(|e| {
            tracing::warn!(%at, %date, error = %e, "day summary request failed");
            Error::WeatherFetch(e)
        })?;

        extract_forecast(&body).map_err(Error::WeatherFetch)
    }
}

/// The `current` block of a One Call response.
pub fn extract_current(body: &Value) -> Result<CurrentWeather, UpstreamError> {
    let current = require(body, "/current")?;

    for field in ["dt", "temp", "feels_like", "humidity", "wind_speed", "weather"] {
        if current.get(field).is_none_or(Value::is_null) {
            return Err(UpstreamError::MissingField(format!("current.{field}")));
        }
    }

    Ok(serde_json::from_value(current.clone())?)
}

/// Afternoon humidity, wind, total precipitation and temperature of a day summary.
pub fn extract_forecast(body: &Value) -> Result<ForecastWeather, UpstreamError> {
    Ok(ForecastWeather {
        humidity: require_f64(body, "/humidity/afternoon")?,
        wind: require_object(body, "/wind")?,
        precipitation: require_f64(body, "/precipitation/total")?,
        temperature: require_object(body, "/temperature")?,
    })
}
