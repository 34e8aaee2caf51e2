use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value, json};

use crate::{
    error::{Error, Result, UpstreamError},
    model::{AirQuality, Coordinate},
    provider::{read_json, require, require_f64, trim_base},
};

use super::{AirQualitySource, Geocoder};

const GEOCODE_BASE_URL: &str = "https://maps.googleapis.com";
const GEOCODE_PATH: &str = "/maps/api/geocode/json";

const AIR_QUALITY_BASE_URL: &str = "https://airquality.googleapis.com";
const AIR_QUALITY_PATH: &str = "/v1/currentConditions:lookup";

#[derive(Debug, Clone)]
pub struct GoogleGeocoder {
    api_key: String,
    base_url: String,
    http: Client,
}

impl GoogleGeocoder {
    pub fn new(api_key: String, http: Client) -> Self {
        Self { api_key, base_url: GEOCODE_BASE_URL.to_string(), http }
    }

    pub fn with_base_url(mut self, base_url: Option<&str>) -> Self {
        if let Some(url) = base_url {
            self.base_url = trim_base(url);
        }
        self
    }

    async fn fetch(&self, location: &str) -> Result<Value, UpstreamError> {
        let res = self
            .http
            .get(format!("{}{GEOCODE_PATH}", self.base_url))
            .query(&[("address", location), ("key", self.api_key.as_str())])
            .send()
            .await?;

        read_json(res).await
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    async fn resolve(&self, location: &str) -> Result<Coordinate> {
        let body = self.fetch(location).await.map_err(|e| {
            tracing::warn!(%location, error = %e, "geocoding request failed");
            Error::Geocode(e)
        })?;

        let coordinate = extract_coordinate(location, &body).inspect_err(|e| {
            tracing::warn!(%location, error = %e, "geocoding returned no usable result");
        })?;

        tracing::debug!(%location, lat = coordinate.lat, lng = coordinate.lng, "resolved location");
        Ok(coordinate)
    }
}

/// Pick the first result's `geometry.location`.
pub fn extract_coordinate(location: &str, body: &Value) -> Result<Coordinate> {
    let status = body.get("status").and_then(Value::as_str).unwrap_or("OK");
    let no_results = body
        .get("results")
        .and_then(Value::as_array)
        .is_none_or(|r| r.is_empty());

    match status {
        "ZERO_RESULTS" => return Err(Error::LocationNotFound(location.to_string())),
        "OK" => {}
        other => {
            let message = body
                .get("error_message")
                .and_then(Value::as_str)
                .unwrap_or("no error message")
                .to_string();
            return Err(Error::Geocode(UpstreamError::Rejected {
                status: other.to_string(),
                message,
            }));
        }
    }

    if no_results {
        return Err(Error::LocationNotFound(location.to_string()));
    }

    let lat = require_f64(body, "/results/0/geometry/location/lat").map_err(Error::Geocode)?;
    let lng = require_f64(body, "/results/0/geometry/location/lng").map_err(Error::Geocode)?;

    Ok(Coordinate::new(lat, lng))
}

#[derive(Debug, Clone)]
pub struct GoogleAirQuality {
    api_key: String,
    base_url: String,
    http: Client,
}

impl GoogleAirQuality {
    pub fn new(api_key: String, http: Client) -> Self {
        Self { api_key, base_url: AIR_QUALITY_BASE_URL.to_string(), http }
    }

    pub fn with_base_url(mut self, base_url: Option<&str>) -> Self {
        if let Some(url) = base_url {
            self.base_url = trim_base(url);
        }
        self
    }

    async fn fetch(&self, at: Coordinate) -> Result<Value, UpstreamError> {
        let res = self
            .http
            .post(format!("{}{AIR_QUALITY_PATH}", self.base_url))
            .query(&[("key", self.api_key.as_str())])
            .json(&lookup_body(at))
            .send()
            .await?;

        read_json(res).await
    }
}

#[async_trait]
impl AirQualitySource for GoogleAirQuality {
    async fn air_quality(&self, at: Coordinate) -> Result<AirQuality> {
        let body = self.fetch(at).await.map_err(|e| {
            tracing::warn!(%at, error = %e, "air quality request failed");
            Error::AirQualityFetch(e)
        })?;

        extract_air_quality(&body).map_err(Error::AirQualityFetch)
    }
}

/// Request body for a local-scale AQI lookup with health recommendations.
pub fn lookup_body(at: Coordinate) -> Value {
    json!({
        "universalAqi": false,
        "location": {
            "latitude": at.lat,
            "longitude": at.lng,
        },
        "extraComputations": ["HEALTH_RECOMMENDATIONS", "LOCAL_AQI"],
    })
}

/// First index entry plus the top-level health recommendations.
pub fn extract_air_quality(body: &Value) -> Result<AirQuality, UpstreamError> {
    let index = require(body, "/indexes/0")?;

    let aqi = index
        .get("aqi")
        .and_then(Value::as_i64)
        .ok_or_else(|| UpstreamError::MissingField("indexes[0].aqi".into()))?;
    let category = index
        .get("category")
        .and_then(Value::as_str)
        .ok_or_else(|| UpstreamError::MissingField("indexes[0].category".into()))?
        .to_string();

    let health_recommendations = body
        .get("healthRecommendations")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_else(Map::new);

    Ok(AirQuality { aqi, category, health_recommendations })
}
