//! Per-request orchestration: resolve the location, then fetch and merge.

use chrono::{Days, NaiveDate, Utc};
use std::sync::Arc;

use crate::{
    Config,
    error::{Error, Result},
    model::{CurrentReport, ForecastReport},
    provider::{AirQualitySource, Geocoder, Providers, WeatherSource},
};

#[derive(Debug, Clone)]
pub struct WeatherAggregationService {
    geocoder: Arc<dyn Geocoder>,
    weather: Arc<dyn WeatherSource>,
    air_quality: Arc<dyn AirQualitySource>,
    max_forecast_days: u32,
}

impl WeatherAggregationService {
    pub fn new(providers: Providers, max_forecast_days: u32) -> Self {
        Self {
            geocoder: providers.geocoder,
            weather: providers.weather,
            air_quality: providers.air_quality,
            max_forecast_days,
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let providers = Providers::from_config(config)?;
        Ok(Self::new(providers, config.server.max_forecast_days))
    }

    pub fn max_forecast_days(&self) -> u32 {
        self.max_forecast_days
    }

    /// Current weather plus air quality for `location`.
    ///
    /// Both lookups run concurrently once the coordinate is known; if either
    /// fails the whole request fails.
    pub async fn current(&self, location: &str) -> Result<CurrentReport> {
        let location = validate_location(location)?;
        let at = self.geocoder.resolve(location).await?;
        tracing::info!(%location, lat = at.lat, lng = at.lng, "fetching current conditions");

        let (weather, air_quality) =
            tokio::try_join!(self.weather.current(at), self.air_quality.air_quality(at))?;

        Ok(CurrentReport { air_quality, weather })
    }

    /// Day summary `days` calendar days from today (UTC).
    pub async fn forecast(&self, location: &str, days: Option<&str>) -> Result<ForecastReport> {
        self.forecast_on(location, days, Utc::now().date_naive()).await
    }

    pub async fn forecast_on(
        &self,
        location: &str,
        days: Option<&str>,
        today: NaiveDate,
    ) -> Result<ForecastReport> {
        let offset = parse_day_offset(days, self.max_forecast_days)?;
        let date = forecast_date(today, offset)?;
        let location = validate_location(location)?;

        let at = self.geocoder.resolve(location).await?;
        tracing::info!(%location, lat = at.lat, lng = at.lng, %date, "fetching day summary");

        let forecast_weather = self.weather.day_summary(at, date).await?;

        Ok(ForecastReport { forecast_weather, date, location: at })
    }
}

fn validate_location(location: &str) -> Result<&str> {
    let trimmed = location.trim();
    if trimmed.is_empty() {
        return Err(Error::Input("`location` must not be empty".into()));
    }
    Ok(trimmed)
}

/// Parse the `days` parameter and check it against the forecast horizon.
pub fn parse_day_offset(raw: Option<&str>, max_days: u32) -> Result<u32> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::Input("`days` is required".into()))?;

    let days: i64 = raw
        .parse()
        .map_err(|_| Error::Input(format!("`days` must be an integer, got '{raw}'")))?;

    if days < 0 || days > i64::from(max_days) {
        return Err(Error::Input(format!(
            "`days` must be between 0 and {max_days}, got {days}"
        )));
    }

    Ok(days as u32)
}

/// `today + days`, as a calendar date.
pub fn forecast_date(today: NaiveDate, days: u32) -> Result<NaiveDate> {
    today
        .checked_add_days(Days::new(u64::from(days)))
        .ok_or_else(|| Error::Input(format!("`days` offset {days} is out of range")))
}
