//! Core library for the weather aggregator.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Clients for the geocoding, weather and air-quality providers
//! - The aggregation service that merges them per request
//! - Shared domain models and the response envelope
//!
//! It is used by `weather-server`, but can also be reused by other binaries or services.

pub mod config;
pub mod envelope;
pub mod error;
pub mod model;
pub mod provider;
pub mod service;

pub use config::{Config, ProviderConfig, ServerConfig};
pub use envelope::Envelope;
pub use error::{Error, ErrorKind, UpstreamError};
pub use model::{
    AirQuality, ConditionSummary, Coordinate, CurrentReport, CurrentWeather, ForecastReport,
    ForecastWeather,
};
pub use provider::{AirQualitySource, Geocoder, ProviderId, Providers, WeatherSource};
pub use service::WeatherAggregationService;
