//! HTTP boundary: query parsing, envelopes and status codes.

use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use weather_core::{Envelope, Error, ErrorKind, WeatherAggregationService};

pub type AppState = Arc<WeatherAggregationService>;

pub fn router(service: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/weather/current", get(current_weather))
        .route("/api/weather/forecast", get(forecast_weather))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub struct CurrentParams {
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForecastParams {
    location: Option<String>,
    days: Option<String>,
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::BadInput => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::UpstreamUnavailable | ErrorKind::UpstreamMalformed => StatusCode::BAD_GATEWAY,
    }
}

fn respond<T: Serialize>(result: Result<T, Error>) -> Response {
    match result {
        Ok(data) => (StatusCode::OK, Json(Envelope::ok(data))).into_response(),
        Err(e) => {
            let status = status_for(e.kind());
            if status.is_server_error() {
                tracing::error!(error = %e, %status, "weather request failed");
            } else {
                tracing::warn!(error = %e, %status, "weather request rejected");
            }
            (status, Json(Envelope::<T>::failure(&e))).into_response()
        }
    }
}

fn required_location(location: Option<String>) -> Result<String, Error> {
    location.ok_or_else(|| Error::Input("`location` query parameter is required".into()))
}

fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, Error> {
    query
        .map(|Query(params)| params)
        .map_err(|rejection| Error::Input(rejection.body_text()))
}

async fn health_check() -> &'static str {
    "ok"
}

async fn current_weather(
    State(service): State<AppState>,
    query: Result<Query<CurrentParams>, QueryRejection>,
) -> Response {
    let result = match query_params(query).and_then(|p| required_location(p.location)) {
        Ok(location) => service.current(&location).await,
        Err(e) => Err(e),
    };
    respond(result)
}

async fn forecast_weather(
    State(service): State<AppState>,
    query: Result<Query<ForecastParams>, QueryRejection>,
) -> Response {
    let result = match query_params(query) {
        Ok(params) => match required_location(params.location) {
            Ok(location) => service.forecast(&location, params.days.as_deref()).await,
            Err(e) => Err(e),
        },
        Err(e) => Err(e),
    };
    respond(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use chrono::NaiveDate;
    use serde_json::{Map, Value, json};
    use tower::ServiceExt;
    use weather_core::{
        AirQuality, AirQualitySource, Coordinate, CurrentWeather, ForecastWeather, Geocoder,
        Providers, UpstreamError, WeatherSource,
    };

    #[derive(Debug)]
    struct FakeGeocoder;

    #[async_trait]
    impl Geocoder for FakeGeocoder {
        async fn resolve(&self, location: &str) -> weather_core::error::Result<Coordinate> {
            match location {
                "Atlantis" => Err(Error::LocationNotFound(location.to_string())),
                _ => Ok(Coordinate::new(10.0, 20.0)),
            }
        }
    }

    #[derive(Debug)]
    struct FakeWeather;

    #[async_trait]
    impl WeatherSource for FakeWeather {
        async fn current(&self, _at: Coordinate) -> weather_core::error::Result<CurrentWeather> {
            Ok(serde_json::from_value(json!({
                "dt": 1, "temp": 21.0, "feels_like": 20.0, "humidity": 50,
                "wind_speed": 3.0, "weather": []
            }))
            .unwrap())
        }

        async fn day_summary(
            &self,
            _at: Coordinate,
            _date: NaiveDate,
        ) -> weather_core::error::Result<ForecastWeather> {
            Ok(ForecastWeather {
                humidity: 60.0,
                wind: Map::new(),
                precipitation: 2.0,
                temperature: Map::new(),
            })
        }
    }

    #[derive(Debug)]
    struct FakeAirQuality {
        fail: bool,
    }

    #[async_trait]
    impl AirQualitySource for FakeAirQuality {
        async fn air_quality(&self, _at: Coordinate) -> weather_core::error::Result<AirQuality> {
            if self.fail {
                return Err(Error::AirQualityFetch(UpstreamError::Status {
                    status: 503,
                    body: "down".into(),
                }));
            }
            Ok(AirQuality { aqi: 42, category: "Good".into(), health_recommendations: Map::new() })
        }
    }

    fn app(aqi_fails: bool) -> Router {
        let providers = Providers {
            geocoder: Arc::new(FakeGeocoder),
            weather: Arc::new(FakeWeather),
            air_quality: Arc::new(FakeAirQuality { fail: aqi_fails }),
        };
        router(Arc::new(WeatherAggregationService::new(providers, 7)))
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
        let res = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn current_success_envelope() {
        let (status, body) = get(app(false), "/api/weather/current?location=Hanoi").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!(true));
        assert_eq!(body["message"], json!("OK"));
        assert_eq!(body["data"]["airQuality"]["aqi"], json!(42));
        assert_eq!(body["data"]["weather"]["temp"], json!(21.0));
    }

    #[tokio::test]
    async fn current_missing_location_is_bad_request() {
        let (status, body) = get(app(false), "/api/weather/current").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], json!(false));
        assert_eq!(body["data"], json!(null));
    }

    #[tokio::test]
    async fn unknown_location_is_not_found() {
        let (status, body) = get(app(false), "/api/weather/current?location=Atlantis").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], json!(false));
        assert_eq!(body["data"], json!(null));

        let (status, _) =
            get(app(false), "/api/weather/forecast?location=Atlantis&days=2").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn air_quality_outage_is_bad_gateway_without_data() {
        let (status, body) = get(app(true), "/api/weather/current?location=Hanoi").await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["data"], json!(null));
        assert!(body["message"].as_str().unwrap().contains("Air quality"));
    }

    #[tokio::test]
    async fn forecast_success_envelope() {
        let (status, body) =
            get(app(false), "/api/weather/forecast?location=Hanoi&days=4").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["forecastWeather"]["humidity"], json!(60.0));
        assert_eq!(body["data"]["forecastWeather"]["precipitation"], json!(2.0));
        assert_eq!(body["data"]["location"], json!({"lat": 10.0, "lng": 20.0}));
    }

    #[tokio::test]
    async fn forecast_bad_days_is_bad_request() {
        for uri in [
            "/api/weather/forecast?location=Hanoi",
            "/api/weather/forecast?location=Hanoi&days=abc",
            "/api/weather/forecast?location=Hanoi&days=8",
        ] {
            let (status, body) = get(app(false), uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body["status"], json!(false));
        }
    }

    #[test]
    fn service_reports_forecast_horizon() {
        let providers = Providers {
            geocoder: Arc::new(FakeGeocoder),
            weather: Arc::new(FakeWeather),
            air_quality: Arc::new(FakeAirQuality { fail: false }),
        };
        assert_eq!(WeatherAggregationService::new(providers, 7).max_forecast_days(), 7);
    }

    #[tokio::test]
    async fn malformed_query_still_gets_envelope() {
        for uri in [
            "/api/weather/forecast?location=a&location=b&days=1",
            "/api/weather/current?location=a&location=b",
        ] {
            let (status, body) = get(app(false), uri).await;

            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body["status"], json!(false));
            assert_eq!(body["data"], json!(null));
            assert!(body["message"].as_str().unwrap().contains("location"));
        }
    }

    #[test]
    fn status_mapping() {
        assert_eq!(status_for(ErrorKind::BadInput), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::UpstreamTimeout), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(status_for(ErrorKind::UpstreamMalformed), StatusCode::BAD_GATEWAY);
    }
}
