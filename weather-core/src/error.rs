//! Failure taxonomy for a single aggregation request.

use thiserror::Error;

/// What went wrong talking to one upstream provider.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider responded with status {status}: {body}")]
    Status { status: u16, body: String },

    /// The provider answered 200 but reported an error in the body.
    #[error("provider rejected the request ({status}): {message}")]
    Rejected { status: String, message: String },

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("response is missing field `{0}`")]
    MissingField(String),
}

impl UpstreamError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_timeout())
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::MissingField(_))
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    Input(String),

    #[error("No location found for '{0}'")]
    LocationNotFound(String),

    #[error("Geocoding failed: {0}")]
    Geocode(#[source] UpstreamError),

    #[error("Weather fetch failed: {0}")]
    WeatherFetch(#[source] UpstreamError),

    #[error("Air quality fetch failed: {0}")]
    AirQualityFetch(#[source] UpstreamError),
}

/// Coarse classification used by the HTTP boundary to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadInput,
    NotFound,
    UpstreamTimeout,
    UpstreamUnavailable,
    UpstreamMalformed,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Input(_) => ErrorKind::BadInput,
            Self::LocationNotFound(_) => ErrorKind::NotFound,
            Self::Geocode(e) | Self::WeatherFetch(e) | Self::AirQualityFetch(e) => {
                if e.is_timeout() {
                    ErrorKind::UpstreamTimeout
                } else if e.is_malformed() {
                    ErrorKind::UpstreamMalformed
                } else {
                    ErrorKind::UpstreamUnavailable
                }
            }
        }
    }

    /// Message placed in the response envelope.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Keep upstream bodies short enough to log and echo back.
pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        let cut: String = body.chars().take(MAX).collect();
        format!("{cut}...")
    } else {
        body.to_string()
    }
}
