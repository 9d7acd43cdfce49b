//! Error taxonomy for the forecast pipeline.
//!
//! Each upstream has its own error enum; [`PipelineError`] tags them with
//! their origin so callers can switch on [`ErrorKind`] and [`PipelineError::code`]
//! without knowing anything about the upstream wire formats.

use serde::Serialize;
use thiserror::Error;

pub const UNKNOWN_ERROR_CODE: &str = "unknown_error";

/// Caller input was missing or blank.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Address parameter is required")]
    AddressRequired,
    #[error("Postal code parameter is required")]
    MissingPostalCode,
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::AddressRequired => "address_required",
            Self::MissingPostalCode => "missing_postal_code",
        }
    }
}

/// Failures reported by the geocoding client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeocoderError {
    /// Valid request, zero matches.
    #[error("No matches found for address")]
    AddressNotFound,

    #[error("Failed to parse geocoding response: {detail}")]
    ParseFailure { detail: String },

    /// Upstream rejected the request and said why.
    #[error("Failed to geocode address")]
    Rejected { reasons: Vec<String> },

    #[error("Geocoding request failed: {detail}")]
    Unknown { detail: String },
}

impl GeocoderError {
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::AddressNotFound => Some("address_not_found"),
            Self::ParseFailure { .. } => Some("parse_failure"),
            Self::Rejected { .. } => None,
            Self::Unknown { .. } => Some(UNKNOWN_ERROR_CODE),
        }
    }

    pub fn reasons(&self) -> &[String] {
        match self {
            Self::Rejected { reasons } => reasons,
            _ => &[],
        }
    }
}

/// Failures reported by the weather client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WeatherError {
    /// No usable API key. Raised when the client is built, not per request.
    #[error("Weather API key missing")]
    ApiKeyMissing,

    #[error("Error fetching weather data: {detail}")]
    Api { status: u16, detail: String },

    #[error("Failed to parse weather response: {detail}")]
    ParseFailure { detail: String },

    #[error("No location found for postal code {postal_code}")]
    PostalCodeNotFound { postal_code: String },

    #[error("Weather request failed: {detail}")]
    Transport { detail: String },
}

impl WeatherError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ApiKeyMissing => "api_key_missing",
            Self::Api { .. } => "weather_api_error",
            Self::ParseFailure { .. } => "parse_failure",
            Self::PostalCodeNotFound { .. } => "postal_code_not_found",
            Self::Transport { .. } => UNKNOWN_ERROR_CODE,
        }
    }
}

/// Failures of a [`ForecastCache`](crate::cache::ForecastCache) backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("forecast cache backend failure: {message}")]
    Backend { message: String },
    #[error("forecast cache serialisation failed: {message}")]
    Serialization { message: String },
}

/// Where a pipeline failure originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    Geocoder,
    Weather,
    Unknown,
}

/// The single failure type returned by
/// [`ForecastResolver::resolve`](crate::ForecastResolver::resolve).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Geocoder(#[from] GeocoderError),

    #[error(transparent)]
    Weather(#[from] WeatherError),

    #[error("{message}")]
    Unknown { message: String },
}

impl PipelineError {
    pub fn unknown<S: Into<String>>(message: S) -> Self {
        Self::Unknown { message: message.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Geocoder(_) => ErrorKind::Geocoder,
            Self::Weather(_) => ErrorKind::Weather,
            Self::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::Validation(e) => Some(e.code()),
            Self::Geocoder(e) => e.code(),
            Self::Weather(e) => Some(e.code()),
            Self::Unknown { .. } => Some(UNKNOWN_ERROR_CODE),
        }
    }

    /// Diagnostic detail from upstream. May be empty.
    pub fn reasons(&self) -> &[String] {
        match self {
            Self::Geocoder(e) => e.reasons(),
            _ => &[],
        }
    }

    /// Caller's fault (400 class) as opposed to an upstream or internal failure.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<CacheError> for PipelineError {
    fn from(err: CacheError) -> Self {
        Self::unknown(err.to_string())
    }
}

/// Failure body handed to the web layer: `{"error": {"message", "code", "reasons"}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: Option<String>,
    pub reasons: Vec<String>,
}

impl From<&PipelineError> for ErrorResponse {
    fn from(err: &PipelineError) -> Self {
        Self {
            error: ErrorBody {
                message: err.to_string(),
                code: err.code().map(str::to_string),
                reasons: err.reasons().to_vec(),
            },
        }
    }
}
