use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{error::GeocoderError, model::GeoLocation};

use super::GeocodingClient;

pub const DEFAULT_BASE_URL: &str = "https://geocoding.geo.census.gov";
pub const DEFAULT_BENCHMARK: &str = "Public_AR_Current";
const GEOLOCATION_PATH: &str = "/geocoder/locations/onelineaddress";

/// US Census Bureau one-line-address geocoder.
#[derive(Debug, Clone)]
pub struct CensusGeocoder {
    base_url: String,
    benchmark: String,
    http: Client,
}

impl CensusGeocoder {
    pub fn new() -> Self {
        Self::with_http(Client::new())
    }

    pub fn with_http(http: Client) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            benchmark: DEFAULT_BENCHMARK.to_string(),
            http,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_benchmark(mut self, benchmark: impl Into<String>) -> Self {
        self.benchmark = benchmark.into();
        self
    }
}

impl Default for CensusGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct CensusResponse {
    result: CensusResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CensusResult {
    address_matches: Vec<CensusMatch>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CensusMatch {
    coordinates: CensusCoordinates,
    #[serde(default)]
    address_components: Option<CensusAddressComponents>,
}

/// `x` is longitude, `y` is latitude.
#[derive(Debug, Deserialize)]
struct CensusCoordinates {
    x: f64,
    y: f64,
}

#[derive(Debug, Deserialize)]
struct CensusAddressComponents {
    zip: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CensusErrorBody {
    errors: Option<Vec<String>>,
}

#[async_trait]
impl GeocodingClient for CensusGeocoder {
    async fn geocode(&self, address: &str) -> Result<GeoLocation, GeocoderError> {
        let url = format!("{}{}", self.base_url, GEOLOCATION_PATH);

        let res = self
            .http
            .get(&url)
            .query(&[
                ("address", address),
                ("benchmark", self.benchmark.as_str()),
                ("format", "json"),
            ])
            .send()
            .await
            .map_err(|e| GeocoderError::Unknown {
                detail: format!("failed to send request to Census geocoder: {e}"),
            })?;

        let status = res.status();
        let body = res.text().await.map_err(|e| GeocoderError::Unknown {
            detail: format!("failed to read Census geocoder response body: {e}"),
        })?;

        if !status.is_success() {
            tracing::warn!(%status, "Census geocoder returned an error");
            return Err(classify_error_body(status.as_u16(), &body));
        }

        let parsed: CensusResponse =
            serde_json::from_str(&body).map_err(|e| GeocoderError::ParseFailure {
                detail: e.to_string(),
            })?;

        let best = parsed
            .result
            .address_matches
            .into_iter()
            .next()
            .ok_or(GeocoderError::AddressNotFound)?;

        let zip = best.address_components.and_then(|c| c.zip);
        Ok(GeoLocation::new(best.coordinates.y, best.coordinates.x, zip))
    }
}

/// Non-2xx: a JSON `errors` list means upstream validation, any other JSON is
/// unknown, and anything unparseable is a parse failure.
fn classify_error_body(status: u16, body: &str) -> GeocoderError {
    match serde_json::from_str::<CensusErrorBody>(body) {
        Ok(CensusErrorBody { errors: Some(reasons) }) => GeocoderError::Rejected { reasons },
        Ok(CensusErrorBody { errors: None }) => GeocoderError::Unknown {
            detail: format!("Census geocoder request failed with status {status}"),
        },
        Err(e) => GeocoderError::ParseFailure { detail: e.to_string() },
    }
}
