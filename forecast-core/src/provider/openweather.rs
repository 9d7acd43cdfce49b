use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::{
    error::WeatherError,
    model::{GeoLocation, WeatherReading},
};

use super::WeatherClient;

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";
pub const DEFAULT_UNITS: &str = "imperial";
pub const DEFAULT_COUNTRY: &str = "US";

const WEATHER_PATH: &str = "/data/2.5/weather";
const ZIP_LOOKUP_PATH: &str = "/geo/1.0/zip";

#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    api_key: String,
    base_url: String,
    units: String,
    country: String,
    http: Client,
}

impl OpenWeatherClient {
    /// Fails with [`WeatherError::ApiKeyMissing`] when no usable key is given.
    pub fn new(api_key: Option<String>) -> Result<Self, WeatherError> {
        Self::with_http(api_key, Client::new())
    }

    pub fn with_http(api_key: Option<String>, http: Client) -> Result<Self, WeatherError> {
        let api_key = api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or(WeatherError::ApiKeyMissing)?;

        Ok(Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            units: DEFAULT_UNITS.to_string(),
            country: DEFAULT_COUNTRY.to_string(),
            http,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// `standard`, `metric` or `imperial`.
    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = units.into();
        self
    }

    /// ISO 3166 country used for postal-code lookups.
    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = country.into();
        self
    }

    async fn fetch(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<(StatusCode, String), WeatherError> {
        let url = format!("{}{}", self.base_url, path);

        let res = self
            .http
            .get(&url)
            .query(query)
            .query(&[("appid", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| WeatherError::Transport {
                detail: format!("failed to send request to OpenWeather: {e}"),
            })?;

        let status = res.status();
        let body = res.text().await.map_err(|e| WeatherError::Transport {
            detail: format!("failed to read OpenWeather response body: {e}"),
        })?;

        Ok((status, body))
    }

    async fn lookup_postal_code(&self, postal_code: &str) -> Result<GeoLocation, WeatherError> {
        let zip = format!("{},{}", postal_code.trim(), self.country);
        let (status, body) = self.fetch(ZIP_LOOKUP_PATH, &[("zip", zip.as_str())]).await?;

        if status == StatusCode::NOT_FOUND {
            return Err(WeatherError::PostalCodeNotFound {
                postal_code: postal_code.trim().to_string(),
            });
        }
        if !status.is_success() {
            return Err(api_error(status, &body));
        }

        let parsed: OwZipResponse = serde_json::from_str(&body)
            .map_err(|e| WeatherError::ParseFailure { detail: e.to_string() })?;

        tracing::debug!(postal_code, name = ?parsed.name, "resolved postal code");
        Ok(GeoLocation::new(parsed.lat, parsed.lon, Some(postal_code.to_string())))
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    main: OwMain,
}

#[derive(Debug, Deserialize)]
struct OwZipResponse {
    lat: f64,
    lon: f64,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwErrorBody {
    message: Option<String>,
}

#[async_trait]
impl WeatherClient for OpenWeatherClient {
    async fn get_weather(&self, location: &GeoLocation) -> Result<WeatherReading, WeatherError> {
        let lat = location.latitude.to_string();
        let lon = location.longitude.to_string();

        let (status, body) = self
            .fetch(
                WEATHER_PATH,
                &[("lat", lat.as_str()), ("lon", lon.as_str()), ("units", self.units.as_str())],
            )
            .await?;

        if !status.is_success() {
            tracing::warn!(%status, "OpenWeather returned an error");
            return Err(api_error(status, &body));
        }

        let parsed: OwCurrentResponse = serde_json::from_str(&body)
            .map_err(|e| WeatherError::ParseFailure { detail: e.to_string() })?;

        Ok(WeatherReading::fresh(parsed.main.temp))
    }

    async fn get_weather_for_postal_code(
        &self,
        postal_code: &str,
    ) -> Result<WeatherReading, WeatherError> {
        let location = self.lookup_postal_code(postal_code).await?;
        self.get_weather(&location).await
    }
}

/// Non-2xx with a JSON body is an API error carrying upstream's `message`;
/// anything unparseable is a parse failure.
fn api_error(status: StatusCode, body: &str) -> WeatherError {
    match serde_json::from_str::<OwErrorBody>(body) {
        Ok(parsed) => WeatherError::Api {
            status: status.as_u16(),
            detail: parsed.message.unwrap_or_else(|| status.to_string()),
        },
        Err(e) => WeatherError::ParseFailure {
            detail: format!("unable to parse error response ({status}): {e}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_is_rejected() {
        assert_eq!(OpenWeatherClient::new(None).unwrap_err(), WeatherError::ApiKeyMissing);
        assert_eq!(
            OpenWeatherClient::new(Some("   ".into())).unwrap_err(),
            WeatherError::ApiKeyMissing
        );
    }

    #[test]
    fn api_error_embeds_upstream_message() {
        let err = api_error(
            StatusCode::UNAUTHORIZED,
            r#"{"cod":401,"message":"Invalid API key. Please see https://openweathermap.org/faq#error401 for more info."}"#,
        );
        assert_eq!(err.code(), "weather_api_error");
        assert!(err.to_string().starts_with("Error fetching weather data: Invalid API key"));
    }

    #[test]
    fn unparseable_error_body_is_parse_failure() {
        let err = api_error(StatusCode::BAD_GATEWAY, "<html>oops</html>");
        assert_eq!(err.code(), "parse_failure");
    }

    #[test]
    fn builder_overrides() {
        let client = OpenWeatherClient::new(Some("KEY".into()))
            .unwrap()
            .with_base_url("http://localhost:9/")
            .with_units("metric")
            .with_country("CA");
        assert_eq!(client.base_url, "http://localhost:9");
        assert_eq!(client.units, "metric");
        assert_eq!(client.country, "CA");
    }
}
