//! The forecast resolution pipeline.
//!
//! `validate -> location (cache or geocode) -> weather (cache or fetch)`.
//! Geocodes are cached per normalized address with no expiry; readings are
//! cached per postal code with a short TTL, so nearby addresses sharing a
//! postal code share one weather call. The resolver never retries and never
//! falls back to stale data.

use std::{sync::Arc, time::Duration};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::{
    cache::{CacheValue, ForecastCache, Ttl, WEATHER_CACHE_TTL, address_key, forecast_key},
    error::{PipelineError, ValidationError},
    geocoder::GeocodingClient,
    model::{GeoLocation, LocationQuery, ResolveMode, WeatherReading},
    provider::WeatherClient,
};

#[derive(Debug, Clone)]
enum Front {
    Address(Arc<dyn GeocodingClient>),
    PostalCode,
}

#[derive(Debug, Clone)]
pub struct ForecastResolver {
    front: Front,
    weather: Arc<dyn WeatherClient>,
    cache: Arc<dyn ForecastCache>,
    weather_ttl: Duration,
}

impl ForecastResolver {
    /// Address deployments: geocode first, then fetch weather.
    pub fn for_addresses(
        geocoder: Arc<dyn GeocodingClient>,
        weather: Arc<dyn WeatherClient>,
        cache: Arc<dyn ForecastCache>,
    ) -> Self {
        Self { front: Front::Address(geocoder), weather, cache, weather_ttl: WEATHER_CACHE_TTL }
    }

    /// Postal-code deployments: no geocoder involved.
    pub fn for_postal_codes(
        weather: Arc<dyn WeatherClient>,
        cache: Arc<dyn ForecastCache>,
    ) -> Self {
        Self { front: Front::PostalCode, weather, cache, weather_ttl: WEATHER_CACHE_TTL }
    }

    pub fn with_weather_ttl(mut self, ttl: Duration) -> Self {
        self.weather_ttl = ttl;
        self
    }

    pub fn mode(&self) -> ResolveMode {
        match self.front {
            Front::Address(_) => ResolveMode::Address,
            Front::PostalCode => ResolveMode::PostalCode,
        }
    }

    /// Resolve one query into a current reading.
    ///
    /// `cached` on the result is true only when the reading came out of the
    /// forecast cache.
    #[instrument(name = "resolve_forecast", skip(self, query), fields(mode = %self.mode()))]
    pub async fn resolve(&self, query: &LocationQuery) -> Result<WeatherReading, PipelineError> {
        match &self.front {
            Front::Address(geocoder) => {
                let address = required(query_address(query), ValidationError::AddressRequired)?;
                let location = self.resolve_location(geocoder.as_ref(), address).await?;
                self.resolve_weather(&location).await
            }
            Front::PostalCode => {
                let postal_code =
                    required(query_postal_code(query), ValidationError::MissingPostalCode)?;
                self.resolve_weather_for_postal_code(postal_code).await
            }
        }
    }

    async fn resolve_location(
        &self,
        geocoder: &dyn GeocodingClient,
        address: &str,
    ) -> Result<GeoLocation, PipelineError> {
        let key = address_key(address);

        match self.cache.read(&key).await? {
            Some(CacheValue::Location(location)) => {
                debug!(%key, "geocode served from cache");
                return Ok(location);
            }
            Some(other) => return Err(unexpected_entry(&key, &other)),
            None => {}
        }

        let location = geocoder.geocode(address).await.inspect_err(|e| {
            warn!(error = %e, "geocoding failed");
        })?;

        self.cache
            .write(&key, CacheValue::Location(location.clone()), Ttl::Never)
            .await?;

        Ok(location)
    }

    async fn resolve_weather(
        &self,
        location: &GeoLocation,
    ) -> Result<WeatherReading, PipelineError> {
        let key = location.postal_code.as_deref().map(forecast_key);

        if let Some(key) = &key {
            if let Some(reading) = self.cached_reading(key).await? {
                return Ok(reading);
            }
        } else {
            debug!("no postal code for location, weather will not be cached");
        }

        let reading = self.weather.get_weather(location).await.inspect_err(|e| {
            warn!(error = %e, "weather fetch failed");
        })?;

        self.store_reading(key.as_deref(), reading).await
    }

    async fn resolve_weather_for_postal_code(
        &self,
        postal_code: &str,
    ) -> Result<WeatherReading, PipelineError> {
        let key = forecast_key(postal_code);

        if let Some(reading) = self.cached_reading(&key).await? {
            return Ok(reading);
        }

        let reading = self
            .weather
            .get_weather_for_postal_code(postal_code)
            .await
            .inspect_err(|e| {
                warn!(error = %e, "weather fetch failed");
            })?;

        self.store_reading(Some(&key), reading).await
    }

    async fn cached_reading(&self, key: &str) -> Result<Option<WeatherReading>, PipelineError> {
        match self.cache.read(key).await? {
            Some(CacheValue::Weather(stored)) => {
                info!(%key, "retrieved weather data from cache");
                Ok(Some(stored.as_cached()))
            }
            Some(other) => Err(unexpected_entry(key, &other)),
            None => Ok(None),
        }
    }

    async fn store_reading(
        &self,
        key: Option<&str>,
        reading: WeatherReading,
    ) -> Result<WeatherReading, PipelineError> {
        let reading = WeatherReading { cached: false, ..reading };

        if let Some(key) = key {
            self.cache
                .write(key, CacheValue::Weather(reading), Ttl::After(self.weather_ttl))
                .await?;
            info!(%key, "cached fresh weather data");
        }

        Ok(reading)
    }
}

/// Success body handed to the web layer: `{"temperature_current", "cached"?}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ForecastResponse(pub WeatherReading);

impl From<WeatherReading> for ForecastResponse {
    fn from(reading: WeatherReading) -> Self {
        Self(reading)
    }
}

fn query_address(query: &LocationQuery) -> Option<&str> {
    match query {
        LocationQuery::Address(address) => Some(address),
        LocationQuery::PostalCode(_) => None,
    }
}

fn query_postal_code(query: &LocationQuery) -> Option<&str> {
    match query {
        LocationQuery::PostalCode(code) => Some(code),
        LocationQuery::Address(_) => None,
    }
}

fn required(value: Option<&str>, missing: ValidationError) -> Result<&str, ValidationError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(missing),
    }
}

fn unexpected_entry(key: &str, value: &CacheValue) -> PipelineError {
    let found = match value {
        CacheValue::Location(_) => "location",
        CacheValue::Weather(_) => "weather reading",
    };
    PipelineError::unknown(format!("unexpected {found} cached under {key}"))
}
