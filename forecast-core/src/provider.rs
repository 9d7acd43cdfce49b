use async_trait::async_trait;
use std::fmt::Debug;

use crate::{error::WeatherError, model::{GeoLocation, WeatherReading}};

pub mod openweather;

pub use openweather::OpenWeatherClient;

/// Fetches the current temperature for a location.
///
/// Implementations never consult the forecast cache and always return
/// readings with `cached = false`.
#[async_trait]
pub trait WeatherClient: Send + Sync + Debug {
    /// Coordinates are required; the postal code may be absent.
    async fn get_weather(&self, location: &GeoLocation) -> Result<WeatherReading, WeatherError>;

    /// Resolves the postal code to coordinates first, then fetches as
    /// [`get_weather`](Self::get_weather) does.
    async fn get_weather_for_postal_code(
        &self,
        postal_code: &str,
    ) -> Result<WeatherReading, WeatherError>;
}
