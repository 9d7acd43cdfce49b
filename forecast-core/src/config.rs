use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::Arc, time::Duration};

use crate::{
    cache::{FileCache, ForecastCache, MemoryCache, WEATHER_CACHE_TTL},
    error::WeatherError,
    geocoder::{CensusGeocoder, census},
    model::ResolveMode,
    provider::{OpenWeatherClient, openweather},
    resolver::ForecastResolver,
};

/// Overrides `weather.api_key` from the config file when set.
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

/// OpenWeatherMap settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub api_key: Option<String>,
    pub units: String,
    /// Country used when looking up bare postal codes.
    pub country: String,
    pub base_url: Option<String>,
    pub cache_ttl_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            units: openweather::DEFAULT_UNITS.to_string(),
            country: openweather::DEFAULT_COUNTRY.to_string(),
            base_url: None,
            cache_ttl_secs: WEATHER_CACHE_TTL.as_secs(),
        }
    }
}

/// Census geocoder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    pub base_url: Option<String>,
    pub benchmark: String,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self { base_url: None, benchmark: census::DEFAULT_BENCHMARK.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Keep the cache on disk between runs instead of in memory.
    pub persistent: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { persistent: true }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// mode = "address"
///
/// [weather]
/// api_key = "..."
/// units = "imperial"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub mode: ResolveMode,
    pub weather: WeatherConfig,
    pub geocoder: GeocoderConfig,
    pub cache: CacheConfig,
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "forecast", "forecast")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Path to the persistent forecast cache.
    pub fn cache_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.cache_dir().join("forecast-cache.json"))
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.weather.api_key = Some(api_key);
    }

    /// API key from the environment if set, else from the config file.
    pub fn api_key(&self) -> Option<String> {
        self.api_key_with_env(std::env::var(API_KEY_ENV).ok())
    }

    fn api_key_with_env(&self, env_value: Option<String>) -> Option<String> {
        env_value
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.weather.api_key.clone())
    }

    pub fn weather_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.weather.cache_ttl_secs)
    }

    /// Fails with [`WeatherError::ApiKeyMissing`] when no key is configured.
    pub fn weather_client(&self) -> Result<OpenWeatherClient, WeatherError> {
        self.weather_client_with_key(self.api_key())
    }

    fn weather_client_with_key(
        &self,
        api_key: Option<String>,
    ) -> Result<OpenWeatherClient, WeatherError> {
        let mut client = OpenWeatherClient::new(api_key)?
            .with_units(self.weather.units.clone())
            .with_country(self.weather.country.clone());
        if let Some(url) = &self.weather.base_url {
            client = client.with_base_url(url.clone());
        }
        Ok(client)
    }

    pub fn geocoder(&self) -> CensusGeocoder {
        let mut geocoder = CensusGeocoder::new().with_benchmark(self.geocoder.benchmark.clone());
        if let Some(url) = &self.geocoder.base_url {
            geocoder = geocoder.with_base_url(url.clone());
        }
        geocoder
    }

    /// File cache when `cache.persistent` is set, otherwise an in-memory one.
    pub fn open_cache(&self) -> Result<Arc<dyn ForecastCache>> {
        if self.cache.persistent {
            let path = Self::cache_file_path()?;
            let cache = FileCache::open(&path)
                .with_context(|| format!("Failed to open cache file: {}", path.display()))?;
            Ok(Arc::new(cache))
        } else {
            Ok(Arc::new(MemoryCache::new()))
        }
    }

    /// Wire up the pipeline for the configured mode.
    pub fn build_resolver(
        &self,
        cache: Arc<dyn ForecastCache>,
    ) -> Result<ForecastResolver, WeatherError> {
        let weather = Arc::new(self.weather_client()?);

        let resolver = match self.mode {
            ResolveMode::Address => {
                ForecastResolver::for_addresses(Arc::new(self.geocoder()), weather, cache)
            }
            ResolveMode::PostalCode => ForecastResolver::for_postal_codes(weather, cache),
        };

        Ok(resolver.with_weather_ttl(self.weather_cache_ttl()))
    }
}
