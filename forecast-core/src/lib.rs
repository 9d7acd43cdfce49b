//! Core library for the `forecast` CLI.
//!
//! This crate defines:
//! - The forecast resolution pipeline (geocode, cache, weather fetch)
//! - Clients for the Census geocoder and OpenWeatherMap
//! - The forecast cache abstraction with in-memory and file-backed stores
//! - The error taxonomy and the response shapes handed to a web layer
//! - Configuration & credentials handling
//!
//! It is used by `forecast-cli`, but can also be reused by other binaries or services.

pub mod cache;
pub mod config;
pub mod error;
pub mod geocoder;
pub mod model;
pub mod provider;
pub mod resolver;

pub use cache::{CacheValue, FileCache, ForecastCache, MemoryCache, Ttl};
pub use config::Config;
pub use error::{
    ErrorKind, ErrorResponse, GeocoderError, PipelineError, ValidationError, WeatherError,
};
pub use geocoder::{CensusGeocoder, GeocodingClient};
pub use model::{GeoLocation, LocationQuery, ResolveMode, WeatherReading};
pub use provider::{OpenWeatherClient, WeatherClient};
pub use resolver::{ForecastResolver, ForecastResponse};
