use async_trait::async_trait;
use std::fmt::Debug;

use crate::{error::GeocoderError, model::GeoLocation};

pub mod census;

pub use census::CensusGeocoder;

/// Converts free-text addresses into a [`GeoLocation`].
#[async_trait]
pub trait GeocodingClient: Send + Sync + Debug {
    async fn geocode(&self, address: &str) -> Result<GeoLocation, GeocoderError>;
}
