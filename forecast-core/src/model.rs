use serde::{Deserialize, Serialize};

/// Number of fractional digits kept on every coordinate we produce or cache.
pub const COORDINATE_PRECISION: i32 = 7;

/// Which input the deployment resolves from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveMode {
    /// Free-form address, geocoded before the weather lookup.
    #[default]
    Address,
    /// Postal code passed straight to the weather provider.
    PostalCode,
}

impl ResolveMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolveMode::Address => "address",
            ResolveMode::PostalCode => "postal_code",
        }
    }
}

impl std::fmt::Display for ResolveMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single lookup request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationQuery {
    Address(String),
    PostalCode(String),
}

impl LocationQuery {
    /// Builds the query variant a deployment in `mode` expects.
    pub fn for_mode(mode: ResolveMode, input: impl Into<String>) -> Self {
        match mode {
            ResolveMode::Address => LocationQuery::Address(input.into()),
            ResolveMode::PostalCode => LocationQuery::PostalCode(input.into()),
        }
    }
}

/// Normalized location record shared by the geocoder, weather client and cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub postal_code: Option<String>,
}

impl GeoLocation {
    /// Rounds both coordinates to [`COORDINATE_PRECISION`] digits.
    /// A blank postal code is stored as `None`.
    pub fn new(latitude: f64, longitude: f64, postal_code: Option<String>) -> Self {
        Self {
            latitude: round_coordinate(latitude),
            longitude: round_coordinate(longitude),
            postal_code: postal_code
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
        }
    }
}

pub fn round_coordinate(value: f64) -> f64 {
    let factor = 10f64.powi(COORDINATE_PRECISION);
    (value * factor).round() / factor
}

/// Current-temperature reading.
///
/// `cached` is only ever set by the resolver when the value came out of the
/// forecast cache.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    pub temperature_current: f64,
    #[serde(default, skip_serializing_if = "is_false")]
    pub cached: bool,
}

impl WeatherReading {
    pub fn fresh(temperature_current: f64) -> Self {
        Self { temperature_current, cached: false }
    }

    /// Copy of this reading tagged as served from cache.
    pub fn as_cached(&self) -> Self {
        Self { cached: true, ..*self }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}
