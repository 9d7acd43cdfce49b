use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{collections::HashMap, fmt::Debug, time::Duration};

use crate::{
    error::CacheError,
    model::{GeoLocation, WeatherReading},
};

pub mod file;
pub mod memory;

pub use file::FileCache;
pub use memory::MemoryCache;

const ADDRESS_NAMESPACE: &str = "address";
const FORECAST_NAMESPACE: &str = "forecast";

/// Default lifetime of a cached weather reading.
pub const WEATHER_CACHE_TTL: Duration = Duration::from_secs(60 * 30);

/// Cache key for a geocoded address: `address/<sha256 of the normalized text>`.
pub fn address_key(address: &str) -> String {
    let normalized = address.trim().to_lowercase();
    let digest = Sha256::digest(normalized.as_bytes());
    format!("{ADDRESS_NAMESPACE}/{}", hex::encode(digest))
}

/// Cache key for a weather reading: `forecast/<postal code>`.
pub fn forecast_key(postal_code: &str) -> String {
    format!("{FORECAST_NAMESPACE}/{}", postal_code.trim())
}

/// How long an entry stays readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    Never,
    After(Duration),
}

/// Values the pipeline stores. Both namespaces share one store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CacheValue {
    Location(GeoLocation),
    Weather(WeatherReading),
}

#[async_trait]
pub trait ForecastCache: Send + Sync + Debug {
    /// Returns `None` for missing or expired keys.
    async fn read(&self, key: &str) -> Result<Option<CacheValue>, CacheError>;

    async fn write(&self, key: &str, value: CacheValue, ttl: Ttl) -> Result<(), CacheError>;

    async fn clear(&self) -> Result<(), CacheError>;
}

/// Time source for expiry checks.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: parking_lot::Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: parking_lot::Mutex::new(start) }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    value: CacheValue,
    /// `None` never expires.
    expires_at: Option<DateTime<Utc>>,
}

impl StoredEntry {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// Entry map shared by the in-memory and file-backed stores.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
struct Entries {
    map: HashMap<String, StoredEntry>,
}

enum Lookup {
    Fresh(CacheValue),
    Expired,
    Missing,
}

impl Entries {
    fn lookup(&self, key: &str, now: DateTime<Utc>) -> Lookup {
        match self.map.get(key) {
            Some(entry) if entry.is_fresh(now) => Lookup::Fresh(entry.value.clone()),
            Some(_) => Lookup::Expired,
            None => Lookup::Missing,
        }
    }

    fn insert(
        &mut self,
        key: &str,
        value: CacheValue,
        ttl: Ttl,
        now: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        let expires_at = match ttl {
            Ttl::Never => None,
            Ttl::After(duration) => {
                let delta = chrono::Duration::from_std(duration)
                    .map_err(|_| CacheError::Backend { message: "TTL overflow".into() })?;
                Some(now.checked_add_signed(delta).ok_or_else(|| CacheError::Backend {
                    message: "TTL overflow".into(),
                })?)
            }
        };
        self.map.insert(key.to_string(), StoredEntry { value, expires_at });
        Ok(())
    }

    /// Drops `key` only if it is still expired at `now`.
    fn evict_expired(&mut self, key: &str, now: DateTime<Utc>) -> bool {
        match self.map.get(key) {
            Some(entry) if !entry.is_fresh(now) => {
                self.map.remove(key);
                true
            }
            _ => false,
        }
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        self.map.retain(|_, entry| entry.is_fresh(now));
    }

    fn clear(&mut self) {
        self.map.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_key_normalizes_case_and_whitespace() {
        let a = address_key("4600 Silver Hill Rd, Washington, DC");
        let b = address_key("  4600 SILVER HILL RD, washington, dc \n");
        assert_eq!(a, b);
        assert!(a.starts_with("address/"));
        // 32-byte digest, hex encoded
        assert_eq!(a.len(), "address/".len() + 64);
    }

    #[test]
    fn address_key_differs_per_address() {
        assert_ne!(address_key("1 Main St"), address_key("2 Main St"));
    }

    #[test]
    fn forecast_key_uses_postal_code() {
        assert_eq!(forecast_key("20233"), "forecast/20233");
    }

    #[test]
    fn entry_expiry_boundary() {
        let clock = ManualClock::default();
        let mut entries = Entries::default();
        entries
            .insert(
                "k",
                CacheValue::Weather(WeatherReading::fresh(1.0)),
                Ttl::After(Duration::from_secs(60)),
                clock.now(),
            )
            .unwrap();

        clock.advance(chrono::Duration::seconds(59));
        assert!(matches!(entries.lookup("k", clock.now()), Lookup::Fresh(_)));

        clock.advance(chrono::Duration::seconds(1));
        assert!(matches!(entries.lookup("k", clock.now()), Lookup::Expired));
        assert!(entries.evict_expired("k", clock.now()));
        assert!(matches!(entries.lookup("k", clock.now()), Lookup::Missing));
    }

    #[test]
    fn never_ttl_does_not_expire() {
        let clock = ManualClock::default();
        let mut entries = Entries::default();
        let loc = GeoLocation::new(1.0, 2.0, None);
        entries.insert("k", CacheValue::Location(loc.clone()), Ttl::Never, clock.now()).unwrap();

        clock.advance(chrono::Duration::days(3650));
        match entries.lookup("k", clock.now()) {
            Lookup::Fresh(CacheValue::Location(found)) => assert_eq!(found, loc),
            _ => panic!("expected a fresh location entry"),
        }
    }

    #[test]
    fn cache_value_serialization_is_tagged() {
        let json = serde_json::to_value(CacheValue::Weather(WeatherReading::fresh(79.0))).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "weather", "value": { "temperature_current": 79.0 } })
        );
    }
}
