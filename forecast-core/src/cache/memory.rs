use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

use super::{CacheValue, Clock, Entries, ForecastCache, Lookup, SystemClock, Ttl};
use crate::error::CacheError;

/// Process-wide in-memory store. Cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct MemoryCache {
    entries: RwLock<Entries>,
    clock: Arc<dyn Clock>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { entries: RwLock::new(Entries::default()), clock }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ForecastCache for MemoryCache {
    async fn read(&self, key: &str) -> Result<Option<CacheValue>, CacheError> {
        let now = self.clock.now();
        let lookup = self.entries.read().lookup(key, now);

        match lookup {
            Lookup::Fresh(value) => Ok(Some(value)),
            Lookup::Expired => {
                tracing::debug!(key, "cache entry expired");
                self.entries.write().evict_expired(key, now);
                Ok(None)
            }
            Lookup::Missing => Ok(None),
        }
    }

    async fn write(&self, key: &str, value: CacheValue, ttl: Ttl) -> Result<(), CacheError> {
        let now = self.clock.now();
        self.entries.write().insert(key, value, ttl, now)
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.entries.write().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::model::{GeoLocation, WeatherReading};
    use std::time::Duration;

    fn cache_with_clock() -> (MemoryCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        (MemoryCache::with_clock(clock.clone()), clock)
    }

    #[tokio::test]
    async fn read_within_ttl_returns_value() {
        let (cache, clock) = cache_with_clock();
        let reading = CacheValue::Weather(WeatherReading::fresh(79.0));

        cache
            .write("forecast/20233", reading.clone(), Ttl::After(Duration::from_secs(1800)))
            .await
            .unwrap();
        clock.advance(chrono::Duration::minutes(29));

        assert_eq!(cache.read("forecast/20233").await.unwrap(), Some(reading));
    }

    #[tokio::test]
    async fn expired_entry_reads_absent_and_is_evicted() {
        let (cache, clock) = cache_with_clock();
        cache
            .write(
                "forecast/20233",
                CacheValue::Weather(WeatherReading::fresh(79.0)),
                Ttl::After(Duration::from_secs(1800)),
            )
            .await
            .unwrap();
        clock.advance(chrono::Duration::minutes(31));

        assert_eq!(cache.read("forecast/20233").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn overwrite_replaces_value_and_ttl() {
        let (cache, clock) = cache_with_clock();
        let key = "address/abc";
        let loc = CacheValue::Location(GeoLocation::new(1.0, 2.0, Some("20233".into())));

        let short_lived = CacheValue::Weather(WeatherReading::fresh(1.0));
        cache.write(key, short_lived, Ttl::After(Duration::from_secs(1))).await.unwrap();
        cache.write(key, loc.clone(), Ttl::Never).await.unwrap();
        clock.advance(chrono::Duration::days(1));

        assert_eq!(cache.read(key).await.unwrap(), Some(loc));
    }

    #[tokio::test]
    async fn clear_drops_never_expiring_entries() {
        let (cache, _clock) = cache_with_clock();
        let loc = CacheValue::Location(GeoLocation::new(1.0, 2.0, None));
        cache.write("address/abc", loc, Ttl::Never).await.unwrap();

        cache.clear().await.unwrap();
        assert_eq!(cache.read("address/abc").await.unwrap(), None);
    }

    #[tokio::test]
    async fn concurrent_writers_do_not_lose_entries() {
        let cache = Arc::new(MemoryCache::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                let key = format!("forecast/{i:05}");
                cache
                    .write(&key, CacheValue::Weather(WeatherReading::fresh(i as f64)), Ttl::Never)
                    .await
                    .unwrap();
                cache.read(&key).await.unwrap()
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_some());
        }
        assert_eq!(cache.len(), 16);
    }
}
