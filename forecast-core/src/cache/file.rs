//! JSON-file backed cache so separate CLI runs share geocodes and readings.
//!
//! The file is the only copy of the data. Every operation takes an advisory
//! lock on a `<cache>.lock` sidecar and works on what is on disk right now,
//! so several processes (or several `FileCache` values in one process) can
//! share a path without dropping each other's entries.

use async_trait::async_trait;
use fd_lock::RwLock;
use parking_lot::Mutex;
use std::{
    ffi::OsString,
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};
use tempfile::NamedTempFile;

use super::{CacheValue, Clock, Entries, ForecastCache, Lookup, SystemClock, Ttl};
use crate::error::CacheError;

#[derive(Debug)]
pub struct FileCache {
    path: PathBuf,
    lock: Mutex<RwLock<File>>,
    clock: Arc<dyn Clock>,
}

impl FileCache {
    /// Open (or lazily create) the cache file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        Self::open_with_clock(path, Arc::new(SystemClock))
    }

    pub fn open_with_clock(
        path: impl Into<PathBuf>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CacheError> {
        let path = path.into();
        let dir = parent_dir(&path);
        fs::create_dir_all(dir).map_err(|e| CacheError::Backend {
            message: format!("failed to create cache directory {}: {e}", dir.display()),
        })?;

        let lock_path = lock_path(&path);
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&lock_path)
            .map_err(|e| CacheError::Backend {
                message: format!("failed to open cache lock {}: {e}", lock_path.display()),
            })?;

        Ok(Self { path, lock: Mutex::new(RwLock::new(lock_file)), clock })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs `apply` against the current on-disk map under the exclusive lock
    /// and writes the result back. Nothing is written if `apply` fails.
    fn update<F>(&self, apply: F) -> Result<(), CacheError>
    where
        F: FnOnce(&mut Entries) -> Result<(), CacheError>,
    {
        let mut lock = self.lock.lock();
        let _guard = lock.write().map_err(|e| CacheError::Backend {
            message: format!("failed to lock cache file {}: {e}", self.path.display()),
        })?;

        let mut entries = load_entries(&self.path)?;
        entries.prune(self.clock.now());
        apply(&mut entries)?;
        self.persist(&entries)
    }

    /// Stages the map in a fresh temp file next to the cache, then renames it
    /// into place, so readers only ever see a complete file.
    fn persist(&self, entries: &Entries) -> Result<(), CacheError> {
        let json = serde_json::to_string(entries)
            .map_err(|e| CacheError::Serialization { message: e.to_string() })?;

        let dir = parent_dir(&self.path);
        let mut staged = NamedTempFile::new_in(dir).map_err(|e| CacheError::Backend {
            message: format!("failed to stage cache file in {}: {e}", dir.display()),
        })?;
        staged.write_all(json.as_bytes()).map_err(|e| CacheError::Backend {
            message: format!("failed to write cache file {}: {e}", staged.path().display()),
        })?;
        staged.persist(&self.path).map_err(|e| CacheError::Backend {
            message: format!("failed to replace cache file {}: {e}", self.path.display()),
        })?;

        Ok(())
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

fn load_entries(path: &Path) -> Result<Entries, CacheError> {
    if !path.exists() {
        return Ok(Entries::default());
    }

    let contents = fs::read_to_string(path).map_err(|e| CacheError::Backend {
        message: format!("failed to read cache file {}: {e}", path.display()),
    })?;

    match serde_json::from_str(&contents) {
        Ok(entries) => Ok(entries),
        Err(e) => {
            // A corrupt cache is not worth failing a lookup over; start over.
            tracing::warn!(path = %path.display(), error = %e, "discarding unreadable cache file");
            Ok(Entries::default())
        }
    }
}

#[async_trait]
impl ForecastCache for FileCache {
    async fn read(&self, key: &str) -> Result<Option<CacheValue>, CacheError> {
        let now = self.clock.now();
        let lock = self.lock.lock();
        let _guard = lock.read().map_err(|e| CacheError::Backend {
            message: format!("failed to lock cache file {}: {e}", self.path.display()),
        })?;

        // Expired entries are dropped from the file by the next write.
        match load_entries(&self.path)?.lookup(key, now) {
            Lookup::Fresh(value) => Ok(Some(value)),
            Lookup::Expired => {
                tracing::debug!(key, "cache entry expired");
                Ok(None)
            }
            Lookup::Missing => Ok(None),
        }
    }

    async fn write(&self, key: &str, value: CacheValue, ttl: Ttl) -> Result<(), CacheError> {
        let now = self.clock.now();
        self.update(|entries| entries.insert(key, value, ttl, now))
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.update(|entries| {
            entries.clear();
            Ok(())
        })
    }
}
