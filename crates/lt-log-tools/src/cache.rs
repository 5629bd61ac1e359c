//! Comparison cache: per-source count snapshots and run-to-run deltas.
//!
//! The store and the clock are injected. The read-compare-write sequence
//! is not locked, so two comparisons racing on one source identifier can
//! lose a snapshot write; the cached counts are informational only.

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::counter;
use crate::error::{LogError, LogResult};
use crate::types::{ComparisonResult, SeverityCounts, UNKNOWN_SOURCE};

/// Prefix of every snapshot key in the cache store.
pub const CACHE_KEY_PREFIX: &str = "logtally_cached_severity_counts_";

/// Default snapshot lifetime.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(600);

/// Format of `cachedAt` timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const CACHED_AT_KEY: &str = "cachedAt";

// ── Clock ─────────────────────────────────────────────────────

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(ttl)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

// ── Cache Store ───────────────────────────────────────────────

/// Key-value store with per-entry time-to-live.
pub trait CacheStore: Send + Sync {
    /// The live value under `key`; expired entries read as absent.
    fn get(&self, key: &str) -> LogResult<Option<Value>>;

    fn put(&self, key: &str, value: Value, ttl: Duration) -> LogResult<()>;

    fn forget(&self, key: &str) -> LogResult<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    value: Value,
    expires_at: DateTime<Utc>,
}

impl CacheEntry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Process-local cache store.
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryCacheStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &str) -> LogResult<Option<Value>> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let live = entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone());
        if live.is_none() {
            entries.remove(key);
        }
        Ok(live)
    }

    fn put(&self, key: &str, value: Value, ttl: Duration) -> LogResult<()> {
        let expires_at = expiry(self.clock.now(), ttl);
        self.entries
            .lock()
            .insert(key.to_string(), CacheEntry { value, expires_at });
        Ok(())
    }

    fn forget(&self, key: &str) -> LogResult<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Cache store persisted as one JSON document on disk.
///
/// A missing or unparseable document reads as an empty cache.
pub struct FileCacheStore {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    // Serializes load-modify-save within this process.
    guard: Mutex<()>,
}

impl FileCacheStore {
    pub fn new(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            clock,
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> LogResult<BTreeMap<String, CacheEntry>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(LogError::Cache(format!("{}: {e}", self.path.display()))),
        };
        match serde_json::from_str(&contents) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "discarding unreadable cache file"
                );
                Ok(BTreeMap::new())
            }
        }
    }

    fn save(&self, entries: &BTreeMap<String, CacheEntry>) -> LogResult<()> {
        let to_cache_error =
            |e: std::io::Error| LogError::Cache(format!("{}: {e}", self.path.display()));
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(to_cache_error)?;
        }
        let document = serde_json::to_string_pretty(entries)
            .map_err(|e| LogError::Cache(e.to_string()))?;
        let staging = self.path.with_extension("tmp");
        std::fs::write(&staging, document).map_err(to_cache_error)?;
        std::fs::rename(&staging, &self.path).map_err(to_cache_error)
    }
}

impl CacheStore for FileCacheStore {
    fn get(&self, key: &str) -> LogResult<Option<Value>> {
        let _guard = self.guard.lock();
        let now = self.clock.now();
        Ok(self
            .load()?
            .remove(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value))
    }

    fn put(&self, key: &str, value: Value, ttl: Duration) -> LogResult<()> {
        let _guard = self.guard.lock();
        let now = self.clock.now();
        let mut entries = self.load()?;
        entries.retain(|_, entry| entry.is_live(now));
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: expiry(now, ttl),
            },
        );
        self.save(&entries)
    }

    fn forget(&self, key: &str) -> LogResult<()> {
        let _guard = self.guard.lock();
        let mut entries = self.load()?;
        if entries.remove(key).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }
}

// ── Snapshots ─────────────────────────────────────────────────

/// Counts persisted for one source, with the time they were taken.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachedSnapshot {
    pub counts: SeverityCounts,
    pub cached_at: Option<String>,
}

impl CachedSnapshot {
    /// Flat mapping: the eight level keys plus `cachedAt`.
    pub fn to_value(&self) -> Value {
        let mut map = self.counts.to_mapping();
        map.insert(
            CACHED_AT_KEY.to_string(),
            self.cached_at.clone().map_or(Value::Null, Value::String),
        );
        Value::Object(map)
    }

    /// Lenient decode: missing or malformed fields become zero / None.
    pub fn from_value(value: &Value) -> Self {
        let empty = Map::new();
        let map = value.as_object().unwrap_or(&empty);
        Self {
            counts: SeverityCounts::from_mapping(map),
            cached_at: map
                .get(CACHED_AT_KEY)
                .and_then(Value::as_str)
                .map(String::from),
        }
    }
}

/// Identifier for a destination: the file names of its backing paths joined
/// with `_`, or `unknown` when none can be named.
pub fn source_identifier(paths: &[PathBuf]) -> String {
    let names: Vec<String> = paths
        .iter()
        .filter_map(|path| path.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .collect();
    if names.is_empty() {
        UNKNOWN_SOURCE.to_string()
    } else {
        names.join("_")
    }
}

pub fn cache_key(source_identifier: &str) -> String {
    format!("{CACHE_KEY_PREFIX}{source_identifier}")
}

// ── Comparison Cache ──────────────────────────────────────────

/// Compares fresh counts against the last snapshot and stores the new one.
pub struct ComparisonCache {
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl ComparisonCache {
    pub fn new(store: Arc<dyn CacheStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            ttl: DEFAULT_CACHE_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Count `content` and compare it with the snapshot under `cache_key`.
    pub fn compare_and_cache(
        &self,
        source_identifier: &str,
        content: &str,
        cache_key: &str,
        ttl: Duration,
    ) -> ComparisonResult {
        self.compare_counts(
            source_identifier,
            counter::count_severities(content),
            cache_key,
            ttl,
        )
    }

    /// `compare_and_cache` with the derived key and configured TTL.
    pub fn compare_content(&self, source_identifier: &str, content: &str) -> ComparisonResult {
        self.compare_and_cache(
            source_identifier,
            content,
            &cache_key(source_identifier),
            self.ttl,
        )
    }

    /// Count a destination's backing files and compare.
    pub fn compare_files(&self, paths: &[PathBuf]) -> LogResult<ComparisonResult> {
        let source = source_identifier(paths);
        let current = counter::count_files(paths)?;
        Ok(self.compare_counts(&source, current, &cache_key(&source), self.ttl))
    }

    /// Core protocol: read the previous snapshot (absent or expired means
    /// zero counts and no timestamp), write the current one, and report the
    /// delta together with the previous snapshot's timestamp.
    pub fn compare_counts(
        &self,
        source_identifier: &str,
        current: SeverityCounts,
        cache_key: &str,
        ttl: Duration,
    ) -> ComparisonResult {
        let previous = self.read_snapshot(cache_key);

        let snapshot = CachedSnapshot {
            counts: current,
            cached_at: Some(format_timestamp(self.clock.now())),
        };
        if let Err(e) = self.store.put(cache_key, snapshot.to_value(), ttl) {
            tracing::warn!(key = cache_key, error = %e, "failed to store count snapshot");
        }

        ComparisonResult::new(
            current,
            previous.counts,
            source_identifier,
            previous.cached_at,
        )
    }

    fn read_snapshot(&self, cache_key: &str) -> CachedSnapshot {
        match self.store.get(cache_key) {
            Ok(Some(value)) => CachedSnapshot::from_value(&value),
            Ok(None) => CachedSnapshot::default(),
            Err(e) => {
                tracing::warn!(key = cache_key, error = %e, "failed to read count snapshot");
                CachedSnapshot::default()
            }
        }
    }
}
