//! Shared test harness for E2E integration tests.
//!
//! Lays out a scratch application with real log directories, a TOML config
//! and a file-backed comparison cache, and drives it through `LogToolkit`.

#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use lt_log_tools::{
    ConfiguredDestinations, FileCacheStore, LogToolkit, ManualClock, ToolkitConfig,
};

/// Daily logs live in their own directory so that sibling fallback never
/// picks up another destination's file.
const CONFIG_TEMPLATE: &str = r#"
comparison_cache_ttl_secs = 600
cache_path = "{root}/cache/logtally.json"

[destinations.daily]
driver = "daily"
path = "{root}/logs/daily/laravel.log"

[destinations.payments]
driver = "single"
path = "{root}/logs/payments.log"

[destinations.audit]
driver = "stream"
url = "file://{root}/logs/audit/audit.log"

[destinations.stderr]
driver = "stream"
url = "php://stderr"

[destinations.everything]
driver = "stack"
destinations = ["daily", "payments", "stderr"]

[destinations.null]
driver = "null"

[destinations.broken]
driver = "stack"
destinations = ["payments", "nowhere"]
"#;

/// End-to-end harness: scratch directory, manual clock and a toolkit.
pub struct TestHarness {
    /// Root of the scratch application.
    pub dir: TempDir,
    /// Clock shared by the cache store and the comparison cache.
    pub clock: Arc<ManualClock>,
    /// Toolkit under test.
    pub toolkit: LogToolkit,
}

impl TestHarness {
    /// Create a harness with the standard destination layout and empty logs.
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        for sub in ["logs/daily", "logs/audit"] {
            fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        let clock = Arc::new(ManualClock::new(start_time()));
        let toolkit = build_toolkit(&dir, &clock);
        Self {
            dir,
            clock,
            toolkit,
        }
    }

    /// Replace the toolkit with a fresh one over the same directory and cache
    /// file, as a second process run would see it.
    pub fn restart(&mut self) {
        self.toolkit = build_toolkit(&self.dir, &self.clock);
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// Overwrite a log file (relative to the scratch root).
    pub fn write_log(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.path(relative);
        fs::write(&path, content).unwrap();
        path
    }

    pub fn append_log(&self, relative: &str, content: &str) {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(relative))
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    /// Backdate a file's modification time.
    pub fn age(&self, relative: &str, secs: u64) {
        let file = fs::OpenOptions::new()
            .write(true)
            .open(self.path(relative))
            .unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(secs))
            .unwrap();
    }

    pub fn advance(&self, secs: u64) {
        self.clock.advance(Duration::from_secs(secs));
    }

    pub fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap()
}

fn build_toolkit(dir: &TempDir, clock: &Arc<ManualClock>) -> LogToolkit {
    let toml = CONFIG_TEMPLATE.replace("{root}", &dir.path().display().to_string());
    let config = ToolkitConfig::from_toml_str(&toml).unwrap();
    let resolver = ConfiguredDestinations::from_config(&config);
    let cache_path = config.cache_path.clone().unwrap();
    let store = FileCacheStore::new(cache_path, clock.clone());
    LogToolkit::new(config, Box::new(resolver), Arc::new(store), clock.clone())
}

/// One log line in the `[timestamp] channel.LEVEL: message` layout.
pub fn record(level: &str, message: &str) -> String {
    format!("[2024-03-01 09:00:00] production.{level}: {message}\n")
}

/// Several records concatenated.
pub fn records(entries: &[(&str, &str)]) -> String {
    entries
        .iter()
        .map(|(level, message)| record(level, message))
        .collect()
}
