//! Toolkit configuration, loadable from TOML or environment.

use anyhow::Context;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding `comparison_cache_ttl_secs`.
pub const CACHE_TTL_ENV: &str = "LOGTALLY_COMPARISON_CACHE_TTL";

/// Top-level configuration for the log toolkit.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolkitConfig {
    /// How long a cached count snapshot stays valid, in seconds.
    #[serde(default = "default_cache_ttl")]
    pub comparison_cache_ttl_secs: u64,
    /// JSON file backing the comparison cache. None keeps snapshots in memory.
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
    /// Destinations skipped when analysing "all" destinations.
    #[serde(default = "default_excluded_destinations")]
    pub excluded_destinations: Vec<String>,
    /// Named log destinations and the handler backing each.
    #[serde(default)]
    pub destinations: BTreeMap<String, HandlerConfig>,
}

/// How a destination writes its records.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "driver", rename_all = "snake_case")]
pub enum HandlerConfig {
    /// One file that grows forever.
    Single { path: String },
    /// Configured base path; the handler writes `<stem>-YYYY-MM-DD.log` next to it.
    Daily { path: String },
    /// A stream URL; only `file://` URLs and bare paths are backed by files.
    Stream { url: String },
    /// Fan-out to other (non-stack) destinations.
    Stack { destinations: Vec<String> },
    /// Discards records.
    Null,
}

fn default_cache_ttl() -> u64 {
    600
}

fn default_excluded_destinations() -> Vec<String> {
    [
        "single",
        "daily",
        "null",
        "papertrail",
        "stderr",
        "syslog",
        "errorlog",
        "slack",
        "emergency",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            comparison_cache_ttl_secs: default_cache_ttl(),
            cache_path: None,
            excluded_destinations: default_excluded_destinations(),
            destinations: BTreeMap::new(),
        }
    }
}

impl ToolkitConfig {
    /// Load config from a TOML file path, then apply environment overrides.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = Self::from_toml_str(&contents)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config.apply_env())
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply `LOGTALLY_COMPARISON_CACHE_TTL` if set.
    pub fn apply_env(self) -> Self {
        self.with_ttl_override(std::env::var(CACHE_TTL_ENV).ok())
    }

    fn with_ttl_override(mut self, raw: Option<String>) -> Self {
        let Some(raw) = raw else {
            return self;
        };
        match raw.trim().parse::<u64>() {
            Ok(secs) => self.comparison_cache_ttl_secs = secs,
            Err(e) => tracing::warn!(
                value = %raw,
                error = %e,
                "ignoring invalid {CACHE_TTL_ENV}"
            ),
        }
        self
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.comparison_cache_ttl_secs)
    }
}
