//! Test doubles: a map-backed destination resolver and a settable clock.

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::Clock;
use crate::destination::DestinationResolver;
use crate::error::{LogError, LogResult};

/// A destination resolver that serves pre-registered paths by name.
pub struct MockDestinations {
    destinations: HashMap<String, Option<Vec<PathBuf>>>,
}

impl MockDestinations {
    pub fn new() -> Self {
        Self {
            destinations: HashMap::new(),
        }
    }

    /// Register a destination backed by the given files.
    pub fn add(&mut self, name: impl Into<String>, paths: Vec<PathBuf>) {
        self.destinations.insert(name.into(), Some(paths));
    }

    /// Register a destination whose resolution always fails.
    pub fn add_failure(&mut self, name: impl Into<String>) {
        self.destinations.insert(name.into(), None);
    }
}

impl Default for MockDestinations {
    fn default() -> Self {
        Self::new()
    }
}

impl DestinationResolver for MockDestinations {
    fn resolve(&self, destination: &str) -> LogResult<Vec<PathBuf>> {
        match self.destinations.get(destination) {
            Some(Some(paths)) => Ok(paths.clone()),
            Some(None) => Err(LogError::resolution(destination, "mock failure")),
            None => Err(LogError::NotFound(destination.to_string())),
        }
    }
}

/// A clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock() = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        if let Some(later) = TimeDelta::from_std(by)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
        {
            *now = later;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
