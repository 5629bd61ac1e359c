//! Single entry point wiring config, destinations and the comparison cache.

use std::sync::Arc;

use crate::aggregator;
use crate::cache::{
    CacheStore, Clock, ComparisonCache, FileCacheStore, MemoryCacheStore, SystemClock,
};
use crate::config::ToolkitConfig;
use crate::counter;
use crate::destination::{ConfiguredDestinations, DestinationResolver};
use crate::error::LogResult;
use crate::extractor;
use crate::retention::{self, DeletionOutcome, RetentionSummary};
use crate::types::{AggregateResult, ComparisonResult, RetentionAction, Severity, SeverityCounts};

pub struct LogToolkit {
    config: ToolkitConfig,
    resolver: Box<dyn DestinationResolver>,
    cache: ComparisonCache,
    excluded: Vec<String>,
}

impl LogToolkit {
    pub fn new(
        config: ToolkitConfig,
        resolver: Box<dyn DestinationResolver>,
        store: Arc<dyn CacheStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = ComparisonCache::new(store, clock).with_ttl(config.cache_ttl());
        Self {
            excluded: config.excluded_destinations.clone(),
            config,
            resolver,
            cache,
        }
    }

    /// Build from config alone: configured destinations, wall clock, and a
    /// file-backed cache when `cache_path` is set.
    pub fn from_config(config: ToolkitConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let store: Arc<dyn CacheStore> = match &config.cache_path {
            Some(path) => Arc::new(FileCacheStore::new(path.clone(), clock.clone())),
            None => Arc::new(MemoryCacheStore::new(clock.clone())),
        };
        let resolver = Box::new(ConfiguredDestinations::from_config(&config));
        Self::new(config, resolver, store, clock)
    }

    pub fn config(&self) -> &ToolkitConfig {
        &self.config
    }

    pub fn cache(&self) -> &ComparisonCache {
        &self.cache
    }

    // ── Analysis ──────────────────────────────────────────────

    pub fn count_destination(&self, destination: &str) -> LogResult<SeverityCounts> {
        counter::count_files(&self.resolver.resolve(destination)?)
    }

    /// Total number of records in a destination.
    pub fn record_count(&self, destination: &str) -> LogResult<u64> {
        Ok(self.count_destination(destination)?.total())
    }

    pub fn compare_destination(&self, destination: &str) -> LogResult<ComparisonResult> {
        let paths = self.resolver.resolve(destination)?;
        self.cache.compare_files(&paths)
    }

    /// Last record of a destination, searching its backing files in order
    /// and returning the first match.
    pub fn last_record(
        &self,
        destination: &str,
        level: Option<Severity>,
        with_stack_trace: bool,
    ) -> LogResult<Option<String>> {
        for path in self.resolver.resolve(destination)? {
            if let Some(record) =
                extractor::extract_last_record_from_file(&path, level, with_stack_trace)?
            {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    pub fn last_error(
        &self,
        destination: &str,
        with_stack_trace: bool,
    ) -> LogResult<Option<String>> {
        self.last_record(destination, Some(Severity::Error), with_stack_trace)
    }

    // ── Retention ─────────────────────────────────────────────

    pub fn delete_destination(
        &self,
        destination: &str,
        action: RetentionAction,
    ) -> DeletionOutcome {
        retention::delete_destination(self.resolver.as_ref(), destination, action)
    }

    pub fn delete_destinations(
        &self,
        destinations: &[String],
        action: RetentionAction,
    ) -> RetentionSummary {
        retention::delete_destinations(self.resolver.as_ref(), destinations, action)
    }

    // ── Aggregation ───────────────────────────────────────────

    /// Replace the exclusion list.
    pub fn exclude<I, S>(mut self, destinations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded = destinations.into_iter().map(Into::into).collect();
        self
    }

    /// Remove names from the exclusion list.
    pub fn include<I, S>(mut self, destinations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let included: Vec<String> = destinations.into_iter().map(Into::into).collect();
        self.excluded.retain(|name| !included.contains(name));
        self
    }

    pub fn excluded_destinations(&self) -> &[String] {
        &self.excluded
    }

    /// Configured destinations minus the exclusion list.
    pub fn analyzable_destinations(&self) -> Vec<String> {
        self.config
            .destinations
            .keys()
            .filter(|name| !self.excluded.contains(name))
            .cloned()
            .collect()
    }

    /// Aggregate every analyzable destination.
    pub fn aggregate(&self, use_cache: bool) -> AggregateResult {
        self.aggregate_destinations(&self.analyzable_destinations(), use_cache)
    }

    pub fn aggregate_destinations(
        &self,
        destinations: &[String],
        use_cache: bool,
    ) -> AggregateResult {
        let cache = use_cache.then_some(&self.cache);
        aggregator::aggregate(self.resolver.as_ref(), destinations, cache)
    }
}
