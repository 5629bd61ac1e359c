//! Log analysis tools for logtally.
//!
//! Counts records per severity in application log files, compares counts
//! against a cached snapshot from the previous run, extracts the last record
//! (optionally with its stack trace), applies retention by deleting files,
//! and aggregates all of it across configured log destinations.

pub mod aggregator;
pub mod cache;
pub mod config;
pub mod counter;
pub mod destination;
pub mod error;
pub mod extractor;
pub mod mock;
pub mod resolver;
pub mod retention;
pub mod source;
pub mod toolkit;
pub mod types;

// Re-export key types for convenience
pub use cache::{CacheStore, Clock, ComparisonCache, FileCacheStore, MemoryCacheStore, SystemClock};
pub use config::{HandlerConfig, ToolkitConfig};
pub use destination::{ConfiguredDestinations, DestinationResolver, HandlerPath};
pub use error::{LogError, LogResult};
pub use mock::{ManualClock, MockDestinations};
pub use retention::{DeletionOutcome, RetentionSummary};
pub use toolkit::LogToolkit;
pub use types::{
    AggregateEntry, AggregateResult, ComparisonResult, RetentionAction, Severity, SeverityCounts,
    SeverityDeltas,
};
