//! Aggregation of severity counts across named destinations.

use crate::cache::ComparisonCache;
use crate::counter;
use crate::destination::DestinationResolver;
use crate::error::LogResult;
use crate::types::{AggregateEntry, AggregateResult, ComparisonResult, SeverityCounts};

/// Count (or, with a cache, compare) every destination in turn.
///
/// A destination that fails to resolve or read contributes an all-zero
/// placeholder, so the result always holds one entry per requested name.
pub fn aggregate(
    resolver: &dyn DestinationResolver,
    destinations: &[String],
    cache: Option<&ComparisonCache>,
) -> AggregateResult {
    let mut result = AggregateResult::new();
    for destination in destinations {
        let entry = analyze(resolver, destination, cache).unwrap_or_else(|e| {
            tracing::warn!(destination = %destination, error = %e, "destination analysis failed");
            placeholder(cache.is_some())
        });
        result.insert(destination.as_str(), entry);
    }
    tracing::debug!(
        destinations = result.len(),
        total = result.total(),
        "aggregated destinations"
    );
    result
}

fn analyze(
    resolver: &dyn DestinationResolver,
    destination: &str,
    cache: Option<&ComparisonCache>,
) -> LogResult<AggregateEntry> {
    let paths = resolver.resolve(destination)?;
    Ok(match cache {
        Some(cache) => cache.compare_files(&paths)?.into(),
        None => counter::count_files(&paths)?.into(),
    })
}

fn placeholder(compare: bool) -> AggregateEntry {
    if compare {
        ComparisonResult::placeholder().into()
    } else {
        SeverityCounts::default().into()
    }
}
