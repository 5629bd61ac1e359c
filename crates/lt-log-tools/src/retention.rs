//! Retention: deleting a destination's log files.
//!
//! Granularity is whole files. `Latest` removes the active file, which drops
//! every record in it, not just the newest one.

use glob::Pattern;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::destination::DestinationResolver;
use crate::resolver;
use crate::types::RetentionAction;

static DATE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-\d{4}-\d{2}-\d{2}$").unwrap());

/// What happened to one destination's files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeletionOutcome {
    /// Files removed.
    pub deleted: Vec<PathBuf>,
    /// Targets already gone by the time they were deleted.
    pub skipped: usize,
    /// One message per file that could not be removed, or per resolution failure.
    pub failures: Vec<String>,
}

impl DeletionOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            failures: vec![reason.into()],
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn merge(&mut self, other: DeletionOutcome) {
        self.deleted.extend(other.deleted);
        self.skipped += other.skipped;
        self.failures.extend(other.failures);
    }
}

/// Per-destination outcomes of a batch deletion plus success/error tallies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetentionSummary {
    pub outcomes: BTreeMap<String, DeletionOutcome>,
    pub success_count: usize,
    pub error_count: usize,
}

impl RetentionSummary {
    pub fn record(&mut self, destination: impl Into<String>, outcome: DeletionOutcome) {
        if outcome.is_success() {
            self.success_count += 1;
        } else {
            self.error_count += 1;
        }
        self.outcomes.insert(destination.into(), outcome);
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }
}

/// Files `action` would remove for the active log file at `path`.
///
/// `All` widens a dated file name (`app-2024-01-02.log`) to every
/// `app-*.log` in the same directory; an undated name stays a single file.
pub fn deletion_targets(path: &Path, action: RetentionAction) -> Vec<PathBuf> {
    match action {
        RetentionAction::Latest => {
            if path.exists() {
                vec![path.to_path_buf()]
            } else {
                Vec::new()
            }
        }
        RetentionAction::All => rotation_group(path),
    }
}

fn rotation_group(path: &Path) -> Vec<PathBuf> {
    let dir = resolver::parent_dir(path);
    if !dir.is_dir() {
        return Vec::new();
    }
    let Some(stem) = path.file_stem().map(|s| s.to_string_lossy()) else {
        return Vec::new();
    };

    if !DATE_SUFFIX.is_match(&stem) {
        return if path.is_file() {
            vec![path.to_path_buf()]
        } else {
            Vec::new()
        };
    }

    let base = DATE_SUFFIX.replace(&stem, "");
    let pattern = format!(
        "{}/{}-*.log",
        Pattern::escape(&dir.to_string_lossy()),
        Pattern::escape(&base)
    );
    resolver::matching_files(&pattern)
        .into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Delete the files `action` selects for the active log file at `path`.
///
/// Best effort: a file that vanished before removal is skipped, and a
/// failure on one file does not stop the others.
pub fn delete_by_policy(path: &Path, action: RetentionAction) -> DeletionOutcome {
    remove_files(deletion_targets(path, action), action)
}

fn remove_files(targets: Vec<PathBuf>, action: RetentionAction) -> DeletionOutcome {
    let mut outcome = DeletionOutcome::default();
    for target in targets {
        match std::fs::remove_file(&target) {
            Ok(()) => {
                tracing::info!(path = %target.display(), %action, "deleted log file");
                outcome.deleted.push(target);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => outcome.skipped += 1,
            Err(e) => {
                tracing::warn!(path = %target.display(), error = %e, "failed to delete log file");
                outcome.failures.push(format!("{}: {e}", target.display()));
            }
        }
    }
    outcome
}

/// Apply `action` to one destination: resolve each backing file to the
/// active (latest) file and delete by policy.
pub fn delete_destination(
    resolver: &dyn DestinationResolver,
    destination: &str,
    action: RetentionAction,
) -> DeletionOutcome {
    let paths = match resolver.resolve(destination) {
        Ok(paths) => paths,
        Err(e) => {
            tracing::warn!(destination, error = %e, "cannot resolve destination for deletion");
            return DeletionOutcome::failed(e.to_string());
        }
    };

    let mut outcome = DeletionOutcome::default();
    for path in paths {
        match resolver::resolve_latest(&path) {
            Some(active) => outcome.merge(delete_by_policy(&active, action)),
            None => tracing::debug!(path = %path.display(), "no log file to delete"),
        }
    }
    outcome
}

/// Apply `action` to several destinations, continuing past failures.
pub fn delete_destinations(
    resolver: &dyn DestinationResolver,
    destinations: &[String],
    action: RetentionAction,
) -> RetentionSummary {
    let mut summary = RetentionSummary::default();
    for destination in destinations {
        summary.record(destination.as_str(), delete_destination(resolver, destination, action));
    }
    tracing::info!(
        success = summary.success_count,
        errors = summary.error_count,
        %action,
        "retention completed"
    );
    summary
}
