//! Severity counting over raw log text.
//!
//! Counts non-overlapping occurrences of each level marker (`.ERROR`,
//! `.INFO`, ...) anywhere in the content. A marker quoted inside a message
//! body counts the same as a real `channel.LEVEL:` header; comparisons and
//! cached snapshots are calibrated to this substring behaviour.

use std::path::{Path, PathBuf};

use crate::error::LogResult;
use crate::source;
use crate::types::{Severity, SeverityCounts};

/// Count level markers in `content`.
pub fn count_severities(content: &str) -> SeverityCounts {
    Severity::ALL.iter().fold(SeverityCounts::default(), |counts, level| {
        counts.with(*level, content.matches(level.marker()).count() as u64)
    })
}

/// Count level markers in the file behind a nominal log path.
///
/// Resolves rotated siblings first; a missing or empty file counts as zero.
pub fn count_file(path: &Path) -> LogResult<SeverityCounts> {
    let counts = match source::load_latest_content(path)? {
        Some((read, content)) => {
            let counts = count_severities(&content);
            tracing::debug!(path = %read.display(), total = counts.total(), "counted log file");
            counts
        }
        None => SeverityCounts::default(),
    };
    Ok(counts)
}

/// Sum of `count_file` over several backing files.
pub fn count_files(paths: &[PathBuf]) -> LogResult<SeverityCounts> {
    paths.iter().try_fold(SeverityCounts::default(), |acc, path| {
        Ok(acc.merge(&count_file(path)?))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const ONE_OF_EACH: &str = "\
[2024-01-01 00:00:00] local.EMERGENCY: a
[2024-01-01 00:00:01] local.ALERT: b
[2024-01-01 00:00:02] local.CRITICAL: c
[2024-01-01 00:00:03] local.ERROR: d
[2024-01-01 00:00:04] local.WARNING: e
[2024-01-01 00:00:05] local.NOTICE: f
[2024-01-01 00:00:06] local.INFO: g
[2024-01-01 00:00:07] local.DEBUG: h
";

    #[test]
    fn one_marker_of_each_level() {
        let counts = count_severities(ONE_OF_EACH);
        for level in Severity::ALL {
            assert_eq!(counts.get(level), 1, "{level}");
        }
        assert_eq!(counts.total(), 8);
    }

    #[test]
    fn empty_content_is_zero() {
        assert_eq!(count_severities(""), SeverityCounts::default());
    }

    #[test]
    fn markers_inside_messages_are_counted() {
        let content = "[2024-01-01 00:00:00] local.INFO: user typed \"app.ERROR\" into search\n";
        let counts = count_severities(content);
        assert_eq!(counts.info, 1);
        assert_eq!(counts.error, 1);
    }

    #[test]
    fn lowercase_levels_are_not_markers() {
        let counts = count_severities("local.error: nope\nlocal.Info: nope\n");
        assert_eq!(counts.total(), 0);
    }

    #[test]
    fn markers_without_colon_still_count() {
        let counts = count_severities("production.ERROR production.ERROR\n");
        assert_eq!(counts.error, 2);
    }

    #[test]
    fn missing_file_is_zero() {
        let dir = TempDir::new().unwrap();
        let counts = count_file(&dir.path().join("laravel.log")).unwrap();
        assert_eq!(counts, SeverityCounts::default());
    }

    #[test]
    fn empty_file_is_zero() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("laravel.log");
        fs::write(&path, "").unwrap();
        assert_eq!(count_file(&path).unwrap().total(), 0);
    }

    #[test]
    fn counts_rotated_file_when_nominal_missing() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("laravel-2024-01-01.log"), ONE_OF_EACH).unwrap();
        let counts = count_file(&dir.path().join("laravel.log")).unwrap();
        assert_eq!(counts.total(), 8);
    }

    #[test]
    fn count_files_sums_paths() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.log");
        let b = dir.path().join("b.log");
        fs::write(&a, ONE_OF_EACH).unwrap();
        fs::write(&b, "[x] local.ERROR: again\n").unwrap();
        let counts = count_files(&[a, b]).unwrap();
        assert_eq!(counts.error, 2);
        assert_eq!(counts.total(), 9);
    }
}
