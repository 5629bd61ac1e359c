//! Latest-file resolution for rotated log files.
//!
//! Daily rotation writes `app-2024-01-02.log` while the configured path is
//! still `app.log`. Given the configured path, pick the file that is
//! actually being written to.

use glob::Pattern;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Return `path` if it exists, otherwise the most recently modified sibling.
///
/// Returns `None` when the directory is missing or holds no candidate.
pub fn resolve_latest(path: &Path) -> Option<PathBuf> {
    if path.exists() {
        return Some(path.to_path_buf());
    }
    find_latest_sibling(path)
}

/// Search next to `path` for `<stem>-*.log`, falling back to `*.log`, and
/// return the candidate with the newest modification time.
///
/// Equal modification times resolve to the last candidate in glob order.
pub fn find_latest_sibling(path: &Path) -> Option<PathBuf> {
    let dir = parent_dir(path);
    if !dir.is_dir() {
        return None;
    }

    let stem = path.file_stem()?.to_string_lossy();
    let escaped_dir = Pattern::escape(&dir.to_string_lossy());

    let rotated = matching_files(&format!("{escaped_dir}/{}-*.log", Pattern::escape(&stem)));
    let candidates = if rotated.is_empty() {
        matching_files(&format!("{escaped_dir}/*.log"))
    } else {
        rotated
    };

    newest(candidates)
}

/// Directory containing `path`; `.` for bare file names.
pub(crate) fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Regular files matching a glob pattern. Unreadable entries are skipped.
pub(crate) fn matching_files(pattern: &str) -> Vec<PathBuf> {
    match glob::glob(pattern) {
        Ok(paths) => paths
            .filter_map(Result::ok)
            .filter(|p| p.is_file())
            .collect(),
        Err(e) => {
            tracing::warn!(pattern, error = %e, "invalid log file pattern");
            Vec::new()
        }
    }
}

fn newest(candidates: Vec<PathBuf>) -> Option<PathBuf> {
    let mut latest: Option<(SystemTime, PathBuf)> = None;
    for candidate in candidates {
        let Ok(modified) = candidate.metadata().and_then(|m| m.modified()) else {
            continue;
        };
        if latest.as_ref().is_none_or(|(time, _)| modified >= *time) {
            latest = Some((modified, candidate));
        }
    }
    latest.map(|(_, path)| path)
}
