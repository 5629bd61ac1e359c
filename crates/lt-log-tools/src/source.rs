//! Reading log content from disk.
//!
//! Missing and empty files are not errors here: they read as `None` so the
//! callers can degrade to zero counts. Anything else the filesystem reports
//! (permissions, a directory where a file was expected) surfaces as
//! `LogError::Io` immediately.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{LogError, LogResult};
use crate::resolver;

/// Convert a handler URL (`file:///var/log/app.log` or a bare path) to a path.
pub fn url_to_path(url: &str) -> PathBuf {
    match url.strip_prefix("file://") {
        Some(stripped) => PathBuf::from(stripped),
        None => PathBuf::from(url),
    }
}

/// Read a whole log file as text.
///
/// Invalid UTF-8 is replaced rather than rejected; log files routinely
/// contain binary fragments. Returns `None` for a missing or empty file.
pub fn read_log_content(path: &Path) -> LogResult<Option<String>> {
    match std::fs::read(path) {
        Ok(bytes) if bytes.is_empty() => Ok(None),
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(LogError::Io(format!("{}: {e}", path.display()))),
    }
}

/// Read the content behind a nominal log path.
///
/// Uses the file itself when it exists and has content; otherwise falls
/// back to the most recently modified rotated sibling. Returns the path
/// actually read alongside its content.
pub fn load_latest_content(path: &Path) -> LogResult<Option<(PathBuf, String)>> {
    if let Some(content) = read_log_content(path)? {
        return Ok(Some((path.to_path_buf(), content)));
    }

    let Some(latest) = resolver::find_latest_sibling(path) else {
        tracing::debug!(path = %path.display(), "no log content and no rotated sibling");
        return Ok(None);
    };
    if latest == path {
        return Ok(None);
    }

    tracing::debug!(
        path = %path.display(),
        latest = %latest.display(),
        "reading latest rotated log file"
    );
    Ok(read_log_content(&latest)?.map(|content| (latest, content)))
}
