//! Destination resolution: from a destination name to its backing files.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::{HandlerConfig, ToolkitConfig};
use crate::error::{LogError, LogResult};
use crate::source::url_to_path;

/// Capability of a handler to name the file it writes to.
pub trait HandlerPath {
    /// The file backing this handler, or None when it is not file-backed.
    fn resolve_file_path(&self) -> Option<PathBuf>;
}

/// Maps destination names to zero or more backing files.
///
/// Enables mocking for tests and swapping the configuration source.
pub trait DestinationResolver: Send + Sync {
    fn resolve(&self, destination: &str) -> LogResult<Vec<PathBuf>>;
}

impl HandlerPath for HandlerConfig {
    fn resolve_file_path(&self) -> Option<PathBuf> {
        match self {
            Self::Single { path } | Self::Daily { path } => Some(url_to_path(path)),
            Self::Stream { url } if url.starts_with("file://") || !url.contains("://") => {
                Some(url_to_path(url))
            }
            Self::Stream { .. } | Self::Stack { .. } | Self::Null => None,
        }
    }
}

/// Resolves destinations from the `[destinations]` table of the config.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredDestinations {
    handlers: BTreeMap<String, HandlerConfig>,
}

impl ConfiguredDestinations {
    pub fn new(handlers: BTreeMap<String, HandlerConfig>) -> Self {
        Self { handlers }
    }

    pub fn from_config(config: &ToolkitConfig) -> Self {
        Self::new(config.destinations.clone())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    fn handler(&self, destination: &str) -> LogResult<&HandlerConfig> {
        self.handlers
            .get(destination)
            .ok_or_else(|| LogError::resolution(destination, "not configured"))
    }
}

impl DestinationResolver for ConfiguredDestinations {
    fn resolve(&self, destination: &str) -> LogResult<Vec<PathBuf>> {
        let handler = self.handler(destination)?;
        let HandlerConfig::Stack { destinations } = handler else {
            return Ok(handler.resolve_file_path().into_iter().collect());
        };

        let mut paths = Vec::new();
        for member in destinations {
            let handler = self.handler(member)?;
            if matches!(handler, HandlerConfig::Stack { .. }) {
                return Err(LogError::resolution(
                    destination,
                    format!("nested stack '{member}'"),
                ));
            }
            paths.extend(handler.resolve_file_path());
        }
        tracing::debug!(destination, paths = paths.len(), "resolved stack destination");
        Ok(paths)
    }
}
