//! Store open options.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreLocation {
    /// Private in-memory database, gone when the handle is closed.
    Memory,
    /// On-disk database file. Missing parent directories are created.
    File(PathBuf),
}

impl StoreLocation {
    /// Parse a location string: empty or `:memory:` means in-memory,
    /// anything else is a file path.
    #[must_use]
    pub fn parse(location: &str) -> Self {
        match location.trim() {
            "" | ":memory:" => Self::Memory,
            path => Self::File(PathBuf::from(path)),
        }
    }
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str(":memory:"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database location.
    pub location: StoreLocation,
    /// Maximum pooled connections for on-disk stores. In-memory stores
    /// always use exactly one.
    pub max_connections: u32,
    /// How long a unit of work waits for the write lock before failing.
    pub busy_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            location: StoreLocation::Memory,
            max_connections: 8,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl StoreConfig {
    /// In-memory store with default settings.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// On-disk store at `path` with default settings.
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            location: StoreLocation::File(path.into()),
            ..Self::default()
        }
    }

    /// Set the connection pool size.
    #[must_use]
    pub const fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Set the busy timeout.
    #[must_use]
    pub const fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_location() {
        assert_eq!(StoreLocation::parse(""), StoreLocation::Memory);
        assert_eq!(StoreLocation::parse(":memory:"), StoreLocation::Memory);
        assert_eq!(
            StoreLocation::parse("/var/lib/quicktest/db"),
            StoreLocation::File(PathBuf::from("/var/lib/quicktest/db"))
        );
    }
}
