//! Configuration management for the quick test daemon.
//!
//! Loads configuration from environment variables with sensible defaults.
//! A `.env` file in the working directory is read first by `main`.

use quicktest_core::QUICK_TEST_VALIDITY;
use quicktest_sqlite::{StoreConfig, StoreLocation};
use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_LOG_FILTER: &str = "quicktestd=info,quicktest_sqlite=info,quicktest_runtime=info";
const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:9090";

/// Configuration error
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        /// Variable name
        key: &'static str,
        /// Raw value
        value: String,
        /// Parser message
        reason: String,
    },
    /// Values parse but do not make sense together
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

/// Daemon configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Record store
    pub store: StoreConfig,
    /// Validity window and background schedules
    pub lifecycle: LifecycleConfig,
    /// Logging and metrics
    pub telemetry: TelemetryConfig,
}

/// Validity window and background task schedules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// How long a registration stays valid
    pub validity: Duration,
    /// Time between expiry sweeps
    pub sweep_interval: Duration,
    /// Time between store statistics refreshes
    pub stats_interval: Duration,
}

/// Logging and metrics configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// `tracing_subscriber::EnvFilter` directives
    pub log_filter: String,
    /// Prometheus listener address; `None` disables the exporter
    pub metrics_addr: Option<SocketAddr>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set to an unparseable value
    /// or the resulting configuration is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = StoreConfig::default();

        let config = Self {
            store: StoreConfig {
                location: lookup("QUICKTEST_DATABASE")
                    .map_or(StoreLocation::Memory, |s| StoreLocation::parse(&s)),
                max_connections: parse_or(
                    &lookup,
                    "QUICKTEST_DATABASE_MAX_CONNECTIONS",
                    defaults.max_connections,
                )?,
                busy_timeout: secs_or(
                    &lookup,
                    "QUICKTEST_DATABASE_BUSY_TIMEOUT",
                    defaults.busy_timeout,
                )?,
            },
            lifecycle: LifecycleConfig {
                validity: secs_or(&lookup, "QUICKTEST_VALIDITY_SECS", QUICK_TEST_VALIDITY)?,
                sweep_interval: secs_or(
                    &lookup,
                    "QUICKTEST_SWEEP_INTERVAL_SECS",
                    Duration::from_secs(10),
                )?,
                stats_interval: secs_or(
                    &lookup,
                    "QUICKTEST_STATS_INTERVAL_SECS",
                    Duration::from_secs(10),
                )?,
            },
            telemetry: TelemetryConfig {
                log_filter: lookup("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
                metrics_addr: metrics_addr(&lookup)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the whole configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for a zero validity window, zero
    /// interval or an empty connection pool.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lifecycle.validity.is_zero() {
            return Err(ConfigError::Validation("validity window must be positive".into()));
        }
        if self.lifecycle.sweep_interval.is_zero() || self.lifecycle.stats_interval.is_zero() {
            return Err(ConfigError::Validation("intervals must be positive".into()));
        }
        if self.store.max_connections == 0 {
            return Err(ConfigError::Validation("max_connections must be at least 1".into()));
        }
        Ok(())
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

fn secs_or(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    parse_or(lookup, key, default.as_secs()).map(Duration::from_secs)
}

fn metrics_addr(
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<Option<SocketAddr>, ConfigError> {
    let value = lookup("QUICKTEST_METRICS_ADDR").unwrap_or_else(|| DEFAULT_METRICS_ADDR.to_string());
    if value.trim().is_empty() {
        return Ok(None);
    }
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
            key: "QUICKTEST_METRICS_ADDR",
            reason: e.to_string(),
            value,
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[]).unwrap();

        assert_eq!(config.store, StoreConfig::default());
        assert_eq!(config.lifecycle.validity, Duration::from_secs(86_400));
        assert_eq!(config.lifecycle.sweep_interval, Duration::from_secs(10));
        assert_eq!(config.lifecycle.stats_interval, Duration::from_secs(10));
        assert_eq!(config.telemetry.log_filter, DEFAULT_LOG_FILTER);
        assert_eq!(
            config.telemetry.metrics_addr,
            Some("0.0.0.0:9090".parse().unwrap())
        );
    }

    #[test]
    fn overrides() {
        let config = load(&[
            ("QUICKTEST_DATABASE", "/var/lib/quicktest/db.sqlite"),
            ("QUICKTEST_DATABASE_MAX_CONNECTIONS", "4"),
            ("QUICKTEST_VALIDITY_SECS", "3600"),
            ("QUICKTEST_SWEEP_INTERVAL_SECS", " 30 "),
            ("QUICKTEST_METRICS_ADDR", ""),
            ("RUST_LOG", "debug"),
        ])
        .unwrap();

        assert_eq!(
            config.store.location,
            StoreLocation::File(PathBuf::from("/var/lib/quicktest/db.sqlite"))
        );
        assert_eq!(config.store.max_connections, 4);
        assert_eq!(config.lifecycle.validity, Duration::from_secs(3600));
        assert_eq!(config.lifecycle.sweep_interval, Duration::from_secs(30));
        assert_eq!(config.telemetry.metrics_addr, None);
        assert_eq!(config.telemetry.log_filter, "debug");
    }

    #[test]
    fn memory_location_spelled_out() {
        let config = load(&[("QUICKTEST_DATABASE", ":memory:")]).unwrap();
        assert_eq!(config.store.location, StoreLocation::Memory);
    }

    #[test]
    fn unparseable_values_are_rejected() {
        let err = load(&[("QUICKTEST_SWEEP_INTERVAL_SECS", "soon")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "QUICKTEST_SWEEP_INTERVAL_SECS",
                ..
            }
        ));

        let err = load(&[("QUICKTEST_METRICS_ADDR", "localhost")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "QUICKTEST_METRICS_ADDR", .. }));
    }

    #[test]
    fn zero_values_fail_validation() {
        assert!(matches!(
            load(&[("QUICKTEST_VALIDITY_SECS", "0")]),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            load(&[("QUICKTEST_STATS_INTERVAL_SECS", "0")]),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            load(&[("QUICKTEST_DATABASE_MAX_CONNECTIONS", "0")]),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn serializes_for_startup_logging() {
        let json = serde_json::to_value(load(&[]).unwrap()).unwrap();
        assert_eq!(json["store"]["location"], "memory");
        assert_eq!(json["store"]["max_connections"], 8);
    }
}
