//! # QuickTest Runtime
//!
//! Long-running background tasks for a quick test service process.
//!
//! ## Components
//!
//! - **Sweeper**: scrubs registrations older than the validity window on a fixed schedule
//! - **`StatsMonitor`**: publishes store counts as gauges
//! - **`MetricsServer`**: serves every metric for Prometheus scraping
//!
//! The two loops follow the same shape: `new` returns the task and a
//! `watch::Sender<bool>`; `run` ticks until `true` is sent or the sender is
//! dropped.
//!
//! ## Example
//!
//! ```ignore
//! use quicktest_runtime::Sweeper;
//!
//! let (sweeper, shutdown) = Sweeper::new(service, QUICK_TEST_VALIDITY, Duration::from_secs(10));
//! let task = tokio::spawn(sweeper.run());
//!
//! // ...
//! shutdown.send(true).ok();
//! task.await?;
//! ```

/// Prometheus metrics for observability
pub mod metrics;

/// Store statistics gauges
pub mod monitor;

/// Periodic expiry sweep
pub mod sweeper;

pub use metrics::{MetricsError, MetricsServer};
pub use monitor::StatsMonitor;
pub use sweeper::Sweeper;
