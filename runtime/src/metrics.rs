//! Prometheus metrics for observability and monitoring.
//!
//! Counters are emitted by the lifecycle engine and the sweeper, gauges by
//! the statistics monitor. This module only describes them and serves them.
//!
//! # Example
//!
//! ```rust,no_run
//! use quicktest_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Start metrics server on port 9090
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Metrics available at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use thiserror::Error;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build the exporter or bind its listener
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
}

/// Prometheus metrics server.
///
/// Exposes metrics on an HTTP endpoint for Prometheus scraping.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Socket address to bind to (e.g., `0.0.0.0:9090`)
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Install the global recorder and start serving `/metrics`.
    ///
    /// Must be called from within a Tokio runtime; the listener runs as a
    /// spawned task.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Build`] if the listener cannot bind.
    ///
    /// # Note
    ///
    /// If a metrics recorder is already installed (e.g., in tests), the new one
    /// is discarded with a warning and no listener is started.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let (recorder, exporter) = PrometheusBuilder::new()
            .with_http_listener(self.addr)
            .build()
            .map_err(|e| MetricsError::Build(e.to_string()))?;
        let handle = recorder.handle();

        if let Err(e) = metrics::set_global_recorder(recorder) {
            tracing::warn!(error = %e, "Metrics recorder already initialized, skipping re-initialization");
            return Ok(());
        }

        let addr = self.addr;
        tokio::spawn(async move {
            if exporter.await.is_err() {
                tracing::error!(%addr, "Metrics listener failed");
            }
        });

        self.handle = Some(handle);
        tracing::info!(
            addr = %self.addr,
            "Metrics server started - available at http://{}/metrics",
            self.addr
        );
        Ok(())
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this server did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    // Lifecycle engine
    describe_counter!(
        "quicktest_created_total",
        "Total number of quick tests created"
    );
    describe_counter!(
        "quicktest_registered_total",
        "Total number of quick tests registered to a person"
    );
    describe_counter!(
        "quicktest_expired_total",
        "Total number of quick tests scrubbed, by id or by sweep"
    );

    // Sweeper
    describe_counter!(
        "quicktest_swept_total",
        "Total number of quick tests scrubbed by the periodic sweep"
    );
    describe_counter!(
        "quicktest_sweep_failures_total",
        "Total number of sweeps that failed"
    );

    // Store statistics
    describe_gauge!("quicktest_db_tests", "Quick tests in the store");
    describe_gauge!(
        "quicktest_db_registered",
        "Quick tests registered and not yet expired"
    );
    describe_gauge!(
        "quicktest_db_available",
        "Quick tests neither registered nor expired"
    );
}
