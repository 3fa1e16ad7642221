//! Store statistics published as gauges.

use crate::sweeper::shutdown_requested;
use quicktest_sqlite::{Database, QuickTestStats, StoreError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Background task refreshing the `quicktest_db_*` gauges.
pub struct StatsMonitor {
    db: Database,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl StatsMonitor {
    /// Create a monitor and its shutdown sender.
    #[must_use]
    pub fn new(db: Database, interval: Duration) -> (Self, watch::Sender<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let monitor = Self {
            db,
            interval: interval.max(Duration::from_millis(1)),
            shutdown: shutdown_rx,
        };
        (monitor, shutdown_tx)
    }

    /// Query the store once and publish the counts.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails. Gauges keep their previous
    /// values in that case.
    pub async fn refresh(&self) -> Result<QuickTestStats, StoreError> {
        let stats = self.db.stats().await?;
        publish(stats);
        Ok(stats)
    }

    /// Refresh once per interval until shutdown.
    pub async fn run(mut self) {
        tracing::info!("Starting store statistics monitor");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = shutdown_requested(&mut self.shutdown) => break,
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.refresh().await {
                tracing::warn!(error = %e, "Failed to refresh store statistics");
            }
        }

        tracing::info!("Store statistics monitor stopped");
    }
}

#[allow(clippy::cast_precision_loss)]
fn publish(stats: QuickTestStats) {
    metrics::gauge!("quicktest_db_tests").set(stats.total as f64);
    metrics::gauge!("quicktest_db_registered").set(stats.registered as f64);
    metrics::gauge!("quicktest_db_available").set(stats.available as f64);
    tracing::debug!(
        total = stats.total,
        registered = stats.registered,
        available = stats.available,
        "Store statistics refreshed"
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use quicktest_core::{QuickTestId, QuickTestRegister};
    use quicktest_sqlite::{SqliteQuickTestService, StoreConfig};
    use quicktest_testing::test_clock;
    use std::sync::Arc;

    #[tokio::test]
    async fn refresh_reports_lifecycle_counts() {
        let db = Database::connect(&StoreConfig::in_memory(), Arc::new(test_clock()))
            .await
            .unwrap();
        let service = SqliteQuickTestService::new(db.clone());

        let created = service
            .create_many((0..3).map(|_| QuickTestId::generate()).collect())
            .await
            .unwrap();
        service
            .register(QuickTestRegister::new(created[0].id.clone(), "Tim"))
            .await
            .unwrap();
        service.expire(created[1].id.clone()).await.unwrap();

        let (monitor, _shutdown) = StatsMonitor::new(db, Duration::from_secs(10));
        let stats = monitor.refresh().await.unwrap();

        assert_eq!(
            stats,
            QuickTestStats {
                total: 3,
                registered: 1,
                available: 1,
            }
        );
    }

    #[tokio::test]
    async fn run_returns_on_shutdown() {
        let db = Database::connect(&StoreConfig::in_memory(), Arc::new(test_clock()))
            .await
            .unwrap();
        let (monitor, shutdown) = StatsMonitor::new(db, Duration::from_millis(10));
        let handle = tokio::spawn(monitor.run());

        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown.send(true).unwrap();
        handle.await.unwrap();
    }
}
