//! Periodic expiry sweep.
//!
//! The sweeper is the only caller of `expire_outdated_quick_tests`. It runs
//! on its own schedule, detached from request handling, until the shutdown
//! signal flips.

use quicktest_core::{QuickTestService, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Shortest accepted sweep period. `tokio::time::interval` rejects zero.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Background task scrubbing registrations older than the validity window.
///
/// # Example
///
/// ```ignore
/// let (sweeper, shutdown) = Sweeper::new(service, QUICK_TEST_VALIDITY, Duration::from_secs(10));
/// let handle = tokio::spawn(sweeper.run());
///
/// tokio::signal::ctrl_c().await.ok();
/// shutdown.send(true).ok();
/// handle.await?;
/// ```
pub struct Sweeper {
    service: Arc<dyn QuickTestService>,
    validity: Duration,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl Sweeper {
    /// Create a sweeper and its shutdown sender.
    ///
    /// Send `true` (or drop the sender) to stop [`Sweeper::run`].
    #[must_use]
    pub fn new(
        service: Arc<dyn QuickTestService>,
        validity: Duration,
        interval: Duration,
    ) -> (Self, watch::Sender<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let sweeper = Self {
            service,
            validity,
            interval: interval.max(MIN_INTERVAL),
            shutdown: shutdown_rx,
        };

        (sweeper, shutdown_tx)
    }

    /// Sweep once per interval until shutdown.
    ///
    /// The first sweep runs immediately. A failed sweep is logged and
    /// counted, and the next tick tries again. On shutdown an in-flight sweep
    /// is dropped, which rolls back its unit of work.
    pub async fn run(mut self) {
        tracing::info!(
            validity_secs = self.validity.as_secs(),
            interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX),
            "Starting expiry sweeper"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = shutdown_requested(&mut self.shutdown) => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                () = shutdown_requested(&mut self.shutdown) => {
                    tracing::info!("Shutdown during sweep, discarding it");
                    break;
                }
                result = self.service.expire_outdated_quick_tests(self.validity) => {
                    record(result);
                }
            }
        }

        tracing::info!("Expiry sweeper stopped");
    }
}

fn record(result: Result<u64>) {
    match result {
        Ok(0) => tracing::trace!("Sweep found nothing to expire"),
        Ok(swept) => {
            metrics::counter!("quicktest_swept_total").increment(swept);
            tracing::info!(swept, "Sweep expired outdated quick tests");
        },
        Err(e) => {
            metrics::counter!("quicktest_sweep_failures_total").increment(1);
            tracing::error!(error = %e, "Sweep failed, retrying next tick");
        },
    }
}

/// Resolves once `true` is sent or every sender is gone.
pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use quicktest_core::{Clock, QUICK_TEST_VALIDITY};
    use quicktest_testing::in_memory::register_at;
    use quicktest_testing::{
        InMemoryQuickTestService, ManualClock, assert_not_scrubbed, assert_scrubbed, test_clock,
    };

    const INTERVAL: Duration = Duration::from_secs(10);

    fn service() -> (ManualClock, InMemoryQuickTestService) {
        let clock = ManualClock::new(test_clock().now());
        let service = InMemoryQuickTestService::new(Arc::new(clock.clone()));
        (clock, service)
    }

    #[tokio::test(start_paused = true)]
    async fn sweeps_every_interval_until_shutdown() {
        let (clock, service) = service();
        let outdated = register_at(&service, &clock, "Tim", TimeDelta::hours(25))
            .await
            .unwrap();
        let valid = register_at(&service, &clock, "Jim", TimeDelta::hours(1))
            .await
            .unwrap();

        let (sweeper, shutdown) =
            Sweeper::new(Arc::new(service.clone()), QUICK_TEST_VALIDITY, INTERVAL);
        let handle = tokio::spawn(sweeper.run());

        // Ticks at 0s, 10s and 20s
        tokio::time::sleep(Duration::from_secs(25)).await;
        shutdown.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(service.sweep_count(), 3);
        assert_scrubbed(&service.find_quick_test_by_id(outdated.id).await.unwrap());
        assert_not_scrubbed(&service.find_quick_test_by_id(valid.id).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_sweeping_after_failures() {
        let (clock, service) = service();
        let service = service.with_failing_sweeps(2);
        let outdated = register_at(&service, &clock, "Tim", TimeDelta::hours(25))
            .await
            .unwrap();

        let (sweeper, shutdown) =
            Sweeper::new(Arc::new(service.clone()), QUICK_TEST_VALIDITY, INTERVAL);
        let handle = tokio::spawn(sweeper.run());

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_not_scrubbed(&service.find_quick_test_by_id(outdated.id.clone()).await.unwrap());

        tokio::time::sleep(Duration::from_secs(10)).await;
        shutdown.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(service.sweep_count(), 3);
        assert_scrubbed(&service.find_quick_test_by_id(outdated.id).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_sender_is_dropped() {
        let (_clock, service) = service();
        let (sweeper, shutdown) =
            Sweeper::new(Arc::new(service.clone()), QUICK_TEST_VALIDITY, INTERVAL);
        let handle = tokio::spawn(sweeper.run());

        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(shutdown);
        handle.await.unwrap();

        assert_eq!(service.sweep_count(), 1);
    }
}
