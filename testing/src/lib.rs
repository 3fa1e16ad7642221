//! # QuickTest Testing
//!
//! Testing utilities and helpers for quick test services.
//!
//! This crate provides:
//! - Deterministic clocks ([`FixedClock`], [`ManualClock`])
//! - An in-memory [`QuickTestService`] test double
//! - Assertion helpers for scrubbed and unscrubbed records
//!
//! ## Example
//!
//! ```ignore
//! use quicktest_testing::{ManualClock, test_clock};
//!
//! #[tokio::test]
//! async fn registration_expires() {
//!     let clock = ManualClock::new(test_clock().now());
//!     let service = InMemoryQuickTestService::new(Arc::new(clock.clone()));
//!     // ... register, then
//!     clock.advance(TimeDelta::hours(25));
//!     service.expire_outdated_quick_tests(QUICK_TEST_VALIDITY).await?;
//! }
//! ```
//!
//! [`QuickTestService`]: quicktest_core::QuickTestService

pub mod assertions;
pub mod in_memory;

use chrono::{DateTime, TimeDelta, Utc};
use quicktest_core::environment::Clock;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, TimeDelta, Utc};
    use std::sync::{Arc, Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use quicktest_testing::mocks::FixedClock;
    /// use quicktest_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to.
    ///
    /// Clones share the same time, so a test can keep one handle and give
    /// another to the store.
    ///
    /// # Example
    ///
    /// ```
    /// use quicktest_testing::mocks::ManualClock;
    /// use quicktest_core::environment::Clock;
    /// use chrono::{TimeDelta, Utc};
    ///
    /// let clock = ManualClock::new(Utc::now());
    /// let start = clock.now();
    /// clock.advance(TimeDelta::hours(25));
    /// assert_eq!(clock.now() - start, TimeDelta::hours(25));
    /// ```
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Create a clock reading `time`.
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Jump to `time`.
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner) = time;
        }

        /// Move forward (or backward, for a negative delta).
        pub fn advance(&self, delta: TimeDelta) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += delta;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Install a test-friendly tracing subscriber once per process.
///
/// Honors `RUST_LOG`; output goes through the test harness capture.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use assertions::{assert_error_kind, assert_not_scrubbed, assert_scrubbed};
pub use in_memory::InMemoryQuickTestService;
pub use mocks::{FixedClock, ManualClock, test_clock};
