//! In-memory quick test service.
//!
//! Implements the same rules as the SQLite service over a `HashMap`, for
//! tests of code that depends on [`QuickTestService`] (the sweep task,
//! adapters) without opening a database.

use chrono::TimeDelta;
use quicktest_core::service::ServiceFuture;
use quicktest_core::{
    Clock, QuickTest, QuickTestError, QuickTestId, QuickTestRegister, QuickTestService, Result,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Mock quick test service.
///
/// Uses in-memory storage. Every operation holds the map lock for its whole
/// duration, which stands in for the store's unit of work.
#[derive(Clone)]
pub struct InMemoryQuickTestService {
    records: Arc<Mutex<HashMap<QuickTestId, QuickTest>>>,
    clock: Arc<dyn Clock>,
    sweeps: Arc<AtomicUsize>,
    failing_sweeps: Arc<AtomicUsize>,
}

impl InMemoryQuickTestService {
    /// Create an empty service stamping records with `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            clock,
            sweeps: Arc::new(AtomicUsize::new(0)),
            failing_sweeps: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make the next `count` calls to `expire_outdated_quick_tests` fail with
    /// an internal error.
    #[must_use]
    pub fn with_failing_sweeps(self, count: usize) -> Self {
        self.failing_sweeps.store(count, Ordering::SeqCst);
        self
    }

    /// How many times `expire_outdated_quick_tests` has been called.
    #[must_use]
    pub fn sweep_count(&self) -> usize {
        self.sweeps.load(Ordering::SeqCst)
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().map(|records| records.len()).unwrap_or_default()
    }

    /// Whether no records are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<QuickTestId, QuickTest>>> {
        self.records
            .lock()
            .map_err(|_| QuickTestError::internal("quick test map poisoned"))
    }

    fn find(&self, id: &QuickTestId) -> Result<QuickTest> {
        self.lock()?
            .get(id)
            .cloned()
            .ok_or_else(|| QuickTestError::not_found(format!("no quick test found for {id}")))
    }

    fn create_many(&self, ids: Vec<QuickTestId>) -> Result<Vec<QuickTest>> {
        for id in &ids {
            id.validate()?;
        }

        let mut records = self.lock()?;
        {
            let mut seen = HashSet::with_capacity(ids.len());
            for id in &ids {
                if records.contains_key(id) || !seen.insert(id) {
                    return Err(QuickTestError::conflict("quick test already exists"));
                }
            }
        }

        let now = self.clock.now();
        let created: Vec<QuickTest> = ids
            .into_iter()
            .map(|id| QuickTest::new(id, now))
            .collect();
        for quicktest in &created {
            records.insert(quicktest.id.clone(), quicktest.clone());
        }
        Ok(created)
    }

    fn register(&self, reg: QuickTestRegister) -> Result<QuickTest> {
        reg.validate()?;

        let now = self.clock.now();
        let mut records = self.lock()?;
        let quicktest = records
            .get_mut(&reg.id)
            .ok_or_else(|| QuickTestError::not_found(format!("no quick test found for {}", reg.id)))?;

        if quicktest.expired {
            return Err(QuickTestError::expired("test has already expired"));
        }
        if quicktest.is_registered() {
            return Err(QuickTestError::conflict("test has already been registered"));
        }

        quicktest.person = Some(reg.person);
        quicktest.registered_at = Some(now);
        Ok(quicktest.clone())
    }

    fn expire(&self, id: &QuickTestId) -> Result<()> {
        id.validate()?;

        let mut records = self.lock()?;
        let quicktest = records
            .get_mut(id)
            .ok_or_else(|| QuickTestError::not_found(format!("quick test does not exist: {id}")))?;
        quicktest.expired = true;
        quicktest.person = None;
        Ok(())
    }

    fn expire_outdated(&self, validity: Duration) -> Result<u64> {
        self.sweeps.fetch_add(1, Ordering::SeqCst);

        let remaining_failures = self.failing_sweeps.load(Ordering::SeqCst);
        if remaining_failures > 0 {
            self.failing_sweeps.store(remaining_failures - 1, Ordering::SeqCst);
            return Err(QuickTestError::internal("injected sweep failure"));
        }

        let now = self.clock.now();
        let mut records = self.lock()?;
        let mut expired = 0;
        for quicktest in records.values_mut() {
            if quicktest.should_expire_at(now, validity) {
                quicktest.expired = true;
                quicktest.person = None;
                expired += 1;
            }
        }
        Ok(expired)
    }
}

impl QuickTestService for InMemoryQuickTestService {
    fn find_quick_test_by_id(&self, id: QuickTestId) -> ServiceFuture<'_, QuickTest> {
        Box::pin(async move { self.find(&id) })
    }

    fn create_quick_test(&self, id: QuickTestId) -> ServiceFuture<'_, QuickTest> {
        Box::pin(async move {
            self.create_many(vec![id])?
                .pop()
                .ok_or_else(|| QuickTestError::internal("expected quick test to be created, but wasn't"))
        })
    }

    fn create_many_quick_tests(&self, ids: Vec<QuickTestId>) -> ServiceFuture<'_, Vec<QuickTest>> {
        Box::pin(async move { self.create_many(ids) })
    }

    fn register_quick_test(&self, reg: QuickTestRegister) -> ServiceFuture<'_, QuickTest> {
        Box::pin(async move { self.register(reg) })
    }

    fn expire_quick_test(&self, id: QuickTestId) -> ServiceFuture<'_, ()> {
        Box::pin(async move { self.expire(&id) })
    }

    fn expire_outdated_quick_tests(&self, validity: Duration) -> ServiceFuture<'_, u64> {
        Box::pin(async move { self.expire_outdated(validity) })
    }
}

/// Helper for tests that need a record registered some time ago.
///
/// # Errors
///
/// Propagates any error from creating or registering the record.
pub async fn register_at(
    service: &dyn QuickTestService,
    clock: &crate::ManualClock,
    person: &str,
    ago: TimeDelta,
) -> Result<QuickTest> {
    let now = clock.now();
    clock.set(now - ago);
    let result = async {
        let created = service.create_quick_test(QuickTestId::generate()).await?;
        service
            .register_quick_test(QuickTestRegister::new(created.id, person))
            .await
    }
    .await;
    clock.set(now);
    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use crate::{ManualClock, assert_error_kind, assert_not_scrubbed, assert_scrubbed, test_clock};
    use quicktest_core::{ErrorKind, QUICK_TEST_VALIDITY};

    fn service() -> (ManualClock, InMemoryQuickTestService) {
        let clock = ManualClock::new(test_clock().now());
        let service = InMemoryQuickTestService::new(Arc::new(clock.clone()));
        (clock, service)
    }

    #[tokio::test]
    async fn follows_the_lifecycle_rules() {
        let (clock, service) = service();

        let outdated = register_at(&service, &clock, "Tim", TimeDelta::hours(25))
            .await
            .unwrap();
        let valid = register_at(&service, &clock, "Jim", TimeDelta::hours(23))
            .await
            .unwrap();

        let expired = service
            .expire_outdated_quick_tests(QUICK_TEST_VALIDITY)
            .await
            .unwrap();
        assert_eq!(expired, 1);

        assert_scrubbed(&service.find_quick_test_by_id(outdated.id.clone()).await.unwrap());
        assert_not_scrubbed(&service.find_quick_test_by_id(valid.id).await.unwrap());

        let result = service
            .register_quick_test(QuickTestRegister::new(outdated.id, "Tom"))
            .await;
        assert_error_kind(&result, ErrorKind::Expired);
    }

    #[tokio::test]
    async fn rejects_duplicates_within_a_batch() {
        let (_clock, service) = service();
        let id = QuickTestId::generate();

        let result = service.create_many_quick_tests(vec![id.clone(), id]).await;
        assert_error_kind(&result, ErrorKind::Conflict);
        assert!(service.is_empty());
    }

    #[tokio::test]
    async fn injected_sweep_failures_are_counted() {
        let (_clock, service) = service();
        let service = service.with_failing_sweeps(1);

        let first = service.expire_outdated_quick_tests(QUICK_TEST_VALIDITY).await;
        assert_error_kind(&first, ErrorKind::Internal);
        assert_eq!(
            service.expire_outdated_quick_tests(QUICK_TEST_VALIDITY).await.unwrap(),
            0
        );
        assert_eq!(service.sweep_count(), 2);
    }
}
