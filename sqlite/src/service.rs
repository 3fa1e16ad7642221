//! Lifecycle rules over the record store.
//!
//! Each operation validates its input, opens one [`UnitOfWork`], reads the
//! current state, applies the transition rule and commits. Any failure
//! returns early and drops the unit of work, which rolls it back.
//!
//! [`UnitOfWork`]: crate::db::UnitOfWork

use crate::db::Database;
use quicktest_core::service::ServiceFuture;
use quicktest_core::{
    QuickTest, QuickTestError, QuickTestId, QuickTestRegister, QuickTestService, Result,
};
use std::time::Duration;

/// [`QuickTestService`] backed by the SQLite store.
#[derive(Clone, Debug)]
pub struct SqliteQuickTestService {
    db: Database,
}

impl SqliteQuickTestService {
    /// Create a service over an open database.
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    /// The database this service writes to.
    #[must_use]
    pub const fn database(&self) -> &Database {
        &self.db
    }

    /// Retrieve a quick test by id.
    ///
    /// # Errors
    ///
    /// [`QuickTestError::NotFound`] if the id does not exist.
    #[tracing::instrument(skip(self), fields(id = %id))]
    pub async fn find_by_id(&self, id: QuickTestId) -> Result<QuickTest> {
        let mut uow = self.db.begin().await?;
        uow.find(&id)
            .await?
            .ok_or_else(|| QuickTestError::not_found(format!("no quick test found for {id}")))
    }

    /// Create one unregistered quick test.
    ///
    /// # Errors
    ///
    /// [`QuickTestError::Invalid`] for a malformed id,
    /// [`QuickTestError::Conflict`] if it already exists.
    pub async fn create(&self, id: QuickTestId) -> Result<QuickTest> {
        self.create_many(vec![id])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| QuickTestError::internal("expected quick test to be created, but wasn't"))
    }

    /// Create a batch of unregistered quick tests in one unit of work.
    ///
    /// # Errors
    ///
    /// [`QuickTestError::Invalid`] if any id is malformed,
    /// [`QuickTestError::Conflict`] if any id exists. Nothing is written in
    /// either case.
    #[tracing::instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn create_many(&self, ids: Vec<QuickTestId>) -> Result<Vec<QuickTest>> {
        for id in &ids {
            id.validate()?;
        }

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut uow = self.db.begin().await?;
        let quicktests = uow.insert_many(&ids).await.inspect_err(|e| {
            tracing::warn!(error = %e, "Quick test batch rejected");
        })?;
        uow.commit().await?;

        metrics::counter!("quicktest_created_total").increment(quicktests.len() as u64);
        tracing::info!(count = quicktests.len(), "Quick tests created");

        Ok(quicktests)
    }

    /// Bind an unregistered quick test to a person.
    ///
    /// # Errors
    ///
    /// [`QuickTestError::Invalid`] for a malformed request,
    /// [`QuickTestError::NotFound`] for an unknown id,
    /// [`QuickTestError::Expired`] if scrubbed,
    /// [`QuickTestError::Conflict`] if already registered.
    #[tracing::instrument(skip(self, reg), fields(id = %reg.id))]
    pub async fn register(&self, reg: QuickTestRegister) -> Result<QuickTest> {
        reg.validate()?;

        let mut uow = self.db.begin().await?;

        let mut quicktest = uow.find(&reg.id).await?.ok_or_else(|| {
            QuickTestError::not_found(format!("no quick test found for {}", reg.id))
        })?;

        if quicktest.expired {
            tracing::warn!("Registration rejected: quick test expired");
            return Err(QuickTestError::expired("test has already expired"));
        }
        if quicktest.is_registered() {
            tracing::warn!("Registration rejected: quick test already registered");
            return Err(QuickTestError::conflict("test has already been registered"));
        }

        if !uow.register(&reg.id, &reg.person).await? {
            return Err(QuickTestError::internal("quick test vanished during registration"));
        }
        quicktest.registered_at = Some(uow.now());
        quicktest.person = Some(reg.person);

        uow.commit().await?;

        metrics::counter!("quicktest_registered_total").increment(1);
        tracing::info!("Quick test registered");

        Ok(quicktest)
    }

    /// Scrub one quick test now. Idempotent for existing ids.
    ///
    /// Returns whether this call scrubbed the record; `false` means it was
    /// already expired and nothing was written.
    ///
    /// # Errors
    ///
    /// [`QuickTestError::Invalid`] for a malformed id,
    /// [`QuickTestError::NotFound`] if the id does not exist.
    #[tracing::instrument(skip(self), fields(id = %id))]
    pub async fn expire(&self, id: QuickTestId) -> Result<bool> {
        id.validate()?;

        let mut uow = self.db.begin().await?;
        let quicktest = uow.find(&id).await?.ok_or_else(|| {
            QuickTestError::not_found(format!("quick test does not exist: {id}"))
        })?;

        if quicktest.expired {
            uow.rollback().await?;
            tracing::debug!("Quick test already expired");
            return Ok(false);
        }

        if !uow.expire_by_id(&id).await? {
            return Err(QuickTestError::internal("quick test vanished during expiry"));
        }
        uow.commit().await?;

        metrics::counter!("quicktest_expired_total").increment(1);
        tracing::info!("Quick test expired");

        Ok(true)
    }

    /// Scrub every quick test registered longer than `validity` ago.
    ///
    /// # Errors
    ///
    /// [`QuickTestError::Internal`] on storage failure. Zero matches is success.
    #[tracing::instrument(skip(self))]
    pub async fn expire_outdated(&self, validity: Duration) -> Result<u64> {
        let mut uow = self.db.begin().await?;
        let expired = uow.expire_outdated(validity).await?;
        uow.commit().await?;

        if expired > 0 {
            metrics::counter!("quicktest_expired_total").increment(expired);
            tracing::info!(expired, "Outdated quick tests expired");
        }

        Ok(expired)
    }
}

impl QuickTestService for SqliteQuickTestService {
    fn find_quick_test_by_id(&self, id: QuickTestId) -> ServiceFuture<'_, QuickTest> {
        Box::pin(self.find_by_id(id))
    }

    fn create_quick_test(&self, id: QuickTestId) -> ServiceFuture<'_, QuickTest> {
        Box::pin(self.create(id))
    }

    fn create_many_quick_tests(&self, ids: Vec<QuickTestId>) -> ServiceFuture<'_, Vec<QuickTest>> {
        Box::pin(self.create_many(ids))
    }

    fn register_quick_test(&self, reg: QuickTestRegister) -> ServiceFuture<'_, QuickTest> {
        Box::pin(self.register(reg))
    }

    fn expire_quick_test(&self, id: QuickTestId) -> ServiceFuture<'_, ()> {
        Box::pin(async move { self.expire(id).await.map(|_| ()) })
    }

    fn expire_outdated_quick_tests(&self, validity: Duration) -> ServiceFuture<'_, u64> {
        Box::pin(self.expire_outdated(validity))
    }
}
