//! Capability trait for the quick test lifecycle.
//!
//! Adapters (HTTP handlers, the background sweep, CLIs) depend on this trait
//! rather than on a concrete store. Test doubles implement the same trait.
//!
//! # Dyn Compatibility
//!
//! Methods return `Pin<Box<dyn Future>>` instead of using `async fn` so the
//! service can be shared as `Arc<dyn QuickTestService>` across request
//! handlers and the sweep task.

use crate::error::Result;
use crate::quicktest::{QuickTest, QuickTestId, QuickTestRegister};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Boxed future returned by [`QuickTestService`] methods.
pub type ServiceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// The lifecycle operations over quick test records.
///
/// Every method runs to completion inside its own unit of work: it either
/// commits its full effect or leaves no trace. Dropping a returned future
/// before it resolves aborts only that unit of work.
pub trait QuickTestService: Send + Sync {
    /// Retrieve a quick test by id.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no record with this id
    /// - `Internal`: storage failure
    fn find_quick_test_by_id(&self, id: QuickTestId) -> ServiceFuture<'_, QuickTest>;

    /// Create one unregistered quick test.
    ///
    /// # Errors
    ///
    /// - `Invalid`: malformed id
    /// - `Conflict`: the id already exists
    /// - `Internal`: storage failure
    fn create_quick_test(&self, id: QuickTestId) -> ServiceFuture<'_, QuickTest>;

    /// Create a batch of unregistered quick tests sharing one creation time.
    ///
    /// All ids are validated before anything is written; the batch is
    /// persisted entirely or not at all.
    ///
    /// # Errors
    ///
    /// - `Invalid`: any id is malformed (nothing written)
    /// - `Conflict`: any id already exists (nothing written)
    /// - `Internal`: storage failure
    fn create_many_quick_tests(&self, ids: Vec<QuickTestId>) -> ServiceFuture<'_, Vec<QuickTest>>;

    /// Bind an unregistered quick test to a person.
    ///
    /// Registration does not look at elapsed time: a kit registered long ago
    /// but not yet swept is reported as `Conflict`, not `Expired`.
    ///
    /// # Errors
    ///
    /// - `Invalid`: malformed id or person
    /// - `NotFound`: no record with this id
    /// - `Conflict`: already registered
    /// - `Expired`: already scrubbed
    /// - `Internal`: storage failure
    fn register_quick_test(&self, reg: QuickTestRegister) -> ServiceFuture<'_, QuickTest>;

    /// Scrub one quick test immediately.
    ///
    /// Scrubbing an already expired record succeeds again.
    ///
    /// # Errors
    ///
    /// - `Invalid`: malformed id
    /// - `NotFound`: no record with this id
    /// - `Internal`: storage failure
    fn expire_quick_test(&self, id: QuickTestId) -> ServiceFuture<'_, ()>;

    /// Scrub every registered, unexpired quick test whose registration is
    /// older than `validity`.
    ///
    /// Returns the number of records scrubbed; zero is not an error.
    ///
    /// # Errors
    ///
    /// - `Internal`: storage failure
    fn expire_outdated_quick_tests(&self, validity: Duration) -> ServiceFuture<'_, u64>;
}
