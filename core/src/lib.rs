//! # QuickTest Core
//!
//! Domain types and traits for registering physical test kits against people.
//!
//! A kit moves through three states and never goes back:
//!
//! ```text
//! unregistered ──register──▶ registered ──expire / sweep──▶ expired (scrubbed)
//! ```
//!
//! Registration captures the registrant's name. Once the validity window
//! (24 hours by default) has elapsed the record is scrubbed: the name is
//! removed for good while the identifier and audit timestamps are kept.
//!
//! ## Modules
//!
//! - [`quicktest`]: the `QuickTest` record, identifiers, registration requests
//! - [`error`]: the closed error taxonomy returned by every operation
//! - [`environment`]: injectable time source
//! - [`service`]: the capability trait adapters depend on
//!
//! ## Example
//!
//! ```ignore
//! use quicktest_core::{QuickTestId, QuickTestRegister, QuickTestService};
//!
//! async fn register(service: &dyn QuickTestService) -> quicktest_core::Result<()> {
//!     let id = QuickTestId::generate();
//!     service.create_quick_test(id.clone()).await?;
//!     service
//!         .register_quick_test(QuickTestRegister::new(id, "Jimmy Hendricks"))
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod environment;
pub mod error;
pub mod quicktest;
pub mod service;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use environment::{Clock, SystemClock};
pub use error::{ErrorKind, QuickTestError, Result};
pub use quicktest::{
    QUICK_TEST_MAX_PERSON_LEN, QUICK_TEST_VALIDITY, QuickTest, QuickTestId, QuickTestRegister,
};
pub use service::{QuickTestService, ServiceFuture};
