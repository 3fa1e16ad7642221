//! SQLite record store for quick tests.
//!
//! This crate provides the persistence layer and the lifecycle rules that run
//! on top of it:
//!
//! - [`Database`]: process-wide handle with connection pooling and migrations
//! - [`UnitOfWork`]: one atomic transaction stamped with a single "now"
//! - [`SqliteQuickTestService`]: implements [`QuickTestService`] with
//!   validation, the registration state machine and expiry
//!
//! Storage errors are classified into the domain taxonomy at exactly one
//! place, `impl From<StoreError> for QuickTestError`.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use quicktest_core::{QuickTestId, SystemClock};
//! use quicktest_sqlite::{Database, SqliteQuickTestService, StoreConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::connect(&StoreConfig::in_memory(), Arc::new(SystemClock)).await?;
//! let service = SqliteQuickTestService::new(db);
//!
//! let quicktest = service.create(QuickTestId::generate()).await?;
//! assert!(quicktest.person.is_none());
//! # Ok(())
//! # }
//! ```
//!
//! [`QuickTestService`]: quicktest_core::QuickTestService

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod db;
pub mod error;
mod migrate;
pub mod service;
pub mod stats;

pub use config::{StoreConfig, StoreLocation};
pub use db::{Database, UnitOfWork};
pub use error::StoreError;
pub use service::SqliteQuickTestService;
pub use stats::QuickTestStats;
