//! Store-level errors and their classification into the domain taxonomy.

use quicktest_core::QuickTestError;
use thiserror::Error;

/// Low-level failures reported by the record store.
///
/// The store enforces storage integrity only. Business rules are checked by
/// the service before it writes.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// Connection, query or transaction failure.
    #[error("database error: {0}")]
    Database(sqlx::Error),

    /// A migration script failed to apply.
    #[error("migration {name} failed: {source}")]
    Migration {
        /// Script name.
        name: &'static str,
        /// Underlying failure.
        #[source]
        source: sqlx::Error,
    },

    /// A stored value could not be decoded.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// The store could not be opened with the given configuration.
    #[error("invalid store configuration: {0}")]
    Config(String),

    /// Opening a unit of work did not run to completion.
    #[error("unit of work aborted: {0}")]
    Aborted(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return Self::UniqueViolation(db_err.message().to_string());
            }
        }
        Self::Database(err)
    }
}

impl From<StoreError> for QuickTestError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(_) => Self::conflict("quick test already exists"),
            other => {
                tracing::error!(error = %other, "quick test store failure");
                Self::internal("internal storage error")
            }
        }
    }
}
