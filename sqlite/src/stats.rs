//! Aggregate counts over the quick test table.

use crate::db::Database;
use crate::error::StoreError;
use serde::Serialize;

/// Snapshot of how many kits are in each lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QuickTestStats {
    /// Every record, in any state.
    pub total: u64,
    /// Registered and not yet expired.
    pub registered: u64,
    /// Never registered and not expired; still available for registration.
    pub available: u64,
}

impl Database {
    /// Count records by lifecycle state in a single consistent read.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails.
    pub async fn stats(&self) -> Result<QuickTestStats, StoreError> {
        let (total, registered, available): (i64, i64, i64) = sqlx::query_as(
            r"
            SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN expired = 0 AND registered_at IS NOT NULL THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN expired = 0 AND registered_at IS NULL THEN 1 ELSE 0 END), 0)
            FROM quick_tests
            ",
        )
        .fetch_one(self.pool())
        .await?;

        Ok(QuickTestStats {
            total: count(total)?,
            registered: count(registered)?,
            available: count(available)?,
        })
    }
}

fn count(value: i64) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative row count {value}")))
}
