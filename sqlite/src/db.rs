//! Database handle and units of work.
//!
//! # Concurrency
//!
//! Every [`UnitOfWork`] starts with `BEGIN IMMEDIATE`, taking SQLite's write
//! lock before the first read. Two registrations racing on the same id are
//! therefore serialised by the database: the second one only reads the row
//! after the first has committed, and sees it as registered. Waiting for the
//! lock is bounded by the configured busy timeout.
//!
//! # Cancellation
//!
//! A caller may drop any operation at any await point. Opening the
//! transaction runs on its own task so that `BEGIN` always completes and is
//! paired with a transaction handle; if the caller is gone by then, that
//! handle is dropped and rolls back. A cancelled `BEGIN` would otherwise
//! leave its connection inside a transaction nobody owns.
//!
//! # Timestamps
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC text with microsecond
//! precision (`2025-01-01T00:00:00.000000Z`) so that string comparison in SQL
//! orders them chronologically.

use crate::config::{StoreConfig, StoreLocation};
use crate::error::StoreError;
use crate::migrate;
use chrono::{DateTime, SecondsFormat, SubsecRound, TimeDelta, Utc};
use quicktest_core::{Clock, QuickTest, QuickTestId};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, Transaction};
use std::sync::Arc;
use std::time::Duration;

/// Rows per `INSERT` statement in a batch, keeping bound parameters well
/// under SQLite's limit.
const INSERT_CHUNK_ROWS: usize = 500;

/// Process-wide handle to the quick test database.
///
/// Cloning is cheap; all clones share one connection pool and one clock.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("pool", &self.pool).finish_non_exhaustive()
    }
}

impl Database {
    /// Open the store and bring its schema up to date.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the database cannot be opened or a migration
    /// fails.
    pub async fn connect(config: &StoreConfig, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        let pool = match &config.location {
            StoreLocation::Memory => {
                let options = SqliteConnectOptions::new()
                    .in_memory(true)
                    .busy_timeout(config.busy_timeout);

                // Each connection to :memory: is its own database, so keep
                // exactly one and never recycle it.
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .min_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None)
                    .connect_with(options)
                    .await?
            },
            StoreLocation::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent).await.map_err(|e| {
                        StoreError::Config(format!(
                            "cannot create directory {}: {e}",
                            parent.display()
                        ))
                    })?;
                }

                let options = SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Wal)
                    .busy_timeout(config.busy_timeout);

                SqlitePoolOptions::new()
                    .max_connections(config.max_connections.max(1))
                    .connect_with(options)
                    .await?
            },
        };

        tracing::info!(location = %config.location, "Quick test store opened");

        let db = Self::from_pool(pool, clock);
        db.migrate().await?;
        Ok(db)
    }

    /// Wrap an existing pool. The caller is responsible for running
    /// [`Database::migrate`].
    #[must_use]
    pub fn from_pool(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    /// Apply pending migrations. Already applied scripts are skipped.
    ///
    /// Returns the number of scripts applied by this call.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Migration`] naming the script that failed.
    pub async fn migrate(&self) -> Result<usize, StoreError> {
        migrate::run(&self.pool).await
    }

    /// Begin a unit of work stamped with the clock's current time.
    ///
    /// Dropping the returned handle without committing rolls it back.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if no connection is available or the
    /// write lock cannot be acquired within the busy timeout, and
    /// [`StoreError::Aborted`] if the task opening the transaction panicked.
    pub async fn begin(&self) -> Result<UnitOfWork, StoreError> {
        let pool = self.pool.clone();
        let tx = tokio::spawn(async move { pool.begin_with("BEGIN IMMEDIATE").await })
            .await
            .map_err(|e| StoreError::Aborted(e.to_string()))??;
        Ok(UnitOfWork {
            tx,
            now: self.clock.now().trunc_subsecs(6),
        })
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The clock stamping units of work.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Close every pooled connection. Waits for in-flight units of work.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Quick test store closed");
    }
}

/// One atomic, isolated sequence of reads and writes.
///
/// All timestamps written inside a unit of work use [`UnitOfWork::now`], so a
/// batch insert gets one creation time. Nothing is persisted until
/// [`UnitOfWork::commit`]; dropping the unit of work discards it.
pub struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
    now: DateTime<Utc>,
}

impl UnitOfWork {
    /// The logical time of this unit of work.
    #[must_use]
    pub const fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Fetch a quick test by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query fails or the row cannot be decoded.
    pub async fn find(&mut self, id: &QuickTestId) -> Result<Option<QuickTest>, StoreError> {
        let row = sqlx::query_as::<_, QuickTestRow>(
            r"
            SELECT id, person, expired, created_at, registered_at
            FROM quick_tests
            WHERE id = ?
            LIMIT 1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(QuickTestRow::into_quick_test).transpose()
    }

    /// Insert unregistered quick tests, all created at [`UnitOfWork::now`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UniqueViolation`] if any id already exists (or
    /// appears twice in `ids`). Nothing is persisted in that case once the
    /// unit of work is dropped.
    pub async fn insert_many(&mut self, ids: &[QuickTestId]) -> Result<Vec<QuickTest>, StoreError> {
        let created_at = encode_time(self.now);

        for chunk in ids.chunks(INSERT_CHUNK_ROWS) {
            let mut builder: QueryBuilder<'_, Sqlite> =
                QueryBuilder::new("INSERT INTO quick_tests (id, created_at) ");
            builder.push_values(chunk, |mut row, id| {
                row.push_bind(id.as_str()).push_bind(created_at.as_str());
            });
            builder.build().execute(&mut *self.tx).await?;
        }

        Ok(ids
            .iter()
            .map(|id| QuickTest::new(id.clone(), self.now))
            .collect())
    }

    /// Set the registrant and stamp `registered_at` with [`UnitOfWork::now`].
    ///
    /// Unconditional column write; the caller checks the business rules.
    /// Returns whether a row matched.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the update fails.
    pub async fn register(&mut self, id: &QuickTestId, person: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r"
            UPDATE quick_tests
            SET person = ?,
                registered_at = ?
            WHERE id = ?
            ",
        )
        .bind(person)
        .bind(encode_time(self.now))
        .bind(id.as_str())
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Scrub one quick test. Returns `false` when no row has this id.
    ///
    /// An already expired row still matches, so scrubbing twice reports
    /// `true` both times.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the update fails.
    pub async fn expire_by_id(&mut self, id: &QuickTestId) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r"
            UPDATE quick_tests
            SET expired = 1,
                person = NULL
            WHERE id = ?
            ",
        )
        .bind(id.as_str())
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Scrub every unexpired quick test registered more than `validity`
    /// before [`UnitOfWork::now`]. Returns the number of rows scrubbed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the update fails.
    pub async fn expire_outdated(&mut self, validity: Duration) -> Result<u64, StoreError> {
        let Some(cutoff) = TimeDelta::from_std(validity)
            .ok()
            .and_then(|validity| self.now.checked_sub_signed(validity))
        else {
            // Window reaches past the earliest representable time
            return Ok(0);
        };

        let result = sqlx::query(
            r"
            UPDATE quick_tests
            SET expired = 1,
                person = NULL
            WHERE expired = 0
              AND registered_at IS NOT NULL
              AND registered_at < ?
            ",
        )
        .bind(encode_time(cutoff))
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    /// Persist every write made in this unit of work.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the commit fails; nothing is
    /// persisted in that case.
    pub async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    /// Discard every write made in this unit of work.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the rollback statement fails.
    pub async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

/// Row shape of the `quick_tests` table.
#[derive(sqlx::FromRow)]
struct QuickTestRow {
    id: String,
    person: Option<String>,
    expired: bool,
    created_at: String,
    registered_at: Option<String>,
}

impl QuickTestRow {
    fn into_quick_test(self) -> Result<QuickTest, StoreError> {
        Ok(QuickTest {
            id: QuickTestId::new(self.id),
            person: self.person.filter(|p| !p.is_empty()),
            expired: self.expired,
            created_at: decode_time(&self.created_at)?,
            registered_at: self.registered_at.as_deref().map(decode_time).transpose()?,
        })
    }
}

pub(crate) fn encode_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_time(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("invalid timestamp {value:?}: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;

    #[test]
    fn encoded_times_are_fixed_width_and_sortable() {
        let early = DateTime::parse_from_rfc3339("2025-01-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let late = early + TimeDelta::microseconds(1);

        let (a, b) = (encode_time(early), encode_time(late));
        assert_eq!(a, "2025-01-01T09:00:00.000000Z");
        assert_eq!(a.len(), b.len());
        assert!(a < b);
    }

    #[test]
    fn time_roundtrip_at_microsecond_precision() {
        let now = Utc::now().trunc_subsecs(6);
        assert_eq!(decode_time(&encode_time(now)).unwrap(), now);
    }

    #[test]
    fn corrupt_time_is_reported() {
        assert!(matches!(decode_time("yesterday"), Err(StoreError::Corrupt(_))));
    }
}
