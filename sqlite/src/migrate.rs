//! Ordered, name-keyed schema migrations.
//!
//! Scripts are embedded at compile time and applied in name order. Each one
//! runs in its own transaction together with the bookkeeping insert into
//! `migrations`, so a script is either fully applied and recorded or not at
//! all. Re-running on an up-to-date database is a no-op.

use crate::error::StoreError;
use sqlx::SqlitePool;

struct Migration {
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "0001_create_quick_tests.sql",
        sql: include_str!("../migrations/0001_create_quick_tests.sql"),
    },
    Migration {
        name: "0002_add_expired.sql",
        sql: include_str!("../migrations/0002_add_expired.sql"),
    },
];

/// Apply every migration not yet recorded. Returns how many were applied.
pub(crate) async fn run(pool: &SqlitePool) -> Result<usize, StoreError> {
    sqlx::query("CREATE TABLE IF NOT EXISTS migrations (name TEXT PRIMARY KEY)")
        .execute(pool)
        .await?;

    let mut ordered: Vec<&Migration> = MIGRATIONS.iter().collect();
    ordered.sort_by_key(|m| m.name);

    let mut applied = 0;
    for migration in ordered {
        if apply(pool, migration).await? {
            applied += 1;
        }
    }

    if applied > 0 {
        tracing::info!(applied, "Migrations applied");
    }
    Ok(applied)
}

async fn apply(pool: &SqlitePool, migration: &Migration) -> Result<bool, StoreError> {
    let wrap = |source: sqlx::Error| StoreError::Migration {
        name: migration.name,
        source,
    };

    let mut tx = pool.begin_with("BEGIN IMMEDIATE").await.map_err(wrap)?;

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM migrations WHERE name = ?")
        .bind(migration.name)
        .fetch_one(&mut *tx)
        .await
        .map_err(wrap)?;

    if count != 0 {
        tracing::debug!(name = migration.name, "Migration already applied");
        return Ok(false);
    }

    sqlx::raw_sql(migration.sql)
        .execute(&mut *tx)
        .await
        .map_err(wrap)?;

    sqlx::query("INSERT INTO migrations (name) VALUES (?)")
        .bind(migration.name)
        .execute(&mut *tx)
        .await
        .map_err(wrap)?;

    tx.commit().await.map_err(wrap)?;

    tracing::debug!(name = migration.name, "Migration applied");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migration_names_are_unique_and_ordered() {
        let names: Vec<&str> = MIGRATIONS.iter().map(|m| m.name).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(names, sorted);
    }
}
