//! Schema migrations for the ledger database.
//!
//! Each schema version `NN` has a pair of scripts next to this file:
//! - `migration_NN_up.sql` moves the schema from `NN-1` to `NN`
//! - `migration_NN_down.sql` moves it back from `NN` to `NN-1`

use anyhow::{bail, Context};
use sqlx::{Executor, SqlitePool};
use tracing::debug;

use crate::Result;

/// The schema version this build of the program expects.
pub(crate) const SCHEMA_VERSION: i32 = 1;

struct Step {
    version: i32,
    up: &'static str,
    down: &'static str,
}

const STEPS: &[Step] = &[Step {
    version: 1,
    up: include_str!("migration_01_up.sql"),
    down: include_str!("migration_01_down.sql"),
}];

/// Creates the `schema_version` table at version 0 if it does not exist yet.
pub(crate) async fn bootstrap(pool: &SqlitePool) -> Result<()> {
    sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
        .execute(pool)
        .await
        .context("Failed to create schema_version table")?;
    let (rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM schema_version")
        .fetch_one(pool)
        .await
        .context("Failed to read schema_version")?;
    if rows == 0 {
        sqlx::query("INSERT INTO schema_version (version) VALUES (0)")
            .execute(pool)
            .await
            .context("Failed to seed schema_version")?;
    }
    Ok(())
}

/// Reads the schema version recorded in the database.
pub(crate) async fn current_version(pool: &SqlitePool) -> Result<i32> {
    let (version,): (i32,) = sqlx::query_as("SELECT MAX(version) FROM schema_version")
        .fetch_one(pool)
        .await
        .context("Failed to read the schema version")?;
    Ok(version)
}

/// Moves the schema from whatever version it is at to `target`, one step at a time. Each step
/// runs in its own transaction together with the `schema_version` update.
pub(crate) async fn migrate_to(pool: &SqlitePool, target: i32) -> Result<()> {
    let current = current_version(pool).await?;
    if current == target {
        debug!("Schema is at version {target}, nothing to migrate");
        return Ok(());
    }
    check_steps(current, target)?;

    if current < target {
        for version in (current + 1)..=target {
            debug!("Applying schema step {version:02} (up)");
            apply(pool, step(version)?.up, version).await?;
        }
    } else {
        for version in ((target + 1)..=current).rev() {
            debug!("Reverting schema step {version:02} (down)");
            apply(pool, step(version)?.down, version - 1).await?;
        }
    }
    debug!("Schema is now at version {target}");
    Ok(())
}

fn step(version: i32) -> Result<&'static Step> {
    STEPS
        .iter()
        .find(|s| s.version == version)
        .with_context(|| format!("Schema step {version} not found"))
}

async fn apply(pool: &SqlitePool, sql: &str, resulting_version: i32) -> Result<()> {
    let mut tx = pool
        .begin()
        .await
        .context("Failed to begin schema transaction")?;
    tx.execute(sql)
        .await
        .context("Failed to execute schema script")?;
    sqlx::query("UPDATE schema_version SET version = ?")
        .bind(resulting_version)
        .execute(&mut *tx)
        .await
        .context("Failed to record the schema version")?;
    tx.commit()
        .await
        .context("Failed to commit schema transaction")?;
    Ok(())
}

/// Fails before touching the database if any step between `from` and `to` is unknown, e.g. when
/// the database was written by a newer build.
fn check_steps(from: i32, to: i32) -> Result<()> {
    let (low, high) = if from < to { (from + 1, to) } else { (to + 1, from) };
    for version in low..=high {
        if !STEPS.iter().any(|s| s.version == version) {
            bail!("Cannot migrate the schema from version {from} to {to}: step {version} is unknown");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::str::FromStr;
    use tempfile::TempDir;

    async fn pool() -> (TempDir, SqlitePool) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("migrate.sqlite");
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .unwrap()
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        bootstrap(&pool).await.unwrap();
        (dir, pool)
    }

    async fn has_table(pool: &SqlitePool, name: &str) -> bool {
        let (n,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?")
                .bind(name)
                .fetch_one(pool)
                .await
                .unwrap();
        n > 0
    }

    #[tokio::test]
    async fn test_bootstrap_is_idempotent() {
        let (_dir, pool) = pool().await;
        bootstrap(&pool).await.unwrap();
        let (rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM schema_version")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);
        assert_eq!(current_version(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_up_then_down() {
        let (_dir, pool) = pool().await;

        migrate_to(&pool, 1).await.unwrap();
        assert_eq!(current_version(&pool).await.unwrap(), 1);
        assert!(has_table(&pool, "entries").await);
        assert!(has_table(&pool, "kv").await);

        // Already there.
        migrate_to(&pool, 1).await.unwrap();
        assert_eq!(current_version(&pool).await.unwrap(), 1);

        migrate_to(&pool, 0).await.unwrap();
        assert_eq!(current_version(&pool).await.unwrap(), 0);
        assert!(!has_table(&pool, "entries").await);
        assert!(!has_table(&pool, "kv").await);
    }

    #[test]
    fn test_unknown_steps_are_rejected() {
        assert!(check_steps(0, SCHEMA_VERSION).is_ok());
        assert!(check_steps(SCHEMA_VERSION, 0).is_ok());
        assert!(check_steps(0, SCHEMA_VERSION + 1).is_err());
        assert!(check_steps(SCHEMA_VERSION + 2, 0).is_err());
    }
}
