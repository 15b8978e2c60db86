//! This module is responsible for reading and writing the local SQLite database: the entry list,
//! the logged-in user and the sync bookkeeping.

mod migrations;

use crate::model::{AuthUser, DailyEntry};
use crate::sync::SyncState;
use crate::Result;
use anyhow::{bail, Context};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

const USER_KEY: &str = "user";
const WATERMARK_KEY: &str = "watermark";
const SYNC_STATE_KEY: &str = "sync_state";

#[derive(Debug, Clone)]
pub(crate) struct Db {
    pool: SqlitePool,
}

impl Db {
    /// - Validates that no file currently exists at `path`
    /// - Creates a new SQLite file at `path`
    /// - Initializes the database schema
    pub(crate) async fn init(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            bail!("A database already exists at {}", path.display());
        }
        let db = Self::open(path, true).await?;
        migrations::bootstrap(&db.pool).await?;
        migrations::migrate_to(&db.pool, migrations::SCHEMA_VERSION).await?;
        Ok(db)
    }

    /// - Validates that there is a SQLite file at `path`
    /// - Brings the schema up to date
    pub(crate) async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            bail!("The database file is missing '{}'", path.display());
        }
        let db = Self::open(path, false).await?;
        migrations::bootstrap(&db.pool).await?;
        migrations::migrate_to(&db.pool, migrations::SCHEMA_VERSION).await?;
        Ok(db)
    }

    async fn open(path: &Path, create: bool) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .context("Failed to parse SQLite connection string")?
            .create_if_missing(create);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("Unable to open SQLite database {}", path.display()))?;
        Ok(Self { pool })
    }

    /// Returns every stored entry in the order it was recorded.
    pub(crate) async fn load_entries(&self) -> Result<Vec<DailyEntry>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT body FROM entries ORDER BY position")
            .fetch_all(&self.pool)
            .await
            .context("Failed to read entries")?;
        rows.into_iter()
            .map(|(body,)| {
                serde_json::from_str(&body).context("A stored entry could not be parsed")
            })
            .collect()
    }

    /// Replaces the stored entry list with `entries`.
    pub(crate) async fn save_entries(&self, entries: &[DailyEntry]) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;
        sqlx::query("DELETE FROM entries")
            .execute(&mut *tx)
            .await
            .context("Failed to clear entries")?;
        for (position, entry) in entries.iter().enumerate() {
            let body = serde_json::to_string(entry).context("Failed to serialize entry")?;
            sqlx::query(
                "INSERT INTO entries (position, id, date, parent_id, is_history, updated_at, body) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(position as i64)
            .bind(&entry.id)
            .bind(&entry.date)
            .bind(entry.parent_id.as_deref())
            .bind(entry.is_history())
            .bind(entry.updated_at)
            .bind(body)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to store entry {}", entry.id))?;
        }
        tx.commit().await.context("Failed to commit entries")?;
        debug!("Stored {} entries", entries.len());
        Ok(())
    }

    pub(crate) async fn count_entries(&self) -> Result<u64> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM entries")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count entries")?;
        Ok(n as u64)
    }

    pub(crate) async fn load_user(&self) -> Result<Option<AuthUser>> {
        self.get(USER_KEY).await
    }

    /// Stores the logged-in user. Passing `None` logs out, which also forgets the local entries
    /// and all sync bookkeeping.
    pub(crate) async fn save_user(&self, user: Option<&AuthUser>) -> Result<()> {
        match user {
            Some(user) => self.put(USER_KEY, user).await,
            None => {
                self.save_entries(&[]).await?;
                self.delete(USER_KEY).await?;
                self.delete(WATERMARK_KEY).await?;
                self.delete(SYNC_STATE_KEY).await
            }
        }
    }

    /// The `updatedAt` of the remote record that local entries were last reconciled with, or
    /// `None` if this device has never synced.
    pub(crate) async fn watermark(&self) -> Result<Option<i64>> {
        self.get(WATERMARK_KEY).await
    }

    pub(crate) async fn set_watermark(&self, updated_at: i64) -> Result<()> {
        self.put(WATERMARK_KEY, &updated_at).await
    }

    pub(crate) async fn sync_state(&self) -> Result<SyncState> {
        Ok(self.get(SYNC_STATE_KEY).await?.unwrap_or_default())
    }

    pub(crate) async fn save_sync_state(&self, state: &SyncState) -> Result<()> {
        self.put(SYNC_STATE_KEY, state).await
    }

    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to read '{key}'"))?;
        match row {
            Some((value,)) => Ok(Some(
                serde_json::from_str(&value)
                    .with_context(|| format!("The stored value for '{key}' is invalid"))?,
            )),
            None => Ok(None),
        }
    }

    async fn put<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)
            .with_context(|| format!("Failed to serialize '{key}'"))?;
        sqlx::query(
            "INSERT INTO kv (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(json)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to write '{key}'"))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM kv WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to delete '{key}'"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::SyncStatus;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn entry(date: &str) -> DailyEntry {
        DailyEntry::new(date, BTreeMap::new(), vec![], 1).unwrap()
    }

    #[tokio::test]
    async fn test_init_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.sqlite");
        let db = Db::init(&path).await.unwrap();
        assert_eq!(db.count_entries().await.unwrap(), 0);
        assert!(Db::init(&path).await.is_err());
        drop(db);

        let db = Db::load(&path).await.unwrap();
        assert!(db.load_entries().await.unwrap().is_empty());
        assert!(Db::load(dir.path().join("missing.sqlite")).await.is_err());
    }

    #[tokio::test]
    async fn test_entries_replace_and_keep_order() {
        let dir = TempDir::new().unwrap();
        let db = Db::init(dir.path().join("ledger.sqlite")).await.unwrap();

        let mut a = entry("2025-03-02");
        a.is_history = Some(true);
        let b = entry("2025-03-01");
        db.save_entries(&[a.clone(), b.clone()]).await.unwrap();
        assert_eq!(db.load_entries().await.unwrap(), vec![a.clone(), b.clone()]);

        db.save_entries(&[b.clone()]).await.unwrap();
        assert_eq!(db.load_entries().await.unwrap(), vec![b]);
        assert_eq!(db.count_entries().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_logout_clears_everything() {
        let dir = TempDir::new().unwrap();
        let db = Db::init(dir.path().join("ledger.sqlite")).await.unwrap();

        let user = AuthUser::new("admin@example.com", Some("family".into()));
        db.save_user(Some(&user)).await.unwrap();
        db.save_entries(&[entry("2025-03-02")]).await.unwrap();
        db.set_watermark(1234).await.unwrap();
        let state = SyncState {
            status: SyncStatus::Synced,
            ..SyncState::default()
        };
        db.save_sync_state(&state).await.unwrap();

        assert_eq!(db.load_user().await.unwrap(), Some(user));
        assert_eq!(db.watermark().await.unwrap(), Some(1234));
        assert_eq!(db.sync_state().await.unwrap().status, SyncStatus::Synced);

        db.save_user(None).await.unwrap();
        assert_eq!(db.load_user().await.unwrap(), None);
        assert_eq!(db.watermark().await.unwrap(), None);
        assert_eq!(db.count_entries().await.unwrap(), 0);
        assert_eq!(db.sync_state().await.unwrap().status, SyncStatus::Idle);
    }
}
