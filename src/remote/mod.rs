//! Access to the remote key-value record that devices share.
//!
//! The record lives at `{remote_url}/{bucket}/{key}` and holds the whole ledger as one
//! `RemoteSnapshot` document. There is no authentication; anybody who knows the bucket and key
//! can read and replace it.

mod kvdb;
mod memory;

use crate::model::RemoteSnapshot;
use crate::{Config, Result};
use anyhow::{ensure, Context};
use url::Url;

pub(crate) use kvdb::KvdbStore;
pub use memory::MemoryStore;

/// Selects the implementation behind `RemoteStore`.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub enum Mode {
    /// Talk to the configured key-value service over HTTP.
    #[default]
    Http,
    /// Keep the record in process memory. Used by tests and for trying the program offline.
    Testing,
}

impl Mode {
    /// `Mode::Testing` when `LEDGER_IN_TEST_MODE` is set and non-empty, otherwise `Mode::Http`.
    pub fn from_env() -> Self {
        match std::env::var("LEDGER_IN_TEST_MODE") {
            Ok(v) if !v.is_empty() => Mode::Testing,
            _ => Mode::Http,
        }
    }
}

/// The remote record, read and replaced as a whole.
#[async_trait::async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetches the record. Returns `Ok(None)` when the record does not exist.
    ///
    /// # Errors
    /// Fails when the service is unreachable, answers with a non-success status, or returns a
    /// document that is not a ledger snapshot.
    async fn fetch(&self) -> Result<Option<RemoteSnapshot>>;

    /// Replaces the record with `snapshot`.
    async fn replace(&self, snapshot: &RemoteSnapshot) -> Result<()>;

    /// The address of the record, for log messages.
    fn location(&self) -> String;
}

/// Builds the URL of the record `key` in the configured bucket. Bucket and key are escaped as
/// path segments, so a sync token may contain any characters.
pub(crate) fn record_url(base: &str, bucket: &str, key: &str) -> Result<Url> {
    ensure!(!key.trim().is_empty(), "The record key must not be empty");
    let mut url =
        Url::parse(base).with_context(|| format!("The remote URL '{base}' is not valid"))?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("The remote URL '{base}' cannot hold a path"))?
        .pop_if_empty()
        .push(bucket)
        .push(key);
    Ok(url)
}

/// Creates the remote store for `key` according to `mode`.
pub fn store(config: &Config, key: &str, mode: Mode) -> Result<Box<dyn RemoteStore>> {
    let url = record_url(config.remote_url(), config.bucket(), key)?;
    Ok(match mode {
        Mode::Http => Box::new(KvdbStore::new(url, config.request_timeout())?),
        Mode::Testing => Box::new(MemoryStore::new(url.as_str())),
    })
}
