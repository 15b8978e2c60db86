//! Reconciliation between the local database and the remote record.
//!
//! The remote record is one document holding the whole ledger and a timestamp. The local
//! database remembers the timestamp of the last document it reconciled with (the watermark).
//!
//! - **Pull** replaces the local entries with the remote ones when the remote timestamp is newer
//!   than the watermark, when the device has never synced, or when forced.
//! - **Push** replaces the remote record with the local entries and a fresh timestamp.
//!
//! The later writer wins. Nothing is merged.

mod poll;

use crate::backup::{self, Backup};
use crate::db::Db;
use crate::model::{AuthUser, RemoteSnapshot};
use crate::remote::{self, Mode, RemoteStore};
use crate::{utils, Config, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

pub use poll::{run_polling, PollSummary};

/// The sync flag shown to the user.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    Synced,
    Error,
}

serde_plain::derive_display_from_serialize!(SyncStatus);
serde_plain::derive_fromstr_from_deserialize!(SyncStatus);

/// The outcome of the last sync operation, persisted so that `ledger status` can show it.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    pub status: SyncStatus,
    /// The error of the last failed operation, cleared on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Milliseconds since the epoch of the last successful operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<i64>,
}

/// What a pull did.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum PullOutcome {
    /// Local entries were replaced by the remote ones.
    Applied { entries: usize, updated_at: i64 },
    /// The remote record is not newer than what this device already has.
    UpToDate { updated_at: i64 },
    /// There is no remote record yet. Local entries were left alone.
    NoRemoteRecord,
    /// Another sync operation was in flight.
    Skipped,
}

/// What a push did.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum PushOutcome {
    Pushed { entries: usize, updated_at: i64 },
    /// Another sync operation was in flight.
    Skipped,
}

/// How often, and how patiently, a failed pull is retried.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure.
    pub attempts: u32,
    /// Delay before the first retry, doubled before each further one.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            attempts: config.retry_attempts(),
            delay: config.retry_delay(),
        }
    }

    pub fn none() -> Self {
        Self {
            attempts: 0,
            delay: Duration::ZERO,
        }
    }

    fn delay_before(&self, retry: u32) -> Duration {
        self.delay.saturating_mul(2u32.saturating_pow(retry))
    }
}

/// Whether a remote document stamped `remote_updated_at` should replace the local entries.
pub(crate) fn should_apply(force: bool, watermark: Option<i64>, remote_updated_at: i64) -> bool {
    match watermark {
        _ if force => true,
        None => true,
        Some(watermark) => remote_updated_at > watermark,
    }
}

/// Runs pulls and pushes for one device against one remote record.
pub struct SyncEngine {
    db: Db,
    backup: Backup,
    remote: Box<dyn RemoteStore>,
    retry: RetryPolicy,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag when the operation holding it ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SyncEngine {
    /// Creates an engine for `user`. The remote key is the user's sync token, or the configured
    /// shared record key when the user has none.
    pub fn new(config: &Config, user: &AuthUser, mode: Mode) -> Result<Self> {
        let key = user.sync_token().unwrap_or(config.record_key());
        let store = remote::store(config, key, mode)?;
        Ok(Self::with_store(config, store, RetryPolicy::from_config(config)))
    }

    pub fn with_store(config: &Config, remote: Box<dyn RemoteStore>, retry: RetryPolicy) -> Self {
        Self {
            db: config.db().clone(),
            backup: config.backup(),
            remote,
            retry,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Where the remote record lives.
    pub fn location(&self) -> String {
        self.remote.location()
    }

    pub async fn state(&self) -> Result<SyncState> {
        self.db.sync_state().await
    }

    fn begin(&self) -> Option<InFlight<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(&self.in_flight))
    }

    /// Pulls once, without retrying.
    pub async fn pull(&self, force: bool) -> Result<PullOutcome> {
        self.pull_inner(force, RetryPolicy::none()).await
    }

    /// Pulls, retrying failures according to the engine's retry policy.
    pub async fn pull_with_retry(&self, force: bool) -> Result<PullOutcome> {
        self.pull_inner(force, self.retry).await
    }

    async fn pull_inner(&self, force: bool, retry: RetryPolicy) -> Result<PullOutcome> {
        let Some(_guard) = self.begin() else {
            debug!("A sync is already in flight, skipping pull");
            return Ok(PullOutcome::Skipped);
        };
        self.mark_syncing().await?;

        let mut attempt = 0;
        loop {
            match self.pull_once(force).await {
                Ok(outcome) => {
                    self.mark_synced().await?;
                    return Ok(outcome);
                }
                Err(e) if attempt < retry.attempts => {
                    let delay = retry.delay_before(attempt);
                    attempt += 1;
                    warn!(
                        "Pull from {} failed, retry {attempt} of {} in {delay:?}: {e:#}",
                        self.location(),
                        retry.attempts
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    self.mark_failed(&e).await?;
                    return Err(e);
                }
            }
        }
    }

    async fn pull_once(&self, force: bool) -> Result<PullOutcome> {
        let Some(remote) = self.remote.fetch().await? else {
            debug!("No record at {}, keeping local entries", self.location());
            return Ok(PullOutcome::NoRemoteRecord);
        };
        let watermark = self.db.watermark().await?;
        if !should_apply(force, watermark, remote.updated_at) {
            debug!(
                "Remote record ({}) is not newer than watermark ({watermark:?})",
                remote.updated_at
            );
            return Ok(PullOutcome::UpToDate {
                updated_at: remote.updated_at,
            });
        }

        let local = self.db.load_entries().await?;
        if !local.is_empty() && local != remote.entries {
            let path = self.backup.save_json(backup::PRE_PULL, &local).await?;
            debug!("Saved local entries to {}", path.display());
        }
        self.db.save_entries(&remote.entries).await?;
        self.db.set_watermark(remote.updated_at).await?;
        info!(
            "Pulled {} entries from {} (updated at {})",
            remote.entries.len(),
            self.location(),
            remote.updated_at
        );
        Ok(PullOutcome::Applied {
            entries: remote.entries.len(),
            updated_at: remote.updated_at,
        })
    }

    /// Replaces the remote record with every local entry and a fresh timestamp. On success the
    /// watermark moves to that timestamp, so this device will not pull its own write back.
    pub async fn push(&self) -> Result<PushOutcome> {
        let Some(_guard) = self.begin() else {
            debug!("A sync is already in flight, skipping push");
            return Ok(PushOutcome::Skipped);
        };
        self.mark_syncing().await?;
        match self.push_once().await {
            Ok(outcome) => {
                self.mark_synced().await?;
                Ok(outcome)
            }
            Err(e) => {
                self.mark_failed(&e).await?;
                Err(e)
            }
        }
    }

    async fn push_once(&self) -> Result<PushOutcome> {
        let entries = self.db.load_entries().await?;
        let count = entries.len();
        let updated_at = utils::now_millis();
        self.remote
            .replace(&RemoteSnapshot::new(entries, updated_at))
            .await?;
        self.db.set_watermark(updated_at).await?;
        info!("Pushed {count} entries to {}", self.location());
        Ok(PushOutcome::Pushed {
            entries: count,
            updated_at,
        })
    }

    async fn mark_syncing(&self) -> Result<()> {
        let mut state = self.db.sync_state().await?;
        state.status = SyncStatus::Syncing;
        self.db.save_sync_state(&state).await
    }

    async fn mark_synced(&self) -> Result<()> {
        let state = SyncState {
            status: SyncStatus::Synced,
            last_error: None,
            last_synced_at: Some(utils::now_millis()),
        };
        self.db.save_sync_state(&state).await
    }

    async fn mark_failed(&self, error: &crate::Error) -> Result<()> {
        let mut state = self.db.sync_state().await?;
        state.status = SyncStatus::Error;
        state.last_error = Some(format!("{error:#}"));
        self.db.save_sync_state(&state).await
    }
}
