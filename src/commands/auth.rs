//! Session command handlers.
//!
//! This module implements the CLI commands for:
//! - `ledger login` - Check the admin login, remember the user and pull the shared record
//! - `ledger logout` - Forget the user and clear the local entries
//! - `ledger status` - Report who is logged in and how the last sync went

use crate::args::LoginArgs;
use crate::backup::PRE_LOGOUT;
use crate::commands::{load_ledger, Out};
use crate::model::AuthUser;
use crate::remote::Mode;
use crate::sync::{PullOutcome, SyncEngine, SyncState};
use crate::{Config, Result};
use anyhow::bail;
use serde::Serialize;
use tracing::{debug, warn};

/// Handles `ledger login`.
///
/// The email is compared case-insensitively and the password exactly against the admin pair in
/// `config.json`. On success the user is stored with a fresh session id and the shared record is
/// pulled with force, so this device starts from what the other devices have. A failed pull only
/// warns; the login stands.
///
/// # Errors
/// - Returns an error if someone is already logged in. Their entries and sync state belong to
///   their record, so `ledger logout` must clear them first.
/// - Returns an error if the login is wrong or no admin login is configured.
pub async fn login(config: Config, mode: Mode, args: &LoginArgs) -> Result<Out<AuthUser>> {
    if let Some(current) = config.db().load_user().await? {
        bail!(
            "Already logged in as {}, run 'ledger logout' first",
            current.email
        );
    }
    if !config.validate_admin(args.email(), args.password())? {
        bail!("Invalid email or password");
    }
    let user = AuthUser::new(
        args.email().trim().to_lowercase(),
        args.sync_token().map(str::to_string),
    );
    config.db().save_user(Some(&user)).await?;
    debug!("Logged in as {} ({})", user.email, user.id);

    let engine = SyncEngine::new(&config, &user, mode)?;
    let sync_note = match engine.pull_with_retry(true).await {
        Ok(PullOutcome::Applied { entries, .. }) => format!("Pulled {entries} entries."),
        Ok(PullOutcome::NoRemoteRecord) => "The shared record is empty.".to_string(),
        Ok(_) => "Already up to date.".to_string(),
        Err(e) => {
            warn!("Logged in but the pull failed: {e:#}");
            "The pull failed, run 'ledger sync down' to retry.".to_string()
        }
    };
    Ok(Out::new(
        format!("Logged in as {}. {sync_note}", user.email),
        user,
    ))
}

/// Handles `ledger logout`. Local entries are written to a backup file, then the user, the
/// entries and all sync bookkeeping are cleared.
pub async fn logout(config: Config) -> Result<Out<()>> {
    let Some(user) = config.db().load_user().await? else {
        return Ok("Not logged in".into());
    };
    let ledger = load_ledger(&config).await?;
    if !ledger.is_empty() {
        let path = config
            .backup()
            .save_json(PRE_LOGOUT, ledger.entries())
            .await?;
        debug!("Saved local entries to {}", path.display());
    }
    config.db().save_user(None).await?;
    Ok(format!("Logged out {}", user.email).into())
}

/// What `ledger status` reports.
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub user: Option<AuthUser>,
    pub entries: u64,
    pub watermark: Option<i64>,
    pub sync: SyncState,
}

/// Handles `ledger status`.
pub async fn status(config: Config) -> Result<Out<Status>> {
    let db = config.db();
    let status = Status {
        user: db.load_user().await?,
        entries: db.count_entries().await?,
        watermark: db.watermark().await?,
        sync: db.sync_state().await?,
    };

    let mut message = match &status.user {
        Some(user) => format!("Logged in as {}", user.email),
        None => "Not logged in".to_string(),
    };
    message.push_str(&format!(
        "\n  Entries: {}\n  Sync status: {}",
        status.entries, status.sync.status
    ));
    if let Some(error) = &status.sync.last_error {
        message.push_str(&format!("\n  Last error: {error}"));
    }
    if let Some(at) = status.sync.last_synced_at.and_then(chrono::DateTime::from_timestamp_millis)
    {
        message.push_str(&format!("\n  Last synced: {}", at.to_rfc3339()));
    }
    Ok(Out::new(message, status))
}
