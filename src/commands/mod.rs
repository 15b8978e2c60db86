//! Command handlers for the ledger CLI.
//!
//! This module contains implementations for all CLI subcommands.

mod auth;
mod entry;
mod init;
mod report;
mod sync;
mod token;

use crate::model::AuthUser;
use crate::remote::Mode;
use crate::sync::{PushOutcome, SyncEngine};
use crate::{Config, Ledger, Result};
use anyhow::Context;
use serde::Serialize;
use std::fmt::Debug;
use tracing::{debug, info, warn};

pub use auth::{login, logout, status, Status};
pub use entry::{add, delete, edit};
pub use init::init;
pub use report::{dashboard, export, history, unit_dashboard};
pub use sync::{sync_down, sync_up, watch};
pub use token::{token_export, token_import};

/// The output type for a command. This allows the command to return a consistent message and,
/// optionally, structured data.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// A message that can be printed to the user regarding the outcome of the command execution.
    message: String,

    /// Any structured data that needs to be output from the call.
    structure: Option<T>,
}

impl<T, S> From<S> for Out<T>
where
    T: Debug + Clone + Serialize,
    S: Into<String>,
{
    fn from(value: S) -> Self {
        Out::new_message(value)
    }
}

impl<T> Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// Create a new `Out` object that has `Some(structure)`.
    pub fn new<S>(message: S, structure: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: Some(structure),
        }
    }

    /// Create a new `Out` object that has `None` for `structure`.
    pub fn new_message<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: None,
        }
    }

    /// Get the `message`.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the structured data stored in `structure`.
    pub fn structure(&self) -> Option<&T> {
        self.structure.as_ref()
    }

    /// Print the message to `info!` and the structured data (if it exists) as JSON to `debug!`.
    pub fn print(&self) {
        info!("{}", self.message);
        if let Some(structure) = self.structure() {
            if let Ok(json) = serde_json::to_string_pretty(structure) {
                debug!("Command output:\n\n{json}\n\n");
            }
        }
    }
}

/// The logged in user, or an error telling the user to log in.
async fn require_user(config: &Config) -> Result<AuthUser> {
    config
        .db()
        .load_user()
        .await?
        .context("Not logged in, run 'ledger login' first")
}

async fn load_ledger(config: &Config) -> Result<Ledger> {
    Ok(Ledger::new(config.db().load_entries().await?))
}

/// Pushes after a local change when `auto_push` is on. A failed push is logged and left in the
/// sync status; the local change stands either way.
///
/// Returns a sentence describing what happened, to be appended to the command's message.
async fn push_change(config: &Config, mode: Mode, user: &AuthUser) -> String {
    if !config.auto_push() {
        return "Not pushed, auto_push is off.".to_string();
    }
    let result = match SyncEngine::new(config, user, mode) {
        Ok(engine) => engine.push().await,
        Err(e) => Err(e),
    };
    match result {
        Ok(PushOutcome::Pushed { .. }) => "Pushed to the shared record.".to_string(),
        Ok(PushOutcome::Skipped) => "Push skipped, another sync was running.".to_string(),
        Err(e) => {
            warn!("Saved locally but the push failed: {e:#}");
            "Saved locally only, run 'ledger sync up' to retry the push.".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_require_user() {
        let env = TestEnv::new().await;
        assert!(require_user(&env.config()).await.is_ok());
        env.config().db().save_user(None).await.unwrap();
        let err = require_user(&env.config()).await.unwrap_err();
        assert!(err.to_string().contains("Not logged in"));
    }
}
