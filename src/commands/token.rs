use crate::backup::PRE_IMPORT;
use crate::commands::{load_ledger, push_change, require_user, Out};
use crate::remote::Mode;
use crate::token::{export_token, import_token};
use crate::{Config, Result};
use tracing::debug;

/// Handles `ledger token export`.
pub async fn token_export(config: Config) -> Result<Out<String>> {
    let ledger = load_ledger(&config).await?;
    let token = export_token(ledger.entries())?;
    Ok(Out::new(
        format!("Token for {} entries:\n{token}", ledger.len()),
        token,
    ))
}

/// Handles `ledger token import`. The local entries are backed up and then replaced by the
/// entries in the token. The result is pushed when `auto_push` is on.
///
/// # Errors
/// - Returns an error when nobody is logged in or the token is invalid. Local entries are left
///   alone in both cases.
pub async fn token_import(config: Config, mode: Mode, token: &str) -> Result<Out<usize>> {
    let user = require_user(&config).await?;
    let entries = import_token(token)?;

    let local = load_ledger(&config).await?;
    if !local.is_empty() {
        let path = config
            .backup()
            .save_json(PRE_IMPORT, local.entries())
            .await?;
        debug!("Saved local entries to {}", path.display());
    }
    config.db().save_entries(&entries).await?;

    let pushed = push_change(&config, mode, &user).await;
    Ok(Out::new(
        format!("Imported {} entries. {pushed}", entries.len()),
        entries.len(),
    ))
}
