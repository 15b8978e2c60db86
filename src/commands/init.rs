use crate::args::InitArgs;
use crate::commands::Out;
use crate::config::InitSettings;
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the data directory, its subdirectories, an initial `config.json` built from `args` and
/// an empty local database.
///
/// # Arguments
/// - `ledger_home` - The directory that will be the root of data directory, e.g. `$HOME/ledger`
/// - `args` - The bucket, remote and admin login to write into `config.json`
///
/// # Errors
/// - Returns an error if any file operations fail or the settings are invalid.
pub async fn init(ledger_home: &Path, args: &InitArgs) -> Result<Out<()>> {
    let settings = InitSettings {
        bucket: args.bucket().to_string(),
        remote_url: args.remote_url().to_string(),
        record_key: args.record_key().to_string(),
        admin_email: args.admin_email().map(str::to_string),
        admin_password: args.admin_password().map(str::to_string),
    };
    let config = Config::create(ledger_home, settings)
        .await
        .context("Unable to create the data directory and configs")?;
    Ok(format!(
        "Successfully created the ledger directory at {}",
        config.root().display()
    )
    .into())
}
