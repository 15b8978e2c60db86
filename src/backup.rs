//! Local JSON backups of the ledger, taken before anything overwrites the local entries.

use crate::{utils, Config, Result};
use anyhow::Context;
use serde::Serialize;
use std::path::PathBuf;

/// Prefix for the backup taken before remote entries replace local ones.
pub const PRE_PULL: &str = "pre-pull";

/// Prefix for the backup taken before a token import replaces local entries.
pub const PRE_IMPORT: &str = "pre-import";

/// Prefix for the backup taken before logout clears local entries.
pub const PRE_LOGOUT: &str = "pre-logout";

/// Writes backup files and rotates old ones.
///
/// Create one via `Config::backup()`.
#[derive(Debug, Clone)]
pub struct Backup {
    dir: PathBuf,
    keep: u32,
}

impl Backup {
    pub fn new(config: &Config) -> Self {
        Self {
            dir: config.backups().to_path_buf(),
            keep: config.backup_copies(),
        }
    }

    /// Writes `data` as pretty JSON to `{prefix}.YYYY-MM-DD-NNN.json`, where `NNN` counts up
    /// within the day, then deletes the oldest files of that prefix beyond the configured number of
    /// copies.
    ///
    /// Returns the path of the new file.
    pub async fn save_json<T>(&self, prefix: &str, data: &T) -> Result<PathBuf>
    where
        T: Serialize + ?Sized,
    {
        let date = crate::dates::today_string();
        let names = self.names_with_prefix(prefix).await?;
        let seq = names
            .iter()
            .filter_map(|name| sequence_of(name, prefix, &date))
            .max()
            .unwrap_or(0)
            + 1;
        let path = self.dir.join(format!("{prefix}.{date}-{seq:03}.json"));

        let json = serde_json::to_string_pretty(data).context("Failed to serialize backup")?;
        utils::write(&path, json).await?;

        self.prune(prefix).await?;
        Ok(path)
    }

    /// Deletes the oldest backups of `prefix` so that at most `keep` remain. Backups are ordered by
    /// date, then by sequence number.
    async fn prune(&self, prefix: &str) -> Result<()> {
        let mut names = self.names_with_prefix(prefix).await?;
        names.sort_by_cached_key(|name| age_key(name, prefix));
        let excess = names.len().saturating_sub(self.keep as usize);
        for name in names.into_iter().take(excess) {
            utils::remove(&self.dir.join(name)).await?;
        }
        Ok(())
    }

    /// File names in the backups directory that belong to `prefix`.
    async fn names_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut dir = utils::read_dir(&self.dir).await?;
        while let Some(entry) = dir
            .next_entry()
            .await
            .context("Failed to read directory entry")?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            if belongs_to(&name, prefix) {
                names.push(name);
            }
        }
        Ok(names)
    }
}

fn belongs_to(name: &str, prefix: &str) -> bool {
    name.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('.'))
        .is_some_and(|rest| rest.ends_with(".json"))
}

/// Orders `{prefix}.{date}-NNN.json` names oldest first. A sequence number past 999 is wider than
/// the padding, so it is compared as a number.
fn age_key(name: &str, prefix: &str) -> (String, u32) {
    let stem = name
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('.'))
        .and_then(|rest| rest.strip_suffix(".json"))
        .unwrap_or(name);
    match stem.rsplit_once('-') {
        Some((date, seq)) => match seq.parse() {
            Ok(seq) => (date.to_string(), seq),
            Err(_) => (stem.to_string(), 0),
        },
        None => (stem.to_string(), 0),
    }
}

/// Extracts `NNN` from `{prefix}.{date}-NNN.json`.
fn sequence_of(name: &str, prefix: &str, date: &str) -> Option<u32> {
    name.strip_prefix(&format!("{prefix}.{date}-"))?
        .strip_suffix(".json")?
        .parse()
        .ok()
}
