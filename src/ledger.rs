//! The in-memory entry list and the add, edit and delete operations over it.

use crate::model::DailyEntry;
use crate::Result;
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

/// All entries of the ledger, live and superseded, in the order they were recorded.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    entries: Vec<DailyEntry>,
}

impl Ledger {
    pub fn new(entries: Vec<DailyEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[DailyEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<DailyEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries that have not been superseded by an edit.
    pub fn live(&self) -> impl Iterator<Item = &DailyEntry> {
        self.entries.iter().filter(|e| !e.is_history())
    }

    pub fn get(&self, id: &str) -> Option<&DailyEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Appends a new entry.
    pub fn add(&mut self, entry: DailyEntry) {
        self.entries.push(entry);
    }

    /// Replaces the live entry `target_id` with `replacement`. The target is kept as a history
    /// entry and the replacement joins its version chain.
    ///
    /// Returns the stored replacement.
    pub fn edit(&mut self, target_id: &str, mut replacement: DailyEntry) -> Result<&DailyEntry> {
        let target = self
            .entries
            .iter_mut()
            .find(|e| e.id == target_id)
            .with_context(|| format!("No entry with id '{target_id}'"))?;
        if target.is_history() {
            bail!(
                "Entry '{target_id}' has already been superseded, edit the current version instead"
            );
        }
        target.is_history = Some(true);
        replacement.parent_id = Some(target.chain_root().to_string());
        replacement.is_history = None;
        self.entries.push(replacement);
        let last = self.entries.len() - 1;
        Ok(&self.entries[last])
    }

    /// Removes the entry `id` and returns it. Other versions in its chain are left alone.
    pub fn delete(&mut self, id: &str) -> Result<DailyEntry> {
        let ix = self
            .entries
            .iter()
            .position(|e| e.id == id)
            .with_context(|| format!("No entry with id '{id}'"))?;
        Ok(self.entries.remove(ix))
    }
}

impl From<Vec<DailyEntry>> for Ledger {
    fn from(entries: Vec<DailyEntry>) -> Self {
        Self::new(entries)
    }
}
