//! Implements `RemoteStore` with records held in process memory.
//!
//! Note: this is compiled even in the "production" version of this app so that the whole program
//! can be run top-to-bottom without a network. Records are shared by every `MemoryStore` in the
//! process that points at the same location, which is how separate "devices" are simulated.

use crate::model::RemoteSnapshot;
use crate::remote::RemoteStore;
use crate::Result;
use anyhow::{bail, Context};
use std::collections::HashMap;
use std::sync::{LazyLock, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Record {
    /// The raw document, exactly as a client would have written it.
    body: Option<String>,
    /// Number of upcoming requests that fail as if the service were unreachable.
    failures: u32,
    fetches: u32,
    replaces: u32,
}

static RECORDS: LazyLock<Mutex<HashMap<String, Record>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn records() -> MutexGuard<'static, HashMap<String, Record>> {
    // A panic while the lock was held cannot leave a record half-written.
    RECORDS.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A remote record in process memory.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MemoryStore {
    location: String,
}

impl MemoryStore {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }

    /// Overwrites the raw document, bypassing serialization. `None` deletes the record.
    pub fn set_raw(&self, body: Option<&str>) {
        records().entry(self.location.clone()).or_default().body = body.map(str::to_string);
    }

    /// The raw document currently stored.
    pub fn raw(&self) -> Option<String> {
        records()
            .get(&self.location)
            .and_then(|r| r.body.clone())
    }

    /// Makes the next `n` requests fail.
    pub fn fail_next(&self, n: u32) {
        records().entry(self.location.clone()).or_default().failures = n;
    }

    /// How many fetches and replaces have reached this record.
    pub fn request_counts(&self) -> (u32, u32) {
        records()
            .get(&self.location)
            .map(|r| (r.fetches, r.replaces))
            .unwrap_or_default()
    }

    fn take_failure(record: &mut Record) -> bool {
        if record.failures > 0 {
            record.failures -= 1;
            true
        } else {
            false
        }
    }
}

#[async_trait::async_trait]
impl RemoteStore for MemoryStore {
    async fn fetch(&self) -> Result<Option<RemoteSnapshot>> {
        let body = {
            let mut records = records();
            let record = records.entry(self.location.clone()).or_default();
            record.fetches += 1;
            if Self::take_failure(record) {
                bail!("Unable to reach {}", self.location);
            }
            record.body.clone()
        };
        match body {
            None => Ok(None),
            Some(body) => RemoteSnapshot::parse(&body)
                .with_context(|| format!("The record at {} is malformed", self.location))
                .map(Some),
        }
    }

    async fn replace(&self, snapshot: &RemoteSnapshot) -> Result<()> {
        let body = serde_json::to_string(snapshot).context("Failed to serialize the ledger")?;
        let mut records = records();
        let record = records.entry(self.location.clone()).or_default();
        record.replaces += 1;
        if Self::take_failure(record) {
            bail!("Unable to reach {}", self.location);
        }
        record.body = Some(body);
        Ok(())
    }

    fn location(&self) -> String {
        self.location.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn unique() -> MemoryStore {
        MemoryStore::new(format!("memory://test/{}", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_round_trip_and_sharing() {
        let a = unique();
        let b = MemoryStore::new(a.location());
        assert_eq!(a.fetch().await.unwrap(), None);

        let snapshot = RemoteSnapshot::new(vec![], 77);
        a.replace(&snapshot).await.unwrap();
        assert_eq!(b.fetch().await.unwrap(), Some(snapshot));
        assert_eq!(a.request_counts(), (2, 1));
    }

    #[tokio::test]
    async fn test_injected_failures_and_malformed_documents() {
        let store = unique();
        store.fail_next(2);
        assert!(store.fetch().await.is_err());
        assert!(store.replace(&RemoteSnapshot::default()).await.is_err());
        assert!(store.fetch().await.unwrap().is_none());

        store.set_raw(Some(r#"{"entries": 5}"#));
        assert!(store.fetch().await.is_err());
        store.set_raw(None);
        assert!(store.fetch().await.unwrap().is_none());
    }
}
