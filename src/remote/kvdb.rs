//! Implements `RemoteStore` over HTTP against a kvdb.io-style key-value service: `GET` reads the
//! value of a key and `POST` replaces it.

use crate::model::RemoteSnapshot;
use crate::remote::RemoteStore;
use crate::{utils, Result};
use anyhow::{bail, Context};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::trace;
use url::Url;

pub(crate) struct KvdbStore {
    client: reqwest::Client,
    url: Url,
}

impl KvdbStore {
    pub(crate) fn new(url: Url, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build the HTTP client")?;
        Ok(Self { client, url })
    }
}

#[async_trait::async_trait]
impl RemoteStore for KvdbStore {
    async fn fetch(&self) -> Result<Option<RemoteSnapshot>> {
        // The cache buster keeps intermediaries from serving a stale record.
        let mut url = self.url.clone();
        url.query_pairs_mut()
            .append_pair("cb", &utils::now_millis().to_string());
        trace!("GET {url}");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Unable to reach {}", self.url))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            bail!("Fetching {} failed with HTTP {status}", self.url);
        }
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read the response from {}", self.url))?;
        RemoteSnapshot::parse(&body)
            .with_context(|| format!("The record at {} is malformed", self.url))
            .map(Some)
    }

    async fn replace(&self, snapshot: &RemoteSnapshot) -> Result<()> {
        let body = serde_json::to_string(snapshot).context("Failed to serialize the ledger")?;
        trace!("POST {} ({} bytes)", self.url, body.len());

        // kvdb.io stores the body verbatim; text/plain avoids a CORS preflight for browser
        // clients sharing the same record.
        let response = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "text/plain")
            .body(body)
            .send()
            .await
            .with_context(|| format!("Unable to reach {}", self.url))?;
        let status = response.status();
        if !status.is_success() {
            bail!("Replacing {} failed with HTTP {status}", self.url);
        }
        Ok(())
    }

    fn location(&self) -> String {
        self.url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DailyEntry;
    use axum::extract::{Path, State};
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::get;
    use axum::Router;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::{Arc, Mutex};

    type Records = Arc<Mutex<HashMap<String, String>>>;

    async fn read_record(
        State(records): State<Records>,
        Path((bucket, key)): Path<(String, String)>,
    ) -> std::result::Result<String, AxumStatus> {
        if key == "broken" {
            return Err(AxumStatus::INTERNAL_SERVER_ERROR);
        }
        records
            .lock()
            .unwrap()
            .get(&format!("{bucket}/{key}"))
            .cloned()
            .ok_or(AxumStatus::NOT_FOUND)
    }

    async fn write_record(
        State(records): State<Records>,
        Path((bucket, key)): Path<(String, String)>,
        body: String,
    ) -> AxumStatus {
        if key == "broken" {
            return AxumStatus::INTERNAL_SERVER_ERROR;
        }
        records
            .lock()
            .unwrap()
            .insert(format!("{bucket}/{key}"), body);
        AxumStatus::OK
    }

    /// Starts a stand-in key-value service on a free local port.
    async fn serve() -> (String, Records) {
        let records: Records = Arc::new(Mutex::new(HashMap::new()));
        let app = Router::new()
            .route("/:bucket/:key", get(read_record).post(write_record))
            .with_state(records.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), records)
    }

    fn store(base: &str, key: &str) -> KvdbStore {
        let url = crate::remote::record_url(base, "bucket", key).unwrap();
        KvdbStore::new(url, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_missing_record_is_none() {
        let (base, _) = serve().await;
        assert_eq!(store(&base, "empty").fetch().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_replace_then_fetch() {
        let (base, records) = serve().await;
        let store = store(&base, "master_record");
        let entry = DailyEntry::new("2025-04-01", BTreeMap::new(), vec![], 10).unwrap();
        let snapshot = RemoteSnapshot::new(vec![entry], 1_700_000_000_000);

        store.replace(&snapshot).await.unwrap();
        let raw = records
            .lock()
            .unwrap()
            .get("bucket/master_record")
            .cloned()
            .unwrap();
        assert!(raw.contains("\"updatedAt\":1700000000000"));

        assert_eq!(store.fetch().await.unwrap(), Some(snapshot));
    }

    #[tokio::test]
    async fn test_malformed_record_is_an_error() {
        let (base, records) = serve().await;
        records
            .lock()
            .unwrap()
            .insert("bucket/bad".into(), r#"{"entries": "nope"}"#.into());
        assert!(store(&base, "bad").fetch().await.is_err());
    }

    #[tokio::test]
    async fn test_server_errors() {
        let (base, _) = serve().await;
        let store = store(&base, "broken");
        assert!(store.fetch().await.is_err());
        assert!(store.replace(&RemoteSnapshot::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        // Bind and drop to find a port nobody listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let store = store(&format!("http://{addr}"), "k");
        assert!(store.fetch().await.is_err());
    }
}
