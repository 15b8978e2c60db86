use crate::model::DailyEntry;
use crate::Result;
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

/// The whole ledger as one document: the body of the remote record and of exported tokens.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSnapshot {
    pub entries: Vec<DailyEntry>,
    /// Milliseconds since the epoch at which the document was written. Records written before
    /// timestamps existed read as `0`.
    #[serde(default)]
    pub updated_at: i64,
}

impl RemoteSnapshot {
    pub fn new(entries: Vec<DailyEntry>, updated_at: i64) -> Self {
        Self {
            entries,
            updated_at,
        }
    }

    /// Parses a snapshot document. The document must be a JSON object whose `entries` field is an
    /// array, anything else is reported as malformed.
    pub fn parse(body: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(body).context("The ledger document is not valid JSON")?;
        match value.get("entries") {
            Some(serde_json::Value::Array(_)) => {}
            Some(_) => bail!("The ledger document is malformed: 'entries' is not an array"),
            None => bail!("The ledger document is malformed: 'entries' is missing"),
        }
        serde_json::from_value(value).context("The ledger document has malformed entries")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_missing_updated_at() {
        let snapshot = RemoteSnapshot::parse(r#"{"entries": []}"#).unwrap();
        assert!(snapshot.entries.is_empty());
        assert_eq!(snapshot.updated_at, 0);
    }

    #[test]
    fn test_parse_rejects_malformed_documents() {
        assert!(RemoteSnapshot::parse("not json").is_err());
        assert!(RemoteSnapshot::parse(r#"{"updatedAt": 5}"#).is_err());
        let err = RemoteSnapshot::parse(r#"{"entries": {"a": 1}, "updatedAt": 5}"#).unwrap_err();
        assert!(err.to_string().contains("not an array"));
        assert!(RemoteSnapshot::parse(r#"{"entries": [{"id": 1}], "updatedAt": 5}"#).is_err());
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_string(&RemoteSnapshot::new(vec![], 99)).unwrap();
        assert_eq!(json, r#"{"entries":[],"updatedAt":99}"#);
    }
}
