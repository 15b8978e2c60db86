//! Moving a ledger between devices by hand: the whole entry list encoded as a single base64
//! string that can be pasted into `ledger token import` elsewhere.

use crate::model::{DailyEntry, RemoteSnapshot};
use crate::{utils, Result};
use anyhow::Context;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Encodes `entries` as a transfer token.
pub fn export_token(entries: &[DailyEntry]) -> Result<String> {
    let snapshot = RemoteSnapshot::new(entries.to_vec(), utils::now_millis());
    let json = serde_json::to_string(&snapshot).context("Failed to serialize the ledger")?;
    Ok(STANDARD.encode(json))
}

/// Decodes a transfer token into its entries.
///
/// # Errors
/// - The token is not base64, not JSON, or has no `entries` array.
pub fn import_token(token: &str) -> Result<Vec<DailyEntry>> {
    let bytes = STANDARD
        .decode(token.trim())
        .context("The token is not valid base64")?;
    let json = String::from_utf8(bytes).context("The token does not hold text")?;
    let snapshot = RemoteSnapshot::parse(&json).context("The token does not hold a ledger")?;
    Ok(snapshot.entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_export_then_import() {
        let entries = vec![
            DailyEntry::new("2025-05-01", BTreeMap::new(), vec![], 1).unwrap(),
            DailyEntry::new("2025-05-02", BTreeMap::new(), vec![], 2).unwrap(),
        ];
        let token = export_token(&entries).unwrap();
        assert!(!token.contains('{'));
        assert_eq!(import_token(&format!("  {token}\n")).unwrap(), entries);
    }

    #[test]
    fn test_import_rejects_bad_tokens() {
        assert!(import_token("not base64!").is_err());
        assert!(import_token(&STANDARD.encode("plain text")).is_err());
        assert!(import_token(&STANDARD.encode(r#"{"entries": {}}"#)).is_err());
        assert!(import_token(&STANDARD.encode(r#"{"updatedAt": 1}"#)).is_err());
        assert_eq!(
            import_token(&STANDARD.encode(r#"{"entries": []}"#)).unwrap(),
            vec![]
        );
    }
}
