use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The logged-in user of this device.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub email: String,
    pub id: String,
    /// A shared secret chosen by the user. When present it is used as the key of the remote
    /// record, so every device logged in with the same token sees the same ledger.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_token: Option<String>,
}

impl AuthUser {
    /// Creates a user with a fresh session id.
    pub fn new(email: impl Into<String>, sync_token: Option<String>) -> Self {
        Self {
            email: email.into(),
            id: Uuid::new_v4().to_string(),
            sync_token: sync_token.filter(|t| !t.trim().is_empty()),
        }
    }

    pub fn sync_token(&self) -> Option<&str> {
        self.sync_token.as_deref()
    }
}
