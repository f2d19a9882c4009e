use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A remembered browser. Only the SHA-256 of the bearer token is kept;
/// the raw token lives in the client's cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustedDevice {
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl TrustedDevice {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
