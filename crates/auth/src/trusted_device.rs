use crate::error::Result;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Duration;
use portal_cache::{trusted_device_key, SharedStore};
use portal_models::{SharedClock, TrustedDevice};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

const TOKEN_BYTES: usize = 32;

/// Anything longer is not one of ours; skip the lookup.
const MAX_TOKEN_LEN: usize = 128;

/// Hashed bearer tokens that let a browser skip the one-time code.
#[derive(Clone)]
pub struct TrustedDeviceStore {
    store: SharedStore,
    clock: SharedClock,
}

impl TrustedDeviceStore {
    pub fn new(store: SharedStore, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    /// Whether `raw_token` names an unexpired trusted device. Storage
    /// failures degrade to `false` so the one-time code is required.
    pub async fn is_trusted(&self, raw_token: &str) -> bool {
        let raw_token = raw_token.trim();
        if raw_token.is_empty() || raw_token.len() > MAX_TOKEN_LEN {
            return false;
        }

        let key = trusted_device_key(&hash_token(raw_token));
        let record: Option<TrustedDevice> = match self.store.get_json(&key).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Trusted device lookup failed, requiring code: {}", e);
                return false;
            }
        };

        match record {
            Some(device) if !device.is_expired(self.clock.now()) => true,
            Some(_) => {
                tracing::debug!("Purging expired trusted device record");
                if let Err(e) = self.store.delete(&key).await {
                    tracing::warn!("Failed to purge expired trusted device: {}", e);
                }
                false
            }
            None => false,
        }
    }

    /// Mint a new token valid for `ttl`. Only `sha256(token)` is persisted;
    /// the returned raw token goes to the client.
    pub async fn issue(&self, ttl: Duration) -> Result<String> {
        let raw_token = generate_token();
        let now = self.clock.now();
        let record = TrustedDevice {
            token_hash: hash_token(&raw_token),
            expires_at: now + ttl,
            created_at: now,
        };

        self.store
            .set_json(
                &trusted_device_key(&record.token_hash),
                &record,
                Some(ttl.num_seconds().max(1) as u64),
            )
            .await?;

        tracing::info!("Trusted device registered until {}", record.expires_at);
        Ok(raw_token)
    }

    /// Forget a device before its natural expiry.
    pub async fn revoke(&self, raw_token: &str) -> Result<()> {
        let raw_token = raw_token.trim();
        if raw_token.is_empty() || raw_token.len() > MAX_TOKEN_LEN {
            return Ok(());
        }

        self.store
            .delete(&trusted_device_key(&hash_token(raw_token)))
            .await?;
        tracing::info!("Trusted device revoked");
        Ok(())
    }
}

/// Lowercase hex SHA-256, the only form a token is ever stored in.
pub fn hash_token(raw_token: &str) -> String {
    hex::encode(Sha256::digest(raw_token.as_bytes()))
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;
    use crate::test_support::FaultyStore;
    use portal_cache::MemoryStore;
    use portal_models::{Clock, ManualClock};
    use std::sync::Arc;

    fn setup() -> (TrustedDeviceStore, MemoryStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let memory = MemoryStore::with_clock(clock.clone());
        let devices = TrustedDeviceStore::new(Arc::new(memory.clone()), clock.clone());
        (devices, memory, clock)
    }

    #[tokio::test]
    async fn test_issued_token_is_trusted() {
        let (devices, _, _) = setup();

        let token = devices.issue(Duration::days(30)).await.unwrap();
        assert!(devices.is_trusted(&token).await);
        assert!(!devices.is_trusted("someone-elses-token").await);
        assert!(!devices.is_trusted("").await);
    }

    #[tokio::test]
    async fn test_only_hash_is_persisted() {
        let (devices, memory, _) = setup();

        let token = devices.issue(Duration::days(30)).await.unwrap();
        let keys = memory.keys().await;
        let values = memory.values().await;

        assert_eq!(keys, vec![format!("trusted_device:{}", hash_token(&token))]);
        assert!(keys.iter().all(|k| !k.contains(&token)));
        assert!(values.iter().all(|v| !v.contains(&token)));
        assert!(values[0].contains(&hash_token(&token)));
    }

    #[tokio::test]
    async fn test_expired_token_is_not_trusted() {
        let (devices, _, clock) = setup();

        let token = devices.issue(Duration::days(30)).await.unwrap();
        clock.advance(Duration::days(30) + Duration::seconds(1));
        assert!(!devices.is_trusted(&token).await);
    }

    /// A backend whose TTL outlives the record's own expiry, so the lazy
    /// purge path in `is_trusted` is the one that removes it.
    #[tokio::test]
    async fn test_expired_record_is_purged_on_read() {
        let (devices, memory, clock) = setup();

        let record = TrustedDevice {
            token_hash: hash_token("old-token"),
            expires_at: clock.now() - Duration::seconds(1),
            created_at: clock.now() - Duration::days(31),
        };
        let store: SharedStore = Arc::new(memory.clone());
        store
            .set_json(&trusted_device_key(&record.token_hash), &record, None)
            .await
            .unwrap();

        assert!(!devices.is_trusted("old-token").await);
        assert!(memory.is_empty().await);
    }

    #[tokio::test]
    async fn test_each_issue_is_a_distinct_record() {
        let (devices, memory, _) = setup();

        let a = devices.issue(Duration::days(30)).await.unwrap();
        let b = devices.issue(Duration::days(30)).await.unwrap();

        assert_ne!(a, b);
        assert_eq!(memory.len().await, 2);
        assert!(devices.is_trusted(&a).await);
        assert!(devices.is_trusted(&b).await);
    }

    #[tokio::test]
    async fn test_revoke() {
        let (devices, _, _) = setup();

        let token = devices.issue(Duration::days(30)).await.unwrap();
        devices.revoke(&token).await.unwrap();
        assert!(!devices.is_trusted(&token).await);
    }

    #[tokio::test]
    async fn test_storage_failure_degrades_to_untrusted() {
        let clock = Arc::new(ManualClock::starting_now());
        let devices = TrustedDeviceStore::new(Arc::new(FaultyStore::broken()), clock);

        assert!(!devices.is_trusted("any-token").await);
        assert!(matches!(
            devices.issue(Duration::days(30)).await,
            Err(AuthError::StorageUnavailable(_))
        ));
    }
}
