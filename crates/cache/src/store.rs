use crate::error::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

/// Minimal key-value interface shared by sessions, trusted devices and
/// rate-limit counters. Every backend gives `set` upsert semantics, so two
/// writers racing on one key leave exactly one value behind.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Short backend name for logs and the health endpoint.
    fn backend_name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Insert or replace `key`, optionally expiring after `ttl_seconds`.
    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Set expiration on an existing key. Missing keys are ignored.
    async fn expire(&self, key: &str, ttl_seconds: u64) -> Result<()>;

    /// Seconds until `key` expires; `None` if the key is missing or has no TTL.
    async fn ttl(&self, key: &str) -> Result<Option<u64>>;

    /// Increment a counter. The TTL is applied only when the counter is
    /// created, so the window is fixed from the first hit.
    async fn incr_with_ttl(&self, key: &str, ttl_seconds: u64) -> Result<i64>;

    /// Drop every expired entry. Backends with native expiry return 0.
    async fn purge_expired(&self) -> Result<u64>;

    async fn ping(&self) -> Result<()>;
}

pub type SharedStore = Arc<dyn KeyValueStore>;

impl dyn KeyValueStore {
    /// Get a JSON value
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await? {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    /// Set a JSON value with optional TTL (seconds)
    pub async fn set_json<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: Option<u64>,
    ) -> Result<()> {
        let serialized = serde_json::to_string(value)?;
        self.set(key, &serialized, ttl_seconds).await
    }
}

// Helper functions for the key layout
pub fn session_cache_key(session_id: &str) -> String {
    format!("session:{}", session_id)
}

pub fn trusted_device_key(token_hash: &str) -> String {
    format!("trusted_device:{}", token_hash)
}

pub fn rate_limit_key(scope: &str, identifier: &str) -> String {
    format!("rate_limit:{}:{}", scope, identifier)
}
