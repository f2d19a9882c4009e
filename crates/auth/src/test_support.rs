//! Store doubles for exercising storage failures.

use async_trait::async_trait;
use portal_cache::{CacheError, KeyValueStore, MemoryStore, Result};

/// Delegates to a `MemoryStore`, except that writes to keys starting with
/// `failing_prefix` are refused. An empty prefix refuses every operation.
pub struct FaultyStore {
    inner: MemoryStore,
    failing_prefix: &'static str,
}

impl FaultyStore {
    /// Every call fails.
    pub fn broken() -> Self {
        Self {
            inner: MemoryStore::new(),
            failing_prefix: "",
        }
    }

    pub fn rejecting_writes_to(inner: MemoryStore, failing_prefix: &'static str) -> Self {
        Self {
            inner,
            failing_prefix,
        }
    }

    fn is_broken(&self) -> bool {
        self.failing_prefix.is_empty()
    }

    fn check(&self, key: Option<&str>) -> Result<()> {
        let refused = match key {
            Some(key) => key.starts_with(self.failing_prefix),
            None => self.is_broken(),
        };
        if refused {
            Err(CacheError::Backend("disk on fire".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KeyValueStore for FaultyStore {
    fn backend_name(&self) -> &'static str {
        "faulty"
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check(None)?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<()> {
        self.check(Some(key))?;
        self.inner.set(key, value, ttl_seconds).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.check(None)?;
        self.inner.delete(key).await
    }

    async fn expire(&self, key: &str, ttl_seconds: u64) -> Result<()> {
        self.check(Some(key))?;
        self.inner.expire(key, ttl_seconds).await
    }

    async fn ttl(&self, key: &str) -> Result<Option<u64>> {
        self.check(None)?;
        self.inner.ttl(key).await
    }

    async fn incr_with_ttl(&self, key: &str, ttl_seconds: u64) -> Result<i64> {
        self.check(Some(key))?;
        self.inner.incr_with_ttl(key, ttl_seconds).await
    }

    async fn purge_expired(&self) -> Result<u64> {
        self.check(None)?;
        self.inner.purge_expired().await
    }

    async fn ping(&self) -> Result<()> {
        self.check(None)?;
        self.inner.ping().await
    }
}
