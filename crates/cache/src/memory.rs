use crate::error::Result;
use crate::store::KeyValueStore;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use portal_models::{SharedClock, SystemClock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// In-process store. Only safe for a single server instance; used by tests
/// and by `SESSION_STORE=memory`.
#[derive(Clone)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    clock: SharedClock,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// Number of entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Raw keys currently held. Lets tests assert what was persisted.
    pub async fn keys(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }

    /// Raw values currently held.
    pub async fn values(&self) -> Vec<String> {
        self.entries
            .read()
            .await
            .values()
            .map(|e| e.value.clone())
            .collect()
    }

    fn deadline(&self, ttl_seconds: u64) -> DateTime<Utc> {
        self.clock.now() + Duration::seconds(ttl_seconds as i64)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = self.clock.now();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<()> {
        let entry = Entry {
            value: value.to_string(),
            expires_at: ttl_seconds.map(|ttl| self.deadline(ttl)),
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn expire(&self, key: &str, ttl_seconds: u64) -> Result<()> {
        let deadline = self.deadline(ttl_seconds);
        if let Some(entry) = self.entries.write().await.get_mut(key) {
            entry.expires_at = Some(deadline);
        }
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<u64>> {
        let now = self.clock.now();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|e| e.is_live(now))
            .and_then(|e| e.expires_at)
            .map(|at| (at - now).num_seconds().max(0) as u64))
    }

    async fn incr_with_ttl(&self, key: &str, ttl_seconds: u64) -> Result<i64> {
        let now = self.clock.now();
        let deadline = self.deadline(ttl_seconds);
        let mut entries = self.entries.write().await;

        let current = entries
            .get(key)
            .filter(|e| e.is_live(now))
            .cloned();

        let (count, expires_at) = match current {
            Some(entry) => {
                let count = entry.value.parse::<i64>().unwrap_or(0) + 1;
                (count, entry.expires_at)
            }
            None => (1, Some(deadline)),
        };

        entries.insert(
            key.to_string(),
            Entry {
                value: count.to_string(),
                expires_at,
            },
        );
        Ok(count)
    }

    async fn purge_expired(&self) -> Result<u64> {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        Ok((before - entries.len()) as u64)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
