use crate::error::Result;
use crate::store::KeyValueStore;
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client, Script};

const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";
const DEFAULT_KEY_PREFIX: &str = "ml:";

/// INCR and arm the window in one round trip, so a counter can never be
/// left without a TTL.
const INCR_WITH_TTL: &str = r"
local n = redis.call('INCR', KEYS[1])
if n == 1 then
  redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return n
";

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub url: String,
    /// Namespace prepended to every key, for Redis instances shared with
    /// other applications.
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REDIS_URL.to_string(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

impl CacheConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: std::env::var("REDIS_URL").unwrap_or(defaults.url),
            key_prefix: std::env::var("REDIS_KEY_PREFIX").unwrap_or(defaults.key_prefix),
        }
    }
}

/// Redis-backed store. Shared across server processes; expiry is native.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
    key_prefix: String,
    incr_script: Script,
}

impl RedisStore {
    pub async fn new(config: CacheConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())?;
        let manager = ConnectionManager::new(client).await?;
        tracing::debug!(prefix = %config.key_prefix, "Connected to Redis");

        Ok(Self {
            manager,
            key_prefix: config.key_prefix,
            incr_script: Script::new(INCR_WITH_TTL),
        })
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    fn conn(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.conn().get(self.key(key)).await?)
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<()> {
        let key = self.key(key);
        match ttl_seconds {
            Some(ttl) => self.conn().set_ex::<_, _, ()>(key, value, ttl.max(1)).await?,
            None => self.conn().set::<_, _, ()>(key, value).await?,
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.conn().del::<_, ()>(self.key(key)).await?;
        Ok(())
    }

    async fn expire(&self, key: &str, ttl_seconds: u64) -> Result<()> {
        self.conn()
            .expire::<_, ()>(self.key(key), ttl_seconds.max(1) as i64)
            .await?;
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<u64>> {
        let remaining: i64 = self.conn().ttl(self.key(key)).await?;
        // -2 missing, -1 persistent
        Ok(u64::try_from(remaining).ok())
    }

    async fn incr_with_ttl(&self, key: &str, ttl_seconds: u64) -> Result<i64> {
        let mut conn = self.conn();
        let count: i64 = self
            .incr_script
            .key(self.key(key))
            .arg(ttl_seconds.max(1))
            .invoke_async(&mut conn)
            .await?;
        Ok(count)
    }

    async fn purge_expired(&self) -> Result<u64> {
        Ok(0)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn();
        redis::cmd("PING").query_async::<()>(&mut conn).await?;
        Ok(())
    }
}
