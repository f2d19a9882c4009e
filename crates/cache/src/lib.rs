pub mod error;
pub mod memory;
pub mod redis_cache;
pub mod store;

pub use error::{CacheError, Result};
pub use memory::MemoryStore;
pub use redis_cache::{CacheConfig, RedisStore};
pub use store::{
    rate_limit_key, session_cache_key, trusted_device_key, KeyValueStore, SharedStore,
};
