use crate::config::{Config, StoreBackend};
use crate::middleware::OriginPolicy;
use portal_auth::{AdminAuthService, AuthError};
use portal_cache::{MemoryStore, RedisStore, SharedStore};
use portal_database::{Database, SqliteStore};
use portal_models::SharedClock;
use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    pub auth: AdminAuthService,
    pub store: SharedStore,
    pub origin_policy: OriginPolicy,
}

impl AppState {
    pub fn new(config: Config, store: SharedStore, clock: SharedClock) -> Result<Self, AuthError> {
        let auth = AdminAuthService::new(&config.auth, store.clone(), clock)?;
        let origin_policy = OriginPolicy::new(&config.allowed_origins);

        Ok(Self {
            config,
            auth,
            store,
            origin_policy,
        })
    }
}

/// Open the backend named by `SESSION_STORE` and make sure it answers.
pub async fn connect_store(config: &Config, clock: SharedClock) -> anyhow::Result<SharedStore> {
    let store: SharedStore = match config.store {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory session store; sessions will not survive a restart");
            Arc::new(MemoryStore::with_clock(clock))
        }
        StoreBackend::Sqlite => {
            let database = Database::new(config.database.clone()).await?;
            Arc::new(SqliteStore::with_clock(database, clock))
        }
        StoreBackend::Redis => Arc::new(RedisStore::new(config.cache.clone()).await?),
    };

    store.ping().await?;
    Ok(store)
}
