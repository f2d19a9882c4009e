use portal_cache::SharedStore;
use tokio::task::JoinHandle;

/// Periodically drop expired sessions, trusted devices and counters.
pub fn start_cleanup_task(store: SharedStore, interval_secs: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(tokio::time::Duration::from_secs(interval_secs)).await;
            match store.purge_expired().await {
                Ok(0) => {}
                Ok(removed) => tracing::debug!("Store cleanup: removed {} expired entries", removed),
                Err(e) => tracing::warn!("Store cleanup failed: {}", e),
            }
        }
    })
}
