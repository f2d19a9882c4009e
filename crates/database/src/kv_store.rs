use crate::connection::Database;
use crate::error::DatabaseError;
use async_trait::async_trait;
use portal_cache::{KeyValueStore, Result};
use portal_models::{SharedClock, SystemClock};
use std::sync::Arc;

/// Embedded SQLite backend. Safe to share between processes pointing at the
/// same database file.
#[derive(Clone)]
pub struct SqliteStore {
    db: Database,
    clock: SharedClock,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self::with_clock(db, Arc::new(SystemClock))
    }

    pub fn with_clock(db: Database, clock: SharedClock) -> Self {
        Self { db, clock }
    }

    fn deadline(&self, ttl_seconds: u64) -> i64 {
        self.clock.timestamp() + ttl_seconds as i64
    }
}

fn db_err(err: sqlx::Error) -> portal_cache::CacheError {
    DatabaseError::from(err).into()
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar(
            r#"
            SELECT value FROM kv_entries
            WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?2)
            "#,
        )
        .bind(key)
        .bind(self.clock.timestamp())
        .fetch_optional(self.db.pool())
        .await
        .map_err(db_err)?;

        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<()> {
        let expires_at = ttl_seconds.map(|ttl| self.deadline(ttl));

        sqlx::query(
            r#"
            INSERT INTO kv_entries (key, value, expires_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(self.db.pool())
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM kv_entries WHERE key = ?1")
            .bind(key)
            .execute(self.db.pool())
            .await
            .map_err(db_err)?;

        Ok(())
    }

    async fn expire(&self, key: &str, ttl_seconds: u64) -> Result<()> {
        sqlx::query("UPDATE kv_entries SET expires_at = ?1 WHERE key = ?2")
            .bind(self.deadline(ttl_seconds))
            .bind(key)
            .execute(self.db.pool())
            .await
            .map_err(db_err)?;

        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<u64>> {
        let now = self.clock.timestamp();
        let expires_at: Option<Option<i64>> = sqlx::query_scalar(
            r#"
            SELECT expires_at FROM kv_entries
            WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?2)
            "#,
        )
        .bind(key)
        .bind(now)
        .fetch_optional(self.db.pool())
        .await
        .map_err(db_err)?;

        Ok(expires_at.flatten().map(|at| (at - now).max(0) as u64))
    }

    async fn incr_with_ttl(&self, key: &str, ttl_seconds: u64) -> Result<i64> {
        let now = self.clock.timestamp();

        // Single statement, so concurrent hits cannot lose an increment.
        let value: String = sqlx::query_scalar(
            r#"
            INSERT INTO kv_entries (key, value, expires_at)
            VALUES (?1, '1', ?2)
            ON CONFLICT(key) DO UPDATE SET
                value = CASE
                    WHEN kv_entries.expires_at IS NOT NULL AND kv_entries.expires_at <= ?3 THEN '1'
                    ELSE CAST(CAST(kv_entries.value AS INTEGER) + 1 AS TEXT)
                END,
                expires_at = CASE
                    WHEN kv_entries.expires_at IS NOT NULL AND kv_entries.expires_at <= ?3 THEN excluded.expires_at
                    ELSE kv_entries.expires_at
                END
            RETURNING value
            "#,
        )
        .bind(key)
        .bind(self.deadline(ttl_seconds))
        .bind(now)
        .fetch_one(self.db.pool())
        .await
        .map_err(db_err)?;

        Ok(value.parse().unwrap_or(1))
    }

    async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM kv_entries WHERE expires_at IS NOT NULL AND expires_at <= ?1")
            .bind(self.clock.timestamp())
            .execute(self.db.pool())
            .await
            .map_err(db_err)?;

        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<()> {
        self.db.ping().await.map_err(Into::into)
    }
}
